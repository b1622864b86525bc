//! Travel matrix for one optimization run.
//!
//! Pairs are resolved cache first, then through the external provider, then
//! through the haversine estimator. Lookups run with bounded concurrency and
//! identical in-flight requests are shared.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{TravelTimeCache, TravelTimeSource};
use crate::error::PlannerError;
use crate::haversine::{haversine_km, HaversineEstimator};
use crate::model::{Coordinate, Location, LocationId};
use crate::traits::TravelTimeProvider;

/// Directional times closer than this are stored as one shared entry.
const ASYMMETRY_TOLERANCE_MINUTES: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct MatrixConfig {
    /// Upper bound on a single provider call before falling back.
    pub provider_timeout: Duration,
    /// Maximum number of pair lookups in flight at once.
    pub max_concurrent_requests: usize,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(10),
            max_concurrent_requests: 4,
        }
    }
}

/// Directed travel minutes between the locations of one run.
#[derive(Debug, Clone, Default)]
pub struct TravelMatrix {
    minutes: HashMap<(LocationId, LocationId), f64>,
    coordinates: HashMap<LocationId, Coordinate>,
    api_pairs: usize,
    estimated_pairs: usize,
}

impl TravelMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matrix filled entirely from the estimator, without cache or provider.
    pub fn estimated(locations: &[Location], estimator: &HaversineEstimator) -> Self {
        let mut matrix = Self::new();
        for (i, from) in locations.iter().enumerate() {
            matrix.add_location(from);
            for to in &locations[i + 1..] {
                let minutes = estimator.estimate(from.coordinate, to.coordinate);
                matrix.insert_pair(&from.id, &to.id, minutes, minutes, TravelTimeSource::Estimate);
            }
        }
        matrix
    }

    pub fn add_location(&mut self, location: &Location) {
        self.coordinates.insert(location.id.clone(), location.coordinate);
    }

    pub fn insert(&mut self, from: &LocationId, to: &LocationId, minutes: f64) {
        self.minutes.insert((from.clone(), to.clone()), minutes);
    }

    fn insert_pair(
        &mut self,
        a: &LocationId,
        b: &LocationId,
        forward: f64,
        backward: f64,
        source: TravelTimeSource,
    ) {
        self.insert(a, b, forward);
        self.insert(b, a, backward);
        match source {
            TravelTimeSource::Api => self.api_pairs += 1,
            TravelTimeSource::Estimate => self.estimated_pairs += 1,
        }
    }

    pub fn travel_minutes(&self, from: &LocationId, to: &LocationId) -> Result<f64, PlannerError> {
        if from == to {
            return Ok(0.0);
        }
        self.minutes
            .get(&(from.clone(), to.clone()))
            .copied()
            .ok_or_else(|| PlannerError::MissingTravelTime {
                from: from.clone(),
                to: to.clone(),
            })
    }

    /// Great-circle distance between two known locations (0 when unknown).
    pub fn distance_km(&self, from: &LocationId, to: &LocationId) -> f64 {
        match (self.coordinates.get(from), self.coordinates.get(to)) {
            (Some(a), Some(b)) => haversine_km(*a, *b),
            _ => 0.0,
        }
    }

    /// Number of pairs measured by the provider.
    pub fn api_pairs(&self) -> usize {
        self.api_pairs
    }

    /// Number of pairs filled in by the estimator.
    pub fn estimated_pairs(&self) -> usize {
        self.estimated_pairs
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedPair {
    forward: f64,
    backward: f64,
    source: TravelTimeSource,
}

impl ResolvedPair {
    fn reversed(self) -> Self {
        Self {
            forward: self.backward,
            backward: self.forward,
            source: self.source,
        }
    }
}

type PairId = (LocationId, LocationId);
type PendingPair = Shared<BoxFuture<'static, ResolvedPair>>;

/// Resolves travel matrices against a shared cache and an optional provider.
pub struct TravelMatrixBuilder {
    cache: Arc<TravelTimeCache>,
    provider: Option<Arc<dyn TravelTimeProvider>>,
    estimator: HaversineEstimator,
    config: MatrixConfig,
    in_flight: Mutex<HashMap<PairId, PendingPair>>,
}

impl TravelMatrixBuilder {
    pub fn new(
        cache: Arc<TravelTimeCache>,
        provider: Option<Arc<dyn TravelTimeProvider>>,
        config: MatrixConfig,
    ) -> Self {
        Self {
            cache,
            provider,
            estimator: HaversineEstimator::default(),
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_estimator(mut self, estimator: HaversineEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn cache(&self) -> &Arc<TravelTimeCache> {
        &self.cache
    }

    /// Resolve every pair that can become adjacent in a route starting at
    /// `origin` and visiting `locations`.
    pub async fn build(
        &self,
        origin: &Location,
        locations: &[Location],
        cancel: &CancellationToken,
    ) -> Result<TravelMatrix, PlannerError> {
        if cancel.is_cancelled() {
            return Err(PlannerError::Cancelled);
        }

        let mut seen = HashSet::new();
        let mut unique: Vec<&Location> = Vec::with_capacity(locations.len() + 1);
        for location in std::iter::once(origin).chain(locations) {
            if seen.insert(&location.id) {
                unique.push(location);
            }
        }

        let mut pairs = Vec::new();
        for (i, from) in unique.iter().enumerate() {
            for to in &unique[i + 1..] {
                pairs.push((*from, *to));
            }
        }

        let concurrency = self.config.max_concurrent_requests.max(1);
        let lookups = stream::iter(pairs)
            .map(|(a, b)| async move { (a, b, self.resolve(a, b).await) })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>();

        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Travel matrix build cancelled");
                return Err(PlannerError::Cancelled);
            }
            resolved = lookups => resolved,
        };

        let mut matrix = TravelMatrix::new();
        for location in &unique {
            matrix.add_location(location);
        }
        for (a, b, pair) in resolved {
            matrix.insert_pair(&a.id, &b.id, pair.forward, pair.backward, pair.source);
        }

        info!(
            "Resolved travel matrix for {} locations ({} measured, {} estimated pairs)",
            unique.len(),
            matrix.api_pairs(),
            matrix.estimated_pairs()
        );

        Ok(matrix)
    }

    /// Travel minutes for a single directed pair.
    pub async fn travel_minutes(
        &self,
        from: &Location,
        to: &Location,
        cancel: &CancellationToken,
    ) -> Result<f64, PlannerError> {
        if from.id == to.id {
            return Ok(0.0);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PlannerError::Cancelled),
            pair = self.resolve(from, to) => Ok(pair.forward),
        }
    }

    async fn resolve(&self, a: &Location, b: &Location) -> ResolvedPair {
        if let (Some(forward), Some(backward)) =
            (self.cache.get(&a.id, &b.id), self.cache.get(&b.id, &a.id))
        {
            debug!("Cache hit for {} <-> {}", a.id, b.id);
            return ResolvedPair {
                forward: forward.minutes,
                backward: backward.minutes,
                source: forward.source,
            };
        }

        // In-flight requests are keyed by the normalized pair.
        let (first, second, swapped) = if a.id <= b.id { (a, b, false) } else { (b, a, true) };
        let key = (first.id.clone(), second.id.clone());

        let pending = {
            let mut in_flight = self.in_flight.lock();
            in_flight
                .entry(key.clone())
                .or_insert_with(|| self.fetch(first.clone(), second.clone()).boxed().shared())
                .clone()
        };

        let pair = pending.clone().await;

        // Unregister once resolved; dropped waiters leave the entry for others.
        {
            let mut in_flight = self.in_flight.lock();
            if in_flight.get(&key).is_some_and(|current| current.ptr_eq(&pending)) {
                in_flight.remove(&key);
            }
        }

        if swapped { pair.reversed() } else { pair }
    }

    fn fetch(&self, from: Location, to: Location) -> impl Future<Output = ResolvedPair> + Send + 'static {
        let cache = Arc::clone(&self.cache);
        let provider = self.provider.clone();
        let estimator = self.estimator;
        let timeout = self.config.provider_timeout;

        async move {
            if let Some(provider) = provider {
                let request = provider.travel_time(from.coordinate, to.coordinate);
                match tokio::time::timeout(timeout, request).await {
                    Ok(Ok(leg)) if is_plausible(leg.minutes) => {
                        let backward = leg.return_minutes.filter(|m| is_plausible(*m));
                        return match backward {
                            Some(backward)
                                if (backward - leg.minutes).abs() > ASYMMETRY_TOLERANCE_MINUTES =>
                            {
                                cache.put_directed(&from.id, &to.id, leg.minutes, TravelTimeSource::Api);
                                cache.put_directed(&to.id, &from.id, backward, TravelTimeSource::Api);
                                ResolvedPair {
                                    forward: leg.minutes,
                                    backward,
                                    source: TravelTimeSource::Api,
                                }
                            }
                            _ => {
                                cache.put(&from.id, &to.id, leg.minutes, TravelTimeSource::Api);
                                ResolvedPair {
                                    forward: leg.minutes,
                                    backward: leg.minutes,
                                    source: TravelTimeSource::Api,
                                }
                            }
                        };
                    }
                    Ok(Ok(leg)) => warn!(
                        "{} returned implausible travel time {} for {} -> {}, using estimate",
                        provider.name(),
                        leg.minutes,
                        from.id,
                        to.id
                    ),
                    Ok(Err(err)) => warn!(
                        "{} failed for {} -> {}: {}, using estimate",
                        provider.name(),
                        from.id,
                        to.id,
                        err
                    ),
                    Err(_) => warn!(
                        "{} timed out after {:?} for {} -> {}, using estimate",
                        provider.name(),
                        timeout,
                        from.id,
                        to.id
                    ),
                }
            }

            let minutes = estimator.estimate(from.coordinate, to.coordinate);
            cache.put(&from.id, &to.id, minutes, TravelTimeSource::Estimate);
            ResolvedPair {
                forward: minutes,
                backward: minutes,
                source: TravelTimeSource::Estimate,
            }
        }
    }
}

fn is_plausible(minutes: f64) -> bool {
    minutes.is_finite() && minutes >= 0.0
}
