//! Planner configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::error::ConfigError;
use crate::haversine::HaversineEstimator;
use crate::matrix::MatrixConfig;
use crate::osrm::OsrmConfig;
use crate::solver::SolveOptions;

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub solve: SolveOptions,
    pub matrix: MatrixConfig,
    pub cache_ttl: Duration,
    /// Fallback used when no provider answers.
    pub estimator: HaversineEstimator,
    /// External travel time provider; `None` means estimates only.
    pub osrm: Option<OsrmConfig>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            solve: SolveOptions::default(),
            matrix: MatrixConfig::default(),
            cache_ttl: DEFAULT_TTL,
            estimator: HaversineEstimator::default(),
            osrm: None,
        }
    }
}

impl PlannerConfig {
    /// Load overrides from environment variables.
    ///
    /// | variable | meaning |
    /// |---|---|
    /// | `ROUTE_PLANNER_MIN_EFFICIENCY` | reporting threshold, 0..=1 |
    /// | `ROUTE_PLANNER_CACHE_TTL_SECS` | cache time-to-live |
    /// | `ROUTE_PLANNER_PROVIDER_TIMEOUT_SECS` | per-call provider timeout |
    /// | `ROUTE_PLANNER_MAX_CONCURRENCY` | parallel provider calls |
    /// | `ROUTE_PLANNER_MAX_RESCHEDULE_MINUTES` | cap on start shifts |
    /// | `ROUTE_PLANNER_LATE_TOLERANCE_MINUTES` | lateness allowed for fixed appointments |
    /// | `ROUTE_PLANNER_ESTIMATE_SPEED_KMH` | speed assumed by the fallback estimator |
    /// | `OSRM_URL`, `OSRM_PROFILE` | enables the OSRM provider |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`PlannerConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(threshold) = parse::<f64, _>(&lookup, "ROUTE_PLANNER_MIN_EFFICIENCY")? {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(invalid("ROUTE_PLANNER_MIN_EFFICIENCY", threshold));
            }
            config.solve.min_efficiency_threshold = threshold;
        }
        if let Some(secs) = parse::<u64, _>(&lookup, "ROUTE_PLANNER_CACHE_TTL_SECS")? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64, _>(&lookup, "ROUTE_PLANNER_PROVIDER_TIMEOUT_SECS")? {
            config.matrix.provider_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = parse::<usize, _>(&lookup, "ROUTE_PLANNER_MAX_CONCURRENCY")? {
            if limit == 0 {
                return Err(invalid("ROUTE_PLANNER_MAX_CONCURRENCY", limit));
            }
            config.matrix.max_concurrent_requests = limit;
        }
        if let Some(minutes) = parse::<i64, _>(&lookup, "ROUTE_PLANNER_MAX_RESCHEDULE_MINUTES")? {
            if minutes < 0 {
                return Err(invalid("ROUTE_PLANNER_MAX_RESCHEDULE_MINUTES", minutes));
            }
            config.solve.max_reschedule = Some(chrono::Duration::minutes(minutes));
        }
        if let Some(minutes) = parse::<i64, _>(&lookup, "ROUTE_PLANNER_LATE_TOLERANCE_MINUTES")? {
            if minutes < 0 {
                return Err(invalid("ROUTE_PLANNER_LATE_TOLERANCE_MINUTES", minutes));
            }
            config.solve.late_tolerance = chrono::Duration::minutes(minutes);
        }
        if let Some(speed) = parse::<f64, _>(&lookup, "ROUTE_PLANNER_ESTIMATE_SPEED_KMH")? {
            if !(speed.is_finite() && speed > 0.0) {
                return Err(invalid("ROUTE_PLANNER_ESTIMATE_SPEED_KMH", speed));
            }
            config.estimator = HaversineEstimator::new(speed);
        }

        if let Some(base_url) = lookup("OSRM_URL").filter(|url| !url.trim().is_empty()) {
            let mut osrm = OsrmConfig {
                base_url,
                timeout_secs: config.matrix.provider_timeout.as_secs(),
                ..OsrmConfig::default()
            };
            if let Some(profile) = lookup("OSRM_PROFILE") {
                osrm.profile = profile;
            }
            config.osrm = Some(osrm);
        }

        Ok(config)
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, raw)),
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
