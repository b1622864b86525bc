//! OSRM HTTP adapter for travel times.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ProviderError;
use crate::model::Coordinate;
use crate::traits::{TravelLeg, TravelTimeProvider};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, origin: Coordinate, destination: Coordinate) -> String {
        let coords = [origin, destination]
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=duration",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords
        )
    }
}

#[async_trait]
impl TravelTimeProvider for OsrmClient {
    async fn travel_time(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<TravelLeg, ProviderError> {
        let url = self.table_url(origin, destination);
        debug!("Requesting OSRM table: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }
        let body: OsrmTableResponse = response.json().await?;

        if body.code != "Ok" {
            return Err(match body.code.as_str() {
                "NoRoute" | "NoSegment" => ProviderError::NoRoute,
                other => ProviderError::InvalidResponse(format!("code {}", other)),
            });
        }

        let durations = body
            .durations
            .ok_or_else(|| ProviderError::InvalidResponse("missing durations".to_string()))?;
        let cell = |i: usize, j: usize| durations.get(i).and_then(|row| row.get(j)).copied().flatten();

        let forward = cell(0, 1).ok_or(ProviderError::NoRoute)?;
        let backward = cell(1, 0);

        Ok(TravelLeg {
            minutes: forward / 60.0,
            return_minutes: backward.map(|seconds| seconds / 60.0),
        })
    }

    fn name(&self) -> &str {
        "osrm"
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_uses_lng_lat_order() {
        let client = OsrmClient::new(OsrmConfig {
            base_url: "http://osrm:5000/".to_string(),
            ..OsrmConfig::default()
        })
        .unwrap();

        let url = client.table_url(Coordinate::new(36.1, -115.2), Coordinate::new(36.3, -115.4));
        assert_eq!(
            url,
            "http://osrm:5000/table/v1/car/-115.200000,36.100000;-115.400000,36.300000?annotations=duration"
        );
    }

    #[test]
    fn test_parses_null_cells() {
        let body: OsrmTableResponse =
            serde_json::from_str(r#"{"code":"Ok","durations":[[0,null],[12.5,0]]}"#).unwrap();
        let durations = body.durations.unwrap();
        assert_eq!(durations[0][1], None);
        assert_eq!(durations[1][0], Some(12.5));
    }
}
