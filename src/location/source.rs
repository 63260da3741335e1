use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use super::error::LocationError;
use super::sample::PositionSample;

/// One-shot position query.
///
/// A failed sample is a per-tick condition for the caller, never a reason to
/// tear the session down.
pub trait LocationSource: Send + Sync {
    fn sample(&self) -> impl Future<Output = Result<PositionSample, LocationError>> + Send;
}

/// Fix payload returned by a device agent.
///
/// Our own type; only the fields the session consumes.
#[derive(Debug, Deserialize)]
struct AgentFix {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    accuracy: Option<f64>,
}

/// Queries a device-local positioning agent over HTTP.
///
/// Uses a reusable `reqwest::Client` with the query timeout baked in, so a
/// hung agent resolves as `LocationError::Timeout` rather than stalling the
/// caller.
pub struct AgentSource {
    http: reqwest::Client,
    url: String,
    high_accuracy: bool,
}

impl AgentSource {
    pub fn new(url: String, timeout: Duration, high_accuracy: bool) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            url,
            high_accuracy,
        }
    }
}

impl LocationSource for AgentSource {
    async fn sample(&self) -> Result<PositionSample, LocationError> {
        let response = self
            .http
            .get(&self.url)
            .query(&[("high_accuracy", self.high_accuracy)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LocationError::Timeout
                } else {
                    LocationError::Unavailable(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                return Err(LocationError::PermissionDenied)
            }
            status if !status.is_success() => {
                return Err(LocationError::Unavailable(format!(
                    "agent returned {}",
                    status
                )))
            }
            _ => {}
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                LocationError::Timeout
            } else {
                LocationError::Unavailable(e.to_string())
            }
        })?;

        let fix: AgentFix =
            serde_json::from_slice(&bytes).map_err(|e| LocationError::Malformed(e.to_string()))?;

        log::debug!(
            "agent fix lat={} lon={} accuracy={:?}",
            fix.latitude,
            fix.longitude,
            fix.accuracy
        );

        Ok(PositionSample::now(fix.latitude, fix.longitude, fix.accuracy))
    }
}

/// Parse a `"lat, lon"` coordinate pair.
pub fn parse_coordinates(coordinates: &str) -> Option<(f64, f64)> {
    let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
    if parts.len() < 2 {
        return None;
    }
    let lat = parts[0].parse().ok()?;
    let lon = parts[1].parse().ok()?;
    Some((lat, lon))
}

/// Fixed-coordinate source for demos and config validation.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource {
    latitude: f64,
    longitude: f64,
}

impl Default for FixedSource {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

impl FixedSource {
    pub fn from_coordinates(coordinates: &str) -> Option<Self> {
        let (latitude, longitude) = parse_coordinates(coordinates)?;
        Some(Self {
            latitude,
            longitude,
        })
    }
}

impl LocationSource for FixedSource {
    async fn sample(&self) -> Result<PositionSample, LocationError> {
        Ok(PositionSample::now(self.latitude, self.longitude, None))
    }
}

/// Runtime-selected source variant.
pub enum Source {
    Agent(AgentSource),
    Fixed(FixedSource),
}

impl LocationSource for Source {
    async fn sample(&self) -> Result<PositionSample, LocationError> {
        match self {
            Source::Agent(agent) => agent.sample().await,
            Source::Fixed(fixed) => fixed.sample().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lat_lon_pair() {
        let (lat, lon) = parse_coordinates("37.422, -122.084").unwrap();
        assert!((lat - 37.422).abs() < 1e-9);
        assert!((lon - (-122.084)).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_coordinates() {
        assert!(parse_coordinates("37.422").is_none());
        assert!(parse_coordinates("north, west").is_none());
        assert!(parse_coordinates("").is_none());
    }

    #[tokio::test]
    async fn fixed_source_samples_configured_point() {
        let source = FixedSource::from_coordinates("52.5200, 13.4050").unwrap();
        let sample = source.sample().await.unwrap();
        assert!((sample.latitude - 52.52).abs() < 1e-9);
        assert!((sample.longitude - 13.405).abs() < 1e-9);
        assert_eq!(sample.accuracy, None);
        assert_eq!(sample.user_id, None);
    }

    #[test]
    fn agent_fix_deserializes_without_accuracy() {
        let fix: AgentFix =
            serde_json::from_str(r#"{"latitude": 37.422, "longitude": -122.084}"#).unwrap();
        assert!((fix.latitude - 37.422).abs() < 1e-9);
        assert_eq!(fix.accuracy, None);
    }
}
