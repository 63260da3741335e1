use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One geolocation fix, as it goes over the wire to the sink.
///
/// Optional fields are omitted from the JSON encoding when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl PositionSample {
    /// Stamp a fresh sample at the current wall-clock time.
    pub fn now(latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: Utc::now(),
            accuracy,
            user_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn json_round_trips_field_values() {
        let sample = PositionSample {
            latitude: 37.422,
            longitude: -122.084,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            accuracy: Some(5.0),
            user_id: None,
        };

        let encoded = serde_json::to_string(&sample).unwrap();
        let decoded: PositionSample = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded, sample);
        assert!((decoded.latitude - 37.422).abs() < 1e-9);
        assert!((decoded.longitude - (-122.084)).abs() < 1e-9);
        assert_eq!(decoded.accuracy, Some(5.0));
    }

    #[test]
    fn absent_optionals_are_omitted() {
        let sample = PositionSample {
            latitude: 0.0,
            longitude: 0.0,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            accuracy: None,
            user_id: None,
        };

        let encoded = serde_json::to_string(&sample).unwrap();
        assert!(!encoded.contains("accuracy"));
        assert!(!encoded.contains("user_id"));
    }

    #[test]
    fn timestamp_encodes_as_iso8601() {
        let sample = PositionSample {
            latitude: 1.0,
            longitude: 2.0,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            accuracy: None,
            user_id: Some("user-1".into()),
        };

        let encoded = serde_json::to_string(&sample).unwrap();
        assert!(encoded.contains("2024-05-01T12:00:00Z"));
        assert!(encoded.contains("\"user_id\":\"user-1\""));
    }
}
