use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::credentials::{CredentialCache, CredentialError};
use crate::location::PositionSample;

use super::error::SinkError;

const STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Record shape of the managed store.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LocationRecord {
    pub id: String,
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    data: Vec<LocationRecord>,
}

/// Managed record store client: one create per tick, plus the list call that
/// feeds the history view.
pub struct RecordStore {
    http: reqwest::Client,
    endpoint: String,
    credentials: Arc<CredentialCache>,
}

impl RecordStore {
    pub fn new(endpoint: String, credentials: Arc<CredentialCache>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(STORE_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            endpoint,
            credentials,
        }
    }

    fn records_url(&self) -> String {
        format!("{}/records", self.endpoint.trim_end_matches('/'))
    }

    pub async fn create(&self, sample: &PositionSample) -> Result<LocationRecord, SinkError> {
        let token = self.credentials.bearer().await?;

        let response = self
            .http
            .post(self.records_url())
            .bearer_auth(token)
            .json(sample)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SinkError::Auth(CredentialError::Denied))
            }
            status if !status.is_success() => {
                return Err(SinkError::Rejected {
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let record: LocationRecord = response
            .json()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        log::debug!("stored record {} for {}", record.id, record.user_id);
        Ok(record)
    }

    /// Fetch the user's records, newest first.
    ///
    /// The store does not sort for us; ordering is applied here.
    pub async fn list(&self, user_id: &str) -> Result<Vec<LocationRecord>, SinkError> {
        let token = self.credentials.bearer().await?;

        let response = self
            .http
            .get(self.records_url())
            .bearer_auth(token)
            .query(&[("user_id", user_id)])
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SinkError::Auth(CredentialError::Denied))
            }
            status if !status.is_success() => {
                return Err(SinkError::Rejected {
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let listed: ListResponse = response
            .json()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let mut records = listed.data;
        sort_newest_first(&mut records);
        Ok(records)
    }
}

fn sort_newest_first(records: &mut [LocationRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, hour: u32) -> LocationRecord {
        LocationRecord {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
            accuracy: None,
        }
    }

    #[test]
    fn history_sorts_newest_first() {
        let mut records = vec![record("a", 8), record("b", 12), record("c", 10)];
        sort_newest_first(&mut records);

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn list_response_unwraps_data_envelope() {
        let json = r#"{
            "data": [{
                "id": "rec-1",
                "user_id": "user-1",
                "latitude": 37.422,
                "longitude": -122.084,
                "timestamp": "2024-05-01T12:00:00Z",
                "accuracy": 5.0
            }]
        }"#;

        let listed: ListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(listed.data.len(), 1);
        assert_eq!(listed.data[0].id, "rec-1");
        assert_eq!(listed.data[0].accuracy, Some(5.0));
    }
}
