use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use crate::credentials::{CredentialCache, CredentialError};
use crate::location::PositionSample;

use super::error::SinkError;
use super::PublishSink;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-user topic name. Isolation by naming convention only; the broker does
/// not enforce it.
pub fn topic_for(prefix: &str, user_id: &str) -> String {
    format!("{}/{}", prefix, user_id)
}

/// Publishes each sample as a JSON payload to a pub/sub topic endpoint.
pub struct TopicSink {
    http: reqwest::Client,
    endpoint: String,
    topic: String,
    credentials: Arc<CredentialCache>,
}

impl TopicSink {
    pub fn new(
        endpoint: String,
        topic_prefix: &str,
        user_id: &str,
        credentials: Arc<CredentialCache>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(PUBLISH_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            endpoint,
            topic: topic_for(topic_prefix, user_id),
            credentials,
        }
    }
}

impl PublishSink for TopicSink {
    async fn publish(&self, sample: &PositionSample) -> Result<(), SinkError> {
        let token = self.credentials.bearer().await?;
        let payload = serde_json::to_vec(sample)?;

        let url = format!(
            "{}/topics/{}",
            self.endpoint.trim_end_matches('/'),
            self.topic
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(SinkError::Auth(CredentialError::Denied))
            }
            status if !status.is_success() => Err(SinkError::Rejected {
                status: status.as_u16(),
            }),
            _ => {
                log::debug!("published sample to {}", self.topic);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_is_prefix_slash_user() {
        assert_eq!(
            topic_for("location", "eu-central-1:aa11bb22"),
            "location/eu-central-1:aa11bb22"
        );
    }
}
