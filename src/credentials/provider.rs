use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use super::error::CredentialError;
use super::outputs::AuthOutputs;

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Refresh this long before the reported expiry so an in-flight publish
/// never rides a token that lapses mid-call.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Short-lived scoped credentials returned by the credential service.
///
/// Opaque to the rest of the crate; only this module constructs or inspects
/// one.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopedCredentials {
    pub identity_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl ScopedCredentials {
    fn usable_at(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Exchanges a signed-in identity token for scoped credentials.
pub struct CredentialProvider {
    http: reqwest::Client,
    auth: AuthOutputs,
}

impl CredentialProvider {
    pub fn new(auth: AuthOutputs) -> Self {
        let http = reqwest::Client::builder()
            .timeout(EXCHANGE_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self { http, auth }
    }

    pub async fn exchange(
        &self,
        identity_token: &str,
    ) -> Result<ScopedCredentials, CredentialError> {
        let mut logins = HashMap::new();
        logins.insert(
            login_provider(&self.auth.region, &self.auth.user_pool_id),
            identity_token.to_string(),
        );

        let url = format!(
            "{}/identities/exchange",
            self.auth.credential_endpoint.trim_end_matches('/')
        );
        let body = json!({
            "identity_pool_id": self.auth.identity_pool_id,
            "logins": logins,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CredentialError::Exchange(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(CredentialError::Denied)
            }
            status if !status.is_success() => {
                return Err(CredentialError::Exchange(format!(
                    "credential service returned {}",
                    status
                )))
            }
            _ => {}
        }

        let credentials: ScopedCredentials = response
            .json()
            .await
            .map_err(|e| CredentialError::Exchange(e.to_string()))?;

        log::info!(
            "exchanged identity token for identity {} (expires {})",
            credentials.identity_id,
            credentials.expires_at
        );

        Ok(credentials)
    }
}

/// Login provider key for the exchange request, derived from the pool ids.
fn login_provider(region: &str, user_pool_id: &str) -> String {
    format!("idp.{}/{}", region, user_pool_id)
}

/// Read the deployment-provided identity token.
pub fn load_identity_token(path: &std::path::Path) -> Result<String, CredentialError> {
    let token = std::fs::read_to_string(path)
        .map_err(|e| CredentialError::MissingToken(e.to_string()))?;
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(CredentialError::MissingToken("token file is empty".into()));
    }
    Ok(token)
}

/// Current scoped credentials plus the means to replace them.
///
/// `bearer()` hands out the cached token and silently re-exchanges when the
/// cached handle is inside the expiry margin, so sink calls never need to
/// know about refresh.
pub struct CredentialCache {
    provider: CredentialProvider,
    identity_token: String,
    current: RwLock<Option<ScopedCredentials>>,
}

impl CredentialCache {
    pub fn new(provider: CredentialProvider, identity_token: String) -> Self {
        Self {
            provider,
            identity_token,
            current: RwLock::new(None),
        }
    }

    /// One-time exchange at startup. Returns the identity id the sink keys
    /// samples by.
    pub async fn initialize(&self) -> Result<String, CredentialError> {
        let credentials = self.provider.exchange(&self.identity_token).await?;
        let identity_id = credentials.identity_id.clone();
        *self.current.write().await = Some(credentials);
        Ok(identity_id)
    }

    /// Bearer token for a sink call, re-exchanged on expiry.
    pub async fn bearer(&self) -> Result<String, CredentialError> {
        {
            let guard = self.current.read().await;
            if let Some(credentials) = guard.as_ref() {
                if credentials.usable_at(Utc::now()) {
                    return Ok(credentials.token.clone());
                }
            }
        }

        log::debug!("scoped credentials missing or expiring, re-exchanging");
        let fresh = self.provider.exchange(&self.identity_token).await?;
        let token = fresh.token.clone();
        *self.current.write().await = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn login_provider_combines_pool_ids() {
        assert_eq!(
            login_provider("eu-central-1", "eu-central-1_beacon"),
            "idp.eu-central-1/eu-central-1_beacon"
        );
    }

    #[test]
    fn credentials_deserialize_from_exchange_response() {
        let json = r#"{
            "identity_id": "eu-central-1:aa11bb22",
            "token": "scoped-token",
            "expires_at": "2024-05-01T13:00:00Z"
        }"#;

        let credentials: ScopedCredentials = serde_json::from_str(json).unwrap();
        assert_eq!(credentials.identity_id, "eu-central-1:aa11bb22");
        assert_eq!(credentials.token, "scoped-token");
    }

    #[test]
    fn credentials_unusable_inside_expiry_margin() {
        let expires_at = Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap();
        let credentials = ScopedCredentials {
            identity_id: "id".into(),
            token: "tok".into(),
            expires_at,
        };

        let well_before = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let inside_margin = Utc.with_ymd_and_hms(2024, 5, 1, 12, 59, 30).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 1).unwrap();

        assert!(credentials.usable_at(well_before));
        assert!(!credentials.usable_at(inside_margin));
        assert!(!credentials.usable_at(after));
    }
}
