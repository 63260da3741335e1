use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("identity token missing: {0}")]
    MissingToken(String),
    #[error("credential exchange failed: {0}")]
    Exchange(String),
    #[error("credential exchange denied")]
    Denied,
    #[error("scoped credentials expired")]
    #[allow(dead_code)]
    Expired,
}
