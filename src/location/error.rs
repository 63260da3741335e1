use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("position access denied")]
    PermissionDenied,
    #[error("position query timed out")]
    Timeout,
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("malformed position response: {0}")]
    Malformed(String),
}
