use thiserror::Error;

use crate::credentials::CredentialError;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("credentials unavailable: {0}")]
    Auth(#[from] CredentialError),
    #[error("sink rejected the call with status {status}")]
    Rejected { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
