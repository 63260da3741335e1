use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Deployment-provided outputs artifact.
///
/// Written by the backend deployment, read verbatim at startup; this code
/// never generates or mutates it.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentOutputs {
    pub auth: AuthOutputs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthOutputs {
    pub region: String,
    pub identity_pool_id: String,
    pub user_pool_id: String,
    pub credential_endpoint: String,
}

impl DeploymentOutputs {
    pub fn from_file(path: &Path) -> Result<Self, OutputsError> {
        let content = std::fs::read_to_string(path)?;
        let outputs: DeploymentOutputs = serde_json::from_str(&content)?;
        Ok(outputs)
    }
}
