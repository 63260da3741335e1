use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no sink connected, tracking disabled")]
    NotConnected,
}
