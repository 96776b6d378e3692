use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("session directory error: {0}")]
    SessionDirError(#[from] std::io::Error),
}
