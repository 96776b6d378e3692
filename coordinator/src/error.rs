use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("bus not connected")]
    NotConnected,
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
