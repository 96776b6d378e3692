//! The peer's own narrow camera interface (§1): `Capture(dir, name) → path | error`.
//! No real `picamera2` equivalent is available here; `NullCamera` stands in
//! for it the same way the coordinator's driver seam does.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::PeerError;

#[async_trait]
pub trait CaptureDriver: Send + Sync {
    async fn capture(&self, dir: &std::path::Path, name: &str) -> Result<PathBuf, PeerError>;
}

pub struct NullCamera;

#[async_trait]
impl CaptureDriver for NullCamera {
    async fn capture(&self, dir: &std::path::Path, name: &str) -> Result<PathBuf, PeerError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, []).await?;
        Ok(path)
    }
}
