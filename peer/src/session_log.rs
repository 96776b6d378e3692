//! Per-session JSON log (§6): `{camera, start_time, end_time, photos: [...],
//! failures: [...]}`, one file per session directory. Same read-modify-rewrite
//! idiom as `coordinator::imu_log`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const LOG_FILENAME: &str = "session_log.json";

#[derive(Debug, Serialize, Deserialize)]
struct PhotoEntry {
    index: u32,
    path: String,
    timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FailureEntry {
    index: u32,
    reason: String,
    timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionLogDoc {
    camera: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    photos: Vec<PhotoEntry>,
    #[serde(default)]
    failures: Vec<FailureEntry>,
}

pub struct SessionLog {
    write_lock: Mutex<()>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self { write_lock: Mutex::new(()) }
    }

    pub async fn record_photo(
        &self,
        session_dir: &Path,
        camera: &str,
        index: u32,
        path: &str,
        timestamp: &str,
    ) -> std::io::Result<()> {
        self.update(session_dir, camera, timestamp, |doc| {
            doc.photos.push(PhotoEntry { index, path: path.to_string(), timestamp: timestamp.to_string() });
        })
        .await
    }

    pub async fn record_failure(
        &self,
        session_dir: &Path,
        camera: &str,
        index: u32,
        reason: &str,
        timestamp: &str,
    ) -> std::io::Result<()> {
        self.update(session_dir, camera, timestamp, |doc| {
            doc.failures.push(FailureEntry { index, reason: reason.to_string(), timestamp: timestamp.to_string() });
        })
        .await
    }

    async fn update(
        &self,
        session_dir: &Path,
        camera: &str,
        timestamp: &str,
        mutate: impl FnOnce(&mut SessionLogDoc),
    ) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = log_path(session_dir);

        let mut doc = match tokio::fs::read_to_string(&path).await {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|_| new_doc(camera, timestamp)),
            Err(_) => new_doc(camera, timestamp),
        };
        doc.end_time = timestamp.to_string();
        mutate(&mut doc);

        tokio::fs::create_dir_all(session_dir).await?;
        let json = serde_json::to_string_pretty(&doc)?;
        tokio::fs::write(&path, json).await
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

fn new_doc(camera: &str, timestamp: &str) -> SessionLogDoc {
    SessionLogDoc {
        camera: camera.to_string(),
        start_time: timestamp.to_string(),
        end_time: timestamp.to_string(),
        photos: Vec::new(),
        failures: Vec::new(),
    }
}

fn log_path(session_dir: &Path) -> PathBuf {
    session_dir.join(LOG_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_photos_and_failures_in_one_doc() {
        let dir = std::env::temp_dir().join(format!("helmet-session-log-test-{}", std::process::id()));
        let log = SessionLog::new();

        log.record_photo(&dir, "cam1", 1, "cam1_120000_000001.jpg", "t1").await.unwrap();
        log.record_failure(&dir, "cam1", 2, "capture failed", "t2").await.unwrap();

        let data = tokio::fs::read_to_string(log_path(&dir)).await.unwrap();
        let doc: SessionLogDoc = serde_json::from_str(&data).unwrap();
        assert_eq!(doc.photos.len(), 1);
        assert_eq!(doc.failures.len(), 1);
        assert_eq!(doc.start_time, "t1");
        assert_eq!(doc.end_time, "t2");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
