//! Append-only per-session IMU log (§6): `{command_id, timestamp, imu_data}`
//! entries in a JSON array. Read-modify-rewrite over a single JSON file, no
//! hash chaining or tamper evidence — nothing here calls for it.

use std::path::PathBuf;

use helmet_protocol::{CommandId, MasterImu};
use serde::Serialize;
use tokio::sync::Mutex;

#[derive(Serialize)]
struct ImuLogEntry<'a> {
    command_id: CommandId,
    timestamp: String,
    imu_data: &'a MasterImu,
}

pub struct ImuLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ImuLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path, write_lock: Mutex::new(()) }
    }

    pub async fn append(&self, command_id: CommandId, timestamp: String, imu: &MasterImu) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries: Vec<serde_json::Value> = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => serde_json::from_str(&data).unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        let entry = ImuLogEntry { command_id, timestamp, imu_data: imu };
        entries.push(serde_json::to_value(&entry).unwrap_or_default());

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&self.path, json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmet_protocol::ImuSnapshot;

    #[tokio::test]
    async fn appends_grow_the_array() {
        let dir = std::env::temp_dir().join(format!("helmet-imu-log-test-{}", std::process::id()));
        let path = dir.join("master_imu_data.json");
        let log = ImuLog::new(path.clone());

        let snapshot = MasterImu::Snapshot(ImuSnapshot {
            available: true,
            temperature_c: 21.0,
            acceleration_m_s2: Default::default(),
            gyro_rad_s: Default::default(),
            magnetic_ut: Default::default(),
            linear_acceleration_m_s2: Default::default(),
            gravity_m_s2: Default::default(),
            euler_deg: Default::default(),
            quaternion: Default::default(),
            calibration: Default::default(),
            t_wall_ns: 0,
        });

        log.append(1, "2026-01-01T00:00:00Z".into(), &snapshot).await.unwrap();
        log.append(2, "2026-01-01T00:00:01Z".into(), &snapshot).await.unwrap();

        let data = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&data).unwrap();
        assert_eq!(parsed.len(), 2);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
