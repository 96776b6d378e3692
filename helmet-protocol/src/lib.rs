//! # helmet-protocol
//!
//! Shared wire types for the helmet-camera capture coordinator.
//!
//! These types are used by:
//! - `coordinator`: building `Command` envelopes and parsing `Response` envelopes
//! - `peer`: parsing inbound `Command`s and building `Response` envelopes
//!
//! ## Wire format
//! JSON, UTF-8, over the configured MQTT topics. Field names match the
//! envelope shapes exactly so producers and consumers never need a
//! translation layer.

use serde::{Deserialize, Serialize};

pub type PeerId = String;
pub type CommandId = u64;

// ── Command Kind ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Capture,
    Poll,
}

// ── Response Status ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
    Online,
    Timeout,
}

// ── IMU Snapshot ───────────────────────────────────────────────────────────────

/// 3-axis vector (units depend on the field it's attached to).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Triaxial {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Euler {
    pub heading: f64,
    pub roll: f64,
    pub pitch: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// BNO055-style calibration status, 0 (uncalibrated) to 3 (fully calibrated).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Calibration {
    pub system: u8,
    pub gyro: u8,
    pub accel: u8,
    pub mag: u8,
}

/// Fixed-shape inertial sensor snapshot, sampled once per capture tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImuSnapshot {
    pub available: bool,
    pub temperature_c: f64,
    pub acceleration_m_s2: Triaxial,
    pub gyro_rad_s: Triaxial,
    pub magnetic_ut: Triaxial,
    pub linear_acceleration_m_s2: Triaxial,
    pub gravity_m_s2: Triaxial,
    pub euler_deg: Euler,
    pub quaternion: Quaternion,
    pub calibration: Calibration,
    /// Wall-clock nanosecond stamp the snapshot was read at.
    pub t_wall_ns: i64,
}

impl ImuSnapshot {
    /// Magnitude of the raw acceleration vector, used by the Movement Detector.
    pub fn accel_magnitude(&self) -> f64 {
        let a = self.acceleration_m_s2;
        (a.x * a.x + a.y * a.y + a.z * a.z).sqrt()
    }
}

/// The `master_imu` field of a `Command`: either a full snapshot or an
/// unavailable marker with an error string. Order matters for untagged
/// deserialization — `Snapshot` is tried first since it requires more fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MasterImu {
    Snapshot(ImuSnapshot),
    Unavailable { available: bool, error: String },
}

impl MasterImu {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self::Unavailable { available: false, error: error.into() }
    }
}

// ── Command Envelope ───────────────────────────────────────────────────────────

/// Issuer → peer. `exposure_us`/`master_imu` are absent for `poll` commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub kind: CommandKind,
    pub t_issue_ns: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exposure_us: Option<i64>,
    pub timeout_ms: i64,
    #[serde(default)]
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub master_imu: Option<MasterImu>,
}

// ── Response Envelope ───────────────────────────────────────────────────────────

/// Peer → issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: CommandId,
    pub client: PeerId,
    pub status: ResponseStatus,
    pub started_ns: i64,
    pub finished_ns: i64,
    #[serde(default)]
    pub file: String,
    pub jitter_us: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub session_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub photos_in_session: Option<u32>,
    #[serde(default)]
    pub error: String,
}

/// `jitter_us = (local_start_ns - t_issue_ns) / 1000`. Sign is preserved —
/// negative means the peer's clock leads the master's. Callers treat this as
/// an opaque skew measure and never interpret the sign.
pub fn jitter_us(local_start_ns: i64, t_issue_ns: i64) -> i64 {
    (local_start_ns - t_issue_ns) / 1000
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trips() {
        let cmd = Command {
            id: 7,
            kind: CommandKind::Capture,
            t_issue_ns: 1_000_000_000,
            exposure_us: Some(500),
            timeout_ms: 1500,
            notes: "timer".into(),
            master_imu: Some(MasterImu::unavailable("no sensor")),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, cmd.id);
        assert_eq!(back.timeout_ms, cmd.timeout_ms);
    }

    #[test]
    fn response_status_serializes_lowercase() {
        let s = serde_json::to_string(&ResponseStatus::Timeout).unwrap();
        assert_eq!(s, "\"timeout\"");
    }

    #[test]
    fn jitter_preserves_sign() {
        assert_eq!(jitter_us(1_000_000, 1_500_000), -500);
        assert_eq!(jitter_us(2_000_000, 1_500_000), 500);
    }

    #[test]
    fn master_imu_untagged_picks_unavailable_for_minimal_payload() {
        let json = r#"{"available":false,"error":"no sensor"}"#;
        let imu: MasterImu = serde_json::from_str(json).unwrap();
        matches!(imu, MasterImu::Unavailable { .. });
    }
}
