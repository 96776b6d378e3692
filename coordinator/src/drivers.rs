//! Narrow interfaces to hardware the core treats as an external collaborator
//! (§1): the local camera, the inertial sensor, and the sync-line output.
//! No real camera/GPIO/IMU hardware is available in this crate, so each
//! trait gets a `Null*` stand-in implementation.

use std::path::PathBuf;

use async_trait::async_trait;
use helmet_protocol::ImuSnapshot;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("imu read failed: {0}")]
    ImuRead(String),
    #[error("sync line error: {0}")]
    SyncLine(String),
}

#[async_trait]
pub trait CaptureDriver: Send + Sync {
    /// Capture a photo into `dir/name`, returning the written path.
    async fn capture(&self, dir: &std::path::Path, name: &str) -> Result<PathBuf, DriverError>;
}

#[async_trait]
pub trait ImuDriver: Send + Sync {
    /// Blocking-style snapshot read. Returns `available: false` rather than
    /// erroring when the sensor is simply not present, per §3.
    async fn read(&self) -> Result<ImuSnapshot, DriverError>;
}

pub trait SyncLine: Send + Sync {
    fn set_high(&self) -> Result<(), DriverError>;
    fn set_low(&self) -> Result<(), DriverError>;
}

/// A pull-up, active-low input line (§1: `Read`/`WatchEdges`). Polled by the
/// Line-Edge trigger source rather than interrupt-driven, since no real GPIO
/// is available in this crate.
#[async_trait]
pub trait LineInput: Send + Sync {
    /// Returns the current logic level: `true` = high (idle), `false` = low (asserted).
    async fn read(&self) -> Result<bool, DriverError>;
}

/// Writes a zero-byte placeholder file instead of driving real camera hardware.
pub struct NullCamera;

#[async_trait]
impl CaptureDriver for NullCamera {
    async fn capture(&self, dir: &std::path::Path, name: &str) -> Result<PathBuf, DriverError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| DriverError::Capture(e.to_string()))?;
        let path = dir.join(name);
        tokio::fs::write(&path, [])
            .await
            .map_err(|e| DriverError::Capture(e.to_string()))?;
        Ok(path)
    }
}

/// Reports the sensor as unavailable, matching §3's `{available:false,error}` shape.
pub struct NullImu;

#[async_trait]
impl ImuDriver for NullImu {
    async fn read(&self) -> Result<ImuSnapshot, DriverError> {
        Ok(ImuSnapshot {
            available: false,
            temperature_c: 0.0,
            acceleration_m_s2: Default::default(),
            gyro_rad_s: Default::default(),
            magnetic_ut: Default::default(),
            linear_acceleration_m_s2: Default::default(),
            gravity_m_s2: Default::default(),
            euler_deg: Default::default(),
            quaternion: Default::default(),
            calibration: Default::default(),
            t_wall_ns: 0,
        })
    }
}

/// No-op sync line — logs at debug rather than driving a real GPIO pin.
pub struct NullSyncLine;

impl SyncLine for NullSyncLine {
    fn set_high(&self) -> Result<(), DriverError> {
        tracing::debug!("sync line: high (no hardware configured)");
        Ok(())
    }

    fn set_low(&self) -> Result<(), DriverError> {
        tracing::debug!("sync line: low (no hardware configured)");
        Ok(())
    }
}

/// Always reports idle (high) — never fires a trigger. Stands in for a real
/// input line the same way `NullImu` stands in for a real sensor.
pub struct NullLineInput;

#[async_trait]
impl LineInput for NullLineInput {
    async fn read(&self) -> Result<bool, DriverError> {
        Ok(true)
    }
}
