//! Coordinator configuration (§6/§6.1). Loaded from a JSON file with every
//! field defaulted, mirroring the original `ConfigLoader`'s fallback-to-
//! defaults behavior: a missing or corrupt file falls back to built-in
//! defaults rather than failing startup.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CaptureTriggersConfig {
    pub timer_enabled: bool,
    pub timer_interval_seconds: u64,
    pub imu_movement_enabled: bool,
    pub imu_movement_threshold: f64,
    pub imu_movement_cooldown_seconds: u64,
    pub gpio_pin20_enabled: bool,
    pub gpio_pin20_pin: u32,
}

impl Default for CaptureTriggersConfig {
    fn default() -> Self {
        Self {
            timer_enabled: true,
            timer_interval_seconds: 300,
            imu_movement_enabled: false,
            imu_movement_threshold: 2.0,
            imu_movement_cooldown_seconds: 30,
            gpio_pin20_enabled: false,
            gpio_pin20_pin: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub master_id: String,
    pub slaves: Vec<String>,
    pub broker_host: String,
    pub broker_port: u16,
    pub keepalive: u64,
    pub qos: u8,
    pub topic_commands: String,
    pub topic_responses: String,
    pub gpio_pin: u32,
    pub pulse_duration_ms: u64,
    pub pulse_interval_ms: u64,
    pub exposure_us: i64,
    pub timeout_ms: i64,
    pub photo_base_dir: PathBuf,
    pub cam_ordinal: u32,
    pub capture_triggers: CaptureTriggersConfig,
    pub polling_interval_seconds: u64,
    pub timeout_check_interval_seconds: u64,
    pub web_port: u16,
    pub log_dir: PathBuf,
    pub startup_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            master_id: "helmet-master".into(),
            slaves: Vec::new(),
            broker_host: "127.0.0.1".into(),
            broker_port: 1883,
            keepalive: 30,
            qos: 1,
            topic_commands: "helmet/commands".into(),
            topic_responses: "helmet/responses".into(),
            gpio_pin: 18,
            pulse_duration_ms: 50,
            pulse_interval_ms: 0,
            exposure_us: 10_000,
            timeout_ms: 1500,
            photo_base_dir: PathBuf::from("photos"),
            cam_ordinal: 0,
            capture_triggers: CaptureTriggersConfig::default(),
            polling_interval_seconds: 60,
            timeout_check_interval_seconds: 30,
            web_port: 8080,
            log_dir: PathBuf::from("logs"),
            startup_delay_ms: 0,
        }
    }
}

impl Config {
    /// Loads from `path`, falling back to defaults (with a warning) when the
    /// file is missing or fails to parse.
    pub async fn load(path: &std::path::Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("config at {path:?} is malformed ({e}), using defaults");
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("config at {path:?} not found ({e}), using defaults");
                Config::default()
            }
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "helmet-coordinator", about = "Helmet camera capture coordinator")]
pub struct Args {
    #[arg(long, default_value = "master_config.json")]
    pub config: PathBuf,

    #[arg(long)]
    pub broker_host: Option<String>,

    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    /// Applies CLI dev overrides on top of a loaded config.
    pub fn apply_overrides(&self, mut cfg: Config) -> Config {
        if let Some(host) = &self.broker_host {
            cfg.broker_host = host.clone();
        }
        if let Some(dir) = &self.log_dir {
            cfg.log_dir = dir.clone();
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("does-not-exist-helmet-config.json");
        let cfg = Config::load(&path).await;
        assert_eq!(cfg.master_id, "helmet-master");
        assert!(cfg.slaves.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("helmet-config-bad-{}.json", std::process::id()));
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let cfg = Config::load(&path).await;
        assert_eq!(cfg.web_port, 8080);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn valid_file_overrides_fields() {
        let path = std::env::temp_dir().join(format!("helmet-config-ok-{}.json", std::process::id()));
        tokio::fs::write(&path, br#"{"master_id":"m1","slaves":["p1","p2"]}"#)
            .await
            .unwrap();
        let cfg = Config::load(&path).await;
        assert_eq!(cfg.master_id, "m1");
        assert_eq!(cfg.slaves, vec!["p1".to_string(), "p2".to_string()]);
        let _ = tokio::fs::remove_file(&path).await;
    }
}
