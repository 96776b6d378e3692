//! Peer configuration (§6/§6.1). Same fallback-to-defaults loading idiom as
//! `coordinator::config`.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub client_id: String,
    pub cam_ordinal: u32,
    pub broker_host: String,
    pub broker_port: u16,
    pub keepalive: u64,
    pub qos: u8,
    pub topic_commands: String,
    pub topic_responses: String,
    pub photo_base_dir: PathBuf,
    pub session_inactivity_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: "helmet-cam1".into(),
            cam_ordinal: 1,
            broker_host: "127.0.0.1".into(),
            broker_port: 1883,
            keepalive: 30,
            qos: 1,
            topic_commands: "helmet/commands".into(),
            topic_responses: "helmet/responses".into(),
            photo_base_dir: PathBuf::from("photos"),
            session_inactivity_timeout_ms: 1_800_000,
        }
    }
}

impl Config {
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
#[command(name = "helmet-peer", about = "Helmet camera capture peer node")]
pub struct Args {
    #[arg(long, default_value = "peer_config.json")]
    pub config: PathBuf,

    #[arg(long)]
    pub broker_host: Option<String>,

    #[arg(long)]
    pub client_id: Option<String>,
}

impl Args {
    pub fn apply_overrides(&self, mut cfg: Config) -> Config {
        if let Some(host) = &self.broker_host {
            cfg.broker_host = host.clone();
        }
        if let Some(id) = &self.client_id {
            cfg.client_id = id.clone();
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("does-not-exist-helmet-peer-config.json");
        let cfg = Config::load(&path).await;
        assert_eq!(cfg.client_id, "helmet-cam1");
    }

    #[tokio::test]
    async fn malformed_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("helmet-peer-config-bad-{}.json", std::process::id()));
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let cfg = Config::load(&path).await;
        assert_eq!(cfg.broker_port, 1883);
        let _ = tokio::fs::remove_file(&path).await;
    }
}
