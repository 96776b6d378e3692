//! Bus Client — MQTT connect/subscribe/publish, auto-reconnect via
//! `rumqttc`'s `EventLoop`. Mirrors `backend-rust/src/uwb_hub.rs`'s
//! bind-or-warn, never-crash-on-transport-error shape.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;

pub struct BusConfig {
    pub client_id: String,
    pub broker_host: String,
    pub broker_port: u16,
    pub keepalive_secs: u64,
    pub qos: u8,
    pub topic_commands: String,
    pub topic_responses: String,
}

fn to_qos(qos: u8) -> QoS {
    match qos {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

pub struct BusClient {
    client: AsyncClient,
    topic_commands: String,
    qos: QoS,
}

impl BusClient {
    /// Connects and returns the client plus its event loop. The caller
    /// spawns `run_event_loop` separately so inbound frames can be forwarded
    /// to the Response Processor over a channel.
    pub fn connect(cfg: &BusConfig) -> (Self, rumqttc::EventLoop) {
        let mut opts = MqttOptions::new(cfg.client_id.clone(), cfg.broker_host.clone(), cfg.broker_port);
        opts.set_keep_alive(Duration::from_secs(cfg.keepalive_secs));
        let (client, eventloop) = AsyncClient::new(opts, 256);
        let bus = Self {
            client,
            topic_commands: cfg.topic_commands.clone(),
            qos: to_qos(cfg.qos),
        };
        (bus, eventloop)
    }

    pub async fn subscribe_responses(&self, topic: &str, qos: u8) -> Result<(), rumqttc::ClientError> {
        self.client.subscribe(topic, to_qos(qos)).await
    }

    pub async fn publish_command(&self, payload: Vec<u8>) -> Result<(), rumqttc::ClientError> {
        self.client.publish(&self.topic_commands, self.qos, false, payload).await
    }
}

/// Drains the MQTT event loop forever, forwarding publish payloads to `tx`.
/// Never returns on error — logs and retries, per §7's "Workers never panic
/// out of their loop on recoverable errors."
pub async fn run_event_loop(mut eventloop: rumqttc::EventLoop, tx: mpsc::Sender<Vec<u8>>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if tx.send(publish.payload.to_vec()).await.is_err() {
                    tracing::warn!("bus: response channel closed, dropping frame");
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("bus eventloop error: {e}; retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
