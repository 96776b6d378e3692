//! Peer-side MQTT client: subscribes to `topic_commands`, publishes to
//! `topic_responses`. Mirrors `coordinator::bus`'s connect/event-loop split.

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
    topic_responses: String,
    qos: QoS,
}

impl BusClient {
    pub fn connect(cfg: &BusConfig) -> (Self, rumqttc::EventLoop) {
        let mut opts = MqttOptions::new(cfg.client_id.clone(), cfg.broker_host.clone(), cfg.broker_port);
        opts.set_keep_alive(Duration::from_secs(cfg.keepalive_secs));
        let (client, eventloop) = AsyncClient::new(opts, 256);
        let bus = Self { client, topic_responses: cfg.topic_responses.clone(), qos: to_qos(cfg.qos) };
        (bus, eventloop)
    }

    pub async fn subscribe_commands(&self, topic: &str, qos: u8) -> Result<(), rumqttc::ClientError> {
        self.client.subscribe(topic, to_qos(qos)).await
    }

    pub async fn publish_response(&self, payload: Vec<u8>) -> Result<(), rumqttc::ClientError> {
        self.client.publish(&self.topic_responses, self.qos, false, payload).await
    }
}

/// Drains the MQTT event loop forever, forwarding publish payloads to `tx`.
pub async fn run_event_loop(mut eventloop: rumqttc::EventLoop, tx: mpsc::Sender<Vec<u8>>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if tx.send(publish.payload.to_vec()).await.is_err() {
                    tracing::warn!("bus: command channel closed, dropping frame");
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
