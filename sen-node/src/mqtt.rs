//! Publicação das medições num broker MQTT
//!
//! O `AsyncClient` só enfileira pedidos; o `EventLoop` roda numa task
//! própria e reconecta sozinho após falhas de rede.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use sen_core::{PublishMessage, Publisher, SinkError, SinkResult};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Pedidos pendentes no cliente antes de `publish` esperar
const REQUEST_CAPACITY: usize = 16;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// [`Publisher`] sobre `rumqttc`, QoS 1 sem retain
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Cria o cliente e inicia o event loop
    ///
    /// A conexão é estabelecida no primeiro poll; falhas são registradas
    /// e repetidas a cada segundo.
    pub fn connect(host: &str, port: u16, client_id: &str) -> (Self, JoinHandle<()>) {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(KEEP_ALIVE);
        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let target = format!("{}:{}", host, port);
        let driver = tokio::spawn(drive(event_loop, target));
        (Self { client }, driver)
    }
}

async fn drive(mut event_loop: EventLoop, target: String) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("connected to MQTT broker {}", target);
            }
            Ok(event) => debug!(?event, "mqtt event"),
            Err(e) => {
                warn!(error = %e, "MQTT broker {} unreachable, retrying", target);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

impl Publisher for MqttPublisher {
    async fn publish(&mut self, message: &PublishMessage) -> SinkResult<()> {
        self.client
            .publish(
                message.topic.as_str(),
                QoS::AtLeastOnce,
                false,
                message.payload.as_bytes().to_vec(),
            )
            .await
            .map_err(|e| SinkError::Io {
                sink: "mqtt".into(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_fails_once_event_loop_is_gone() {
        let (mut publisher, event_loop) = MqttPublisher::connect("127.0.0.1", 1, "sennode-test");
        event_loop.abort();
        let _ = event_loop.await;

        let message = PublishMessage {
            topic: "sensor/bme280".into(),
            payload: "{}".into(),
        };
        match publisher.publish(&message).await {
            Err(SinkError::Io { sink, .. }) => assert_eq!(sink, "mqtt"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_queues_while_disconnected() {
        let (mut publisher, event_loop) = MqttPublisher::connect("127.0.0.1", 1, "sennode-test");
        let message = PublishMessage {
            topic: "sensor/si7021".into(),
            payload: "{\"temperature\":21.5}".into(),
        };
        publisher.publish(&message).await.unwrap();
        event_loop.abort();
    }
}
