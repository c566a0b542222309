//! Sink de publicação (contrato para clientes MQTT)
//!
//! O sink só serializa e enfileira; `publish_worker` drena a fila numa
//! task separada e chama o [`Publisher`].

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::sink::{Sink, SinkError, SinkResult};
use crate::types::Measurement;

pub const DEFAULT_QUEUE: usize = 32;

/// Mensagem pronta para publicação
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMessage {
    pub topic: String,
    /// Medição em JSON
    pub payload: String,
}

/// Cliente de publicação (ex.: MQTT)
pub trait Publisher: Send {
    fn publish(&mut self, message: &PublishMessage)
    -> impl Future<Output = SinkResult<()>> + Send;
}

/// Tópico padrão para um driver
pub fn default_topic(driver_name: &str) -> String {
    format!("sensor/{}", driver_name)
}

#[derive(Debug)]
pub struct PublishSink {
    topic: String,
    queue: mpsc::Sender<PublishMessage>,
}

impl PublishSink {
    /// Cria o sink e o receptor a ser entregue ao `publish_worker`
    pub fn new(topic: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<PublishMessage>) {
        let (queue, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                topic: topic.into(),
                queue,
            },
            rx,
        )
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Sink for PublishSink {
    fn name(&self) -> &str {
        "publish"
    }

    fn consume(&mut self, measurement: &Measurement) -> SinkResult<()> {
        let payload = measurement.to_json().map_err(|e| SinkError::Serialization {
            sink: "publish".into(),
            message: e.to_string(),
        })?;
        let message = PublishMessage {
            topic: self.topic.clone(),
            payload,
        };
        self.queue.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Backpressure {
                sink: "publish".into(),
            },
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed {
                sink: "publish".into(),
            },
        })
    }
}

/// Contagem do que o worker publicou
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub failed: u64,
}

/// Drena a fila até o sink ser descartado
pub async fn publish_worker<P: Publisher>(
    mut rx: mpsc::Receiver<PublishMessage>,
    mut publisher: P,
) -> PublishStats {
    let mut stats = PublishStats::default();
    while let Some(message) = rx.recv().await {
        match publisher.publish(&message).await {
            Ok(()) => {
                stats.published += 1;
                debug!(topic = %message.topic, "measurement published");
            }
            Err(e) => {
                stats.failed += 1;
                warn!(topic = %message.topic, error = %e, "publish failed");
            }
        }
    }
    info!(
        published = stats.published,
        failed = stats.failed,
        "publish worker finished"
    );
    stats
}
