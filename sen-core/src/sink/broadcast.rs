//! Sink de difusão: stream para assinantes e último valor
//!
//! Usado pelo nó HTTP/WebSocket. A entrega nunca bloqueia: assinantes
//! lentos perdem mensagens (`RecvError::Lagged`) em vez de atrasar o
//! ciclo de aquisição.

use tokio::sync::{broadcast, watch};

use crate::sink::{Sink, SinkResult};
use crate::types::Measurement;

pub const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug)]
pub struct BroadcastSink {
    stream: broadcast::Sender<Measurement>,
    latest: watch::Sender<Option<Measurement>>,
}

/// Lado de leitura, clonável entre handlers
#[derive(Debug, Clone)]
pub struct BroadcastHandle {
    stream: broadcast::Sender<Measurement>,
    latest: watch::Receiver<Option<Measurement>>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> (Self, BroadcastHandle) {
        let (stream, _) = broadcast::channel(capacity.max(1));
        let (latest, latest_rx) = watch::channel(None);
        let handle = BroadcastHandle {
            stream: stream.clone(),
            latest: latest_rx,
        };
        (Self { stream, latest }, handle)
    }
}

impl Sink for BroadcastSink {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn consume(&mut self, measurement: &Measurement) -> SinkResult<()> {
        self.latest.send_replace(Some(measurement.clone()));
        // sem assinantes não é erro
        let _ = self.stream.send(measurement.clone());
        Ok(())
    }
}

impl BroadcastHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Measurement> {
        self.stream.subscribe()
    }

    /// Última medição entregue, se houver
    pub fn latest(&self) -> Option<Measurement> {
        self.latest.borrow().clone()
    }

    /// Receptor que acorda a cada nova medição
    pub fn watch(&self) -> watch::Receiver<Option<Measurement>> {
        self.latest.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.stream.receiver_count()
    }
}
