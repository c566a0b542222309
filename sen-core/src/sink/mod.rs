//! Sinks e fan-out de medições
//!
//! Cada sink recebe a medição por referência, em ordem de aquisição. A
//! falha de um sink é registrada no [`DeliveryReport`] e não impede a
//! entrega aos demais. Sinks com I/O de rede não bloqueiam: entregam a
//! um canal drenado por outra task.

pub mod broadcast;
pub mod print;
pub mod publish;

pub use broadcast::{BroadcastHandle, BroadcastSink};
pub use print::PrintSink;
pub use publish::{PublishMessage, PublishSink, PublishStats, Publisher, default_topic, publish_worker};

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::SenError;
use crate::types::Measurement;

/// Erros de sink
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("{sink}: write failed: {message}")]
    Io { sink: String, message: String },

    #[error("{sink}: serialization failed: {message}")]
    Serialization { sink: String, message: String },

    /// Fila cheia; a medição foi descartada para este sink
    #[error("{sink}: queue full, measurement dropped")]
    Backpressure { sink: String },

    #[error("{sink}: channel closed")]
    Closed { sink: String },
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Ciclo de aquisição que falhou
#[derive(Debug, Clone, PartialEq)]
pub struct CycleFailure {
    /// Número do ciclo (a partir de 1)
    pub cycle: u64,
    pub error: SenError,
}

/// Consumidor de medições
pub trait Sink: Send {
    fn name(&self) -> &str;

    fn consume(&mut self, measurement: &Measurement) -> SinkResult<()>;

    /// Notificação de ciclo com falha; ignorada por padrão
    fn cycle_failed(&mut self, _failure: &CycleFailure) -> SinkResult<()> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn consume(&mut self, measurement: &Measurement) -> SinkResult<()> {
        (**self).consume(measurement)
    }

    fn cycle_failed(&mut self, failure: &CycleFailure) -> SinkResult<()> {
        (**self).cycle_failed(failure)
    }
}

/// Resultado da entrega de uma medição a todos os sinks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReport {
    /// Sinks que aceitaram a medição
    pub delivered: usize,
    pub failures: Vec<SinkError>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.delivered + self.failures.len()
    }
}

/// Distribui cada medição a zero ou mais sinks independentes
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn Sink>>,
}

impl std::fmt::Debug for FanOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOut")
            .field("sinks", &self.names())
            .finish()
    }
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: adiciona um sink
    pub fn with_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.add(sink);
        self
    }

    pub fn add(&mut self, sink: impl Sink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Entrega a medição a cada sink, na ordem de registro
    pub fn deliver(&mut self, measurement: &Measurement) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for sink in &mut self.sinks {
            match sink.consume(measurement) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(sink = sink.name(), error = %e, "sink rejected measurement");
                    report.failures.push(e);
                }
            }
        }
        debug!(
            delivered = report.delivered,
            failed = report.failures.len(),
            "measurement fanned out"
        );
        report
    }

    /// Repassa um ciclo com falha a todos os sinks
    pub fn report_failure(&mut self, failure: &CycleFailure) -> Vec<SinkError> {
        let mut errors = Vec::new();
        for sink in &mut self.sinks {
            if let Err(e) = sink.cycle_failed(failure) {
                warn!(sink = sink.name(), error = %e, "sink failed to record cycle failure");
                errors.push(e);
            }
        }
        errors
    }
}
