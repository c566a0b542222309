//! # sen-core — aquisição de sensores I2C
//!
//! Drivers para sensores ambientais ligados ao barramento I2C, com o
//! pipeline completo de calibração e compensação, mais o loop periódico
//! que entrega cada medição a vários sinks independentes.
//!
//! ## Arquitetura
//!
//! ```text
//! BusTransport → SensorDriver ─┬─ Calibration (uma vez, na construção)
//!                              └─ Compensation (a cada medição)
//!                                    ↓
//!                              Scheduler → FanOut → [PrintSink, BroadcastSink, PublishSink, ...]
//! ```
//!
//! - **Compensação**: a temperatura produz um [`compensation::TFine`] que
//!   pressão e umidade exigem como argumento; usar o valor de outra
//!   amostra é erro.
//! - **Isolamento**: falha de um sink nunca impede a entrega aos outros
//!   nem para o scheduler.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use sen_core::prelude::*;
//!
//! # fn main() -> Result<(), SenError> {
//! let registry = DriverRegistry::with_builtin();
//! let entry = registry.resolve("mock-sensor")?;
//! assert_eq!(entry.descriptor.default_address, 0x00);
//!
//! let mut sensor = MockSensor::new();
//! let measurement = sensor.measure()?;
//! assert_eq!(measurement.get(Quantity::Temperature), Some(28.5));
//!
//! let config = SchedulerConfig::from_secs(0.5, Some(1))?;
//! let mut scheduler = Scheduler::new(sensor, FanOut::new(), config);
//! assert!(scheduler.run_cycle().is_delivered());
//! # Ok(())
//! # }
//! ```
//!
//! ## Módulos
//!
//! - [`bus`] - Transporte I2C e adaptador `embedded-hal`
//! - [`calibration`] - Decodificação dos blocos de calibração
//! - [`compensation`] - Fórmulas de compensação
//! - [`drivers`] - Variantes de sensor
//! - [`registry`] - Resolução de driver por nome
//! - [`scheduler`] - Loop de aquisição
//! - [`sink`] - Fan-out e sinks embutidos
//! - [`format`] - Relatórios txt/json/xml

pub mod bus;
pub mod calibration;
pub mod compensation;
pub mod config;
pub mod drivers;
pub mod error;
pub mod format;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod types;

pub use bus::{Address, BoxedBus, BusError, BusResult, BusTransport, HalBus, MAX_ADDRESS};
#[cfg(feature = "linux-hal")]
pub use bus::open_linux_bus;
pub use calibration::{Bme280Calibration, Bmp180Calibration, CalibrationSet};
pub use compensation::{CompensationError, CompensationState, RawSample, TFine};
pub use config::{AcquisitionConfig, CycleCount, SchedulerConfig, parse_address};
pub use drivers::{Bme280, Bme280Settings, Bmp180, MockSensor, Oversampling, SensorDriver, Si7021};
pub use error::{SenError, SenResult};
pub use format::{OutputFormat, Report};
pub use registry::{DriverEntry, DriverRegistry};
pub use scheduler::{CycleOutcome, Scheduler, SchedulerState, SchedulerStats, StopHandle};
pub use sink::{
    BroadcastHandle, BroadcastSink, CycleFailure, DeliveryReport, FanOut, PrintSink,
    PublishMessage, PublishSink, Publisher, Sink, SinkError, SinkResult,
};
pub use types::{Measurement, Quantity, SensorDescriptor};

/// Importações usuais
pub mod prelude {
    pub use crate::bus::{Address, BusTransport};
    pub use crate::config::{AcquisitionConfig, CycleCount, SchedulerConfig};
    pub use crate::drivers::{MockSensor, SensorDriver};
    pub use crate::error::{SenError, SenResult};
    pub use crate::registry::DriverRegistry;
    pub use crate::scheduler::{Scheduler, StopHandle};
    pub use crate::sink::{FanOut, Sink};
    pub use crate::types::{Measurement, Quantity};
}

#[cfg(test)]
mod tests;
