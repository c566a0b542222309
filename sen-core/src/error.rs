//! Erros do núcleo de aquisição

use thiserror::Error;

use crate::bus::BusError;
use crate::compensation::CompensationError;
use crate::sink::SinkError;
use crate::types::Quantity;

pub type SenResult<T> = Result<T, SenError>;

/// Erros do módulo senlib
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SenError {
    /// Falha de transporte no barramento (não é repetida automaticamente)
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// Falha fatal durante a construção do driver
    #[error("Driver initialization failed ({driver}): {reason}")]
    DriverInit {
        driver: &'static str,
        reason: String,
    },

    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Ordem de compensação violada ou divisor degenerado
    #[error("Compensation error: {0}")]
    Compensation(#[from] CompensationError),

    /// Falha isolada de um sink (nunca interrompe o scheduler)
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Grandeza não exposta pela variante do driver
    #[error("Unsupported quantity: {0}")]
    Unsupported(Quantity),

    /// A tarefa de medição terminou sem resultado (pânico no driver)
    #[error("Acquisition task failed: {0}")]
    Task(String),

    #[error("Scheduler already stopped")]
    SchedulerStopped,
}

impl SenError {
    /// Cria erro de inicialização a partir de qualquer causa
    pub fn driver_init(driver: &'static str, reason: impl std::fmt::Display) -> Self {
        SenError::DriverInit {
            driver,
            reason: reason.to_string(),
        }
    }

    /// Erros por ciclo: o scheduler registra e segue para o próximo intervalo
    pub fn is_cycle_error(&self) -> bool {
        matches!(self, SenError::Bus(_) | SenError::Compensation(_))
    }
}
