//! Transporte de barramento I2C
//!
//! O núcleo consome apenas o conjunto mínimo de operações endereçadas
//! descrito por [`BusTransport`]. Qualquer implementação `embedded-hal` 1.0
//! pode ser usada através do adaptador [`HalBus`].

use embedded_hal::i2c::{ErrorKind, I2c, NoAcknowledgeSource};
use thiserror::Error;

/// Endereço de 7 bits no barramento
pub type Address = u8;

/// Maior endereço válido no espaço de 7 bits
pub const MAX_ADDRESS: Address = 0x7F;

/// Erros de transporte
///
/// Nenhum deles é repetido automaticamente: o erro sobe até quem chamou
/// `measure`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("device not present at {addr:#04x}")]
    NotPresent { addr: Address },

    #[error("NACK from device {addr:#04x}")]
    Nack { addr: Address },

    #[error("timeout talking to {addr:#04x}")]
    Timeout { addr: Address },

    #[error("short read from {addr:#04x}: expected {expected} bytes, got {got}")]
    ShortRead {
        addr: Address,
        expected: usize,
        got: usize,
    },

    #[error("transport failure at {addr:#04x}: {message}")]
    Transport { addr: Address, message: String },
}

pub type BusResult<T> = Result<T, BusError>;

/// Operações endereçadas byte/registrador sobre o barramento
///
/// Todas podem bloquear durante a transação física.
pub trait BusTransport {
    fn read_byte(&mut self, addr: Address) -> BusResult<u8>;

    fn write_byte(&mut self, addr: Address, value: u8) -> BusResult<()>;

    fn read_register(&mut self, addr: Address, reg: u8) -> BusResult<u8>;

    fn write_register(&mut self, addr: Address, reg: u8, value: u8) -> BusResult<()>;

    /// Lê `length` bytes consecutivos a partir de `reg`
    fn read_block(&mut self, addr: Address, reg: u8, length: usize) -> BusResult<Vec<u8>>;
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn read_byte(&mut self, addr: Address) -> BusResult<u8> {
        (**self).read_byte(addr)
    }

    fn write_byte(&mut self, addr: Address, value: u8) -> BusResult<()> {
        (**self).write_byte(addr, value)
    }

    fn read_register(&mut self, addr: Address, reg: u8) -> BusResult<u8> {
        (**self).read_register(addr, reg)
    }

    fn write_register(&mut self, addr: Address, reg: u8, value: u8) -> BusResult<()> {
        (**self).write_register(addr, reg, value)
    }

    fn read_block(&mut self, addr: Address, reg: u8, length: usize) -> BusResult<Vec<u8>> {
        (**self).read_block(addr, reg, length)
    }
}

/// Transporte boxed entregue pelo registro de drivers
pub type BoxedBus = Box<dyn BusTransport + Send>;

/// Adaptador de qualquer controlador `embedded_hal::i2c::I2c`
#[derive(Debug)]
pub struct HalBus<I> {
    i2c: I,
}

impl<I: I2c> HalBus<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Devolve o controlador subjacente
    pub fn into_inner(self) -> I {
        self.i2c
    }
}

/// Abre `/dev/i2c-<bus>` via `linux-embedded-hal`
#[cfg(feature = "linux-hal")]
pub fn open_linux_bus(bus: u8) -> BusResult<BoxedBus> {
    let path = format!("/dev/i2c-{}", bus);
    let dev = linux_embedded_hal::I2cdev::new(&path).map_err(|e| BusError::Transport {
        addr: 0,
        message: format!("cannot open {}: {}", path, e),
    })?;
    Ok(Box::new(HalBus::new(dev)))
}

fn map_hal_error<E: embedded_hal::i2c::Error>(addr: Address, err: E) -> BusError {
    match err.kind() {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => BusError::NotPresent { addr },
        ErrorKind::NoAcknowledge(_) => BusError::Nack { addr },
        other => BusError::Transport {
            addr,
            message: format!("{other:?}: {err:?}"),
        },
    }
}

impl<I: I2c> BusTransport for HalBus<I> {
    fn read_byte(&mut self, addr: Address) -> BusResult<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .read(addr, &mut buf)
            .map_err(|e| map_hal_error(addr, e))?;
        Ok(buf[0])
    }

    fn write_byte(&mut self, addr: Address, value: u8) -> BusResult<()> {
        self.i2c
            .write(addr, &[value])
            .map_err(|e| map_hal_error(addr, e))
    }

    fn read_register(&mut self, addr: Address, reg: u8) -> BusResult<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(addr, &[reg], &mut buf)
            .map_err(|e| map_hal_error(addr, e))?;
        Ok(buf[0])
    }

    fn write_register(&mut self, addr: Address, reg: u8, value: u8) -> BusResult<()> {
        self.i2c
            .write(addr, &[reg, value])
            .map_err(|e| map_hal_error(addr, e))
    }

    fn read_block(&mut self, addr: Address, reg: u8, length: usize) -> BusResult<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.i2c
            .write_read(addr, &[reg], &mut buf)
            .map_err(|e| map_hal_error(addr, e))?;
        Ok(buf)
    }
}
