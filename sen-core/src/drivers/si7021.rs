//! Driver do Silicon Labs Si7021 (temperatura e umidade)
//!
//! Sem bloco de calibração: o dispositivo entrega códigos já
//! linearizados, convertidos pelas fórmulas da seção 5 do datasheet.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::bus::{Address, BusTransport};
use crate::drivers::SensorDriver;
use crate::error::SenResult;
use crate::types::{Measurement, Quantity, SensorDescriptor};

pub const DESCRIPTOR: SensorDescriptor = SensorDescriptor {
    name: "si7021",
    default_address: 0x40,
    quantities: &[Quantity::Temperature, Quantity::Humidity],
    description: "Silicon Labs Si7021 humidity and temperature sensor",
};

/// Medição de umidade, no-hold master mode
const CMD_MEASURE_RH: u8 = 0xF5;
/// Medição de temperatura, no-hold master mode
const CMD_MEASURE_TEMP: u8 = 0xF3;

pub const DEFAULT_CONVERSION_DELAY: Duration = Duration::from_millis(50);

/// Código bruto → °C
pub fn temperature_from_code(code: u16) -> f64 {
    175.72 * code as f64 / 65536.0 - 46.85
}

/// Código bruto → %RH, limitado a [0, 100]
pub fn humidity_from_code(code: u16) -> f64 {
    (125.0 * code as f64 / 65536.0 - 6.0).clamp(0.0, 100.0)
}

#[derive(Debug)]
pub struct Si7021<B> {
    bus: B,
    addr: Address,
    conversion_delay: Duration,
}

impl<B: BusTransport> Si7021<B> {
    pub fn new(bus: B, addr: Address) -> SenResult<Self> {
        Ok(Self::with_conversion_delay(
            bus,
            addr,
            DEFAULT_CONVERSION_DELAY,
        ))
    }

    pub fn with_conversion_delay(bus: B, addr: Address, conversion_delay: Duration) -> Self {
        debug!(addr, ?conversion_delay, "si7021 bound");
        Self {
            bus,
            addr,
            conversion_delay,
        }
    }

    /// Dispara a conversão e lê MSB e LSB
    fn read_code(&mut self, command: u8) -> SenResult<u16> {
        self.bus.write_byte(self.addr, command)?;
        thread::sleep(self.conversion_delay);
        let msb = self.bus.read_byte(self.addr)?;
        let lsb = self.bus.read_byte(self.addr)?;
        Ok(((msb as u16) << 8) | lsb as u16)
    }
}

impl<B: BusTransport + Send> SensorDriver for Si7021<B> {
    fn descriptor(&self) -> &'static SensorDescriptor {
        &DESCRIPTOR
    }

    fn address(&self) -> Address {
        self.addr
    }

    fn measure(&mut self) -> SenResult<Measurement> {
        let humidity = self.read_humidity()?;
        let temperature = self.read_temperature()?;

        Ok(Measurement::captured_now([
            (Quantity::Temperature, temperature),
            (Quantity::Humidity, humidity),
        ]))
    }

    fn read_temperature(&mut self) -> SenResult<f64> {
        Ok(temperature_from_code(self.read_code(CMD_MEASURE_TEMP)?))
    }

    fn read_humidity(&mut self) -> SenResult<f64> {
        Ok(humidity_from_code(self.read_code(CMD_MEASURE_RH)?))
    }
}
