//! Sensor simulado, sem acesso ao barramento

use crate::bus::Address;
use crate::drivers::SensorDriver;
use crate::error::SenResult;
use crate::types::{Measurement, Quantity, SensorDescriptor};

pub const DESCRIPTOR: SensorDescriptor = SensorDescriptor {
    name: "mock-sensor",
    default_address: 0x00,
    quantities: &[Quantity::Temperature, Quantity::Humidity],
    description: "Constant-value sensor for tests and demos",
};

pub const DEFAULT_TEMPERATURE: f64 = 28.5;
pub const DEFAULT_HUMIDITY: f64 = 25.2;

#[derive(Debug, Clone, PartialEq)]
pub struct MockSensor {
    temperature: f64,
    humidity: f64,
    measurements: u64,
}

impl Default for MockSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSensor {
    pub fn new() -> Self {
        Self::with_values(DEFAULT_TEMPERATURE, DEFAULT_HUMIDITY)
    }

    pub fn with_values(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature,
            humidity,
            measurements: 0,
        }
    }

    /// Quantas vezes `measure` foi chamado
    pub fn measurements(&self) -> u64 {
        self.measurements
    }
}

impl SensorDriver for MockSensor {
    fn descriptor(&self) -> &'static SensorDescriptor {
        &DESCRIPTOR
    }

    fn address(&self) -> Address {
        DESCRIPTOR.default_address
    }

    fn measure(&mut self) -> SenResult<Measurement> {
        self.measurements += 1;
        Ok(Measurement::captured_now([
            (Quantity::Temperature, self.temperature),
            (Quantity::Humidity, self.humidity),
        ]))
    }

    fn read_temperature(&mut self) -> SenResult<f64> {
        Ok(self.temperature)
    }

    fn read_humidity(&mut self) -> SenResult<f64> {
        Ok(self.humidity)
    }
}
