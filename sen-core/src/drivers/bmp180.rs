//! Driver do Bosch BMP180 (temperatura e pressão)
//!
//! Conversões disparadas por comando em 0xF4; o resultado é lido em
//! 0xF6..0xF8 após o tempo de conversão do datasheet.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bus::{Address, BusError, BusTransport};
use crate::calibration::{BMP180_CALIB, BMP180_CALIB_LEN, Bmp180Calibration};
use crate::compensation::{self, CompensationState, RawSample, SampleId};
use crate::drivers::SensorDriver;
use crate::error::{SenError, SenResult};
use crate::types::{Measurement, Quantity, SensorDescriptor};

pub const DESCRIPTOR: SensorDescriptor = SensorDescriptor {
    name: "bmp180",
    default_address: 0x77,
    quantities: &[Quantity::Temperature, Quantity::Pressure],
    description: "Bosch BMP180 barometric pressure and temperature sensor",
};

const REG_CONTROL: u8 = 0xF4;
const REG_OUT: u8 = 0xF6;
const CMD_TEMPERATURE: u8 = 0x2E;
const CMD_PRESSURE: u8 = 0x34;
const TEMPERATURE_DELAY: Duration = Duration::from_micros(4_500);

/// Oversampling setting (`oss`) do BMP180
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Oversampling {
    UltraLowPower,
    #[default]
    Standard,
    HighResolution,
    UltraHighResolution,
}

impl Oversampling {
    pub fn oss(&self) -> u8 {
        match self {
            Oversampling::UltraLowPower => 0,
            Oversampling::Standard => 1,
            Oversampling::HighResolution => 2,
            Oversampling::UltraHighResolution => 3,
        }
    }

    /// Tempo máximo de conversão de pressão
    pub fn conversion_delay(&self) -> Duration {
        match self {
            Oversampling::UltraLowPower => Duration::from_micros(4_500),
            Oversampling::Standard => Duration::from_micros(7_500),
            Oversampling::HighResolution => Duration::from_micros(13_500),
            Oversampling::UltraHighResolution => Duration::from_micros(25_500),
        }
    }

    fn command(&self) -> u8 {
        CMD_PRESSURE + (self.oss() << 6)
    }
}

#[derive(Debug)]
pub struct Bmp180<B> {
    bus: B,
    addr: Address,
    oversampling: Oversampling,
    calibration: Bmp180Calibration,
    state: CompensationState,
    next_sample: SampleId,
}

impl<B: BusTransport> Bmp180<B> {
    pub fn new(bus: B, addr: Address) -> SenResult<Self> {
        Self::with_oversampling(bus, addr, Oversampling::default())
    }

    pub fn with_oversampling(
        mut bus: B,
        addr: Address,
        oversampling: Oversampling,
    ) -> SenResult<Self> {
        let block = bus
            .read_block(addr, BMP180_CALIB, BMP180_CALIB_LEN)
            .map_err(|e| SenError::driver_init(DESCRIPTOR.name, e))?;
        let calibration = Bmp180Calibration::decode(&block)
            .map_err(|e| SenError::driver_init(DESCRIPTOR.name, e))?;

        debug!(addr, oss = oversampling.oss(), "bmp180 initialized");

        Ok(Self {
            bus,
            addr,
            oversampling,
            calibration,
            state: CompensationState::new(),
            next_sample: 0,
        })
    }

    pub fn calibration(&self) -> &Bmp180Calibration {
        &self.calibration
    }

    pub fn oversampling(&self) -> Oversampling {
        self.oversampling
    }

    fn convert(&mut self, command: u8, delay: Duration, length: usize) -> SenResult<Vec<u8>> {
        self.bus.write_register(self.addr, REG_CONTROL, command)?;
        thread::sleep(delay);
        let data = self.bus.read_block(self.addr, REG_OUT, length)?;
        if data.len() < length {
            return Err(BusError::ShortRead {
                addr: self.addr,
                expected: length,
                got: data.len(),
            }
            .into());
        }
        Ok(data)
    }

    /// UT e, opcionalmente, UP de uma mesma aquisição
    pub fn read_raw(&mut self, with_pressure: bool) -> SenResult<RawSample> {
        let ut = self.convert(CMD_TEMPERATURE, TEMPERATURE_DELAY, 2)?;
        let mut sample = RawSample::new(
            self.next_sample + 1,
            ((ut[0] as u32) << 8) | ut[1] as u32,
        );

        if with_pressure {
            let oss = self.oversampling;
            let up = self.convert(oss.command(), oss.conversion_delay(), 3)?;
            let raw = ((up[0] as u32) << 16) | ((up[1] as u32) << 8) | up[2] as u32;
            sample = sample.with_pressure(raw >> (8 - oss.oss()));
        }

        self.next_sample += 1;
        Ok(sample)
    }

    pub fn compensate_temperature(&mut self, sample: &RawSample) -> SenResult<f64> {
        let (celsius, b5) = compensation::bmp180::temperature(sample, &self.calibration)?;
        self.state.update(b5);
        Ok(celsius)
    }

    pub fn compensate_pressure(&self, sample: &RawSample) -> SenResult<f64> {
        let b5 = self.state.t_fine_for(sample)?;
        Ok(compensation::bmp180::pressure(
            sample,
            &self.calibration,
            b5,
            self.oversampling.oss(),
        )?)
    }
}

impl<B: BusTransport + Send> SensorDriver for Bmp180<B> {
    fn descriptor(&self) -> &'static SensorDescriptor {
        &DESCRIPTOR
    }

    fn address(&self) -> Address {
        self.addr
    }

    fn measure(&mut self) -> SenResult<Measurement> {
        let sample = self.read_raw(true)?;
        let temperature = self.compensate_temperature(&sample)?;
        let pressure = self.compensate_pressure(&sample)?;

        Ok(Measurement::captured_now([
            (Quantity::Temperature, temperature),
            (Quantity::Pressure, pressure),
        ]))
    }

    fn read_temperature(&mut self) -> SenResult<f64> {
        let sample = self.read_raw(false)?;
        self.compensate_temperature(&sample)
    }

    fn read_pressure(&mut self) -> SenResult<f64> {
        let sample = self.read_raw(true)?;
        self.compensate_temperature(&sample)?;
        self.compensate_pressure(&sample)
    }
}
