//! Driver do Bosch BME280 (temperatura, umidade e pressão)

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bus::{Address, BusError, BusTransport};
use crate::calibration::{
    BME280_CALIB_00, BME280_CALIB_00_LEN, BME280_CALIB_26, BME280_CALIB_26_LEN, Bme280Calibration,
};
use crate::compensation::{
    self, CompensationState, RawSample, SampleId, assemble_16bit, assemble_20bit,
};
use crate::drivers::SensorDriver;
use crate::error::{SenError, SenResult};
use crate::types::{Measurement, Quantity, SensorDescriptor};

pub const DESCRIPTOR: SensorDescriptor = SensorDescriptor {
    name: "bme280",
    default_address: 0x77,
    quantities: &[Quantity::Temperature, Quantity::Humidity, Quantity::Pressure],
    description: "Bosch BME280 combined humidity, pressure and temperature sensor",
};

const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
/// press_msb..hum_lsb (0xF7..0xFE)
const REG_DATA: u8 = 0xF7;
const DATA_LEN: usize = 8;

/// Oversampling, modo de energia, filtro IIR e standby
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bme280Settings {
    pub osrs_h: u8,
    pub osrs_t: u8,
    pub osrs_p: u8,
    /// 0 = sleep, 1/2 = forced, 3 = normal
    pub power_mode: u8,
    pub filter: u8,
    /// t_sb: 5 = 1000 ms
    pub standby: u8,
}

impl Default for Bme280Settings {
    fn default() -> Self {
        Self {
            osrs_h: 1,
            osrs_t: 1,
            osrs_p: 1,
            power_mode: 3,
            filter: 0,
            standby: 5,
        }
    }
}

impl Bme280Settings {
    pub fn ctrl_hum(&self) -> u8 {
        self.osrs_h & 0x07
    }

    pub fn ctrl_meas(&self) -> u8 {
        ((self.osrs_t & 0x07) << 5) | ((self.osrs_p & 0x07) << 2) | (self.power_mode & 0x03)
    }

    pub fn config(&self) -> u8 {
        ((self.standby & 0x07) << 5) | ((self.filter & 0x07) << 2)
    }
}

/// Driver do BME280
///
/// A calibração é lida uma vez na construção; `t_fine` é estado privado
/// atualizado a cada compensação de temperatura.
#[derive(Debug)]
pub struct Bme280<B> {
    bus: B,
    addr: Address,
    settings: Bme280Settings,
    calibration: Bme280Calibration,
    state: CompensationState,
    next_sample: SampleId,
}

impl<B: BusTransport> Bme280<B> {
    pub fn new(bus: B, addr: Address) -> SenResult<Self> {
        Self::with_settings(bus, addr, Bme280Settings::default())
    }

    pub fn with_settings(mut bus: B, addr: Address, settings: Bme280Settings) -> SenResult<Self> {
        let init = |e: BusError| SenError::driver_init(DESCRIPTOR.name, e);

        let calib_00 = bus
            .read_block(addr, BME280_CALIB_00, BME280_CALIB_00_LEN)
            .map_err(init)?;
        let calib_26 = bus
            .read_block(addr, BME280_CALIB_26, BME280_CALIB_26_LEN)
            .map_err(init)?;
        let calibration = Bme280Calibration::decode(&calib_00, &calib_26)
            .map_err(|e| SenError::driver_init(DESCRIPTOR.name, e))?;

        // ctrl_hum só tem efeito após a escrita de ctrl_meas
        bus.write_register(addr, REG_CTRL_HUM, settings.ctrl_hum())
            .map_err(init)?;
        bus.write_register(addr, REG_CTRL_MEAS, settings.ctrl_meas())
            .map_err(init)?;
        bus.write_register(addr, REG_CONFIG, settings.config())
            .map_err(init)?;

        debug!(addr, ?settings, "bme280 initialized");

        Ok(Self {
            bus,
            addr,
            settings,
            calibration,
            state: CompensationState::new(),
            next_sample: 0,
        })
    }

    pub fn calibration(&self) -> &Bme280Calibration {
        &self.calibration
    }

    pub fn settings(&self) -> &Bme280Settings {
        &self.settings
    }

    /// Lê as três contagens ADC num único burst
    pub fn read_raw(&mut self) -> SenResult<RawSample> {
        let data = self.bus.read_block(self.addr, REG_DATA, DATA_LEN)?;
        if data.len() < DATA_LEN {
            return Err(BusError::ShortRead {
                addr: self.addr,
                expected: DATA_LEN,
                got: data.len(),
            }
            .into());
        }

        self.next_sample += 1;
        Ok(RawSample::new(self.next_sample, assemble_20bit(data[3], data[4], data[5]))
            .with_pressure(assemble_20bit(data[0], data[1], data[2]))
            .with_humidity(assemble_16bit(data[6], data[7])))
    }

    /// Compensa a temperatura e registra o `t_fine` desta amostra
    pub fn compensate_temperature(&mut self, sample: &RawSample) -> f64 {
        let (celsius, t_fine) = compensation::bme280::temperature(sample, &self.calibration);
        self.state.update(t_fine);
        celsius
    }

    pub fn compensate_pressure(&self, sample: &RawSample) -> SenResult<f64> {
        let t_fine = self.state.t_fine_for(sample)?;
        Ok(compensation::bme280::pressure(sample, &self.calibration, t_fine)?)
    }

    pub fn compensate_humidity(&self, sample: &RawSample) -> SenResult<f64> {
        let t_fine = self.state.t_fine_for(sample)?;
        Ok(compensation::bme280::humidity(sample, &self.calibration, t_fine)?)
    }
}

impl<B: BusTransport + Send> SensorDriver for Bme280<B> {
    fn descriptor(&self) -> &'static SensorDescriptor {
        &DESCRIPTOR
    }

    fn address(&self) -> Address {
        self.addr
    }

    fn measure(&mut self) -> SenResult<Measurement> {
        let sample = self.read_raw()?;
        let temperature = self.compensate_temperature(&sample);
        let pressure = self.compensate_pressure(&sample)?;
        let humidity = self.compensate_humidity(&sample)?;

        Ok(Measurement::captured_now([
            (Quantity::Temperature, temperature),
            (Quantity::Humidity, humidity),
            (Quantity::Pressure, pressure),
        ]))
    }

    fn read_temperature(&mut self) -> SenResult<f64> {
        let sample = self.read_raw()?;
        Ok(self.compensate_temperature(&sample))
    }

    fn read_humidity(&mut self) -> SenResult<f64> {
        let sample = self.read_raw()?;
        self.compensate_temperature(&sample);
        self.compensate_humidity(&sample)
    }

    fn read_pressure(&mut self) -> SenResult<f64> {
        let sample = self.read_raw()?;
        self.compensate_temperature(&sample);
        self.compensate_pressure(&sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::fixtures::{bme280_blocks, bme280_reference};
    use crate::compensation::CompensationError;
    use crate::drivers::testing::{Op, SimBus};

    const ADDR: Address = 0x77;

    /// adc_P = 415148, adc_T = 519888, adc_H = 30000
    const RAW: [u8; 8] = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30];

    fn loaded_bus() -> SimBus {
        let bus = SimBus::new();
        let (a, b) = bme280_blocks(&bme280_reference());
        bus.load(ADDR, BME280_CALIB_00, &a);
        bus.load(ADDR, BME280_CALIB_26, &b);
        bus.load(ADDR, REG_DATA, &RAW);
        bus
    }

    #[test]
    fn test_settings_register_values() {
        let s = Bme280Settings::default();
        assert_eq!(s.ctrl_hum(), 0x01);
        assert_eq!(s.ctrl_meas(), 0x27);
        assert_eq!(s.config(), 0xA0);
    }

    #[test]
    fn test_construction_reads_calibration_then_configures() {
        let bus = loaded_bus();
        let driver = Bme280::new(bus.clone(), ADDR).unwrap();
        assert_eq!(driver.calibration(), &bme280_reference());

        let log = bus.log();
        assert_eq!(
            log,
            vec![
                Op::ReadBlock(ADDR, 0x88, 26),
                Op::ReadBlock(ADDR, 0xE1, 7),
                Op::WriteRegister(ADDR, 0xF2, 0x01),
                Op::WriteRegister(ADDR, 0xF4, 0x27),
                Op::WriteRegister(ADDR, 0xF5, 0xA0),
            ]
        );
    }

    #[test]
    fn test_measure_reference_values() {
        let mut driver = Bme280::new(loaded_bus(), ADDR).unwrap();
        let m = driver.measure().unwrap();

        let t = m.get(Quantity::Temperature).unwrap();
        let p = m.get(Quantity::Pressure).unwrap();
        let h = m.get(Quantity::Humidity).unwrap();
        assert!((t - 25.08247793081682).abs() < 1e-9);
        assert!((p - 100653.25814481472).abs() < 1e-6);
        assert!((h - 55.000712804837015).abs() < 1e-9);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_single_channel_reads() {
        let mut driver = Bme280::new(loaded_bus(), ADDR).unwrap();
        assert!((driver.read_temperature().unwrap() - 25.08247793081682).abs() < 1e-9);
        assert!((driver.read_pressure().unwrap() - 100653.25814481472).abs() < 1e-6);
        assert!((driver.read_humidity().unwrap() - 55.000712804837015).abs() < 1e-9);
    }

    #[test]
    fn test_pressure_before_temperature_fails() {
        let mut driver = Bme280::new(loaded_bus(), ADDR).unwrap();
        let sample = driver.read_raw().unwrap();
        let err = driver.compensate_pressure(&sample).unwrap_err();
        assert_eq!(err, SenError::Compensation(CompensationError::MissingTFine));
        assert!(driver.compensate_humidity(&sample).is_err());
    }

    #[test]
    fn test_humidity_with_previous_cycle_t_fine_fails() {
        let mut driver = Bme280::new(loaded_bus(), ADDR).unwrap();
        let first = driver.read_raw().unwrap();
        driver.compensate_temperature(&first);
        let second = driver.read_raw().unwrap();
        assert!(matches!(
            driver.compensate_humidity(&second),
            Err(SenError::Compensation(CompensationError::StaleTFine { .. }))
        ));
    }

    #[test]
    fn test_missing_device_is_init_error() {
        let bus = SimBus::new();
        bus.fail(BusError::NotPresent { addr: ADDR });
        let err = Bme280::new(bus, ADDR).unwrap_err();
        assert!(matches!(err, SenError::DriverInit { driver: "bme280", .. }));
    }

    #[test]
    fn test_short_calibration_block_is_init_error() {
        let bus = loaded_bus();
        bus.state.lock().unwrap().truncate_blocks = Some(5);
        let err = Bme280::new(bus, ADDR).unwrap_err();
        assert!(matches!(err, SenError::DriverInit { .. }));
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_bus_error_during_measure_propagates() {
        let bus = loaded_bus();
        let mut driver = Bme280::new(bus.clone(), ADDR).unwrap();

        bus.fail(BusError::Timeout { addr: ADDR });
        let err = driver.measure().unwrap_err();
        assert_eq!(err, SenError::Bus(BusError::Timeout { addr: ADDR }));
        assert!(err.is_cycle_error());

        bus.recover();
        assert!(driver.measure().is_ok());
    }

    #[test]
    fn test_descriptor() {
        let driver = Bme280::new(loaded_bus(), ADDR).unwrap();
        assert_eq!(driver.driver_name(), "bme280");
        assert_eq!(driver.default_address(), 0x77);
        assert_eq!(driver.address(), ADDR);
    }
}
