//! Registro de drivers: nome → construtor

use std::collections::HashMap;

use crate::bus::{Address, BoxedBus};
use crate::config::AcquisitionConfig;
use crate::drivers::{self, Bme280, Bmp180, MockSensor, SensorDriver, Si7021};
use crate::error::{SenError, SenResult};
use crate::types::SensorDescriptor;

/// Constrói um driver sobre um transporte já aberto
pub type DriverConstructor = fn(BoxedBus, Address) -> SenResult<Box<dyn SensorDriver>>;

/// Variante registrada
#[derive(Debug, Clone, Copy)]
pub struct DriverEntry {
    pub descriptor: &'static SensorDescriptor,
    constructor: DriverConstructor,
}

impl DriverEntry {
    pub fn new(descriptor: &'static SensorDescriptor, constructor: DriverConstructor) -> Self {
        Self {
            descriptor,
            constructor,
        }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Constrói o driver; sem endereço explícito usa o padrão do modelo
    pub fn build(&self, bus: BoxedBus, address: Option<Address>) -> SenResult<Box<dyn SensorDriver>> {
        (self.constructor)(bus, address.unwrap_or(self.descriptor.default_address))
    }
}

fn build_bme280(bus: BoxedBus, addr: Address) -> SenResult<Box<dyn SensorDriver>> {
    Ok(Box::new(Bme280::new(bus, addr)?))
}

fn build_bmp180(bus: BoxedBus, addr: Address) -> SenResult<Box<dyn SensorDriver>> {
    Ok(Box::new(Bmp180::new(bus, addr)?))
}

fn build_si7021(bus: BoxedBus, addr: Address) -> SenResult<Box<dyn SensorDriver>> {
    Ok(Box::new(Si7021::new(bus, addr)?))
}

fn build_mock(_bus: BoxedBus, _addr: Address) -> SenResult<Box<dyn SensorDriver>> {
    Ok(Box::new(MockSensor::new()))
}

/// Registro de variantes de driver
///
/// Nomes são comparados sem diferenciar maiúsculas.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    entries: HashMap<String, DriverEntry>,
}

impl DriverRegistry {
    /// Registro vazio
    pub fn new() -> Self {
        Self::default()
    }

    /// Registro com as variantes embutidas
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for entry in [
            DriverEntry::new(&drivers::bme280::DESCRIPTOR, build_bme280),
            DriverEntry::new(&drivers::bmp180::DESCRIPTOR, build_bmp180),
            DriverEntry::new(&drivers::si7021::DESCRIPTOR, build_si7021),
            DriverEntry::new(&drivers::mock::DESCRIPTOR, build_mock),
        ] {
            // nomes embutidos são distintos
            let _ = registry.register(entry);
        }
        registry
    }

    pub fn register(&mut self, entry: DriverEntry) -> SenResult<()> {
        let key = entry.name().to_ascii_lowercase();
        if self.entries.contains_key(&key) {
            return Err(SenError::Config(format!(
                "driver '{}' already registered",
                entry.name()
            )));
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Resolve um nome sem tocar no barramento
    pub fn resolve(&self, name: &str) -> SenResult<&DriverEntry> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| SenError::DriverNotFound(name.to_string()))
    }

    /// Resolve e constrói
    pub fn create(
        &self,
        name: &str,
        bus: BoxedBus,
        address: Option<Address>,
    ) -> SenResult<Box<dyn SensorDriver>> {
        self.resolve(name)?.build(bus, address)
    }

    /// Constrói o driver descrito pela configuração
    ///
    /// O nome é resolvido antes de `open_bus` ser chamado; o modo simulado
    /// não abre barramento algum.
    pub fn from_config<F>(&self, config: &AcquisitionConfig, open_bus: F) -> SenResult<Box<dyn SensorDriver>>
    where
        F: FnOnce(u8) -> SenResult<BoxedBus>,
    {
        let entry = self.resolve(config.driver_name())?;
        if entry.name() == drivers::mock::DESCRIPTOR.name {
            return Ok(Box::new(MockSensor::new()));
        }
        let bus = open_bus(config.bus)?;
        entry.build(bus, config.address)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Nomes registrados, ordenados
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|e| e.name()).collect();
        names.sort_unstable();
        names
    }

    pub fn descriptors(&self) -> Vec<&'static SensorDescriptor> {
        let mut descriptors: Vec<_> = self.entries.values().map(|e| e.descriptor).collect();
        descriptors.sort_unstable_by_key(|d| d.name);
        descriptors
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
