//! Configuração de aquisição
//!
//! Valor explícito passado ao scheduler e à construção do driver; é
//! validado uma vez, antes de qualquer I/O.

use std::fmt;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::bus::{Address, MAX_ADDRESS};
use crate::drivers::mock;
use crate::error::{SenError, SenResult};

pub const DEFAULT_SENSOR: &str = "bme280";
pub const DEFAULT_BUS: u8 = 1;
pub const DEFAULT_INTERVAL_SECS: f64 = 2.0;

/// Número de ciclos de aquisição
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleCount {
    Finite(NonZeroU32),
    Unbounded,
}

impl CycleCount {
    /// `None` significa ilimitado; zero é rejeitado
    pub fn from_option(cycles: Option<u32>) -> SenResult<Self> {
        match cycles {
            None => Ok(CycleCount::Unbounded),
            Some(n) => NonZeroU32::new(n)
                .map(CycleCount::Finite)
                .ok_or_else(|| SenError::Config("cycle count must be positive".into())),
        }
    }

    /// `true` quando `completed` ciclos esgotam a contagem
    pub fn is_exhausted(&self, completed: u64) -> bool {
        match self {
            CycleCount::Finite(n) => completed >= n.get() as u64,
            CycleCount::Unbounded => false,
        }
    }
}

impl fmt::Display for CycleCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleCount::Finite(n) => write!(f, "{}", n),
            CycleCount::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Configuração validada consumida pelo scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub cycles: CycleCount,
}

impl SchedulerConfig {
    pub fn new(interval: Duration, cycles: CycleCount) -> SenResult<Self> {
        if interval.is_zero() {
            return Err(SenError::Config("interval must be positive".into()));
        }
        Ok(Self { interval, cycles })
    }

    pub fn from_secs(interval_secs: f64, cycles: Option<u32>) -> SenResult<Self> {
        Self::new(interval_from_secs(interval_secs)?, CycleCount::from_option(cycles)?)
    }
}

/// Converte segundos em `Duration`, rejeitando zero, negativos, NaN e infinito
pub fn interval_from_secs(secs: f64) -> SenResult<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(SenError::Config(format!(
            "interval must be a positive number of seconds, got {}",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| SenError::Config(format!("interval {} is out of range", secs)))
}

/// Interpreta um endereço com prefixo de base (`0x`, `0o`, `0b`) ou decimal
pub fn parse_address(input: &str) -> SenResult<Address> {
    let text = input.trim();
    let lower = text.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else {
        (lower.as_str(), 10)
    };

    let value = u32::from_str_radix(digits, radix)
        .map_err(|e| SenError::Config(format!("invalid bus address '{}': {}", text, e)))?;
    check_address(value as u64)
}

fn check_address(value: u64) -> SenResult<Address> {
    if value > MAX_ADDRESS as u64 {
        return Err(SenError::Config(format!(
            "bus address {:#x} exceeds the 7-bit range",
            value
        )));
    }
    Ok(value as Address)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressRepr {
    Number(u64),
    Text(String),
}

fn deserialize_address<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<AddressRepr>::deserialize(deserializer)?;
    repr.map(|r| match r {
        AddressRepr::Number(n) => check_address(n),
        AddressRepr::Text(s) => parse_address(&s),
    })
    .transpose()
    .map_err(serde::de::Error::custom)
}

/// Configuração de aquisição, como lida de TOML ou da linha de comando
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcquisitionConfig {
    /// Nome do driver no registro
    pub sensor: String,

    /// Número do barramento I2C (`/dev/i2c-<bus>`)
    pub bus: u8,

    /// Endereço explícito; ausente usa o padrão do driver
    #[serde(deserialize_with = "deserialize_address", skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,

    /// Intervalo entre ciclos, em segundos
    pub interval: f64,

    /// Ciclos a executar; ausente = ilimitado
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles: Option<u32>,

    /// Usa o sensor simulado
    pub mock: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sensor: DEFAULT_SENSOR.to_string(),
            bus: DEFAULT_BUS,
            address: None,
            interval: DEFAULT_INTERVAL_SECS,
            cycles: None,
            mock: false,
        }
    }
}

impl AcquisitionConfig {
    pub fn from_toml(content: &str) -> SenResult<Self> {
        toml::from_str(content)
            .map_err(|e| SenError::Config(format!("Failed to parse configuration: {}", e)))
    }

    pub fn from_file(path: &Path) -> SenResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SenError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> SenResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SenError::Config(format!("Failed to serialize configuration: {}", e)))
    }

    /// Nome efetivo do driver (o modo simulado tem precedência)
    pub fn driver_name(&self) -> &str {
        if self.mock {
            mock::DESCRIPTOR.name
        } else {
            &self.sensor
        }
    }

    /// Caminho do dispositivo do barramento
    pub fn bus_path(&self) -> String {
        format!("/dev/i2c-{}", self.bus)
    }

    pub fn validate(&self) -> SenResult<SchedulerConfig> {
        if self.driver_name().trim().is_empty() {
            return Err(SenError::Config("sensor name must not be empty".into()));
        }
        SchedulerConfig::from_secs(self.interval, self.cycles)
    }
}
