//! Tipos de dados de medição

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::bus::Address;

/// Grandeza física medida
///
/// A ordem das variantes é alfabética e define a ordem de iteração de
/// [`Measurement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantity {
    /// Umidade relativa em % [0, 100]
    Humidity,
    /// Pressão em Pa
    Pressure,
    /// Temperatura em °C
    Temperature,
}

impl Quantity {
    pub fn name(&self) -> &'static str {
        match self {
            Quantity::Humidity => "humidity",
            Quantity::Pressure => "pressure",
            Quantity::Temperature => "temperature",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Quantity::Humidity => "%RH",
            Quantity::Pressure => "Pa",
            Quantity::Temperature => "°C",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Uma medição: grandezas → valor físico, mais o instante de captura
///
/// Imutável depois de criada; os sinks recebem apenas referências.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(flatten)]
    values: BTreeMap<Quantity, f64>,
    /// Milissegundos desde a época Unix
    timestamp_ms: u64,
}

impl Measurement {
    /// Cria medição com timestamp explícito
    pub fn new(values: impl IntoIterator<Item = (Quantity, f64)>, timestamp_ms: u64) -> Self {
        Self {
            values: values.into_iter().collect(),
            timestamp_ms,
        }
    }

    /// Cria medição capturada agora
    pub fn captured_now(values: impl IntoIterator<Item = (Quantity, f64)>) -> Self {
        Self::new(values, now_millis())
    }

    pub fn get(&self, quantity: Quantity) -> Option<f64> {
        self.values.get(&quantity).copied()
    }

    pub fn contains(&self, quantity: Quantity) -> bool {
        self.values.contains_key(&quantity)
    }

    /// Itera na ordem das grandezas
    pub fn iter(&self) -> impl Iterator<Item = (Quantity, f64)> + '_ {
        self.values.iter().map(|(q, v)| (*q, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn captured_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.timestamp_ms)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Metadados estáticos de um modelo de sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorDescriptor {
    pub name: &'static str,
    pub default_address: Address,
    pub quantities: &'static [Quantity],
    pub description: &'static str,
}

impl SensorDescriptor {
    pub fn supports(&self, quantity: Quantity) -> bool {
        self.quantities.contains(&quantity)
    }
}

/// Timestamp atual em milissegundos
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
