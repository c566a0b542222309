//! Drivers de sensor
//!
//! Todas as variantes implementam o mesmo conjunto de capacidades
//! ([`SensorDriver`]). A construção vincula um transporte e um endereço,
//! escreve a configuração do dispositivo e decodifica a calibração uma
//! única vez; falhas nessa fase são [`SenError::DriverInit`].
//!
//! | Driver        | Endereço | Grandezas                         |
//! |:--------------|:---------|:----------------------------------|
//! | `bme280`      | 0x77     | temperatura, umidade, pressão     |
//! | `bmp180`      | 0x77     | temperatura, pressão              |
//! | `si7021`      | 0x40     | temperatura, umidade              |
//! | `mock-sensor` | 0x00     | temperatura, umidade (constantes) |

pub mod bme280;
pub mod bmp180;
pub mod mock;
pub mod si7021;

pub use bme280::{Bme280, Bme280Settings};
pub use bmp180::{Bmp180, Oversampling};
pub use mock::MockSensor;
pub use si7021::Si7021;

use crate::bus::Address;
use crate::error::{SenError, SenResult};
use crate::types::{Measurement, Quantity, SensorDescriptor};

/// Capacidade polimórfica de um sensor
pub trait SensorDriver: Send {
    /// Metadados estáticos do modelo
    fn descriptor(&self) -> &'static SensorDescriptor;

    /// Endereço efetivamente vinculado
    fn address(&self) -> Address;

    /// Executa uma aquisição completa
    fn measure(&mut self) -> SenResult<Measurement>;

    fn read_temperature(&mut self) -> SenResult<f64>;

    fn read_humidity(&mut self) -> SenResult<f64> {
        Err(SenError::Unsupported(Quantity::Humidity))
    }

    fn read_pressure(&mut self) -> SenResult<f64> {
        Err(SenError::Unsupported(Quantity::Pressure))
    }

    fn driver_name(&self) -> &'static str {
        self.descriptor().name
    }

    fn default_address(&self) -> Address {
        self.descriptor().default_address
    }

    /// Lê uma grandeza isolada pelo nome
    fn read(&mut self, quantity: Quantity) -> SenResult<f64> {
        match quantity {
            Quantity::Temperature => self.read_temperature(),
            Quantity::Humidity => self.read_humidity(),
            Quantity::Pressure => self.read_pressure(),
        }
    }
}

impl<D: SensorDriver + ?Sized> SensorDriver for Box<D> {
    fn descriptor(&self) -> &'static SensorDescriptor {
        (**self).descriptor()
    }

    fn address(&self) -> Address {
        (**self).address()
    }

    fn measure(&mut self) -> SenResult<Measurement> {
        (**self).measure()
    }

    fn read_temperature(&mut self) -> SenResult<f64> {
        (**self).read_temperature()
    }

    fn read_humidity(&mut self) -> SenResult<f64> {
        (**self).read_humidity()
    }

    fn read_pressure(&mut self) -> SenResult<f64> {
        (**self).read_pressure()
    }
}
