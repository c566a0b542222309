//! Motor de compensação: contagens ADC brutas → grandezas físicas
//!
//! A temperatura é sempre compensada primeiro e produz um [`TFine`], que é
//! argumento obrigatório da compensação de pressão e umidade. Um `TFine`
//! só pode ser criado por este módulo e carrega o id da amostra que o
//! originou, então usar o valor de outra amostra é detectado como erro.

use thiserror::Error;

use crate::types::Quantity;

/// Identificador monotônico de uma aquisição dentro de um driver
pub type SampleId = u64;

/// Erros de compensação (indicam bug de ordem de chamada ou dado degenerado)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompensationError {
    #[error("no temperature compensation ran for this sample")]
    MissingTFine,

    #[error("t_fine belongs to sample {found}, not to sample {expected}")]
    StaleTFine { expected: SampleId, found: SampleId },

    #[error("raw sample has no {0} channel")]
    MissingChannel(Quantity),

    #[error("degenerate calibration: {0} is zero")]
    ZeroDivisor(&'static str),

    #[error("degenerate calibration: {0} overflows 32 bits")]
    Overflow(&'static str),
}

pub type CompensationResult<T> = Result<T, CompensationError>;

/// Contagens ADC de uma aquisição
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    id: SampleId,
    pub adc_t: u32,
    pub adc_p: Option<u32>,
    pub adc_h: Option<u32>,
}

impl RawSample {
    pub fn new(id: SampleId, adc_t: u32) -> Self {
        Self {
            id,
            adc_t,
            adc_p: None,
            adc_h: None,
        }
    }

    pub fn with_pressure(mut self, adc_p: u32) -> Self {
        self.adc_p = Some(adc_p);
        self
    }

    pub fn with_humidity(mut self, adc_h: u32) -> Self {
        self.adc_h = Some(adc_h);
        self
    }

    pub fn id(&self) -> SampleId {
        self.id
    }

    fn pressure(&self) -> CompensationResult<u32> {
        self.adc_p
            .ok_or(CompensationError::MissingChannel(Quantity::Pressure))
    }

    fn humidity(&self) -> CompensationResult<u32> {
        self.adc_h
            .ok_or(CompensationError::MissingChannel(Quantity::Humidity))
    }
}

/// Monta um valor de 20 bits de três registradores (MSB primeiro, xlsb[7:4])
pub fn assemble_20bit(msb: u8, lsb: u8, xlsb: u8) -> u32 {
    ((msb as u32) << 12) | ((lsb as u32) << 4) | ((xlsb as u32) >> 4)
}

/// Monta um valor de 16 bits de dois registradores (MSB primeiro)
pub fn assemble_16bit(msb: u8, lsb: u8) -> u32 {
    ((msb as u32) << 8) | lsb as u32
}

/// Temperatura fina intermediária ligada à amostra que a produziu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TFine {
    value: i32,
    sample: SampleId,
}

impl TFine {
    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn sample(&self) -> SampleId {
        self.sample
    }

    fn check(&self, sample: &RawSample) -> CompensationResult<()> {
        if self.sample != sample.id {
            return Err(CompensationError::StaleTFine {
                expected: sample.id,
                found: self.sample,
            });
        }
        Ok(())
    }
}

/// Estado acumulado de compensação de uma instância de driver
#[derive(Debug, Clone, Default)]
pub struct CompensationState {
    t_fine: Option<TFine>,
}

impl CompensationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, t_fine: TFine) {
        self.t_fine = Some(t_fine);
    }

    /// `TFine` da amostra informada; falha se a temperatura dela não rodou
    pub fn t_fine_for(&self, sample: &RawSample) -> CompensationResult<TFine> {
        let t_fine = self.t_fine.ok_or(CompensationError::MissingTFine)?;
        t_fine.check(sample)?;
        Ok(t_fine)
    }

    pub fn last(&self) -> Option<TFine> {
        self.t_fine
    }
}

/// Fórmulas em ponto flutuante do BME280 (datasheet Bosch, seção 4.2.3)
pub mod bme280 {
    use super::*;
    use crate::calibration::Bme280Calibration;

    /// Retorna (°C, t_fine)
    pub fn temperature(sample: &RawSample, cal: &Bme280Calibration) -> (f64, TFine) {
        let ut = sample.adc_t as f64;
        let t1 = cal.dig_t1 as f64;
        let var1 = (ut / 16384.0 - t1 / 1024.0) * cal.dig_t2 as f64;
        let d = ut / 131072.0 - t1 / 8192.0;
        let var2 = (d * d) * cal.dig_t3 as f64;

        let t_fine = TFine {
            value: (var1 + var2) as i32,
            sample: sample.id,
        };
        ((var1 + var2) / 5120.0, t_fine)
    }

    /// Pressão em Pa; retorna 0 quando o fator de normalização é zero
    pub fn pressure(
        sample: &RawSample,
        cal: &Bme280Calibration,
        t_fine: TFine,
    ) -> CompensationResult<f64> {
        t_fine.check(sample)?;
        let adc_p = sample.pressure()? as f64;

        let mut var1 = t_fine.value as f64 / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * cal.dig_p6 as f64 / 32768.0;
        var2 += var1 * cal.dig_p5 as f64 * 2.0;
        var2 = var2 / 4.0 + cal.dig_p4 as f64 * 65536.0;
        var1 = (cal.dig_p3 as f64 * var1 * var1 / 524288.0 + cal.dig_p2 as f64 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * cal.dig_p1 as f64;
        if var1 == 0.0 {
            return Ok(0.0);
        }

        let mut p = 1048576.0 - adc_p;
        p = ((p - var2 / 4096.0) * 6250.0) / var1;
        var1 = cal.dig_p9 as f64 * p * p / 2147483648.0;
        var2 = p * cal.dig_p8 as f64 / 32768.0;
        Ok(p + (var1 + var2 + cal.dig_p7 as f64) / 16.0)
    }

    /// Umidade relativa em %, limitada a [0, 100]
    pub fn humidity(
        sample: &RawSample,
        cal: &Bme280Calibration,
        t_fine: TFine,
    ) -> CompensationResult<f64> {
        t_fine.check(sample)?;
        let adc_h = sample.humidity()? as f64;

        let mut h = t_fine.value as f64 - 76800.0;
        h = (adc_h - (cal.dig_h4 as f64 * 64.0 + cal.dig_h5 as f64 / 16384.0 * h))
            * (cal.dig_h2 as f64 / 65536.0
                * (1.0
                    + cal.dig_h6 as f64 / 67108864.0
                        * h
                        * (1.0 + cal.dig_h3 as f64 / 67108864.0 * h)));
        h *= 1.0 - cal.dig_h1 as f64 * h / 524288.0;
        Ok(h.clamp(0.0, 100.0))
    }
}

/// Fórmulas inteiras do BMP180 (datasheet Bosch, seção 3.5)
///
/// O `B5` do datasheet faz o papel de `t_fine`.
pub mod bmp180 {
    use super::*;
    use crate::calibration::Bmp180Calibration;

    /// Retorna (°C, B5)
    pub fn temperature(
        sample: &RawSample,
        cal: &Bmp180Calibration,
    ) -> CompensationResult<(f64, TFine)> {
        let ut = sample.adc_t as i64;
        let x1 = ((ut - cal.ac6 as i64) * cal.ac5 as i64) >> 15;
        let divisor = x1 + cal.md as i64;
        if divisor == 0 {
            return Err(CompensationError::ZeroDivisor("X1 + MD"));
        }
        let x2 = ((cal.mc as i64) << 11) / divisor;
        let b5 = x1 + x2;
        let t = (b5 + 8) >> 4;

        let t_fine = TFine {
            value: b5 as i32,
            sample: sample.id,
        };
        Ok((t as f64 / 10.0, t_fine))
    }

    /// Pressão em Pa para o oversampling `oss` (0..=3)
    pub fn pressure(
        sample: &RawSample,
        cal: &Bmp180Calibration,
        t_fine: TFine,
        oss: u8,
    ) -> CompensationResult<f64> {
        t_fine.check(sample)?;
        let up = sample.pressure()? as i64;
        let oss = oss.min(3) as u32;

        let b6 = t_fine.value as i64 - 4000;
        let mut x1 = (cal.b2 as i64 * ((b6 * b6) >> 12)) >> 11;
        let mut x2 = (cal.ac2 as i64 * b6) >> 11;
        let mut x3 = x1 + x2;
        let b3 = ((((cal.ac1 as i64) * 4 + x3) << oss) + 2) / 4;
        x1 = (cal.ac3 as i64 * b6) >> 13;
        x2 = (cal.b1 as i64 * ((b6 * b6) >> 12)) >> 16;
        x3 = ((x1 + x2) + 2) >> 2;
        // B4 e B7 são `unsigned long` de 32 bits no datasheet
        let b4 = (cal.ac4 as u32).wrapping_mul((x3 + 32768) as u32) >> 15;
        if b4 == 0 {
            return Err(CompensationError::ZeroDivisor("B4"));
        }
        let b7 = ((up - b3) as u32).wrapping_mul(50000u32 >> oss);

        let mut p = if b7 < 0x8000_0000 {
            ((b7 * 2) / b4) as i64
        } else {
            (b7 / b4)
                .checked_mul(2)
                .ok_or(CompensationError::Overflow("B7 / B4 * 2"))? as i64
        };
        x1 = (p >> 8) * (p >> 8);
        x1 = (x1 * 3038) >> 16;
        x2 = (-7357 * p) >> 16;
        p += (x1 + x2 + 3791) >> 4;
        Ok(p as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Bmp180Calibration;
    use crate::calibration::fixtures::{bme280_reference, bmp180_reference};

    fn bme_sample(id: SampleId) -> RawSample {
        RawSample::new(id, 519888)
            .with_pressure(415148)
            .with_humidity(30000)
    }

    #[test]
    fn test_assemble_raw_values() {
        assert_eq!(assemble_20bit(0x7E, 0xED, 0x00), 0x7EED0);
        assert_eq!(assemble_20bit(0xFF, 0xFF, 0xFF), 0xFFFFF);
        assert_eq!(assemble_20bit(0x00, 0x00, 0x0F), 0);
        assert_eq!(assemble_16bit(0x75, 0x30), 30000);
    }

    #[test]
    fn test_bme280_temperature_reference() {
        let cal = bme280_reference();
        let (t, t_fine) = bme280::temperature(&bme_sample(1), &cal);
        assert!((t - 25.08247793081682).abs() < 1e-9);
        assert_eq!(t_fine.value(), 128422);
        assert_eq!(t_fine.sample(), 1);
    }

    #[test]
    fn test_bme280_temperature_is_deterministic() {
        let cal = bme280_reference();
        let sample = bme_sample(7);
        let (first, _) = bme280::temperature(&sample, &cal);
        for _ in 0..100 {
            let (again, _) = bme280::temperature(&sample, &cal);
            assert_eq!(first.to_bits(), again.to_bits());
        }
    }

    #[test]
    fn test_bme280_pressure_reference() {
        let cal = bme280_reference();
        let sample = bme_sample(1);
        let (_, t_fine) = bme280::temperature(&sample, &cal);
        let p = bme280::pressure(&sample, &cal, t_fine).unwrap();
        assert!((p - 100653.25814481472).abs() < 1e-6, "p = {p}");
    }

    #[test]
    fn test_bme280_pressure_zero_normalization() {
        let mut cal = bme280_reference();
        cal.dig_p1 = 0;
        let sample = bme_sample(1);
        let (_, t_fine) = bme280::temperature(&sample, &cal);
        let p = bme280::pressure(&sample, &cal, t_fine).unwrap();
        assert_eq!(p, 0.0);
    }

    #[test]
    fn test_bme280_humidity_reference() {
        let cal = bme280_reference();
        let sample = bme_sample(1);
        let (_, t_fine) = bme280::temperature(&sample, &cal);
        let h = bme280::humidity(&sample, &cal, t_fine).unwrap();
        assert!((h - 55.000712804837015).abs() < 1e-9, "h = {h}");
    }

    #[test]
    fn test_bme280_humidity_clamped() {
        let cal = bme280_reference();
        for adc_h in (0..=0xFFFFu32).step_by(97).chain([0, 0xFFFF]) {
            let sample = RawSample::new(3, 519888).with_humidity(adc_h);
            let (_, t_fine) = bme280::temperature(&sample, &cal);
            let h = bme280::humidity(&sample, &cal, t_fine).unwrap();
            assert!((0.0..=100.0).contains(&h), "adc_h={adc_h} h={h}");
        }

        let low = RawSample::new(4, 519888).with_humidity(0);
        let (_, tf) = bme280::temperature(&low, &cal);
        assert_eq!(bme280::humidity(&low, &cal, tf).unwrap(), 0.0);

        let high = RawSample::new(5, 519888).with_humidity(0xFFFF);
        let (_, tf) = bme280::temperature(&high, &cal);
        assert_eq!(bme280::humidity(&high, &cal, tf).unwrap(), 100.0);
    }

    #[test]
    fn test_stale_t_fine_rejected() {
        let cal = bme280_reference();
        let (_, old) = bme280::temperature(&bme_sample(1), &cal);
        let err = bme280::pressure(&bme_sample(2), &cal, old).unwrap_err();
        assert_eq!(
            err,
            CompensationError::StaleTFine {
                expected: 2,
                found: 1
            }
        );
        assert!(bme280::humidity(&bme_sample(2), &cal, old).is_err());
    }

    #[test]
    fn test_state_requires_temperature_first() {
        let cal = bme280_reference();
        let mut state = CompensationState::new();
        let sample = bme_sample(10);

        assert_eq!(
            state.t_fine_for(&sample).unwrap_err(),
            CompensationError::MissingTFine
        );

        let (_, t_fine) = bme280::temperature(&sample, &cal);
        state.update(t_fine);
        assert_eq!(state.t_fine_for(&sample).unwrap(), t_fine);

        let next = bme_sample(11);
        assert!(matches!(
            state.t_fine_for(&next),
            Err(CompensationError::StaleTFine { .. })
        ));
    }

    #[test]
    fn test_missing_channel() {
        let cal = bme280_reference();
        let sample = RawSample::new(1, 519888);
        let (_, t_fine) = bme280::temperature(&sample, &cal);
        assert_eq!(
            bme280::pressure(&sample, &cal, t_fine).unwrap_err(),
            CompensationError::MissingChannel(Quantity::Pressure)
        );
    }

    #[test]
    fn test_bmp180_reference() {
        let cal = bmp180_reference();
        let sample = RawSample::new(1, 27898).with_pressure(23843);
        let (t, b5) = bmp180::temperature(&sample, &cal).unwrap();
        assert_eq!(b5.value(), 2400);
        assert!((t - 15.0).abs() < 1e-12);
        let p = bmp180::pressure(&sample, &cal, b5, 0).unwrap();
        assert_eq!(p, 69964.0);
    }

    #[test]
    fn test_bmp180_high_b7_branch() {
        // UP < B3 faz B7 passar de 0x8000_0000
        let cal = Bmp180Calibration {
            ac1: 32767,
            ac4: 1,
            md: 1,
            ..Bmp180Calibration::default()
        };
        let sample = RawSample::new(1, 0).with_pressure(0);
        let (_, b5) = bmp180::temperature(&sample, &cal).unwrap();
        assert_eq!(
            bmp180::pressure(&sample, &cal, b5, 0).unwrap_err(),
            CompensationError::Overflow("B7 / B4 * 2")
        );

        // com B4 realista o mesmo ramo divide antes de dobrar
        let cal = Bmp180Calibration {
            ac4: 32768,
            ..cal
        };
        let (_, b5) = bmp180::temperature(&sample, &cal).unwrap();
        let p = bmp180::pressure(&sample, &cal, b5, 0).unwrap();
        assert!(p.is_finite());
    }

    #[test]
    fn test_bmp180_zero_divisor() {
        let mut cal = bmp180_reference();
        // X1 = ((UT - AC6) * AC5) >> 15 == 0 quando UT == AC6
        cal.md = 0;
        let sample = RawSample::new(1, cal.ac6 as u32).with_pressure(23843);
        assert_eq!(
            bmp180::temperature(&sample, &cal).unwrap_err(),
            CompensationError::ZeroDivisor("X1 + MD")
        );
    }
}
