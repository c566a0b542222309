//! Decodificação das constantes de calibração de fábrica
//!
//! Cada sensor grava seus coeficientes em blocos fixos de registradores.
//! Os campos misturam larguras e sinais: campos sem sinal são remontados
//! diretamente, campos com sinal passam por extensão de sinal em
//! complemento de dois a partir da largura declarada. Campos de 12 bits
//! que compartilham um byte (H4/H5 do BME280) são isolados por máscara
//! antes da interpretação do sinal.

use serde::Serialize;
use thiserror::Error;

/// Erros de decodificação
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("calibration block {block} too short: expected {expected} bytes, got {got}")]
    ShortBlock {
        block: &'static str,
        expected: usize,
        got: usize,
    },
}

pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// Estende o sinal de um campo de `bits` bits (complemento de dois)
pub fn sign_extend(raw: u32, bits: u32) -> i32 {
    debug_assert!((1..=32).contains(&bits));
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}

/// Leitor de campos sobre um bloco bruto já com tamanho verificado
#[derive(Debug, Clone, Copy)]
pub struct FieldReader<'a> {
    bytes: &'a [u8],
}

impl<'a> FieldReader<'a> {
    /// Verifica o tamanho do bloco antes de qualquer extração
    pub fn new(block: &'static str, bytes: &'a [u8], expected: usize) -> CalibrationResult<Self> {
        if bytes.len() < expected {
            return Err(CalibrationError::ShortBlock {
                block,
                expected,
                got: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    pub fn u8(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    pub fn i8(&self, offset: usize) -> i8 {
        sign_extend(self.bytes[offset] as u32, 8) as i8
    }

    pub fn u16_le(&self, offset: usize) -> u16 {
        u16::from(self.bytes[offset]) | (u16::from(self.bytes[offset + 1]) << 8)
    }

    pub fn i16_le(&self, offset: usize) -> i16 {
        sign_extend(self.u16_le(offset) as u32, 16) as i16
    }

    pub fn u16_be(&self, offset: usize) -> u16 {
        (u16::from(self.bytes[offset]) << 8) | u16::from(self.bytes[offset + 1])
    }

    pub fn i16_be(&self, offset: usize) -> i16 {
        sign_extend(self.u16_be(offset) as u32, 16) as i16
    }
}

/// Coleção imutável de constantes nomeadas
pub trait CalibrationSet {
    /// Todas as constantes, na ordem do datasheet
    fn entries(&self) -> Vec<(&'static str, i32)>;

    /// Busca uma constante pelo nome (ex.: `"dig_T1"`)
    fn get(&self, name: &str) -> Option<i32> {
        self.entries()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BME280
// ═══════════════════════════════════════════════════════════════════════════════

/// Registrador inicial do bloco dig_T1..dig_H1
pub const BME280_CALIB_00: u8 = 0x88;
pub const BME280_CALIB_00_LEN: usize = 26;
/// Registrador inicial do bloco dig_H2..dig_H6
pub const BME280_CALIB_26: u8 = 0xE1;
pub const BME280_CALIB_26_LEN: usize = 7;

/// Coeficientes do BME280 (temperatura T1-T3, pressão P1-P9, umidade H1-H6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Bme280Calibration {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    /// 12 bits com sinal: 0xE4[7:0] << 4 | 0xE5[3:0]
    pub dig_h4: i16,
    /// 12 bits com sinal: 0xE6[7:0] << 4 | 0xE5[7:4]
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl Bme280Calibration {
    /// Decodifica os dois blocos lidos em 0x88 (26 bytes) e 0xE1 (7 bytes)
    pub fn decode(calib_00: &[u8], calib_26: &[u8]) -> CalibrationResult<Self> {
        let a = FieldReader::new("0x88", calib_00, BME280_CALIB_00_LEN)?;
        let b = FieldReader::new("0xE1", calib_26, BME280_CALIB_26_LEN)?;

        // 0xE5 é dividido entre H4 (nibble baixo) e H5 (nibble alto)
        let e5 = b.u8(4) as u32;
        let h4_raw = ((b.u8(3) as u32) << 4) | (e5 & 0x0F);
        let h5_raw = ((b.u8(5) as u32) << 4) | ((e5 >> 4) & 0x0F);

        Ok(Self {
            dig_t1: a.u16_le(0),
            dig_t2: a.i16_le(2),
            dig_t3: a.i16_le(4),
            dig_p1: a.u16_le(6),
            dig_p2: a.i16_le(8),
            dig_p3: a.i16_le(10),
            dig_p4: a.i16_le(12),
            dig_p5: a.i16_le(14),
            dig_p6: a.i16_le(16),
            dig_p7: a.i16_le(18),
            dig_p8: a.i16_le(20),
            dig_p9: a.i16_le(22),
            // byte 24 (0xA0) não é usado
            dig_h1: a.u8(25),
            dig_h2: b.i16_le(0),
            dig_h3: b.u8(2),
            dig_h4: sign_extend(h4_raw, 12) as i16,
            dig_h5: sign_extend(h5_raw, 12) as i16,
            dig_h6: b.i8(6),
        })
    }
}

impl CalibrationSet for Bme280Calibration {
    fn entries(&self) -> Vec<(&'static str, i32)> {
        vec![
            ("dig_T1", self.dig_t1 as i32),
            ("dig_T2", self.dig_t2 as i32),
            ("dig_T3", self.dig_t3 as i32),
            ("dig_P1", self.dig_p1 as i32),
            ("dig_P2", self.dig_p2 as i32),
            ("dig_P3", self.dig_p3 as i32),
            ("dig_P4", self.dig_p4 as i32),
            ("dig_P5", self.dig_p5 as i32),
            ("dig_P6", self.dig_p6 as i32),
            ("dig_P7", self.dig_p7 as i32),
            ("dig_P8", self.dig_p8 as i32),
            ("dig_P9", self.dig_p9 as i32),
            ("dig_H1", self.dig_h1 as i32),
            ("dig_H2", self.dig_h2 as i32),
            ("dig_H3", self.dig_h3 as i32),
            ("dig_H4", self.dig_h4 as i32),
            ("dig_H5", self.dig_h5 as i32),
            ("dig_H6", self.dig_h6 as i32),
        ]
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BMP180
// ═══════════════════════════════════════════════════════════════════════════════

pub const BMP180_CALIB: u8 = 0xAA;
pub const BMP180_CALIB_LEN: usize = 22;

/// Coeficientes do BMP180 (11 palavras big-endian em 0xAA..0xBF)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Bmp180Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl Bmp180Calibration {
    pub fn decode(block: &[u8]) -> CalibrationResult<Self> {
        let r = FieldReader::new("0xAA", block, BMP180_CALIB_LEN)?;
        Ok(Self {
            ac1: r.i16_be(0),
            ac2: r.i16_be(2),
            ac3: r.i16_be(4),
            ac4: r.u16_be(6),
            ac5: r.u16_be(8),
            ac6: r.u16_be(10),
            b1: r.i16_be(12),
            b2: r.i16_be(14),
            mb: r.i16_be(16),
            mc: r.i16_be(18),
            md: r.i16_be(20),
        })
    }
}

impl CalibrationSet for Bmp180Calibration {
    fn entries(&self) -> Vec<(&'static str, i32)> {
        vec![
            ("AC1", self.ac1 as i32),
            ("AC2", self.ac2 as i32),
            ("AC3", self.ac3 as i32),
            ("AC4", self.ac4 as i32),
            ("AC5", self.ac5 as i32),
            ("AC6", self.ac6 as i32),
            ("B1", self.b1 as i32),
            ("B2", self.b2 as i32),
            ("MB", self.mb as i32),
            ("MC", self.mc as i32),
            ("MD", self.md as i32),
        ]
    }
}
