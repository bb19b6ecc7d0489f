//! Persisted calibration
//!
//! Polarity and gains found by tuning, stored as postcard binary data so a
//! restart only needs zeroing before closed loop can run again.

use serde::{Deserialize, Serialize};

use crate::coils::CoilPolarity;
use crate::pid::PidGains;
use crate::traits::EncoderType;
use crate::tuning::UltimateGain;

/// Magic number to identify valid calibration data
pub const CALIBRATION_MAGIC: u32 = 0x5353_434C; // "SSCL"

/// Current calibration data version
pub const CALIBRATION_VERSION: u8 = 1;

/// Upper bound of an encoded record
pub const CALIBRATION_MAX_SIZE: usize = 64;

/// Calibration load/store failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// Record does not fit the buffer or could not be parsed
    Encoding,
    /// Wrong magic or version
    InvalidHeader,
    /// CRC mismatch
    Corrupt,
    /// Recorded for a different encoder setup
    Mismatch,
}

impl CalibrationError {
    pub fn message(self) -> &'static str {
        match self {
            Self::Encoding => "Calibration record could not be encoded",
            Self::InvalidHeader => "Calibration record has wrong magic or version",
            Self::Corrupt => "Calibration record checksum mismatch",
            Self::Mismatch => "Calibration was recorded for another encoder setup",
        }
    }
}

/// Calibration of one drive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationRecord {
    pub magic: u32,
    pub version: u8,
    /// Encoder the calibration was measured with
    pub encoder_type: EncoderType,
    pub counts_per_step: f32,
    pub polarity: CoilPolarity,
    pub gains: PidGains,
    pub ultimate: Option<UltimateGain>,
    /// CRC32 over every field above
    pub crc: u32,
}

impl CalibrationRecord {
    pub fn new(
        encoder_type: EncoderType,
        counts_per_step: f32,
        polarity: CoilPolarity,
        gains: PidGains,
        ultimate: Option<UltimateGain>,
    ) -> Self {
        let mut record = Self {
            magic: CALIBRATION_MAGIC,
            version: CALIBRATION_VERSION,
            encoder_type,
            counts_per_step,
            polarity,
            gains,
            ultimate,
            crc: 0,
        };
        record.update_crc();
        record
    }

    /// Check if the header matches this firmware
    pub fn is_valid(&self) -> bool {
        self.magic == CALIBRATION_MAGIC && self.version == CALIBRATION_VERSION
    }

    /// CRC32 of the record, excluding the crc field itself
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;
        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version, self.encoder_type as u8]);
        crc = crc32_update(crc, &self.counts_per_step.to_le_bytes());
        crc = crc32_update(crc, &[self.polarity.bits()]);
        crc = crc32_update(crc, &self.gains.kp.to_le_bytes());
        crc = crc32_update(crc, &self.gains.ki.to_le_bytes());
        crc = crc32_update(crc, &self.gains.kd.to_le_bytes());
        match self.ultimate {
            Some(ultimate) => {
                crc = crc32_update(crc, &[1]);
                crc = crc32_update(crc, &ultimate.gain.to_le_bytes());
                crc = crc32_update(crc, &ultimate.period.to_le_bytes());
            }
            None => crc = crc32_update(crc, &[0]),
        }
        !crc
    }

    pub fn update_crc(&mut self) {
        self.crc = self.calculate_crc();
    }

    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }

    /// Serialize into `buf`, returning the encoded length
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, CalibrationError> {
        postcard::to_slice(self, buf)
            .map(|used| used.len())
            .map_err(|_| CalibrationError::Encoding)
    }

    /// Parse and check a stored record
    pub fn decode(bytes: &[u8]) -> Result<Self, CalibrationError> {
        let record: Self = postcard::from_bytes(bytes).map_err(|_| CalibrationError::Encoding)?;
        if !record.is_valid() {
            return Err(CalibrationError::InvalidHeader);
        }
        if !record.verify_crc() {
            return Err(CalibrationError::Corrupt);
        }
        Ok(record)
    }
}

/// CRC32 update, IEEE 802.3 polynomial
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CalibrationRecord {
        CalibrationRecord::new(
            EncoderType::As5047,
            16.0,
            CoilPolarity::new(true, false),
            PidGains::new(120.0, 0.5, 12.0),
            Some(UltimateGain {
                gain: 4900.0,
                period: 6.0,
            }),
        )
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(!crc32_update(0xFFFF_FFFF, b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_new_record_is_valid() {
        let record = sample();
        assert!(record.is_valid());
        assert!(record.verify_crc());
    }

    #[test]
    fn test_crc_detects_changes() {
        let mut record = sample();
        record.gains.kp = 121.0;
        assert!(!record.verify_crc());
        record.update_crc();
        assert!(record.verify_crc());

        let mut record = sample();
        record.ultimate = None;
        assert!(!record.verify_crc());
    }

    #[test]
    fn test_encode_decode() {
        let record = sample();
        let mut buf = [0u8; CALIBRATION_MAX_SIZE];
        let len = record.encode(&mut buf).unwrap();
        assert_eq!(CalibrationRecord::decode(&buf[..len]), Ok(record));
    }

    #[test]
    fn test_decode_rejections() {
        let mut buf = [0u8; CALIBRATION_MAX_SIZE];

        let mut record = sample();
        record.version = 9;
        record.update_crc();
        let len = record.encode(&mut buf).unwrap();
        assert_eq!(
            CalibrationRecord::decode(&buf[..len]),
            Err(CalibrationError::InvalidHeader)
        );

        let mut record = sample();
        record.crc ^= 1;
        let len = record.encode(&mut buf).unwrap();
        assert_eq!(
            CalibrationRecord::decode(&buf[..len]),
            Err(CalibrationError::Corrupt)
        );

        assert_eq!(
            CalibrationRecord::decode(&buf[..2]),
            Err(CalibrationError::Encoding)
        );
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut buf = [0u8; 4];
        assert_eq!(sample().encode(&mut buf), Err(CalibrationError::Encoding));
    }
}
