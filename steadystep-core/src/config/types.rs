//! Closed loop configuration
//!
//! The configuration command arrives with its parameters already parsed; all
//! of them are validated before anything is committed.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::coils::CoilPolarity;
use crate::traits::EncoderType;

/// Closed loop settings that are not owned by the PID controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClosedLoopConfig {
    /// Encoder fitted to this drive
    pub encoder_type: EncoderType,
    /// Encoder counts per full motor step
    pub counts_per_step: f32,
    /// Position error (steps) that counts as a warning excursion, 0 = off
    pub warning_threshold: f32,
    /// Position error (steps) that counts as an error excursion, 0 = off
    pub error_threshold: f32,
    /// Coil current signs
    pub polarity: CoilPolarity,
    /// Minimum current magnitude while active, as a fraction of full scale
    pub hold_current: f32,
}

impl Default for ClosedLoopConfig {
    fn default() -> Self {
        Self {
            encoder_type: EncoderType::None,
            counts_per_step: 1.0,
            warning_threshold: 0.0,
            error_threshold: 0.0,
            polarity: CoilPolarity::default(),
            hold_current: 0.0,
        }
    }
}

/// Parsed parameters of a configuration command
///
/// Every field is optional; an all-empty request asks for a report.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigureRequest {
    pub enable: Option<bool>,
    pub encoder_type: Option<u8>,
    pub counts_per_step: Option<f32>,
    pub kp: Option<f32>,
    pub ki: Option<f32>,
    pub kd: Option<f32>,
    pub warning_threshold: Option<f32>,
    pub error_threshold: Option<f32>,
    pub polarity: Option<u8>,
    pub hold_current: Option<f32>,
}

impl ConfigureRequest {
    /// True when no parameter is present
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Configuration rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    EncoderTypeOutOfRange,
    /// Closed loop requested without an encoder
    NoEncoderForClosedLoop,
    /// The board could not provide the requested encoder
    EncoderUnavailable,
    InvalidCountsPerStep,
    InvalidGain,
    NegativeThreshold,
    PolarityOutOfRange,
    HoldCurrentOutOfRange,
}

impl ConfigError {
    pub fn message(self) -> &'static str {
        match self {
            Self::EncoderTypeOutOfRange => "Encoder type out of range",
            Self::NoEncoderForClosedLoop => "Invalid encoder type for closed loop mode",
            Self::EncoderUnavailable => "Encoder not available on this board",
            Self::InvalidCountsPerStep => "Encoder counts per step must be positive",
            Self::InvalidGain => "PID gains must be finite and non-negative",
            Self::NegativeThreshold => "Error thresholds must not be negative",
            Self::PolarityOutOfRange => "Coil polarity must be 0 to 3",
            Self::HoldCurrentOutOfRange => "Holding current must be 0 to 1",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

fn valid_gain(value: Option<f32>) -> bool {
    value.map_or(true, |v| v.is_finite() && v >= 0.0)
}

fn valid_threshold(value: Option<f32>) -> bool {
    value.map_or(true, |v| v >= 0.0)
}

/// Settings a request would produce, checked but not yet applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedConfig {
    pub enable: bool,
    pub config: ClosedLoopConfig,
    /// Encoder type differs from the current one
    pub encoder_changed: bool,
    /// Encoder type or counts per step changed, so tuning is void
    pub invalidates_tuning: bool,
}

impl ConfigureRequest {
    /// Check every parameter against the current settings
    ///
    /// `has_encoder` tells whether an encoder is currently attached.
    pub fn validate(
        &self,
        current: &ClosedLoopConfig,
        enabled: bool,
        has_encoder: bool,
    ) -> Result<ValidatedConfig, ConfigError> {
        let enable = self.enable.unwrap_or(enabled);

        let encoder_type = match self.encoder_type {
            Some(raw) => EncoderType::from_u8(raw).ok_or(ConfigError::EncoderTypeOutOfRange)?,
            None => current.encoder_type,
        };
        let encoder_changed = encoder_type != current.encoder_type;
        let will_have_encoder = if encoder_changed {
            encoder_type != EncoderType::None
        } else {
            has_encoder && encoder_type != EncoderType::None
        };
        if enable && !will_have_encoder {
            return Err(ConfigError::NoEncoderForClosedLoop);
        }

        let counts_per_step = self.counts_per_step.unwrap_or(current.counts_per_step);
        if !(counts_per_step.is_finite() && counts_per_step > 0.0) {
            return Err(ConfigError::InvalidCountsPerStep);
        }

        if !(valid_gain(self.kp) && valid_gain(self.ki) && valid_gain(self.kd)) {
            return Err(ConfigError::InvalidGain);
        }

        if !(valid_threshold(self.warning_threshold) && valid_threshold(self.error_threshold)) {
            return Err(ConfigError::NegativeThreshold);
        }

        let polarity = match self.polarity {
            Some(bits) => CoilPolarity::from_bits(bits).ok_or(ConfigError::PolarityOutOfRange)?,
            None => current.polarity,
        };

        let hold_current = self.hold_current.unwrap_or(current.hold_current);
        if !(0.0..=1.0).contains(&hold_current) {
            return Err(ConfigError::HoldCurrentOutOfRange);
        }

        Ok(ValidatedConfig {
            enable,
            config: ClosedLoopConfig {
                encoder_type,
                counts_per_step,
                warning_threshold: self.warning_threshold.unwrap_or(current.warning_threshold),
                error_threshold: self.error_threshold.unwrap_or(current.error_threshold),
                polarity,
                hold_current,
            },
            encoder_changed,
            invalidates_tuning: encoder_changed || counts_per_step != current.counts_per_step,
        })
    }
}
