//! Position encoder trait

use serde::{Deserialize, Serialize};

/// Supported encoder kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EncoderType {
    /// No encoder fitted, closed loop not possible
    #[default]
    None = 0,
    /// Incremental quadrature encoder on a linear axis
    LinearQuadrature = 1,
    /// Incremental quadrature encoder on the motor shaft
    RotaryQuadrature = 2,
    /// AS5047 absolute magnetic encoder
    As5047 = 3,
    /// TLI5012 absolute magnetic encoder
    Tli5012 = 4,
}

impl EncoderType {
    /// Highest valid raw encoder type value
    pub const MAX: u8 = 4;

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::LinearQuadrature),
            2 => Some(Self::RotaryQuadrature),
            3 => Some(Self::As5047),
            4 => Some(Self::Tli5012),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::LinearQuadrature => "linear quadrature",
            Self::RotaryQuadrature => "rotary quadrature",
            Self::As5047 => "AS5047",
            Self::Tli5012 => "TLI5012",
        }
    }
}

/// Errors that can occur with encoder operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncoderError {
    /// The encoder does not support the requested operation
    Unsupported,
}

/// Trait for position encoders
///
/// Implementations wrap a concrete encoder peripheral (quadrature timer,
/// SPI magnetic sensor, ...). Readings are raw counts.
pub trait Encoder {
    /// Read the current position in encoder counts
    fn reading(&mut self) -> i32;

    /// Start the encoder
    fn enable(&mut self);

    /// Which kind of encoder this is
    fn kind(&self) -> EncoderType;

    /// Set an offset added to every reading
    ///
    /// Only incremental encoders can do this in hardware. The default
    /// reports it as unsupported so callers fall back to a software offset.
    fn set_offset(&mut self, _offset: i32) -> Result<(), EncoderError> {
        Err(EncoderError::Unsupported)
    }
}

impl<T: Encoder + ?Sized> Encoder for &mut T {
    fn reading(&mut self) -> i32 {
        (**self).reading()
    }

    fn enable(&mut self) {
        (**self).enable()
    }

    fn kind(&self) -> EncoderType {
        (**self).kind()
    }

    fn set_offset(&mut self, offset: i32) -> Result<(), EncoderError> {
        (**self).set_offset(offset)
    }
}
