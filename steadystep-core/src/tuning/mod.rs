//! Tuning maneuvers and calibration state
//!
//! Maneuvers are requested as a set and always run in a fixed priority
//! order. Each maneuver clears its pending bit and the calibration error it
//! is responsible for; calibration errors gate normal control.
//!
//! The bitmask forms only appear at the command boundary
//! ([`ManeuverSet::from_bits`], [`TuningErrors::bits`]).

pub mod maneuvers;
pub mod ziegler;

use core::fmt;

pub use maneuvers::TuningReport;
pub use ziegler::{GainRig, OscillationDetector, UltimateGain};

/// Ticks between driver update-pending polls
pub const SETTLE_POLL_TICKS: u32 = 10;

/// Ticks to wait for the rotor to come to rest after a move
pub const SETTLE_TICKS: u32 = 100;

/// Update-pending polls before the driver is declared unresponsive
pub const DRIVER_POLL_LIMIT: u32 = 100;

/// Phase points visited by polarity detection and polarity check
pub const SWEEP_POINTS: u16 = 16;

/// Phase distance between sweep points
pub const SWEEP_STEP: u16 = 256;

/// Deviating sweep points tolerated by the polarity check
pub const POLARITY_DEVIATION_LIMIT: u32 = 10;

/// Starting phase of the zeroing ease-in
pub const ZEROING_START_PHASE: u32 = 8192;

/// One tuning maneuver, listed in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Maneuver {
    PolarityDetection,
    Zeroing,
    PolarityCheck,
    ControlCheck,
    EncoderStepsCheck,
    ContinuousPhaseIncrease,
    Step,
    ZieglerNichols,
}

impl Maneuver {
    /// All maneuvers in the order a batch runs them
    pub const ORDER: [Maneuver; 8] = [
        Maneuver::PolarityDetection,
        Maneuver::Zeroing,
        Maneuver::PolarityCheck,
        Maneuver::ControlCheck,
        Maneuver::EncoderStepsCheck,
        Maneuver::ContinuousPhaseIncrease,
        Maneuver::Step,
        Maneuver::ZieglerNichols,
    ];

    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Calibration error that a completed run of this maneuver clears
    pub fn clears(self) -> Option<TuningError> {
        match self {
            Maneuver::PolarityDetection => Some(TuningError::PolarityNotFound),
            Maneuver::Zeroing => Some(TuningError::NotZeroed),
            Maneuver::PolarityCheck => Some(TuningError::PolarityNotChecked),
            Maneuver::ControlCheck => Some(TuningError::ControlNotChecked),
            Maneuver::EncoderStepsCheck => Some(TuningError::EncoderStepsNotChecked),
            Maneuver::ContinuousPhaseIncrease | Maneuver::Step | Maneuver::ZieglerNichols => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Maneuver::PolarityDetection => "polarity detection",
            Maneuver::Zeroing => "zeroing",
            Maneuver::PolarityCheck => "polarity check",
            Maneuver::ControlCheck => "control check",
            Maneuver::EncoderStepsCheck => "encoder steps check",
            Maneuver::ContinuousPhaseIncrease => "continuous phase increase",
            Maneuver::Step => "step",
            Maneuver::ZieglerNichols => "Ziegler-Nichols",
        }
    }
}

/// A set of requested maneuvers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ManeuverSet(u8);

impl ManeuverSet {
    pub const EMPTY: Self = Self(0);
    pub const FULL: Self = Self(0xFF);
    /// Polarity detection plus zeroing
    pub const BASIC: Self = Self(Maneuver::PolarityDetection.bit() | Maneuver::Zeroing.bit());

    /// Parse the command form; bits beyond the defined maneuvers are rejected
    pub fn from_bits(bits: u16) -> Option<Self> {
        u8::try_from(bits).ok().map(Self)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, maneuver: Maneuver) -> bool {
        self.0 & maneuver.bit() != 0
    }

    pub fn insert(&mut self, maneuver: Maneuver) {
        self.0 |= maneuver.bit();
    }

    pub fn remove(&mut self, maneuver: Maneuver) {
        self.0 &= !maneuver.bit();
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// The highest-priority maneuver in the set
    pub fn first(self) -> Option<Maneuver> {
        Maneuver::ORDER.iter().copied().find(|m| self.contains(*m))
    }
}

/// One calibration error flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TuningError {
    PolarityNotFound,
    NotZeroed,
    PolarityNotChecked,
    ControlNotChecked,
    EncoderStepsNotChecked,
    IncorrectPolarity,
    ControlFailed,
    SystemError,
}

impl TuningError {
    pub const ALL: [TuningError; 8] = [
        TuningError::PolarityNotFound,
        TuningError::NotZeroed,
        TuningError::PolarityNotChecked,
        TuningError::ControlNotChecked,
        TuningError::EncoderStepsNotChecked,
        TuningError::IncorrectPolarity,
        TuningError::ControlFailed,
        TuningError::SystemError,
    ];

    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn name(self) -> &'static str {
        match self {
            TuningError::PolarityNotFound => "polarity not found",
            TuningError::NotZeroed => "not zeroed",
            TuningError::PolarityNotChecked => "polarity not checked",
            TuningError::ControlNotChecked => "control not checked",
            TuningError::EncoderStepsNotChecked => "encoder steps not checked",
            TuningError::IncorrectPolarity => "incorrect polarity",
            TuningError::ControlFailed => "control failed",
            TuningError::SystemError => "system error",
        }
    }
}

/// Persistent calibration error flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TuningErrors(u8);

impl TuningErrors {
    pub const NONE: Self = Self(0);

    /// Nothing has been calibrated yet
    pub const INITIAL: Self = Self(
        TuningError::PolarityNotFound.bit()
            | TuningError::NotZeroed.bit()
            | TuningError::PolarityNotChecked.bit()
            | TuningError::ControlNotChecked.bit()
            | TuningError::EncoderStepsNotChecked.bit(),
    );

    /// The minimal tune (polarity detection and zeroing) has not been run
    pub const MINIMAL_TUNE: Self =
        Self(TuningError::PolarityNotFound.bit() | TuningError::NotZeroed.bit());

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, error: TuningError) -> bool {
        self.0 & error.bit() != 0
    }

    pub fn insert(&mut self, error: TuningError) {
        self.0 |= error.bit();
    }

    pub fn remove(&mut self, error: TuningError) {
        self.0 &= !error.bit();
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Flags set here that are not set in `before`
    pub fn introduced_since(self, before: Self) -> Self {
        Self(self.0 & !before.0)
    }

    pub fn iter(self) -> impl Iterator<Item = TuningError> {
        TuningError::ALL.into_iter().filter(move |e| self.contains(*e))
    }
}

impl fmt::Display for TuningErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, error) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(error.name())?;
        }
        Ok(())
    }
}

/// Hard failures that abandon a tuning batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TuningFault {
    /// Driver is not in direct phase current mode
    NotDirectDrive,
    /// No encoder attached
    NoEncoder,
    /// Driver never finished a register update
    DriverTimeout,
}

impl TuningFault {
    pub fn message(self) -> &'static str {
        match self {
            TuningFault::NotDirectDrive => "Driver is not in direct drive mode",
            TuningFault::NoEncoder => "No encoder configured",
            TuningFault::DriverTimeout => "Timed out waiting for driver update",
        }
    }
}

impl fmt::Display for TuningFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
