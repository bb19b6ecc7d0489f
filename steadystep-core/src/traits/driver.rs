//! Stepper motor driver trait
//!
//! The closed loop controller drives the coils directly by phase current,
//! bypassing the driver's own step/direction sequencer.

/// Microstepping setting reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Microstepping {
    /// Microsteps per full step
    pub count: u16,
    /// Whether the driver interpolates to 256 microsteps
    pub interpolation: bool,
}

impl Default for Microstepping {
    fn default() -> Self {
        Self {
            count: 16,
            interpolation: false,
        }
    }
}

/// Trait for stepper drivers with direct coil current control
pub trait MotorDriver {
    /// Command the two coil currents, each in `-255..=255`
    fn set_phase_currents(&mut self, coil_a: i16, coil_b: i16);

    /// True while a register write has not reached the driver yet
    fn update_pending(&self) -> bool;

    /// Current microstepping setting
    fn microstepping(&self) -> Microstepping;

    /// True when the driver is in direct (phase current) mode
    ///
    /// Tuning maneuvers refuse to run otherwise.
    fn is_direct_drive(&self) -> bool;
}

impl<T: MotorDriver + ?Sized> MotorDriver for &mut T {
    fn set_phase_currents(&mut self, coil_a: i16, coil_b: i16) {
        (**self).set_phase_currents(coil_a, coil_b)
    }

    fn update_pending(&self) -> bool {
        (**self).update_pending()
    }

    fn microstepping(&self) -> Microstepping {
        (**self).microstepping()
    }

    fn is_direct_drive(&self) -> bool {
        (**self).is_direct_drive()
    }
}
