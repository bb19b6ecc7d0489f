//! Motor command translation
//!
//! Converts a phase and a current magnitude into the two signed coil
//! currents of a bipolar stepper, applying the configured coil polarity.

use crate::phase::PHASE_CYCLE;
use crate::traits::MotorDriver;
use libm::roundf;
use serde::{Deserialize, Serialize};

/// Full-scale coil current command
pub const COIL_FULL_SCALE: f32 = 255.0;

/// Scale from idsp's full-range i32 output to [-1, 1]
const I32_TO_F32: f32 = 1.0 / 2147483648.0;

/// Sign applied to each coil's current
///
/// `true` drives the coil with its natural sign, `false` reverses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoilPolarity {
    pub coil_a: bool,
    pub coil_b: bool,
}

impl CoilPolarity {
    /// Every sign combination, in the order polarity detection tries them
    pub const ALL: [CoilPolarity; 4] = [
        CoilPolarity::new(true, true),
        CoilPolarity::new(false, true),
        CoilPolarity::new(true, false),
        CoilPolarity::new(false, false),
    ];

    pub const fn new(coil_a: bool, coil_b: bool) -> Self {
        Self { coil_a, coil_b }
    }

    /// Decode the configuration form: bit 0 reverses coil A, bit 1 coil B
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits > 3 {
            return None;
        }
        Some(Self::new(bits & 0x01 == 0, bits & 0x02 == 0))
    }

    pub fn bits(self) -> u8 {
        (!self.coil_a as u8) | ((!self.coil_b as u8) << 1)
    }

    fn sign(forward: bool) -> f32 {
        if forward {
            1.0
        } else {
            -1.0
        }
    }
}

impl Default for CoilPolarity {
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// A pair of coil current commands, each in `-255..=255`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoilCurrents {
    pub a: i16,
    pub b: i16,
}

/// Cosine and sine of a phase in `0..4096`, both in [-1, 1]
pub fn phase_cos_sin(phase: u16) -> (f32, f32) {
    // One phase cycle spans the whole i32 range
    let angle = (((phase % PHASE_CYCLE) as u32) << 20) as i32;
    let (cos, sin) = idsp::cossin(angle);
    (cos as f32 * I32_TO_F32, sin as f32 * I32_TO_F32)
}

/// Compute the coil currents for a phase and magnitude
///
/// `magnitude` is clamped to [0, 1] and then raised to `hold_fraction` so an
/// active motor never drops below holding current.
pub fn coil_currents(
    phase: u16,
    magnitude: f32,
    polarity: CoilPolarity,
    hold_fraction: f32,
) -> CoilCurrents {
    let magnitude = magnitude.clamp(0.0, 1.0).max(hold_fraction.clamp(0.0, 1.0));
    let (cos, sin) = phase_cos_sin(phase);

    let a = COIL_FULL_SCALE * CoilPolarity::sign(polarity.coil_a) * magnitude * cos;
    let b = COIL_FULL_SCALE * CoilPolarity::sign(polarity.coil_b) * magnitude * sin;

    CoilCurrents {
        a: roundf(a) as i16,
        b: roundf(b) as i16,
    }
}

/// Compute the coil currents and issue them to the driver
pub fn apply<M: MotorDriver>(
    driver: &mut M,
    phase: u16,
    magnitude: f32,
    polarity: CoilPolarity,
    hold_fraction: f32,
) -> CoilCurrents {
    let currents = coil_currents(phase, magnitude, polarity, hold_fraction);
    driver.set_phase_currents(currents.a, currents.b);
    currents
}

#[cfg(test)]
mod tests {
    use super::*;

    fn near(value: i16, expected: i16) -> bool {
        (value - expected).abs() <= 1
    }

    #[test]
    fn test_quadrature_points() {
        let pol = CoilPolarity::default();
        let c = coil_currents(0, 1.0, pol, 0.0);
        assert!(near(c.a, 255) && near(c.b, 0), "{:?}", c);

        let c = coil_currents(1024, 1.0, pol, 0.0);
        assert!(near(c.a, 0) && near(c.b, 255), "{:?}", c);

        let c = coil_currents(2048, 1.0, pol, 0.0);
        assert!(near(c.a, -255) && near(c.b, 0), "{:?}", c);

        let c = coil_currents(3072, 1.0, pol, 0.0);
        assert!(near(c.a, 0) && near(c.b, -255), "{:?}", c);
    }

    #[test]
    fn test_polarity_reverses_coils() {
        let c = coil_currents(512, 1.0, CoilPolarity::new(false, true), 0.0);
        assert!(c.a < -170 && c.b > 170, "{:?}", c);

        let c = coil_currents(512, 1.0, CoilPolarity::new(true, false), 0.0);
        assert!(c.a > 170 && c.b < -170, "{:?}", c);
    }

    #[test]
    fn test_hold_fraction_floor() {
        let pol = CoilPolarity::default();
        let c = coil_currents(0, 0.0, pol, 0.25);
        assert!(near(c.a, 64), "{:?}", c);

        // Above the floor the magnitude passes through
        let c = coil_currents(0, 0.5, pol, 0.25);
        assert!(near(c.a, 128), "{:?}", c);

        // Magnitude is clamped to full scale
        let c = coil_currents(0, 3.0, pol, 0.25);
        assert!(near(c.a, 255), "{:?}", c);
    }

    #[test]
    fn test_polarity_bits() {
        assert_eq!(CoilPolarity::from_bits(0), Some(CoilPolarity::new(true, true)));
        assert_eq!(CoilPolarity::from_bits(1), Some(CoilPolarity::new(false, true)));
        assert_eq!(CoilPolarity::from_bits(2), Some(CoilPolarity::new(true, false)));
        assert_eq!(CoilPolarity::from_bits(4), None);
        for (bits, pol) in CoilPolarity::ALL.iter().enumerate() {
            assert_eq!(pol.bits(), bits as u8);
        }
    }

    struct Recorder {
        last: Option<(i16, i16)>,
    }

    impl MotorDriver for Recorder {
        fn set_phase_currents(&mut self, coil_a: i16, coil_b: i16) {
            self.last = Some((coil_a, coil_b));
        }
        fn update_pending(&self) -> bool {
            false
        }
        fn microstepping(&self) -> crate::traits::Microstepping {
            Default::default()
        }
        fn is_direct_drive(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_apply_issues_to_driver() {
        let mut driver = Recorder { last: None };
        let c = apply(&mut driver, 1024, 1.0, CoilPolarity::default(), 0.0);
        assert_eq!(driver.last, Some((c.a, c.b)));
    }
}
