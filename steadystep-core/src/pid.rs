//! PID position controller
//!
//! Turns the position error (in steps) into a bounded control signal that
//! sets both the phase lead and the current magnitude of the coils.

use libm::fabsf;

/// Control signal bound, in either direction
pub const SIGNAL_LIMIT: i16 = 255;

/// Integral accumulation stops once it would reach this magnitude
pub const INTEGRAL_LIMIT: f32 = 512.0;

/// PID coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct PidGains {
    /// Proportional gain (Kp)
    pub kp: f32,
    /// Integral gain (Ki)
    pub ki: f32,
    /// Derivative gain (Kd)
    pub kd: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }

    /// Proportional-only gains, as used during gain search
    pub const fn proportional(kp: f32) -> Self {
        Self { kp, ki: 0.0, kd: 0.0 }
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self::new(100.0, 0.0, 10.0)
    }
}

/// Individual terms of the last update, kept for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidTerms {
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

/// PID controller state
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    integral: f32,
    last_error: f32,
    terms: PidTerms,
    error: f32,
    signal: i16,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            last_error: 0.0,
            terms: PidTerms::default(),
            error: 0.0,
            signal: 0,
        }
    }

    /// Replace the gains; they apply from the next update
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Run one control step and return the clamped signal
    pub fn update(&mut self, current: f32, target: f32) -> i16 {
        let error = target - current;

        let p = self.gains.kp * error;

        // Accumulation is frozen, not clamped, once the bound would be reached.
        // This also blocks steps that would shrink an oversized integral.
        let next = self.integral + self.gains.ki * error;
        if fabsf(next) < INTEGRAL_LIMIT {
            self.integral = next;
        }

        let d = self.gains.kd * (self.last_error - error);

        let sum = p + self.integral + d;
        let limit = SIGNAL_LIMIT as f32;
        self.signal = sum.clamp(-limit, limit) as i16;

        self.terms = PidTerms {
            p,
            i: self.integral,
            d,
        };
        self.error = error;
        self.last_error = error;
        self.signal
    }

    /// Clear integral and derivative history
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
        self.terms = PidTerms::default();
        self.error = 0.0;
        self.signal = 0;
    }

    pub fn signal(&self) -> i16 {
        self.signal
    }

    pub fn terms(&self) -> PidTerms {
        self.terms
    }

    /// Position error seen by the last update
    pub fn error(&self) -> f32 {
        self.error
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }
}

impl Default for PidController {
    fn default() -> Self {
        Self::new(PidGains::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_gains() {
        let gains = PidGains::default();
        assert_eq!(gains, PidGains::new(100.0, 0.0, 10.0));
    }

    #[test]
    fn test_fixed_error_saturates() {
        let mut pid = PidController::default();
        let signal = pid.update(0.0, 5.0);

        let terms = pid.terms();
        assert_eq!(terms.p, 500.0);
        assert_eq!(terms.i, 0.0);
        assert_eq!(terms.d, -50.0);
        assert_eq!(signal, 255);
        assert_eq!(pid.error(), 5.0);
    }

    #[test]
    fn test_negative_error_saturates() {
        let mut pid = PidController::default();
        assert_eq!(pid.update(5.0, 0.0), -255);
    }

    #[test]
    fn test_derivative_uses_last_error() {
        let mut pid = PidController::new(PidGains::new(0.0, 0.0, 2.0));
        pid.update(0.0, 1.0);
        pid.update(0.0, 3.0);
        // kd * (last - current) = 2 * (1 - 3)
        assert_eq!(pid.terms().d, -4.0);
        assert_eq!(pid.signal(), -4);
    }

    #[test]
    fn test_integral_accumulates() {
        let mut pid = PidController::new(PidGains::new(0.0, 10.0, 0.0));
        for _ in 0..5 {
            pid.update(0.0, 1.0);
        }
        assert_eq!(pid.integral(), 50.0);
        assert_eq!(pid.signal(), 50);
    }

    #[test]
    fn test_integral_freezes_below_limit() {
        let mut pid = PidController::new(PidGains::new(0.0, 100.0, 0.0));
        for _ in 0..10 {
            pid.update(0.0, 1.0);
        }
        // 500 + 100 would reach the limit, so it stays at 500
        assert_eq!(pid.integral(), 500.0);
    }

    #[test]
    fn test_integral_freeze_blocks_large_opposing_step() {
        let mut pid = PidController::new(PidGains::new(0.0, 100.0, 0.0));
        for _ in 0..5 {
            pid.update(0.0, 1.0);
        }
        assert_eq!(pid.integral(), 500.0);

        // 500 - 1100 = -600 is out of bounds: the update is dropped even
        // though it would have reduced the accumulated value
        pid.update(11.0, 0.0);
        assert_eq!(pid.integral(), 500.0);

        // Smaller opposing steps still go through
        pid.update(1.0, 0.0);
        assert_eq!(pid.integral(), 400.0);
    }

    #[test]
    fn test_gain_change_applies_next_update() {
        let mut pid = PidController::default();
        pid.update(0.0, 1.0);
        pid.set_gains(PidGains::proportional(20.0));
        pid.update(0.0, 1.0);
        assert_eq!(pid.terms().d, 0.0);
        assert_eq!(pid.signal(), 20);
    }

    #[test]
    fn test_reset() {
        let mut pid = PidController::new(PidGains::new(1.0, 1.0, 1.0));
        pid.update(0.0, 3.0);
        pid.reset();
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.signal(), 0);
        // No derivative kick from stale history
        pid.update(0.0, 0.0);
        assert_eq!(pid.terms().d, 0.0);
    }

    proptest! {
        #[test]
        fn integral_and_signal_stay_bounded(
            ki in 0.0f32..200.0,
            kp in 0.0f32..500.0,
            errors in proptest::collection::vec(-50.0f32..50.0, 1..200),
        ) {
            let mut pid = PidController::new(PidGains::new(kp, ki, 10.0));
            for error in errors {
                let signal = pid.update(0.0, error);
                prop_assert!(fabsf(pid.integral()) < INTEGRAL_LIMIT);
                prop_assert!((-SIGNAL_LIMIT..=SIGNAL_LIMIT).contains(&signal));
            }
        }
    }
}
