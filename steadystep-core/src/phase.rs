//! Step position to coil phase mapping
//!
//! One electrical cycle spans four full steps and is represented by a phase
//! value in `0..4096`. Every place that derives a phase from a position goes
//! through [`map_to_phase`] so the control loop and the tuning maneuvers agree.

use libm::floorf;

/// Number of phase units in one electrical cycle
pub const PHASE_CYCLE: u16 = 4096;

/// Largest phase value produced by [`map_to_phase`]
pub const PHASE_MAX: u16 = PHASE_CYCLE - 1;

/// Full steps per electrical cycle
pub const STEPS_PER_CYCLE: f32 = 4.0;

/// Map a step position to a phase in `0..=4095`
///
/// Negative positions wrap into the same cycle as positive ones, so the
/// mapping is continuous through zero and periodic every four steps.
pub fn map_to_phase(step_position: f32) -> u16 {
    let cycles = step_position / STEPS_PER_CYCLE;
    // floor keeps the fraction in [0, 1) for negative positions too
    let fraction = cycles - floorf(cycles);
    let phase = (fraction * PHASE_MAX as f32) as u16;
    phase.min(PHASE_MAX)
}

/// Reduce an arbitrary phase value into `0..4096`
pub fn wrap_phase(phase: i32) -> u16 {
    phase.rem_euclid(PHASE_CYCLE as i32) as u16
}

/// Shortest distance between two phases around the cycle
pub fn phase_distance(a: u16, b: u16) -> u16 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let direct = hi - lo;
    let around = PHASE_MAX.saturating_sub(hi) + lo;
    direct.min(around)
}
