//! Ziegler-Nichols ultimate gain search
//!
//! Runs the loop proportional-only and binary searches for the gain at
//! which a target step produces oscillation that no longer decays. The
//! result is only measured and reported; the configured gains are put back
//! afterwards.

use libm::fabsf;
use serde::{Deserialize, Serialize};

/// Upper end of the proportional gain search range
pub const GAIN_SEARCH_MAX: f32 = 10000.0;

/// Search stops once the bracket is narrower than this
pub const GAIN_TOLERANCE: f32 = 100.0;

/// Target step applied for each candidate gain, alternating in sign
pub const TARGET_STEP: f32 = 10.0;

/// Control cycles per candidate before it is treated as decaying
pub const MAX_CYCLES: u32 = 16384;

/// Oscillations observed before a candidate is judged
pub const MIN_OSCILLATIONS: u32 = 10;

/// Average peak ratio at or above which oscillation counts as sustained
pub const SUSTAINED_DECAY: f32 = 0.98;

/// Measured ultimate gain and oscillation period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UltimateGain {
    /// Proportional gain at the edge of sustained oscillation (Ku)
    pub gain: f32,
    /// Oscillation period in control cycles (Tu)
    pub period: f32,
}

/// How a candidate gain behaved
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oscillation {
    /// Not enough oscillations seen yet
    Undecided,
    /// Peaks are dying out
    Decaying,
    /// Peaks hold or grow; period in cycles
    Sustained { period: f32 },
}

/// Tracks error peaks and their decay
///
/// A peak is where the error slope changes sign; flat steps are ignored.
/// Peak ratio and peak interval are smoothed with exponential averages.
#[derive(Debug, Clone, Default)]
pub struct OscillationDetector {
    cycle: u32,
    previous: Option<f32>,
    slope: i8,
    last_peak: Option<(f32, u32)>,
    decay: Option<f32>,
    interval: Option<f32>,
    oscillations: u32,
}

impl OscillationDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peaks compared so far
    pub fn oscillations(&self) -> u32 {
        self.oscillations
    }

    pub fn cycles(&self) -> u32 {
        self.cycle
    }

    /// Feed the error of one control cycle
    pub fn feed(&mut self, error: f32) -> Oscillation {
        let mut verdict = Oscillation::Undecided;

        if let Some(previous) = self.previous {
            let slope = if error > previous {
                1
            } else if error < previous {
                -1
            } else {
                0
            };
            if slope != 0 {
                if self.slope != 0 && slope != self.slope {
                    verdict = self.peak(previous, self.cycle.saturating_sub(1));
                }
                self.slope = slope;
            }
        }

        self.previous = Some(error);
        self.cycle += 1;
        verdict
    }

    fn peak(&mut self, value: f32, cycle: u32) -> Oscillation {
        if let Some((last, last_cycle)) = self.last_peak {
            if last != 0.0 {
                let ratio = fabsf(value) / fabsf(last);
                let interval = (cycle - last_cycle) as f32;
                self.decay = Some(match self.decay {
                    Some(avg) => 0.7 * avg + 0.3 * ratio,
                    None => ratio,
                });
                self.interval = Some(match self.interval {
                    Some(avg) => 0.3 * avg + 0.7 * interval,
                    None => interval,
                });
                self.oscillations += 1;
            }
        }
        self.last_peak = Some((value, cycle));

        if self.oscillations < MIN_OSCILLATIONS {
            return Oscillation::Undecided;
        }
        match (self.decay, self.interval) {
            (Some(decay), Some(interval)) if decay >= SUSTAINED_DECAY => {
                // Peaks alternate sign, so a full period spans two of them
                Oscillation::Sustained {
                    period: 2.0 * interval,
                }
            }
            _ => Oscillation::Decaying,
        }
    }
}

/// The loop under test during the gain search
#[allow(async_fn_in_trait)]
pub trait GainRig {
    /// Run proportional-only with this gain
    fn set_proportional_gain(&mut self, kp: f32);

    /// Move the target position by `delta` steps
    fn shift_target(&mut self, delta: f32);

    /// Run one control cycle and return its position error
    async fn cycle(&mut self) -> f32;
}

/// Classify one candidate gain
pub async fn probe_gain<R: GainRig>(rig: &mut R, kp: f32, direction: f32) -> Oscillation {
    rig.set_proportional_gain(kp);
    rig.shift_target(direction * TARGET_STEP);

    let mut detector = OscillationDetector::new();
    for _ in 0..MAX_CYCLES {
        let error = rig.cycle().await;
        match detector.feed(error) {
            Oscillation::Undecided => {}
            decided => return decided,
        }
    }
    Oscillation::Decaying
}

/// Binary search for the ultimate gain
///
/// Returns `None` when no candidate in the range sustained oscillation.
pub async fn find_ultimate_gain<R: GainRig>(rig: &mut R) -> Option<UltimateGain> {
    let mut lower = 0.0f32;
    let mut upper = GAIN_SEARCH_MAX;
    let mut period = None;
    let mut direction = 1.0f32;

    while upper - lower > GAIN_TOLERANCE {
        let kp = (lower + upper) / 2.0;
        match probe_gain(rig, kp, direction).await {
            Oscillation::Sustained { period: p } => {
                upper = kp;
                period = Some(p);
            }
            _ => lower = kp,
        }
        direction = -direction;
    }

    period.map(|period| UltimateGain {
        gain: upper,
        period,
    })
}
