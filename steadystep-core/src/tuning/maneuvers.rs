//! Tuning batch execution
//!
//! Runs the pending maneuvers of a [`ClosedLoop`] in priority order. Every
//! wait goes through [`TickDelay`] and every settled position is offered to
//! the [`SampleSink`], so a running capture records the maneuvers too.

use crate::capture::SampleSink;
use crate::coils::{self, CoilPolarity};
use crate::control::ClosedLoop;
use crate::phase::{phase_distance, wrap_phase, PHASE_CYCLE};
use crate::pid::PidGains;
use crate::traits::{Encoder, MotorDriver, TickDelay};

use super::ziegler::{find_ultimate_gain, GainRig};
use super::{
    Maneuver, ManeuverSet, TuningError, TuningErrors, TuningFault, DRIVER_POLL_LIMIT,
    POLARITY_DEVIATION_LIMIT, SETTLE_POLL_TICKS, SETTLE_TICKS, SWEEP_POINTS, SWEEP_STEP,
    ZEROING_START_PHASE,
};

/// Outcome of one tuning batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TuningReport {
    /// Maneuvers that ran to completion
    pub ran: ManeuverSet,
    /// Fault that abandoned the batch
    pub fault: Option<TuningFault>,
    /// Calibration errors after the batch
    pub errors: TuningErrors,
}

/// Positional error tolerated per sweep point by the polarity check, in phase units
pub fn polarity_tolerance(counts_per_step: f32) -> u16 {
    let tolerance = 5.0 * 1024.0 / counts_per_step;
    tolerance.clamp(1.0, 2048.0) as u16
}

impl<E: Encoder, M: MotorDriver> ClosedLoop<E, M> {
    /// Run every pending maneuver
    ///
    /// A fault raises [`TuningError::SystemError`], drops the rest of the
    /// batch and returns. A batch that completes clears a previous system
    /// error. The PID history is reset either way.
    pub async fn run_tuning<D: TickDelay, S: SampleSink>(
        &mut self,
        delay: &mut D,
        sink: &mut S,
    ) -> TuningReport {
        let mut ran = ManeuverSet::EMPTY;
        if self.pending.is_empty() {
            return TuningReport {
                ran,
                fault: None,
                errors: self.errors,
            };
        }

        let mut fault = self.check_tuning().err();
        while fault.is_none() {
            let Some(maneuver) = self.pending.first() else {
                break;
            };
            self.pending.remove(maneuver);

            match self.run_maneuver(maneuver, delay, sink).await {
                Ok(()) => {
                    if let Some(error) = maneuver.clears() {
                        self.errors.remove(error);
                    }
                    ran.insert(maneuver);
                }
                Err(f) => fault = Some(f),
            }
        }

        match fault {
            Some(_) => {
                self.errors.insert(TuningError::SystemError);
                self.pending.clear();
            }
            None => self.errors.remove(TuningError::SystemError),
        }
        self.pid.reset();

        TuningReport {
            ran,
            fault,
            errors: self.errors,
        }
    }

    fn check_tuning(&self) -> Result<(), TuningFault> {
        if !self.driver.is_direct_drive() {
            return Err(TuningFault::NotDirectDrive);
        }
        if self.encoder.is_none() {
            return Err(TuningFault::NoEncoder);
        }
        Ok(())
    }

    async fn run_maneuver<D: TickDelay, S: SampleSink>(
        &mut self,
        maneuver: Maneuver,
        delay: &mut D,
        sink: &mut S,
    ) -> Result<(), TuningFault> {
        match maneuver {
            Maneuver::PolarityDetection => self.detect_polarity(delay, sink).await,
            Maneuver::Zeroing => self.zero_encoder(delay, sink).await,
            Maneuver::PolarityCheck => self.check_polarity(delay, sink).await,
            Maneuver::ZieglerNichols => {
                self.measure_ultimate_gain(delay, sink).await;
                Ok(())
            }
            // Accepted so requests stay compatible; nothing to drive yet
            Maneuver::ControlCheck
            | Maneuver::EncoderStepsCheck
            | Maneuver::ContinuousPhaseIncrease
            | Maneuver::Step => Ok(()),
        }
    }

    /// Wait for the driver to take the last write, then for the rotor
    async fn settle<D: TickDelay, S: SampleSink>(
        &mut self,
        delay: &mut D,
        sink: &mut S,
    ) -> Result<u16, TuningFault> {
        let mut polls = 0;
        while self.driver.update_pending() {
            if polls >= DRIVER_POLL_LIMIT {
                return Err(TuningFault::DriverTimeout);
            }
            delay.delay_ticks(SETTLE_POLL_TICKS).await;
            polls += 1;
        }
        delay.delay_ticks(SETTLE_TICKS).await;

        self.read_position().ok_or(TuningFault::NoEncoder)?;
        sink.record(&self.snapshot());
        Ok(self.state.current_phase)
    }

    /// Full-scale currents at a fixed phase
    fn hold_phase(&mut self, phase: u16, polarity: CoilPolarity) {
        self.state.phase_shift = 0;
        self.state.desired_phase = phase;
        self.state.currents = coils::apply(&mut self.driver, phase, 1.0, polarity, 0.0);
    }

    /// Try every coil sign combination and keep the one that tracks best
    ///
    /// Each point is scored against the commanded phase twice: relative to
    /// the first point of the sweep, which separates the directions, and
    /// absolute, which picks between two combinations that differ by half a
    /// cycle. On a rotor whose encoder already reads zero at phase 0 the two
    /// scores pick the same wiring.
    async fn detect_polarity<D: TickDelay, S: SampleSink>(
        &mut self,
        delay: &mut D,
        sink: &mut S,
    ) -> Result<(), TuningFault> {
        let mut best: Option<(u32, CoilPolarity)> = None;

        for polarity in CoilPolarity::ALL {
            let mut score = 0u32;
            let mut origin = None;
            for point in 0..SWEEP_POINTS {
                let commanded = point * SWEEP_STEP;
                self.hold_phase(commanded, polarity);
                let measured = self.settle(delay, sink).await?;

                let origin = *origin.get_or_insert(measured);
                let relative = wrap_phase(measured as i32 - origin as i32);
                score += phase_distance(relative, commanded) as u32;
                score += phase_distance(measured, commanded) as u32;
            }
            if best.map_or(true, |(lowest, _)| score < lowest) {
                best = Some((score, polarity));
            }
        }

        if let Some((_, polarity)) = best {
            self.config.polarity = polarity;
        }
        Ok(())
    }

    /// Ease the rotor onto phase 0 and make that position read zero
    async fn zero_encoder<D: TickDelay, S: SampleSink>(
        &mut self,
        delay: &mut D,
        sink: &mut S,
    ) -> Result<(), TuningFault> {
        let polarity = self.config.polarity;
        let mut phase = ZEROING_START_PHASE;
        loop {
            self.hold_phase((phase % PHASE_CYCLE as u32) as u16, polarity);
            self.settle(delay, sink).await?;
            if phase == 0 {
                break;
            }
            phase /= 2;
        }

        self.zero_offset = self.zero_offset.wrapping_sub(self.state.raw_reading);
        let encoder = self.encoder.as_mut().ok_or(TuningFault::NoEncoder)?;
        // Encoders without an offset register get it added on every read
        self.software_offset = encoder.set_offset(self.zero_offset).is_err();

        self.state.target_position = 0.0;
        self.read_position().ok_or(TuningFault::NoEncoder)?;
        sink.record(&self.snapshot());
        Ok(())
    }

    /// Sweep the phase and count points that land too far from the command
    async fn check_polarity<D: TickDelay, S: SampleSink>(
        &mut self,
        delay: &mut D,
        sink: &mut S,
    ) -> Result<(), TuningFault> {
        let polarity = self.config.polarity;
        let tolerance = polarity_tolerance(self.config.counts_per_step);
        let mut deviations = 0;

        for point in 0..SWEEP_POINTS {
            let commanded = point * SWEEP_STEP;
            self.hold_phase(commanded, polarity);
            let measured = self.settle(delay, sink).await?;
            if phase_distance(measured, commanded) > tolerance {
                deviations += 1;
            }
        }

        if deviations > POLARITY_DEVIATION_LIMIT {
            self.errors.insert(TuningError::IncorrectPolarity);
        } else {
            self.errors.remove(TuningError::IncorrectPolarity);
        }
        Ok(())
    }

    /// Ultimate gain search with the configured gains, target and error
    /// statistics put back
    async fn measure_ultimate_gain<D: TickDelay, S: SampleSink>(
        &mut self,
        delay: &mut D,
        sink: &mut S,
    ) {
        let gains = self.pid.gains();
        let target = self.state.target_position;
        let stats = self.stats;
        self.pid.reset();

        let ultimate = {
            let mut rig = LoopRig {
                control: &mut *self,
                delay,
                sink,
            };
            find_ultimate_gain(&mut rig).await
        };

        self.ultimate = ultimate;
        self.pid.set_gains(gains);
        self.pid.reset();
        self.state.target_position = target;
        self.stats = stats;
    }
}

/// The live control loop as seen by the gain search
struct LoopRig<'a, E, M, D, S> {
    control: &'a mut ClosedLoop<E, M>,
    delay: &'a mut D,
    sink: &'a mut S,
}

impl<E: Encoder, M: MotorDriver, D: TickDelay, S: SampleSink> GainRig for LoopRig<'_, E, M, D, S> {
    fn set_proportional_gain(&mut self, kp: f32) {
        self.control.pid.set_gains(PidGains::proportional(kp));
        self.control.pid.reset();
    }

    fn shift_target(&mut self, delta: f32) {
        self.control.state.target_position += delta;
    }

    async fn cycle(&mut self) -> f32 {
        self.control.control_motor_currents();
        self.sink.record(&self.control.snapshot());
        self.delay.delay_ticks(1).await;
        self.control.pid.error()
    }
}
