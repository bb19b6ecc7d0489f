//! Closed loop controller
//!
//! [`ClosedLoop`] owns the encoder, the motor driver and all control state.
//! The control tick calls [`ClosedLoop::spin`]; the tuning task calls
//! [`ClosedLoop::run_tuning`]. Both need `&mut`, so whoever shares the
//! controller between tasks decides the locking.

pub mod stats;

use core::fmt;

use libm::fabsf;
use steadystep_protocol::{CommandResult, StartDataCollection};

use crate::capture::{Capture, CaptureError, CaptureRequest, SampleSink, Snapshot};
use crate::coils::{self, CoilCurrents};
use crate::config::{
    CalibrationError, CalibrationRecord, ClosedLoopConfig, ConfigError, ConfigureRequest,
};
use crate::phase::{map_to_phase, wrap_phase};
use crate::pid::{PidController, PidGains, SIGNAL_LIMIT};
use crate::traits::{Encoder, EncoderType, MotorDriver};
use crate::tuning::{ManeuverSet, TuningError, TuningErrors, UltimateGain};

pub use stats::{ErrorStats, Excursion};

/// Phase lead per unit of control signal; full signal leads by a quarter cycle
pub const PHASE_SHIFT_PER_SIGNAL: i32 = 4;

/// Only one drive per board
pub const DEVICE_NUMBER: u8 = 0;

/// Positions and outputs of the last control cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlState {
    /// Target position in steps
    pub target_position: f32,
    /// Measured position in steps
    pub current_position: f32,
    /// Last encoder reading, offset applied
    pub raw_reading: i32,
    pub current_phase: u16,
    pub phase_shift: i32,
    pub desired_phase: u16,
    pub currents: CoilCurrents,
}

/// What a control tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpinOutcome {
    /// Closed loop is off
    Disabled,
    /// Calibration is outstanding or maneuvers are pending
    TuningWake,
    /// New coil currents were issued
    Controlled(Excursion),
}

/// Result of a configuration command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigureOutcome {
    /// No parameters given; caller should report the configuration
    Report,
    Applied,
}

/// Precondition failures of host commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    InvalidDevice,
    NotDirectDrive,
    ManeuverOutOfRange,
}

impl CommandError {
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidDevice => "Invalid device number",
            Self::NotDirectDrive => "Drive is not in direct drive mode",
            Self::ManeuverOutOfRange => "Requested maneuver out of range",
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Map a finished tuning batch to a command result
///
/// Newly raised calibration errors are an error; errors that were already
/// present before the batch only warrant a warning.
pub fn tuning_result(before: TuningErrors, after: TuningErrors) -> CommandResult {
    if !after.introduced_since(before).is_empty() {
        CommandResult::Error
    } else if !after.is_empty() {
        CommandResult::Warning
    } else {
        CommandResult::Ok
    }
}

pub struct ClosedLoop<E, M> {
    pub(crate) config: ClosedLoopConfig,
    pub(crate) enabled: bool,
    pub(crate) encoder: Option<E>,
    pub(crate) driver: M,
    pub(crate) pid: PidController,
    pub(crate) state: ControlState,
    pub(crate) pending: ManeuverSet,
    pub(crate) errors: TuningErrors,
    /// Offset that makes the zeroed position read 0
    pub(crate) zero_offset: i32,
    /// The encoder cannot hold the offset, so it is added here
    pub(crate) software_offset: bool,
    pub(crate) step_forward: bool,
    pub(crate) ultimate: Option<UltimateGain>,
    pub(crate) stats: ErrorStats,
}

impl<E: Encoder, M: MotorDriver> ClosedLoop<E, M> {
    /// Create a disabled controller
    ///
    /// Every calibration step starts out as not performed.
    pub fn new(driver: M, config: ClosedLoopConfig, mut encoder: Option<E>) -> Self {
        if let Some(encoder) = encoder.as_mut() {
            encoder.enable();
        }
        Self {
            config,
            enabled: false,
            encoder,
            driver,
            pid: PidController::default(),
            state: ControlState::default(),
            pending: ManeuverSet::EMPTY,
            errors: TuningErrors::INITIAL,
            zero_offset: 0,
            software_offset: false,
            step_forward: true,
            ultimate: None,
            stats: ErrorStats::new(),
        }
    }

    pub fn config(&self) -> &ClosedLoopConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }

    pub fn encoder_type(&self) -> EncoderType {
        self.encoder
            .as_ref()
            .map_or(EncoderType::None, |encoder| encoder.kind())
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn gains(&self) -> PidGains {
        self.pid.gains()
    }

    pub fn pending(&self) -> ManeuverSet {
        self.pending
    }

    pub fn errors(&self) -> TuningErrors {
        self.errors
    }

    pub fn ultimate_gain(&self) -> Option<UltimateGain> {
        self.ultimate
    }

    pub fn stats(&self) -> &ErrorStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn driver(&self) -> &M {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut M {
        &mut self.driver
    }

    pub fn zero_offset(&self) -> i32 {
        self.zero_offset
    }

    /// True when the zero offset is applied in software
    pub fn uses_software_offset(&self) -> bool {
        self.software_offset
    }

    /// Closed loop on and an encoder to close it with
    pub fn is_ready(&self) -> bool {
        self.enabled && self.encoder.is_some()
    }

    pub fn set_target_position(&mut self, steps: f32) {
        self.state.target_position = steps;
    }

    /// Direction used by [`Self::take_step`]
    pub fn set_step_direction(&mut self, forward: bool) {
        self.step_forward = forward;
    }

    /// Advance the target by one microstep in the current direction
    pub fn take_step(&mut self) {
        let count = self.driver.microstepping().count.max(1);
        let step = 1.0 / count as f32;
        if self.step_forward {
            self.state.target_position += step;
        } else {
            self.state.target_position -= step;
        }
    }

    /// Read the encoder with the zero offset applied and update the position
    pub(crate) fn read_position(&mut self) -> Option<f32> {
        let encoder = self.encoder.as_mut()?;
        let mut reading = encoder.reading();
        if self.software_offset {
            reading = reading.wrapping_add(self.zero_offset);
        }
        self.state.raw_reading = reading;
        self.state.current_position = reading as f32 / self.config.counts_per_step;
        self.state.current_phase = map_to_phase(self.state.current_position);
        Some(self.state.current_position)
    }

    /// Current values of every sampleable variable
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            raw_reading: self.state.raw_reading,
            current_position: self.state.current_position,
            target_position: self.state.target_position,
            current_phase: self.state.current_phase,
            control_signal: self.pid.signal(),
            terms: self.pid.terms(),
            phase_shift: self.state.phase_shift,
            desired_phase: self.state.desired_phase,
            currents: self.state.currents,
            error: self.pid.error(),
        }
    }

    /// Periodic control tick
    ///
    /// The snapshot always goes to `sink` first. Control only runs when
    /// closed loop is on, calibration is complete and nothing is pending.
    pub fn spin<S: SampleSink>(&mut self, sink: &mut S) -> SpinOutcome {
        sink.record(&self.snapshot());

        if !self.enabled {
            return SpinOutcome::Disabled;
        }
        if !self.errors.is_empty() || !self.pending.is_empty() {
            return SpinOutcome::TuningWake;
        }
        match self.control_motor_currents() {
            Some(excursion) => SpinOutcome::Controlled(excursion),
            None => SpinOutcome::Disabled,
        }
    }

    /// One PID cycle: read, compute, issue currents
    ///
    /// Returns `None` without an encoder.
    pub(crate) fn control_motor_currents(&mut self) -> Option<Excursion> {
        let position = self.read_position()?;
        let signal = self.pid.update(position, self.state.target_position);

        let phase_shift = PHASE_SHIFT_PER_SIGNAL * signal as i32;
        let desired_phase = wrap_phase(self.state.current_phase as i32 + phase_shift);
        let magnitude = fabsf(signal as f32) / SIGNAL_LIMIT as f32;

        self.state.phase_shift = phase_shift;
        self.state.desired_phase = desired_phase;
        self.state.currents = coils::apply(
            &mut self.driver,
            desired_phase,
            magnitude,
            self.config.polarity,
            self.config.hold_current,
        );

        Some(self.stats.record(
            self.pid.error(),
            self.config.warning_threshold,
            self.config.error_threshold,
        ))
    }

    /// Queue maneuvers from the tuning command
    ///
    /// Returns the calibration errors as they were before, for
    /// [`tuning_result`] once the batch has run.
    pub fn request_tuning(&mut self, bits: u16) -> Result<TuningErrors, CommandError> {
        if !self.driver.is_direct_drive() {
            return Err(CommandError::NotDirectDrive);
        }
        let maneuvers = ManeuverSet::from_bits(bits).ok_or(CommandError::ManeuverOutOfRange)?;
        self.pending = self.pending.union(maneuvers);
        Ok(self.errors)
    }

    /// Start data collection
    ///
    /// Maneuvers named in the request are queued once the capture is running.
    pub fn start_capture(
        &mut self,
        capture: &mut Capture,
        msg: &StartDataCollection,
    ) -> Result<CaptureRequest, CaptureError> {
        if msg.device_number != DEVICE_NUMBER {
            return Err(CaptureError::InvalidDevice);
        }
        if !self.is_ready() {
            return Err(CaptureError::NotInClosedLoop);
        }
        let request = CaptureRequest::from_message(msg)?;
        capture.start(request, self.state.target_position)?;
        self.pending = self.pending.union(request.maneuvers);
        Ok(request)
    }

    /// Apply a configuration command
    ///
    /// `make_encoder` builds the encoder for a newly selected type. Nothing
    /// changes unless every parameter is valid and the encoder could be made.
    pub fn configure(
        &mut self,
        request: &ConfigureRequest,
        make_encoder: impl FnOnce(EncoderType) -> Option<E>,
    ) -> Result<ConfigureOutcome, ConfigError> {
        if request.is_empty() {
            return Ok(ConfigureOutcome::Report);
        }

        let validated = request.validate(&self.config, self.enabled, self.encoder.is_some())?;

        let new_encoder = if validated.encoder_changed {
            match validated.config.encoder_type {
                EncoderType::None => Some(None),
                kind => Some(Some(make_encoder(kind).ok_or(ConfigError::EncoderUnavailable)?)),
            }
        } else {
            None
        };

        if let Some(mut encoder) = new_encoder {
            if let Some(encoder) = encoder.as_mut() {
                encoder.enable();
            }
            self.encoder = encoder;
            self.zero_offset = 0;
            self.software_offset = false;
        }

        let gains = self.pid.gains();
        self.pid.set_gains(PidGains {
            kp: request.kp.unwrap_or(gains.kp),
            ki: request.ki.unwrap_or(gains.ki),
            kd: request.kd.unwrap_or(gains.kd),
        });

        if validated.enable && !self.enabled {
            self.pid.reset();
            self.stats.reset();
        }
        self.enabled = validated.enable;
        self.config = validated.config;

        if validated.invalidates_tuning {
            self.errors = self.errors.union(TuningErrors::MINIMAL_TUNE);
        }
        Ok(ConfigureOutcome::Applied)
    }

    /// Snapshot of the calibration worth persisting
    pub fn calibration(&self) -> CalibrationRecord {
        CalibrationRecord::new(
            self.config.encoder_type,
            self.config.counts_per_step,
            self.config.polarity,
            self.pid.gains(),
            self.ultimate,
        )
    }

    /// Apply a stored calibration
    ///
    /// Polarity and gains are taken over and polarity detection counts as
    /// done. The encoder still has to be zeroed.
    pub fn restore_calibration(&mut self, record: &CalibrationRecord) -> Result<(), CalibrationError> {
        if !record.is_valid() {
            return Err(CalibrationError::InvalidHeader);
        }
        if !record.verify_crc() {
            return Err(CalibrationError::Corrupt);
        }
        if record.encoder_type != self.config.encoder_type
            || record.counts_per_step != self.config.counts_per_step
        {
            return Err(CalibrationError::Mismatch);
        }
        self.config.polarity = record.polarity;
        self.pid.set_gains(record.gains);
        self.ultimate = record.ultimate;
        self.errors.remove(TuningError::PolarityNotFound);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::capture::{FilterMask, Progress};
    use crate::traits::{EncoderError, Microstepping};
    use core::cell::Cell;

    /// Encoder whose reading the test sets directly
    pub struct FixedEncoder<'a> {
        pub reading: &'a Cell<i32>,
        pub kind: EncoderType,
        pub offset: Option<i32>,
    }

    impl Encoder for FixedEncoder<'_> {
        fn reading(&mut self) -> i32 {
            self.reading.get() + self.offset.unwrap_or(0)
        }
        fn enable(&mut self) {}
        fn kind(&self) -> EncoderType {
            self.kind
        }
        fn set_offset(&mut self, offset: i32) -> Result<(), EncoderError> {
            match self.kind {
                EncoderType::LinearQuadrature | EncoderType::RotaryQuadrature => {
                    self.offset = Some(offset);
                    Ok(())
                }
                _ => Err(EncoderError::Unsupported),
            }
        }
    }

    #[derive(Default)]
    pub struct RecordingDriver {
        pub currents: Option<(i16, i16)>,
        pub writes: u32,
        pub indirect: bool,
    }

    impl MotorDriver for RecordingDriver {
        fn set_phase_currents(&mut self, coil_a: i16, coil_b: i16) {
            self.currents = Some((coil_a, coil_b));
            self.writes += 1;
        }
        fn update_pending(&self) -> bool {
            false
        }
        fn microstepping(&self) -> Microstepping {
            Microstepping {
                count: 16,
                interpolation: true,
            }
        }
        fn is_direct_drive(&self) -> bool {
            !self.indirect
        }
    }

    fn rotary_config() -> ClosedLoopConfig {
        ClosedLoopConfig {
            encoder_type: EncoderType::RotaryQuadrature,
            counts_per_step: 10.0,
            ..Default::default()
        }
    }

    fn ready_loop(reading: &Cell<i32>) -> ClosedLoop<FixedEncoder<'_>, RecordingDriver> {
        let encoder = FixedEncoder {
            reading,
            kind: EncoderType::RotaryQuadrature,
            offset: None,
        };
        let mut cl = ClosedLoop::new(RecordingDriver::default(), rotary_config(), Some(encoder));
        cl.enabled = true;
        cl.errors = TuningErrors::NONE;
        cl
    }

    #[test]
    fn test_spin_disabled_only_records() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        cl.enabled = false;

        let mut capture = Capture::new();
        let request = CaptureRequest {
            filter: FilterMask::new(0x1).unwrap(),
            samples: 3,
            rate: 0,
            mode: crate::capture::RecordingMode::Immediate,
            maneuvers: ManeuverSet::EMPTY,
        };
        capture.start(request, 0.0).unwrap();

        assert_eq!(cl.spin(&mut capture), SpinOutcome::Disabled);
        assert_eq!(capture.buffer().write_pointer(), 1);
        assert_eq!(cl.driver().writes, 0);
    }

    #[test]
    fn test_spin_gated_by_calibration_errors() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        cl.errors.insert(TuningError::NotZeroed);

        assert_eq!(cl.spin(&mut ()), SpinOutcome::TuningWake);
        assert_eq!(cl.driver().writes, 0);

        cl.errors = TuningErrors::NONE;
        cl.pending.insert(crate::tuning::Maneuver::Step);
        assert_eq!(cl.spin(&mut ()), SpinOutcome::TuningWake);
        assert_eq!(cl.driver().writes, 0);
    }

    #[test]
    fn test_spin_controls_motor() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        cl.set_target_position(5.0);

        assert_eq!(cl.spin(&mut ()), SpinOutcome::Controlled(Excursion::None));
        assert_eq!(cl.pid().signal(), 255);
        assert_eq!(cl.state().phase_shift, 1020);
        assert_eq!(cl.state().desired_phase, 1020);

        let (a, b) = cl.driver().currents.unwrap();
        assert_eq!((a, b), (cl.state().currents.a, cl.state().currents.b));
        // Nearly a quarter cycle ahead: mostly coil B
        assert!(b > 250 && a.abs() < 10, "{} {}", a, b);
    }

    #[test]
    fn test_spin_phase_wraps() {
        let reading = Cell::new(35); // 3.5 steps
        let mut cl = ready_loop(&reading);
        cl.set_target_position(10.0);
        cl.spin(&mut ());

        let expected = wrap_phase(map_to_phase(3.5) as i32 + 1020);
        assert_eq!(cl.state().desired_phase, expected);
        assert!(cl.state().desired_phase < 4096);
    }

    #[test]
    fn test_spin_records_excursions() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        cl.config.warning_threshold = 1.0;
        cl.config.error_threshold = 4.0;

        cl.set_target_position(2.0);
        assert_eq!(cl.spin(&mut ()), SpinOutcome::Controlled(Excursion::Warning));
        cl.set_target_position(-4.0);
        assert_eq!(cl.spin(&mut ()), SpinOutcome::Controlled(Excursion::Error));
        assert_eq!(cl.stats().count(), 2);
        assert_eq!(cl.stats().min(), -4.0);
    }

    #[test]
    fn test_take_step_uses_microstepping() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        cl.take_step();
        cl.take_step();
        assert_eq!(cl.state().target_position, 0.125);

        cl.set_step_direction(false);
        cl.take_step();
        assert_eq!(cl.state().target_position, 0.0625);
    }

    #[test]
    fn test_request_tuning() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        assert_eq!(
            cl.request_tuning(0x100),
            Err(CommandError::ManeuverOutOfRange)
        );
        assert!(cl.pending().is_empty());

        let before = cl.request_tuning(0x03).unwrap();
        assert_eq!(before, TuningErrors::NONE);
        assert_eq!(cl.pending(), ManeuverSet::BASIC);

        cl.driver_mut().indirect = true;
        assert_eq!(cl.request_tuning(0x01), Err(CommandError::NotDirectDrive));
    }

    #[test]
    fn test_tuning_result() {
        let mut after = TuningErrors::NONE;
        assert_eq!(tuning_result(TuningErrors::NONE, after), CommandResult::Ok);

        after.insert(TuningError::NotZeroed);
        assert_eq!(tuning_result(after, after), CommandResult::Warning);
        assert_eq!(tuning_result(TuningErrors::NONE, after), CommandResult::Error);
    }

    #[test]
    fn test_start_capture_checks() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        let mut capture = Capture::new();
        let mut msg = StartDataCollection {
            device_number: 0,
            mode: 0,
            filter: 0b101,
            num_samples: 4,
            rate: 0,
            movement: 0x80,
        };

        msg.device_number = 1;
        assert_eq!(
            cl.start_capture(&mut capture, &msg),
            Err(CaptureError::InvalidDevice)
        );
        msg.device_number = 0;

        cl.enabled = false;
        assert_eq!(
            cl.start_capture(&mut capture, &msg),
            Err(CaptureError::NotInClosedLoop)
        );
        cl.enabled = true;

        let request = cl.start_capture(&mut capture, &msg).unwrap();
        assert_eq!(request.samples, 4);
        assert!(cl.pending().contains(crate::tuning::Maneuver::ZieglerNichols));
        assert_eq!(
            cl.start_capture(&mut capture, &msg),
            Err(CaptureError::AlreadyCollecting)
        );
    }

    #[test]
    fn test_buffered_capture_through_spin() {
        let reading = Cell::new(20);
        let mut cl = ready_loop(&reading);
        let mut capture = Capture::new();
        let msg = StartDataCollection {
            device_number: 0,
            mode: 0,
            filter: 0b101,
            num_samples: 3,
            rate: 0,
            movement: 0,
        };
        cl.start_capture(&mut capture, &msg).unwrap();

        for _ in 0..3 {
            cl.spin(&mut capture);
        }
        assert!(!capture.is_active());
        assert_eq!(capture.buffer().write_pointer(), 6);
        // Reading recorded after the first tick read the encoder
        assert_eq!(capture.buffer().pending()[2], 20.0);
        assert_eq!(capture.sample(&cl.snapshot()), Progress::Idle);
    }

    #[test]
    fn test_configure_empty_reports() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        let outcome = cl.configure(&ConfigureRequest::default(), |_| None);
        assert_eq!(outcome, Ok(ConfigureOutcome::Report));
    }

    #[test]
    fn test_configure_rejection_changes_nothing() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        let before = *cl.config();
        let request = ConfigureRequest {
            kp: Some(50.0),
            polarity: Some(7),
            ..Default::default()
        };
        assert_eq!(
            cl.configure(&request, |_| None),
            Err(ConfigError::PolarityOutOfRange)
        );
        assert_eq!(*cl.config(), before);
        assert_eq!(cl.gains(), PidGains::default());
    }

    #[test]
    fn test_configure_counts_per_step_requires_minimal_tune() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        let request = ConfigureRequest {
            counts_per_step: Some(20.0),
            kp: Some(50.0),
            ..Default::default()
        };
        assert_eq!(cl.configure(&request, |_| None), Ok(ConfigureOutcome::Applied));
        assert_eq!(cl.errors(), TuningErrors::MINIMAL_TUNE);
        assert_eq!(cl.gains().kp, 50.0);
        assert_eq!(cl.config().counts_per_step, 20.0);
    }

    #[test]
    fn test_configure_encoder_unavailable() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        let request = ConfigureRequest {
            encoder_type: Some(EncoderType::As5047 as u8),
            ..Default::default()
        };
        assert_eq!(
            cl.configure(&request, |_| None),
            Err(ConfigError::EncoderUnavailable)
        );
        assert_eq!(cl.encoder_type(), EncoderType::RotaryQuadrature);
    }

    #[test]
    fn test_configure_new_encoder() {
        let reading = Cell::new(0);
        let other = Cell::new(7);
        let mut cl = ready_loop(&reading);
        cl.errors = TuningErrors::NONE;
        let request = ConfigureRequest {
            encoder_type: Some(EncoderType::Tli5012 as u8),
            ..Default::default()
        };
        let outcome = cl.configure(&request, |kind| {
            Some(FixedEncoder {
                reading: &other,
                kind,
                offset: None,
            })
        });
        assert_eq!(outcome, Ok(ConfigureOutcome::Applied));
        assert_eq!(cl.encoder_type(), EncoderType::Tli5012);
        assert_eq!(cl.errors(), TuningErrors::MINIMAL_TUNE);
    }

    #[test]
    fn test_disable_keeps_encoder() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        let request = ConfigureRequest {
            enable: Some(false),
            ..Default::default()
        };
        assert_eq!(cl.configure(&request, |_| None), Ok(ConfigureOutcome::Applied));
        assert!(!cl.is_enabled());
        assert!(cl.has_encoder());
        assert_eq!(cl.errors(), TuningErrors::NONE);
    }

    #[test]
    fn test_calibration_restore() {
        let reading = Cell::new(0);
        let mut cl = ready_loop(&reading);
        cl.config.polarity = crate::coils::CoilPolarity::new(false, true);
        cl.pid.set_gains(PidGains::new(80.0, 1.0, 5.0));
        let record = cl.calibration();

        let mut fresh = ready_loop(&reading);
        fresh.errors = TuningErrors::INITIAL;
        fresh.restore_calibration(&record).unwrap();
        assert_eq!(fresh.config().polarity, record.polarity);
        assert_eq!(fresh.gains(), PidGains::new(80.0, 1.0, 5.0));
        assert!(!fresh.errors().contains(TuningError::PolarityNotFound));
        assert!(fresh.errors().contains(TuningError::NotZeroed));

        fresh.config.counts_per_step = 1.0;
        assert_eq!(
            fresh.restore_calibration(&record),
            Err(CalibrationError::Mismatch)
        );
    }
}
