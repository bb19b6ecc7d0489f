//! Text reports
//!
//! Configuration and diagnostics as plain text for command replies. Both
//! write into any [`core::fmt::Write`]; [`ReportText`] is the buffer the
//! firmware uses.

use core::fmt::{self, Write};

use crate::capture::{CaptureStatus, RecordingMode};
use crate::coils::CoilPolarity;
use crate::control::ClosedLoop;
use crate::traits::{Encoder, MotorDriver};
use crate::tuning::TuningErrors;

/// Buffer large enough for the diagnostics report
pub type ReportText = heapless::String<512>;

fn polarity_signs(polarity: CoilPolarity) -> (char, char) {
    let sign = |natural| if natural { '+' } else { '-' };
    (sign(polarity.coil_a), sign(polarity.coil_b))
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// Settings as the configuration command would set them
pub fn write_config<W: Write, E: Encoder, M: MotorDriver>(
    w: &mut W,
    control: &ClosedLoop<E, M>,
) -> fmt::Result {
    let config = control.config();
    let gains = control.gains();

    write!(w, "closed loop {}", on_off(control.is_enabled()))?;
    write!(w, ", encoder {}", config.encoder_type.name())?;
    write!(w, ", counts/step {:.3}", config.counts_per_step)?;
    write!(w, ", P {:.3} I {:.3} D {:.3}", gains.kp, gains.ki, gains.kd)?;
    write!(
        w,
        ", warn {:.2} error {:.2}",
        config.warning_threshold, config.error_threshold
    )?;
    write!(w, ", polarity {}", config.polarity.bits())?;
    write!(w, ", hold {:.2}", config.hold_current)
}

/// Full state dump
pub fn write_diagnostics<W: Write, E: Encoder, M: MotorDriver>(
    w: &mut W,
    control: &ClosedLoop<E, M>,
    capture: &CaptureStatus,
) -> fmt::Result {
    let config = control.config();
    let state = control.state();

    writeln!(
        w,
        "Closed loop {}, encoder {}",
        on_off(control.is_enabled()),
        control.encoder_type().name()
    )?;
    writeln!(
        w,
        "Tuning pending 0x{:02x}, errors 0x{:02x} ({})",
        control.pending().bits(),
        control.errors().bits(),
        control.errors()
    )?;
    writeln!(
        w,
        "Position {:.3} target {:.3} offset {}{}",
        state.current_position,
        state.target_position,
        control.zero_offset(),
        if control.uses_software_offset() { " (sw)" } else { "" }
    )?;

    let (a, b) = polarity_signs(config.polarity);
    writeln!(w, "Coil polarity A{} B{}", a, b)?;

    writeln!(
        w,
        "Thresholds warn {:.2} error {:.2}",
        config.warning_threshold, config.error_threshold
    )?;

    let stats = control.stats();
    if stats.count() > 0 {
        writeln!(
            w,
            "Error min {:.3} max {:.3} mean {:.3} rms {:.3}, {} warnings {} errors",
            stats.min(),
            stats.max(),
            stats.mean(),
            stats.rms(),
            stats.warnings(),
            stats.errors()
        )?;
    }

    match control.ultimate_gain() {
        Some(ultimate) => writeln!(
            w,
            "Ultimate gain {:.1} period {:.1}",
            ultimate.gain, ultimate.period
        )?,
        None => writeln!(w, "Ultimate gain not measured")?,
    }

    match (capture.collecting, capture.request) {
        (true, Some(request)) => {
            let mode = match request.mode {
                RecordingMode::Immediate => "immediate",
                RecordingMode::OnNextMove => "on next move",
            };
            write!(
                w,
                "Collecting data: filter 0x{:04x}, {} samples, rate {}, {}",
                request.filter.bits(),
                request.samples,
                request.rate,
                mode
            )
        }
        _ if capture.pending > 0 => write!(w, "Sending data: {} values left", capture.pending),
        _ => write!(w, "Not collecting data"),
    }
}

/// Calibration errors left after a tuning request
pub fn write_tuning<W: Write>(w: &mut W, errors: TuningErrors) -> fmt::Result {
    write!(w, "{}", errors)
}

/// Configuration report into a fresh buffer, cut short if it overflows
pub fn config_report<E: Encoder, M: MotorDriver>(control: &ClosedLoop<E, M>) -> ReportText {
    let mut text = ReportText::new();
    let _ = write_config(&mut text, control);
    text
}

/// Diagnostics report into a fresh buffer, cut short if it overflows
pub fn diagnostics_report<E: Encoder, M: MotorDriver>(
    control: &ClosedLoop<E, M>,
    capture: &CaptureStatus,
) -> ReportText {
    let mut text = ReportText::new();
    let _ = write_diagnostics(&mut text, control, capture);
    text
}
