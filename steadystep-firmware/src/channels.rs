//! Inter-task communication channels
//!
//! Defines the static channels, signals and shared state used between the
//! Embassy tasks and towards the board's CAN transport.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use heapless::Vec;

use steadystep_core::capture::{Capture, CaptureRequest};
use steadystep_core::config::{ConfigureRequest, CALIBRATION_MAX_SIZE};
use steadystep_core::tuning::TuningReport;
use steadystep_protocol::{ClosedLoopData, HostRequest, Reply};

/// Channel capacity for inbound commands
const COMMAND_CHANNEL_SIZE: usize = 4;

/// Channel capacity for command replies
const REPLY_CHANNEL_SIZE: usize = 8;

/// Channel capacity for outbound data messages
const OUTBOUND_CHANNEL_SIZE: usize = 8;

/// Encoded calibration record
pub type CalibrationBytes = Vec<u8, CALIBRATION_MAX_SIZE>;

/// Commands handled by the command task
pub enum Command {
    /// Parsed CAN request
    Host(HostRequest),
    /// Configuration command; an empty request asks for a report
    Configure(ConfigureRequest),
    Diagnostics,
    /// Encode the calibration and hand it to the board via [`CALIBRATION_SAVE`]
    SaveCalibration,
    RestoreCalibration(CalibrationBytes),
}

/// Commands from the host
pub static COMMANDS: Channel<CriticalSectionRawMutex, Command, COMMAND_CHANNEL_SIZE> =
    Channel::new();

/// Replies to the host
pub static REPLIES: Channel<CriticalSectionRawMutex, Reply, REPLY_CHANNEL_SIZE> = Channel::new();

/// Captured data messages to the host
pub static OUTBOUND: Channel<CriticalSectionRawMutex, ClosedLoopData, OUTBOUND_CHANNEL_SIZE> =
    Channel::new();

/// Wake the tuning task (calibration outstanding or maneuvers pending)
pub static TUNING_WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Result of the last tuning batch that ran anything
pub static TUNING_DONE: Signal<CriticalSectionRawMutex, TuningReport> = Signal::new();

/// A capture was started
pub static CAPTURE_START: Signal<CriticalSectionRawMutex, CaptureRequest> = Signal::new();

/// Buffered capture data is ready to send
pub static TRANSMIT_WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Calibration record for the board to persist
pub static CALIBRATION_SAVE: Signal<CriticalSectionRawMutex, CalibrationBytes> = Signal::new();

/// Capture pipeline, shared by the control tick, tuning, capture and transmit tasks
pub static CAPTURE: Mutex<CriticalSectionRawMutex, RefCell<Capture>> =
    Mutex::new(RefCell::new(Capture::new()));
