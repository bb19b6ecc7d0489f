//! Sample capture pipeline
//!
//! Two ways of collecting data:
//! - rate 0: one record per control tick into the [`SampleBuffer`], sent
//!   after the capture completes
//! - nonzero rate: the latest snapshot is streamed directly, one message per
//!   sample, paced by the capture task
//!
//! [`Capture`] is meant to sit behind a mutex shared by the control tick,
//! the capture task and the transmit task.

pub mod buffer;
pub mod filter;

use core::fmt;

use steadystep_protocol::{ClosedLoopData, StartDataCollection, MAX_DATA_VALUES};

use crate::tuning::ManeuverSet;

pub use buffer::{SampleBuffer, BUFFER_CAPACITY};
pub use filter::{Field, FilterMask, Snapshot, FIELD_COUNT};

// Every field of one record fits a single data message
const _: () = assert!(FIELD_COUNT <= MAX_DATA_VALUES);

/// Ticks between checks for the first move in [`RecordingMode::OnNextMove`]
pub const TRIGGER_POLL_TICKS: u32 = 10;

/// Ticks between checks for buffered data to send
pub const TRANSMIT_POLL_TICKS: u32 = 100;

/// Ticks per second
pub const TICK_RATE_HZ: u32 = 1000;

/// When recording starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordingMode {
    Immediate,
    /// Wait until the target position changes
    OnNextMove,
}

impl RecordingMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Immediate),
            1 => Some(Self::OnNextMove),
            _ => None,
        }
    }
}

/// Capture rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureError {
    InvalidDevice,
    NotInClosedLoop,
    AlreadyCollecting,
    /// Data from the previous capture has not been sent yet
    StillDraining,
    TooManySamples,
    NoSamples,
    ManeuverOutOfRange,
    InvalidFilter,
    InvalidMode,
}

impl CaptureError {
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidDevice => "Invalid device number",
            Self::NotInClosedLoop => "Drive is not in closed loop mode",
            Self::AlreadyCollecting => "Drive is already collecting data",
            Self::StillDraining => "Drive is still sending collected data",
            Self::TooManySamples => "Too many samples requested for buffer",
            Self::NoSamples => "At least one sample must be requested",
            Self::ManeuverOutOfRange => "Requested maneuver out of range",
            Self::InvalidFilter => "Invalid sample filter",
            Self::InvalidMode => "Invalid recording mode",
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A checked data collection request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureRequest {
    pub filter: FilterMask,
    pub samples: u16,
    /// Samples per second; 0 samples every control tick into the buffer
    pub rate: u16,
    pub mode: RecordingMode,
    /// Maneuvers to run while recording
    pub maneuvers: ManeuverSet,
}

impl CaptureRequest {
    /// Check a start message's fields
    pub fn from_message(msg: &StartDataCollection) -> Result<Self, CaptureError> {
        let filter = FilterMask::new(msg.filter).ok_or(CaptureError::InvalidFilter)?;
        let mode = RecordingMode::from_u8(msg.mode).ok_or(CaptureError::InvalidMode)?;
        let maneuvers =
            ManeuverSet::from_bits(msg.movement).ok_or(CaptureError::ManeuverOutOfRange)?;
        if msg.num_samples == 0 {
            return Err(CaptureError::NoSamples);
        }
        Ok(Self {
            filter,
            samples: msg.num_samples,
            rate: msg.rate,
            mode,
            maneuvers,
        })
    }

    /// Buffer values a buffered capture needs
    pub fn buffered_len(&self) -> usize {
        self.samples as usize * self.filter.len()
    }

    /// Ticks between streamed samples
    pub fn interval_ticks(&self) -> u32 {
        (TICK_RATE_HZ / (self.rate.max(1) as u32)).max(1)
    }
}

/// Result of offering a snapshot to the capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// No capture running
    Idle,
    /// Waiting for the first move
    Armed,
    Recording,
    /// The buffered capture just filled; data is ready to send
    Complete,
}

/// Summary for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureStatus {
    pub collecting: bool,
    pub request: Option<CaptureRequest>,
    /// Buffered values not yet sent
    pub pending: usize,
}

/// Receives a snapshot every control or tuning tick
pub trait SampleSink {
    fn record(&mut self, snapshot: &Snapshot);
}

/// Discards every snapshot
impl SampleSink for () {
    fn record(&mut self, _snapshot: &Snapshot) {}
}

pub struct Capture {
    buffer: SampleBuffer,
    active: bool,
    triggered: bool,
    request: Option<CaptureRequest>,
    armed_target: f32,
    latest: Snapshot,
}

impl Capture {
    pub const fn new() -> Self {
        Self {
            buffer: SampleBuffer::new(),
            active: false,
            triggered: false,
            request: None,
            armed_target: 0.0,
            latest: Snapshot::EMPTY,
        }
    }

    /// Begin a capture
    ///
    /// `target` is the target position now, used to detect the next move.
    /// Rejections leave the capture untouched.
    pub fn start(&mut self, request: CaptureRequest, target: f32) -> Result<(), CaptureError> {
        if self.active {
            return Err(CaptureError::AlreadyCollecting);
        }
        if !self.buffer.is_drained() {
            return Err(CaptureError::StillDraining);
        }
        if request.rate == 0 && request.buffered_len() > BUFFER_CAPACITY {
            return Err(CaptureError::TooManySamples);
        }

        self.buffer.reset();
        self.request = Some(request);
        self.active = true;
        self.triggered = request.mode == RecordingMode::Immediate;
        self.armed_target = target;
        Ok(())
    }

    /// Offer the latest control snapshot
    pub fn sample(&mut self, snapshot: &Snapshot) -> Progress {
        self.latest = *snapshot;

        let request = match (self.active, self.request) {
            (true, Some(request)) => request,
            _ => return Progress::Idle,
        };

        if !self.triggered {
            if snapshot.target_position == self.armed_target {
                return Progress::Armed;
            }
            self.triggered = true;
        }

        if request.rate != 0 {
            return Progress::Recording;
        }

        let values = request.filter.fields().map(|f| snapshot.value(f));
        if !self.buffer.push_record(values)
            || self.buffer.write_pointer() >= request.buffered_len()
        {
            self.active = false;
            return Progress::Complete;
        }
        Progress::Recording
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn request(&self) -> Option<CaptureRequest> {
        self.request
    }

    pub fn latest(&self) -> &Snapshot {
        &self.latest
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Request of an active streamed (nonzero rate) capture
    pub fn streaming(&self) -> Option<CaptureRequest> {
        self.request.filter(|r| self.active && r.rate != 0)
    }

    /// Message carrying the latest snapshot as sample `index`
    pub fn stream_packet(&self, index: u16) -> Option<ClosedLoopData> {
        let request = self.streaming()?;
        let data = request
            .filter
            .fields()
            .map(|field| self.latest.value(field))
            .collect();
        Some(ClosedLoopData {
            first_sample_number: index,
            num_samples: 1,
            filter: request.filter.bits(),
            last_packet: index.saturating_add(1) >= request.samples,
            data,
        })
    }

    /// End a streamed capture
    pub fn finish_stream(&mut self) {
        if self.streaming().is_some() {
            self.active = false;
        }
    }

    /// True once a buffered capture has finished and data waits to be sent
    pub fn has_pending_data(&self) -> bool {
        !self.active && !self.buffer.is_drained()
    }

    /// Take the next batch of buffered records as a message
    ///
    /// Returns `None` while recording or once everything has been sent.
    pub fn next_packet(&mut self) -> Option<ClosedLoopData> {
        if !self.has_pending_data() {
            return None;
        }
        let request = self.request?;
        let fields = request.filter.len();
        let per_packet = (MAX_DATA_VALUES / fields).max(1);

        let records = (self.buffer.pending().len() / fields).min(per_packet);
        if records == 0 {
            self.buffer.reset();
            return None;
        }
        let count = records * fields;

        let data = heapless::Vec::from_slice(&self.buffer.pending()[..count]).ok()?;
        let first_sample_number = (self.buffer.read_pointer() / fields) as u16;
        self.buffer.advance(count);

        Some(ClosedLoopData {
            first_sample_number,
            num_samples: records as u8,
            filter: request.filter.bits(),
            last_packet: self.buffer.is_drained(),
            data,
        })
    }

    pub fn status(&self) -> CaptureStatus {
        CaptureStatus {
            collecting: self.active,
            request: self.request,
            pending: self.buffer.pending().len(),
        }
    }
}

impl Default for Capture {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSink for Capture {
    fn record(&mut self, snapshot: &Snapshot) {
        self.sample(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(filter: u16, samples: u16, rate: u16, mode: RecordingMode) -> CaptureRequest {
        CaptureRequest {
            filter: FilterMask::new(filter).unwrap(),
            samples,
            rate,
            mode,
            maneuvers: ManeuverSet::EMPTY,
        }
    }

    fn snapshot(n: i32) -> Snapshot {
        Snapshot {
            raw_reading: n,
            current_position: n as f32 * 0.5,
            target_position: n as f32,
            ..Default::default()
        }
    }

    #[test]
    fn test_buffered_capture_completes_after_n_records() {
        let mut capture = Capture::new();
        capture
            .start(request(0b101, 10, 0, RecordingMode::Immediate), 0.0)
            .unwrap();

        for n in 0..9 {
            assert_eq!(capture.sample(&snapshot(n)), Progress::Recording);
        }
        assert_eq!(capture.sample(&snapshot(9)), Progress::Complete);
        assert!(!capture.is_active());
        assert_eq!(capture.buffer().write_pointer(), 20);

        // Further snapshots are not recorded
        assert_eq!(capture.sample(&snapshot(10)), Progress::Idle);
        assert_eq!(capture.buffer().write_pointer(), 20);
    }

    #[test]
    fn test_every_field_fits_one_message() {
        let mut capture = Capture::new();
        capture
            .start(request(0x1FFF, 2, 50, RecordingMode::Immediate), 0.0)
            .unwrap();
        capture.sample(&snapshot(3));
        let packet = capture.stream_packet(0).unwrap();
        assert_eq!(packet.data.len(), FIELD_COUNT);
        assert_eq!(packet.data[0], 3.0);

        let mut capture = Capture::new();
        capture
            .start(request(0x1FFF, 3, 0, RecordingMode::Immediate), 0.0)
            .unwrap();
        for n in 0..3 {
            capture.sample(&snapshot(n));
        }
        for n in 0..3u16 {
            let packet = capture.next_packet().unwrap();
            assert_eq!(packet.first_sample_number, n);
            assert_eq!(packet.num_samples, 1);
            assert_eq!(packet.data.len(), FIELD_COUNT);
        }
        assert_eq!(capture.next_packet(), None);
    }

    #[test]
    fn test_drain_reproduces_buffer() {
        const N: u16 = 23;
        let mut capture = Capture::new();
        capture
            .start(request(0b101, N, 0, RecordingMode::Immediate), 0.0)
            .unwrap();
        for n in 0..N as i32 {
            capture.sample(&snapshot(n));
        }

        let mut packets = 0;
        let mut next_record = 0u16;
        let mut values = heapless::Vec::<f32, 64>::new();
        while let Some(packet) = capture.next_packet() {
            packets += 1;
            assert_eq!(packet.first_sample_number, next_record);
            assert_eq!(packet.filter, 0b101);
            assert_eq!(packet.data.len(), packet.num_samples as usize * 2);
            next_record += packet.num_samples as u16;
            values.extend_from_slice(&packet.data).unwrap();
            assert_eq!(packet.last_packet, next_record == N);
        }

        // 7 records per packet: ceil(23 / 7)
        assert_eq!(packets, 4);
        assert_eq!(next_record, N);
        for n in 0..N as usize {
            assert_eq!(values[2 * n], n as f32);
            assert_eq!(values[2 * n + 1], n as f32);
        }
        assert_eq!(capture.buffer().write_pointer(), 0);
        assert_eq!(capture.buffer().read_pointer(), 0);
    }

    #[test]
    fn test_no_packets_while_recording() {
        let mut capture = Capture::new();
        capture
            .start(request(0x1, 5, 0, RecordingMode::Immediate), 0.0)
            .unwrap();
        capture.sample(&snapshot(1));
        assert_eq!(capture.next_packet(), None);
        assert!(!capture.has_pending_data());
    }

    #[test]
    fn test_start_rejections_leave_state() {
        let mut capture = Capture::new();
        let too_big = request(0x1FFF, 200, 0, RecordingMode::Immediate);
        assert_eq!(capture.start(too_big, 0.0), Err(CaptureError::TooManySamples));
        assert!(!capture.is_active());
        assert_eq!(capture.request(), None);

        // The same size is fine when streamed
        let streamed = request(0x1FFF, 200, 100, RecordingMode::Immediate);
        assert!(capture.start(streamed, 0.0).is_ok());
        assert_eq!(
            capture.start(request(1, 1, 0, RecordingMode::Immediate), 0.0),
            Err(CaptureError::AlreadyCollecting)
        );
        assert_eq!(capture.request(), Some(streamed));
    }

    #[test]
    fn test_start_rejected_while_draining() {
        let mut capture = Capture::new();
        capture
            .start(request(0x3, 2, 0, RecordingMode::Immediate), 0.0)
            .unwrap();
        capture.sample(&snapshot(1));
        capture.sample(&snapshot(2));
        assert!(capture.has_pending_data());

        assert_eq!(
            capture.start(request(0x1, 1, 0, RecordingMode::Immediate), 0.0),
            Err(CaptureError::StillDraining)
        );
        while capture.next_packet().is_some() {}
        assert!(capture
            .start(request(0x1, 1, 0, RecordingMode::Immediate), 0.0)
            .is_ok());
    }

    #[test]
    fn test_on_next_move_waits_for_target_change() {
        let mut capture = Capture::new();
        capture
            .start(request(0x4, 2, 0, RecordingMode::OnNextMove), 3.0)
            .unwrap();
        assert!(!capture.is_triggered());
        assert_eq!(capture.sample(&snapshot(3)), Progress::Armed);
        assert_eq!(capture.buffer().write_pointer(), 0);

        assert_eq!(capture.sample(&snapshot(4)), Progress::Recording);
        assert_eq!(capture.sample(&snapshot(5)), Progress::Complete);
        assert_eq!(capture.buffer().pending(), &[4.0, 5.0]);
    }

    #[test]
    fn test_streamed_packets() {
        let mut capture = Capture::new();
        capture
            .start(request(0x3, 3, 250, RecordingMode::Immediate), 0.0)
            .unwrap();
        assert_eq!(capture.sample(&snapshot(8)), Progress::Recording);
        // Streamed captures never touch the buffer
        assert_eq!(capture.buffer().write_pointer(), 0);

        let request = capture.streaming().unwrap();
        assert_eq!(request.interval_ticks(), 4);

        let first = capture.stream_packet(0).unwrap();
        assert_eq!(first.data.as_slice(), &[8.0, 4.0]);
        assert!(!first.last_packet);
        assert!(capture.stream_packet(2).unwrap().last_packet);

        capture.finish_stream();
        assert!(!capture.is_active());
        assert_eq!(capture.stream_packet(0), None);
    }

    #[test]
    fn test_request_from_message() {
        let mut msg = StartDataCollection {
            device_number: 0,
            mode: 0,
            filter: 0x0005,
            num_samples: 100,
            rate: 0,
            movement: 0,
        };
        assert!(CaptureRequest::from_message(&msg).is_ok());

        msg.movement = 0x100;
        assert_eq!(
            CaptureRequest::from_message(&msg),
            Err(CaptureError::ManeuverOutOfRange)
        );
        msg.movement = 0;
        msg.filter = 0x2000;
        assert_eq!(
            CaptureRequest::from_message(&msg),
            Err(CaptureError::InvalidFilter)
        );
        msg.filter = 1;
        msg.mode = 2;
        assert_eq!(
            CaptureRequest::from_message(&msg),
            Err(CaptureError::InvalidMode)
        );
    }
}
