//! Embassy implementations of the core's timing and sampling seams

use embassy_time::Timer;

use steadystep_core::capture::{Progress, SampleSink, Snapshot};
use steadystep_core::traits::TickDelay;

use crate::channels::{CAPTURE, TRANSMIT_WAKE};

/// Scheduler tick length in milliseconds
pub const TICK_MS: u64 = 1;

/// [`TickDelay`] on the embassy timer
pub struct TimerDelay;

impl TickDelay for TimerDelay {
    async fn delay_ticks(&mut self, ticks: u32) {
        Timer::after_millis(ticks as u64 * TICK_MS).await;
    }
}

/// Feeds snapshots into the shared capture
///
/// Wakes the transmit task once a buffered capture fills.
pub struct CaptureSink;

impl SampleSink for CaptureSink {
    fn record(&mut self, snapshot: &Snapshot) {
        let progress = CAPTURE.lock(|capture| capture.borrow_mut().sample(snapshot));
        if progress == Progress::Complete {
            TRANSMIT_WAKE.signal(());
        }
    }
}
