//! Streamed capture task
//!
//! Paces captures with a nonzero sample rate: one data message per sample,
//! carrying the latest control snapshot. Buffered captures fill on the
//! control tick and are sent by the transmit task instead.

use defmt::*;
use embassy_time::{Duration, Ticker, Timer};

use steadystep_core::capture::TRIGGER_POLL_TICKS;

use crate::adapters::TICK_MS;
use crate::channels::{CAPTURE, CAPTURE_START, OUTBOUND};

/// Capture task - streams rate-limited samples
#[embassy_executor::task]
pub async fn capture_task() {
    info!("Capture task started");

    loop {
        let request = CAPTURE_START.wait().await;
        if request.rate == 0 {
            continue;
        }

        // Recording on next move: wait for the control tick to see it
        while CAPTURE.lock(|c| {
            let capture = c.borrow();
            capture.is_active() && !capture.is_triggered()
        }) {
            Timer::after_millis(TRIGGER_POLL_TICKS as u64 * TICK_MS).await;
        }

        info!(
            "Streaming {} samples at {} Hz",
            request.samples, request.rate
        );

        let mut ticker = Ticker::every(Duration::from_millis(
            request.interval_ticks() as u64 * TICK_MS,
        ));
        let mut sent = 0u16;
        for index in 0..request.samples {
            let Some(packet) = CAPTURE.lock(|c| c.borrow().stream_packet(index)) else {
                break;
            };
            OUTBOUND.send(packet).await;
            sent += 1;
            ticker.next().await;
        }

        CAPTURE.lock(|c| c.borrow_mut().finish_stream());
        info!("Streamed capture finished, {} samples sent", sent);
    }
}
