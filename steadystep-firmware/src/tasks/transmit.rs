//! Transmission task
//!
//! Drains a completed buffered capture into data messages. Woken when the
//! buffer fills and polls as a fallback.

use defmt::*;
use embassy_futures::select::select;
use embassy_time::Timer;

use steadystep_core::capture::TRANSMIT_POLL_TICKS;

use crate::adapters::TICK_MS;
use crate::channels::{CAPTURE, OUTBOUND, TRANSMIT_WAKE};

/// Transmit task - sends buffered capture data
#[embassy_executor::task]
pub async fn transmit_task() {
    info!("Transmit task started");

    loop {
        let _ = select(
            TRANSMIT_WAKE.wait(),
            Timer::after_millis(TRANSMIT_POLL_TICKS as u64 * TICK_MS),
        )
        .await;

        let mut sent = 0u32;
        while let Some(packet) = CAPTURE.lock(|c| c.borrow_mut().next_packet()) {
            OUTBOUND.send(packet).await;
            sent += 1;
        }

        if sent > 0 {
            info!("Capture data sent in {} messages", sent);
        }
    }
}
