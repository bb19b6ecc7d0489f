//! Tuning task
//!
//! Runs pending maneuver batches on wake-up. Holds the controller for the
//! whole batch, which suspends the control tick.

use defmt::*;

use crate::adapters::{CaptureSink, TimerDelay};
use crate::channels::{TUNING_DONE, TUNING_WAKE};
use crate::SharedController;

/// Tuning task - executes requested maneuvers in priority order
#[embassy_executor::task]
pub async fn tuning_task(controller: &'static SharedController) {
    info!("Tuning task started");

    let mut delay = TimerDelay;
    let mut sink = CaptureSink;

    loop {
        TUNING_WAKE.wait().await;

        let mut control = controller.lock().await;
        if control.pending().is_empty() {
            continue;
        }

        info!("Tuning batch {:#x} starting", control.pending().bits());
        let report = control.run_tuning(&mut delay, &mut sink).await;

        match report.fault {
            Some(fault) => warn!("Tuning abandoned: {}", fault.message()),
            None => info!(
                "Tuning batch {:#x} done, errors {:#x}",
                report.ran.bits(),
                report.errors.bits()
            ),
        }

        // Signalled under the lock so a waiting command never sees a stale report
        TUNING_DONE.signal(report);
        drop(control);
    }
}
