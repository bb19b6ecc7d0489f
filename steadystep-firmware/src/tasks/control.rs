//! Control tick task
//!
//! Runs one closed loop cycle per scheduler tick. While the tuning task
//! holds the controller the tick is skipped; maneuvers record their own
//! samples.

use defmt::*;
use embassy_time::{Duration, Ticker};

use steadystep_core::control::{Excursion, SpinOutcome};

use crate::adapters::{CaptureSink, TICK_MS};
use crate::channels::TUNING_WAKE;
use crate::SharedController;

/// Control task - periodic closed loop tick
#[embassy_executor::task]
pub async fn control_task(controller: &'static SharedController) {
    info!("Control task started");

    let mut ticker = Ticker::every(Duration::from_millis(TICK_MS));
    let mut sink = CaptureSink;
    let mut last_excursion = Excursion::None;

    loop {
        ticker.next().await;

        let Ok(mut control) = controller.try_lock() else {
            continue;
        };

        let excursion = match control.spin(&mut sink) {
            SpinOutcome::TuningWake => {
                TUNING_WAKE.signal(());
                continue;
            }
            SpinOutcome::Disabled => continue,
            SpinOutcome::Controlled(excursion) => excursion,
        };

        // Only log changes, the tick runs at 1 kHz
        if excursion != last_excursion {
            let error = control.pid().error();
            match excursion {
                Excursion::Error => warn!("Position error {} steps over error threshold", error),
                Excursion::Warning => debug!("Position error {} steps over warning threshold", error),
                Excursion::None => debug!("Position error back within thresholds"),
            }
            last_excursion = excursion;
        }
    }
}
