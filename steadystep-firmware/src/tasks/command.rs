//! Command task
//!
//! Handles host requests, configuration, diagnostics and calibration
//! persistence. Every command gets at least one reply; text longer than one
//! reply message is split over several.

use defmt::*;

use steadystep_core::config::{CalibrationRecord, ConfigureRequest, CALIBRATION_MAX_SIZE};
use steadystep_core::control::{tuning_result, CommandError, ConfigureOutcome, DEVICE_NUMBER};
use steadystep_core::report::{config_report, diagnostics_report, write_tuning, ReportText};
use steadystep_protocol::{
    CommandResult, HostRequest, Reply, StartDataCollection, TuneRequest, MAX_REPLY_TEXT,
};

use crate::channels::{
    CalibrationBytes, Command, CALIBRATION_SAVE, CAPTURE, CAPTURE_START, COMMANDS, REPLIES,
    TUNING_DONE, TUNING_WAKE,
};
use crate::{EncoderFactory, SharedController};

/// Command task - processes host commands one at a time
#[embassy_executor::task]
pub async fn command_task(controller: &'static SharedController, make_encoder: EncoderFactory) {
    info!("Command task started");

    loop {
        match COMMANDS.receive().await {
            Command::Host(HostRequest::StartDataCollection(msg)) => {
                start_collection(controller, &msg).await
            }
            Command::Host(HostRequest::Tune(request)) => tune(controller, &request).await,
            Command::Configure(request) => configure(controller, &request, make_encoder).await,
            Command::Diagnostics => diagnostics(controller).await,
            Command::SaveCalibration => save_calibration(controller).await,
            Command::RestoreCalibration(bytes) => restore_calibration(controller, &bytes).await,
        }
    }
}

/// Send `text` as one or more replies
async fn reply(result: CommandResult, text: &str) {
    let mut rest = text;
    loop {
        let mut split = rest.len().min(MAX_REPLY_TEXT);
        while !rest.is_char_boundary(split) {
            split -= 1;
        }
        let (head, tail) = rest.split_at(split);
        REPLIES.send(Reply::new(result, head)).await;
        if tail.is_empty() {
            break;
        }
        rest = tail;
    }
}

async fn start_collection(controller: &'static SharedController, msg: &StartDataCollection) {
    let started = {
        let mut control = controller.lock().await;
        CAPTURE.lock(|capture| control.start_capture(&mut capture.borrow_mut(), msg))
    };

    match started {
        Ok(request) => {
            info!(
                "Data collection started: filter {:#x}, {} samples, rate {}",
                request.filter.bits(),
                request.samples,
                request.rate
            );
            CAPTURE_START.signal(request);
            if !request.maneuvers.is_empty() {
                TUNING_WAKE.signal(());
            }
            reply(CommandResult::Ok, "").await;
        }
        Err(e) => {
            warn!("Data collection rejected: {}", e.message());
            reply(CommandResult::Error, e.message()).await;
        }
    }
}

async fn tune(controller: &'static SharedController, request: &TuneRequest) {
    if request.device_number != DEVICE_NUMBER {
        reply(CommandResult::Error, CommandError::InvalidDevice.message()).await;
        return;
    }

    let before = {
        let mut control = controller.lock().await;
        TUNING_DONE.reset();
        control.request_tuning(request.maneuvers)
    };

    let before = match before {
        Ok(before) => before,
        Err(e) => {
            warn!("Tuning rejected: {}", e.message());
            reply(CommandResult::Error, e.message()).await;
            return;
        }
    };

    let after = if request.maneuvers == 0 {
        before
    } else {
        TUNING_WAKE.signal(());
        TUNING_DONE.wait().await.errors
    };

    let mut text = ReportText::new();
    if write_tuning(&mut text, after).is_err() {
        warn!("Tuning reply truncated");
    }
    reply(tuning_result(before, after), &text).await;
}

async fn configure(
    controller: &'static SharedController,
    request: &ConfigureRequest,
    make_encoder: EncoderFactory,
) {
    let mut control = controller.lock().await;
    match control.configure(request, make_encoder) {
        Ok(ConfigureOutcome::Report) => {
            let text = config_report(&*control);
            drop(control);
            reply(CommandResult::Ok, &text).await;
        }
        Ok(ConfigureOutcome::Applied) => {
            info!(
                "Configuration applied, closed loop {}",
                control.is_enabled()
            );
            drop(control);
            reply(CommandResult::Ok, "").await;
        }
        Err(e) => {
            drop(control);
            warn!("Configuration rejected: {}", e.message());
            reply(CommandResult::Error, e.message()).await;
        }
    }
}

async fn diagnostics(controller: &'static SharedController) {
    let text = {
        let control = controller.lock().await;
        let status = CAPTURE.lock(|capture| capture.borrow().status());
        diagnostics_report(&*control, &status)
    };
    reply(CommandResult::Ok, &text).await;
}

async fn save_calibration(controller: &'static SharedController) {
    let record = controller.lock().await.calibration();
    let mut buf = [0u8; CALIBRATION_MAX_SIZE];

    let encoded = record
        .encode(&mut buf)
        .map_err(|e| e.message())
        .and_then(|len| {
            CalibrationBytes::from_slice(&buf[..len]).map_err(|_| "Calibration record too large")
        });

    match encoded {
        Ok(bytes) => {
            info!("Calibration saved, {} bytes", bytes.len());
            CALIBRATION_SAVE.signal(bytes);
            reply(CommandResult::Ok, "").await;
        }
        Err(message) => {
            error!("Failed to save calibration: {}", message);
            reply(CommandResult::Error, message).await;
        }
    }
}

async fn restore_calibration(controller: &'static SharedController, bytes: &[u8]) {
    let restored = match CalibrationRecord::decode(bytes) {
        Ok(record) => controller.lock().await.restore_calibration(&record),
        Err(e) => Err(e),
    };

    match restored {
        Ok(()) => {
            info!("Calibration restored");
            reply(CommandResult::Ok, "").await;
        }
        Err(e) => {
            warn!("Calibration not restored: {}", e.message());
            reply(CommandResult::Error, e.message()).await;
        }
    }
}
