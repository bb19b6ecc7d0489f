//! SteadyStep - closed loop stepper drive firmware
//!
//! Embassy task layer around [`steadystep_core`]. A board binary sets up
//! its peripherals, then calls [`start`] with its motor driver and an
//! encoder factory. Host commands go in through [`channels::COMMANDS`];
//! replies and data messages come out of [`channels::REPLIES`] and
//! [`channels::OUTBOUND`] for the board's CAN transport.

#![no_std]
#![deny(unsafe_code)]

pub mod adapters;
pub mod channels;
pub mod tasks;

use defmt::*;
use embassy_executor::{SpawnError, Spawner};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use static_cell::StaticCell;

use steadystep_core::config::ClosedLoopConfig;
use steadystep_core::control::ClosedLoop;
use steadystep_core::traits::{Encoder, EncoderType, MotorDriver};

/// Encoder provided by the board
pub type BoardEncoder = &'static mut (dyn Encoder + Send);

/// Motor driver provided by the board
pub type BoardDriver = &'static mut (dyn MotorDriver + Send);

/// Builds the encoder for a configured type, `None` if the board lacks it
pub type EncoderFactory = fn(EncoderType) -> Option<BoardEncoder>;

pub type Controller = ClosedLoop<BoardEncoder, BoardDriver>;

/// The controller shared by the control, tuning and command tasks
pub type SharedController = Mutex<CriticalSectionRawMutex, Controller>;

static CONTROLLER: StaticCell<SharedController> = StaticCell::new();

/// Build the controller and spawn every task
///
/// Returns the shared controller so the board can feed step input and
/// target moves into it.
pub fn start(
    spawner: Spawner,
    driver: BoardDriver,
    mut config: ClosedLoopConfig,
    make_encoder: EncoderFactory,
) -> Result<&'static SharedController, SpawnError> {
    info!("SteadyStep starting...");

    let encoder = match config.encoder_type {
        EncoderType::None => None,
        kind => {
            let encoder = make_encoder(kind);
            if encoder.is_none() {
                warn!("Encoder {} not available, closed loop disabled", kind.name());
                config.encoder_type = EncoderType::None;
            }
            encoder
        }
    };

    let controller = CONTROLLER.init(Mutex::new(ClosedLoop::new(driver, config, encoder)));

    spawner.spawn(tasks::control_task(controller))?;
    spawner.spawn(tasks::tuning_task(controller))?;
    spawner.spawn(tasks::capture_task())?;
    spawner.spawn(tasks::transmit_task())?;
    spawner.spawn(tasks::command_task(controller, make_encoder))?;

    info!("All tasks spawned");
    Ok(controller)
}
