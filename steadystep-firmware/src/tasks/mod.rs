//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod capture;
pub mod command;
pub mod control;
pub mod transmit;
pub mod tuning;

pub use capture::capture_task;
pub use command::command_task;
pub use control::control_task;
pub use transmit::transmit_task;
pub use tuning::tuning_task;
