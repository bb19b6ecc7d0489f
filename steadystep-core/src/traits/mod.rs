//! Hardware abstraction traits
//!
//! These traits define the interface between the closed loop logic
//! and board-specific encoder, driver and timer implementations.

pub mod delay;
pub mod driver;
pub mod encoder;

pub use delay::TickDelay;
pub use driver::{Microstepping, MotorDriver};
pub use encoder::{Encoder, EncoderError, EncoderType};
