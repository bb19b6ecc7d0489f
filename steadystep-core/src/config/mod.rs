//! Configuration types
//!
//! Closed loop settings, their validation, and the calibration record
//! stored as postcard binary data.

pub mod calibration;
pub mod types;

pub use calibration::*;
pub use types::*;
