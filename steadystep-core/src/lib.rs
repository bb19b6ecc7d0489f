//! Board-agnostic core logic for the SteadyStep closed loop stepper drive
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (encoder, motor driver, tick delay)
//! - Phase mapping and coil current translation
//! - PID control and the closed loop driver
//! - Tuning maneuvers and Ziegler-Nichols gain search
//! - Sample capture for data collection
//! - Configuration, calibration record and text reports

#![no_std]
#![deny(unsafe_code)]

pub mod capture;
pub mod coils;
pub mod config;
pub mod control;
pub mod phase;
pub mod pid;
pub mod report;
pub mod traits;
pub mod tuning;
