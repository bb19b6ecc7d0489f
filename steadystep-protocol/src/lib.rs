//! SteadyStep CAN Payload Protocol
//!
//! This crate defines the binary payloads exchanged between a host and a closed
//! loop stepper driver board: starting data collection, triggering tuning
//! maneuvers, streaming captured samples back and replying to commands.
//!
//! # Protocol Overview
//!
//! Each message is a message type ID plus a fixed-layout payload of at most
//! [`MAX_PAYLOAD_SIZE`] bytes (one CAN-FD data field). CAN framing itself
//! belongs to the transport and is not handled here.
//!
//! ```text
//! ┌──────┬─────────────┐
//! │ TYPE │ PAYLOAD     │
//! │ 1B   │ 0–64B       │
//! └──────┴─────────────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod messages;
pub mod payload;

pub use messages::{
    ClosedLoopData, CommandResult, HostRequest, Payload, Reply, StartDataCollection, TuneRequest,
    MAX_DATA_VALUES, MAX_REPLY_TEXT,
};
pub use payload::{PayloadError, PayloadReader, PayloadWriter, MAX_PAYLOAD_SIZE};
