//! Message types for closed loop data collection and tuning
//!
//! Message types are divided into two categories:
//! - Host → Board: data collection start, tuning trigger
//! - Board → Host: sampled data, command replies

use crate::payload::{PayloadError, PayloadReader, PayloadWriter, MAX_PAYLOAD_SIZE};
use heapless::{String, Vec};

// Message type IDs: Host → Board
pub const MSG_START_DATA_COLLECTION: u8 = 0x40;
pub const MSG_TUNE: u8 = 0x41;

// Message type IDs: Board → Host
pub const MSG_CLOSED_LOOP_DATA: u8 = 0x60;
pub const MSG_REPLY: u8 = 0x61;

/// Fixed header in front of the sample values of a data message
pub const DATA_HEADER_SIZE: usize = 8;

/// Most sample values that fit in one data message
pub const MAX_DATA_VALUES: usize = (MAX_PAYLOAD_SIZE - DATA_HEADER_SIZE) / 4;

/// Longest reply text carried in one reply message
pub const MAX_REPLY_TEXT: usize = MAX_PAYLOAD_SIZE - 2;

/// An encoded message payload
pub type Payload = Vec<u8, MAX_PAYLOAD_SIZE>;

const LAST_PACKET_FLAG: u8 = 0x01;

fn finish(bytes: &[u8]) -> Result<Payload, PayloadError> {
    Vec::from_slice(bytes).map_err(|_| PayloadError::PayloadTooLarge)
}

/// A batch of captured samples sent back to the host
///
/// Payload layout:
/// ```text
/// ┌──────────────┬─────┬───────┬────────┬──────────┬──────────────┐
/// │ FIRST SAMPLE │ NUM │ FLAGS │ FILTER │ RESERVED │ VALUES (f32) │
/// │ 2B           │ 1B  │ 1B    │ 2B     │ 2B       │ 0–56B        │
/// └──────────────┴─────┴───────┴────────┴──────────┴──────────────┘
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClosedLoopData {
    /// Index of the first sample record in this message
    pub first_sample_number: u16,
    /// Number of sample records in this message
    pub num_samples: u8,
    /// Filter bitmask describing which fields each record holds
    pub filter: u16,
    /// Set on the final message of a capture
    pub last_packet: bool,
    /// Record values, `num_samples × fields` of them, in record order
    pub data: Vec<f32, MAX_DATA_VALUES>,
}

impl ClosedLoopData {
    pub fn to_payload(&self) -> Result<Payload, PayloadError> {
        let mut buffer = [0u8; MAX_PAYLOAD_SIZE];
        let mut writer = PayloadWriter::new(&mut buffer);
        writer.put_u16(self.first_sample_number)?;
        writer.put_u8(self.num_samples)?;
        writer.put_u8(if self.last_packet { LAST_PACKET_FLAG } else { 0 })?;
        writer.put_u16(self.filter)?;
        writer.pad(2)?;
        for value in &self.data {
            writer.put_f32(*value)?;
        }
        let len = writer.len();
        finish(&buffer[..len])
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = PayloadReader::new(payload);
        let first_sample_number = reader.u16()?;
        let num_samples = reader.u8()?;
        let flags = reader.u8()?;
        let filter = reader.u16()?;
        reader.skip(2)?;

        let values = reader.rest();
        if values.len() % 4 != 0 {
            return Err(PayloadError::Truncated);
        }
        let mut data = Vec::new();
        for chunk in values.chunks_exact(4) {
            let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            data.push(value).map_err(|_| PayloadError::InvalidValue)?;
        }

        Ok(Self {
            first_sample_number,
            num_samples,
            filter,
            last_packet: flags & LAST_PACKET_FLAG != 0,
            data,
        })
    }
}

/// Request to start sampling control variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StartDataCollection {
    pub device_number: u8,
    /// 0 = immediate, 1 = on next move
    pub mode: u8,
    pub filter: u16,
    pub num_samples: u16,
    /// Samples per second, 0 = once per control tick into the buffer
    pub rate: u16,
    /// Tuning maneuver bits to run while sampling
    pub movement: u16,
}

impl StartDataCollection {
    pub const SIZE: usize = 10;

    pub fn to_payload(&self) -> Result<Payload, PayloadError> {
        let mut buffer = [0u8; MAX_PAYLOAD_SIZE];
        let mut writer = PayloadWriter::new(&mut buffer);
        writer.put_u8(self.device_number)?;
        writer.put_u8(self.mode)?;
        writer.put_u16(self.filter)?;
        writer.put_u16(self.num_samples)?;
        writer.put_u16(self.rate)?;
        writer.put_u16(self.movement)?;
        let len = writer.len();
        finish(&buffer[..len])
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = PayloadReader::new(payload);
        Ok(Self {
            device_number: reader.u8()?,
            mode: reader.u8()?,
            filter: reader.u16()?,
            num_samples: reader.u16()?,
            rate: reader.u16()?,
            movement: reader.u16()?,
        })
    }
}

/// Request to run tuning maneuvers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TuneRequest {
    pub device_number: u8,
    pub maneuvers: u16,
}

impl TuneRequest {
    pub fn to_payload(&self) -> Result<Payload, PayloadError> {
        let mut buffer = [0u8; MAX_PAYLOAD_SIZE];
        let mut writer = PayloadWriter::new(&mut buffer);
        writer.put_u8(self.device_number)?;
        writer.pad(1)?;
        writer.put_u16(self.maneuvers)?;
        let len = writer.len();
        finish(&buffer[..len])
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = PayloadReader::new(payload);
        let device_number = reader.u8()?;
        reader.skip(1)?;
        Ok(Self {
            device_number,
            maneuvers: reader.u16()?,
        })
    }
}

/// Outcome of a host command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandResult {
    Ok = 0,
    Warning = 1,
    Error = 2,
}

impl CommandResult {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::Warning),
            2 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Reply to a host command: result code plus text
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reply {
    pub result: CommandResult,
    pub text: String<MAX_REPLY_TEXT>,
}

impl Reply {
    /// Reply with the given result; text longer than one message is cut
    pub fn new(result: CommandResult, text: &str) -> Self {
        let mut out = String::new();
        for ch in text.chars() {
            if out.push(ch).is_err() {
                break;
            }
        }
        Self { result, text: out }
    }

    pub fn ok() -> Self {
        Self::new(CommandResult::Ok, "")
    }

    pub fn to_payload(&self) -> Result<Payload, PayloadError> {
        let mut buffer = [0u8; MAX_PAYLOAD_SIZE];
        let mut writer = PayloadWriter::new(&mut buffer);
        writer.put_u8(self.result as u8)?;
        writer.put_u8(self.text.len() as u8)?;
        writer.put_bytes(self.text.as_bytes())?;
        let len = writer.len();
        finish(&buffer[..len])
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = PayloadReader::new(payload);
        let result = CommandResult::from_u8(reader.u8()?).ok_or(PayloadError::InvalidValue)?;
        let len = reader.u8()? as usize;
        let bytes = reader.rest();
        let text = bytes
            .get(..len)
            .ok_or(PayloadError::Truncated)
            .and_then(|b| core::str::from_utf8(b).map_err(|_| PayloadError::InvalidValue))?;
        Ok(Self::new(result, text))
    }
}

/// Requests parsed from host-originated messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostRequest {
    StartDataCollection(StartDataCollection),
    Tune(TuneRequest),
}

impl HostRequest {
    /// Parse a request from its message type and payload
    pub fn from_message(msg_type: u8, payload: &[u8]) -> Result<Self, PayloadError> {
        match msg_type {
            MSG_START_DATA_COLLECTION => {
                StartDataCollection::from_payload(payload).map(HostRequest::StartDataCollection)
            }
            MSG_TUNE => TuneRequest::from_payload(payload).map(HostRequest::Tune),
            _ => Err(PayloadError::InvalidValue),
        }
    }

    pub fn msg_type(&self) -> u8 {
        match self {
            HostRequest::StartDataCollection(_) => MSG_START_DATA_COLLECTION,
            HostRequest::Tune(_) => MSG_TUNE,
        }
    }
}
