//! Little-endian payload encoding for closed loop CAN messages.
//!
//! Every message is a fixed-layout byte payload that fits in a single CAN-FD
//! data field:
//! - integers are little-endian
//! - floats are IEEE-754 `f32`, little-endian
//! - booleans and flag sets occupy one byte

/// Largest payload carried by one message (one CAN-FD data field)
pub const MAX_PAYLOAD_SIZE: usize = 64;

/// Errors that can occur while encoding or decoding a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadError {
    /// Output buffer cannot hold the encoded message
    BufferTooSmall,
    /// Input ended before all fields were read
    Truncated,
    /// A field holds a value outside its defined range
    InvalidValue,
    /// Message would exceed [`MAX_PAYLOAD_SIZE`]
    PayloadTooLarge,
}

/// Sequential writer over a caller-provided buffer
pub struct PayloadWriter<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> PayloadWriter<'a> {
    /// Create a writer starting at the beginning of `buffer`
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.position
    }

    /// Check if nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), PayloadError> {
        let end = self.position + bytes.len();
        if end > MAX_PAYLOAD_SIZE {
            return Err(PayloadError::PayloadTooLarge);
        }
        let slot = self
            .buffer
            .get_mut(self.position..end)
            .ok_or(PayloadError::BufferTooSmall)?;
        slot.copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), PayloadError> {
        self.put(&[value])
    }

    pub fn put_u16(&mut self, value: u16) -> Result<(), PayloadError> {
        self.put(&value.to_le_bytes())
    }

    pub fn put_f32(&mut self, value: f32) -> Result<(), PayloadError> {
        self.put(&value.to_le_bytes())
    }

    /// Write `count` zero bytes (reserved/alignment fields)
    pub fn pad(&mut self, count: usize) -> Result<(), PayloadError> {
        for _ in 0..count {
            self.put_u8(0)?;
        }
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), PayloadError> {
        self.put(bytes)
    }
}

/// Sequential reader over a received payload
pub struct PayloadReader<'a> {
    payload: &'a [u8],
    position: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            position: 0,
        }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.position
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], PayloadError> {
        let end = self.position + N;
        let bytes = self
            .payload
            .get(self.position..end)
            .ok_or(PayloadError::Truncated)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.position = end;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, PayloadError> {
        self.take::<1>().map(|b| b[0])
    }

    pub fn u16(&mut self) -> Result<u16, PayloadError> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    pub fn f32(&mut self) -> Result<f32, PayloadError> {
        self.take::<4>().map(f32::from_le_bytes)
    }

    /// Skip `count` reserved bytes
    pub fn skip(&mut self, count: usize) -> Result<(), PayloadError> {
        if self.remaining() < count {
            return Err(PayloadError::Truncated);
        }
        self.position += count;
        Ok(())
    }

    /// Consume everything that is left
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.payload[self.position..];
        self.position = self.payload.len();
        rest
    }
}
