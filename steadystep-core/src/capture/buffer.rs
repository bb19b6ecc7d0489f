//! Fixed-capacity sample buffer
//!
//! Records are appended at the write pointer and drained from the read
//! pointer. Both pointers return to zero only once everything written has
//! been drained.

/// Sample values the buffer can hold
pub const BUFFER_CAPACITY: usize = 2000;

pub struct SampleBuffer {
    data: [f32; BUFFER_CAPACITY],
    write: usize,
    read: usize,
}

impl SampleBuffer {
    pub const fn new() -> Self {
        Self {
            data: [0.0; BUFFER_CAPACITY],
            write: 0,
            read: 0,
        }
    }

    /// Append one record; returns false if it does not fit
    pub fn push_record(&mut self, values: impl IntoIterator<Item = f32>) -> bool {
        let start = self.write;
        for value in values {
            match self.data.get_mut(self.write) {
                Some(slot) => {
                    *slot = value;
                    self.write += 1;
                }
                None => {
                    self.write = start;
                    return false;
                }
            }
        }
        true
    }

    pub fn write_pointer(&self) -> usize {
        self.write
    }

    pub fn read_pointer(&self) -> usize {
        self.read
    }

    /// Values written but not yet drained
    pub fn pending(&self) -> &[f32] {
        &self.data[self.read..self.write]
    }

    /// Mark `count` pending values as drained
    ///
    /// Rewinds both pointers once nothing is left.
    pub fn advance(&mut self, count: usize) {
        self.read = (self.read + count).min(self.write);
        if self.read == self.write {
            self.reset();
        }
    }

    pub fn is_drained(&self) -> bool {
        self.read == self.write
    }

    pub fn reset(&mut self) {
        self.write = 0;
        self.read = 0;
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain() {
        let mut buffer = SampleBuffer::new();
        assert!(buffer.push_record([1.0, 2.0]));
        assert!(buffer.push_record([3.0, 4.0]));
        assert_eq!(buffer.write_pointer(), 4);
        assert_eq!(buffer.pending(), &[1.0, 2.0, 3.0, 4.0]);

        buffer.advance(2);
        assert_eq!(buffer.read_pointer(), 2);
        assert_eq!(buffer.pending(), &[3.0, 4.0]);

        buffer.advance(2);
        assert_eq!(buffer.read_pointer(), 0);
        assert_eq!(buffer.write_pointer(), 0);
        assert!(buffer.is_drained());
    }

    #[test]
    fn test_record_that_does_not_fit_is_dropped() {
        let mut buffer = SampleBuffer::new();
        for _ in 0..BUFFER_CAPACITY / 3 {
            assert!(buffer.push_record([0.0; 3]));
        }
        let before = buffer.write_pointer();
        assert!(!buffer.push_record([9.0; 3]));
        assert_eq!(buffer.write_pointer(), before);
    }
}
