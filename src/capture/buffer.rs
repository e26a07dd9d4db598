//! Fixed-capacity in-memory mirror of received bytes

use crate::config::CAPTURE_BUFFER_SIZE;

/// The buffer has no room left; the byte was not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFull;

/// Append-only byte buffer. `len() <= capacity()` always holds and a full
/// buffer rejects further bytes instead of overwriting.
pub struct CaptureBuffer {
    data: [u8; CAPTURE_BUFFER_SIZE],
    fill: usize,
}

impl CaptureBuffer {
    pub const fn new() -> Self {
        Self {
            data: [0u8; CAPTURE_BUFFER_SIZE],
            fill: 0,
        }
    }

    pub fn push(&mut self, byte: u8) -> Result<(), BufferFull> {
        if self.fill >= CAPTURE_BUFFER_SIZE {
            return Err(BufferFull);
        }
        self.data[self.fill] = byte;
        self.fill += 1;
        Ok(())
    }

    /// Reset the fill index and zero the contents
    pub fn clear(&mut self) {
        self.data = [0u8; CAPTURE_BUFFER_SIZE];
        self.fill = 0;
    }

    #[cfg(test)]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.fill]
    }

    pub fn len(&self) -> usize {
        self.fill
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.fill == 0
    }

    #[cfg(test)]
    pub fn is_full(&self) -> bool {
        self.fill == CAPTURE_BUFFER_SIZE
    }

    pub fn capacity(&self) -> usize {
        CAPTURE_BUFFER_SIZE
    }
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new()
    }
}
