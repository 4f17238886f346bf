//! Decoded video frames.
//!
//! Frames are RGB24, row-major, tightly packed. They live for one pass of the
//! frame-processing loop and are never persisted.

use anyhow::{anyhow, Result};

pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Position of this frame in the source since it was opened (1-based).
    pub sequence: u64,
}

impl Frame {
    /// Wraps decoded RGB24 pixels. The buffer length must match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 3;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer has {} bytes, {}x{} RGB needs {}",
                data.len(),
                width,
                height,
                expected
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    /// All-black frame.
    pub fn blank(width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data: vec![0u8; (width as usize) * (height as usize) * 3],
            width,
            height,
            sequence,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}
