// vigil-frame/src/lib.rs
// ============================================================
// Frame ingestion types for Vigil
// Frames arrive from the capture side as interleaved RGBA8
// buffers tagged with a caller-chosen id and a submission
// timestamp.  They sit in a bounded FIFO until the scheduler
// picks them up.
// ------------------------------------------------------------
// Public API:
//   * Frame::new(id, w, h, pixels)  – stamp + own a frame
//   * FrameQueue::push / pop        – bounded FIFO w/ overflow
// ============================================================

//! Vigil – frame ingestion layer
//!
//! A [`Frame`] is immutable once built: the pixel buffer is moved in and
//! only handed out by reference.  The [`FrameQueue`] owns frames between
//! submission and processing and enforces a capacity so that a stalled
//! consumer cannot grow memory without bound.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

mod queue;
pub use queue::{FrameQueue, OverflowPolicy, Pushed};

/// Bytes per pixel of a submitted frame (R, G, B, A).
pub const CHANNELS: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame dimensions must be non-zero, got {width}x{height}")]
    ZeroSized { width: u32, height: u32 },
    #[error("Frame buffer has {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Caller-assigned frame identifier, echoed back on every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for FrameId {
    fn from(v: u64) -> Self {
        FrameId(v)
    }
}

/// A submitted camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    id: FrameId,
    width: u32,
    height: u32,
    pixels: Vec<u8>, // RGBA8, row-major, no padding
    submitted_at_ms: u64,
}

impl Frame {
    /// Take ownership of `pixels` and stamp the frame with the current time.
    ///
    /// The buffer is not validated here; a malformed buffer is reported by the
    /// preprocessing stage so that the error is tied to this frame's id.
    pub fn new(id: impl Into<FrameId>, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self::with_timestamp(id, width, height, pixels, now_millis())
    }

    /// Same as [`Frame::new`] with an explicit submission timestamp (ms since epoch).
    pub fn with_timestamp(
        id: impl Into<FrameId>,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        submitted_at_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            pixels,
            submitted_at_ms,
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn submitted_at_ms(&self) -> u64 {
        self.submitted_at_ms
    }

    /// Number of bytes a well-formed buffer for these dimensions holds.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }

    /// Check dimensions and buffer length.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::ZeroSized {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.expected_len();
        if self.pixels.len() != expected {
            return Err(FrameError::BufferLength {
                width: self.width,
                height: self.height,
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// Milliseconds since the UNIX epoch; 0 if the clock is before 1970.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_frame_validates() {
        let frame = Frame::new(7, 4, 2, vec![0u8; 4 * 2 * 4]);
        assert_eq!(frame.id(), FrameId(7));
        assert!(frame.validate().is_ok());
        assert!(frame.submitted_at_ms() > 0);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let frame = Frame::new(1, 4, 4, vec![0u8; 10]);
        assert_eq!(
            frame.validate(),
            Err(FrameError::BufferLength {
                width: 4,
                height: 4,
                expected: 64,
                actual: 10
            })
        );
    }

    #[test]
    fn zero_sized_is_rejected() {
        let frame = Frame::new(1, 0, 4, Vec::new());
        assert!(matches!(frame.validate(), Err(FrameError::ZeroSized { .. })));
    }

    #[test]
    fn frame_id_serializes_as_number() {
        assert_eq!(serde_json::to_string(&FrameId(42)).unwrap(), "42");
    }
}
