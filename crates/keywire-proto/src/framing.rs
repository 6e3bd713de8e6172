//! Segment-based byte queue for packet framing.
//!
//! A transport hands the session arbitrarily sized chunks; packets rarely
//! line up with chunk boundaries. [`SegmentBuffer`] queues the chunks as-is
//! (no copy on append) and lets the decode loop peel exact byte counts off
//! the front: a whole header, then a whole payload.

use std::collections::VecDeque;

use bytes::{Buf, Bytes};

use crate::errors::{ProtocolError, Result};

/// Append-mostly byte queue over refcounted segments.
///
/// `append` is O(1) and copy-free; `peek_first`/`remove_first` are O(n) in
/// the bytes they return. A partially consumed head segment keeps its tail
/// in place (the segment is advanced, not reallocated).
///
/// # Invariants
///
/// - No stored segment is empty.
/// - `len()` equals the sum of stored segment lengths.
#[derive(Debug, Default)]
pub struct SegmentBuffer {
    segments: VecDeque<Bytes>,
    len: usize,
}

impl SegmentBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact count of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Enqueue a chunk without copying it.
    ///
    /// Empty chunks are ignored so that stored segments stay non-empty.
    pub fn append(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.segments.push_back(chunk);
    }

    /// Copy of the first `n` bytes, leaving the buffer untouched.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::SliceOutOfRange`] when `n == 0` or `n > len()`.
    pub fn peek_first(&self, n: usize) -> Result<Vec<u8>> {
        self.check_range(n)?;

        let mut out = Vec::with_capacity(n);
        for segment in &self.segments {
            let take = (n - out.len()).min(segment.len());
            out.extend_from_slice(&segment[..take]);
            if out.len() == n {
                break;
            }
        }

        debug_assert_eq!(out.len(), n);
        Ok(out)
    }

    /// Copy of the first `n` bytes, dropping them from the buffer.
    ///
    /// Fully consumed segments are popped; a partially consumed head
    /// segment is advanced in place so its tail stays buffered.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::SliceOutOfRange`] when `n == 0` or `n > len()`.
    pub fn remove_first(&mut self, n: usize) -> Result<Vec<u8>> {
        self.check_range(n)?;

        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let Some(segment) = self.segments.front_mut() else {
                break;
            };
            let take = (n - out.len()).min(segment.len());
            out.extend_from_slice(&segment[..take]);
            if take == segment.len() {
                self.segments.pop_front();
            } else {
                segment.advance(take);
            }
        }

        debug_assert_eq!(out.len(), n);
        self.len -= n;
        Ok(out)
    }

    fn check_range(&self, n: usize) -> Result<()> {
        if n == 0 || n > self.len {
            return Err(ProtocolError::SliceOutOfRange { requested: n, available: self.len });
        }
        Ok(())
    }
}
