//! Byte arena that slices a continuous capture stream into fixed-size frames.

use serde::{Deserialize, Serialize};

/// What happens to bytes left over after one frame is sliced off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Keep the excess for the next frame.
    #[default]
    Retain,
    /// Drop everything past the extracted frame.
    Discard,
}

/// Growable byte arena with a read cursor.
///
/// Writes append at the tail; frames are read from the cursor. Consumed
/// space is reclaimed by shifting the unread tail to the front once it
/// covers at least half the arena, so steady-state capture does not
/// reallocate.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
    read: usize,
    frame_bytes: usize,
}

impl FrameAccumulator {
    pub fn new(frame_bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(frame_bytes * 2),
            read: 0,
            frame_bytes,
        }
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Unread bytes.
    pub fn available(&self) -> usize {
        self.buf.len() - self.read
    }

    pub fn push(&mut self, data: &[u8]) {
        self.compact();
        self.buf.extend_from_slice(data);
    }

    /// Slice one frame off the front once at least a frame's worth is buffered.
    pub fn next_frame(&mut self, policy: RemainderPolicy) -> Option<Vec<u8>> {
        if self.frame_bytes == 0 || self.available() < self.frame_bytes {
            return None;
        }

        let end = self.read + self.frame_bytes;
        let frame = self.buf[self.read..end].to_vec();
        match policy {
            RemainderPolicy::Retain => self.read = end,
            RemainderPolicy::Discard => self.clear(),
        }
        Some(frame)
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.read = 0;
    }

    fn compact(&mut self) {
        if self.read == 0 {
            return;
        }
        if self.read == self.buf.len() {
            self.clear();
        } else if self.read * 2 >= self.buf.len() {
            self.buf.copy_within(self.read.., 0);
            self.buf.truncate(self.buf.len() - self.read);
            self.read = 0;
        }
    }
}
