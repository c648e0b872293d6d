//! Byte-stream framing for inbound Firmata traffic.
//!
//! Transports deliver bytes in arbitrary chunks: a single MQTT message may
//! carry several frames, and a serial read may stop in the middle of one.
//! The [`Framer`] consumes one byte at a time and yields complete frames,
//! so the result never depends on where the chunk boundaries fell.
//!
//! Rules, applied after each byte is appended:
//!
//! 1. Buffer led by a command byte other than `START_SYSEX` reaching three
//!    bytes yields [`Frame::MultiByte`].
//! 2. Buffer led by `START_SYSEX` whose newest byte is `END_SYSEX` yields
//!    [`Frame::Sysex`].
//! 3. A byte `>= 0x80` arriving after a data-led buffer discards the
//!    buffer. The new byte is kept unless it is `END_SYSEX`.
//! 4. A sysex still unterminated after [`MAX_SYSEX_LEN`] bytes is
//!    discarded; its tail is then dropped as data by rule 3.
//!
//! Neither garbage nor an endless sysex grows the buffer without bound.
//!
//! ```rust
//! use firmata_board::framer::{Framer, Frame};
//!
//! let mut framer = Framer::new();
//! let frames: Vec<Frame> = [0x12, 0xE0, 0x10, 0x01]
//!     .iter()
//!     .filter_map(|b| framer.push(*b))
//!     .collect();
//! assert_eq!(frames, vec![Frame::MultiByte([0xE0, 0x10, 0x01])]);
//! ```

use crate::protocol::{END_SYSEX, START_SYSEX};

/// Longest sysex frame, delimiters included, the framer will buffer.
pub const MAX_SYSEX_LEN: usize = 8192;

/// A complete inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Three-byte command: `[command, lsb, msb]`.
    MultiByte([u8; 3]),
    /// Sysex payload with the delimiters removed: `[sub-command, data...]`.
    Sysex(Vec<u8>),
}

/// Incremental Firmata frame assembler.
#[derive(Debug, Default)]
pub struct Framer {
    buf: Vec<u8>,
}

impl Framer {
    /// Creates an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered bytes belonging to an incomplete frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drops any partial frame.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Feeds one byte, returning a frame if this byte completed one.
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        // Data after data is discarded by rule 3 anyway; keep one byte.
        if byte < 0x80 && self.buf.first().is_some_and(|lead| *lead < 0x80) {
            return None;
        }
        self.buf.push(byte);
        let lead = self.buf[0];

        if lead >= 0x80 && lead != START_SYSEX {
            if self.buf.len() == 3 {
                let frame = [self.buf[0], self.buf[1], self.buf[2]];
                self.buf.clear();
                return Some(Frame::MultiByte(frame));
            }
        } else if lead == START_SYSEX && byte == END_SYSEX {
            let len = self.buf.len();
            let payload = self.buf[1..len - 1].to_vec();
            self.buf.clear();
            return Some(Frame::Sysex(payload));
        } else if lead == START_SYSEX && self.buf.len() >= MAX_SYSEX_LEN {
            tracing::warn!(len = self.buf.len(), "unterminated sysex discarded");
            self.buf.clear();
        } else if byte >= 0x80 && lead < 0x80 {
            self.buf.clear();
            if byte != END_SYSEX {
                self.buf.push(byte);
            }
        }
        None
    }

    /// Feeds a chunk, collecting every completed frame in order.
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<Frame> {
        bytes.iter().filter_map(|b| self.push(*b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_byte_frame() {
        let mut framer = Framer::new();
        assert_eq!(framer.push(0x90), None);
        assert_eq!(framer.push(0x01), None);
        assert_eq!(framer.push(0x00), Some(Frame::MultiByte([0x90, 0x01, 0x00])));
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn sysex_frame_strips_delimiters() {
        let mut framer = Framer::new();
        let frames = framer.extend(&[0xF0, 0x71, 104, 0, 105, 0, 0xF7]);
        assert_eq!(frames, vec![Frame::Sysex(vec![0x71, 104, 0, 105, 0])]);
    }

    #[test]
    fn overlong_sysex_discarded() {
        let mut framer = Framer::new();
        framer.push(0xF0);
        for _ in 0..MAX_SYSEX_LEN * 2 {
            assert_eq!(framer.push(0x01), None);
            assert!(framer.pending() < MAX_SYSEX_LEN);
        }
        // The tail's terminator is dropped, then framing resumes.
        let frames = framer.extend(&[0xF7, 0xF0, 0x71, 0xF7]);
        assert_eq!(frames, vec![Frame::Sysex(vec![0x71])]);
    }

    #[test]
    fn leading_garbage_discarded() {
        let mut framer = Framer::new();
        let frames = framer.extend(&[0x01, 0x02, 0xF9, 0x02, 0x05]);
        assert_eq!(frames, vec![Frame::MultiByte([0xF9, 0x02, 0x05])]);
    }

    #[test]
    fn stray_end_sysex_not_kept() {
        let mut framer = Framer::new();
        framer.extend(&[0x05, 0xF7]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn split_sysex_across_chunks() {
        let mut framer = Framer::new();
        assert!(framer.extend(&[0xF0, 0x79, 2]).is_empty());
        assert!(framer.extend(&[4, 104]).is_empty());
        let frames = framer.extend(&[0, 0xF7, 0xE1]);
        assert_eq!(frames, vec![Frame::Sysex(vec![0x79, 2, 4, 104, 0])]);
        assert_eq!(framer.pending(), 1);
    }

    #[test]
    fn back_to_back_frames() {
        let mut framer = Framer::new();
        let frames = framer.extend(&[0xE0, 0x10, 0x01, 0x91, 0x03, 0x00]);
        assert_eq!(frames.len(), 2);
    }
}
