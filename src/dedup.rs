//! Suppression of repeated outbound frames.
//!
//! Some transports (notably the MQTT relay) are slow enough that a UI
//! driving a pin can queue the same command many times per second. With
//! a non-zero window, a frame whose bytes match one sent less than
//! `window_ms` ago is dropped instead of being sent again.
//!
//! ```rust
//! use firmata_board::dedup::SendWindow;
//!
//! let mut window = SendWindow::new(100);
//!
//! assert!(window.should_send(&[0x91, 0x01, 0x00], 0));
//! assert!(!window.should_send(&[0x91, 0x01, 0x00], 50));   // repeat, dropped
//! assert!(window.should_send(&[0x91, 0x00, 0x00], 60));    // different bytes
//! assert!(window.should_send(&[0x91, 0x01, 0x00], 150));   // window passed
//! ```
//!
//! A window of 0 disables suppression entirely.

use std::collections::VecDeque;

/// Recently sent frames with their send times.
#[derive(Debug, Clone, Default)]
pub struct SendWindow {
    window_ms: u64,
    recent: VecDeque<(Vec<u8>, u64)>,
}

impl SendWindow {
    /// Create a window of `window_ms` milliseconds
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            recent: VecDeque::new(),
        }
    }

    /// Current window length.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Change the window; history is kept.
    pub fn set_window_ms(&mut self, window_ms: u64) {
        self.window_ms = window_ms;
        if window_ms == 0 {
            self.recent.clear();
        }
    }

    /// Check whether `bytes` should go out at `now_ms`, recording it if so.
    #[must_use]
    pub fn should_send(&mut self, bytes: &[u8], now_ms: u64) -> bool {
        if self.window_ms == 0 {
            return true;
        }
        self.expire(now_ms);
        if self.recent.iter().any(|(sent, _)| sent.as_slice() == bytes) {
            return false;
        }
        self.recent.push_back((bytes.to_vec(), now_ms));
        true
    }

    /// Number of frames still inside the window.
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    /// Whether no frame is being remembered.
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Forget every recorded frame.
    pub fn clear(&mut self) {
        self.recent.clear();
    }

    fn expire(&mut self, now_ms: u64) {
        let window = self.window_ms;
        // Entries are pushed in time order, so expired ones sit at the front.
        while let Some((_, sent_at)) = self.recent.front() {
            if now_ms.saturating_sub(*sent_at) >= window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_window_never_suppresses() {
        let mut w = SendWindow::new(0);
        assert!(w.should_send(&[1], 0));
        assert!(w.should_send(&[1], 0));
        assert!(w.is_empty());
    }

    #[test]
    fn repeat_inside_window_is_dropped() {
        let mut w = SendWindow::new(100);
        assert!(w.should_send(&[0xF0, 0x79, 0xF7], 1000));
        assert!(!w.should_send(&[0xF0, 0x79, 0xF7], 1099));
        assert!(w.should_send(&[0xF0, 0x79, 0xF7], 1100));
    }

    #[test]
    fn expired_entries_are_pruned() {
        let mut w = SendWindow::new(100);
        assert!(w.should_send(&[1], 0));
        assert!(w.should_send(&[2], 10));
        assert!(w.should_send(&[3], 20));
        assert_eq!(w.len(), 3);

        assert!(w.should_send(&[4], 115));
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn disabling_clears_history() {
        let mut w = SendWindow::new(100);
        assert!(w.should_send(&[1], 0));
        w.set_window_ms(0);
        assert!(w.is_empty());
        w.set_window_ms(100);
        assert!(w.should_send(&[1], 1));
    }

    #[test]
    fn clock_going_backwards_keeps_entries() {
        let mut w = SendWindow::new(100);
        assert!(w.should_send(&[1], 500));
        assert!(!w.should_send(&[1], 400));
    }
}
