//! Mock implementations for testing without hardware.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockTransport`] | [`Transport`] | Records sends and writes, replays queued events |
//! | [`MockClock`] | [`Clock`] | Controllable, shareable time source |
//!
//! # Example
//!
//! ```rust
//! use firmata_board::{Board, BoardConfig};
//! use firmata_board::hal::{MockClock, MockTransport};
//!
//! let mut transport = MockTransport::new();
//! transport.open();
//!
//! let clock = MockClock::new();
//! let mut board = Board::with_clock(transport, BoardConfig::default(), clock.clone()).unwrap();
//! board.poll();
//!
//! // The board asked for the firmware name as soon as the channel opened.
//! let transport = board.transport().unwrap();
//! assert_eq!(transport.sent[0], vec![0xF0, 0x79, 0xF7]);
//! ```
//!
//! [`Transport`]: crate::traits::Transport
//! [`Clock`]: crate::traits::Clock

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::TransportError;
use crate::traits::{Clock, Transport, TransportEvent};

use super::outbox::Outbox;

// ============================================================================
// Transport Mock
// ============================================================================

/// Mock transport for testing.
///
/// Use the public fields to inspect what the board sent and to script
/// what it receives.
///
/// # Example
///
/// ```rust
/// use firmata_board::hal::MockTransport;
/// use firmata_board::traits::{Transport, TransportEvent};
///
/// let mut transport = MockTransport::new();
/// transport.send(&[0xFF]);          // dropped: not open yet
/// assert!(transport.sent.is_empty());
///
/// transport.open();
/// transport.queue_message(vec![0xF9, 2, 5]);
/// assert_eq!(transport.poll_event(), Some(TransportEvent::Open));
/// assert_eq!(transport.poll_event(), Some(TransportEvent::Message(vec![0xF9, 2, 5])));
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Every accepted `send` call, in order.
    pub sent: Vec<Vec<u8>>,
    /// Packets written to the "wire" after coalescing.
    pub written: Vec<Vec<u8>>,
    /// Events returned by `poll_event`.
    pub events: VecDeque<TransportEvent>,
    /// Whether the channel is writable.
    pub connected: bool,
    /// Number of `close` calls.
    pub close_count: usize,
    outbox: Outbox,
}

impl MockTransport {
    /// Creates a closed mock with no packet limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits coalesced packets to `max` bytes.
    pub fn with_max_packet_size(mut self, max: usize) -> Self {
        self.outbox = Outbox::bounded(max, 0);
        self
    }

    /// Marks the channel open and queues an `Open` event.
    pub fn open(&mut self) {
        self.connected = true;
        self.events.push_back(TransportEvent::Open);
    }

    /// Queues inbound bytes.
    pub fn queue_message(&mut self, bytes: impl Into<Vec<u8>>) {
        self.events.push_back(TransportEvent::Message(bytes.into()));
    }

    /// Queues an error event.
    pub fn queue_error(&mut self, err: TransportError) {
        self.events.push_back(TransportEvent::Error(err));
    }

    /// Simulates the remote side going away.
    pub fn drop_connection(&mut self) {
        self.connected = false;
        self.events.push_back(TransportEvent::Close);
    }

    /// Simulates the device coming back under the same session.
    pub fn queue_reopen(&mut self) {
        self.events.push_back(TransportEvent::Reopen);
    }

    /// Every written byte, concatenated.
    pub fn wire_bytes(&self) -> Vec<u8> {
        self.written.concat()
    }

    /// Accepted sends whose first byte is `command`.
    pub fn sent_with(&self, command: u8) -> Vec<&Vec<u8>> {
        self.sent.iter().filter(|s| s.first() == Some(&command)).collect()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, bytes: &[u8]) {
        if !self.connected {
            return;
        }
        self.sent.push(bytes.to_vec());
        if let Some(packet) = self.outbox.push(bytes) {
            self.written.push(packet);
        }
    }

    fn flush(&mut self) {
        if let Some(packet) = self.outbox.take() {
            self.written.push(packet);
        }
    }

    fn close(&mut self) {
        self.close_count += 1;
        if self.connected {
            self.flush();
            self.connected = false;
            self.events.push_back(TransportEvent::Close);
        }
    }

    fn is_open(&self) -> bool {
        self.connected
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ============================================================================
// Clock Mock
// ============================================================================

/// Controllable clock for testing time-dependent behavior.
///
/// Clones share the same time, so a test can keep one handle while the
/// board owns another.
///
/// # Example
///
/// ```rust
/// use firmata_board::hal::MockClock;
/// use firmata_board::traits::Clock;
///
/// let clock = MockClock::new();
/// let shared = clock.clone();
///
/// clock.set(1000);
/// assert_eq!(shared.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(shared.now_ms(), 1500);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    current_ms: Arc<AtomicU64>,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time.
    pub fn set(&self, ms: u64) {
        self.current_ms.store(ms, Ordering::SeqCst);
    }

    /// Advances time by `ms` milliseconds.
    pub fn advance(&self, ms: u64) {
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}
