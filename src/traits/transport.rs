//! Transport abstraction: a duplex byte channel to a board.
//!
//! Every physical medium (MQTT relay, WebSocket, serial port, Bluetooth
//! SPP) is normalized into the same contract:
//!
//! | Call | Effect |
//! |------|--------|
//! | `send(bytes)` | queue bytes; small sends coalesce until `flush` |
//! | `flush()` | write everything queued |
//! | `close()` | tear down; a `Close` event follows |
//! | `is_open()` | channel is writable |
//! | `poll_event()` | next `Open` / `Message` / `Error` / `Close` / `Reopen` |
//!
//! # Sync-First Design
//!
//! Like the rest of the crate the trait is synchronous and polled. Adapters
//! that need blocking I/O run it on a background thread and hand events
//! over a channel, so `poll_event` never blocks. Failures are reported as
//! [`TransportEvent::Error`]; `send` never fails synchronously.
//!
//! # Example
//!
//! ```rust
//! use firmata_board::hal::MockTransport;
//! use firmata_board::traits::{Transport, TransportEvent};
//!
//! let mut transport = MockTransport::new();
//! transport.open();
//! assert_eq!(transport.poll_event(), Some(TransportEvent::Open));
//!
//! transport.send(&[0xF9]);
//! transport.send(&[0xFF]);
//! transport.flush();
//! assert_eq!(transport.written, vec![vec![0xF9, 0xFF]]);
//! ```

use crate::error::TransportError;

/// Something that happened on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel became usable.
    Open,
    /// Inbound bytes; a whole frame or an arbitrary chunk depending on the
    /// medium.
    Message(Vec<u8>),
    /// The channel failed.
    Error(TransportError),
    /// The channel is gone for good.
    Close,
    /// The device came back under the same session without a new handshake.
    Reopen,
}

/// Duplex byte channel to a board.
pub trait Transport: Send {
    /// Queues outbound bytes. Dropped if the channel is not open.
    fn send(&mut self, bytes: &[u8]);

    /// Writes everything queued.
    fn flush(&mut self);

    /// Closes the channel; `Close` is reported through `poll_event`.
    fn close(&mut self);

    /// Whether the channel is currently writable.
    fn is_open(&self) -> bool;

    /// Next pending event, if any. Never blocks.
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) {
        (**self).send(bytes)
    }

    fn flush(&mut self) {
        (**self).flush()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        (**self).poll_event()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
