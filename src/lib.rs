//! # firmata-board
//!
//! Host-side engine for microcontroller boards speaking the Firmata
//! protocol, reached over an MQTT relay, a direct WebSocket, a serial
//! port, or Bluetooth SPP.
//!
//! ## Features
//!
//! - **Discovery handshake**: firmware report, capability table, analog
//!   mapping and digital port reports, then `Ready`
//! - **Pin model**: modes, capabilities, value history, edge events,
//!   filters and generators
//! - **Typed events**: ordered listeners, once-listeners and channel
//!   subscriptions for board and pin events
//! - **Pluggable transports**: one duplex byte-channel trait, a tagged
//!   runtime selection and a scripted mock
//! - **Reconnect**: error-forced disconnects reopen the transport on a
//!   fixed interval when configured
//!
//! ## Architecture
//!
//! - `protocol` - Firmata constants and frame builders
//! - `framer` - inbound byte stream to complete frames
//! - `board` - the board state machine, handshakes and platform setups
//! - `pin` - pins, filters and generators
//! - `events` - event types and the emitter
//! - `traits` - transport and clock abstractions
//! - `hal` - transport implementations (mock always, others by feature)
//!
//! ## Example
//!
//! ```rust
//! use firmata_board::{
//!     board::WebArduino,
//!     hal::MockTransport,
//!     BoardEvent, BoardState,
//! };
//!
//! let mut transport = MockTransport::new();
//! transport.open();
//!
//! // Relay boards answer discovery locally.
//! let mut board = WebArduino::with_transport(transport, "demo").unwrap();
//! let events = board.subscribe();
//! board.poll();
//! assert_eq!(board.state(), BoardState::AwaitingDigitalReports);
//!
//! // The device reports each of its three digital ports.
//! if let Some(t) = board.transport_mut() {
//!     t.queue_message(vec![0x90, 0, 0, 0x91, 0, 0, 0x92, 0, 0]);
//! }
//! board.poll();
//! assert!(board.is_ready());
//! assert_eq!(board.pin_count(), 22);
//! assert!(events.try_iter().any(|e| e == BoardEvent::Ready));
//! ```

#![warn(missing_docs)]

/// Board state machine, discovery handshakes and platform setups.
pub mod board;
/// Board and transport configuration.
pub mod config;
/// Suppression of identical outbound frames.
pub mod dedup;
/// Error types.
pub mod error;
/// Event types and the listener registry.
pub mod events;
/// Inbound frame assembly.
pub mod framer;
/// Transport implementations and test doubles.
pub mod hal;
/// Pins, filters and generators.
pub mod pin;
/// Firmata wire constants and frame builders.
pub mod protocol;
/// Transport and clock abstractions.
pub mod traits;
/// Runtime-selected transports.
pub mod transport_dyn;

// Re-exports for convenience
pub use board::{
    Arduino, Area, Board, BoardState, Exchange, Handshake, PinRead, PinStateFuture, SerialBootHandshake,
    SimulatedHandshake, StandardHandshake, WebArduino,
};
pub use config::{
    BluetoothTransportConfig, BoardConfig, MqttTransportConfig, SerialTransportConfig, TransportConfig,
    WebSocketTransportConfig,
};
pub use dedup::SendWindow;
pub use error::{BoardError, ConfigError, TransportError};
pub use events::{
    BoardEvent, BoardEventKind, EventEmitter, FirmwareVersion, ListenerId, PinEvent, PinEventKind, PinStateReport,
};
pub use framer::{Frame, Framer};
pub use pin::{Pin, PinMode, ValueChange, HIGH, LOW};
pub use traits::{Clock, Transport, TransportEvent};
pub use transport_dyn::AnyTransport;
