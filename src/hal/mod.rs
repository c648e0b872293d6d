//! Transport and clock implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: scripted transport and controllable clock for tests
//! - `clock`: wall clock for real boards
//! - `mqtt`: broker relay (requires `mqtt` feature)
//! - `websocket`: direct WebSocket (requires `websocket` feature)
//! - `serial`: local serial port (requires `serial` feature)
//! - `bluetooth`: RFCOMM serial (requires `bluetooth` feature)

pub mod clock;
pub mod mock;
pub mod outbox;

#[cfg(feature = "bluetooth")]
pub mod bluetooth;
#[cfg(feature = "mqtt")]
pub mod mqtt;
#[cfg(feature = "serial")]
pub mod serial;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use clock::SystemClock;
pub use mock::*;
pub use outbox::Outbox;

#[cfg(feature = "bluetooth")]
pub use bluetooth::BluetoothTransport;
#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;
