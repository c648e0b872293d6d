//! Runtime-selected transports.
//!
//! [`AnyTransport`] lets a board be built from a [`TransportConfig`] read
//! at runtime (a config file, command-line flags) without the caller
//! naming the concrete transport type. Each variant is only present when
//! its feature is enabled; the mock is always available.
//!
//! ```rust
//! use firmata_board::hal::MockTransport;
//! use firmata_board::traits::Transport;
//! use firmata_board::AnyTransport;
//!
//! let mut transport = AnyTransport::from(MockTransport::new());
//! assert_eq!(transport.name(), "mock");
//! assert!(!transport.is_open());
//! ```

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::hal::MockTransport;
use crate::traits::{Transport, TransportEvent};

#[cfg(feature = "bluetooth")]
use crate::hal::BluetoothTransport;
#[cfg(feature = "mqtt")]
use crate::hal::MqttTransport;
#[cfg(feature = "serial")]
use crate::hal::SerialTransport;
#[cfg(feature = "websocket")]
use crate::hal::WebSocketTransport;

/// Any transport known to the crate.
pub enum AnyTransport {
    /// Scripted transport.
    Mock(MockTransport),
    /// MQTT relay.
    #[cfg(feature = "mqtt")]
    Mqtt(MqttTransport),
    /// Direct WebSocket.
    #[cfg(feature = "websocket")]
    WebSocket(WebSocketTransport),
    /// Serial port.
    #[cfg(feature = "serial")]
    Serial(SerialTransport),
    /// Bluetooth SPP.
    #[cfg(feature = "bluetooth")]
    Bluetooth(BluetoothTransport),
}

impl AnyTransport {
    /// Opens the transport described by `config`.
    ///
    /// Fails with [`TransportError::Connect`] when the matching feature
    /// was not compiled in.
    pub fn connect(config: &TransportConfig) -> Result<Self, TransportError> {
        tracing::debug!(transport = config.name(), "opening transport");
        match config {
            #[cfg(feature = "mqtt")]
            TransportConfig::Mqtt(c) => MqttTransport::connect(c).map(Self::Mqtt),
            #[cfg(feature = "websocket")]
            TransportConfig::WebSocket(c) => WebSocketTransport::connect(c).map(Self::WebSocket),
            #[cfg(feature = "serial")]
            TransportConfig::Serial(c) => SerialTransport::open(c).map(Self::Serial),
            #[cfg(feature = "bluetooth")]
            TransportConfig::Bluetooth(c) => BluetoothTransport::connect(c).map(Self::Bluetooth),
            #[allow(unreachable_patterns)]
            other => Err(TransportError::Connect(format!(
                "{} transport not enabled in this build",
                other.name()
            ))),
        }
    }

    fn inner(&self) -> &dyn Transport {
        match self {
            Self::Mock(t) => t,
            #[cfg(feature = "mqtt")]
            Self::Mqtt(t) => t,
            #[cfg(feature = "websocket")]
            Self::WebSocket(t) => t,
            #[cfg(feature = "serial")]
            Self::Serial(t) => t,
            #[cfg(feature = "bluetooth")]
            Self::Bluetooth(t) => t,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Transport {
        match self {
            Self::Mock(t) => t,
            #[cfg(feature = "mqtt")]
            Self::Mqtt(t) => t,
            #[cfg(feature = "websocket")]
            Self::WebSocket(t) => t,
            #[cfg(feature = "serial")]
            Self::Serial(t) => t,
            #[cfg(feature = "bluetooth")]
            Self::Bluetooth(t) => t,
        }
    }
}

impl Transport for AnyTransport {
    fn send(&mut self, bytes: &[u8]) {
        self.inner_mut().send(bytes);
    }

    fn flush(&mut self) {
        self.inner_mut().flush();
    }

    fn close(&mut self) {
        self.inner_mut().close();
    }

    fn is_open(&self) -> bool {
        self.inner().is_open()
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.inner_mut().poll_event()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

impl core::fmt::Debug for AnyTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AnyTransport")
            .field("name", &self.name())
            .field("open", &self.is_open())
            .finish()
    }
}

impl From<MockTransport> for AnyTransport {
    fn from(t: MockTransport) -> Self {
        Self::Mock(t)
    }
}

#[cfg(feature = "mqtt")]
impl From<MqttTransport> for AnyTransport {
    fn from(t: MqttTransport) -> Self {
        Self::Mqtt(t)
    }
}

#[cfg(feature = "websocket")]
impl From<WebSocketTransport> for AnyTransport {
    fn from(t: WebSocketTransport) -> Self {
        Self::WebSocket(t)
    }
}

#[cfg(feature = "serial")]
impl From<SerialTransport> for AnyTransport {
    fn from(t: SerialTransport) -> Self {
        Self::Serial(t)
    }
}

#[cfg(feature = "bluetooth")]
impl From<BluetoothTransport> for AnyTransport {
    fn from(t: BluetoothTransport) -> Self {
        Self::Bluetooth(t)
    }
}
