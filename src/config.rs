//! Board and transport configuration.
//!
//! Configuration is an immutable value built up front with `with_*`
//! methods and validated once when the board is constructed. Strings use
//! `heapless::String` so configs stay fixed-size and cheap to clone.
//!
//! # Example
//!
//! ```rust
//! use firmata_board::config::{BoardConfig, SerialTransportConfig, TransportConfig};
//!
//! let config = BoardConfig::default()
//!     .with_transport(TransportConfig::Serial(
//!         SerialTransportConfig::default().with_path("/dev/ttyUSB0"),
//!     ))
//!     .with_handle_digital_pins(true)
//!     .with_sending_interval_ms(50);
//!
//! assert!(config.validate().is_ok());
//! ```

use heapless::String as HString;

use crate::error::ConfigError;
use crate::protocol::{MAX_SAMPLING_INTERVAL, MIN_SAMPLING_INTERVAL};

/// Maximum length for short config strings (device ids, credentials)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (URLs, device paths)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

fn truncated<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    let valid_end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= N)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    truncated(s)
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    truncated(s)
}

// ============================================================================
// Board Config
// ============================================================================

/// Complete board configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BoardConfig {
    /// Which transport to open and how; unused when a transport is
    /// handed to the board directly.
    pub transport: Option<TransportConfig>,
    /// Reopen the transport after an unexpected close.
    pub auto_reconnect: bool,
    /// Send a system reset once the analog mapping arrives.
    pub initial_reset: bool,
    /// Enable digital port reporting before declaring the board ready.
    pub handle_digital_pins: bool,
    /// Sampling interval to send once ready (`None` keeps the firmware default).
    pub sampling_interval_ms: Option<u32>,
    /// Window for suppressing identical outbound frames (0 disables).
    pub sending_interval_ms: u64,
    /// Delay between reconnect attempts.
    pub reconnect_interval_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            transport: None,
            auto_reconnect: false,
            initial_reset: false,
            handle_digital_pins: false,
            sampling_interval_ms: None,
            sending_interval_ms: 0,
            reconnect_interval_ms: 1000,
        }
    }
}

impl BoardConfig {
    /// Set the transport
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Enable or disable automatic reconnection
    pub fn with_auto_reconnect(mut self, on: bool) -> Self {
        self.auto_reconnect = on;
        self
    }

    /// Enable or disable the reset after discovery
    pub fn with_initial_reset(mut self, on: bool) -> Self {
        self.initial_reset = on;
        self
    }

    /// Enable or disable digital port reporting during startup
    pub fn with_handle_digital_pins(mut self, on: bool) -> Self {
        self.handle_digital_pins = on;
        self
    }

    /// Set the sampling interval sent once ready
    pub fn with_sampling_interval_ms(mut self, ms: u32) -> Self {
        self.sampling_interval_ms = Some(ms);
        self
    }

    /// Set the duplicate-send window
    pub fn with_sending_interval_ms(mut self, ms: u64) -> Self {
        self.sending_interval_ms = ms;
        self
    }

    /// Set the reconnect back-off
    pub fn with_reconnect_interval_ms(mut self, ms: u64) -> Self {
        self.reconnect_interval_ms = ms;
        self
    }

    /// Check every field once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ms) = self.sampling_interval_ms {
            check_sampling_interval(ms)?;
        }
        match &self.transport {
            Some(transport) => transport.validate(),
            None => Ok(()),
        }
    }
}

/// Check a sampling interval against the firmware's accepted range.
pub fn check_sampling_interval(ms: u32) -> Result<(), ConfigError> {
    if (MIN_SAMPLING_INTERVAL..=MAX_SAMPLING_INTERVAL).contains(&ms) {
        Ok(())
    } else {
        Err(ConfigError::SamplingInterval {
            value: ms,
            min: MIN_SAMPLING_INTERVAL,
            max: MAX_SAMPLING_INTERVAL,
        })
    }
}

// ============================================================================
// Transport Config
// ============================================================================

/// Transport selection.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum TransportConfig {
    /// MQTT broker relaying to a networked board.
    Mqtt(MqttTransportConfig),
    /// Direct WebSocket to a board.
    WebSocket(WebSocketTransportConfig),
    /// Local serial port.
    Serial(SerialTransportConfig),
    /// Bluetooth SPP via an RFCOMM device.
    Bluetooth(BluetoothTransportConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Mqtt(MqttTransportConfig::default())
    }
}

impl TransportConfig {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mqtt(_) => "mqtt",
            Self::WebSocket(_) => "websocket",
            Self::Serial(_) => "serial",
            Self::Bluetooth(_) => "bluetooth",
        }
    }

    /// Whether this is a serial link.
    pub fn is_serial(&self) -> bool {
        matches!(self, Self::Serial(_))
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = |transport: &'static str, field: &'static str| -> Result<(), ConfigError> {
            Err(ConfigError::MissingField { transport, field })
        };
        match self {
            Self::Mqtt(c) if c.device.is_empty() => missing("mqtt", "device"),
            Self::Mqtt(c) if c.server.is_empty() => missing("mqtt", "server"),
            Self::WebSocket(c) if c.url.is_empty() => missing("websocket", "url"),
            Self::Serial(c) if c.path.is_empty() => missing("serial", "path"),
            Self::Serial(c) if c.baud_rate == 0 => Err(ConfigError::BaudRate),
            Self::Bluetooth(c) if c.address.is_empty() => missing("bluetooth", "address"),
            Self::Bluetooth(c) if c.baud_rate == 0 => Err(ConfigError::BaudRate),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT relay configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MqttTransportConfig {
    /// Broker URL (`mqtt://`, `ws://` or `wss://`).
    pub server: LongString,
    /// Device id; also the topic prefix.
    pub device: ShortString,
    /// Broker username.
    pub login: ShortString,
    /// Broker password.
    pub password: ShortString,
    /// Append a random suffix to the client id so several clients can
    /// watch the same device.
    pub multi: bool,
    /// Let the client reconnect to the broker on its own.
    pub reconnect: bool,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Delay between broker reconnect attempts in milliseconds.
    pub reconnect_period_ms: u64,
    /// Largest publish payload, including topic overhead.
    pub max_packet_size: usize,
}

impl Default for MqttTransportConfig {
    fn default() -> Self {
        Self {
            server: long_string("wss://ws.webduino.io:443/"),
            device: ShortString::new(),
            login: short_string("admin"),
            password: short_string("password"),
            multi: false,
            reconnect: false,
            keep_alive_secs: 15,
            reconnect_period_ms: 1000,
            max_packet_size: 128,
        }
    }
}

impl MqttTransportConfig {
    /// Set the broker URL
    pub fn with_server(mut self, server: &str) -> Self {
        self.server = long_string(server);
        self
    }

    /// Set the device id
    pub fn with_device(mut self, device: &str) -> Self {
        self.device = short_string(device);
        self
    }

    /// Set broker credentials
    pub fn with_auth(mut self, login: &str, password: &str) -> Self {
        self.login = short_string(login);
        self.password = short_string(password);
        self
    }

    /// Allow several clients per device
    pub fn with_multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    /// Let the client reconnect to the broker on its own
    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Build a topic under the device prefix
    pub fn topic(&self, suffix: &str) -> LongString {
        let mut topic = LongString::new();
        let _ = topic.push_str(self.device.as_str());
        let _ = topic.push('/');
        let _ = topic.push_str(suffix);
        topic
    }

    /// Bytes a publish spends on the topic, counted against the packet size
    pub fn topic_overhead(&self) -> usize {
        self.device.len() + "/PING".len() + 4
    }
}

// ============================================================================
// WebSocket Config
// ============================================================================

/// Direct WebSocket configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WebSocketTransportConfig {
    /// Endpoint; `ws://` is assumed when no scheme is given.
    pub url: LongString,
    /// Largest frame sent in one write.
    pub max_packet_size: usize,
}

impl Default for WebSocketTransportConfig {
    fn default() -> Self {
        Self {
            url: LongString::new(),
            max_packet_size: 64,
        }
    }
}

impl WebSocketTransportConfig {
    /// Set the endpoint URL
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = long_string(url);
        self
    }

    /// Endpoint URL with a scheme.
    pub fn resolved_url(&self) -> String {
        if self.url.contains("://") {
            self.url.to_string()
        } else {
            format!("ws://{}", self.url)
        }
    }
}

// ============================================================================
// Serial Config
// ============================================================================

/// Serial port configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SerialTransportConfig {
    /// Device path (`/dev/ttyACM0`, `COM3`).
    pub path: LongString,
    /// Baud rate.
    pub baud_rate: u32,
}

impl Default for SerialTransportConfig {
    fn default() -> Self {
        Self {
            path: LongString::new(),
            baud_rate: 57600,
        }
    }
}

impl SerialTransportConfig {
    /// Set the device path
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = long_string(path);
        self
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }
}

// ============================================================================
// Bluetooth Config
// ============================================================================

/// Bluetooth serial (SPP) configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BluetoothTransportConfig {
    /// RFCOMM device bound to the remote address (`/dev/rfcomm0`).
    pub address: LongString,
    /// Service class uuid.
    pub uuid: ShortString,
    /// Baud rate presented by the RFCOMM device.
    pub baud_rate: u32,
    /// Connect attempts before giving up.
    pub max_retries: u32,
    /// Pause between connect attempts.
    pub retry_delay_ms: u64,
}

impl Default for BluetoothTransportConfig {
    fn default() -> Self {
        Self {
            address: LongString::new(),
            uuid: short_string("1101"),
            baud_rate: 57600,
            max_retries: 10,
            retry_delay_ms: 500,
        }
    }
}

impl BluetoothTransportConfig {
    /// Set the RFCOMM device
    pub fn with_address(mut self, address: &str) -> Self {
        self.address = long_string(address);
        self
    }

    /// Set the service uuid
    pub fn with_uuid(mut self, uuid: &str) -> Self {
        self.uuid = short_string(uuid);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_string_truncates_on_char_boundary() {
        let long = "é".repeat(40);
        let s = short_string(&long);
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c == 'é'));
    }

    #[test]
    fn defaults_match_firmware_expectations() {
        let serial = SerialTransportConfig::default();
        assert_eq!(serial.baud_rate, 57600);
        let bt = BluetoothTransportConfig::default();
        assert_eq!(bt.uuid.as_str(), "1101");
        assert_eq!(bt.max_retries, 10);
        let mqtt = MqttTransportConfig::default();
        assert_eq!(mqtt.keep_alive_secs, 15);
        assert_eq!(mqtt.max_packet_size, 128);
    }

    #[test]
    fn mqtt_topics() {
        let mqtt = MqttTransportConfig::default().with_device("abc123");
        assert_eq!(mqtt.topic("PING").as_str(), "abc123/PING");
        assert_eq!(mqtt.topic_overhead(), 6 + 5 + 4);
    }

    #[test]
    fn websocket_scheme_added() {
        let ws = WebSocketTransportConfig::default().with_url("10.0.0.5:8080");
        assert_eq!(ws.resolved_url(), "ws://10.0.0.5:8080");
        let wss = WebSocketTransportConfig::default().with_url("wss://host/");
        assert_eq!(wss.resolved_url(), "wss://host/");
    }

    #[test]
    fn validation() {
        assert!(BoardConfig::default().validate().is_ok());

        let missing_device = BoardConfig::default()
            .with_transport(TransportConfig::Mqtt(MqttTransportConfig::default()));
        assert_eq!(
            missing_device.validate(),
            Err(ConfigError::MissingField {
                transport: "mqtt",
                field: "device"
            })
        );

        let serial = BoardConfig::default().with_transport(TransportConfig::Serial(
            SerialTransportConfig::default().with_path("/dev/ttyACM0"),
        ));
        assert!(serial.validate().is_ok());
        assert!(serial
            .clone()
            .with_sampling_interval_ms(10)
            .validate()
            .is_err());
        assert!(serial.with_sampling_interval_ms(20).validate().is_ok());
    }

    #[test]
    fn sampling_interval_bounds() {
        assert!(check_sampling_interval(19).is_err());
        assert!(check_sampling_interval(20).is_ok());
        assert!(check_sampling_interval(15000).is_ok());
        assert!(check_sampling_interval(15001).is_err());
    }
}
