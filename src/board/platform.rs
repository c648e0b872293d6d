//! Ready-made board setups.
//!
//! | Platform | Transport | Handshake | Startup |
//! |----------|-----------|-----------|---------|
//! | [`WebArduino`] | MQTT relay | [`SimulatedHandshake`] | reset, then wait for every digital port |
//! | [`Arduino`] (serial) | serial port, 57600 baud | [`SerialBootHandshake`] | ready after the analog mapping |
//! | [`Arduino`] (bluetooth) | RFCOMM, uuid 1101 | [`StandardHandshake`] | ready after the analog mapping |
//!
//! ```rust
//! use firmata_board::board::{Area, WebArduino};
//! use firmata_board::config::TransportConfig;
//!
//! let config = WebArduino::config_in("10Q28gEP", Area::China);
//! let Some(TransportConfig::Mqtt(mqtt)) = &config.transport else { unreachable!() };
//! assert_eq!(mqtt.server.as_str(), "wss://ws.webduino.com.cn/");
//! assert!(config.initial_reset);
//! ```

use crate::config::{
    BluetoothTransportConfig, BoardConfig, MqttTransportConfig, SerialTransportConfig, TransportConfig,
};
use crate::error::BoardError;
use crate::traits::Transport;
use crate::transport_dyn::AnyTransport;

use super::handshake::{Handshake, SerialBootHandshake, SimulatedHandshake, StandardHandshake};
use super::Board;

// ============================================================================
// WebArduino
// ============================================================================

/// Broker region for [`WebArduino`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Area {
    /// The global relay.
    #[default]
    Global,
    /// The mainland China relay.
    China,
}

impl Area {
    /// Relay URL for this region.
    pub fn server(self) -> &'static str {
        match self {
            Area::Global => WebArduino::DEFAULT_SERVER,
            Area::China => WebArduino::SERVER_CHINA,
        }
    }
}

/// A Webduino board reached through the MQTT relay.
///
/// The relay hides the device's discovery responses, so the fixed
/// Webduino layout is injected locally ([`SimulatedHandshake`]).
#[derive(Debug, Clone, Copy)]
pub struct WebArduino;

impl WebArduino {
    /// Global relay.
    pub const DEFAULT_SERVER: &'static str = "wss://ws.webduino.io:443";

    /// China relay.
    pub const SERVER_CHINA: &'static str = "wss://ws.webduino.com.cn";

    /// Settings for `device` on the global relay.
    pub fn config(device: &str) -> BoardConfig {
        Self::config_in(device, Area::Global)
    }

    /// Settings for `device` on the relay for `area`.
    pub fn config_in(device: &str, area: Area) -> BoardConfig {
        Self::config_with_server(device, area.server())
    }

    /// Settings for `device` on a custom relay.
    pub fn config_with_server(device: &str, server: &str) -> BoardConfig {
        let mqtt = MqttTransportConfig::default()
            .with_server(&Self::parse_server(server))
            .with_device(device)
            .with_auth("admin", "password");
        BoardConfig::default()
            .with_transport(TransportConfig::Mqtt(mqtt))
            .with_initial_reset(true)
            .with_handle_digital_pins(true)
    }

    /// Reduces a relay address to `scheme://host[:port]/`, assuming
    /// `ws://` when no scheme is given.
    pub fn parse_server(url: &str) -> String {
        let url = if url.contains("://") {
            url.to_string()
        } else {
            format!("ws://{url}")
        };
        let (scheme, rest) = url.split_once("://").unwrap_or(("ws", url.as_str()));
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        format!("{scheme}://{authority}/")
    }

    /// The discovery strategy for relay boards.
    pub fn handshake() -> SimulatedHandshake {
        SimulatedHandshake
    }

    /// Connects to the relay described by `config`.
    pub fn connect(config: BoardConfig) -> Result<Board<AnyTransport>, BoardError> {
        Board::connect(config, Self::handshake())
    }

    /// Builds a relay board over an already opened transport.
    pub fn with_transport<T: Transport>(transport: T, device: &str) -> Result<Board<T>, BoardError> {
        Ok(Board::new(transport, Self::config(device))?.with_handshake(Self::handshake()))
    }
}

// ============================================================================
// Arduino
// ============================================================================

/// A StandardFirmata board on a local serial or Bluetooth link.
#[derive(Debug, Clone, Copy)]
pub struct Arduino;

impl Arduino {
    /// Settings for a USB serial port at 57600 baud.
    pub fn serial_config(path: &str) -> BoardConfig {
        let serial = SerialTransportConfig::default().with_path(path);
        BoardConfig::default().with_transport(TransportConfig::Serial(serial))
    }

    /// Settings for a Bluetooth SPP link (uuid 1101).
    pub fn bluetooth_config(address: &str) -> BoardConfig {
        let bluetooth = BluetoothTransportConfig::default().with_address(address);
        BoardConfig::default().with_transport(TransportConfig::Bluetooth(bluetooth))
    }

    /// Serial boards announce their firmware on reset; other links are
    /// asked for it.
    pub fn handshake_for(config: &BoardConfig) -> Box<dyn Handshake> {
        match &config.transport {
            Some(transport) if transport.is_serial() => Box::new(SerialBootHandshake),
            _ => Box::new(StandardHandshake),
        }
    }

    /// Opens the link described by `config`.
    pub fn connect(config: BoardConfig) -> Result<Board<AnyTransport>, BoardError> {
        let handshake = Self::handshake_for(&config);
        Board::connect(config, handshake)
    }

    /// Builds a board over an already opened transport.
    pub fn with_transport<T: Transport>(transport: T, config: BoardConfig) -> Result<Board<T>, BoardError> {
        let handshake = Self::handshake_for(&config);
        Ok(Board::new(transport, config)?.with_handshake(handshake))
    }
}
