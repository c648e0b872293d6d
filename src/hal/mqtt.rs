//! MQTT relay transport.
//!
//! Networked boards do not accept connections directly; they sit behind
//! an MQTT broker and exchange Firmata bytes on three topics:
//!
//! | Topic | Direction | Content |
//! |-------|-----------|---------|
//! | `<device>/PING` | out | Firmata bytes to the board (qos 0) |
//! | `<device>/PONG` | in | Firmata bytes from the board |
//! | `<device>/STATUS` | in | `OK` while the board is online |
//!
//! The broker session and the board's presence are separate: the session
//! can be up while the board is offline. `STATUS` drives the transport
//! events:
//!
//! | Previous | Received | Event |
//! |----------|----------|-------|
//! | not `OK` | `OK` | `Open` |
//! | `OK` | `OK` | `Reopen` |
//! | any | other | `Error("board connection failed.")` |
//!
//! `PONG` payloads are forwarded only while the status is `OK`.
//!
//! The client runs on a background thread (rumqttc's blocking
//! [`Client`]/[`Connection`] pair) and hands events to
//! [`poll_event`](Transport::poll_event) over a channel.
//!
//! # Example
//!
//! ```ignore
//! use firmata_board::config::MqttTransportConfig;
//! use firmata_board::hal::MqttTransport;
//!
//! let config = MqttTransportConfig::default().with_device("10Q28gq5");
//! let transport = MqttTransport::connect(&config)?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};

use crate::config::MqttTransportConfig;
use crate::error::TransportError;
use crate::traits::{Transport, TransportEvent};

use super::outbox::Outbox;

/// Topic suffix for outbound bytes.
pub const TOPIC_PING: &str = "PING";
/// Topic suffix for inbound bytes.
pub const TOPIC_PONG: &str = "PONG";
/// Topic suffix for board presence.
pub const TOPIC_STATUS: &str = "STATUS";
/// Presence payload meaning the board is online.
pub const STATUS_OK: &str = "OK";

// ============================================================================
// Broker address
// ============================================================================

/// Wire protocol to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerScheme {
    /// Plain TCP.
    Tcp,
    /// TCP with TLS.
    Tls,
    /// WebSocket.
    Ws,
    /// WebSocket with TLS.
    Wss,
}

/// Parsed broker URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    /// Protocol.
    pub scheme: BrokerScheme,
    /// Host name.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Normalized URL: `scheme://host:port/`.
    pub url: String,
}

impl BrokerAddress {
    /// Parses `scheme://host[:port][/path]`; a missing scheme means `ws`.
    pub fn parse(server: &str) -> Result<Self, TransportError> {
        let (scheme_str, rest) = server.split_once("://").unwrap_or(("ws", server));
        let (scheme, default_port) = match scheme_str {
            "mqtt" | "tcp" => (BrokerScheme::Tcp, 1883),
            "mqtts" | "ssl" => (BrokerScheme::Tls, 8883),
            "ws" => (BrokerScheme::Ws, 80),
            "wss" => (BrokerScheme::Wss, 443),
            other => {
                return Err(TransportError::Connect(format!(
                    "unsupported broker scheme `{other}`"
                )))
            }
        };
        let authority = rest.split('/').next().unwrap_or_default();
        if authority.is_empty() {
            return Err(TransportError::Connect(format!("no host in `{server}`")));
        }
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| TransportError::Connect(format!("bad port in `{server}`")))?;
                (host, port)
            }
            None => (authority, default_port),
        };
        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            url: format!("{scheme_str}://{host}:{port}/"),
        })
    }

    fn options(&self, client_id: &str) -> MqttOptions {
        match self.scheme {
            BrokerScheme::Tcp => MqttOptions::new(client_id, self.host.as_str(), self.port),
            BrokerScheme::Tls => {
                let mut options = MqttOptions::new(client_id, self.host.as_str(), self.port);
                options.set_transport(rumqttc::Transport::tls_with_default_config());
                options
            }
            BrokerScheme::Ws => {
                let mut options = MqttOptions::new(client_id, self.url.as_str(), self.port);
                options.set_transport(rumqttc::Transport::Ws);
                options
            }
            BrokerScheme::Wss => {
                let mut options = MqttOptions::new(client_id, self.url.as_str(), self.port);
                options.set_transport(rumqttc::Transport::wss_with_default_config());
                options
            }
        }
    }
}

/// Client id for a device: `_<device>`, plus a random suffix when several
/// clients may watch the same board.
pub fn client_id(config: &MqttTransportConfig) -> String {
    if config.multi {
        format!("_{}.{:08x}", config.device, rand::random::<u32>())
    } else {
        format!("_{}", config.device)
    }
}

// ============================================================================
// Board presence
// ============================================================================

/// Tracks the board's `STATUS` topic.
#[derive(Debug, Default, Clone)]
pub struct DeviceStatus {
    status: Option<String>,
}

impl DeviceStatus {
    /// Records a status payload and returns the event it implies.
    ///
    /// A repeated non-OK status is only reported the first time.
    pub fn update(&mut self, payload: &str) -> Option<TransportEvent> {
        let previous = self.status.replace(payload.to_string());
        match (previous.as_deref(), payload) {
            (Some(STATUS_OK), STATUS_OK) => Some(TransportEvent::Reopen),
            (_, STATUS_OK) => Some(TransportEvent::Open),
            (Some(old), new) if old == new => None,
            _ => Some(TransportEvent::Error(TransportError::BoardOffline)),
        }
    }

    /// Whether data from the board should be passed on.
    pub fn is_online(&self) -> bool {
        self.status.as_deref() == Some(STATUS_OK)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// MQTT relay transport.
pub struct MqttTransport {
    client: Client,
    events: Receiver<TransportEvent>,
    events_tx: Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    ping_topic: String,
    outbox: Outbox,
}

impl MqttTransport {
    /// Starts connecting to the broker.
    ///
    /// Returns as soon as the client thread is running; `Open` arrives
    /// once the board reports `OK`.
    pub fn connect(config: &MqttTransportConfig) -> Result<Self, TransportError> {
        let broker = BrokerAddress::parse(&config.server)?;
        let client_id = client_id(config);

        let mut options = broker.options(&client_id);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs as u64));
        if !config.login.is_empty() {
            options.set_credentials(config.login.as_str(), config.password.as_str());
        }

        let (client, connection) = Client::new(options, 16);
        let (events_tx, events) = channel();
        let connected = Arc::new(AtomicBool::new(false));
        let closing = Arc::new(AtomicBool::new(false));

        let worker = ConnectionWorker {
            client: client.clone(),
            events: events_tx.clone(),
            connected: Arc::clone(&connected),
            closing: Arc::clone(&closing),
            status_topic: config.topic(TOPIC_STATUS).to_string(),
            pong_topic: config.topic(TOPIC_PONG).to_string(),
            reconnect: config.reconnect,
            reconnect_period: Duration::from_millis(config.reconnect_period_ms),
            status: DeviceStatus::default(),
        };
        thread::Builder::new()
            .name(format!("mqtt-{}", config.device))
            .spawn(move || worker.run(connection))
            .map_err(TransportError::connect)?;

        tracing::info!(broker = %broker.url, client_id = %client_id, "connecting to MQTT broker");

        Ok(Self {
            client,
            events,
            events_tx,
            connected,
            closing,
            ping_topic: config.topic(TOPIC_PING).to_string(),
            outbox: Outbox::bounded(config.max_packet_size, config.topic_overhead()),
        })
    }

    fn publish(&mut self, payload: Vec<u8>) {
        if !self.is_open() {
            return;
        }
        if let Err(e) = self
            .client
            .try_publish(self.ping_topic.as_str(), QoS::AtMostOnce, false, payload)
        {
            let _ = self.events_tx.send(TransportEvent::Error(TransportError::io(e)));
        }
    }
}

impl Transport for MqttTransport {
    fn send(&mut self, bytes: &[u8]) {
        if let Some(packet) = self.outbox.push(bytes) {
            self.publish(packet);
        }
    }

    fn flush(&mut self) {
        if let Some(packet) = self.outbox.take() {
            self.publish(packet);
        }
    }

    fn close(&mut self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.flush();
        self.connected.store(false, Ordering::SeqCst);
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!(error = %e, "MQTT disconnect request failed");
        }
        let _ = self.events_tx.send(TransportEvent::Close);
    }

    fn is_open(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        let _ = self.client.try_disconnect();
    }
}

// ============================================================================
// Background connection
// ============================================================================

struct ConnectionWorker {
    client: Client,
    events: Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    status_topic: String,
    pong_topic: String,
    reconnect: bool,
    reconnect_period: Duration,
    status: DeviceStatus,
}

impl ConnectionWorker {
    fn run(mut self, mut connection: Connection) {
        for notification in connection.iter() {
            if self.closing.load(Ordering::SeqCst) {
                break;
            }
            match notification {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::debug!("MQTT session established");
                    self.connected.store(true, Ordering::SeqCst);
                    self.subscribe();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.on_publish(&publish.topic, &publish.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    if self.closing.load(Ordering::SeqCst) {
                        break;
                    }
                    if !self.reconnect {
                        self.emit(TransportEvent::Error(TransportError::connect(e)));
                        self.emit(TransportEvent::Close);
                        break;
                    }
                    tracing::warn!(error = %e, "MQTT connection lost, retrying");
                    thread::sleep(self.reconnect_period);
                }
            }
        }
        tracing::debug!("MQTT connection thread finished");
    }

    fn subscribe(&mut self) {
        for topic in [self.status_topic.clone(), self.pong_topic.clone()] {
            if let Err(e) = self.client.try_subscribe(topic, QoS::AtMostOnce) {
                self.emit(TransportEvent::Error(TransportError::io(e)));
            }
        }
    }

    fn on_publish(&mut self, topic: &str, payload: &[u8]) {
        if topic == self.status_topic {
            let status = String::from_utf8_lossy(payload);
            tracing::debug!(%status, "board status");
            if let Some(event) = self.status.update(&status) {
                self.emit(event);
            }
        } else if topic == self.pong_topic && self.status.is_online() {
            self.emit(TransportEvent::Message(payload.to_vec()));
        }
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}
