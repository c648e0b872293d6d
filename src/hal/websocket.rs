//! Direct WebSocket transport.
//!
//! Uses `tungstenite` over a non-blocking `TcpStream`: the opening
//! handshake blocks once in [`WebSocketTransport::connect`], after which
//! every read happens inside [`poll_event`](Transport::poll_event) and
//! returns immediately when no frame is waiting.
//!
//! Outbound bytes coalesce per tick and go out as binary frames of at
//! most `max_packet_size` bytes (64 by default).

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::TcpStream;

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

use crate::config::WebSocketTransportConfig;
use crate::error::TransportError;
use crate::traits::{Transport, TransportEvent};

use super::outbox::Outbox;

type WsStream = WebSocket<MaybeTlsStream<TcpStream>>;

/// WebSocket transport.
pub struct WebSocketTransport {
    socket: Option<WsStream>,
    pending: VecDeque<TransportEvent>,
    outbox: Outbox,
}

impl WebSocketTransport {
    /// Opens the socket; `Open` is the first polled event.
    pub fn connect(config: &WebSocketTransportConfig) -> Result<Self, TransportError> {
        let url = config.resolved_url();
        let (socket, _response) = connect(url.as_str()).map_err(TransportError::connect)?;

        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream.set_nonblocking(true)?;
        }
        tracing::info!(%url, "WebSocket connected");

        Ok(Self {
            socket: Some(socket),
            pending: VecDeque::from([TransportEvent::Open]),
            outbox: Outbox::bounded(config.max_packet_size, 0),
        })
    }

    fn write(&mut self, packet: Vec<u8>) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        match socket.send(Message::Binary(packet)) {
            Ok(()) => {}
            // Frame stays buffered; the next write or flush retries it.
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => self.fail(TransportError::io(e)),
        }
    }

    fn read(&mut self) -> Option<TransportEvent> {
        let socket = self.socket.as_mut()?;
        match socket.read() {
            Ok(Message::Binary(data)) => Some(TransportEvent::Message(data)),
            Ok(Message::Text(text)) => Some(TransportEvent::Message(text.into_bytes())),
            Ok(Message::Close(_)) => {
                self.socket = None;
                Some(TransportEvent::Close)
            }
            Ok(_) => None,
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                self.fail(TransportError::io(e));
                self.pending.pop_front()
            }
        }
    }

    fn fail(&mut self, err: TransportError) {
        tracing::warn!(error = %err, "WebSocket failed");
        self.socket = None;
        self.outbox.clear();
        self.pending.push_back(TransportEvent::Error(err));
        self.pending.push_back(TransportEvent::Close);
    }
}

impl Transport for WebSocketTransport {
    fn send(&mut self, bytes: &[u8]) {
        if self.socket.is_none() {
            return;
        }
        if let Some(packet) = self.outbox.push(bytes) {
            self.write(packet);
        }
    }

    fn flush(&mut self) {
        if let Some(packet) = self.outbox.take() {
            self.write(packet);
        }
    }

    fn close(&mut self) {
        self.flush();
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None);
            let _ = socket.flush();
            self.pending.push_back(TransportEvent::Close);
        }
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        self.read()
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}
