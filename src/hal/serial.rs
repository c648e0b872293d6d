//! Serial port transport.
//!
//! The port is opened through `tokio-serial`'s re-export of the blocking
//! `serialport` builder. A reader thread owns a cloned handle and forwards
//! whatever arrives as [`TransportEvent::Message`]; writes happen on the
//! board's thread when the outbox is flushed.
//!
//! Serial links have no packet limit, so a whole tick goes out in one
//! `write_all`.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio_serial::SerialPort;

use crate::config::SerialTransportConfig;
use crate::error::TransportError;
use crate::traits::{Transport, TransportEvent};

use super::outbox::Outbox;

/// Read timeout for the reader thread; bounds how long `close` waits.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Serial port transport.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    events: Receiver<TransportEvent>,
    events_tx: Sender<TransportEvent>,
    stop: Arc<AtomicBool>,
    outbox: Outbox,
    name: &'static str,
}

impl SerialTransport {
    /// Opens `config.path` at `config.baud_rate`.
    pub fn open(config: &SerialTransportConfig) -> Result<Self, TransportError> {
        Self::open_path(config.path.as_str(), config.baud_rate, "serial")
    }

    pub(crate) fn open_path(
        path: &str,
        baud_rate: u32,
        name: &'static str,
    ) -> Result<Self, TransportError> {
        let port = tokio_serial::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .flow_control(tokio_serial::FlowControl::None)
            .open()
            .map_err(TransportError::connect)?;
        let reader = port.try_clone().map_err(TransportError::connect)?;

        let (events_tx, events) = channel();
        let stop = Arc::new(AtomicBool::new(false));

        let worker_tx = events_tx.clone();
        let worker_stop = Arc::clone(&stop);
        thread::Builder::new()
            .name(format!("{name}-reader"))
            .spawn(move || read_loop(reader, worker_tx, worker_stop))
            .map_err(TransportError::connect)?;

        tracing::info!(%path, baud_rate, "{name} port opened");
        let _ = events_tx.send(TransportEvent::Open);

        Ok(Self {
            port: Some(port),
            events,
            events_tx,
            stop,
            outbox: Outbox::unbounded(),
            name,
        })
    }

    fn write(&mut self, packet: &[u8]) {
        let Some(port) = self.port.as_mut() else {
            return;
        };
        let result = port.write_all(packet).and_then(|()| port.flush());
        if let Err(e) = result {
            tracing::warn!(error = %e, "{} write failed", self.name);
            let _ = self.events_tx.send(TransportEvent::Error(e.into()));
        }
    }
}

fn read_loop(mut port: Box<dyn SerialPort>, events: Sender<TransportEvent>, stop: Arc<AtomicBool>) {
    let mut buf = [0u8; 256];
    while !stop.load(Ordering::SeqCst) {
        match port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                if events.send(TransportEvent::Message(buf[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(ref e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                if !stop.load(Ordering::SeqCst) {
                    let _ = events.send(TransportEvent::Error(e.into()));
                    let _ = events.send(TransportEvent::Close);
                }
                return;
            }
        }
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) {
        if self.port.is_none() {
            return;
        }
        if let Some(packet) = self.outbox.push(bytes) {
            self.write(&packet);
        }
    }

    fn flush(&mut self) {
        if let Some(packet) = self.outbox.take() {
            self.write(&packet);
        }
    }

    fn close(&mut self) {
        self.flush();
        self.stop.store(true, Ordering::SeqCst);
        if self.port.take().is_some() {
            let _ = self.events_tx.send(TransportEvent::Close);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some() && !self.stop.load(Ordering::SeqCst)
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let event = self.events.try_recv().ok()?;
        if event == TransportEvent::Close {
            self.port = None;
        }
        Some(event)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}
