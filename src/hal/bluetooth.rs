//! Bluetooth serial (SPP) transport.
//!
//! The remote board is reached through an RFCOMM device node that the OS
//! binds to its address (`rfcomm bind 0 <address> 1`). Opening that node
//! can fail while the link is still pairing, so connects are retried
//! `max_retries` times, `retry_delay_ms` apart, before giving up with
//! [`TransportError::TooManyRetries`]. Once open it behaves exactly like
//! the serial transport.

use std::thread;
use std::time::Duration;

use crate::config::BluetoothTransportConfig;
use crate::error::TransportError;
use crate::traits::{Transport, TransportEvent};

use super::serial::SerialTransport;

/// Bluetooth SPP transport.
pub struct BluetoothTransport {
    inner: SerialTransport,
}

impl BluetoothTransport {
    /// Opens the RFCOMM device, retrying per the config.
    pub fn connect(config: &BluetoothTransportConfig) -> Result<Self, TransportError> {
        let attempts = config.max_retries.max(1);
        for attempt in 1..=attempts {
            match SerialTransport::open_path(config.address.as_str(), config.baud_rate, "bluetooth")
            {
                Ok(inner) => {
                    tracing::info!(address = %config.address, uuid = %config.uuid, attempt, "bluetooth link up");
                    return Ok(Self { inner });
                }
                Err(e) => {
                    tracing::debug!(error = %e, attempt, "bluetooth connect failed");
                    if attempt < attempts {
                        thread::sleep(Duration::from_millis(config.retry_delay_ms));
                    }
                }
            }
        }
        tracing::warn!(address = %config.address, attempts, "bluetooth connect gave up");
        Err(TransportError::TooManyRetries)
    }
}

impl Transport for BluetoothTransport {
    fn send(&mut self, bytes: &[u8]) {
        self.inner.send(bytes);
    }

    fn flush(&mut self) {
        self.inner.flush();
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.inner.poll_event()
    }

    fn name(&self) -> &'static str {
        "bluetooth"
    }
}
