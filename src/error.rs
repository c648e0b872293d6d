//! Error types for the board, its transports, and configuration.
//!
//! Errors fall into four groups:
//!
//! | Group | Type | Surfaced as |
//! |-------|------|-------------|
//! | Transport failures | [`TransportError`] | `TransportEvent::Error`, then forced disconnect |
//! | Configuration mistakes | [`ConfigError`], [`BoardError`] | `Err` returned to the caller |
//! | Handshake failures | [`BoardError::FirmwareTooOld`] | `BoardEvent::Error`, then forced disconnect |
//! | Malformed input | none | the framer discards the bad prefix |

use thiserror::Error;

/// Errors reported by a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The channel could not be opened.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Reading from or writing to the channel failed.
    #[error("io error: {0}")]
    Io(String),

    /// The device behind an already-open session went away.
    #[error("board connection failed.")]
    BoardOffline,

    /// Connection retries were exhausted.
    #[error("too many retries")]
    TooManyRetries,

    /// Operation attempted on a closed channel.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Create an I/O error from anything displayable.
    pub fn io(err: impl std::fmt::Display) -> Self {
        Self::Io(err.to_string())
    }

    /// Create a connect error from anything displayable.
    pub fn connect(err: impl std::fmt::Display) -> Self {
        Self::Connect(err.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Sampling interval outside the accepted range.
    #[error("sampling interval must be between {min} and {max}, got {value}")]
    SamplingInterval {
        /// Rejected value.
        value: u32,
        /// Lower bound (inclusive).
        min: u32,
        /// Upper bound (inclusive).
        max: u32,
    },

    /// A transport needs a field that was left empty.
    #[error("{transport} transport requires `{field}`")]
    MissingField {
        /// Transport name.
        transport: &'static str,
        /// Field name.
        field: &'static str,
    },

    /// The baud rate is zero.
    #[error("baud rate must be non-zero")]
    BaudRate,
}

/// Errors returned by [`Board`](crate::Board) operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoardError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transport failure bubbled up through a synchronous call.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Digital writes accept only 0 or 1.
    #[error("Invalid value passed to sendDigital, value must be 0 or 1.")]
    InvalidDigitalValue(f64),

    /// The extended analog frame carries at most 16 bits.
    #[error("Extended Analog values > 16 bits are not currently supported by StandardFirmata")]
    ExtendedAnalogTooWide(u32),

    /// Connected firmware predates the capability query.
    #[error("You must upload StandardFirmata version 2.3 or greater from Arduino version 1.0 or higher")]
    FirmwareTooOld {
        /// Reported major version.
        major: u8,
        /// Reported minor version.
        minor: u8,
    },

    /// No pin with that number was discovered.
    #[error("unknown pin {0}")]
    UnknownPin(usize),

    /// No pin is mapped to that analog channel.
    #[error("unknown analog channel {0}")]
    UnknownAnalogChannel(usize),

    /// Only output pins accept writes.
    #[error("pin {0} is not configured as an output")]
    NotAnOutput(u8),

    /// The board was disconnected before the query was answered.
    #[error("pin state query for pin {0} was cancelled")]
    QueryCancelled(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_error_message() {
        let err = BoardError::FirmwareTooOld { major: 2, minor: 2 };
        assert!(err.to_string().starts_with("You must upload StandardFirmata version 2.3"));
    }

    #[test]
    fn transport_error_wraps_transparently() {
        let err: BoardError = TransportError::BoardOffline.into();
        assert_eq!(err.to_string(), "board connection failed.");
    }

    #[test]
    fn config_error_reports_bounds() {
        let err = ConfigError::SamplingInterval {
            value: 5,
            min: 20,
            max: 15000,
        };
        assert_eq!(
            err.to_string(),
            "sampling interval must be between 20 and 15000, got 5"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: TransportError = io.into();
        assert!(matches!(err, TransportError::Io(_)));
    }
}
