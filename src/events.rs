//! Typed event dispatch for boards and pins.
//!
//! Each component publishes one event enum. An [`EventEmitter`] holds an
//! ordered list of listeners; each listener watches one event kind or
//! every kind, and may be a one-shot. Listeners run in registration
//! order, synchronously, inside [`EventEmitter::emit`].
//!
//! Consumers that would rather drain events from their own loop can call
//! [`EventEmitter::subscribe`] for an `mpsc` receiver; the forwarding
//! listener removes itself once the receiver is dropped.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use firmata_board::events::{EventEmitter, PinEvent, PinEventKind};
//!
//! let mut emitter = EventEmitter::<PinEvent>::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! emitter.on(PinEventKind::RisingEdge, move |e| sink.lock().unwrap().push(e.clone()));
//!
//! emitter.emit(&PinEvent::RisingEdge { pin: 2, value: 1.0 });
//! emitter.emit(&PinEvent::FallingEdge { pin: 2, value: 0.0 });
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```

use std::fmt;
use std::sync::mpsc::{channel, Receiver};

use crate::error::BoardError;
use crate::pin::PinMode;

/// Listener count per kind above which a warning is logged.
pub const DEFAULT_MAX_LISTENERS: usize = 10;

// ============================================================================
// Event trait
// ============================================================================

/// An event enum with a fieldless discriminant used for listener routing.
pub trait Event: Clone + Send + 'static {
    /// Discriminant type.
    type Kind: Copy + Eq + fmt::Debug + Send;

    /// Discriminant of this event.
    fn kind(&self) -> Self::Kind;
}

/// Handle returned when registering a listener, used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Box<dyn FnMut(&E) -> bool + Send>;

struct Listener<E: Event> {
    id: ListenerId,
    kind: Option<E::Kind>,
    once: bool,
    callback: Callback<E>,
}

// ============================================================================
// Emitter
// ============================================================================

/// Ordered multi-listener dispatcher.
pub struct EventEmitter<E: Event> {
    listeners: Vec<Listener<E>>,
    next_id: u64,
    max_listeners: usize,
}

impl<E: Event> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
            max_listeners: DEFAULT_MAX_LISTENERS,
        }
    }
}

impl<E: Event> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .field("max_listeners", &self.max_listeners)
            .finish()
    }
}

impl<E: Event> EventEmitter<E> {
    /// Creates an emitter with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the per-kind listener count that triggers a leak warning.
    pub fn set_max_listeners(&mut self, max: usize) {
        self.max_listeners = max;
    }

    /// Calls `f` for every event of `kind`.
    pub fn on<F>(&mut self, kind: E::Kind, mut f: F) -> ListenerId
    where
        F: FnMut(&E) + Send + 'static,
    {
        self.register(Some(kind), false, Box::new(move |e| {
            f(e);
            true
        }))
    }

    /// Calls `f` for the next event of `kind`, then forgets it.
    pub fn once<F>(&mut self, kind: E::Kind, f: F) -> ListenerId
    where
        F: FnOnce(&E) + Send + 'static,
    {
        let mut f = Some(f);
        self.register(Some(kind), true, Box::new(move |e| {
            if let Some(f) = f.take() {
                f(e);
            }
            true
        }))
    }

    /// Calls `f` for every event regardless of kind.
    pub fn on_any<F>(&mut self, mut f: F) -> ListenerId
    where
        F: FnMut(&E) + Send + 'static,
    {
        self.register(None, false, Box::new(move |e| {
            f(e);
            true
        }))
    }

    /// Forwards every event to the returned receiver.
    pub fn subscribe(&mut self) -> Receiver<E> {
        let (tx, rx) = channel();
        self.register(None, false, Box::new(move |e: &E| tx.send(e.clone()).is_ok()));
        rx
    }

    /// Removes one listener. Returns `false` if it was already gone.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Removes every listener registered for `kind`.
    pub fn remove_all(&mut self, kind: E::Kind) {
        self.listeners.retain(|l| l.kind != Some(kind));
    }

    /// Removes every listener.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Number of listeners that would receive an event of `kind`.
    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.listeners
            .iter()
            .filter(|l| l.kind.map_or(true, |k| k == kind))
            .count()
    }

    /// Dispatches `event` to matching listeners in registration order.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&mut self, event: &E) -> usize {
        let kind = event.kind();
        let mut fired = 0;
        let mut spent = Vec::new();
        for listener in self.listeners.iter_mut() {
            if listener.kind.map_or(false, |k| k != kind) {
                continue;
            }
            fired += 1;
            let keep = (listener.callback)(event);
            if listener.once || !keep {
                spent.push(listener.id);
            }
        }
        if !spent.is_empty() {
            self.listeners.retain(|l| !spent.contains(&l.id));
        }
        fired
    }

    fn register(&mut self, kind: Option<E::Kind>, once: bool, callback: Callback<E>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            kind,
            once,
            callback,
        });
        if let Some(kind) = kind {
            let count = self.listeners.iter().filter(|l| l.kind == Some(kind)).count();
            if count > self.max_listeners {
                tracing::warn!(
                    ?kind,
                    count,
                    "possible listener leak: more than {} listeners",
                    self.max_listeners
                );
            }
        }
        id
    }
}

// ============================================================================
// Board events
// ============================================================================

/// Firmware version as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl FirmwareVersion {
    /// Creates a version.
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Whether this version supports the capability and mapping queries.
    pub fn supports_capability_query(&self) -> bool {
        self.major as u32 * 10 + self.minor as u32 >= 23
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Answer to a pin state query.
#[derive(Debug, Clone, PartialEq)]
pub struct PinStateReport {
    /// Pin number.
    pub pin: u8,
    /// Mode reported by the device, if known.
    pub mode: Option<PinMode>,
    /// Reported state, divided by the write resolution for PWM pins.
    pub state: f64,
}

/// Events published by a [`Board`](crate::Board).
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// Handshake finished; pins are usable.
    Ready,
    /// A transport or protocol failure. A forced disconnect follows.
    Error(BoardError),
    /// An explicit disconnect is about to tear the transport down.
    BeforeDisconnect,
    /// The transport is gone.
    Disconnect,
    /// The device came back online under the same session.
    Reconnect,
    /// A digital input pin changed.
    DigitalData {
        /// Pin number.
        pin: u8,
        /// New value, 0 or 1.
        value: f64,
    },
    /// An analog input reported a new value.
    AnalogData {
        /// Pin number.
        pin: u8,
        /// Analog channel.
        channel: u8,
        /// Value divided by the read resolution.
        value: f64,
    },
    /// Firmware name report.
    FirmwareName {
        /// Sketch name.
        name: String,
        /// Firmware version.
        version: FirmwareVersion,
    },
    /// Protocol version report.
    FirmwareVersion(FirmwareVersion),
    /// String message from the device.
    StringMessage(String),
    /// Sysex the board does not interpret: `[sub-command, data...]`.
    SysexMessage(Vec<u8>),
    /// A pin state query was answered.
    PinStateResponse(PinStateReport),
}

/// Discriminant of [`BoardEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BoardEventKind {
    Ready,
    Error,
    BeforeDisconnect,
    Disconnect,
    Reconnect,
    DigitalData,
    AnalogData,
    FirmwareName,
    FirmwareVersion,
    StringMessage,
    SysexMessage,
    PinStateResponse,
}

impl Event for BoardEvent {
    type Kind = BoardEventKind;

    fn kind(&self) -> BoardEventKind {
        match self {
            Self::Ready => BoardEventKind::Ready,
            Self::Error(_) => BoardEventKind::Error,
            Self::BeforeDisconnect => BoardEventKind::BeforeDisconnect,
            Self::Disconnect => BoardEventKind::Disconnect,
            Self::Reconnect => BoardEventKind::Reconnect,
            Self::DigitalData { .. } => BoardEventKind::DigitalData,
            Self::AnalogData { .. } => BoardEventKind::AnalogData,
            Self::FirmwareName { .. } => BoardEventKind::FirmwareName,
            Self::FirmwareVersion(_) => BoardEventKind::FirmwareVersion,
            Self::StringMessage(_) => BoardEventKind::StringMessage,
            Self::SysexMessage(_) => BoardEventKind::SysexMessage,
            Self::PinStateResponse(_) => BoardEventKind::PinStateResponse,
        }
    }
}

// ============================================================================
// Pin events
// ============================================================================

/// Events published by a [`Pin`](crate::Pin).
#[derive(Debug, Clone, PartialEq)]
pub enum PinEvent {
    /// The stored value changed.
    Change {
        /// Pin number.
        pin: u8,
        /// New value.
        value: f64,
        /// Previous value.
        last: f64,
    },
    /// The value went from `<= 0` to `> 0`.
    RisingEdge {
        /// Pin number.
        pin: u8,
        /// New value.
        value: f64,
    },
    /// The value went from `> 0` to `<= 0`.
    FallingEdge {
        /// Pin number.
        pin: u8,
        /// New value.
        value: f64,
    },
}

/// Discriminant of [`PinEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PinEventKind {
    Change,
    RisingEdge,
    FallingEdge,
}

impl Event for PinEvent {
    type Kind = PinEventKind;

    fn kind(&self) -> PinEventKind {
        match self {
            Self::Change { .. } => PinEventKind::Change,
            Self::RisingEdge { .. } => PinEventKind::RisingEdge,
            Self::FallingEdge { .. } => PinEventKind::FallingEdge,
        }
    }
}
