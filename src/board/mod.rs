//! The board: protocol state machine over one transport.
//!
//! A [`Board`] owns a transport, frames the bytes it delivers, runs the
//! discovery handshake, keeps one [`Pin`] per device pin, and turns
//! application calls into Firmata commands.
//!
//! # Lifecycle
//!
//! | State | Left when |
//! |-------|-----------|
//! | `Disconnected` | the transport reports `Open` |
//! | `AwaitingFirmwareVersion` | the firmware report arrives (>= 2.3) |
//! | `AwaitingCapabilityResponse` | the capability response arrives |
//! | `AwaitingAnalogMapping` | the mapping arrives |
//! | `AwaitingDigitalReports` | every enabled port has reported once |
//! | `Ready` | the transport fails or closes |
//! | `Reconnecting` | the connector produces a new transport |
//!
//! `AwaitingDigitalReports` is only used with `handle_digital_pins`.
//! `Reconnecting` is only entered with `auto_reconnect` and a connector,
//! after a close the application did not ask for. Each attempt runs the
//! connector on its own thread; `poll` only collects the result, so a
//! slow connect never stalls the loop.
//!
//! # Driving the board
//!
//! Nothing happens in the background. Call [`Board::poll`] from your loop:
//! it drains transport events, advances the handshake, runs pin
//! generators, retries reconnects, and flushes the tick's sends as one
//! write.
//!
//! # Example
//!
//! ```rust
//! use firmata_board::{Board, BoardConfig, BoardEventKind, BoardState};
//! use firmata_board::hal::{MockClock, MockTransport};
//!
//! let mut transport = MockTransport::new();
//! transport.open();
//! let mut board = Board::with_clock(transport, BoardConfig::default(), MockClock::new()).unwrap();
//!
//! board.poll();
//! assert_eq!(board.state(), BoardState::AwaitingFirmwareVersion);
//!
//! // Firmware 2.5 "x", one digital pin, no analog channels.
//! let t = board.transport_mut().unwrap();
//! t.queue_message(vec![0xF0, 0x79, 2, 5, b'x', 0, 0xF7]);
//! t.queue_message(vec![0xF0, 0x6C, 0, 1, 1, 1, 127, 0xF7]);
//! t.queue_message(vec![0xF0, 0x6A, 127, 0xF7]);
//! board.poll();
//!
//! assert!(board.is_ready());
//! assert_eq!(board.pin_count(), 1);
//! assert_eq!(board.firmware_name(), "x");
//! ```

pub mod handshake;
pub mod platform;
pub mod query;

mod input;
mod output;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::sync::oneshot;

use crate::config::BoardConfig;
use crate::dedup::SendWindow;
use crate::error::{BoardError, ConfigError, TransportError};
use crate::events::{BoardEvent, BoardEventKind, EventEmitter, FirmwareVersion, ListenerId, PinStateReport};
use crate::framer::Framer;
use crate::hal::SystemClock;
use crate::pin::Pin;
use crate::protocol::DEFAULT_SAMPLING_INTERVAL;
use crate::traits::{Clock, Transport, TransportEvent};
use crate::transport_dyn::AnyTransport;

pub use handshake::{Exchange, Handshake, SerialBootHandshake, SimulatedHandshake, StandardHandshake};
pub use platform::{Arduino, Area, WebArduino};
pub use query::{PinRead, PinStateFuture};

/// Result of one reconnect attempt, delivered by its worker thread.
type PendingConnect<T> = Receiver<Result<T, TransportError>>;

/// Starts a reconnect attempt on a worker thread.
type Connector<T> = Box<dyn FnMut() -> Result<PendingConnect<T>, TransportError> + Send>;

/// Connection and handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    /// No usable transport, or waiting for it to open.
    Disconnected,
    /// Waiting for the firmware name and version.
    AwaitingFirmwareVersion,
    /// Waiting for the pin capability table.
    AwaitingCapabilityResponse,
    /// Waiting for the analog channel mapping.
    AwaitingAnalogMapping,
    /// Waiting for the first report of every enabled digital port.
    AwaitingDigitalReports,
    /// Handshake complete.
    Ready,
    /// Waiting to retry the connector.
    Reconnecting,
}

/// Firmata board.
///
/// # Type Parameters
///
/// - `T`: the transport ([`Transport`] trait)
/// - `C`: the time source ([`Clock`] trait), [`SystemClock`] by default
pub struct Board<T: Transport, C: Clock = SystemClock> {
    transport: Option<T>,
    connector: Option<Connector<T>>,
    pending_connect: Option<PendingConnect<T>>,
    handshake: Box<dyn Handshake>,
    clock: C,
    config: BoardConfig,
    state: BoardState,
    explicit_disconnect: bool,
    last_reconnect_ms: u64,

    framer: Framer,
    injected: VecDeque<Vec<u8>>,

    pins: Vec<Pin>,
    analog_map: BTreeMap<u8, usize>,
    i2c_pins: Vec<u8>,
    digital_ports: Vec<u8>,
    total_analog_pins: usize,

    firmware_name: String,
    firmware_version: Option<FirmwareVersion>,
    sampling_interval: u32,
    send_window: SendWindow,

    pin_state_requests: HashMap<u8, usize>,
    digital_report_requests: usize,
    pin_state_waiters: HashMap<u8, Vec<oneshot::Sender<PinStateReport>>>,

    events: EventEmitter<BoardEvent>,
}

impl<T: Transport, C: Clock> fmt::Debug for Board<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("transport", &self.transport.as_ref().map(|t| t.name()))
            .field("handshake", &self.handshake.name())
            .field("state", &self.state)
            .field("pins", &self.pins.len())
            .field("analog_pins", &self.total_analog_pins)
            .field("firmware_name", &self.firmware_name)
            .field("firmware_version", &self.firmware_version)
            .finish()
    }
}

// ============================================================================
// Construction
// ============================================================================

impl<T: Transport> Board<T, SystemClock> {
    /// Creates a board over `transport` with the standard handshake.
    pub fn new(transport: T, config: BoardConfig) -> Result<Self, BoardError> {
        Self::with_clock(transport, config, SystemClock::new())
    }
}

impl Board<AnyTransport, SystemClock> {
    /// Opens the transport named in `config` and builds a board on it.
    ///
    /// The same config is kept as the reconnect connector, so
    /// `auto_reconnect` works without further setup.
    pub fn connect<H: Handshake + 'static>(config: BoardConfig, handshake: H) -> Result<Self, BoardError> {
        config.validate()?;
        let transport_config = config.transport.clone().ok_or(ConfigError::MissingField {
            transport: "board",
            field: "transport",
        })?;
        let transport = AnyTransport::connect(&transport_config)?;
        let board = Self::new(transport, config)?
            .with_handshake(handshake)
            .with_connector(move || AnyTransport::connect(&transport_config));
        Ok(board)
    }
}

impl<T: Transport, C: Clock> Board<T, C> {
    /// Creates a board with an explicit clock.
    pub fn with_clock(transport: T, config: BoardConfig, clock: C) -> Result<Self, BoardError> {
        config.validate()?;
        tracing::debug!(transport = transport.name(), "board created");
        Ok(Self {
            transport: Some(transport),
            connector: None,
            pending_connect: None,
            handshake: Box::new(StandardHandshake),
            clock,
            send_window: SendWindow::new(config.sending_interval_ms),
            config,
            state: BoardState::Disconnected,
            explicit_disconnect: false,
            last_reconnect_ms: 0,
            framer: Framer::new(),
            injected: VecDeque::new(),
            pins: Vec::new(),
            analog_map: BTreeMap::new(),
            i2c_pins: Vec::new(),
            digital_ports: Vec::new(),
            total_analog_pins: 0,
            firmware_name: String::new(),
            firmware_version: None,
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
            pin_state_requests: HashMap::new(),
            digital_report_requests: 0,
            pin_state_waiters: HashMap::new(),
            events: EventEmitter::new(),
        })
    }

    /// Replaces the handshake strategy.
    pub fn with_handshake<H: Handshake + 'static>(mut self, handshake: H) -> Self {
        self.handshake = Box::new(handshake);
        self
    }

    /// Installs the function used to reopen the transport.
    ///
    /// It is called on a worker thread, one attempt at a time, and may
    /// block.
    pub fn with_connector<F>(mut self, connector: F) -> Self
    where
        F: FnMut() -> Result<T, TransportError> + Send + 'static,
        T: 'static,
    {
        let connector = Arc::new(Mutex::new(connector));
        self.connector = Some(Box::new(move || {
            let connector = Arc::clone(&connector);
            let (tx, rx) = mpsc::channel();
            thread::Builder::new()
                .name("firmata-reconnect".into())
                .spawn(move || {
                    let result = match connector.lock() {
                        Ok(mut connect) => (&mut *connect)(),
                        Err(_) => Err(TransportError::connect("connector panicked")),
                    };
                    let _ = tx.send(result);
                })
                .map(|_| rx)
                .map_err(TransportError::from)
        }));
        self
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    /// Handshake progress.
    pub fn state(&self) -> BoardState {
        self.state
    }

    /// Whether the handshake has completed.
    pub fn is_ready(&self) -> bool {
        self.state == BoardState::Ready
    }

    /// Whether the transport is present and writable.
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().map_or(false, |t| t.is_open())
    }

    /// Configuration the board was built with.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Name of the handshake strategy in use.
    pub fn handshake_name(&self) -> &'static str {
        self.handshake.name()
    }

    /// Current transport; `None` after a close.
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Mutable access to the current transport.
    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Time source.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Sketch name from the last firmware report.
    pub fn firmware_name(&self) -> &str {
        &self.firmware_name
    }

    /// Version from the last firmware or version report.
    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.firmware_version
    }

    /// Pin state queries sent but not yet answered.
    pub fn pending_pin_state_requests(&self) -> usize {
        self.pin_state_requests.values().sum()
    }

    // ------------------------------------------------------------------------
    // Pins
    // ------------------------------------------------------------------------

    /// Pin by number.
    pub fn pin(&self, number: u8) -> Option<&Pin> {
        self.pins.get(number as usize)
    }

    /// Mutable pin by number, for filters, generators and listeners.
    ///
    /// Values go through [`write_pin`](Self::write_pin).
    pub fn pin_mut(&mut self, number: u8) -> Option<&mut Pin> {
        self.pins.get_mut(number as usize)
    }

    /// Pin by digital number.
    pub fn digital_pin(&self, number: u8) -> Option<&Pin> {
        self.pin(number)
    }

    /// Pin by analog channel.
    pub fn analog_pin(&self, channel: u8) -> Option<&Pin> {
        self.analog_map.get(&channel).and_then(|i| self.pins.get(*i))
    }

    /// Mutable pin by analog channel.
    pub fn analog_pin_mut(&mut self, channel: u8) -> Option<&mut Pin> {
        let index = *self.analog_map.get(&channel)?;
        self.pins.get_mut(index)
    }

    /// Every discovered pin, in pin order.
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// Pin number serving an analog channel.
    pub fn analog_to_digital(&self, channel: u8) -> Result<u8, BoardError> {
        self.analog_pin(channel)
            .map(Pin::number)
            .ok_or(BoardError::UnknownAnalogChannel(channel as usize))
    }

    /// Number of discovered pins.
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// Number of analog-capable pins in the capability table.
    pub fn analog_pin_count(&self) -> usize {
        self.total_analog_pins
    }

    /// Pins that support I2C.
    pub fn i2c_pins(&self) -> &[u8] {
        &self.i2c_pins
    }

    /// Mode names and resolutions per pin; pins without capabilities map
    /// `"not available"` to 0.
    pub fn pin_capabilities(&self) -> Vec<BTreeMap<&'static str, u8>> {
        self.pins
            .iter()
            .map(|pin| {
                if pin.capabilities().is_empty() {
                    BTreeMap::from([("not available", 0)])
                } else {
                    pin.capabilities()
                        .iter()
                        .filter_map(|(mode, bits)| {
                            crate::pin::PinMode::from_u8(*mode).map(|m| (m.name(), *bits))
                        })
                        .collect()
                }
            })
            .collect()
    }

    /// Logs the capability table at info level.
    pub fn report_capabilities(&self) {
        for (number, capabilities) in self.pin_capabilities().iter().enumerate() {
            tracing::info!(pin = number, "capabilities");
            for (mode, bits) in capabilities {
                let unit = if *bits > 1 { "bits" } else { "bit" };
                tracing::info!(pin = number, "\t{mode} ({bits} {unit})");
            }
        }
    }

    pub(crate) fn pin_index(&self, number: u8) -> Result<usize, BoardError> {
        let index = number as usize;
        if index < self.pins.len() {
            Ok(index)
        } else {
            Err(BoardError::UnknownPin(index))
        }
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Registers a listener for one event kind.
    pub fn on<F>(&mut self, kind: BoardEventKind, f: F) -> ListenerId
    where
        F: FnMut(&BoardEvent) + Send + 'static,
    {
        self.events.on(kind, f)
    }

    /// Registers a one-shot listener.
    pub fn once<F>(&mut self, kind: BoardEventKind, f: F) -> ListenerId
    where
        F: FnOnce(&BoardEvent) + Send + 'static,
    {
        self.events.once(kind, f)
    }

    /// Removes a listener.
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Receives every board event over a channel.
    pub fn subscribe(&mut self) -> Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Full access to the board's emitter.
    pub fn events(&mut self) -> &mut EventEmitter<BoardEvent> {
        &mut self.events
    }

    // ------------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------------

    /// Runs one tick.
    pub fn poll(&mut self) {
        self.drain_injected();
        while let Some(event) = self.transport.as_mut().and_then(|t| t.poll_event()) {
            self.handle_transport_event(event);
            self.drain_injected();
        }
        self.poll_generators();
        self.poll_reconnect();
        self.flush();
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Message(bytes) => self.process_input(&bytes),
            TransportEvent::Error(err) => {
                tracing::warn!(error = %err, "transport error");
                self.fail(err.into());
            }
            TransportEvent::Close => self.on_closed(),
            TransportEvent::Reopen => {
                tracing::info!("Device re-online");
                self.events.emit(&BoardEvent::Reconnect);
            }
        }
    }

    fn on_open(&mut self) {
        let transport = self.transport.as_ref().map_or("none", |t| t.name());
        tracing::info!(transport, handshake = self.handshake.name(), "Device online");
        self.framer.reset();
        self.explicit_disconnect = false;
        self.state = BoardState::AwaitingFirmwareVersion;
        let step = self.handshake.begin();
        self.exchange(step);
    }

    pub(crate) fn exchange(&mut self, step: Exchange) {
        match step {
            Exchange::Send(bytes) => self.send(&bytes),
            Exchange::Inject(bytes) if self.transport.is_some() => self.injected.push_back(bytes),
            Exchange::Inject(_) | Exchange::Wait => {}
        }
    }

    fn poll_generators(&mut self) {
        let now = self.clock.now_ms();
        for index in 0..self.pins.len() {
            let Some(value) = self.pins[index].poll_generator(now) else {
                continue;
            };
            let change = self.pins[index].set_value(value);
            if change.changed && self.pins[index].is_output() {
                if let Err(err) = self.forward(index) {
                    self.fail(err);
                    return;
                }
            }
        }
    }

    /// Collects a finished attempt, or starts one once the interval has
    /// passed since the last attempt ended.
    fn poll_reconnect(&mut self) {
        if self.state != BoardState::Reconnecting {
            return;
        }
        if let Some(pending) = &self.pending_connect {
            let outcome = match pending.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => Err(TransportError::connect("reconnect worker exited")),
            };
            self.pending_connect = None;
            self.last_reconnect_ms = self.clock.now_ms();
            match outcome {
                Ok(transport) => {
                    tracing::info!(transport = transport.name(), "transport reopened");
                    self.transport = Some(transport);
                    self.state = BoardState::Disconnected;
                }
                Err(err) => tracing::debug!(error = %err, "reconnect attempt failed"),
            }
            return;
        }

        let now = self.clock.now_ms();
        if now.saturating_sub(self.last_reconnect_ms) < self.config.reconnect_interval_ms {
            return;
        }
        self.last_reconnect_ms = now;
        let Some(connector) = self.connector.as_mut() else {
            self.state = BoardState::Disconnected;
            return;
        };
        match connector() {
            Ok(pending) => self.pending_connect = Some(pending),
            Err(err) => tracing::warn!(error = %err, "could not start reconnect attempt"),
        }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Closes the transport. `Disconnect` is emitted once it is gone.
    ///
    /// An explicit disconnect never triggers a reconnect.
    pub fn disconnect(&mut self) {
        self.explicit_disconnect = true;
        if self.state == BoardState::Reconnecting {
            self.state = BoardState::Disconnected;
            self.pending_connect = None;
        }
        self.teardown();
    }

    /// Reports `err` and drops the connection.
    pub(crate) fn fail(&mut self, err: BoardError) {
        tracing::warn!(error = %err, "board failure, disconnecting");
        self.leave_ready();
        self.events.emit(&BoardEvent::Error(err));
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.is_connected() {
            self.events.emit(&BoardEvent::BeforeDisconnect);
        }
        self.leave_ready();
        match self.transport.as_mut() {
            Some(transport) if transport.is_open() => transport.close(),
            Some(_) => self.on_closed(),
            None => {}
        }
    }

    fn on_closed(&mut self) {
        self.transport = None;
        self.framer.reset();
        self.injected.clear();
        self.cancel_pin_state_queries();

        let reconnect =
            self.config.auto_reconnect && !self.explicit_disconnect && self.connector.is_some();
        if reconnect {
            self.state = BoardState::Reconnecting;
            self.last_reconnect_ms = self.clock.now_ms();
            tracing::info!(every_ms = self.config.reconnect_interval_ms, "connection lost, reconnecting");
        } else {
            self.state = BoardState::Disconnected;
            tracing::info!("disconnected");
        }
        self.events.emit(&BoardEvent::Disconnect);
    }

    fn leave_ready(&mut self) {
        if self.state != BoardState::Reconnecting {
            self.state = BoardState::Disconnected;
        }
    }

    fn cancel_pin_state_queries(&mut self) {
        if !self.pin_state_waiters.is_empty() {
            tracing::debug!(pins = self.pin_state_waiters.len(), "cancelling pin state queries");
        }
        self.pin_state_waiters.clear();
        self.pin_state_requests.clear();
    }
}
