//! Per-pin model: mode, capabilities, value pipeline, and statistics.
//!
//! Pins are created by the board while it processes the capability
//! response and live as long as the board. Every value assignment goes
//! through the same pipeline:
//!
//! ```text
//! raw ─► filters (in order) ─► value ─► min/max/mean ─► change detection
//!                                                       │
//!                       Change, RisingEdge, FallingEdge ◄┘
//! ```
//!
//! Edges follow the sign of the value: `<= 0` to `> 0` is rising, `> 0`
//! to `<= 0` is falling. Any other difference is a plain change.
//!
//! Values enter the pipeline from device reports, from
//! [`Board::write_pin`](crate::Board::write_pin), or from a generator.
//! Output pins forward every change to the device.
//!
//! # Example
//!
//! ```rust
//! use std::sync::mpsc;
//! use firmata_board::{Board, BoardConfig, PinEvent, PinEventKind, PinMode};
//! use firmata_board::hal::{MockClock, MockTransport};
//!
//! let mut transport = MockTransport::new();
//! transport.open();
//! let config = BoardConfig::default().with_handle_digital_pins(true);
//! let mut board = Board::with_clock(transport, config, MockClock::new()).unwrap();
//! board.poll();
//!
//! // One digital pin, then the first port report.
//! let t = board.transport_mut().unwrap();
//! t.queue_message(vec![0xF0, 0x79, 2, 5, 0xF7]);
//! t.queue_message(vec![0xF0, 0x6C, 0, 1, 1, 1, 127, 0xF7]);
//! t.queue_message(vec![0xF0, 0x6A, 127, 0xF7]);
//! t.queue_message(vec![0x90, 0, 0]);
//! board.poll();
//! assert!(board.is_ready());
//!
//! board.set_digital_pin_mode(0, PinMode::DigitalInput).unwrap();
//! let (tx, rx) = mpsc::channel();
//! board.pin_mut(0).unwrap().on(PinEventKind::RisingEdge, move |e| {
//!     let _ = tx.send(e.clone());
//! });
//!
//! board.transport_mut().unwrap().queue_message(vec![0x90, 1, 0]);
//! board.poll();
//! assert_eq!(rx.try_recv().unwrap(), PinEvent::RisingEdge { pin: 0, value: 1.0 });
//! assert_eq!(board.pin(0).unwrap().last_value(), 0.0);
//! ```

mod filter;
mod generator;

pub use filter::{Filter, FilterId, LowPass, MovingAverage};
pub use generator::{Curve, Generator, Oscillator, Ramp, Waveform};

use std::collections::BTreeMap;
use std::fmt;

use crate::events::{EventEmitter, ListenerId, PinEvent, PinEventKind};

/// Logic high.
pub const HIGH: f64 = 1.0;
/// Logic low.
pub const LOW: f64 = 0.0;

/// Sample count at which the running mean is re-weighted.
///
/// Beyond 2^53 an `f64` can no longer count one sample at a time.
const MAX_SAMPLES: u64 = 1 << 53;

const DEFAULT_WRITE_RESOLUTION: f64 = 255.0;
const DEFAULT_READ_RESOLUTION: f64 = 1023.0;

// ============================================================================
// Pin mode
// ============================================================================

/// Firmata pin modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PinMode {
    /// Digital input.
    DigitalInput = 0,
    /// Digital output.
    DigitalOutput = 1,
    /// Analog input.
    AnalogInput = 2,
    /// PWM (analog output).
    Pwm = 3,
    /// Servo.
    Servo = 4,
    /// Shift register.
    Shift = 5,
    /// I2C.
    I2c = 6,
    /// OneWire.
    OneWire = 7,
    /// Stepper.
    Stepper = 8,
}

impl PinMode {
    /// Number of defined modes.
    pub const COUNT: u8 = 9;

    /// Analog output is PWM on Firmata.
    pub const ANALOG_OUTPUT: PinMode = PinMode::Pwm;

    /// Every mode in wire order.
    pub const ALL: [PinMode; 9] = [
        PinMode::DigitalInput,
        PinMode::DigitalOutput,
        PinMode::AnalogInput,
        PinMode::Pwm,
        PinMode::Servo,
        PinMode::Shift,
        PinMode::I2c,
        PinMode::OneWire,
        PinMode::Stepper,
    ];

    /// Parses a wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Short lowercase name used in capability reports.
    pub fn name(self) -> &'static str {
        match self {
            PinMode::DigitalInput => "input",
            PinMode::DigitalOutput => "output",
            PinMode::AnalogInput => "analog",
            PinMode::Pwm => "pwm",
            PinMode::Servo => "servo",
            PinMode::Shift => "shift",
            PinMode::I2c => "i2c",
            PinMode::OneWire => "onewire",
            PinMode::Stepper => "stepper",
        }
    }

    /// Whether local value changes on a pin in this mode go to hardware.
    pub fn is_output(self) -> bool {
        matches!(self, PinMode::DigitalOutput | PinMode::Pwm | PinMode::Servo)
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Value change
// ============================================================================

/// What a value assignment did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValueChange {
    /// The stored value differs from the previous one.
    pub changed: bool,
    /// Crossed from `<= 0` to `> 0`.
    pub rising: bool,
    /// Crossed from `> 0` to `<= 0`.
    pub falling: bool,
}

// ============================================================================
// Pin
// ============================================================================

/// One physical pin.
pub struct Pin {
    number: u8,
    mode: Option<PinMode>,
    capabilities: BTreeMap<u8, u8>,
    analog_number: Option<u8>,
    analog_write_resolution: f64,
    analog_read_resolution: f64,
    analog_reporting: bool,

    value: f64,
    last_value: f64,
    pre_filter_value: f64,
    state: Option<f64>,

    minimum: f64,
    maximum: f64,
    sum: f64,
    average: f64,
    num_samples: u64,

    filters: Vec<(FilterId, Box<dyn Filter>)>,
    next_filter_id: u64,
    generator: Option<Box<dyn Generator>>,
    events: EventEmitter<PinEvent>,
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pin")
            .field("number", &self.number)
            .field("mode", &self.mode)
            .field("analog_number", &self.analog_number)
            .field("value", &self.value)
            .field("last_value", &self.last_value)
            .field("filters", &self.filters.len())
            .field("generator", &self.generator.is_some())
            .finish()
    }
}

impl Pin {
    /// Creates a pin with no capabilities.
    ///
    /// Boards create their own pins; this is public for tests and tools
    /// that model pins without a device.
    pub fn new(number: u8, mode: Option<PinMode>) -> Self {
        Self {
            number,
            mode,
            capabilities: BTreeMap::new(),
            analog_number: None,
            analog_write_resolution: DEFAULT_WRITE_RESOLUTION,
            analog_read_resolution: DEFAULT_READ_RESOLUTION,
            analog_reporting: false,
            value: 0.0,
            last_value: -1.0,
            pre_filter_value: 0.0,
            state: None,
            minimum: 65536.0,
            maximum: 0.0,
            sum: 0.0,
            average: 0.0,
            num_samples: 0,
            filters: Vec::new(),
            next_filter_id: 0,
            generator: None,
            events: EventEmitter::new(),
        }
    }

    /// Pin number.
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Current mode, `None` if the pin has no usable capability.
    pub fn mode(&self) -> Option<PinMode> {
        self.mode
    }

    /// Whether local value changes are forwarded to hardware.
    pub fn is_output(&self) -> bool {
        self.mode.map_or(false, PinMode::is_output)
    }

    pub(crate) fn set_mode(&mut self, mode: PinMode) {
        self.mode = Some(mode);
    }

    // ------------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------------

    /// Raw capability map: mode byte to resolution bits.
    pub fn capabilities(&self) -> &BTreeMap<u8, u8> {
        &self.capabilities
    }

    /// Resolution bits for `mode`, if supported.
    pub fn resolution(&self, mode: PinMode) -> Option<u8> {
        self.capabilities.get(&mode.as_u8()).copied()
    }

    /// Whether the pin supports `mode`.
    pub fn supports(&self, mode: PinMode) -> bool {
        self.capabilities.contains_key(&mode.as_u8())
    }

    pub(crate) fn set_capabilities(&mut self, capabilities: BTreeMap<u8, u8>) {
        self.capabilities = capabilities;
        // A 0-bit resolution would scale every value by 1/0.
        if let Some(bits) = self.resolution(PinMode::Pwm).filter(|bits| *bits > 0) {
            self.analog_write_resolution = max_for_bits(bits);
        }
        if let Some(bits) = self.resolution(PinMode::AnalogInput).filter(|bits| *bits > 0) {
            self.analog_read_resolution = max_for_bits(bits);
        }
    }

    /// Full-scale PWM value.
    pub fn analog_write_resolution(&self) -> f64 {
        self.analog_write_resolution
    }

    /// Full-scale analog reading.
    pub fn analog_read_resolution(&self) -> f64 {
        self.analog_read_resolution
    }

    /// Analog channel, if the pin is analog-capable.
    pub fn analog_number(&self) -> Option<u8> {
        self.analog_number
    }

    pub(crate) fn set_analog_number(&mut self, channel: u8) {
        self.analog_number = Some(channel);
    }

    /// Whether the device is streaming analog reports for this pin.
    pub fn is_analog_reporting(&self) -> bool {
        self.analog_reporting
    }

    pub(crate) fn set_analog_reporting(&mut self, on: bool) {
        self.analog_reporting = on;
    }

    // ------------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------------

    /// Current (filtered) value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Value before the latest assignment.
    pub fn last_value(&self) -> f64 {
        self.last_value
    }

    /// Latest raw input before filtering.
    pub fn pre_filter_value(&self) -> f64 {
        self.pre_filter_value
    }

    /// Last state reported by a pin state query.
    pub fn state(&self) -> Option<f64> {
        self.state
    }

    /// Smallest value seen.
    pub fn minimum(&self) -> f64 {
        self.minimum
    }

    /// Largest value seen.
    pub fn maximum(&self) -> f64 {
        self.maximum
    }

    /// Mean of all values seen.
    pub fn average(&self) -> f64 {
        self.average
    }

    /// Runs `raw` through the pipeline. Forwarding to hardware is the
    /// board's job.
    pub(crate) fn set_value(&mut self, raw: f64) -> ValueChange {
        self.last_value = self.value;
        self.pre_filter_value = raw;
        self.value = self.apply_filters(raw);
        self.update_statistics(self.value);
        self.detect_change()
    }

    /// Records a pin state report; PWM states are normalized.
    pub(crate) fn set_state(&mut self, raw: f64) -> (f64, ValueChange) {
        let state = if self.mode == Some(PinMode::Pwm) {
            raw / self.analog_write_resolution
        } else {
            raw
        };
        self.state = Some(state);
        (state, self.set_value(state))
    }

    /// Resets the statistics to the latest raw input.
    pub fn clear(&mut self) {
        self.minimum = self.pre_filter_value;
        self.maximum = self.pre_filter_value;
        self.average = self.pre_filter_value;
        self.last_value = self.pre_filter_value;
        self.clear_weight();
    }

    fn clear_weight(&mut self) {
        self.sum = self.average;
        self.num_samples = 1;
    }

    fn update_statistics(&mut self, value: f64) {
        self.minimum = self.minimum.min(value);
        self.maximum = self.maximum.max(value);
        self.sum += value;
        self.num_samples += 1;
        self.average = self.sum / self.num_samples as f64;
        if self.num_samples >= MAX_SAMPLES {
            self.clear_weight();
        }
    }

    fn detect_change(&mut self) -> ValueChange {
        let (old, new) = (self.last_value, self.value);
        if old == new {
            return ValueChange::default();
        }
        let change = ValueChange {
            changed: true,
            rising: old <= 0.0 && new > 0.0,
            falling: old > 0.0 && new <= 0.0,
        };
        let pin = self.number;
        self.events.emit(&PinEvent::Change {
            pin,
            value: new,
            last: old,
        });
        if change.rising {
            self.events.emit(&PinEvent::RisingEdge { pin, value: new });
        } else if change.falling {
            self.events.emit(&PinEvent::FallingEdge { pin, value: new });
        }
        change
    }

    // ------------------------------------------------------------------------
    // Filters
    // ------------------------------------------------------------------------

    /// Appends a filter to the chain.
    pub fn add_filter<F: Filter + 'static>(&mut self, filter: F) -> FilterId {
        let id = FilterId(self.next_filter_id);
        self.next_filter_id += 1;
        self.filters.push((id, Box::new(filter)));
        id
    }

    /// Removes one filter. Returns `false` if it was not attached.
    pub fn remove_filter(&mut self, id: FilterId) -> bool {
        let before = self.filters.len();
        self.filters.retain(|(fid, _)| *fid != id);
        self.filters.len() != before
    }

    /// Removes every filter.
    pub fn remove_all_filters(&mut self) {
        self.filters.clear();
    }

    /// Number of attached filters.
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    fn apply_filters(&mut self, raw: f64) -> f64 {
        self.filters
            .iter_mut()
            .fold(raw, |value, (_, filter)| filter.process_sample(value))
    }

    // ------------------------------------------------------------------------
    // Generator
    // ------------------------------------------------------------------------

    /// Attaches a generator, replacing any previous one.
    pub fn set_generator<G: Generator + 'static>(&mut self, generator: G) {
        self.generator = Some(Box::new(generator));
    }

    /// Detaches the generator.
    pub fn remove_generator(&mut self) {
        self.generator = None;
    }

    /// Whether a generator is attached.
    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Polls the generator; finished generators detach themselves.
    pub(crate) fn poll_generator(&mut self, now_ms: u64) -> Option<f64> {
        let generator = self.generator.as_mut()?;
        let next = generator.poll(now_ms);
        if generator.is_finished() {
            self.generator = None;
        }
        next
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Registers a listener for one event kind.
    pub fn on<F>(&mut self, kind: PinEventKind, f: F) -> ListenerId
    where
        F: FnMut(&PinEvent) + Send + 'static,
    {
        self.events.on(kind, f)
    }

    /// Registers a one-shot listener.
    pub fn once<F>(&mut self, kind: PinEventKind, f: F) -> ListenerId
    where
        F: FnOnce(&PinEvent) + Send + 'static,
    {
        self.events.once(kind, f)
    }

    /// Removes a listener.
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Full access to the pin's emitter.
    pub fn events(&mut self) -> &mut EventEmitter<PinEvent> {
        &mut self.events
    }
}

fn max_for_bits(bits: u8) -> f64 {
    2f64.powi(bits as i32) - 1.0
}
