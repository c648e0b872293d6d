//! Outbound commands.
//!
//! Every frame leaves through [`Board::send`], which drops frames while
//! the transport is closed and suppresses identical frames inside the
//! sending interval.

use tokio::sync::oneshot;

use crate::config::check_sampling_interval;
use crate::error::{BoardError, TransportError};
use crate::events::PinStateReport;
use crate::pin::{PinMode, ValueChange, HIGH, LOW};
use crate::protocol::{self, SERVO_MAX_PULSE, SERVO_MIN_PULSE};
use crate::traits::{Clock, Transport};

use super::query::{PinRead, PinStateFuture};
use super::Board;

/// Largest value the compact analog message carries.
const MAX_COMPACT_ANALOG: u32 = 0x3FFF;

/// Largest value the extended analog message accepts.
const MAX_EXTENDED_ANALOG: u32 = 0xFFFF;

impl<T: Transport, C: Clock> Board<T, C> {
    // ========================================================================
    // Raw output
    // ========================================================================

    /// Sends raw bytes.
    ///
    /// Dropped silently while disconnected, and dropped when the same
    /// bytes already went out within the sending interval.
    pub fn send(&mut self, bytes: &[u8]) {
        self.transmit(bytes);
    }

    /// Like [`send`](Self::send); reports whether the bytes reached the
    /// transport.
    fn transmit(&mut self, bytes: &[u8]) -> bool {
        if !self.is_connected() {
            return false;
        }
        let now = self.clock.now_ms();
        if !self.send_window.should_send(bytes, now) {
            tracing::trace!(?bytes, "duplicate send suppressed");
            return false;
        }
        match self.transport.as_mut() {
            Some(transport) => {
                transport.send(bytes);
                true
            }
            None => false,
        }
    }

    /// Pushes buffered bytes onto the wire.
    pub fn flush(&mut self) {
        if !self.is_connected() {
            return;
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.flush();
        }
    }

    /// Sends a sysex frame with `command` and raw `data`.
    pub fn send_sysex(&mut self, command: u8, data: &[u8]) {
        self.send(&protocol::sysex(command, data));
    }

    /// Sends a string message.
    pub fn send_string(&mut self, s: &str) {
        self.send(&protocol::string_data(s));
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Asks for the firmware name and version.
    pub fn report_firmware(&mut self) {
        let step = self.handshake.report_firmware();
        self.exchange(step);
    }

    /// Asks for the capability table.
    pub fn query_capabilities(&mut self) {
        let step = self.handshake.query_capabilities();
        self.exchange(step);
    }

    /// Asks for the analog channel mapping.
    pub fn query_analog_mapping(&mut self) {
        let step = self.handshake.query_analog_mapping();
        self.exchange(step);
    }

    /// Asks for the protocol version.
    pub fn report_version(&mut self) {
        self.send(&protocol::report_version());
    }

    /// Resets the firmware to its power-on state.
    pub fn system_reset(&mut self) {
        self.send(&protocol::system_reset());
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    /// Turns on reporting for every digital port.
    ///
    /// Before the board is ready, each request is counted and the
    /// handshake completes once every port has answered.
    pub fn enable_digital_pins(&mut self) {
        self.report_digital_ports(true);
    }

    /// Turns off reporting for every digital port.
    pub fn disable_digital_pins(&mut self) {
        self.report_digital_ports(false);
    }

    fn report_digital_ports(&mut self, enable: bool) {
        for port in 0..self.digital_ports.len() {
            let Ok(port) = u8::try_from(port) else {
                break;
            };
            self.send(&protocol::report_digital(port, enable));
            if enable && !self.is_ready() {
                self.digital_report_requests += 1;
            }
        }
    }

    /// Turns on reporting for one analog channel.
    pub fn enable_analog_pin(&mut self, channel: u8) -> Result<(), BoardError> {
        self.report_analog_pin(channel, true)
    }

    /// Turns off reporting for one analog channel.
    pub fn disable_analog_pin(&mut self, channel: u8) -> Result<(), BoardError> {
        self.report_analog_pin(channel, false)
    }

    fn report_analog_pin(&mut self, channel: u8, enable: bool) -> Result<(), BoardError> {
        let index = *self
            .analog_map
            .get(&channel)
            .ok_or(BoardError::UnknownAnalogChannel(channel as usize))?;
        self.send(&protocol::report_analog(channel, enable));
        self.pins[index].set_analog_reporting(enable);
        Ok(())
    }

    /// Current sampling interval in milliseconds.
    pub fn sampling_interval(&self) -> u32 {
        self.sampling_interval
    }

    /// Sets how often the firmware samples analog inputs.
    ///
    /// Rejects intervals outside 20..=15000 ms without sending anything.
    pub fn set_sampling_interval(&mut self, ms: u32) -> Result<(), BoardError> {
        check_sampling_interval(ms)?;
        self.sampling_interval = ms;
        // Range-checked above, always fits.
        let ms = u16::try_from(ms).unwrap_or(u16::MAX);
        self.send(&protocol::sampling_interval(ms));
        Ok(())
    }

    /// Window for suppressing identical frames, in milliseconds.
    pub fn sending_interval(&self) -> u64 {
        self.send_window.window_ms()
    }

    /// Sets the duplicate-suppression window; 0 disables it.
    pub fn set_sending_interval(&mut self, ms: u64) {
        self.send_window.set_window_ms(ms);
    }

    // ========================================================================
    // Pin modes
    // ========================================================================

    /// Sends a raw pin mode frame without touching the local pin.
    pub fn set_pin_mode(&mut self, pin: u8, mode: u8) {
        self.send(&protocol::set_pin_mode(pin, mode));
    }

    /// Switches a pin to `mode` on both sides.
    pub fn set_digital_pin_mode(&mut self, pin: u8, mode: PinMode) -> Result<(), BoardError> {
        let index = self.pin_index(pin)?;
        self.pins[index].set_mode(mode);
        self.set_pin_mode(pin, mode.as_u8());
        Ok(())
    }

    /// Switches the pin serving an analog channel to `mode`.
    pub fn set_analog_pin_mode(&mut self, channel: u8, mode: PinMode) -> Result<(), BoardError> {
        let pin = self.analog_to_digital(channel)?;
        self.set_digital_pin_mode(pin, mode)
    }

    /// Enables the internal pull-up of a digital input.
    pub fn enable_pull_up(&mut self, pin: u8) -> Result<(), BoardError> {
        self.send_digital_data(pin, HIGH)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Drives one digital pin, updating the cached port byte.
    pub fn send_digital_data(&mut self, pin: u8, value: f64) -> Result<(), BoardError> {
        let on = if value == HIGH {
            true
        } else if value == LOW {
            false
        } else {
            return Err(BoardError::InvalidDigitalValue(value));
        };
        let port = (pin / 8) as usize;
        let mask = 1u8 << (pin % 8);
        let byte = self
            .digital_ports
            .get_mut(port)
            .ok_or(BoardError::UnknownPin(pin as usize))?;
        if on {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
        let byte = *byte;
        self.send_digital_port(port as u8, byte);
        Ok(())
    }

    /// Writes a whole port at once.
    pub fn send_digital_port(&mut self, port: u8, value: u8) {
        self.send(&protocol::digital_port(port, value));
    }

    /// Writes a normalized `0.0..=1.0` value scaled by the pin's PWM
    /// resolution.
    ///
    /// Pins above 15 and values above 14 bits use the extended analog
    /// message.
    pub fn send_analog_data(&mut self, pin: u8, value: f64) -> Result<(), BoardError> {
        let index = self.pin_index(pin)?;
        let resolution = self.pins[index].analog_write_resolution();
        let scaled = (value * resolution).clamp(0.0, resolution) as u32;

        if pin > 15 || scaled > MAX_COMPACT_ANALOG {
            self.send_extended_analog_data(pin, scaled)
        } else {
            self.send(&protocol::analog_write(pin, scaled as u16));
            Ok(())
        }
    }

    /// Writes a raw value with the extended analog message.
    pub fn send_extended_analog_data(&mut self, pin: u8, value: u32) -> Result<(), BoardError> {
        if value > MAX_EXTENDED_ANALOG {
            return Err(BoardError::ExtendedAnalogTooWide(value));
        }
        self.send(&protocol::extended_analog(pin, value));
        Ok(())
    }

    /// Moves a servo; ignored unless the pin is in servo mode and the
    /// value differs from the previous one.
    pub fn send_servo_data(&mut self, pin: u8, value: f64) -> Result<(), BoardError> {
        let index = self.pin_index(pin)?;
        let pin_ref = &self.pins[index];
        if pin_ref.mode() == Some(PinMode::Servo) && pin_ref.last_value() != value {
            self.send_analog_data(pin, value)?;
        }
        Ok(())
    }

    /// Configures a servo with the default 544..2400 µs pulse range.
    pub fn send_servo_attach(&mut self, pin: u8) -> Result<(), BoardError> {
        self.send_servo_attach_with(pin, SERVO_MIN_PULSE, SERVO_MAX_PULSE)
    }

    /// Configures a servo with a custom pulse range.
    pub fn send_servo_attach_with(&mut self, pin: u8, min_pulse: u16, max_pulse: u16) -> Result<(), BoardError> {
        let index = self.pin_index(pin)?;
        self.send(&protocol::servo_config(pin, min_pulse, max_pulse));
        self.pins[index].set_mode(PinMode::Servo);
        Ok(())
    }

    /// Assigns a value to an output pin and forwards it to the device
    /// when it changed.
    ///
    /// Digital outputs accept only 0 or 1; the pin keeps its value when
    /// the write is rejected.
    pub fn write_pin(&mut self, pin: u8, value: f64) -> Result<ValueChange, BoardError> {
        let index = self.pin_index(pin)?;
        let mode = self.pins[index].mode();
        if !self.pins[index].is_output() {
            return Err(BoardError::NotAnOutput(pin));
        }
        if mode == Some(PinMode::DigitalOutput) && value != HIGH && value != LOW {
            return Err(BoardError::InvalidDigitalValue(value));
        }
        let change = self.pins[index].set_value(value);
        if change.changed {
            self.forward(index)?;
        }
        Ok(change)
    }

    /// Sends the current value of an output pin in the form its mode
    /// requires.
    pub(super) fn forward(&mut self, index: usize) -> Result<(), BoardError> {
        let pin = &self.pins[index];
        let (number, value) = (pin.number(), pin.value());
        match pin.mode() {
            Some(PinMode::DigitalOutput) => self.send_digital_data(number, value),
            Some(PinMode::Pwm) => self.send_analog_data(number, value),
            Some(PinMode::Servo) => self.send_servo_data(number, value),
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Reads a pin.
    ///
    /// Outputs ask the device for their state. Analog inputs turn on
    /// reporting the first time and answer with the last reported value;
    /// other inputs answer from the cache.
    pub fn read_pin(&mut self, pin: u8) -> Result<PinRead, BoardError> {
        let index = self.pin_index(pin)?;
        let pin_ref = &self.pins[index];
        match pin_ref.mode() {
            Some(PinMode::DigitalOutput | PinMode::Pwm | PinMode::Servo) => {
                self.query_pin_state(pin).map(PinRead::Query)
            }
            Some(PinMode::AnalogInput) => {
                let value = pin_ref.value();
                if let (false, Some(channel)) = (pin_ref.is_analog_reporting(), pin_ref.analog_number()) {
                    self.enable_analog_pin(channel)?;
                }
                Ok(PinRead::Value(value))
            }
            _ => Ok(PinRead::Value(pin_ref.value())),
        }
    }

    /// Asks the device for one pin's mode and state.
    ///
    /// Fails with [`TransportError::Closed`] when there is no open
    /// transport to carry the query.
    pub fn query_pin_state(&mut self, pin: u8) -> Result<PinStateFuture, BoardError> {
        self.pin_index(pin)?;
        if !self.is_connected() {
            return Err(TransportError::Closed.into());
        }
        let sent = self.transmit(&protocol::pin_state_query(pin));
        Ok(self.register_pin_state_waiter(pin, sent))
    }

    /// Queries several pins with a single write.
    ///
    /// Nothing is sent if any pin is unknown or the transport is closed.
    pub fn query_pin_states(&mut self, pins: &[u8]) -> Result<Vec<PinStateFuture>, BoardError> {
        for pin in pins {
            self.pin_index(*pin)?;
        }
        if !self.is_connected() {
            return Err(TransportError::Closed.into());
        }
        let bytes: Vec<u8> = pins.iter().flat_map(|pin| protocol::pin_state_query(*pin)).collect();
        let sent = self.transmit(&bytes);
        Ok(pins.iter().map(|pin| self.register_pin_state_waiter(*pin, sent)).collect())
    }

    /// Waits for the next response for `pin`. A query the send window
    /// dropped joins the one still in flight, or is answered from the
    /// pin's cached state when nothing is in flight.
    fn register_pin_state_waiter(&mut self, pin: u8, sent: bool) -> PinStateFuture {
        let (tx, rx) = oneshot::channel();
        if sent {
            *self.pin_state_requests.entry(pin).or_default() += 1;
        }
        if self.pin_state_requests.contains_key(&pin) {
            self.pin_state_waiters.entry(pin).or_default().push(tx);
        } else {
            let cached = &self.pins[pin as usize];
            let report = PinStateReport {
                pin,
                mode: cached.mode(),
                state: cached.state().unwrap_or(cached.value()),
            };
            let _ = tx.send(report);
        }
        PinStateFuture::new(pin, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardState;
    use crate::config::BoardConfig;
    use crate::error::ConfigError;
    use crate::hal::{MockClock, MockTransport};

    /// Ready board with `n` digital pins; pin 1 is also PWM and pin 2 also
    /// analog channel 0.
    fn ready_board(n: usize) -> Board<MockTransport, MockClock> {
        let mut transport = MockTransport::new();
        transport.open();
        let mut b = Board::with_clock(transport, BoardConfig::default(), MockClock::new()).unwrap();
        b.poll();

        let mut msg = vec![0xF0, 0x6C];
        for i in 0..n {
            msg.extend_from_slice(&[0, 1, 1, 1, 4, 14]);
            if i == 1 {
                msg.extend_from_slice(&[3, 8]);
            }
            if i == 2 {
                msg.extend_from_slice(&[2, 10]);
            }
            msg.push(127);
        }
        msg.push(0xF7);
        b.process_input(&msg);
        b.state = BoardState::Ready;
        b.transport_mut().unwrap().sent.clear();
        b
    }

    fn sent(b: &Board<MockTransport, MockClock>) -> Vec<Vec<u8>> {
        b.transport().unwrap().sent.clone()
    }

    #[test]
    fn sends_are_dropped_while_disconnected() {
        let mut b = Board::with_clock(MockTransport::new(), BoardConfig::default(), MockClock::new()).unwrap();
        b.send(&[0xFF]);
        assert!(sent(&b).is_empty());
    }

    #[test]
    fn duplicate_sends_inside_window() {
        let mut b = ready_board(2);
        b.set_sending_interval(100);
        assert_eq!(b.sending_interval(), 100);

        b.send(&[0xF9]);
        b.clock().advance(50);
        b.send(&[0xF9]);
        assert_eq!(sent(&b).len(), 1);

        b.clock().advance(100);
        b.send(&[0xF9]);
        assert_eq!(sent(&b).len(), 2);
    }

    #[test]
    fn digital_writes_track_port_byte() {
        let mut b = ready_board(10);
        b.send_digital_data(3, HIGH).unwrap();
        b.send_digital_data(7, HIGH).unwrap();
        b.send_digital_data(3, LOW).unwrap();
        b.send_digital_data(9, HIGH).unwrap();
        assert_eq!(
            sent(&b),
            vec![
                vec![0x90, 0b0000_1000, 0],
                vec![0x90, 0b0000_1000, 1],
                vec![0x90, 0, 1],
                vec![0x91, 0b10, 0],
            ]
        );
    }

    #[test]
    fn invalid_digital_value_is_rejected() {
        let mut b = ready_board(2);
        assert_eq!(b.send_digital_data(0, 0.5), Err(BoardError::InvalidDigitalValue(0.5)));
        assert_eq!(b.send_digital_data(40, 1.0), Err(BoardError::UnknownPin(40)));
        assert!(sent(&b).is_empty());
    }

    #[test]
    fn analog_write_scales_by_resolution() {
        let mut b = ready_board(20);
        b.send_analog_data(1, 0.5).unwrap();
        b.send_analog_data(1, 2.0).unwrap();
        b.send_analog_data(17, 1.0).unwrap();
        assert_eq!(
            sent(&b),
            vec![
                vec![0xE1, 127, 0],
                vec![0xE1, 127, 1],
                vec![0xF0, 0x6F, 17, 127, 1, 0xF7],
            ]
        );
    }

    #[test]
    fn extended_analog_is_limited_to_sixteen_bits() {
        let mut b = ready_board(2);
        b.send_extended_analog_data(0, 0xFFFF).unwrap();
        assert_eq!(sent(&b), vec![vec![0xF0, 0x6F, 0, 127, 127, 3, 0xF7]]);
        assert_eq!(
            b.send_extended_analog_data(0, 0x1_0000),
            Err(BoardError::ExtendedAnalogTooWide(0x1_0000))
        );
    }

    #[test]
    fn sampling_interval_is_range_checked() {
        let mut b = ready_board(2);
        assert_eq!(b.sampling_interval(), 19);
        b.set_sampling_interval(100).unwrap();
        assert_eq!(b.sampling_interval(), 100);
        assert_eq!(sent(&b), vec![vec![0xF0, 0x7A, 100, 0, 0xF7]]);

        let err = b.set_sampling_interval(10).unwrap_err();
        assert!(matches!(err, BoardError::Config(ConfigError::SamplingInterval { .. })));
        assert_eq!(b.sampling_interval(), 100);
    }

    #[test]
    fn pin_modes() {
        let mut b = ready_board(4);
        b.set_digital_pin_mode(1, PinMode::Pwm).unwrap();
        b.set_analog_pin_mode(0, PinMode::AnalogInput).unwrap();
        b.set_pin_mode(3, 0x0B);
        assert_eq!(b.pin(1).unwrap().mode(), Some(PinMode::Pwm));
        assert_eq!(b.pin(2).unwrap().mode(), Some(PinMode::AnalogInput));
        assert_eq!(b.pin(3).unwrap().mode(), Some(PinMode::DigitalOutput));
        assert_eq!(
            sent(&b),
            vec![vec![0xF4, 1, 3], vec![0xF4, 2, 2], vec![0xF4, 3, 0x0B]]
        );
        assert_eq!(
            b.set_analog_pin_mode(5, PinMode::AnalogInput),
            Err(BoardError::UnknownAnalogChannel(5))
        );
    }

    #[test]
    fn analog_reporting_toggles() {
        let mut b = ready_board(4);
        b.enable_analog_pin(0).unwrap();
        assert!(b.analog_pin(0).unwrap().is_analog_reporting());
        b.disable_analog_pin(0).unwrap();
        assert!(!b.analog_pin(0).unwrap().is_analog_reporting());
        assert_eq!(sent(&b), vec![vec![0xC0, 1], vec![0xC0, 0]]);
        assert_eq!(b.enable_analog_pin(3), Err(BoardError::UnknownAnalogChannel(3)));
    }

    #[test]
    fn servo_attach_and_move() {
        let mut b = ready_board(4);
        b.send_servo_attach(1).unwrap();
        assert_eq!(b.pin(1).unwrap().mode(), Some(PinMode::Servo));
        assert_eq!(sent(&b), vec![vec![0xF0, 0x70, 1, 32, 4, 96, 18, 0xF7]]);

        b.write_pin(1, 1.0).unwrap();
        assert_eq!(sent(&b).last().unwrap(), &vec![0xE1, 127, 1]);

        // Not a servo: nothing sent.
        let before = sent(&b).len();
        b.send_servo_data(0, 0.5).unwrap();
        assert_eq!(sent(&b).len(), before);
    }

    #[test]
    fn write_pin_forwards_changes_only() {
        let mut b = ready_board(2);
        let change = b.write_pin(0, 1.0).unwrap();
        assert!(change.rising);
        let change = b.write_pin(0, 1.0).unwrap();
        assert!(!change.changed);
        assert_eq!(sent(&b), vec![vec![0x90, 1, 0]]);

        assert_eq!(b.write_pin(0, 0.3), Err(BoardError::InvalidDigitalValue(0.3)));
        assert_eq!(b.pin(0).unwrap().value(), 1.0);
    }

    #[test]
    fn write_pin_rejects_inputs() {
        let mut b = ready_board(4);
        b.set_digital_pin_mode(0, PinMode::DigitalInput).unwrap();
        assert_eq!(b.write_pin(0, 1.0), Err(BoardError::NotAnOutput(0)));
        assert_eq!(b.write_pin(9, 1.0), Err(BoardError::UnknownPin(9)));
    }

    #[test]
    fn read_analog_input_enables_reporting() {
        let mut b = ready_board(4);
        b.set_analog_pin_mode(0, PinMode::AnalogInput).unwrap();
        b.transport_mut().unwrap().sent.clear();

        let mut read = b.read_pin(2).unwrap();
        assert_eq!(read.try_take(), Some(Ok(0.0)));
        assert_eq!(sent(&b), vec![vec![0xC0, 1]]);

        b.read_pin(2).unwrap();
        assert_eq!(sent(&b).len(), 1);
    }

    #[test]
    fn read_output_queries_state() {
        let mut b = ready_board(4);
        let mut read = b.read_pin(0).unwrap();
        assert!(matches!(read, PinRead::Query(_)));
        assert_eq!(sent(&b), vec![vec![0xF0, 0x6D, 0, 0xF7]]);

        b.process_input(&[0xF0, 0x6E, 0, 1, 1, 0xF7]);
        assert_eq!(read.try_take(), Some(Ok(1.0)));
    }

    #[test]
    fn query_pin_state_resolves_and_restores_counter() {
        let mut b = ready_board(4);
        let mut query = b.query_pin_state(3).unwrap();
        assert_eq!(b.pending_pin_state_requests(), 1);
        assert!(query.try_take().is_none());

        b.process_input(&[0xF0, 0x6E, 3, 3, 0x7F, 0x01, 0xF7]);
        let report = query.try_take().unwrap().unwrap();
        assert_eq!(report.pin, 3);
        // PWM states are normalized by the write resolution.
        assert_eq!(report.mode, Some(PinMode::Pwm));
        assert_eq!(report.state, 1.0);
        assert_eq!(b.pending_pin_state_requests(), 0);
    }

    #[test]
    fn batched_queries_share_one_send() {
        let mut b = ready_board(4);
        let queries = b.query_pin_states(&[0, 1]).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(sent(&b), vec![vec![0xF0, 0x6D, 0, 0xF7, 0xF0, 0x6D, 1, 0xF7]]);
        assert_eq!(b.pending_pin_state_requests(), 2);

        assert_eq!(b.query_pin_states(&[0, 8]).unwrap_err(), BoardError::UnknownPin(8));
        assert_eq!(b.pending_pin_state_requests(), 2);
    }

    #[test]
    fn query_on_closed_transport_fails_fast() {
        let mut b = ready_board(4);
        b.disconnect();
        b.poll();
        assert_eq!(
            b.query_pin_state(2).unwrap_err(),
            BoardError::Transport(TransportError::Closed)
        );
        assert_eq!(
            b.query_pin_states(&[0, 1]).unwrap_err(),
            BoardError::Transport(TransportError::Closed)
        );
        assert!(matches!(b.read_pin(0), Err(BoardError::Transport(TransportError::Closed))));
        assert_eq!(b.pending_pin_state_requests(), 0);
    }

    #[test]
    fn suppressed_repeat_query_joins_the_one_in_flight() {
        let mut b = ready_board(4);
        b.set_sending_interval(100);
        let mut first = b.query_pin_state(0).unwrap();
        let mut second = b.query_pin_state(0).unwrap();
        assert_eq!(sent(&b).len(), 1);
        assert_eq!(b.pending_pin_state_requests(), 1);

        b.process_input(&[0xF0, 0x6E, 0, 1, 1, 0xF7]);
        assert_eq!(first.try_take().unwrap().unwrap().state, 1.0);
        assert_eq!(second.try_take().unwrap().unwrap().state, 1.0);
        assert_eq!(b.pending_pin_state_requests(), 0);

        // Dropped again, but nothing is in flight: answered from cache.
        let mut third = b.query_pin_state(0).unwrap();
        assert_eq!(sent(&b).len(), 1);
        let report = third.try_take().unwrap().unwrap();
        assert_eq!(report.mode, Some(PinMode::DigitalOutput));
        assert_eq!(report.state, 1.0);
        assert_eq!(b.pending_pin_state_requests(), 0);
    }

    #[test]
    fn disconnect_cancels_queries() {
        let mut b = ready_board(4);
        let mut query = b.query_pin_state(1).unwrap();
        b.disconnect();
        b.poll();
        assert_eq!(query.try_take(), Some(Err(BoardError::QueryCancelled(1))));
    }

    #[test]
    fn generators_drive_outputs() {
        use crate::pin::{Oscillator, Waveform};

        let mut b = ready_board(2);
        b.pin_mut(0).unwrap().set_generator(Oscillator::new(Waveform::Square, 100));
        b.poll();
        assert_eq!(b.pin(0).unwrap().value(), 1.0);
        b.clock().advance(60);
        b.poll();
        assert_eq!(b.pin(0).unwrap().value(), 0.0);
        assert_eq!(b.transport().unwrap().sent_with(0x90), vec![&vec![0x90, 1, 0], &vec![0x90, 0, 0]]);
    }
}
