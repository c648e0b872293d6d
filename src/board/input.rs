//! Inbound frame dispatch.

use std::collections::BTreeMap;

use crate::error::BoardError;
use crate::events::{BoardEvent, FirmwareVersion, PinStateReport};
use crate::framer::{Frame, Framer};
use crate::pin::{Pin, PinMode};
use crate::protocol::{self, PIN_TERMINATOR};
use crate::traits::{Clock, Transport};

use super::{Board, BoardState};

impl<T: Transport, C: Clock> Board<T, C> {
    /// Feeds received bytes through the framer and handles every frame
    /// they complete.
    ///
    /// A handler failure is reported as [`BoardEvent::Error`] and drops
    /// the connection; the rest of the chunk is discarded.
    pub fn process_input(&mut self, bytes: &[u8]) {
        for byte in bytes {
            let Some(frame) = self.framer.push(*byte) else {
                continue;
            };
            if let Err(err) = self.dispatch(frame) {
                self.fail(err);
                return;
            }
        }
    }

    /// Handles locally produced responses queued by the handshake.
    pub(super) fn drain_injected(&mut self) {
        while let Some(bytes) = self.injected.pop_front() {
            for frame in Framer::new().extend(&bytes) {
                if let Err(err) = self.dispatch(frame) {
                    self.fail(err);
                    return;
                }
            }
        }
    }

    fn dispatch(&mut self, frame: Frame) -> Result<(), BoardError> {
        match frame {
            Frame::MultiByte([command, lsb, msb]) => {
                self.process_multi_byte(command, lsb, msb);
                Ok(())
            }
            Frame::Sysex(payload) => self.process_sysex(&payload),
        }
    }

    // ========================================================================
    // Multi-byte commands
    // ========================================================================

    fn process_multi_byte(&mut self, command: u8, lsb: u8, msb: u8) {
        let (command, channel) = if command < 0xF0 {
            (command & 0xF0, command & 0x0F)
        } else {
            (command, 0)
        };
        match command {
            protocol::DIGITAL_MESSAGE => {
                tracing::trace!(port = channel, lsb, msb, "digital message");
                if self.config.handle_digital_pins {
                    self.process_digital_message(channel, lsb, msb);
                }
            }
            protocol::ANALOG_MESSAGE => {
                tracing::trace!(channel, lsb, msb, "analog message");
                self.process_analog_message(channel, lsb, msb);
            }
            protocol::REPORT_VERSION => {
                let version = FirmwareVersion::new(lsb, msb);
                self.firmware_version = Some(version);
                self.events.emit(&BoardEvent::FirmwareVersion(version));
            }
            _ => {}
        }
    }

    fn process_digital_message(&mut self, port: u8, lsb: u8, msb: u8) {
        let bits = protocol::from_two_7bit(lsb, msb);
        let offset = port as usize * 8;
        let end = (offset + 8).min(self.pins.len());

        for index in offset..end {
            let pin = &mut self.pins[index];
            if pin.mode() != Some(PinMode::DigitalInput) {
                continue;
            }
            let bit = f64::from((bits >> (index - offset)) & 1);
            if bit != pin.value() {
                pin.set_value(bit);
                let event = BoardEvent::DigitalData {
                    pin: pin.number(),
                    value: pin.value(),
                };
                self.events.emit(&event);
            }
        }

        if self.state == BoardState::AwaitingDigitalReports {
            self.digital_report_requests = self.digital_report_requests.saturating_sub(1);
            if self.digital_report_requests == 0 {
                self.startup();
            }
        }
    }

    fn process_analog_message(&mut self, channel: u8, lsb: u8, msb: u8) {
        let ready = self.is_ready();
        let Some(pin) = self
            .analog_map
            .get(&channel)
            .copied()
            .and_then(|index| self.pins.get_mut(index))
        else {
            return;
        };

        let raw = protocol::from_two_7bit(lsb, msb) as f64;
        let change = pin.set_value(raw / pin.analog_read_resolution());
        if change.changed {
            if ready {
                pin.set_analog_reporting(true);
            }
            let event = BoardEvent::AnalogData {
                pin: pin.number(),
                channel,
                value: pin.value(),
            };
            self.events.emit(&event);
        }
    }

    // ========================================================================
    // Sysex
    // ========================================================================

    fn process_sysex(&mut self, payload: &[u8]) -> Result<(), BoardError> {
        let Some(&command) = payload.first() else {
            return Ok(());
        };
        match command {
            protocol::REPORT_FIRMWARE => return self.process_firmware_report(payload),
            protocol::STRING_DATA => {
                let message = protocol::decode_7bit_string(&payload[1..]);
                self.events.emit(&BoardEvent::StringMessage(message));
            }
            protocol::CAPABILITY_RESPONSE => self.process_capability_response(payload),
            protocol::ANALOG_MAPPING_RESPONSE => self.process_analog_mapping(payload),
            protocol::PIN_STATE_RESPONSE => self.process_pin_state_response(payload),
            _ => {
                self.events.emit(&BoardEvent::SysexMessage(payload.to_vec()));
            }
        }
        Ok(())
    }

    fn process_firmware_report(&mut self, msg: &[u8]) -> Result<(), BoardError> {
        let major = msg.get(1).copied().unwrap_or(0);
        let minor = msg.get(2).copied().unwrap_or(0);
        let version = FirmwareVersion::new(major, minor);
        self.firmware_name = protocol::decode_7bit_string(msg.get(3..).unwrap_or_default());
        self.firmware_version = Some(version);

        tracing::debug!(name = %self.firmware_name, %version, "firmware report");
        self.events.emit(&BoardEvent::FirmwareName {
            name: self.firmware_name.clone(),
            version,
        });

        if self.state != BoardState::AwaitingFirmwareVersion {
            return Ok(());
        }
        if !version.supports_capability_query() {
            return Err(BoardError::FirmwareTooOld { major, minor });
        }
        self.state = BoardState::AwaitingCapabilityResponse;
        tracing::debug!("querying capabilities");
        let step = self.handshake.query_capabilities();
        self.exchange(step);
        Ok(())
    }

    fn process_capability_response(&mut self, msg: &[u8]) {
        self.pins.clear();
        self.analog_map.clear();
        self.i2c_pins.clear();

        let mut capabilities = BTreeMap::new();
        let mut first_mode = None;
        let mut analog_pins = 0u8;
        let mut i = 1;

        while i < msg.len() {
            if msg[i] == PIN_TERMINATOR {
                let Ok(number) = u8::try_from(self.pins.len()) else {
                    break;
                };
                let mut pin = Pin::new(number, initial_mode(&capabilities, first_mode));
                pin.set_capabilities(std::mem::take(&mut capabilities));
                if pin.supports(PinMode::AnalogInput) {
                    self.analog_map.insert(analog_pins, self.pins.len());
                    analog_pins = analog_pins.saturating_add(1);
                }
                if pin.supports(PinMode::I2c) {
                    self.i2c_pins.push(number);
                }
                self.pins.push(pin);
                first_mode = None;
                i += 1;
            } else {
                // An unpaired trailing mode byte is dropped.
                if let Some(&bits) = msg.get(i + 1) {
                    capabilities.insert(msg[i], bits);
                    first_mode = first_mode.or_else(|| PinMode::from_u8(msg[i]));
                }
                i += 2;
            }
        }

        self.total_analog_pins = analog_pins as usize;
        self.digital_ports = vec![0; self.pins.len().div_ceil(8)];
        tracing::info!(
            pins = self.pins.len(),
            analog_pins = self.total_analog_pins,
            i2c_pins = self.i2c_pins.len(),
            "capabilities received"
        );

        if self.state == BoardState::AwaitingCapabilityResponse {
            self.state = BoardState::AwaitingAnalogMapping;
        }
        let step = self.handshake.query_analog_mapping();
        self.exchange(step);
    }

    fn process_analog_mapping(&mut self, msg: &[u8]) {
        for (index, &channel) in msg.iter().enumerate().skip(1) {
            if channel == PIN_TERMINATOR {
                continue;
            }
            let pin_index = index - 1;
            if let Some(pin) = self.pins.get_mut(pin_index) {
                pin.set_analog_number(channel);
                self.analog_map.insert(channel, pin_index);
            }
        }
        tracing::debug!(channels = self.analog_map.len(), "analog mapping received");

        if self.state != BoardState::AwaitingAnalogMapping {
            return;
        }
        if self.config.initial_reset {
            self.system_reset();
        }
        if self.config.handle_digital_pins {
            self.state = BoardState::AwaitingDigitalReports;
            self.enable_digital_pins();
            if self.digital_report_requests == 0 {
                self.startup();
            }
        } else {
            self.startup();
        }
    }

    fn process_pin_state_response(&mut self, msg: &[u8]) {
        let (Some(&number), Some(&mode)) = (msg.get(1), msg.get(2)) else {
            return;
        };
        let Some(outstanding) = self.pin_state_requests.get_mut(&number) else {
            tracing::trace!(pin = number, "unsolicited pin state response ignored");
            return;
        };
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.pin_state_requests.remove(&number);
        }
        let raw = protocol::from_7bit_bytes(msg.get(3..).unwrap_or_default());
        let Some(pin) = self.pins.get_mut(number as usize) else {
            tracing::warn!(pin = number, "pin state response for unknown pin");
            return;
        };

        if let Some(mode) = PinMode::from_u8(mode) {
            if pin.mode() != Some(mode) {
                pin.set_mode(mode);
            }
        }
        let (state, _) = pin.set_state(raw as f64);
        let report = PinStateReport {
            pin: number,
            mode: pin.mode(),
            state,
        };

        for waiter in self.pin_state_waiters.remove(&number).unwrap_or_default() {
            let _ = waiter.send(report.clone());
        }
        self.events.emit(&BoardEvent::PinStateResponse(report));
    }

    pub(super) fn startup(&mut self) {
        self.state = BoardState::Ready;
        if let Some(ms) = self.config.sampling_interval_ms {
            if let Err(err) = self.set_sampling_interval(ms) {
                tracing::warn!(error = %err, "sampling interval not applied");
            }
        }
        tracing::info!(
            firmware = %self.firmware_name,
            pins = self.pins.len(),
            "Board ready"
        );
        self.events.emit(&BoardEvent::Ready);
    }
}

/// Digital output wins over analog input; otherwise the first mode listed.
fn initial_mode(capabilities: &BTreeMap<u8, u8>, first: Option<PinMode>) -> Option<PinMode> {
    if capabilities.contains_key(&PinMode::DigitalOutput.as_u8()) {
        Some(PinMode::DigitalOutput)
    } else if capabilities.contains_key(&PinMode::AnalogInput.as_u8()) {
        Some(PinMode::AnalogInput)
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoardConfig;
    use crate::hal::{MockClock, MockTransport};

    fn board_at(state: BoardState, config: BoardConfig) -> Board<MockTransport, MockClock> {
        let mut transport = MockTransport::new();
        transport.open();
        let mut board = Board::with_clock(transport, config, MockClock::new()).unwrap();
        board.poll();
        board.state = state;
        board
    }

    fn capabilities(board: &mut Board<MockTransport, MockClock>, rows: &[&[u8]]) {
        let mut msg = vec![0xF0, 0x6C];
        for row in rows {
            msg.extend_from_slice(row);
            msg.push(127);
        }
        msg.push(0xF7);
        board.process_input(&msg);
    }

    #[test]
    fn initial_mode_preference() {
        let both = BTreeMap::from([(1, 1), (2, 10)]);
        assert_eq!(initial_mode(&both, Some(PinMode::DigitalOutput)), Some(PinMode::DigitalOutput));
        let analog = BTreeMap::from([(0, 1), (2, 10)]);
        assert_eq!(initial_mode(&analog, Some(PinMode::DigitalInput)), Some(PinMode::AnalogInput));
        let i2c = BTreeMap::from([(6, 1)]);
        assert_eq!(initial_mode(&i2c, Some(PinMode::I2c)), Some(PinMode::I2c));
        assert_eq!(initial_mode(&BTreeMap::new(), None), None);
    }

    #[test]
    fn capability_response_builds_pins() {
        let mut b = board_at(BoardState::AwaitingCapabilityResponse, BoardConfig::default());
        capabilities(&mut b, &[&[], &[0, 1, 1, 1, 3, 8], &[0, 1, 2, 10], &[6, 1]]);

        assert_eq!(b.pin_count(), 4);
        assert_eq!(b.pin(0).unwrap().mode(), None);
        assert_eq!(b.pin(1).unwrap().mode(), Some(PinMode::DigitalOutput));
        assert_eq!(b.pin(1).unwrap().analog_write_resolution(), 255.0);
        assert_eq!(b.pin(2).unwrap().mode(), Some(PinMode::AnalogInput));
        assert_eq!(b.analog_pin(0).unwrap().number(), 2);
        assert_eq!(b.analog_pin_count(), 1);
        assert_eq!(b.i2c_pins(), &[3]);
        assert_eq!(b.state(), BoardState::AwaitingAnalogMapping);
        assert_eq!(b.transport().unwrap().sent.last().unwrap(), &vec![0xF0, 0x69, 0xF7]);
    }

    #[test]
    fn analog_mapping_with_reset_and_digital_reports() {
        let config = BoardConfig::default()
            .with_initial_reset(true)
            .with_handle_digital_pins(true);
        let mut b = board_at(BoardState::AwaitingCapabilityResponse, config);
        let digital: &[u8] = &[0, 1, 1, 1];
        capabilities(&mut b, &[digital; 10]);
        b.process_input(&[0xF0, 0x6A, 127, 127, 127, 127, 127, 127, 127, 127, 0, 1, 0xF7]);

        assert_eq!(b.pin(8).unwrap().analog_number(), Some(0));
        assert_eq!(b.analog_pin(1).unwrap().number(), 9);
        assert_eq!(b.state(), BoardState::AwaitingDigitalReports);

        let sent = &b.transport().unwrap().sent;
        let tail: Vec<_> = sent.iter().rev().take(3).rev().cloned().collect();
        assert_eq!(tail, vec![vec![0xFF], vec![0xD0, 1], vec![0xD1, 1]]);

        b.process_input(&[0x90, 0, 0]);
        assert!(!b.is_ready());
        b.process_input(&[0x91, 0, 0]);
        assert!(b.is_ready());
    }

    #[test]
    fn digital_message_updates_inputs_only() {
        let config = BoardConfig::default().with_handle_digital_pins(true);
        let mut b = board_at(BoardState::Ready, config);
        capabilities(&mut b, &[&[0, 1, 1, 1], &[0, 1, 1, 1], &[0, 1, 1, 1]]);
        b.pins[0].set_mode(PinMode::DigitalInput);
        b.pins[2].set_mode(PinMode::DigitalInput);
        b.state = BoardState::Ready;
        let rx = b.subscribe();

        b.process_input(&[0x90, 0b111, 0]);
        assert_eq!(b.pin(0).unwrap().value(), 1.0);
        assert_eq!(b.pin(1).unwrap().value(), 0.0);
        assert_eq!(b.pin(2).unwrap().value(), 1.0);

        let pins: Vec<u8> = rx
            .try_iter()
            .filter_map(|e| match e {
                BoardEvent::DigitalData { pin, .. } => Some(pin),
                _ => None,
            })
            .collect();
        assert_eq!(pins, vec![0, 2]);

        // Unchanged bits emit nothing.
        b.process_input(&[0x90, 0b111, 0]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn digital_message_ignored_without_handling() {
        let mut b = board_at(BoardState::Ready, BoardConfig::default());
        capabilities(&mut b, &[&[0, 1]]);
        b.state = BoardState::Ready;
        b.process_input(&[0x90, 1, 0]);
        assert_eq!(b.pin(0).unwrap().value(), 0.0);
    }

    #[test]
    fn zero_bit_analog_resolution_keeps_default_scale() {
        let mut b = board_at(BoardState::Ready, BoardConfig::default());
        capabilities(&mut b, &[&[2, 0, 3, 0]]);
        b.state = BoardState::Ready;

        let [lsb, msb] = protocol::to_two_7bit(1023);
        b.process_input(&[0xE0, lsb, msb]);

        let pin = b.analog_pin(0).unwrap();
        assert!(pin.value().is_finite());
        assert_eq!(pin.value(), 1.0);
        assert_eq!(pin.analog_write_resolution(), 255.0);
    }

    #[test]
    fn analog_message_scales_and_marks_reporting() {
        let mut b = board_at(BoardState::Ready, BoardConfig::default());
        capabilities(&mut b, &[&[2, 10]]);
        b.state = BoardState::Ready;
        let rx = b.subscribe();

        let [lsb, msb] = protocol::to_two_7bit(1023);
        b.process_input(&[0xE0, lsb, msb]);

        let pin = b.analog_pin(0).unwrap();
        assert_eq!(pin.value(), 1.0);
        assert!(pin.is_analog_reporting());
        assert_eq!(
            rx.try_recv().unwrap(),
            BoardEvent::AnalogData {
                pin: 0,
                channel: 0,
                value: 1.0
            }
        );
    }

    #[test]
    fn analog_message_for_unknown_channel_is_ignored() {
        let mut b = board_at(BoardState::Ready, BoardConfig::default());
        let rx = b.subscribe();
        b.process_input(&[0xE3, 1, 0]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn version_report() {
        let mut b = board_at(BoardState::Ready, BoardConfig::default());
        let rx = b.subscribe();
        b.process_input(&[0xF9, 2, 5]);
        assert_eq!(b.firmware_version(), Some(FirmwareVersion::new(2, 5)));
        assert_eq!(
            rx.try_recv().unwrap(),
            BoardEvent::FirmwareVersion(FirmwareVersion::new(2, 5))
        );
    }

    #[test]
    fn firmware_name_is_replaced_not_appended() {
        let mut b = board_at(BoardState::Ready, BoardConfig::default());
        b.process_input(&[0xF0, 0x79, 2, 5, b'a', 0, b'b', 0, 0xF7]);
        b.process_input(&[0xF0, 0x79, 2, 5, b'c', 0, 0xF7]);
        assert_eq!(b.firmware_name(), "c");
    }

    #[test]
    fn old_firmware_fails_handshake() {
        let mut b = board_at(BoardState::AwaitingFirmwareVersion, BoardConfig::default());
        let rx = b.subscribe();
        b.process_input(&[0xF0, 0x79, 2, 2, 0xF7]);
        b.poll();

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(events[0], BoardEvent::FirmwareName { .. }));
        assert_eq!(
            events[1],
            BoardEvent::Error(BoardError::FirmwareTooOld { major: 2, minor: 2 })
        );
        assert_eq!(events.last(), Some(&BoardEvent::Disconnect));
    }

    #[test]
    fn string_and_unknown_sysex() {
        let mut b = board_at(BoardState::Ready, BoardConfig::default());
        let rx = b.subscribe();
        b.process_input(&[0xF0, 0x71, b'h', 0, b'i', 0, 0xF7]);
        b.process_input(&[0xF0, 0x42, 1, 2, 0xF7]);
        assert_eq!(rx.try_recv().unwrap(), BoardEvent::StringMessage("hi".into()));
        assert_eq!(rx.try_recv().unwrap(), BoardEvent::SysexMessage(vec![0x42, 1, 2]));
    }

    #[test]
    fn unsolicited_pin_state_is_ignored() {
        let mut b = board_at(BoardState::Ready, BoardConfig::default());
        capabilities(&mut b, &[&[0, 1, 1, 1]]);
        let rx = b.subscribe();
        b.process_input(&[0xF0, 0x6E, 0, 1, 1, 0xF7]);
        assert!(rx.try_recv().is_err());
        assert_eq!(b.pin(0).unwrap().state(), None);
    }

    #[test]
    fn pin_state_response_only_settles_its_own_pin() {
        let mut b = board_at(BoardState::Ready, BoardConfig::default());
        capabilities(&mut b, &[&[0, 1, 1, 1], &[0, 1, 1, 1]]);
        let mut query = b.query_pin_state(0).unwrap();

        b.process_input(&[0xF0, 0x6E, 1, 1, 1, 0xF7]);
        assert_eq!(b.pending_pin_state_requests(), 1);
        assert_eq!(b.pin(1).unwrap().state(), None);
        assert!(query.try_take().is_none());

        b.process_input(&[0xF0, 0x6E, 0, 1, 0, 0xF7]);
        assert_eq!(b.pending_pin_state_requests(), 0);
        assert_eq!(query.try_take().unwrap().unwrap().state, 0.0);
    }
}
