//! Discovery handshake tests over a scripted transport

use firmata_board::{
    board::WebArduino,
    hal::{MockClock, MockTransport},
    Board, BoardConfig, BoardError, BoardEvent, BoardState, PinMode, SerialBootHandshake, SimulatedHandshake,
};

fn open_board(config: BoardConfig) -> Board<MockTransport, MockClock> {
    let mut transport = MockTransport::new();
    transport.open();
    Board::with_clock(transport, config, MockClock::new()).unwrap()
}

fn feed(board: &mut Board<MockTransport, MockClock>, bytes: &[u8]) {
    board.transport_mut().unwrap().queue_message(bytes.to_vec());
    board.poll();
}

const FIRMWARE: &[u8] = &[0xF0, 0x79, 2, 5, b'S', 0, b'F', 0, 0xF7];
const TWO_PINS: &[u8] = &[
    0xF0, 0x6C, 0, 1, 1, 1, 4, 14, 127, 0, 1, 1, 1, 3, 8, 4, 14, 127, 0xF7,
];
const NO_ANALOG: &[u8] = &[0xF0, 0x6A, 127, 127, 0xF7];

// ============================================================================
// Standard handshake
// ============================================================================

#[test]
fn standard_handshake_walks_every_step() {
    let mut board = open_board(BoardConfig::default());
    let events = board.subscribe();

    board.poll();
    assert_eq!(board.state(), BoardState::AwaitingFirmwareVersion);
    assert_eq!(board.transport().unwrap().sent.last().unwrap(), &vec![0xF0, 0x79, 0xF7]);

    feed(&mut board, FIRMWARE);
    assert_eq!(board.state(), BoardState::AwaitingCapabilityResponse);
    assert_eq!(board.transport().unwrap().sent.last().unwrap(), &vec![0xF0, 0x6B, 0xF7]);

    feed(&mut board, TWO_PINS);
    assert_eq!(board.state(), BoardState::AwaitingAnalogMapping);
    assert_eq!(board.transport().unwrap().sent.last().unwrap(), &vec![0xF0, 0x69, 0xF7]);

    feed(&mut board, NO_ANALOG);
    assert!(board.is_ready());
    assert_eq!(board.firmware_name(), "SF");

    let seen: Vec<BoardEvent> = events.try_iter().collect();
    assert!(matches!(&seen[0], BoardEvent::FirmwareName { name, .. } if name == "SF"));
    assert_eq!(seen.last(), Some(&BoardEvent::Ready));
}

#[test]
fn two_pin_capability_table() {
    let mut board = open_board(BoardConfig::default());
    board.poll();
    feed(&mut board, FIRMWARE);
    feed(&mut board, TWO_PINS);

    assert_eq!(board.pin_count(), 2);
    assert_eq!(board.analog_pin_count(), 0);
    for pin in board.pins() {
        assert_eq!(pin.mode(), Some(PinMode::DigitalOutput));
        assert!(pin.supports(PinMode::Servo));
    }
    assert!(!board.pin(0).unwrap().supports(PinMode::Pwm));
    assert_eq!(board.pin(1).unwrap().resolution(PinMode::Pwm), Some(8));
    assert_eq!(board.pin(1).unwrap().analog_write_resolution(), 255.0);

    let caps = board.pin_capabilities();
    assert_eq!(caps[1].get("pwm"), Some(&8));
}

#[test]
fn firmware_older_than_2_3_disconnects() {
    let mut board = open_board(BoardConfig::default());
    let events = board.subscribe();
    board.poll();
    feed(&mut board, &[0xF0, 0x79, 2, 2, 0xF7]);
    board.poll();

    let seen: Vec<BoardEvent> = events.try_iter().collect();
    assert!(seen.contains(&BoardEvent::Error(BoardError::FirmwareTooOld { major: 2, minor: 2 })));
    assert_eq!(seen.last(), Some(&BoardEvent::Disconnect));
    assert_eq!(board.state(), BoardState::Disconnected);
    assert!(!board.is_connected());
}

#[test]
fn firmware_error_text_names_required_version() {
    let err = BoardError::FirmwareTooOld { major: 2, minor: 1 };
    assert!(err.to_string().contains("StandardFirmata version 2.3 or greater"));
}

#[test]
fn serial_boot_answers_unprompted_report() {
    let mut board = open_board(BoardConfig::default()).with_handshake(SerialBootHandshake);
    board.poll();
    assert!(board.transport().unwrap().sent.is_empty());

    feed(&mut board, FIRMWARE);
    assert_eq!(board.state(), BoardState::AwaitingCapabilityResponse);
}

#[test]
fn handshake_frames_split_across_chunks() {
    let mut board = open_board(BoardConfig::default());
    board.poll();
    let stream: Vec<u8> = [FIRMWARE, TWO_PINS].concat();
    for chunk in stream.chunks(3) {
        feed(&mut board, chunk);
    }
    assert_eq!(board.state(), BoardState::AwaitingAnalogMapping);
    assert_eq!(board.pin_count(), 2);
}

#[test]
fn initial_sampling_interval_sent_on_ready() {
    let mut board = open_board(BoardConfig::default().with_sampling_interval_ms(100));
    board.poll();
    feed(&mut board, FIRMWARE);
    feed(&mut board, TWO_PINS);
    feed(&mut board, NO_ANALOG);
    assert!(board.is_ready());
    assert_eq!(board.sampling_interval(), 100);
    assert_eq!(
        board.transport().unwrap().sent.last().unwrap(),
        &vec![0xF0, 0x7A, 100, 0, 0xF7]
    );
}

// ============================================================================
// Relay (simulated) handshake
// ============================================================================

fn relay_board() -> Board<MockTransport, MockClock> {
    open_board(WebArduino::config("dev")).with_handshake(SimulatedHandshake)
}

#[test]
fn relay_discovery_is_answered_locally() {
    let mut board = relay_board();
    board.poll();

    assert_eq!(board.state(), BoardState::AwaitingDigitalReports);
    assert_eq!(board.firmware_name(), SimulatedHandshake::FIRMWARE_NAME);
    assert_eq!(board.pin_count(), SimulatedHandshake::PIN_COUNT);
    assert_eq!(board.analog_pin_count(), SimulatedHandshake::ANALOG_PIN_COUNT);

    // Only the reset and the port reports go to the device.
    let sent = &board.transport().unwrap().sent;
    assert_eq!(
        sent,
        &vec![vec![0xFF], vec![0xD0, 1], vec![0xD1, 1], vec![0xD2, 1]]
    );
}

#[test]
fn relay_layout() {
    let mut board = relay_board();
    board.poll();

    assert_eq!(board.pin(0).unwrap().mode(), None);
    assert_eq!(board.pin(1).unwrap().mode(), None);
    assert_eq!(board.pin(2).unwrap().mode(), Some(PinMode::DigitalOutput));
    assert!(board.pin(3).unwrap().supports(PinMode::Pwm));
    assert!(!board.pin(2).unwrap().supports(PinMode::Pwm));
    assert_eq!(board.pin(14).unwrap().mode(), Some(PinMode::DigitalOutput));
    assert_eq!(board.pin(20).unwrap().mode(), Some(PinMode::AnalogInput));
    for channel in 0..8u8 {
        assert_eq!(board.analog_to_digital(channel), Ok(14 + channel));
    }
    assert_eq!(board.analog_to_digital(8), Err(BoardError::UnknownAnalogChannel(8)));
}

#[test]
fn relay_ready_after_every_port_reports() {
    let mut board = relay_board();
    let events = board.subscribe();
    board.poll();

    feed(&mut board, &[0x90, 0, 0]);
    feed(&mut board, &[0x91, 0, 0]);
    assert!(!board.is_ready());
    feed(&mut board, &[0x92, 0, 0]);
    assert!(board.is_ready());

    // Later port reports do not restart anything.
    feed(&mut board, &[0x90, 0, 0]);
    let ready = events.try_iter().filter(|e| *e == BoardEvent::Ready).count();
    assert_eq!(ready, 1);
}

#[test]
fn relay_handshake_reruns_after_reconnect() {
    let config = WebArduino::config("dev").with_auto_reconnect(true);
    let mut transport = MockTransport::new();
    transport.open();
    let clock = MockClock::new();
    let mut board = Board::with_clock(transport, config, clock.clone())
        .unwrap()
        .with_handshake(SimulatedHandshake)
        .with_connector(|| {
            let mut t = MockTransport::new();
            t.open();
            Ok(t)
        });
    board.poll();
    feed(&mut board, &[0x90, 0, 0, 0x91, 0, 0, 0x92, 0, 0]);
    assert!(board.is_ready());

    board.transport_mut().unwrap().drop_connection();
    board.poll();
    assert_eq!(board.state(), BoardState::Reconnecting);

    clock.advance(board.config().reconnect_interval_ms);
    for _ in 0..500 {
        board.poll();
        if board.transport().is_some() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(2));
    }
    board.poll();
    assert_eq!(board.state(), BoardState::AwaitingDigitalReports);
    assert_eq!(board.pin_count(), SimulatedHandshake::PIN_COUNT);
}
