//! Simulated Webduino board.
//!
//! Runs the relay discovery handshake against a scripted transport, then
//! drives a few pins the way an application would:
//! - a PWM pin written directly
//! - a digital output toggled by a square-wave generator
//! - an analog input smoothed by a low-pass filter
//! - a pin state query answered by the "device"
//!
//! # Usage
//!
//! ```sh
//! cargo run --example simulated_board
//! RUST_LOG=debug cargo run --example simulated_board
//! ```

use firmata_board::board::WebArduino;
use firmata_board::hal::{MockClock, MockTransport};
use firmata_board::pin::{LowPass, Oscillator, Waveform};
use firmata_board::{Board, BoardEvent, PinEvent, PinEventKind, PinMode};

fn main() {
    let mut transport = MockTransport::new();
    transport.open();

    let clock = MockClock::new();
    let mut board = Board::with_clock(transport, WebArduino::config("demo"), clock.clone())
        .expect("default relay config is valid")
        .with_handshake(WebArduino::handshake());
    let events = board.subscribe();

    println!("=================================");
    println!("  Simulated Webduino board");
    println!("=================================");
    println!();

    // Discovery is answered locally; the device still reports its ports.
    board.poll();
    board
        .transport_mut()
        .expect("transport present")
        .queue_message(vec![0x90, 0, 0, 0x91, 0, 0, 0x92, 0, 0]);
    board.poll();
    println!(
        "ready={} firmware={} pins={} analog={}",
        board.is_ready(),
        board.firmware_name(),
        board.pin_count(),
        board.analog_pin_count()
    );

    // PWM output
    board.set_digital_pin_mode(3, PinMode::Pwm).expect("pin 3 exists");
    board.write_pin(3, 0.25).expect("pin 3 is an output");

    // Generator-driven digital output
    if let Some(pin) = board.pin_mut(13) {
        pin.on(PinEventKind::RisingEdge, |e| {
            if let PinEvent::RisingEdge { pin, .. } = e {
                println!("pin {pin} went high");
            }
        });
        pin.set_generator(Oscillator::new(Waveform::Square, 200));
    }
    for _ in 0..8 {
        clock.advance(50);
        board.poll();
    }

    // Filtered analog input on channel 0
    board.set_analog_pin_mode(0, PinMode::AnalogInput).expect("channel 0 exists");
    if let Some(pin) = board.analog_pin_mut(0) {
        pin.add_filter(LowPass::new(0.5));
    }
    for raw in [1023u16, 1023, 0] {
        let [lsb, msb] = firmata_board::protocol::to_two_7bit(raw);
        board.transport_mut().expect("transport present").queue_message(vec![0xE0, lsb, msb]);
        board.poll();
    }

    // Pin state query
    let mut query = board.query_pin_state(3).expect("pin 3 exists");
    board
        .transport_mut()
        .expect("transport present")
        .queue_message(vec![0xF0, 0x6E, 3, 3, 63, 0, 0xF7]);
    board.poll();
    if let Some(Ok(report)) = query.try_take() {
        println!("pin 3 reports mode {:?} state {:.2}", report.mode, report.state);
    }

    println!("bytes on the wire: {:02X?}", board.transport().map(|t| t.wire_bytes()));
    board.disconnect();
    board.poll();

    println!();
    for event in events.try_iter() {
        match event {
            BoardEvent::AnalogData { channel, value, .. } => println!("analog {channel}: {value:.3}"),
            other => println!("{other:?}"),
        }
    }
}
