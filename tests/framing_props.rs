//! Property tests for framing and capability discovery

use firmata_board::{
    hal::{MockClock, MockTransport},
    Board, BoardConfig, BoardEvent, Frame, Framer, PinMode,
};
use proptest::prelude::*;

/// A well-formed inbound frame. Firmware reports are left out: an old
/// version drops the connection, which ends a chunk early.
fn frame() -> impl Strategy<Value = Vec<u8>> {
    let sysex_command = (0u8..0x80).prop_filter("firmware report", |c| *c != 0x79);
    prop_oneof![
        (0u8..16, 0u8..0x80, 0u8..0x80).prop_map(|(ch, lsb, msb)| vec![0xE0 | ch, lsb, msb]),
        (0u8..16, 0u8..0x80, 0u8..0x80).prop_map(|(port, lsb, msb)| vec![0x90 | port, lsb, msb]),
        (sysex_command, proptest::collection::vec(0u8..0x80, 0..12)).prop_map(|(cmd, data)| {
            let mut v = vec![0xF0, cmd];
            v.extend(data);
            v.push(0xF7);
            v
        }),
    ]
}

fn split(stream: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (stream.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();
    let mut chunks = Vec::new();
    let mut start = 0;
    for p in points.into_iter().chain([stream.len()]) {
        chunks.push(stream[start..p].to_vec());
        start = p;
    }
    chunks
}

proptest! {
    #[test]
    fn framing_is_chunk_invariant(
        frames in proptest::collection::vec(frame(), 1..20),
        cuts in proptest::collection::vec(any::<usize>(), 0..10),
    ) {
        let stream: Vec<u8> = frames.concat();
        let whole = Framer::new().extend(&stream);

        let mut framer = Framer::new();
        let chunked: Vec<Frame> = split(&stream, &cuts)
            .iter()
            .flat_map(|chunk| framer.extend(chunk))
            .collect();

        prop_assert_eq!(whole.len(), frames.len());
        prop_assert_eq!(whole, chunked);
    }

    #[test]
    fn board_events_are_chunk_invariant(
        frames in proptest::collection::vec(frame(), 1..20),
        cuts in proptest::collection::vec(any::<usize>(), 0..10),
    ) {
        let stream: Vec<u8> = frames.concat();
        let run = |chunks: Vec<Vec<u8>>| -> Vec<BoardEvent> {
            let mut transport = MockTransport::new();
            transport.open();
            let mut board = Board::with_clock(transport, BoardConfig::default(), MockClock::new()).unwrap();
            board.poll();
            let rx = board.subscribe();
            for chunk in chunks {
                board.process_input(&chunk);
            }
            rx.try_iter().collect()
        };

        prop_assert_eq!(run(vec![stream.clone()]), run(split(&stream, &cuts)));
    }

    #[test]
    fn pin_count_matches_terminators(
        rows in proptest::collection::vec(
            proptest::collection::vec((0u8..9, 0u8..17), 0..5),
            0..40,
        ),
    ) {
        let mut msg = vec![0xF0, 0x6C];
        for row in &rows {
            for (mode, bits) in row {
                msg.extend_from_slice(&[*mode, *bits]);
            }
            msg.push(127);
        }
        msg.push(0xF7);

        let mut transport = MockTransport::new();
        transport.open();
        let mut board = Board::with_clock(transport, BoardConfig::default(), MockClock::new()).unwrap();
        board.poll();
        board.process_input(&msg);

        let analog = rows
            .iter()
            .filter(|row| row.iter().any(|(mode, _)| *mode == PinMode::AnalogInput.as_u8()))
            .count();
        prop_assert_eq!(board.pin_count(), rows.len());
        prop_assert_eq!(board.analog_pin_count(), analog);
        for (pin, row) in board.pins().iter().zip(&rows) {
            let has_output = row.iter().any(|(m, _)| *m == PinMode::DigitalOutput.as_u8());
            prop_assert_eq!(pin.mode() == Some(PinMode::DigitalOutput), has_output);
            prop_assert_eq!(pin.mode().is_none(), row.is_empty());
        }
    }
}
