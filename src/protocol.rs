//! Firmata wire constants and outbound frame builders.
//!
//! Every integer that does not fit in seven bits is split into 7-bit
//! bytes, least significant first, so the stream stays 7-bit clean
//! except for command bytes.
//!
//! ```text
//! multi-byte:  [command | channel, lsb, msb]
//! sysex:       [0xF0, sub-command, payload..., 0xF7]
//! ```
//!
//! # Example
//!
//! ```rust
//! use firmata_board::protocol;
//!
//! assert_eq!(protocol::set_pin_mode(13, 1), vec![0xF4, 13, 1]);
//! assert_eq!(protocol::sampling_interval(500), vec![0xF0, 0x7A, 0x74, 0x03, 0xF7]);
//! ```

// ============================================================================
// Command bytes
// ============================================================================

/// Digital port report / write, port in the low nibble.
pub const DIGITAL_MESSAGE: u8 = 0x90;
/// Analog channel report / write, channel in the low nibble.
pub const ANALOG_MESSAGE: u8 = 0xE0;
/// Enable or disable analog reporting for a channel.
pub const REPORT_ANALOG: u8 = 0xC0;
/// Enable or disable digital reporting for a port.
pub const REPORT_DIGITAL: u8 = 0xD0;
/// Set a pin's mode.
pub const SET_PIN_MODE: u8 = 0xF4;
/// Protocol version report.
pub const REPORT_VERSION: u8 = 0xF9;
/// System reset.
pub const SYSEX_RESET: u8 = 0xFF;
/// Sysex frame start.
pub const START_SYSEX: u8 = 0xF0;
/// Sysex frame end.
pub const END_SYSEX: u8 = 0xF7;

// ============================================================================
// Sysex sub-commands
// ============================================================================

/// Analog mapping query.
pub const ANALOG_MAPPING_QUERY: u8 = 0x69;
/// Analog mapping response.
pub const ANALOG_MAPPING_RESPONSE: u8 = 0x6A;
/// Capability query.
pub const CAPABILITY_QUERY: u8 = 0x6B;
/// Capability response.
pub const CAPABILITY_RESPONSE: u8 = 0x6C;
/// Pin state query.
pub const PIN_STATE_QUERY: u8 = 0x6D;
/// Pin state response.
pub const PIN_STATE_RESPONSE: u8 = 0x6E;
/// Analog write for pins above 15 or values wider than 14 bits.
pub const EXTENDED_ANALOG: u8 = 0x6F;
/// Servo pulse range configuration.
pub const SERVO_CONFIG: u8 = 0x70;
/// String message.
pub const STRING_DATA: u8 = 0x71;
/// Firmware name and version.
pub const REPORT_FIRMWARE: u8 = 0x79;
/// Sampling interval.
pub const SAMPLING_INTERVAL: u8 = 0x7A;

/// Marks the end of a pin in capability and analog-mapping responses.
pub const PIN_TERMINATOR: u8 = 127;

/// Default servo minimum pulse width in microseconds.
pub const SERVO_MIN_PULSE: u16 = 544;
/// Default servo maximum pulse width in microseconds.
pub const SERVO_MAX_PULSE: u16 = 2400;

/// Lower bound for an explicitly set sampling interval.
pub const MIN_SAMPLING_INTERVAL: u32 = 20;
/// Upper bound for an explicitly set sampling interval.
pub const MAX_SAMPLING_INTERVAL: u32 = 15000;
/// Sampling interval assumed before one is set.
pub const DEFAULT_SAMPLING_INTERVAL: u32 = 19;

// ============================================================================
// 7-bit helpers
// ============================================================================

/// Combine two 7-bit bytes into a 14-bit value.
pub fn from_two_7bit(lsb: u8, msb: u8) -> u16 {
    (lsb as u16 & 0x7F) | ((msb as u16 & 0x7F) << 7)
}

/// Split a 14-bit value into `[lsb, msb]`.
pub fn to_two_7bit(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

/// Decode a little-endian run of 7-bit bytes into an integer.
pub fn from_7bit_bytes(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .enumerate()
        .fold(0, |acc, (i, b)| acc | ((*b as u32 & 0x7F) << (7 * i)))
}

/// Decode pairs of 7-bit bytes into a string.
///
/// An unpaired trailing byte is ignored. Invalid code units become
/// U+FFFD.
pub fn decode_7bit_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| from_two_7bit(pair[0], pair[1]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Encode a string as pairs of 7-bit bytes, one pair per UTF-16 unit.
///
/// Units wider than 14 bits lose their top bits.
pub fn encode_7bit_string(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .flat_map(|unit| [(unit & 0x7F) as u8, ((unit >> 7) & 0x7F) as u8])
        .collect()
}

// ============================================================================
// Frame builders
// ============================================================================

/// Wrap a sub-command and payload in sysex delimiters.
pub fn sysex(command: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(data.len() + 3);
    frame.push(START_SYSEX);
    frame.push(command);
    frame.extend_from_slice(data);
    frame.push(END_SYSEX);
    frame
}

/// `[F0, 79, F7]`
pub fn report_firmware() -> Vec<u8> {
    sysex(REPORT_FIRMWARE, &[])
}

/// `[F0, 6B, F7]`
pub fn capability_query() -> Vec<u8> {
    sysex(CAPABILITY_QUERY, &[])
}

/// `[F0, 69, F7]`
pub fn analog_mapping_query() -> Vec<u8> {
    sysex(ANALOG_MAPPING_QUERY, &[])
}

/// `[F0, 6D, pin, F7]`
pub fn pin_state_query(pin: u8) -> Vec<u8> {
    sysex(PIN_STATE_QUERY, &[pin])
}

/// `[F9]`
pub fn report_version() -> Vec<u8> {
    vec![REPORT_VERSION]
}

/// `[FF]`
pub fn system_reset() -> Vec<u8> {
    vec![SYSEX_RESET]
}

/// `[F4, pin, mode]`
pub fn set_pin_mode(pin: u8, mode: u8) -> Vec<u8> {
    vec![SET_PIN_MODE, pin, mode]
}

/// `[D0 | port, on]`
pub fn report_digital(port: u8, enable: bool) -> Vec<u8> {
    vec![REPORT_DIGITAL | (port & 0x0F), enable as u8]
}

/// `[C0 | channel, on]`
pub fn report_analog(channel: u8, enable: bool) -> Vec<u8> {
    vec![REPORT_ANALOG | (channel & 0x0F), enable as u8]
}

/// Packed digital port write.
pub fn digital_port(port: u8, value: u8) -> Vec<u8> {
    vec![
        DIGITAL_MESSAGE | (port & 0x0F),
        value & 0x7F,
        (value >> 7) & 0x7F,
    ]
}

/// Compact analog write for pins 0..=15 and values up to 14 bits.
pub fn analog_write(pin: u8, value: u16) -> Vec<u8> {
    let [lsb, msb] = to_two_7bit(value);
    vec![ANALOG_MESSAGE | (pin & 0x0F), lsb, msb]
}

/// Extended analog write; the third 7-bit byte is present only for
/// values of 2^14 and above.
pub fn extended_analog(pin: u8, value: u32) -> Vec<u8> {
    let mut data = vec![pin, (value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8];
    if value >= 1 << 14 {
        data.push(((value >> 14) & 0x7F) as u8);
    }
    sysex(EXTENDED_ANALOG, &data)
}

/// Servo pulse range configuration.
pub fn servo_config(pin: u8, min_pulse: u16, max_pulse: u16) -> Vec<u8> {
    let [min_lsb, min_msb] = to_two_7bit(min_pulse);
    let [max_lsb, max_msb] = to_two_7bit(max_pulse);
    sysex(SERVO_CONFIG, &[pin, min_lsb, min_msb, max_lsb, max_msb])
}

/// Sampling interval in milliseconds.
pub fn sampling_interval(interval_ms: u16) -> Vec<u8> {
    sysex(SAMPLING_INTERVAL, &to_two_7bit(interval_ms))
}

/// String message, one 7-bit pair per UTF-16 unit.
pub fn string_data(s: &str) -> Vec<u8> {
    sysex(STRING_DATA, &encode_7bit_string(s))
}
