//! Per-platform discovery handshake.
//!
//! Every board runs the same discovery sequence once its transport opens:
//!
//! 1. firmware name and version (`REPORT_FIRMWARE`)
//! 2. pin capabilities (`CAPABILITY_QUERY`)
//! 3. analog channel mapping (`ANALOG_MAPPING_QUERY`)
//!
//! Platforms differ only in how each step is started. A [`Handshake`]
//! answers each step with an [`Exchange`]: send a query to the device,
//! feed a canned response back into the board as if the device had sent
//! it, or do nothing and wait for the device to speak first.
//!
//! | Strategy | `begin` | queries |
//! |----------|---------|---------|
//! | [`StandardHandshake`] | send `REPORT_FIRMWARE` | sent to the device |
//! | [`SerialBootHandshake`] | wait for the boot report | sent to the device |
//! | [`SimulatedHandshake`] | inject firmware report | injected locally |
//!
//! # Example
//!
//! ```rust
//! use firmata_board::board::handshake::{Exchange, Handshake, SerialBootHandshake};
//!
//! let mut handshake = SerialBootHandshake;
//! assert_eq!(handshake.begin(), Exchange::Wait);
//! assert_eq!(handshake.query_capabilities(), Exchange::Send(vec![0xF0, 0x6B, 0xF7]));
//! ```

use crate::protocol;

/// What the board should do to advance one handshake step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// Send these bytes to the device.
    Send(Vec<u8>),
    /// Process these bytes as if the device had sent them.
    Inject(Vec<u8>),
    /// Nothing to do; the device will report on its own.
    Wait,
}

/// Strategy for starting each discovery step.
///
/// Every method has the standard behavior as its default, so a strategy
/// only overrides the steps it changes.
pub trait Handshake: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// First step after the transport opens.
    fn begin(&mut self) -> Exchange {
        self.report_firmware()
    }

    /// Firmware name and version request.
    fn report_firmware(&mut self) -> Exchange {
        Exchange::Send(protocol::report_firmware())
    }

    /// Capability request.
    fn query_capabilities(&mut self) -> Exchange {
        Exchange::Send(protocol::capability_query())
    }

    /// Analog mapping request.
    fn query_analog_mapping(&mut self) -> Exchange {
        Exchange::Send(protocol::analog_mapping_query())
    }
}

impl<H: Handshake + ?Sized> Handshake for Box<H> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn begin(&mut self) -> Exchange {
        (**self).begin()
    }

    fn report_firmware(&mut self) -> Exchange {
        (**self).report_firmware()
    }

    fn query_capabilities(&mut self) -> Exchange {
        (**self).query_capabilities()
    }

    fn query_analog_mapping(&mut self) -> Exchange {
        (**self).query_analog_mapping()
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Queries the device for every step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardHandshake;

impl Handshake for StandardHandshake {
    fn name(&self) -> &'static str {
        "standard"
    }
}

/// StandardFirmata over USB serial resets on connect and announces its
/// firmware unprompted, so the first request is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBootHandshake;

impl Handshake for SerialBootHandshake {
    fn name(&self) -> &'static str {
        "serial-boot"
    }

    fn begin(&mut self) -> Exchange {
        Exchange::Wait
    }
}

/// Answers discovery locally with the fixed layout of a Webduino board.
///
/// The board behind the relay is never asked; the firmware, capability
/// and mapping responses below are fed straight back into the board.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedHandshake;

impl SimulatedHandshake {
    /// Sketch name reported by the canned firmware response.
    pub const FIRMWARE_NAME: &'static str = "webduino.ino";

    /// Pins described by the canned capability response.
    pub const PIN_COUNT: usize = 22;

    /// Analog-capable pins described by the canned capability response.
    pub const ANALOG_PIN_COUNT: usize = 8;

    /// Firmware 2.4, "webduino.ino".
    pub fn firmware_response() -> Vec<u8> {
        let mut data = vec![2, 4];
        data.extend(protocol::encode_7bit_string(Self::FIRMWARE_NAME));
        protocol::sysex(protocol::REPORT_FIRMWARE, &data)
    }

    /// 22 pins: two without capabilities, twelve digital (six of them
    /// PWM), six analog inputs that also work as digital I/O, and two
    /// analog-only inputs.
    pub fn capability_response() -> Vec<u8> {
        const DIGITAL: &[u8] = &[0, 1, 1, 1, 4, 14, 127];
        const DIGITAL_PWM: &[u8] = &[0, 1, 1, 1, 3, 8, 4, 14, 127];
        const ANALOG_DIGITAL: &[u8] = &[0, 1, 1, 1, 2, 10, 4, 14, 127];
        const ANALOG_ONLY: &[u8] = &[2, 10, 127];
        const PWM_LAYOUT: [bool; 12] = [
            false, true, false, true, true, false, false, true, true, true, false, false,
        ];

        let mut data = vec![127, 127];
        for pwm in PWM_LAYOUT {
            data.extend_from_slice(if pwm { DIGITAL_PWM } else { DIGITAL });
        }
        for _ in 0..6 {
            data.extend_from_slice(ANALOG_DIGITAL);
        }
        for _ in 0..2 {
            data.extend_from_slice(ANALOG_ONLY);
        }
        protocol::sysex(protocol::CAPABILITY_RESPONSE, &data)
    }

    /// Channels 0..8 on pins 14..22.
    pub fn analog_mapping_response() -> Vec<u8> {
        let mut data = vec![protocol::PIN_TERMINATOR; 14];
        data.extend(0..Self::ANALOG_PIN_COUNT as u8);
        protocol::sysex(protocol::ANALOG_MAPPING_RESPONSE, &data)
    }
}

impl Handshake for SimulatedHandshake {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn report_firmware(&mut self) -> Exchange {
        Exchange::Inject(Self::firmware_response())
    }

    fn query_capabilities(&mut self) -> Exchange {
        Exchange::Inject(Self::capability_response())
    }

    fn query_analog_mapping(&mut self) -> Exchange {
        Exchange::Inject(Self::analog_mapping_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_queries_device() {
        let mut h = StandardHandshake;
        assert_eq!(h.begin(), Exchange::Send(vec![0xF0, 0x79, 0xF7]));
        assert_eq!(h.query_analog_mapping(), Exchange::Send(vec![0xF0, 0x69, 0xF7]));
    }

    #[test]
    fn canned_firmware_bytes() {
        assert_eq!(
            SimulatedHandshake::firmware_response(),
            vec![
                240, 121, 2, 4, 119, 0, 101, 0, 98, 0, 100, 0, 117, 0, 105, 0, 110, 0, 111, 0,
                46, 0, 105, 0, 110, 0, 111, 0, 247
            ]
        );
    }

    #[test]
    fn canned_capability_layout() {
        let msg = SimulatedHandshake::capability_response();
        assert_eq!(&msg[..4], &[240, 108, 127, 127]);
        assert_eq!(&msg[4..11], &[0, 1, 1, 1, 4, 14, 127]);
        assert_eq!(&msg[11..20], &[0, 1, 1, 1, 3, 8, 4, 14, 127]);
        assert_eq!(&msg[msg.len() - 7..], &[2, 10, 127, 2, 10, 127, 247]);

        let terminators = msg[2..msg.len() - 1]
            .iter()
            .filter(|b| **b == protocol::PIN_TERMINATOR)
            .count();
        assert_eq!(terminators, SimulatedHandshake::PIN_COUNT);
    }

    #[test]
    fn canned_mapping() {
        let msg = SimulatedHandshake::analog_mapping_response();
        assert_eq!(msg.len(), 2 + 22 + 1);
        assert_eq!(&msg[16..24], &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn simulated_begin_injects() {
        let mut h = SimulatedHandshake;
        assert!(matches!(h.begin(), Exchange::Inject(_)));
    }
}
