//! Trait definitions for transports and time.
//!
//! # Submodules
//!
//! - `transport`: the duplex byte channel every medium implements
//! - `clock`: time source used for de-duplication, generators, and
//!   reconnect back-off
//!
//! Concrete implementations live in [`crate::hal`].

pub mod clock;
pub mod transport;

pub use clock::*;
pub use transport::*;
