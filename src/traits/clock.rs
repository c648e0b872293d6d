//! Time source abstraction.

/// Time source for the board's timing decisions.
///
/// The board reads time only through this trait: the duplicate-send
/// window, generator polling, and reconnect back-off. Tests swap in
/// [`MockClock`](crate::hal::MockClock).
///
/// # Example
///
/// ```rust
/// use firmata_board::traits::Clock;
/// use firmata_board::hal::MockClock;
///
/// let clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock: Send {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}
