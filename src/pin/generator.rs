//! Autonomous value sources for simulated or synthetic pins.
//!
//! A [`Generator`] is polled with the current time on every board tick
//! and returns a value whenever it has a new one. Two built-ins:
//!
//! | Generator | Output |
//! |-----------|--------|
//! | [`Oscillator`] | periodic square, sine, triangle, or sawtooth wave |
//! | [`Ramp`] | one-shot transition between two values, then finishes |
//!
//! ```rust
//! use firmata_board::pin::{Generator, Oscillator, Waveform};
//!
//! let mut osc = Oscillator::new(Waveform::Square, 1000).with_interval(100);
//! assert_eq!(osc.poll(0), Some(1.0));
//! assert_eq!(osc.poll(50), None);      // not due yet
//! assert_eq!(osc.poll(600), Some(0.0)); // second half of the period
//! ```

use std::f64::consts::PI;

/// A periodic value source.
pub trait Generator: Send {
    /// Returns a new value if one is due at `now_ms`.
    fn poll(&mut self, now_ms: u64) -> Option<f64>;

    /// Whether the generator will never produce another value.
    fn is_finished(&self) -> bool {
        false
    }
}

// ============================================================================
// Oscillator
// ============================================================================

/// Wave shape for [`Oscillator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Waveform {
    /// High for the first half of the period, low for the second.
    Square,
    /// Sine, starting at the midpoint and rising.
    Sine,
    /// Linear rise then fall, starting at the low point.
    Triangle,
    /// Linear rise, then an instant drop.
    Sawtooth,
}

impl Waveform {
    /// Wave value in `[-1, 1]` at `phase` in `[0, 1)`.
    pub fn sample(&self, phase: f64) -> f64 {
        match self {
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sine => (2.0 * PI * phase).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

/// Periodic waveform generator.
///
/// Output is `offset + amplitude * wave`, so the defaults (amplitude and
/// offset 0.5) swing between 0 and 1.
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    period_ms: u64,
    amplitude: f64,
    offset: f64,
    interval_ms: u64,
    started_ms: Option<u64>,
    last_emit_ms: u64,
}

impl Oscillator {
    /// Creates an oscillator emitting every 50ms.
    pub fn new(waveform: Waveform, period_ms: u64) -> Self {
        Self {
            waveform,
            period_ms: period_ms.max(1),
            amplitude: 0.5,
            offset: 0.5,
            interval_ms: 50,
            started_ms: None,
            last_emit_ms: 0,
        }
    }

    /// Sets the peak deviation from the offset.
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Sets the centre value.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the emit cadence.
    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms.max(1);
        self
    }

    /// Output value `elapsed_ms` after start.
    pub fn value_at(&self, elapsed_ms: u64) -> f64 {
        let phase = (elapsed_ms % self.period_ms) as f64 / self.period_ms as f64;
        self.offset + self.amplitude * self.waveform.sample(phase)
    }
}

impl Generator for Oscillator {
    fn poll(&mut self, now_ms: u64) -> Option<f64> {
        let start = match self.started_ms {
            Some(start) => start,
            None => {
                self.started_ms = Some(now_ms);
                self.last_emit_ms = now_ms;
                return Some(self.value_at(0));
            }
        };
        if now_ms.saturating_sub(self.last_emit_ms) < self.interval_ms {
            return None;
        }
        self.last_emit_ms = now_ms;
        Some(self.value_at(now_ms.saturating_sub(start)))
    }
}

// ============================================================================
// Ramp
// ============================================================================

/// Easing curve for [`Ramp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Curve {
    /// Constant rate.
    #[default]
    Linear,
    /// Smoothstep: `t² × (3 - 2t)`.
    EaseInOut,
}

impl Curve {
    fn apply(&self, t: f64) -> f64 {
        match self {
            Curve::Linear => t,
            Curve::EaseInOut => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Moves from one value to another over a fixed duration.
#[derive(Debug, Clone)]
pub struct Ramp {
    from: f64,
    to: f64,
    duration_ms: u64,
    curve: Curve,
    interval_ms: u64,
    started_ms: Option<u64>,
    last_emit_ms: u64,
    finished: bool,
}

impl Ramp {
    /// Creates a linear ramp emitting every 20ms.
    pub fn new(from: f64, to: f64, duration_ms: u64) -> Self {
        Self {
            from,
            to,
            duration_ms,
            curve: Curve::Linear,
            interval_ms: 20,
            started_ms: None,
            last_emit_ms: 0,
            finished: false,
        }
    }

    /// Sets the easing curve.
    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    /// Sets the emit cadence.
    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms.max(1);
        self
    }

    /// Value `elapsed_ms` after start.
    pub fn value_at(&self, elapsed_ms: u64) -> f64 {
        if self.duration_ms == 0 || elapsed_ms >= self.duration_ms {
            return self.to;
        }
        let t = elapsed_ms as f64 / self.duration_ms as f64;
        self.from + (self.to - self.from) * self.curve.apply(t)
    }
}

impl Generator for Ramp {
    fn poll(&mut self, now_ms: u64) -> Option<f64> {
        if self.finished {
            return None;
        }
        let start = *self.started_ms.get_or_insert(now_ms);
        let elapsed = now_ms.saturating_sub(start);
        let due = elapsed == 0 || now_ms.saturating_sub(self.last_emit_ms) >= self.interval_ms;
        if !due && elapsed < self.duration_ms {
            return None;
        }
        self.last_emit_ms = now_ms;
        if elapsed >= self.duration_ms {
            self.finished = true;
        }
        Some(self.value_at(elapsed))
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
