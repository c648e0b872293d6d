//! Sample filters applied to every value a pin receives.
//!
//! Filters run in the order they were added; each sees the output of the
//! previous one. Any `FnMut(f64) -> f64 + Send` closure is a filter.
//!
//! ```rust
//! use firmata_board::pin::{Filter, MovingAverage};
//!
//! let mut avg = MovingAverage::new(2);
//! assert_eq!(avg.process_sample(4.0), 4.0);
//! assert_eq!(avg.process_sample(2.0), 3.0);
//!
//! let mut double = |x: f64| x * 2.0;
//! assert_eq!(double.process_sample(1.5), 3.0);
//! ```

use std::collections::VecDeque;

/// A stateful numeric transform.
pub trait Filter: Send {
    /// Transforms one sample.
    fn process_sample(&mut self, sample: f64) -> f64;
}

impl<F> Filter for F
where
    F: FnMut(f64) -> f64 + Send,
{
    fn process_sample(&mut self, sample: f64) -> f64 {
        self(sample)
    }
}

/// Handle for removing a filter from a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(pub(crate) u64);

/// Mean of the last `size` samples.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: VecDeque<f64>,
    size: usize,
}

impl MovingAverage {
    /// Creates a filter averaging up to `size` samples (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            window: VecDeque::with_capacity(size),
            size,
        }
    }
}

impl Filter for MovingAverage {
    fn process_sample(&mut self, sample: f64) -> f64 {
        if self.window.len() == self.size {
            self.window.pop_front();
        }
        self.window.push_back(sample);
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }
}

/// Exponential smoothing: `y = y + alpha * (x - y)`.
#[derive(Debug, Clone)]
pub struct LowPass {
    alpha: f64,
    last: Option<f64>,
}

impl LowPass {
    /// Creates a filter; `alpha` is clamped to `(0, 1]`.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            last: None,
        }
    }
}

impl Filter for LowPass {
    fn process_sample(&mut self, sample: f64) -> f64 {
        let next = match self.last {
            Some(prev) => prev + self.alpha * (sample - prev),
            None => sample,
        };
        self.last = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_average_window_slides() {
        let mut f = MovingAverage::new(3);
        f.process_sample(3.0);
        f.process_sample(6.0);
        assert_eq!(f.process_sample(9.0), 6.0);
        assert_eq!(f.process_sample(0.0), 5.0);
    }

    #[test]
    fn moving_average_zero_size_is_passthrough() {
        let mut f = MovingAverage::new(0);
        assert_eq!(f.process_sample(7.0), 7.0);
        assert_eq!(f.process_sample(1.0), 1.0);
    }

    #[test]
    fn low_pass_converges() {
        let mut f = LowPass::new(0.5);
        assert_eq!(f.process_sample(0.0), 0.0);
        assert_eq!(f.process_sample(1.0), 0.5);
        assert_eq!(f.process_sample(1.0), 0.75);
    }

    #[test]
    fn closures_are_filters() {
        let mut offset = 0.0;
        let mut f = move |x: f64| {
            offset += 1.0;
            x + offset
        };
        assert_eq!(f.process_sample(1.0), 2.0);
        assert_eq!(f.process_sample(1.0), 3.0);
    }
}
