//! One-dimensional smoothers for intensity-over-time profiles.
//!
//! The elution peak detector is generic over [`Smoother`], defaulting to
//! [`LowessSmoother`].
use std::collections::VecDeque;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::stats::median;

/// A smoothing procedure for a signal sampled at sorted, possibly irregular, `time` points.
pub trait Smoother: Send + Sync {
    /// Smooth `intensity` over `time` with a local window spanning `window_size` points.
    ///
    /// Implementations must return an array the same length as `intensity`.
    fn smooth(&self, time: &[f64], intensity: &[f64], window_size: usize) -> Vec<f64>;
}

/// Locally weighted linear regression (LOWESS) using a tricube distance kernel over
/// the `window_size` nearest neighbors of each point.
///
/// With `robustness_iterations > 0`, each further pass down-weights points by the
/// bisquare of their residual relative to six times the median absolute residual.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LowessSmoother {
    pub robustness_iterations: usize,
}

/// Widens the kernel so the farthest neighbor keeps a small positive weight
const KERNEL_EXPANSION: f64 = 1.001;

fn tricube(u: f64) -> f64 {
    if u >= 1.0 {
        0.0
    } else {
        let t = 1.0 - u * u * u;
        t * t * t
    }
}

const ROBUSTNESS_TOLERANCE: f64 = 1e-7;

fn robustness_weight(residual: f64, scale: f64) -> f64 {
    let r = residual.abs();
    if r <= 0.001 * scale {
        1.0
    } else if r > 0.999 * scale {
        0.0
    } else {
        let u = r / scale;
        let t = 1.0 - u * u;
        t * t
    }
}

impl LowessSmoother {
    pub fn new(robustness_iterations: usize) -> Self {
        Self {
            robustness_iterations,
        }
    }

    fn fit_point(
        time: &[f64],
        intensity: &[f64],
        robustness: &[f64],
        index: usize,
        lo: usize,
        hi: usize,
    ) -> f64 {
        let x0 = time[index];
        let h = (x0 - time[lo]).max(time[hi] - x0) * KERNEL_EXPANSION;

        let mut sw = 0.0;
        let mut swx = 0.0;
        let mut swy = 0.0;
        let mut swxx = 0.0;
        let mut swxy = 0.0;
        for j in lo..=hi {
            let dx = time[j] - x0;
            let u = if h > 0.0 { dx.abs() / h } else { 0.0 };
            let w = tricube(u) * robustness[j];
            let y = intensity[j];
            sw += w;
            swx += w * dx;
            swy += w * y;
            swxx += w * dx * dx;
            swxy += w * dx * y;
        }

        if sw <= 0.0 {
            return intensity[index];
        }
        let denom = sw * swxx - swx * swx;
        if denom <= f64::EPSILON * sw * swxx || denom <= 0.0 {
            swy / sw
        } else {
            // The regression is centered on `x0`, so the intercept is the estimate
            (swy * swxx - swx * swxy) / denom
        }
    }

    fn fit_pass(time: &[f64], intensity: &[f64], robustness: &[f64], span: usize) -> Vec<f64> {
        let n = time.len();
        let mut lo = 0;
        let mut fitted = Vec::with_capacity(n);
        for i in 0..n {
            while lo + span < n && (time[i] - time[lo]) > (time[lo + span] - time[i]) {
                lo += 1;
            }
            let hi = lo + span - 1;
            fitted.push(Self::fit_point(time, intensity, robustness, i, lo, hi));
        }
        fitted
    }
}

impl Smoother for LowessSmoother {
    fn smooth(&self, time: &[f64], intensity: &[f64], window_size: usize) -> Vec<f64> {
        let n = intensity.len().min(time.len());
        if n < 3 || window_size < 2 {
            return intensity.to_vec();
        }
        let span = window_size.min(n);
        let time = &time[..n];
        let values = &intensity[..n];

        let mut robustness = vec![1.0; n];
        let mut fitted = Self::fit_pass(time, values, &robustness, span);

        for iteration in 0..self.robustness_iterations {
            let residuals: Vec<f64> = values
                .iter()
                .zip(fitted.iter())
                .map(|(y, yhat)| y - yhat)
                .collect();
            let abs_residuals: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
            let mean_abs_residual = abs_residuals.iter().sum::<f64>() / n as f64;
            let scale = match median(&abs_residuals) {
                Ok(s) => s * 6.0,
                Err(_) => break,
            };
            // Stop once the residuals are negligible relative to their mean magnitude
            if !scale.is_finite() || scale < ROBUSTNESS_TOLERANCE * mean_abs_residual || scale <= 0.0 {
                log::trace!("LOWESS stopped after {iteration} robustness iterations");
                break;
            }
            robustness
                .iter_mut()
                .zip(residuals.iter())
                .for_each(|(w, r)| *w = robustness_weight(*r, scale));
            fitted = Self::fit_pass(time, values, &robustness, span);
        }
        fitted
    }
}

/// A running window sum over a stream of values, evicting from the front
#[derive(Debug, Clone, Default)]
struct MovingAverage {
    buffer: VecDeque<f64>,
    running_sum: f64,
}

impl MovingAverage {
    fn add(&mut self, value: f64) {
        self.running_sum += value;
        self.buffer.push_back(value);
    }

    fn evict(&mut self) -> Option<f64> {
        let first = self.buffer.pop_front();
        if let Some(value) = first {
            self.running_sum -= value;
        }
        first
    }

    fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.running_sum / self.buffer.len() as f64
        }
    }
}

/// A centered moving average over `window_size` points, truncated at the array edges.
///
/// Even window sizes are widened by one point to stay centered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MovingAverageSmoother;

impl Smoother for MovingAverageSmoother {
    fn smooth(&self, _time: &[f64], intensity: &[f64], window_size: usize) -> Vec<f64> {
        let n = intensity.len();
        if window_size < 2 || n < 2 {
            return intensity.to_vec();
        }
        let half = window_size / 2;
        let mut state = MovingAverage::default();
        for value in intensity.iter().take(half) {
            state.add(*value);
        }

        let mut smoothed = Vec::with_capacity(n);
        for i in 0..n {
            if let Some(value) = intensity.get(i + half) {
                state.add(*value);
            }
            if i > half {
                state.evict();
            }
            smoothed.push(state.average());
        }
        smoothed
    }
}
