// THEORY:
// The `Calibrator` learns what "nothing happening" looks like before the engine is
// allowed to call anything a crossing. For a fixed window after activation it
// collects every region score; when the window expires it averages them and hands
// the mean to `DetectionThreshold::derive`.
//
// Key architectural principles:
// 1.  **Polled, not scheduled**: There is no timer thread. The window is a start
//     timestamp, and `poll` is called on every tick with the current time. Cancelling
//     a pending calibration is simply dropping the window.
// 2.  **Exclusive phase**: While a window is open the crossing detector does not
//     run at all. The pipeline checks `is_active` before every comparison.
// 3.  **Robust mean**: Non-finite or negative samples are discarded before
//     averaging. With no usable samples the mean is zero, which yields the lower
//     threshold bound after derivation.

use crate::core_modules::frame::Millis;
use crate::core_modules::region_differencer::RegionScore;

#[derive(Debug, Clone)]
struct CalibrationWindow {
    started_at_ms: Millis,
    samples: Vec<RegionScore>,
}

#[derive(Debug)]
pub struct Calibrator {
    window_ms: Millis,
    window: Option<CalibrationWindow>,
}

impl Calibrator {
    pub fn new(window_ms: Millis) -> Self {
        Self {
            window_ms,
            window: None,
        }
    }

    /// Opens a fresh window at `now_ms`, discarding any samples in flight.
    pub fn begin(&mut self, now_ms: Millis) {
        self.window = Some(CalibrationWindow {
            started_at_ms: now_ms,
            samples: Vec::new(),
        });
    }

    pub fn is_active(&self) -> bool {
        self.window.is_some()
    }

    pub fn observe(&mut self, score: RegionScore) {
        if let Some(window) = self.window.as_mut() {
            window.samples.push(score);
        }
    }

    pub fn sample_count(&self) -> usize {
        self.window.as_ref().map_or(0, |w| w.samples.len())
    }

    /// Time left in the open window, if any.
    pub fn remaining_ms(&self, now_ms: Millis) -> Option<Millis> {
        self.window
            .as_ref()
            .map(|w| (w.started_at_ms + self.window_ms - now_ms).max(0.0))
    }

    /// Closes the window once it has expired and returns the mean noise level.
    pub fn poll(&mut self, now_ms: Millis) -> Option<f64> {
        let expired = self
            .window
            .as_ref()
            .is_some_and(|w| now_ms - w.started_at_ms >= self.window_ms);
        if !expired {
            return None;
        }
        self.window.take().map(|w| mean_noise(&w.samples))
    }

    /// Drops a pending window without producing a result.
    pub fn cancel(&mut self) {
        self.window = None;
    }
}

pub fn mean_noise(samples: &[RegionScore]) -> f64 {
    let (sum, count) = samples
        .iter()
        .filter(|s| s.is_finite() && **s >= 0.0)
        .fold((0.0, 0usize), |(sum, count), s| (sum + s, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
