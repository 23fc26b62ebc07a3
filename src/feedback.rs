//! Feedback collaborator
//!
//! Abstract notifications the engine emits for whoever renders them: a screen
//! flash, a beep, a vibration, a status line. Every method defaults to a no-op,
//! so the engine runs unchanged with no collaborator attached.

use crate::core_modules::crossing_detector::CrossingEvent;
use crate::core_modules::frame::Millis;
use crate::core_modules::ledger::LapRecord;
use crate::core_modules::rotation::Runner;

pub trait Feedback: Send {
    /// A debounced crossing was raised. Fires exactly once per event.
    fn crossing_detected(&mut self, _event: &CrossingEvent) {}

    /// A crossing ended an interval shorter than the minimum lap.
    fn lap_rejected(&mut self, _elapsed_ms: Millis) {}

    fn lap_recorded(&mut self, _lap: &LapRecord, _next: &Runner) {}

    fn round_completed(&mut self, _finished_round: u32) {}

    /// The inter-runner pause expired; `next` may now trigger.
    fn cooldown_finished(&mut self, _next: &Runner) {}

    fn calibration_finished(&mut self, _threshold: f64) {}

    /// Free-form user-facing message (errors, confirmations).
    fn message(&mut self, _text: &str) {}
}

/// The absent collaborator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeedback;

impl Feedback for NoFeedback {}

/// Renders every notification as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFeedback;

impl Feedback for TracingFeedback {
    fn crossing_detected(&mut self, event: &CrossingEvent) {
        tracing::info!(
            at_ms = event.timestamp_ms,
            score = event.score,
            threshold = event.threshold,
            "crossing detected"
        );
    }

    fn lap_rejected(&mut self, elapsed_ms: Millis) {
        tracing::info!(elapsed_ms, "lap too fast, discarded");
    }

    fn lap_recorded(&mut self, lap: &LapRecord, next: &Runner) {
        tracing::info!(
            runner = %lap.runner_name,
            round = lap.round,
            duration = %crate::report::format_duration(lap.duration_ms),
            next = %next.name,
            "lap recorded"
        );
    }

    fn round_completed(&mut self, finished_round: u32) {
        tracing::info!(finished_round, "round completed, waiting for confirmation");
    }

    fn cooldown_finished(&mut self, next: &Runner) {
        tracing::info!(next = %next.name, "ready for next runner");
    }

    fn calibration_finished(&mut self, threshold: f64) {
        tracing::info!(threshold, "calibration complete");
    }

    fn message(&mut self, text: &str) {
        tracing::info!("{text}");
    }
}
