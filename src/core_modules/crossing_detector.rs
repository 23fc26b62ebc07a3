// THEORY:
// The `CrossingDetector` is the single point of debounce in the engine. It turns a
// continuous score into discrete, instantaneous crossing events.
//
// An event is raised when the score strictly exceeds the threshold and strictly
// more than the cooldown has passed since the last raised event. The "last raised"
// timestamp moves on every raised event, whether or not the lap timer later
// accepts it. A suppressed detector (timer paused) neither raises nor moves the
// timestamp.

use crate::core_modules::frame::Millis;
use crate::core_modules::region_differencer::RegionScore;

/// A recognized, debounced crossing of the finish line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossingEvent {
    pub timestamp_ms: Millis,
    pub score: RegionScore,
    pub threshold: f64,
}

#[derive(Debug)]
pub struct CrossingDetector {
    cooldown_ms: Millis,
    last_event_ms: Option<Millis>,
}

impl CrossingDetector {
    pub fn new(cooldown_ms: Millis) -> Self {
        Self {
            cooldown_ms,
            last_event_ms: None,
        }
    }

    pub fn evaluate(
        &mut self,
        score: RegionScore,
        threshold: f64,
        now_ms: Millis,
        suppressed: bool,
    ) -> Option<CrossingEvent> {
        if suppressed || !(score > threshold) {
            return None;
        }
        if let Some(last) = self.last_event_ms {
            if now_ms - last <= self.cooldown_ms {
                tracing::trace!(score, since_last_ms = now_ms - last, "crossing debounced");
                return None;
            }
        }
        self.last_event_ms = Some(now_ms);
        Some(CrossingEvent {
            timestamp_ms: now_ms,
            score,
            threshold,
        })
    }

    pub fn last_event_ms(&self) -> Option<Millis> {
        self.last_event_ms
    }

    pub fn clear(&mut self) {
        self.last_event_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_never_raises() {
        let mut detector = CrossingDetector::new(500.0);
        for i in 0..100 {
            let t = i as f64 * 1000.0;
            assert_eq!(detector.evaluate(99.9, 100.0, t, false), None);
            assert_eq!(detector.evaluate(100.0, 100.0, t + 1.0, false), None);
        }
        assert_eq!(detector.last_event_ms(), None);
    }

    #[test]
    fn events_inside_cooldown_are_dropped() {
        let mut detector = CrossingDetector::new(500.0);
        assert!(detector.evaluate(150.0, 100.0, 1000.0, false).is_some());
        assert!(detector.evaluate(150.0, 100.0, 1200.0, false).is_none());
        assert!(detector.evaluate(150.0, 100.0, 1500.0, false).is_none());
        let event = detector.evaluate(150.0, 100.0, 1500.1, false).unwrap();
        assert_eq!(event.timestamp_ms, 1500.1);
        assert_eq!(detector.last_event_ms(), Some(1500.1));
    }

    #[test]
    fn debounce_window_is_not_extended_by_dropped_events() {
        let mut detector = CrossingDetector::new(500.0);
        detector.evaluate(150.0, 100.0, 0.0, false);
        detector.evaluate(150.0, 100.0, 400.0, false);
        assert!(detector.evaluate(150.0, 100.0, 600.0, false).is_some());
    }

    #[test]
    fn suppressed_detector_keeps_timestamp() {
        let mut detector = CrossingDetector::new(500.0);
        detector.evaluate(150.0, 100.0, 0.0, false);
        assert!(detector.evaluate(500.0, 100.0, 5000.0, true).is_none());
        assert_eq!(detector.last_event_ms(), Some(0.0));
    }

    #[test]
    fn nan_score_never_raises() {
        let mut detector = CrossingDetector::new(0.0);
        assert!(detector.evaluate(f64::NAN, 100.0, 0.0, false).is_none());
    }
}
