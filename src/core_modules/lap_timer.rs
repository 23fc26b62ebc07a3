// THEORY:
// The `LapTimer` is the one stopwatch of the system. There are never per-runner
// timers: exactly one `TimerState` exists, and every transition goes through the
// methods below.
//
// Key architectural principles:
// 1.  **State carries its data**: `Running` holds the interval start and `Paused`
//     holds why it is paused (and until when). There is no separate "start time"
//     field that can disagree with the state.
// 2.  **Noise is a named outcome**: A crossing that arrives before the minimum lap
//     time is reported as `LapDecision::TooShort`, never silently dropped, so status
//     reporting can tell it apart from a valid lap.
// 3.  **Rotation decides what follows a lap**: A completed lap leaves the timer
//     Stopped. The pipeline then asks the rotation whether to pause for a
//     round-complete confirmation or for the inter-runner cooldown.
// 4.  **Validation before mutation**: Every method checks its precondition first and
//     returns `Ignored`/`false` without touching state when it does not hold.

use crate::config::ShortLapPolicy;
use crate::core_modules::frame::Millis;
use serde::{Deserialize, Serialize};

/// Coarse timer state, as reported to displays and remote peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PauseReason {
    /// The last runner of the round finished; waits for an explicit confirmation.
    RoundComplete,
    /// Gives the previous runner time to clear the frame. Expires on its own.
    RunnerCooldown { until_ms: Millis },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerState {
    Stopped,
    Running { since_ms: Millis },
    Paused(PauseReason),
}

impl TimerState {
    pub fn phase(&self) -> TimerPhase {
        match self {
            TimerState::Stopped => TimerPhase::Stopped,
            TimerState::Running { .. } => TimerPhase::Running,
            TimerState::Paused(_) => TimerPhase::Paused,
        }
    }
}

/// What a crossing (or remote start/stop) did to the timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LapDecision {
    /// Stopped → Running. No lap.
    Started,
    /// Running, but faster than the minimum lap. No lap.
    TooShort { elapsed_ms: Millis },
    /// Running → Stopped with a valid lap of `elapsed_ms`.
    Completed { elapsed_ms: Millis },
    /// The timer was not in a state that accepts this input.
    Ignored,
}

#[derive(Debug)]
pub struct LapTimer {
    state: TimerState,
    min_valid_lap_ms: Millis,
    short_lap_policy: ShortLapPolicy,
    last_displayed_ms: Millis,
}

impl LapTimer {
    pub fn new(min_valid_lap_ms: Millis, short_lap_policy: ShortLapPolicy) -> Self {
        Self {
            state: TimerState::Stopped,
            min_valid_lap_ms,
            short_lap_policy,
            last_displayed_ms: 0.0,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn phase(&self) -> TimerPhase {
        self.state.phase()
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, TimerState::Paused(_))
    }

    /// A debounced crossing at `now_ms`.
    pub fn on_crossing(&mut self, now_ms: Millis) -> LapDecision {
        match self.state {
            TimerState::Stopped => self.start(now_ms),
            TimerState::Running { .. } => self.stop(now_ms),
            TimerState::Paused(_) => LapDecision::Ignored,
        }
    }

    /// Begins an interval. Only valid from Stopped.
    pub fn start(&mut self, now_ms: Millis) -> LapDecision {
        if self.state != TimerState::Stopped {
            return LapDecision::Ignored;
        }
        self.state = TimerState::Running { since_ms: now_ms };
        LapDecision::Started
    }

    /// Ends the running interval. Only valid from Running.
    pub fn stop(&mut self, now_ms: Millis) -> LapDecision {
        let TimerState::Running { since_ms } = self.state else {
            return LapDecision::Ignored;
        };
        let elapsed_ms = (now_ms - since_ms).max(0.0);

        if elapsed_ms < self.min_valid_lap_ms {
            match self.short_lap_policy {
                ShortLapPolicy::Stop => self.state = TimerState::Stopped,
                ShortLapPolicy::RestartInterval => {
                    self.state = TimerState::Running { since_ms: now_ms }
                }
                ShortLapPolicy::KeepRunning => {}
            }
            return LapDecision::TooShort { elapsed_ms };
        }

        self.state = TimerState::Stopped;
        self.last_displayed_ms = elapsed_ms;
        LapDecision::Completed { elapsed_ms }
    }

    /// Enters a pause after a completed lap. Only valid from Stopped.
    pub fn pause(&mut self, reason: PauseReason) -> bool {
        if self.state != TimerState::Stopped {
            return false;
        }
        self.state = TimerState::Paused(reason);
        true
    }

    /// Expires an inter-runner cooldown whose deadline has passed.
    pub fn poll(&mut self, now_ms: Millis) -> bool {
        match self.state {
            TimerState::Paused(PauseReason::RunnerCooldown { until_ms }) if now_ms >= until_ms => {
                self.rearm();
                true
            }
            _ => false,
        }
    }

    /// Acknowledges the end of a round. Only valid while paused for it.
    pub fn confirm_round(&mut self) -> bool {
        if self.state != TimerState::Paused(PauseReason::RoundComplete) {
            return false;
        }
        self.rearm();
        true
    }

    pub fn reset(&mut self) {
        self.rearm();
    }

    pub fn cooldown_remaining_ms(&self, now_ms: Millis) -> Option<Millis> {
        match self.state {
            TimerState::Paused(PauseReason::RunnerCooldown { until_ms }) => {
                Some((until_ms - now_ms).max(0.0))
            }
            _ => None,
        }
    }

    /// Live elapsed time while running, otherwise the last completed lap.
    pub fn displayed_ms(&self, now_ms: Millis) -> Millis {
        match self.state {
            TimerState::Running { since_ms } => (now_ms - since_ms).max(0.0),
            _ => self.last_displayed_ms,
        }
    }

    fn rearm(&mut self) {
        self.state = TimerState::Stopped;
        self.last_displayed_ms = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer() -> LapTimer {
        LapTimer::new(3000.0, ShortLapPolicy::Stop)
    }

    #[test]
    fn first_crossing_starts_without_lap() {
        let mut timer = timer();
        assert_eq!(timer.on_crossing(100.0), LapDecision::Started);
        assert_eq!(timer.state(), TimerState::Running { since_ms: 100.0 });
    }

    #[test]
    fn valid_lap_completes_and_stops() {
        let mut timer = timer();
        timer.on_crossing(0.0);
        assert_eq!(
            timer.on_crossing(4000.0),
            LapDecision::Completed { elapsed_ms: 4000.0 }
        );
        assert_eq!(timer.phase(), TimerPhase::Stopped);
        assert_eq!(timer.displayed_ms(9000.0), 4000.0);
    }

    #[test]
    fn exact_minimum_is_valid() {
        let mut timer = timer();
        timer.on_crossing(0.0);
        assert_eq!(
            timer.on_crossing(3000.0),
            LapDecision::Completed { elapsed_ms: 3000.0 }
        );
    }

    #[test]
    fn short_lap_returns_to_stopped_by_default() {
        let mut timer = timer();
        timer.on_crossing(0.0);
        assert_eq!(
            timer.on_crossing(2500.0),
            LapDecision::TooShort { elapsed_ms: 2500.0 }
        );
        assert_eq!(timer.state(), TimerState::Stopped);
    }

    #[test]
    fn short_lap_restart_policy_moves_interval() {
        let mut timer = LapTimer::new(3000.0, ShortLapPolicy::RestartInterval);
        timer.on_crossing(0.0);
        timer.on_crossing(1000.0);
        assert_eq!(timer.state(), TimerState::Running { since_ms: 1000.0 });
    }

    #[test]
    fn short_lap_keep_running_policy_keeps_interval() {
        let mut timer = LapTimer::new(3000.0, ShortLapPolicy::KeepRunning);
        timer.on_crossing(0.0);
        timer.on_crossing(1000.0);
        assert_eq!(timer.state(), TimerState::Running { since_ms: 0.0 });
        assert_eq!(
            timer.on_crossing(3500.0),
            LapDecision::Completed { elapsed_ms: 3500.0 }
        );
    }

    #[test]
    fn paused_timer_ignores_crossings() {
        let mut timer = timer();
        assert!(timer.pause(PauseReason::RoundComplete));
        assert_eq!(timer.on_crossing(10.0), LapDecision::Ignored);
        assert_eq!(timer.phase(), TimerPhase::Paused);
    }

    #[test]
    fn stop_while_stopped_is_noop() {
        let mut timer = timer();
        assert_eq!(timer.stop(1000.0), LapDecision::Ignored);
        assert_eq!(timer.state(), TimerState::Stopped);
    }

    #[test]
    fn start_while_running_is_noop() {
        let mut timer = timer();
        timer.start(0.0);
        assert_eq!(timer.start(50.0), LapDecision::Ignored);
        assert_eq!(timer.state(), TimerState::Running { since_ms: 0.0 });
    }

    #[test]
    fn cooldown_expires_on_poll() {
        let mut timer = timer();
        timer.pause(PauseReason::RunnerCooldown { until_ms: 7000.0 });
        assert_eq!(timer.cooldown_remaining_ms(6000.0), Some(1000.0));
        assert!(!timer.poll(6999.0));
        assert!(timer.poll(7000.0));
        assert_eq!(timer.phase(), TimerPhase::Stopped);
        assert_eq!(timer.displayed_ms(7000.0), 0.0);
    }

    #[test]
    fn round_pause_needs_confirmation() {
        let mut timer = timer();
        timer.pause(PauseReason::RoundComplete);
        assert!(!timer.poll(1.0e9));
        assert!(timer.confirm_round());
        assert!(!timer.confirm_round());
        assert_eq!(timer.phase(), TimerPhase::Stopped);
    }

    #[test]
    fn confirm_does_not_cut_cooldown_short() {
        let mut timer = timer();
        timer.pause(PauseReason::RunnerCooldown { until_ms: 100.0 });
        assert!(!timer.confirm_round());
        assert!(timer.is_paused());
    }

    #[test]
    fn pause_requires_stopped() {
        let mut timer = timer();
        timer.start(0.0);
        assert!(!timer.pause(PauseReason::RoundComplete));
        assert_eq!(timer.phase(), TimerPhase::Running);
    }
}
