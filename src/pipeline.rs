// THEORY:
// The `pipeline` module is the top-level API of the lap-timing engine. It owns every
// layer and wires them in a fixed order on each tick:
//
//   frame → band → RegionDifferencer → { Calibrator | CrossingDetector }
//         → LapTimer → RunnerRotation → LapLedger
//
// Key architectural principles:
// 1.  **One owner, one thread**: All mutable session state (threshold, timer,
//     rotation, ledger) lives in this struct. The tick loop and control commands are
//     both `&mut self` calls, so they can never interleave.
// 2.  **Transport-agnostic**: Nothing here knows about cameras, displays or
//     networks. Time arrives as a millisecond timestamp on each call; frames arrive
//     as `FrameSample`s; control arrives as `Command`s.
// 3.  **Deferred timers are polled**: Calibration expiry and the inter-runner
//     cooldown are deadlines checked at the start of every tick and every command.
//     Cancelling them on reset is dropping the deadline.
// 4.  **Errors stop at the tick boundary**: A frame that cannot be read skips the
//     tick. It never leaves the timer or the ledger half-updated.

use crate::command::{Command, CommandOutcome, RemoteCommand};
use crate::config::TimerConfig;
use crate::core_modules::calibrator::Calibrator;
use crate::core_modules::crossing_detector::{CrossingDetector, CrossingEvent};
use crate::core_modules::frame::{FrameSample, Millis};
use crate::core_modules::lap_timer::{LapDecision, LapTimer, PauseReason, TimerPhase, TimerState};
use crate::core_modules::ledger::{LapLedger, LapRecord};
use crate::core_modules::region_differencer::{RegionDifferencer, RegionScore};
use crate::core_modules::rotation::{Roster, RotationStep, Runner, RunnerRotation};
use crate::core_modules::threshold::DetectionThreshold;
use crate::error::{AcquisitionError, ConfigError, SnapshotError, TimerError};
use crate::feedback::{Feedback, NoFeedback};
use crate::report::LedgerReport;
use crate::snapshot::{Snapshot, SnapshotStore};
use image::RgbaImage;

/// Whether the sensing half of the engine is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStatus {
    /// Camera not ready yet; manual control already works.
    AwaitingCamera,
    /// Collecting noise samples; no crossings are recognized.
    Calibrating,
    Detecting,
    /// Camera acquisition failed. Manual and remote control still work.
    Unavailable,
}

/// Who runs next after a recorded lap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NextUp {
    NextRunner {
        index: usize,
        /// `None` when the timer went straight back to Stopped.
        cooldown_until_ms: Option<Millis>,
    },
    /// Timer is paused until `Command::ConfirmRound`.
    RoundComplete { finished_round: u32 },
}

/// The effect of a crossing (or a remote start/stop) on the session.
#[derive(Debug, Clone, PartialEq)]
pub enum CrossingOutcome {
    Started,
    TooShort { elapsed_ms: Millis },
    LapRecorded { lap: LapRecord, next: NextUp },
    Ignored,
}

/// The output of the pipeline for a single tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickReport {
    /// The frame could not be read; nothing changed.
    Skipped,
    /// Detection is not running (camera pending or unavailable).
    Inactive(DetectionStatus),
    /// No comparable previous band yet.
    NoScore,
    Calibrating { score: RegionScore },
    Quiet { score: RegionScore },
    Crossing {
        event: CrossingEvent,
        outcome: CrossingOutcome,
    },
}

/// The main, top-level struct for the lap-timing engine.
pub struct LapTimingPipeline<F: Feedback = NoFeedback> {
    config: TimerConfig,
    status: DetectionStatus,
    differencer: RegionDifferencer,
    calibrator: Calibrator,
    threshold: DetectionThreshold,
    detector: CrossingDetector,
    timer: LapTimer,
    rotation: RunnerRotation,
    ledger: LapLedger,
    feedback: F,
}

impl LapTimingPipeline<NoFeedback> {
    pub fn new(config: TimerConfig, roster: Roster) -> Result<Self, ConfigError> {
        Self::with_feedback(config, roster, NoFeedback)
    }
}

impl<F: Feedback> LapTimingPipeline<F> {
    pub fn with_feedback(config: TimerConfig, roster: Roster, feedback: F) -> Result<Self, ConfigError> {
        config.validate()?;
        let roster = if config.use_named_runners {
            roster
        } else {
            Roster::unnamed()
        };
        Ok(Self {
            status: DetectionStatus::AwaitingCamera,
            differencer: RegionDifferencer::new(),
            calibrator: Calibrator::new(config.calibration.window_ms),
            threshold: DetectionThreshold::new(&config.calibration),
            detector: CrossingDetector::new(config.detection_cooldown_ms),
            timer: LapTimer::new(config.min_valid_lap_ms, config.short_lap_policy),
            rotation: RunnerRotation::new(roster, config.use_rounds),
            ledger: LapLedger::new(),
            feedback,
            config,
        })
    }

    // --- Camera lifecycle ---

    /// The camera delivered its first metadata. Starts calibration.
    pub fn camera_ready(&mut self, now_ms: Millis) {
        self.differencer.clear();
        self.calibrator.begin(now_ms);
        self.status = DetectionStatus::Calibrating;
        tracing::info!(window_ms = self.config.calibration.window_ms, "camera ready, calibrating");
    }

    pub fn acquisition_failed(&mut self, error: &AcquisitionError) {
        self.calibrator.cancel();
        self.differencer.clear();
        self.status = DetectionStatus::Unavailable;
        tracing::warn!(%error, "camera acquisition failed, detection disabled");
        self.feedback.message(&format!("Camera not available: {error}"));
    }

    // --- Tick loop ---

    /// Processes one decoded camera image, catching any per-frame error.
    pub fn tick_image(&mut self, image: RgbaImage, now_ms: Millis) -> TickReport {
        match self.try_tick_image(image, now_ms) {
            Ok(report) => report,
            Err(error) => {
                tracing::warn!(%error, "skipping tick");
                TickReport::Skipped
            }
        }
    }

    #[tracing::instrument(level = "trace", name = "pipeline_tick", skip(self, image))]
    pub fn try_tick_image(&mut self, image: RgbaImage, now_ms: Millis) -> Result<TickReport, TimerError> {
        let frame = FrameSample::from_image(image, now_ms)?;
        Ok(self.tick(frame))
    }

    /// Processes one frame sample, using its timestamp as "now".
    pub fn tick(&mut self, frame: FrameSample) -> TickReport {
        let now_ms = frame.timestamp_ms();
        self.poll(now_ms);

        if matches!(
            self.status,
            DetectionStatus::AwaitingCamera | DetectionStatus::Unavailable
        ) {
            return TickReport::Inactive(self.status);
        }

        let band = frame.band(&self.config.region);
        let Some(score) = self.differencer.score(band) else {
            return TickReport::NoScore;
        };
        tracing::trace!(score, "region score");

        if self.calibrator.is_active() {
            self.calibrator.observe(score);
            return TickReport::Calibrating { score };
        }

        let suppressed = self.timer.is_paused();
        match self
            .detector
            .evaluate(score, self.threshold.value(), now_ms, suppressed)
        {
            None => TickReport::Quiet { score },
            Some(event) => {
                self.feedback.crossing_detected(&event);
                let decision = self.timer.on_crossing(now_ms);
                let outcome = self.apply(decision, now_ms);
                TickReport::Crossing { event, outcome }
            }
        }
    }

    /// Expires due deadlines: the calibration window and the inter-runner cooldown.
    pub fn poll(&mut self, now_ms: Millis) {
        if let Some(mean) = self.calibrator.poll(now_ms) {
            let threshold = self.threshold.derive(mean, &self.config.calibration);
            self.status = DetectionStatus::Detecting;
            tracing::info!(mean_noise = mean, threshold, "calibration complete");
            self.feedback.calibration_finished(threshold);
        }
        if self.timer.poll(now_ms) {
            tracing::debug!(next = %self.rotation.current_runner().name, "inter-runner cooldown over");
            self.feedback.cooldown_finished(self.rotation.current_runner());
        }
    }

    // --- Control ---

    pub fn handle(&mut self, command: Command, now_ms: Millis) -> CommandOutcome {
        self.poll(now_ms);
        match command {
            Command::Remote(RemoteCommand::Start) => self.remote_timer(now_ms, LapTimer::start),
            Command::Remote(RemoteCommand::Stop) => self.remote_timer(now_ms, LapTimer::stop),
            Command::Remote(RemoteCommand::Reset) | Command::Reset => {
                self.reset(now_ms);
                CommandOutcome::Reset
            }
            Command::ConfirmRound => {
                if !self.timer.confirm_round() {
                    return CommandOutcome::Ignored;
                }
                let round = self.rotation.round();
                tracing::info!(round, "round confirmed");
                self.feedback.message(&format!(
                    "Round {round} - ready: {}",
                    self.rotation.current_runner().name
                ));
                CommandOutcome::RoundConfirmed { round }
            }
            Command::SetThreshold(value) => {
                let applied = self.threshold.set(value);
                tracing::debug!(requested = value, applied, "manual threshold override");
                CommandOutcome::ThresholdSet { applied }
            }
            Command::AddRunner(name) => {
                // Unnamed mode numbers every runner.
                let name = name.filter(|_| self.config.use_named_runners);
                let runner = self.rotation.add_runner(name).clone();
                tracing::info!(runner = %runner.name, id = %runner.id, "runner added");
                self.feedback.message(&format!("+ {}", runner.name));
                CommandOutcome::RunnerAdded(runner)
            }
        }
    }

    /// Parses and dispatches a remote payload; malformed payloads are ignored.
    pub fn handle_remote_payload(&mut self, payload: &str, now_ms: Millis) -> CommandOutcome {
        match RemoteCommand::parse(payload) {
            Some(command) => self.handle(Command::Remote(command), now_ms),
            None => CommandOutcome::Ignored,
        }
    }

    fn remote_timer(
        &mut self,
        now_ms: Millis,
        transition: fn(&mut LapTimer, Millis) -> LapDecision,
    ) -> CommandOutcome {
        if self.calibrator.is_active() {
            tracing::debug!("remote timer command ignored during calibration");
            return CommandOutcome::Ignored;
        }
        match transition(&mut self.timer, now_ms) {
            LapDecision::Ignored => CommandOutcome::Ignored,
            decision => CommandOutcome::Timer(self.apply(decision, now_ms)),
        }
    }

    /// Turns a timer decision into rotation, ledger and pause side effects.
    fn apply(&mut self, decision: LapDecision, now_ms: Millis) -> CrossingOutcome {
        match decision {
            LapDecision::Started => {
                tracing::debug!(runner = %self.rotation.current_runner().name, "interval started");
                CrossingOutcome::Started
            }
            LapDecision::TooShort { elapsed_ms } => {
                tracing::debug!(elapsed_ms, policy = ?self.config.short_lap_policy, "lap below minimum");
                self.feedback.lap_rejected(elapsed_ms);
                CrossingOutcome::TooShort { elapsed_ms }
            }
            LapDecision::Completed { elapsed_ms } => self.record_lap(elapsed_ms, now_ms),
            LapDecision::Ignored => CrossingOutcome::Ignored,
        }
    }

    fn record_lap(&mut self, elapsed_ms: Millis, now_ms: Millis) -> CrossingOutcome {
        let (lap, step) = self.rotation.attribute(elapsed_ms);
        self.ledger.append(lap.clone());
        tracing::info!(
            runner = %lap.runner_name,
            round = lap.round,
            duration_ms = lap.duration_ms,
            "lap recorded"
        );

        let next = match step {
            RotationStep::NextRunner { index } => {
                if !self.config.use_rounds {
                    self.ledger.commit_round();
                }
                let cooldown = self.config.inter_runner_cooldown_ms;
                let cooldown_until_ms = (cooldown > 0.0).then(|| now_ms + cooldown);
                if let Some(until_ms) = cooldown_until_ms {
                    self.timer.pause(PauseReason::RunnerCooldown { until_ms });
                }
                NextUp::NextRunner {
                    index,
                    cooldown_until_ms,
                }
            }
            RotationStep::RoundComplete { finished_round } => {
                let moved = self.ledger.commit_round();
                self.timer.pause(PauseReason::RoundComplete);
                tracing::info!(finished_round, laps = moved, "round complete");
                NextUp::RoundComplete { finished_round }
            }
        };

        self.feedback.lap_recorded(&lap, self.rotation.current_runner());
        if let NextUp::RoundComplete { finished_round } = next {
            self.feedback.round_completed(finished_round);
        }
        CrossingOutcome::LapRecorded { lap, next }
    }

    /// Clears the session back to the setup roster and, if the camera is up,
    /// recalibrates.
    pub fn reset(&mut self, now_ms: Millis) {
        self.calibrator.cancel();
        self.timer.reset();
        self.detector.clear();
        self.differencer.clear();
        self.ledger.clear();
        self.rotation.reset();
        if matches!(
            self.status,
            DetectionStatus::Calibrating | DetectionStatus::Detecting
        ) {
            self.calibrator.begin(now_ms);
            self.status = DetectionStatus::Calibrating;
        }
        tracing::info!(status = ?self.status, "session reset");
    }

    // --- Persistence ---

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            ledger: self.ledger.clone(),
            roster: self.rotation.roster().clone(),
            current_index: self.rotation.current_index(),
            round: self.rotation.round(),
        }
    }

    /// Replaces the session with a saved one. The timer restarts Stopped.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.timer.reset();
        self.ledger = snapshot.ledger;
        self.rotation
            .restore(snapshot.roster, snapshot.current_index, snapshot.round);
        tracing::info!(
            laps = self.ledger.len(),
            round = self.rotation.round(),
            "session restored"
        );
    }

    /// Saves a snapshot; failures are reported and leave the session untouched.
    pub fn persist<S: SnapshotStore>(&mut self, store: &mut S) -> Result<(), SnapshotError> {
        let snapshot = self.snapshot();
        store.save(&snapshot).inspect_err(|error| {
            tracing::warn!(%error, "failed to save session");
            self.feedback.message(&format!("Could not save session: {error}"));
        })
    }

    /// Loads and restores a snapshot if the store has one.
    pub fn restore_from<S: SnapshotStore>(&mut self, store: &mut S) -> Result<bool, SnapshotError> {
        match store.load() {
            Ok(Some(snapshot)) => {
                self.restore(snapshot);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(error) => {
                tracing::warn!(%error, "failed to load session");
                self.feedback.message(&format!("Could not load session: {error}"));
                Err(error)
            }
        }
    }

    // --- Read access ---

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn status(&self) -> DetectionStatus {
        self.status
    }

    pub fn threshold(&self) -> f64 {
        self.threshold.value()
    }

    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    pub fn timer_phase(&self) -> TimerPhase {
        self.timer.phase()
    }

    pub fn displayed_ms(&self, now_ms: Millis) -> Millis {
        self.timer.displayed_ms(now_ms)
    }

    pub fn cooldown_remaining_ms(&self, now_ms: Millis) -> Option<Millis> {
        self.timer.cooldown_remaining_ms(now_ms)
    }

    pub fn calibration_remaining_ms(&self, now_ms: Millis) -> Option<Millis> {
        self.calibrator.remaining_ms(now_ms)
    }

    pub fn roster(&self) -> &Roster {
        self.rotation.roster()
    }

    pub fn current_runner(&self) -> &Runner {
        self.rotation.current_runner()
    }

    pub fn current_index(&self) -> usize {
        self.rotation.current_index()
    }

    pub fn round(&self) -> u32 {
        self.rotation.round()
    }

    pub fn ledger(&self) -> &LapLedger {
        &self.ledger
    }

    pub fn report(&self) -> LedgerReport {
        LedgerReport::from_ledger(&self.ledger)
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }
}
