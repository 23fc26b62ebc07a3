// THEORY:
// The driver is the stock wiring of a `LapTimingPipeline` to the outside world: one
// tokio task owns the pipeline and multiplexes everything that can touch it.
//
//   camera future ──► frame stream ──┐
//   DriverHandle ──► mpsc inbox ─────┼──► select! ──► &mut LapTimingPipeline
//   poll interval ───────────────────┘
//
// Because the pipeline never leaves the task, there is no lock around session
// state. Requests that need an answer (command outcomes, snapshots, reports) carry
// a `oneshot` sender, the same request/reply shape the worker pool uses for frame
// results. The clock is `tokio::time::Instant`, so paused-time tests see exact
// timestamps.

use crate::command::{Command, CommandOutcome};
use crate::core_modules::frame::Millis;
use crate::error::{AcquisitionError, DriverClosed};
use crate::feedback::Feedback;
use crate::pipeline::LapTimingPipeline;
use crate::report::LedgerReport;
use crate::snapshot::Snapshot;
use futures::{Stream, StreamExt};
use image::RgbaImage;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// How often deadlines are checked when no frames arrive.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const INBOX_CAPACITY: usize = 32;

/// Milliseconds since the driver started, from tokio's monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

enum DriverMessage {
    Command {
        command: Command,
        reply: oneshot::Sender<CommandOutcome>,
    },
    Snapshot(oneshot::Sender<Snapshot>),
    Report(oneshot::Sender<LedgerReport>),
    Shutdown,
}

/// Cloneable control surface of a running driver.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    sender: mpsc::Sender<DriverMessage>,
}

impl std::fmt::Debug for DriverMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverMessage::Command { command, .. } => write!(f, "Command({command:?})"),
            DriverMessage::Snapshot(_) => write!(f, "Snapshot"),
            DriverMessage::Report(_) => write!(f, "Report"),
            DriverMessage::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl DriverHandle {
    pub async fn send(&self, command: Command) -> Result<CommandOutcome, DriverClosed> {
        let (reply, outcome) = oneshot::channel();
        self.sender
            .send(DriverMessage::Command { command, reply })
            .await
            .map_err(|_| DriverClosed)?;
        outcome.await.map_err(|_| DriverClosed)
    }

    pub async fn snapshot(&self) -> Result<Snapshot, DriverClosed> {
        let (reply, snapshot) = oneshot::channel();
        self.sender
            .send(DriverMessage::Snapshot(reply))
            .await
            .map_err(|_| DriverClosed)?;
        snapshot.await.map_err(|_| DriverClosed)
    }

    pub async fn report(&self) -> Result<LedgerReport, DriverClosed> {
        let (reply, report) = oneshot::channel();
        self.sender
            .send(DriverMessage::Report(reply))
            .await
            .map_err(|_| DriverClosed)?;
        report.await.map_err(|_| DriverClosed)
    }

    /// Stops the task. Its `JoinHandle` then yields the pipeline.
    pub async fn shutdown(self) -> Result<(), DriverClosed> {
        self.sender
            .send(DriverMessage::Shutdown)
            .await
            .map_err(|_| DriverClosed)
    }
}

/// Spawns the driver task.
///
/// `acquire` is the one-time camera request. It resolves to a frame stream or an
/// acquisition error; commands are served while it is pending and after it fails.
/// The task ends on `shutdown` or when every handle is dropped, returning the
/// pipeline to the caller.
pub fn spawn<F, A, S>(
    pipeline: LapTimingPipeline<F>,
    acquire: A,
    poll_interval: Duration,
) -> (DriverHandle, JoinHandle<LapTimingPipeline<F>>)
where
    F: Feedback + 'static,
    A: Future<Output = Result<S, AcquisitionError>> + Send + 'static,
    S: Stream<Item = RgbaImage> + Send + Unpin + 'static,
{
    let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
    let task = tokio::spawn(run(pipeline, acquire, inbox, poll_interval));
    (DriverHandle { sender }, task)
}

async fn run<F, A, S>(
    mut pipeline: LapTimingPipeline<F>,
    acquire: A,
    mut inbox: mpsc::Receiver<DriverMessage>,
    poll_interval: Duration,
) -> LapTimingPipeline<F>
where
    F: Feedback,
    A: Future<Output = Result<S, AcquisitionError>>,
    S: Stream<Item = RgbaImage> + Unpin,
{
    let clock = MonotonicClock::start();
    tokio::pin!(acquire);
    let mut acquiring = true;
    let mut frames: Option<S> = None;
    let mut frame_count: u64 = 0;

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(?poll_interval, "lap timer driver started");
    loop {
        tokio::select! {
            acquired = &mut acquire, if acquiring => {
                acquiring = false;
                match acquired {
                    Ok(stream) => {
                        pipeline.camera_ready(clock.now_ms());
                        frames = Some(stream);
                    }
                    Err(error) => pipeline.acquisition_failed(&error),
                }
            }
            frame = async { frames.as_mut()?.next().await }, if frames.is_some() => {
                match frame {
                    Some(image) => {
                        frame_count += 1;
                        let report = pipeline.tick_image(image, clock.now_ms());
                        tracing::trace!(frame_count, ?report, "frame processed");
                    }
                    None => {
                        frames = None;
                        pipeline.acquisition_failed(&AcquisitionError::Unavailable(
                            "camera stream ended".to_string(),
                        ));
                    }
                }
            }
            message = inbox.recv() => {
                let Some(message) = message else { break };
                tracing::debug!(?message, "driver message");
                match message {
                    DriverMessage::Command { command, reply } => {
                        let outcome = pipeline.handle(command, clock.now_ms());
                        let _ = reply.send(outcome);
                    }
                    DriverMessage::Snapshot(reply) => {
                        let _ = reply.send(pipeline.snapshot());
                    }
                    DriverMessage::Report(reply) => {
                        let _ = reply.send(pipeline.report());
                    }
                    DriverMessage::Shutdown => break,
                }
            }
            _ = ticker.tick() => pipeline.poll(clock.now_ms()),
        }
    }
    tracing::info!(frame_count, laps = pipeline.ledger().len(), "lap timer driver stopped");
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RemoteCommand;
    use crate::config::TimerConfig;
    use crate::core_modules::rotation::Roster;
    use crate::pipeline::{CrossingOutcome, DetectionStatus};
    use image::Rgba;

    fn image(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(40, 8, Rgba([value, value, value, 255]))
    }

    /// Frames delivered after the given delays, in virtual time.
    fn scripted(schedule: Vec<(u64, u8)>) -> impl Stream<Item = RgbaImage> + Send + Unpin {
        Box::pin(futures::stream::unfold(
            schedule.into_iter(),
            |mut schedule| async move {
                let (delay_ms, value) = schedule.next()?;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Some((image(value), schedule))
            },
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn camera_frames_record_a_lap() {
        let pipeline = LapTimingPipeline::new(TimerConfig::default(), Roster::from_names(["Ana", "Bea"])).unwrap();
        let frames = scripted(vec![
            (100, 0),
            (900, 0),
            (2100, 0), // t=3100, calibrated
            (900, 0),
            (1000, 255), // t=5000, start
            (100, 0),
            (4900, 255), // t=10000, lap
            (100, 0),
        ]);
        let (handle, task) = spawn(pipeline, async move { Ok(frames) }, DEFAULT_POLL_INTERVAL);

        tokio::time::sleep(Duration::from_secs(20)).await;
        let report = handle.report().await.unwrap();
        assert_eq!(report.total_laps(), 1);
        let lap = &report.rounds[0].laps[0];
        assert_eq!(lap.runner_name, "Ana");
        assert!((lap.duration_ms - 5000.0).abs() < 5.0, "{}", lap.duration_ms);

        handle.shutdown().await.unwrap();
        let pipeline = task.await.unwrap();
        // The scripted stream ran out.
        assert_eq!(pipeline.status(), DetectionStatus::Unavailable);
        assert_eq!(pipeline.current_runner().name, "Bea");
    }

    #[tokio::test(start_paused = true)]
    async fn remote_control_survives_denied_camera() {
        let pipeline = LapTimingPipeline::new(TimerConfig::default(), Roster::default()).unwrap();
        let denied = async { Err::<futures::stream::Empty<RgbaImage>, _>(AcquisitionError::Denied) };
        let (handle, task) = spawn(pipeline, denied, DEFAULT_POLL_INTERVAL);

        assert_eq!(
            handle.send(RemoteCommand::Start.into()).await.unwrap(),
            CommandOutcome::Timer(CrossingOutcome::Started)
        );
        tokio::time::sleep(Duration::from_secs(4)).await;
        let outcome = handle.send(RemoteCommand::Stop.into()).await.unwrap();
        assert!(matches!(
            outcome,
            CommandOutcome::Timer(CrossingOutcome::LapRecorded { .. })
        ));

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.ledger.len(), 1);
        assert_eq!(snapshot.round, 2);

        drop(handle);
        let pipeline = task.await.unwrap();
        assert_eq!(pipeline.status(), DetectionStatus::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_expires_without_frames() {
        let pipeline = LapTimingPipeline::new(TimerConfig::default(), Roster::from_names(["Ana", "Bea"])).unwrap();
        let pending = futures::future::pending::<Result<futures::stream::Empty<RgbaImage>, AcquisitionError>>();
        let (handle, _task) = spawn(pipeline, pending, DEFAULT_POLL_INTERVAL);

        handle.send(RemoteCommand::Start.into()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.send(RemoteCommand::Stop.into()).await.unwrap();
        // Paused for Bea; a start is refused until the cooldown is polled away.
        assert_eq!(
            handle.send(RemoteCommand::Start.into()).await.unwrap(),
            CommandOutcome::Ignored
        );
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(
            handle.send(RemoteCommand::Start.into()).await.unwrap(),
            CommandOutcome::Timer(CrossingOutcome::Started)
        );
    }

    #[tokio::test]
    async fn closed_driver_reports_error() {
        let pipeline = LapTimingPipeline::new(TimerConfig::default(), Roster::default()).unwrap();
        let pending = futures::future::pending::<Result<futures::stream::Empty<RgbaImage>, AcquisitionError>>();
        let (handle, task) = spawn(pipeline, pending, DEFAULT_POLL_INTERVAL);
        handle.clone().shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(handle.snapshot().await, Err(DriverClosed));
    }
}
