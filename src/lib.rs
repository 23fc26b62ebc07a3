// THEORY:
// This file is the main entry point for the `finish_line` library crate, a
// camera-based lap timer. A fixed camera watches a thin vertical band of the frame
// (the finish line); a large enough change inside that band is a crossing, and
// crossings start and stop the timer for a rotating roster of runners.
//
// The public API is the `LapTimingPipeline` and the small set of types it speaks
// (`TimerConfig`, `Command`, `TickReport`, `Snapshot`). The `core_modules` layers
// are public for testing and tooling but consumers should not need them. Every
// outer surface (camera, display, remote peer, storage) is a collaborator passed
// in from outside; the async `driver` is the one stock wiring of them.

pub mod command;
pub mod config;
pub mod core_modules;
pub mod driver;
pub mod error;
pub mod feedback;
pub mod pipeline;
pub mod report;
pub mod snapshot;

pub use command::{Command, CommandOutcome, RemoteCommand};
pub use config::{ShortLapPolicy, TimerConfig};
pub use core_modules::frame::{FrameSample, Millis};
pub use core_modules::lap_timer::{PauseReason, TimerPhase, TimerState};
pub use core_modules::ledger::{LapLedger, LapRecord};
pub use core_modules::rotation::{Roster, Runner, RunnerId};
pub use error::{AcquisitionError, ConfigError, FrameError, SnapshotError, TimerError};
pub use feedback::{Feedback, NoFeedback, TracingFeedback};
pub use pipeline::{CrossingOutcome, DetectionStatus, LapTimingPipeline, NextUp, TickReport};
pub use report::{LedgerReport, format_duration};
pub use snapshot::{JsonFileStore, MemoryStore, Snapshot, SnapshotStore};
