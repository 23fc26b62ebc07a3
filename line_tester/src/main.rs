// Offline harness: replays a directory of still frames (sorted by file name) as a
// camera feed at a fixed frame rate, then prints the lap report.
//
// Frame timestamps are synthetic (`index * 1000 / fps`), so a replay is
// deterministic and runs as fast as the frames decode.

use anyhow::{Context, Result, bail};
use clap::Parser;
use finish_line::{
    Command, JsonFileStore, LapTimingPipeline, RemoteCommand, Roster, TickReport, TimerConfig,
    TracingFeedback,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "line_tester", version, about)]
struct Cli {
    /// Directory of frame images (png, jpg, ...).
    frames: PathBuf,

    /// Replay frame rate.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Runner names in rotation order. Repeat for each runner.
    #[arg(long = "runner", short = 'r')]
    runners: Vec<String>,

    /// Timer configuration file (.toml or .json).
    #[arg(long, env = "FINISH_LINE_CONFIG")]
    config: Option<PathBuf>,

    /// Remote command injected at a replay time, e.g. `4000=stop`.
    #[arg(long = "remote", value_parser = parse_remote)]
    remote: Vec<(f64, RemoteCommand)>,

    /// Confirm every completed round automatically.
    #[arg(long)]
    auto_confirm: bool,

    /// Write the final session snapshot to this file.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_remote(value: &str) -> Result<(f64, RemoteCommand), String> {
    let (at, name) = value
        .split_once('=')
        .ok_or_else(|| format!("expected <ms>=<command>, got '{value}'"))?;
    let at_ms: f64 = at.trim().parse().map_err(|e| format!("bad time '{at}': {e}"))?;
    let payload = format!(r#"{{"command":"{}"}}"#, name.trim());
    let command = RemoteCommand::parse(&payload).ok_or_else(|| format!("unknown command '{name}'"))?;
    Ok((at_ms, command))
}

fn init_logging(verbose: u8) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}

fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && image::ImageFormat::from_path(&path).is_ok() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    if !(cli.fps.is_finite() && cli.fps > 0.0) {
        bail!("--fps must be positive, got {}", cli.fps);
    }

    let config = match &cli.config {
        Some(path) => TimerConfig::load_from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TimerConfig::default(),
    };
    let roster = Roster::from_names(&cli.runners);
    let mut pipeline = LapTimingPipeline::with_feedback(config, roster, TracingFeedback)?;

    let paths = frame_paths(&cli.frames)?;
    if paths.is_empty() {
        bail!("no frame images found in {}", cli.frames.display());
    }
    info!(frames = paths.len(), fps = cli.fps, "replaying");

    let mut remote = cli.remote.clone();
    remote.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut remote = remote.into_iter().peekable();

    let frame_ms = 1000.0 / cli.fps;
    let mut crossings = 0usize;
    let mut skipped = 0usize;
    pipeline.camera_ready(0.0);

    for (index, path) in paths.iter().enumerate() {
        let now_ms = index as f64 * frame_ms;
        while let Some((_, command)) = remote.next_if(|(at, _)| *at <= now_ms) {
            let outcome = pipeline.handle(Command::Remote(command), now_ms);
            info!(?command, ?outcome, at_ms = now_ms, "remote command");
        }

        let report = match image::open(path) {
            Ok(decoded) => pipeline.tick_image(decoded.to_rgba8(), now_ms),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "unreadable frame");
                TickReport::Skipped
            }
        };
        match report {
            TickReport::Crossing { .. } => crossings += 1,
            TickReport::Skipped => skipped += 1,
            _ => {}
        }

        if cli.auto_confirm && pipeline.handle(Command::ConfirmRound, now_ms) != finish_line::CommandOutcome::Ignored {
            info!(round = pipeline.round(), "round auto-confirmed");
        }
    }

    info!(crossings, skipped, threshold = pipeline.threshold(), "replay finished");
    print!("{}", pipeline.report());

    if let Some(path) = &cli.snapshot {
        let mut store = JsonFileStore::new(path);
        pipeline
            .persist(&mut store)
            .with_context(|| format!("saving snapshot {}", path.display()))?;
        info!(path = %path.display(), "snapshot saved");
    }
    Ok(())
}
