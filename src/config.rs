// THEORY:
// One configuration struct replaces every hand-rolled variant of the stopwatch
// (named runners or not, rounds or not, inter-runner cooldown or not). The engine
// reads these values once at construction; nothing here changes at runtime except
// through an explicit new `LapTimingPipeline`.
//
// All fields carry serde defaults, so a partial TOML or JSON file only needs to
// name what it overrides.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DETECTION_COOLDOWN_MS: f64 = 500.0;
pub const DEFAULT_MIN_VALID_LAP_MS: f64 = 3000.0;
pub const DEFAULT_INTER_RUNNER_COOLDOWN_MS: f64 = 3000.0;
pub const DEFAULT_CALIBRATION_WINDOW_MS: f64 = 3000.0;

/// What to do with a crossing that arrives before the minimum lap time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortLapPolicy {
    /// Discard the interval and wait for a new starting crossing.
    #[default]
    Stop,
    /// Stay running, restarting the interval at the rejected crossing.
    RestartInterval,
    /// Stay running with the original interval start.
    KeepRunning,
}

/// Parameters of the warm-up window that derives the detection threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub window_ms: f64,
    pub multiplier: f64,
    pub margin: f64,
    pub min_threshold: f64,
    pub max_threshold: f64,
    /// Threshold in force before the first calibration completes.
    pub initial_threshold: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_CALIBRATION_WINDOW_MS,
            multiplier: 2.0,
            margin: 30.0,
            min_threshold: 60.0,
            max_threshold: 400.0,
            initial_threshold: 100.0,
        }
    }
}

/// The finish-line band, as fractions of the frame width. Always full height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionOfInterest {
    pub center_x: f64,
    pub thickness: f64,
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self {
            center_x: 0.5,
            thickness: 0.05,
        }
    }
}

impl RegionOfInterest {
    /// Pixel column range `[start, end)` for a frame of `width` pixels.
    /// Never empty for a non-zero width.
    pub fn columns(&self, width: u32) -> (u32, u32) {
        let w = width as f64;
        let half = self.thickness / 2.0;
        let start = (w * (self.center_x - half)).floor().clamp(0.0, w) as u32;
        let end = (w * (self.center_x + half)).ceil().clamp(0.0, w) as u32;
        if end > start {
            (start, end)
        } else {
            let start = start.min(width.saturating_sub(1));
            (start, start + 1)
        }
    }
}

/// Configuration for the LapTimingPipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub use_named_runners: bool,
    pub use_rounds: bool,
    /// Pause between runners. Zero returns straight to Stopped.
    pub inter_runner_cooldown_ms: f64,
    pub min_valid_lap_ms: f64,
    pub detection_cooldown_ms: f64,
    pub short_lap_policy: ShortLapPolicy,
    pub calibration: CalibrationConfig,
    pub region: RegionOfInterest,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            use_named_runners: true,
            use_rounds: true,
            inter_runner_cooldown_ms: DEFAULT_INTER_RUNNER_COOLDOWN_MS,
            min_valid_lap_ms: DEFAULT_MIN_VALID_LAP_MS,
            detection_cooldown_ms: DEFAULT_DETECTION_COOLDOWN_MS,
            short_lap_policy: ShortLapPolicy::default(),
            calibration: CalibrationConfig::default(),
            region: RegionOfInterest::default(),
        }
    }
}

impl TimerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file, picking the format by extension.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::validation("path", format!("cannot read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(ConfigError::validation(
                "path",
                format!("unsupported config extension: {other:?}"),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("inter_runner_cooldown_ms", self.inter_runner_cooldown_ms),
            ("min_valid_lap_ms", self.min_valid_lap_ms),
            ("detection_cooldown_ms", self.detection_cooldown_ms),
            ("calibration.window_ms", self.calibration.window_ms),
        ];
        for (field, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::validation(
                    field,
                    format!("must be a finite, non-negative duration, got {value}"),
                ));
            }
        }

        let cal = &self.calibration;
        if !(cal.min_threshold.is_finite() && cal.max_threshold.is_finite()) {
            return Err(ConfigError::validation(
                "calibration",
                "threshold bounds must be finite",
            ));
        }
        if cal.min_threshold > cal.max_threshold {
            return Err(ConfigError::validation(
                "calibration.min_threshold",
                format!(
                    "{} exceeds max_threshold {}",
                    cal.min_threshold, cal.max_threshold
                ),
            ));
        }
        if !(cal.multiplier.is_finite() && cal.margin.is_finite() && cal.initial_threshold.is_finite()) {
            return Err(ConfigError::validation(
                "calibration",
                "multiplier, margin and initial_threshold must be finite",
            ));
        }

        let region = &self.region;
        if !(region.thickness > 0.0 && region.thickness <= 1.0) {
            return Err(ConfigError::validation(
                "region.thickness",
                format!("must be in (0, 1], got {}", region.thickness),
            ));
        }
        if !(region.center_x > 0.0 && region.center_x <= 1.0) {
            return Err(ConfigError::validation(
                "region.center_x",
                format!("must be in (0, 1], got {}", region.center_x),
            ));
        }
        Ok(())
    }
}
