use crate::config::CalibrationConfig;

/// The scalar a region score must exceed to count as a crossing.
/// Always inside `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionThreshold {
    value: f64,
    min: f64,
    max: f64,
}

impl DetectionThreshold {
    pub fn new(config: &CalibrationConfig) -> Self {
        let mut threshold = Self {
            value: config.initial_threshold,
            min: config.min_threshold,
            max: config.max_threshold,
        };
        threshold.set(config.initial_threshold);
        threshold
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Manual override. Out-of-range values snap to the nearest bound; NaN is
    /// ignored. Returns the value actually applied.
    pub fn set(&mut self, value: f64) -> f64 {
        if !value.is_nan() {
            self.value = value.max(self.min).min(self.max);
        }
        self.value
    }

    /// `mean * multiplier + margin`, clamped.
    pub fn derive(&mut self, mean_noise: f64, config: &CalibrationConfig) -> f64 {
        self.set(mean_noise * config.multiplier + config.margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_override_clamps_to_bounds() {
        let config = CalibrationConfig::default();
        let mut threshold = DetectionThreshold::new(&config);
        assert_eq!(threshold.value(), 100.0);
        assert_eq!(threshold.set(1000.0), 400.0);
        assert_eq!(threshold.set(5.0), 60.0);
        assert_eq!(threshold.set(150.0), 150.0);
    }

    #[test]
    fn nan_override_is_ignored() {
        let mut threshold = DetectionThreshold::new(&CalibrationConfig::default());
        threshold.set(120.0);
        assert_eq!(threshold.set(f64::NAN), 120.0);
    }

    #[test]
    fn derive_scales_and_offsets() {
        let config = CalibrationConfig::default();
        let mut threshold = DetectionThreshold::new(&config);
        assert_eq!(threshold.derive(50.0, &config), 130.0);
        assert_eq!(threshold.derive(0.0, &config), 60.0);
        assert_eq!(threshold.derive(500.0, &config), 400.0);
    }
}
