// THEORY:
// The `RegionDifferencer` turns a stream of finish-line bands into a stream of
// scalar motion scores. It is the only stateful piece of the sensing layer: it owns
// the previous band between ticks and nothing else.
//
// Key architectural principles:
// 1.  **Pairwise, aligned comparison**: A score is the mean over all pixels of the
//     summed absolute RGB deltas between the previous and the current band. Two
//     bands are only compared when their dimensions match exactly.
// 2.  **Silent resynchronisation**: When the camera changes resolution, the first
//     band at the new size has nothing to compare against. That tick yields no
//     score, the new band becomes the reference, and scoring resumes on the next
//     tick. A resize is never an error.
// 3.  **Ownership transfer**: `score` takes the current band by value; after the
//     call it is the new reference and the old one is dropped.

use crate::core_modules::frame::FrameSample;
use crate::core_modules::pixel::pixel::rgba_pixels;

/// Mean absolute RGB change per pixel across the region of interest.
pub type RegionScore = f64;

#[derive(Debug, Default)]
pub struct RegionDifferencer {
    previous: Option<FrameSample>,
}

impl RegionDifferencer {
    pub fn new() -> Self {
        Self { previous: None }
    }

    /// Scores `current` against the held band and keeps `current` for next time.
    /// Returns `None` on the first band and after any dimension change.
    pub fn score(&mut self, current: FrameSample) -> Option<RegionScore> {
        let score = match &self.previous {
            Some(previous) if previous.dimensions() == current.dimensions() => {
                Some(mean_channel_delta(previous, &current))
            }
            Some(previous) => {
                tracing::debug!(
                    previous = ?previous.dimensions(),
                    current = ?current.dimensions(),
                    "finish-line band resized, resynchronising"
                );
                None
            }
            None => None,
        };
        self.previous = Some(current);
        score
    }

    pub fn has_reference(&self) -> bool {
        self.previous.is_some()
    }

    /// Drops the reference band; the next band scores nothing.
    pub fn clear(&mut self) {
        self.previous = None;
    }
}

fn mean_channel_delta(previous: &FrameSample, current: &FrameSample) -> RegionScore {
    let pixels = current.pixel_count();
    if pixels == 0 {
        return 0.0;
    }
    let total: u64 = rgba_pixels(previous.data())
        .zip(rgba_pixels(current.data()))
        .map(|(a, b)| a.channel_delta(&b) as u64)
        .sum();
    total as f64 / pixels as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8, ts: f64) -> FrameSample {
        let mut data = vec![value; (width * height * 4) as usize];
        for px in data.chunks_mut(4) {
            px[3] = 255;
        }
        FrameSample::new(width, height, data, ts).unwrap()
    }

    #[test]
    fn first_band_has_no_score() {
        let mut differencer = RegionDifferencer::new();
        assert_eq!(differencer.score(solid(2, 2, 0, 0.0)), None);
        assert!(differencer.has_reference());
    }

    #[test]
    fn identical_bands_score_zero() {
        let mut differencer = RegionDifferencer::new();
        differencer.score(solid(3, 5, 40, 0.0));
        assert_eq!(differencer.score(solid(3, 5, 40, 16.0)), Some(0.0));
    }

    #[test]
    fn score_sums_channels_and_averages_pixels() {
        let mut differencer = RegionDifferencer::new();
        differencer.score(solid(2, 2, 10, 0.0));
        // Every pixel moves by 20 on each of R, G and B.
        assert_eq!(differencer.score(solid(2, 2, 30, 16.0)), Some(60.0));
    }

    #[test]
    fn partial_change_is_averaged() {
        let mut differencer = RegionDifferencer::new();
        differencer.score(solid(2, 1, 0, 0.0));
        let mut data = vec![0u8; 8];
        data[0..3].copy_from_slice(&[255, 255, 255]);
        let frame = FrameSample::new(2, 1, data, 16.0).unwrap();
        assert_eq!(differencer.score(frame), Some(765.0 / 2.0));
    }

    #[test]
    fn resize_skips_one_tick_then_resumes() {
        let mut differencer = RegionDifferencer::new();
        differencer.score(solid(4, 4, 0, 0.0));
        assert_eq!(differencer.score(solid(2, 4, 0, 16.0)), None);
        assert_eq!(differencer.score(solid(2, 4, 1, 32.0)), Some(3.0));
    }

    #[test]
    fn clear_forgets_reference() {
        let mut differencer = RegionDifferencer::new();
        differencer.score(solid(1, 1, 0, 0.0));
        differencer.clear();
        assert!(!differencer.has_reference());
        assert_eq!(differencer.score(solid(1, 1, 9, 16.0)), None);
    }
}
