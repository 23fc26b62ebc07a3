// THEORY:
// A `FrameSample` is one capture from the camera: a tightly packed RGBA grid tagged
// with the monotonic time it was taken. It is the "dumb" data container of the
// engine, the equivalent of a chunk of pixels in a larger vision pipeline.
//
// Key architectural principles:
// 1.  **Validated at the boundary**: A sample can only be built from a buffer whose
//     length matches its dimensions. Everything downstream indexes without checks.
// 2.  **Band extraction**: The finish line is a thin vertical band. `band` slices
//     those columns out of the full frame row by row, so the differencer only ever
//     holds the region of interest between ticks, not whole frames.
// 3.  **Transient ownership**: Samples are moved, never shared. The differencer
//     takes the band by value and keeps it as "previous" until the next tick.

use crate::config::RegionOfInterest;
use crate::core_modules::pixel::pixel::{Byte, CHANNELS};
use crate::error::FrameError;
use image::RgbaImage;

/// Milliseconds on a monotonic clock.
pub type Millis = f64;

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSample {
    width: u32,
    height: u32,
    timestamp_ms: Millis,
    data: Vec<Byte>,
}

impl FrameSample {
    pub fn new(width: u32, height: u32, data: Vec<Byte>, timestamp_ms: Millis) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::Empty { width, height });
        }
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(FrameError::BufferLength {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            timestamp_ms,
            data,
        })
    }

    /// Wraps a decoded image. `RgbaImage` buffers are always well-formed, so only
    /// empty images can fail.
    pub fn from_image(image: RgbaImage, timestamp_ms: Millis) -> Result<Self, FrameError> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw(), timestamp_ms)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn timestamp_ms(&self) -> Millis {
        self.timestamp_ms
    }

    pub fn data(&self) -> &[Byte] {
        &self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Copies the finish-line columns, full height, into a new sample with the
    /// same timestamp.
    pub fn band(&self, region: &RegionOfInterest) -> FrameSample {
        let (start, end) = region.columns(self.width);
        let band_width = end - start;
        let row_bytes = self.width as usize * CHANNELS;
        let band_bytes = band_width as usize * CHANNELS;
        let offset = start as usize * CHANNELS;

        let mut data = Vec::with_capacity(band_bytes * self.height as usize);
        for row in self.data.chunks_exact(row_bytes) {
            data.extend_from_slice(&row[offset..offset + band_bytes]);
        }

        FrameSample {
            width: band_width,
            height: self.height,
            timestamp_ms: self.timestamp_ms,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = vec![255u8; (width * height * 4) as usize];
        for (i, px) in buffer.chunks_mut(4).enumerate() {
            let x = (i as u32 % width) as u8;
            px[0] = x;
            px[1] = x;
            px[2] = x;
        }
        buffer
    }

    #[test]
    fn rejects_short_buffer() {
        let err = FrameSample::new(4, 4, vec![0; 10], 0.0).unwrap_err();
        assert_eq!(
            err,
            FrameError::BufferLength {
                width: 4,
                height: 4,
                expected: 64,
                actual: 10
            }
        );
    }

    #[test]
    fn rejects_empty_frame() {
        assert!(matches!(
            FrameSample::new(0, 10, Vec::new(), 0.0),
            Err(FrameError::Empty { .. })
        ));
    }

    #[test]
    fn band_extracts_center_columns() {
        let frame = FrameSample::new(20, 3, gradient(20, 3), 12.5).unwrap();
        let region = RegionOfInterest {
            center_x: 0.5,
            thickness: 0.2,
        };
        let band = frame.band(&region);
        assert_eq!(band.dimensions(), (4, 3));
        assert_eq!(band.timestamp_ms(), 12.5);
        // Every row holds columns 8..12.
        for row in band.data().chunks_exact(16) {
            let reds: Vec<u8> = row.chunks_exact(4).map(|p| p[0]).collect();
            assert_eq!(reds, vec![8, 9, 10, 11]);
        }
    }

    #[test]
    fn from_image_keeps_dimensions() {
        let image = RgbaImage::new(8, 6);
        let frame = FrameSample::from_image(image, 1.0).unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
        assert_eq!(frame.pixel_count(), 48);
    }
}
