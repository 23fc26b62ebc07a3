// THEORY:
// The `Pixel` module is the smallest unit the differencer works with: a "dumb"
// RGB triple read out of an RGBA buffer. Alpha is dropped on the way in; camera
// frames are opaque and transparency carries no motion information.
//
// The only heuristic kept here is the channel-wise absolute delta against another
// pixel, which is what the finish-line score is built from.

pub mod pixel {
    pub type Byte = u8;
    pub type Channel = Byte;
    pub type ChannelDelta = u32;

    /// Bytes per pixel in the RGBA buffers handed to the engine.
    pub const CHANNELS: usize = 4;

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Pixel {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Pixel { red, green, blue }
        }

        /// Sum of the absolute per-channel differences, in `0..=765`.
        #[inline]
        pub fn channel_delta(&self, other: &Pixel) -> ChannelDelta {
            self.red.abs_diff(other.red) as ChannelDelta
                + self.green.abs_diff(other.green) as ChannelDelta
                + self.blue.abs_diff(other.blue) as ChannelDelta
        }
    }

    impl From<[Byte; CHANNELS]> for Pixel {
        fn from(bytes: [Byte; CHANNELS]) -> Self {
            Pixel::new(bytes[0], bytes[1], bytes[2])
        }
    }

    /// Iterates the pixels of a tightly packed RGBA buffer. Trailing partial
    /// pixels are ignored.
    pub fn rgba_pixels(buffer: &[Byte]) -> impl Iterator<Item = Pixel> + '_ {
        buffer
            .chunks_exact(CHANNELS)
            .map(|c| Pixel::new(c[0], c[1], c[2]))
    }
}
