//! False-color maps for single-channel rasters.

use image::{GrayImage, Rgb, RgbImage};

/// A 256-entry false-color palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    /// Blue -> cyan -> yellow -> red.
    Jet,
    /// Black -> red -> yellow -> white.
    Hot,
    /// Perceptually smoother rainbow, dark blue -> red.
    Turbo,
}

fn channel(v: f64) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let c = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    c
}

impl Colormap {
    /// Color for intensity `value`.
    #[must_use]
    pub fn color(self, value: u8) -> Rgb<u8> {
        let t = f64::from(value) / 255.0;
        match self {
            Self::Jet => Rgb([
                channel(1.5 - (4.0 * t - 3.0).abs()),
                channel(1.5 - (4.0 * t - 2.0).abs()),
                channel(1.5 - (4.0 * t - 1.0).abs()),
            ]),
            Self::Hot => Rgb([
                channel(3.0 * t),
                channel(3.0 * t - 1.0),
                channel(3.0 * t - 2.0),
            ]),
            Self::Turbo => {
                // Polynomial fit of the turbo palette.
                let r = 0.135_721_38
                    + t * (4.615_392_6
                        + t * (-42.660_322_58
                            + t * (132.131_082_34 + t * (-152.942_393_96 + t * 59.286_379_43))));
                let g = 0.091_402_61
                    + t * (2.194_188_39
                        + t * (4.842_966_58
                            + t * (-14.185_033_33 + t * (4.277_298_57 + t * 2.829_566_04))));
                let b = 0.106_673_3
                    + t * (12.641_946_08
                        + t * (-60.582_048_36
                            + t * (110.362_767_71 + t * (-89.903_109_12 + t * 27.348_249_73))));
                Rgb([channel(r), channel(g), channel(b)])
            }
        }
    }

    /// Colorize a grayscale image.
    #[must_use = "returns the colorized image"]
    pub fn apply(self, image: &GrayImage) -> RgbImage {
        let lut: Vec<Rgb<u8>> = (0..=255u8).map(|v| self.color(v)).collect();
        RgbImage::from_fn(image.width(), image.height(), |x, y| {
            lut[usize::from(image.get_pixel(x, y).0[0])]
        })
    }
}
