//! Image decoding and color-space conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the
//! 3-channel working image, plus the single-channel luminance and the
//! per-pixel hue/saturation/value conversion used by later stages.
//!
//! HSV uses the 8-bit convention common to inspection tooling: hue in
//! `0..180` (degrees halved), saturation and value in `0..=255`.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::types::PipelineError;

/// Decode raw image bytes into an 8-bit RGB image.
///
/// Alpha is discarded and higher bit depths are reduced to 8 bits.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageLoad`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Luminance of one RGB pixel: `0.299*R + 0.587*G + 0.114*B`, rounded.
///
/// Computed in 14-bit fixed point so results are exact and
/// platform-independent.
#[must_use]
pub fn luma(pixel: Rgb<u8>) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    let [r, g, b] = pixel.0;
    let y = (u32::from(r) * R + u32::from(g) * G + u32::from(b) * B + (1 << 13)) >> 14;
    #[allow(clippy::cast_possible_truncation)]
    let y = y.min(255) as u8;
    y
}

/// Convert an RGB image to single-channel luminance.
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([luma(*image.get_pixel(x, y))])
    })
}

/// Convert one RGB pixel to 8-bit HSV.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]
pub fn hsv(pixel: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0.map(i32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v == 0 {
        0
    } else {
        (f64::from(255 * delta) / f64::from(v)).round() as i32
    };

    let h = if delta == 0 {
        0.0
    } else {
        let d = f64::from(delta);
        let deg = if v == r {
            60.0 * f64::from(g - b) / d
        } else if v == g {
            120.0 + 60.0 * f64::from(b - r) / d
        } else {
            240.0 + 60.0 * f64::from(r - g) / d
        };
        if deg < 0.0 { deg + 360.0 } else { deg }
    };
    let h = ((h / 2.0).round() as i32) % 180;

    [h as u8, s.clamp(0, 255) as u8, v as u8]
}

/// Histogram-equalize a grayscale image.
///
/// Spreads intensities over the full range so the global similarity
/// score is less sensitive to exposure differences between captures.
#[must_use = "returns the equalized image"]
pub fn equalize(image: &GrayImage) -> GrayImage {
    imageproc::contrast::equalize_histogram(image)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode an RGB image as a PNG byte buffer.
    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode_rgb(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_return_image_load_error() {
        let result = decode_rgb(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageLoad(_))));
    }

    #[test]
    fn png_decodes_with_dimensions() {
        let img = RgbImage::from_pixel(17, 31, Rgb([10, 20, 30]));
        let decoded = decode_rgb(&encode_png(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (17, 31));
        assert_eq!(decoded.get_pixel(3, 3), &Rgb([10, 20, 30]));
    }

    #[test]
    fn luma_weights_green_over_red_over_blue() {
        let r = luma(Rgb([255, 0, 0]));
        let g = luma(Rgb([0, 255, 0]));
        let b = luma(Rgb([0, 0, 255]));
        assert!(g > r && r > b, "R={r} G={g} B={b}");
        assert_eq!(r, 76);
        assert_eq!(g, 150);
        assert_eq!(b, 29);
    }

    #[test]
    fn luma_of_gray_is_identity() {
        for v in [0u8, 1, 77, 128, 254, 255] {
            assert_eq!(luma(Rgb([v, v, v])), v);
        }
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv(Rgb([255, 0, 0])), [0, 255, 255]);
        assert_eq!(hsv(Rgb([0, 255, 0])), [60, 255, 255]);
        assert_eq!(hsv(Rgb([0, 0, 255])), [120, 255, 255]);
    }

    #[test]
    fn hsv_of_gray_has_no_hue_or_saturation() {
        assert_eq!(hsv(Rgb([90, 90, 90])), [0, 0, 90]);
        assert_eq!(hsv(Rgb([0, 0, 0])), [0, 0, 0]);
    }

    #[test]
    fn hsv_of_rust_orange() {
        // 24 degrees -> 12 on the halved scale.
        let [h, s, v] = hsv(Rgb([180, 90, 30]));
        assert_eq!(h, 12);
        assert_eq!(s, 213);
        assert_eq!(v, 180);
    }

    #[test]
    fn to_gray_preserves_dimensions() {
        let img = RgbImage::new(13, 7);
        assert_eq!(to_gray(&img).dimensions(), (13, 7));
    }

    #[test]
    fn equalize_stretches_narrow_range() {
        let img = GrayImage::from_fn(16, 16, |x, _| Luma([100 + u8::try_from(x % 4).unwrap()]));
        let eq = equalize(&img);
        let max = eq.pixels().map(|p| p.0[0]).max().unwrap();
        assert_eq!(max, 255);
    }
}
