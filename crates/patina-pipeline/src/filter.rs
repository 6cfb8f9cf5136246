//! Small-kernel linear filtering with mirrored borders.
//!
//! `imageproc`'s filters replicate edge pixels, which makes a flat
//! border look like a step to second-derivative kernels. The metrics in
//! this crate instead mirror the image about its edge pixel
//! (`dcb|abcd|cba`), so a uniform image has a zero response everywhere.

use image::{GrayImage, Luma};

/// 4-neighbor Laplacian: second-derivative response.
pub const LAPLACIAN_4: [[f64; 3]; 3] = [[0.0, 1.0, 0.0], [1.0, -4.0, 1.0], [0.0, 1.0, 0.0]];

/// 8-neighbor high-pass kernel used for surface-texture detection.
pub const HIGH_PASS_8: [[f64; 3]; 3] = [[-1.0, -1.0, -1.0], [-1.0, 8.0, -1.0], [-1.0, -1.0, -1.0]];

/// Mirror an out-of-range index back into `0..len` without repeating
/// the edge sample.
pub(crate) fn reflect_101(i: i64, len: u32) -> u32 {
    let len = i64::from(len);
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut i = i.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let i = i as u32;
    i
}

/// Convolve a grayscale image with a 3x3 kernel, returning raw `f64`
/// responses in row-major order.
#[must_use]
pub fn convolve_3x3(image: &GrayImage, kernel: &[[f64; 3]; 3]) -> Vec<f64> {
    let (w, h) = image.dimensions();
    let mut out = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (ky, row) in kernel.iter().enumerate() {
                let sy = reflect_101(i64::from(y) + ky as i64 - 1, h);
                for (kx, &k) in row.iter().enumerate() {
                    if k == 0.0 {
                        continue;
                    }
                    let sx = reflect_101(i64::from(x) + kx as i64 - 1, w);
                    acc += k * f64::from(image.get_pixel(sx, sy).0[0]);
                }
            }
            out.push(acc);
        }
    }
    out
}

/// Convolve and saturate the response back into `0..=255`.
///
/// Negative responses clamp to 0, so only the bright side of a
/// high-pass response survives.
#[must_use = "returns the filtered image"]
pub fn convolve_3x3_saturating(image: &GrayImage, kernel: &[[f64; 3]; 3]) -> GrayImage {
    let (w, h) = image.dimensions();
    let raw = convolve_3x3(image, kernel);
    GrayImage::from_fn(w, h, |x, y| {
        let v = raw[(y * w + x) as usize];
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let v = v.round().clamp(0.0, 255.0) as u8;
        Luma([v])
    })
}

/// Gaussian sigma matching a square smoothing window of side `size`.
#[must_use]
pub fn window_sigma(size: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let half = (size as f32 - 1.0) * 0.5;
    0.3 * (half - 1.0) + 0.8
}

/// Population mean and variance of a sample.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_and_variance(values: impl IntoIterator<Item = f64> + Clone) -> (f64, f64) {
    let (count, sum) = values
        .clone()
        .into_iter()
        .fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let var = values
        .into_iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / count as f64;
    (mean, var)
}
