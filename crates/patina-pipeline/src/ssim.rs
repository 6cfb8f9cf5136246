//! Windowed structural similarity (SSIM).
//!
//! Standard formulation (Wang et al., 2004) with a uniform 7x7 window,
//! sample covariance, an 8-bit data range and the usual stabilizing
//! constants `K1 = 0.01`, `K2 = 0.03`. Local statistics are box
//! filtered over a symmetrically padded image, and the mean score
//! ignores a border of half a window where the statistics are padded.
//!
//! For identical inputs every local term cancels exactly, so the map is
//! exactly `1.0` everywhere.

use image::GrayImage;

/// Default SSIM window side.
pub const WINDOW: u32 = 7;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Per-pixel SSIM map plus its cropped mean.
#[derive(Debug, Clone, PartialEq)]
pub struct SsimMap {
    width: u32,
    height: u32,
    values: Vec<f64>,
    mean: f64,
}

impl SsimMap {
    /// Map width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Map height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Mean SSIM over the map interior (may be slightly negative for
    /// anti-correlated images).
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// SSIM at pixel `(x, y)`.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f64 {
        self.values[(y * self.width + x) as usize]
    }

    /// Row-major SSIM values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Dissimilarity `1 - SSIM` scaled to `0..=255` (truncated).
    #[must_use = "returns the dissimilarity image"]
    pub fn dissimilarity(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let d = (1.0 - self.get(x, y)) * 255.0;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let d = d.clamp(0.0, 255.0) as u8;
            image::Luma([d])
        })
    }
}

/// Symmetric (half-sample) reflection of an index into `0..len`.
fn reflect(i: i64, len: i64) -> usize {
    let period = 2 * len;
    let mut i = i.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let i = i as usize;
    i
}

/// Box mean of `values` (row-major `w x h`) over a `win x win` window
/// centered on each pixel, via a summed-area table over the padded
/// image.
fn box_mean(values: &[f64], w: usize, h: usize, win: usize) -> Vec<f64> {
    let pad = win / 2;
    let pw = w + 2 * pad;
    let ph = h + 2 * pad;
    let stride = pw + 1;
    let mut integral = vec![0.0; stride * (ph + 1)];
    for py in 0..ph {
        let sy = reflect(py as i64 - pad as i64, h as i64);
        let mut row_sum = 0.0;
        for px in 0..pw {
            let sx = reflect(px as i64 - pad as i64, w as i64);
            row_sum += values[sy * w + sx];
            integral[(py + 1) * stride + px + 1] = integral[py * stride + px + 1] + row_sum;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let area = (win * win) as f64;
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let (x0, y0, x1, y1) = (x, y, x + win, y + win);
            let sum = integral[y1 * stride + x1] - integral[y0 * stride + x1]
                - integral[y1 * stride + x0]
                + integral[y0 * stride + x0];
            out.push(sum / area);
        }
    }
    out
}

/// Window side actually used for an image of `w x h`: the default
/// window, shrunk to the largest odd size that fits small images.
fn window_for(w: u32, h: u32) -> usize {
    let fit = WINDOW.min(w).min(h).max(1);
    let odd = if fit % 2 == 0 { fit - 1 } else { fit };
    odd as usize
}

/// Compute the SSIM map between two equally sized grayscale images.
///
/// # Panics
///
/// Debug builds assert that both images have the same dimensions;
/// callers normalize the pair first.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::many_single_char_names)]
pub fn ssim(a: &GrayImage, b: &GrayImage) -> SsimMap {
    debug_assert_eq!(a.dimensions(), b.dimensions(), "SSIM inputs must match");
    let (width, height) = a.dimensions();
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return SsimMap {
            width,
            height,
            values: Vec::new(),
            mean: 1.0,
        };
    }

    let win = window_for(width, height);
    let np = (win * win) as f64;
    let cov_norm = if np > 1.0 { np / (np - 1.0) } else { 1.0 };

    let xs: Vec<f64> = a.as_raw().iter().map(|&v| f64::from(v)).collect();
    let ys: Vec<f64> = b.as_raw().iter().map(|&v| f64::from(v)).collect();
    let xx: Vec<f64> = xs.iter().map(|v| v * v).collect();
    let yy: Vec<f64> = ys.iter().map(|v| v * v).collect();
    let xy: Vec<f64> = xs.iter().zip(&ys).map(|(p, q)| p * q).collect();

    let ux = box_mean(&xs, w, h, win);
    let uy = box_mean(&ys, w, h, win);
    let uxx = box_mean(&xx, w, h, win);
    let uyy = box_mean(&yy, w, h, win);
    let uxy = box_mean(&xy, w, h, win);

    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let values: Vec<f64> = (0..w * h)
        .map(|i| {
            let (mx, my) = (ux[i], uy[i]);
            let vx = cov_norm * (uxx[i] - mx * mx);
            let vy = cov_norm * (uyy[i] - my * my);
            let vxy = cov_norm * (uxy[i] - mx * my);
            let num = (2.0 * mx * my + c1) * (2.0 * vxy + c2);
            let den = (mx * mx + my * my + c1) * (vx + vy + c2);
            num / den
        })
        .collect();

    let pad = win / 2;
    let mean = if w > 2 * pad && h > 2 * pad {
        let mut sum = 0.0;
        for y in pad..h - pad {
            for x in pad..w - pad {
                sum += values[y * w + x];
            }
        }
        sum / ((w - 2 * pad) * (h - 2 * pad)) as f64
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    };

    SsimMap {
        width,
        height,
        values,
        mean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            image::Luma([u8::try_from((x * 7 + y * 3) % 256).unwrap_or(0)])
        })
    }

    #[test]
    fn identical_images_score_exactly_one() {
        let img = gradient(40, 30);
        let map = ssim(&img, &img);
        assert!((map.mean() - 1.0).abs() == 0.0, "mean={}", map.mean());
        assert!(map.values().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn identical_images_have_zero_dissimilarity() {
        let img = gradient(20, 20);
        let d = ssim(&img, &img).dissimilarity();
        assert!(d.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn different_images_score_below_one() {
        let a = gradient(40, 40);
        let b = GrayImage::from_fn(40, 40, |x, y| {
            image::Luma([u8::try_from((x * 13 + y * 29) % 256).unwrap_or(0)])
        });
        let map = ssim(&a, &b);
        assert!(map.mean() < 0.9, "mean={}", map.mean());
    }

    #[test]
    fn local_change_is_localized() {
        let a = GrayImage::from_pixel(50, 50, image::Luma([100]));
        let mut b = a.clone();
        for y in 20..25 {
            for x in 20..25 {
                b.put_pixel(x, y, image::Luma([250]));
            }
        }
        let map = ssim(&a, &b);
        assert!(map.get(22, 22) < 0.5);
        assert!((map.get(2, 2) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tiny_images_shrink_the_window() {
        let img = gradient(3, 2);
        let map = ssim(&img, &img);
        assert_eq!(map.values().len(), 6);
        assert!((map.mean() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn one_pixel_images_are_supported() {
        let a = GrayImage::from_pixel(1, 1, image::Luma([10]));
        let b = GrayImage::from_pixel(1, 1, image::Luma([200]));
        let map = ssim(&a, &b);
        assert!(map.mean() < 1.0);
        assert!(map.mean().is_finite());
    }

    #[test]
    fn box_mean_of_constant_is_constant() {
        let values = vec![3.0; 12];
        let out = box_mean(&values, 4, 3, 3);
        assert!(out.iter().all(|v| (v - 3.0).abs() < 1e-12));
    }

    #[test]
    fn reflect_is_half_sample_symmetric() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
    }
}
