//! Global image-quality statistics over the grayscale channel.

use image::GrayImage;

use crate::filter::{LAPLACIAN_4, convolve_3x3, mean_and_variance};

/// Mean grayscale intensity.
#[must_use]
pub fn brightness(gray: &GrayImage) -> f64 {
    mean_and_variance(gray.as_raw().iter().map(|&v| f64::from(v))).0
}

/// Standard deviation of grayscale intensities.
#[must_use]
pub fn contrast(gray: &GrayImage) -> f64 {
    mean_and_variance(gray.as_raw().iter().map(|&v| f64::from(v)))
        .1
        .sqrt()
}

/// Variance of the 4-neighbor Laplacian response.
///
/// Blurry images have little second-derivative energy and score low.
#[must_use]
pub fn sharpness(gray: &GrayImage) -> f64 {
    let response = convolve_3x3(gray, &LAPLACIAN_4);
    mean_and_variance(response.iter().copied()).1
}

/// Shannon entropy of the 256-bin intensity histogram, in bits.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn entropy(gray: &GrayImage) -> f64 {
    let total = gray.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let mut histogram = [0u64; 256];
    for &v in gray.as_raw() {
        histogram[usize::from(v)] += 1;
    }
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn checkerboard(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 255 }]))
    }

    #[test]
    fn uniform_image_statistics() {
        let img = GrayImage::from_pixel(10, 10, Luma([77]));
        assert!((brightness(&img) - 77.0).abs() < 1e-12);
        assert!(contrast(&img).abs() < 1e-12);
        assert!(sharpness(&img).abs() < 1e-12);
        assert!(entropy(&img).abs() < 1e-12);
    }

    #[test]
    fn checkerboard_has_one_bit_of_entropy() {
        let img = checkerboard(8);
        assert!((entropy(&img) - 1.0).abs() < 1e-12);
        assert!((brightness(&img) - 127.5).abs() < 1e-12);
        assert!((contrast(&img) - 127.5).abs() < 1e-12);
    }

    #[test]
    fn blur_lowers_sharpness() {
        let sharp = checkerboard(16);
        let soft = imageproc::filter::gaussian_blur_f32(&sharp, 2.0);
        assert!(sharpness(&sharp) > sharpness(&soft));
    }

    #[test]
    fn entropy_is_bounded_by_eight_bits() {
        let img = GrayImage::from_fn(16, 16, |x, y| Luma([u8::try_from(y * 16 + x).unwrap_or(0)]));
        assert!((entropy(&img) - 8.0).abs() < 1e-12);
    }
}
