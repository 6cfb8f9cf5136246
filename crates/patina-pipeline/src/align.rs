//! Feature-based alignment of the "after" image onto the "before" frame.
//!
//! Alignment is best effort: when too few confident matches are found
//! or no homography fits them, the unaligned "after" image is passed
//! through and the failure is reported as a value, never as an error.

use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::AlignmentConfig;
use crate::features::{Match, detect_and_describe, ratio_matches};
use crate::grayscale::to_gray;
use crate::homography::{HomographyError, RansacConfig, fit_ransac};

/// Why alignment fell back to the unaligned image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlignmentFailure {
    /// One of the images produced no keypoints.
    #[error("no keypoints found in the {0} image")]
    NoFeatures(&'static str),

    /// The ratio test left too few matches.
    #[error("only {found} confident matches, need {required}")]
    TooFewMatches {
        /// Matches surviving the ratio test.
        found: usize,
        /// Configured minimum.
        required: usize,
    },

    /// Robust homography estimation failed.
    #[error("homography estimation failed: {0}")]
    Homography(#[from] HomographyError),

    /// The estimated homography cannot be used for resampling.
    #[error("estimated transform is not invertible")]
    DegenerateTransform,
}

/// What the alignment stage did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignmentOutcome {
    /// The "after" image was warped into the "before" frame.
    Aligned {
        /// Matches surviving the ratio test.
        matches: usize,
        /// RANSAC inliers among them.
        inliers: usize,
    },
    /// Alignment was disabled by configuration.
    Skipped,
    /// Alignment was attempted and fell back to the unaligned image.
    Failed(AlignmentFailure),
}

/// The "after" image in the "before" frame, plus how it got there.
#[derive(Debug, Clone)]
pub struct AlignmentResult {
    /// Aligned image, or the unmodified input on skip/failure.
    pub transformed_image: RgbImage,
    /// Stage outcome.
    pub outcome: AlignmentOutcome,
}

impl AlignmentResult {
    /// Pass `after` through unchanged because alignment is disabled.
    #[must_use]
    pub const fn skipped(after: RgbImage) -> Self {
        Self {
            transformed_image: after,
            outcome: AlignmentOutcome::Skipped,
        }
    }

    /// Whether the image was actually warped.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.outcome, AlignmentOutcome::Aligned { .. })
    }

    /// The failure reason, if alignment was attempted and failed.
    #[must_use]
    pub const fn failure(&self) -> Option<&AlignmentFailure> {
        match &self.outcome {
            AlignmentOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Estimate the homography mapping `after` pixel coordinates onto
/// `before`, returning it with the match and inlier counts.
///
/// # Errors
///
/// Returns the [`AlignmentFailure`] that stopped estimation.
pub fn estimate_transform(
    before: &RgbImage,
    after: &RgbImage,
    config: &AlignmentConfig,
    rng: &mut impl Rng,
) -> Result<(Matrix3<f64>, usize, usize), AlignmentFailure> {
    let before_features = detect_and_describe(&to_gray(before), config.max_features);
    if before_features.is_empty() {
        return Err(AlignmentFailure::NoFeatures("before"));
    }
    let after_features = detect_and_describe(&to_gray(after), config.max_features);
    if after_features.is_empty() {
        return Err(AlignmentFailure::NoFeatures("after"));
    }

    let matches: Vec<Match> = ratio_matches(
        &before_features.descriptors,
        &after_features.descriptors,
        config.ratio,
    );
    tracing::debug!(
        before = before_features.len(),
        after = after_features.len(),
        matches = matches.len(),
        "feature matching complete",
    );
    if matches.len() < config.min_matches {
        return Err(AlignmentFailure::TooFewMatches {
            found: matches.len(),
            required: config.min_matches,
        });
    }

    let (src, dst): (Vec<[f64; 2]>, Vec<[f64; 2]>) = matches
        .iter()
        .map(|m| {
            let a = after_features.keypoints[m.train];
            let b = before_features.keypoints[m.query];
            ([a.x, a.y], [b.x, b.y])
        })
        .unzip();
    let ransac = RansacConfig {
        max_iters: config.ransac_iterations,
        inlier_threshold: config.ransac_threshold,
        ..RansacConfig::default()
    };
    let fit = fit_ransac(&src, &dst, &ransac, rng)?;
    Ok((fit.h, matches.len(), fit.n_inliers))
}

/// Bilinear sample of `image` at `(x, y)`.
///
/// Neighbors outside the image contribute black, so integer
/// coordinates reproduce the source pixel exactly.
fn sample_bilinear(image: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    if !x.is_finite() || !y.is_finite() {
        return Rgb([0, 0, 0]);
    }
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let mut acc = [0.0f64; 3];
    for (dy, wy) in [(0.0, 1.0 - fy), (1.0, fy)] {
        for (dx, wx) in [(0.0, 1.0 - fx), (1.0, fx)] {
            let weight = wx * wy;
            let (sx, sy) = (x0 + dx, y0 + dy);
            if weight <= 0.0 || sx < 0.0 || sy < 0.0 {
                continue;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let (sx, sy) = (sx as u32, sy as u32);
            if let Some(p) = image.get_pixel_checked(sx, sy) {
                for (a, v) in acc.iter_mut().zip(p.0) {
                    *a += weight * f64::from(v);
                }
            }
        }
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    Rgb(acc.map(channel))
}

/// Resample `after` through `h` into a frame of the same size.
///
/// Pixels with no source are black. Returns `None` when `h` is not
/// invertible.
#[must_use]
pub fn warp_into_frame(after: &RgbImage, h: &Matrix3<f64>) -> Option<RgbImage> {
    let inverse = h.try_inverse()?;
    if !inverse.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(RgbImage::from_fn(after.width(), after.height(), |x, y| {
        let p = inverse * Vector3::new(f64::from(x), f64::from(y), 1.0);
        if p.z.abs() < f64::EPSILON {
            return Rgb([0, 0, 0]);
        }
        sample_bilinear(after, p.x / p.z, p.y / p.z)
    }))
}

/// Align `after` onto `before` with an explicit random source for the
/// robust estimator.
#[must_use]
pub fn align_with_rng(
    before: &RgbImage,
    after: RgbImage,
    config: &AlignmentConfig,
    rng: &mut impl Rng,
) -> AlignmentResult {
    let estimated = estimate_transform(before, &after, config, rng).and_then(|(h, matches, inliers)| {
        warp_into_frame(&after, &h)
            .map(|warped| (warped, matches, inliers))
            .ok_or(AlignmentFailure::DegenerateTransform)
    });
    match estimated {
        Ok((warped, matches, inliers)) => {
            tracing::debug!(matches, inliers, "after image aligned");
            AlignmentResult {
                transformed_image: warped,
                outcome: AlignmentOutcome::Aligned { matches, inliers },
            }
        }
        Err(reason) => {
            tracing::warn!(%reason, "alignment failed, using unaligned images");
            AlignmentResult {
                transformed_image: after,
                outcome: AlignmentOutcome::Failed(reason),
            }
        }
    }
}

/// Align `after` onto `before`, seeding the estimator from `config.seed`.
#[must_use]
pub fn align(before: &RgbImage, after: RgbImage, config: &AlignmentConfig) -> AlignmentResult {
    let mut rng = StdRng::seed_from_u64(config.seed);
    align_with_rng(before, after, config, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(width: u32, height: u32) -> RgbImage {
        let mut rng = StdRng::seed_from_u64(11);
        let stride = width / 8 + 2;
        let cells: Vec<[u8; 3]> = (0..(stride * (height / 8 + 2)))
            .map(|_| [rng.r#gen(), rng.r#gen(), rng.r#gen()])
            .collect();
        RgbImage::from_fn(width, height, |x, y| Rgb(cells[((y / 8) * stride + x / 8) as usize]))
    }

    fn shifted(image: &RgbImage, dx: u32, dy: u32) -> RgbImage {
        RgbImage::from_fn(image.width(), image.height(), |x, y| {
            if x >= dx && y >= dy {
                *image.get_pixel(x - dx, y - dy)
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn skipped_is_not_success() {
        let result = AlignmentResult::skipped(RgbImage::new(4, 4));
        assert!(!result.success());
        assert!(result.failure().is_none());
        assert_eq!(result.outcome, AlignmentOutcome::Skipped);
    }

    #[test]
    fn featureless_images_fall_back_to_input() {
        let before = RgbImage::from_pixel(120, 100, Rgb([50, 60, 70]));
        let after = RgbImage::from_pixel(120, 100, Rgb([52, 61, 69]));
        let result = align(&before, after.clone(), &AlignmentConfig::default());
        assert!(!result.success());
        assert!(matches!(
            result.failure(),
            Some(AlignmentFailure::NoFeatures("before"))
        ));
        assert_eq!(result.transformed_image, after);
    }

    #[test]
    fn translated_copy_is_registered() {
        let before = textured(320, 240);
        let after = shifted(&before, 6, 4);
        let result = align(&before, after, &AlignmentConfig::default());
        assert!(result.success(), "outcome: {:?}", result.outcome);

        // Interior pixels line up with the original again.
        let mut mismatched = 0;
        for y in 40..200 {
            for x in 40..280 {
                let a = before.get_pixel(x, y).0;
                let b = result.transformed_image.get_pixel(x, y).0;
                if a.iter().zip(b.iter()).any(|(p, q)| p.abs_diff(*q) > 40) {
                    mismatched += 1;
                }
            }
        }
        assert!(mismatched < 2000, "{mismatched} pixels still misaligned");
    }

    #[test]
    fn identity_warp_preserves_image() {
        let img = textured(40, 30);
        let warped = warp_into_frame(&img, &Matrix3::identity()).unwrap_or_default();
        assert_eq!(warped, img);
    }

    #[test]
    fn half_pixel_shift_blends_neighbors() {
        let img = RgbImage::from_fn(4, 1, |x, _| if x < 2 { Rgb([0, 0, 0]) } else { Rgb([200, 200, 200]) });
        // Maps after -> before by shifting left half a pixel.
        let h = Matrix3::new(1.0, 0.0, -0.5, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let warped = warp_into_frame(&img, &h).unwrap_or_default();
        assert_eq!(warped.get_pixel(1, 0).0, [100, 100, 100]);
        assert_eq!(warped.get_pixel(2, 0).0, [200, 200, 200]);
    }

    #[test]
    fn singular_transform_is_rejected() {
        let img = textured(40, 30);
        assert!(warp_into_frame(&img, &Matrix3::zeros()).is_none());
    }

    #[test]
    fn alignment_is_reproducible() {
        let before = textured(240, 200);
        let after = shifted(&before, 3, 5);
        let a = align(&before, after.clone(), &AlignmentConfig::default());
        let b = align(&before, after, &AlignmentConfig::default());
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(a.transformed_image, b.transformed_image);
    }
}
