//! Planar homography estimation via DLT with Hartley normalization.
//!
//! Provides:
//! - Direct Linear Transform (DLT) from at least 4 point correspondences.
//! - RANSAC wrapper for outlier-robust fitting, driven by an injected
//!   random source.
//! - Reprojection error computation.

use nalgebra::{DMatrix, Matrix3, Vector3};
use rand::Rng;

/// Minimal sample size for a homography.
pub const MIN_POINTS: usize = 4;

// ── Error type ───────────────────────────────────────────────────────────

/// Reasons a homography could not be estimated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HomographyError {
    /// Fewer correspondences than a homography needs.
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints {
        /// Minimum number of points.
        needed: usize,
        /// Number supplied.
        got: usize,
    },

    /// The linear system was degenerate.
    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    /// No model gathered enough inliers.
    #[error("insufficient inliers: need {needed}, found {found}")]
    InsufficientInliers {
        /// Minimum number of inliers.
        needed: usize,
        /// Best inlier count seen.
        found: usize,
    },
}

// ── Projection ───────────────────────────────────────────────────────────

/// Project a 2D point through a 3x3 homography: `H * [x, y, 1]^T -> [u, v]`.
#[must_use]
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < 1e-15 {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

/// Reprojection error: `||project(H, src) - dst||`.
#[must_use]
pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let p = project(h, src[0], src[1]);
    (p[0] - dst[0]).hypot(p[1] - dst[1])
}

// ── Hartley normalization ────────────────────────────────────────────────

/// Translate the centroid to the origin and scale so the mean distance
/// from it is `sqrt(2)`.
#[allow(clippy::cast_precision_loss)]
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| (p[0] - cx).hypot(p[1] - cy))
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();
    (t, normalized)
}

// ── DLT ──────────────────────────────────────────────────────────────────

/// Estimate the homography `H` with `dst ≈ project(H, src)` from at
/// least 4 correspondences.
///
/// # Errors
///
/// [`HomographyError::TooFewPoints`] below 4 points or on mismatched
/// lengths; [`HomographyError::NumericalFailure`] if the solution
/// degenerates.
pub fn estimate_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Matrix3<f64>, HomographyError> {
    let n = src.len().min(dst.len());
    if n < MIN_POINTS {
        return Err(HomographyError::TooFewPoints {
            needed: MIN_POINTS,
            got: n,
        });
    }
    if src.len() != dst.len() {
        return Err(HomographyError::NumericalFailure(
            "src and dst must have the same length".into(),
        ));
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let mut a = DMatrix::zeros(2 * n, 9);
    for (i, (s, d)) in src_n.iter().zip(&dst_n).enumerate() {
        let (sx, sy) = (s[0], s[1]);
        let (dx, dy) = (d[0], d[1]);

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // h is the eigenvector of A^T A with the smallest eigenvalue.
    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);
    let min_idx = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|x, y| x.1.abs().total_cmp(&y.1.abs()))
        .map_or(0, |(i, _)| i);
    let v = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8]);

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| HomographyError::NumericalFailure("T_dst not invertible".into()))?;
    let h = t_dst_inv * h_norm * t_src;

    let scale = h[(2, 2)];
    if scale.abs() < 1e-15 || !h.iter().all(|v| v.is_finite()) {
        return Err(HomographyError::NumericalFailure(
            "degenerate homography".into(),
        ));
    }
    Ok(h / scale)
}

// ── RANSAC ───────────────────────────────────────────────────────────────

/// RANSAC parameters for homography fitting.
#[derive(Debug, Clone)]
pub struct RansacConfig {
    /// Maximum number of iterations.
    pub max_iters: usize,
    /// Inlier threshold (reprojection error in pixels).
    pub inlier_threshold: f64,
    /// Minimum number of inliers for a valid model.
    pub min_inliers: usize,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            inlier_threshold: 5.0,
            min_inliers: MIN_POINTS,
        }
    }
}

/// Result of RANSAC fitting.
#[derive(Debug, Clone)]
pub struct RansacFit {
    /// The fitted homography.
    pub h: Matrix3<f64>,
    /// `true` for inliers of `h`.
    pub inlier_mask: Vec<bool>,
    /// Number of inliers.
    pub n_inliers: usize,
}

fn inliers(h: &Matrix3<f64>, src: &[[f64; 2]], dst: &[[f64; 2]], threshold: f64) -> Vec<bool> {
    src.iter()
        .zip(dst)
        .map(|(s, d)| reprojection_error(h, s, d) < threshold)
        .collect()
}

/// Fit a homography with RANSAC, then refit on all inliers.
///
/// `rng` draws the minimal samples; seed it for reproducible fits.
///
/// # Errors
///
/// [`HomographyError::TooFewPoints`] below 4 correspondences;
/// [`HomographyError::InsufficientInliers`] when no model reaches
/// `config.min_inliers`.
pub fn fit_ransac(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    config: &RansacConfig,
    rng: &mut impl Rng,
) -> Result<RansacFit, HomographyError> {
    let n = src.len().min(dst.len());
    if n < MIN_POINTS {
        return Err(HomographyError::TooFewPoints {
            needed: MIN_POINTS,
            got: n,
        });
    }

    let mut best_count = 0usize;
    let mut best_mask = vec![false; n];
    let mut best_h = Matrix3::identity();

    for _ in 0..config.max_iters {
        let sample = rand::seq::index::sample(rng, n, MIN_POINTS);
        let s4: Vec<[f64; 2]> = sample.iter().map(|i| src[i]).collect();
        let d4: Vec<[f64; 2]> = sample.iter().map(|i| dst[i]).collect();

        let Ok(h) = estimate_dlt(&s4, &d4) else {
            continue;
        };

        let mask = inliers(&h, &src[..n], &dst[..n], config.inlier_threshold);
        let count = mask.iter().filter(|m| **m).count();
        if count > best_count {
            best_count = count;
            best_mask = mask;
            best_h = h;

            if count * 10 > n * 9 {
                break;
            }
        }
    }

    if best_count < config.min_inliers.max(MIN_POINTS) {
        return Err(HomographyError::InsufficientInliers {
            needed: config.min_inliers.max(MIN_POINTS),
            found: best_count,
        });
    }

    let (inlier_src, inlier_dst): (Vec<[f64; 2]>, Vec<[f64; 2]>) = (0..n)
        .filter(|&i| best_mask[i])
        .map(|i| (src[i], dst[i]))
        .unzip();
    let h = estimate_dlt(&inlier_src, &inlier_dst).unwrap_or(best_h);
    let inlier_mask = inliers(&h, &src[..n], &dst[..n], config.inlier_threshold);
    let n_inliers = inlier_mask.iter().filter(|m| **m).count();

    Ok(RansacFit {
        h,
        inlier_mask,
        n_inliers,
    })
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn make_test_homography() -> Matrix3<f64> {
        Matrix3::new(1.02, 0.03, 12.0, -0.02, 0.98, -7.0, 1e-5, -2e-5, 1.0)
    }

    fn grid_points() -> Vec<[f64; 2]> {
        let mut pts = Vec::new();
        for i in 0..6 {
            for j in 0..5 {
                pts.push([f64::from(i) * 60.0 + 10.0, f64::from(j) * 45.0 + 20.0]);
            }
        }
        pts
    }

    fn max_abs_diff(a: &Matrix3<f64>, b: &Matrix3<f64>) -> f64 {
        (a - b).iter().fold(0.0, |m, v| m.max(v.abs()))
    }

    #[test]
    fn dlt_recovers_exact_homography() {
        let h_true = make_test_homography();
        let src = grid_points();
        let dst: Vec<[f64; 2]> = src.iter().map(|p| project(&h_true, p[0], p[1])).collect();
        let h = estimate_dlt(&src, &dst).unwrap();
        assert!(max_abs_diff(&h, &h_true) < 1e-6);
    }

    #[test]
    fn dlt_rejects_three_points() {
        let pts = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert_eq!(
            estimate_dlt(&pts, &pts),
            Err(HomographyError::TooFewPoints { needed: 4, got: 3 })
        );
    }

    #[test]
    fn identity_maps_points_to_themselves() {
        let h = Matrix3::identity();
        assert!(reprojection_error(&h, &[3.0, 4.0], &[3.0, 4.0]).abs() < 1e-12);
    }

    #[test]
    fn ransac_ignores_outliers() {
        let h_true = make_test_homography();
        let src = grid_points();
        let mut dst: Vec<[f64; 2]> = src.iter().map(|p| project(&h_true, p[0], p[1])).collect();
        for (k, p) in dst.iter_mut().enumerate().step_by(5) {
            p[0] += 40.0 + f64::from(u32::try_from(k).unwrap());
            p[1] -= 35.0;
        }
        let mut rng = StdRng::seed_from_u64(0);
        let fit = fit_ransac(&src, &dst, &RansacConfig::default(), &mut rng).unwrap();
        assert_eq!(fit.n_inliers, src.len() - 6);
        assert!(!fit.inlier_mask[0]);
        assert!(fit.inlier_mask[1]);
        assert!(max_abs_diff(&fit.h, &h_true) < 1e-6);
    }

    #[test]
    fn ransac_is_reproducible_with_a_seed() {
        let h_true = make_test_homography();
        let src = grid_points();
        let dst: Vec<[f64; 2]> = src.iter().map(|p| project(&h_true, p[0], p[1])).collect();
        let fit_a = fit_ransac(&src, &dst, &RansacConfig::default(), &mut StdRng::seed_from_u64(9)).unwrap();
        let fit_b = fit_ransac(&src, &dst, &RansacConfig::default(), &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(fit_a.h, fit_b.h);
    }

    #[test]
    fn ransac_needs_four_points() {
        let pts = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let err = fit_ransac(&pts, &pts, &RansacConfig::default(), &mut StdRng::seed_from_u64(0));
        assert!(matches!(err, Err(HomographyError::TooFewPoints { .. })));
    }
}
