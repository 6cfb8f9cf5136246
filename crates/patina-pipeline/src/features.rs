//! Oriented binary keypoint features.
//!
//! FAST-9 corners are detected on a small image pyramid and ranked by
//! Harris response. Each keypoint gets an orientation from the intensity
//! centroid of its surrounding disc and a 256-bit rotated BRIEF
//! descriptor sampled from a smoothed copy of its pyramid level.
//! Descriptors are compared by Hamming distance and matched with a
//! nearest/second-nearest ratio test.

use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::normalize::RESIZE_FILTER;

/// Number of pyramid levels.
const LEVELS: u32 = 8;
/// Downscale factor between consecutive levels.
const SCALE_FACTOR: f64 = 1.2;
/// FAST intensity threshold.
const FAST_THRESHOLD: u8 = 20;
/// Keypoints closer than this to a level's border are dropped.
const BORDER: u32 = 20;
/// Radius of the disc used for orientation.
const ORIENTATION_RADIUS: i32 = 15;
/// Half-size of the BRIEF sampling square.
const PATCH_HALF: i32 = 13;
/// Half-size of the Harris window.
const HARRIS_HALF: i32 = 3;
const HARRIS_K: f64 = 0.04;
/// Seed of the BRIEF sampling pattern; fixed so descriptors are
/// comparable across images and runs.
const PATTERN_SEED: u64 = 0x0b51_e5ee;
/// Smoothing applied before descriptor sampling.
const DESCRIPTOR_SIGMA: f32 = 2.0;

/// 256-bit binary descriptor.
pub type Descriptor = [u64; 4];

/// A keypoint in full-resolution coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Column in the original image.
    pub x: f64,
    /// Row in the original image.
    pub y: f64,
    /// Orientation in radians.
    pub angle: f64,
    /// Harris response at detection.
    pub response: f64,
    /// Pyramid level the keypoint was found on.
    pub level: u32,
}

/// Keypoints with their descriptors, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct Features {
    /// Detected keypoints.
    pub keypoints: Vec<Keypoint>,
    /// One descriptor per keypoint.
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    /// Number of keypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Whether no keypoints were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// A correspondence between a query and a train feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Index into the query features.
    pub query: usize,
    /// Index into the train features.
    pub train: usize,
    /// Hamming distance of the pair.
    pub distance: u32,
}

/// Hamming distance between two descriptors.
#[must_use]
pub fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

type Pattern = Vec<[(i32, i32); 2]>;

fn sampling_pattern() -> Pattern {
    let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
    (0..256)
        .map(|_| {
            let mut point = || {
                (
                    rng.gen_range(-PATCH_HALF..=PATCH_HALF),
                    rng.gen_range(-PATCH_HALF..=PATCH_HALF),
                )
            };
            [point(), point()]
        })
        .collect()
}

/// Keypoint budget of each level, decreasing geometrically with scale.
fn level_budgets(max_features: usize) -> Vec<usize> {
    let factor = 1.0 / SCALE_FACTOR;
    #[allow(clippy::cast_precision_loss)]
    let first = max_features as f64 * (1.0 - factor) / (1.0 - factor.powi(LEVELS as i32));
    let mut budgets = Vec::with_capacity(LEVELS as usize);
    let mut remaining = max_features;
    for level in 0..LEVELS {
        let want = if level + 1 == LEVELS {
            remaining
        } else {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let n = (first * factor.powi(level as i32)).round() as usize;
            n.min(remaining)
        };
        budgets.push(want);
        remaining -= want;
    }
    budgets
}

#[allow(clippy::cast_sign_loss)]
fn pixel(image: &GrayImage, x: i32, y: i32) -> f64 {
    f64::from(image.get_pixel(x as u32, y as u32).0[0])
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn harris_response(gx: &[i16], gy: &[i16], width: u32, x: u32, y: u32) -> f64 {
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for dy in -HARRIS_HALF..=HARRIS_HALF {
        for dx in -HARRIS_HALF..=HARRIS_HALF {
            let idx = ((y as i32 + dy) as u32 * width + (x as i32 + dx) as u32) as usize;
            let a = f64::from(gx[idx]);
            let b = f64::from(gy[idx]);
            sxx += a * a;
            syy += b * b;
            sxy += a * b;
        }
    }
    let det = sxx * syy - sxy * sxy;
    let trace = sxx + syy;
    det - HARRIS_K * trace * trace
}

#[allow(clippy::cast_possible_wrap)]
fn orientation(image: &GrayImage, x: u32, y: u32) -> f64 {
    let (cx, cy) = (x as i32, y as i32);
    let (mut m10, mut m01) = (0.0, 0.0);
    let r2 = ORIENTATION_RADIUS * ORIENTATION_RADIUS;
    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = pixel(image, cx + dx, cy + dy);
            m10 += f64::from(dx) * v;
            m01 += f64::from(dy) * v;
        }
    }
    m01.atan2(m10)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn describe(smoothed: &GrayImage, x: u32, y: u32, angle: f64, pattern: &Pattern) -> Descriptor {
    let (sin, cos) = angle.sin_cos();
    let (cx, cy) = (x as i32, y as i32);
    let sample = |(px, py): (i32, i32)| {
        let rx = f64::from(px) * cos - f64::from(py) * sin;
        let ry = f64::from(px) * sin + f64::from(py) * cos;
        pixel(smoothed, cx + rx.round() as i32, cy + ry.round() as i32)
    };
    let mut descriptor = [0u64; 4];
    for (bit, [a, b]) in pattern.iter().enumerate() {
        if sample(*a) < sample(*b) {
            descriptor[bit / 64] |= 1 << (bit % 64);
        }
    }
    descriptor
}

/// Detect up to `max_features` oriented keypoints and describe them.
#[must_use]
pub fn detect_and_describe(gray: &GrayImage, max_features: usize) -> Features {
    let pattern = sampling_pattern();
    let budgets = level_budgets(max_features);
    let mut features = Features::default();

    for (level, budget) in (0..LEVELS).zip(budgets) {
        let scale = SCALE_FACTOR.powi(level as i32);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (w, h) = (
            (f64::from(gray.width()) / scale).round() as u32,
            (f64::from(gray.height()) / scale).round() as u32,
        );
        if w <= 2 * BORDER || h <= 2 * BORDER {
            break;
        }
        if budget == 0 {
            continue;
        }
        let image = if level == 0 {
            gray.clone()
        } else {
            image::imageops::resize(gray, w, h, RESIZE_FILTER)
        };
        let gx = horizontal_sobel(&image);
        let gy = vertical_sobel(&image);

        let mut candidates: Vec<(u32, u32, f64)> = corners_fast9(&image, FAST_THRESHOLD)
            .into_iter()
            .filter(|c| c.x >= BORDER && c.y >= BORDER && c.x < w - BORDER && c.y < h - BORDER)
            .map(|c| (c.x, c.y, harris_response(gx.as_raw(), gy.as_raw(), w, c.x, c.y)))
            .collect();
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2).then((a.1, a.0).cmp(&(b.1, b.0))));
        candidates.truncate(budget);
        if candidates.is_empty() {
            continue;
        }

        let smoothed = imageproc::filter::gaussian_blur_f32(&image, DESCRIPTOR_SIGMA);
        for (x, y, response) in candidates {
            let angle = orientation(&image, x, y);
            features.descriptors.push(describe(&smoothed, x, y, angle, &pattern));
            features.keypoints.push(Keypoint {
                x: f64::from(x) * scale,
                y: f64::from(y) * scale,
                angle,
                response,
                level,
            });
        }
    }
    features
}

/// Match each query descriptor to its nearest train descriptor, keeping
/// only matches whose distance is strictly below `ratio` times the
/// second-nearest distance.
///
/// Queries with fewer than two train candidates produce no match.
#[must_use]
pub fn ratio_matches(query: &[Descriptor], train: &[Descriptor], ratio: f64) -> Vec<Match> {
    if train.len() < 2 {
        return Vec::new();
    }
    query
        .iter()
        .enumerate()
        .filter_map(|(qi, q)| {
            let mut best = (usize::MAX, u32::MAX);
            let mut second = u32::MAX;
            for (ti, t) in train.iter().enumerate() {
                let d = hamming(q, t);
                if d < best.1 {
                    second = best.1;
                    best = (ti, d);
                } else if d < second {
                    second = d;
                }
            }
            (f64::from(best.1) < ratio * f64::from(second)).then_some(Match {
                query: qi,
                train: best.0,
                distance: best.1,
            })
        })
        .collect()
}
