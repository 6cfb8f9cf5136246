//! Per-image condition metrics.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::config::CrackConfig;
use crate::grayscale::to_gray;
use crate::{corrosion, damage, quality};

/// Condition of one image, measured once and never updated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionMetrics {
    /// Mean grayscale intensity.
    pub brightness: f64,
    /// Standard deviation of grayscale intensity.
    pub contrast: f64,
    /// Laplacian variance.
    pub sharpness: f64,
    /// Histogram entropy in bits.
    pub entropy: f64,
    /// Fraction of corroded pixels, in `[0, 1]`.
    pub corrosion_ratio: f64,
    /// Number of crack-like line segments.
    pub crack_count: u32,
    /// Fraction of dark-spot pixels, in `[0, 1]`.
    pub damage_ratio: f64,
}

impl ConditionMetrics {
    /// Measure every metric of `image`.
    #[must_use]
    pub fn measure(image: &RgbImage, config: &CrackConfig) -> Self {
        let gray = to_gray(image);
        let cracks = damage::crack_segments(&gray, config);
        Self {
            brightness: quality::brightness(&gray),
            contrast: quality::contrast(&gray),
            sharpness: quality::sharpness(&gray),
            entropy: quality::entropy(&gray),
            corrosion_ratio: corrosion::corrosion_ratio(image),
            crack_count: u32::try_from(cracks.len()).unwrap_or(u32::MAX),
            damage_ratio: damage::damage_ratio(&gray, config),
        }
    }

    /// Corrosion ratio as a percentage.
    #[must_use]
    pub fn corrosion_pct(&self) -> f64 {
        self.corrosion_ratio * 100.0
    }

    /// Damage ratio as a percentage.
    #[must_use]
    pub fn damage_pct(&self) -> f64 {
        self.damage_ratio * 100.0
    }
}
