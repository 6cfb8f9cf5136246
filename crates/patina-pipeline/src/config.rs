//! Comparison configuration.
//!
//! [`CompareConfig`] is threaded through every stage. All tunables have
//! associated `DEFAULT_*` constants so front ends (CLI flags, UI
//! sliders) can reference the same defaults without duplicating
//! literals.

use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Configuration for the feature-based alignment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Upper bound on keypoints detected per image.
    pub max_features: usize,

    /// Ambiguity ratio: a match survives only if its best distance is
    /// strictly below `ratio` times the second-best distance.
    pub ratio: f64,

    /// Minimum number of surviving matches before a homography is
    /// attempted.
    pub min_matches: usize,

    /// RANSAC inlier threshold (reprojection error in pixels).
    pub ransac_threshold: f64,

    /// Maximum number of RANSAC iterations.
    pub ransac_iterations: usize,

    /// Seed for the RANSAC sampler.
    pub seed: u64,
}

impl AlignmentConfig {
    /// Default value for [`max_features`](Self::max_features).
    pub const DEFAULT_MAX_FEATURES: usize = 500;
    /// Default value for [`ratio`](Self::ratio).
    pub const DEFAULT_RATIO: f64 = 0.75;
    /// Default value for [`min_matches`](Self::min_matches).
    pub const DEFAULT_MIN_MATCHES: usize = 10;
    /// Default value for [`ransac_threshold`](Self::ransac_threshold).
    pub const DEFAULT_RANSAC_THRESHOLD: f64 = 5.0;
    /// Default value for [`ransac_iterations`](Self::ransac_iterations).
    pub const DEFAULT_RANSAC_ITERATIONS: usize = 2000;
    /// Default value for [`seed`](Self::seed).
    pub const DEFAULT_SEED: u64 = 0;
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            max_features: Self::DEFAULT_MAX_FEATURES,
            ratio: Self::DEFAULT_RATIO,
            min_matches: Self::DEFAULT_MIN_MATCHES,
            ransac_threshold: Self::DEFAULT_RANSAC_THRESHOLD,
            ransac_iterations: Self::DEFAULT_RANSAC_ITERATIONS,
            seed: Self::DEFAULT_SEED,
        }
    }
}

/// Configuration for crack and surface-damage detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrackConfig {
    /// Canny low (weak edge) threshold.
    pub canny_low: f32,
    /// Canny high (strong edge) threshold.
    pub canny_high: f32,
    /// Minimum accumulator votes for a line segment.
    pub vote_threshold: u32,
    /// Minimum segment length in pixels.
    pub min_line_length: u32,
    /// Maximum gap in pixels bridged within one segment.
    pub max_line_gap: u32,
    /// Grayscale level at or below which a pixel is a dark spot.
    pub dark_threshold: u8,
    /// Number of 3x3 erode/dilate iterations in the dark-spot opening.
    pub opening_iterations: u8,
}

impl Default for CrackConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            vote_threshold: 50,
            min_line_length: 30,
            max_line_gap: 10,
            dark_threshold: 50,
            opening_iterations: 2,
        }
    }
}

/// Configuration for a single before/after comparison.
///
/// Construct with [`Default`] and override fields as needed; call
/// [`validate`](Self::validate) (done automatically by
/// [`Pipeline::new`](crate::Pipeline::new)) before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Maximum working width. Wider "before" images are downscaled,
    /// preserving aspect ratio.
    pub max_width: u32,

    /// Whether to run feature-based alignment of the "after" image.
    pub enable_alignment: bool,

    /// Alignment parameters (ignored when alignment is disabled).
    pub alignment: AlignmentConfig,

    /// Scale factors for multi-scale similarity, each in `(0, 1]`,
    /// reported in the given order.
    pub scales: Vec<f64>,

    /// Contours with a smaller area (in pixels) are treated as noise.
    pub noise_floor_area: f64,

    /// Absolute grayscale difference above which a pixel is changed.
    pub diff_threshold: u8,

    /// Window size of the adaptive difference threshold (odd).
    pub adaptive_block: u32,

    /// Offset above the local mean for the adaptive threshold.
    pub adaptive_offset: f64,

    /// Crack and damage detection parameters.
    pub crack: CrackConfig,
}

impl CompareConfig {
    /// Default value for [`max_width`](Self::max_width).
    pub const DEFAULT_MAX_WIDTH: u32 = 800;
    /// Default value for [`scales`](Self::scales).
    pub const DEFAULT_SCALES: [f64; 3] = [1.0, 0.5, 0.25];
    /// Default value for [`noise_floor_area`](Self::noise_floor_area).
    pub const DEFAULT_NOISE_FLOOR_AREA: f64 = 500.0;
    /// Default value for [`diff_threshold`](Self::diff_threshold).
    pub const DEFAULT_DIFF_THRESHOLD: u8 = 30;
    /// Default value for [`adaptive_block`](Self::adaptive_block).
    pub const DEFAULT_ADAPTIVE_BLOCK: u32 = 11;
    /// Default value for [`adaptive_offset`](Self::adaptive_offset).
    pub const DEFAULT_ADAPTIVE_OFFSET: f64 = 2.0;

    /// Check the configuration for values no stage can work with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] when the scale
    /// list is empty or holds a value outside `(0, 1]`, when the
    /// working width is zero, when the adaptive window is even or
    /// smaller than 3, or when the alignment ratio is outside `(0, 1]`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.scales.is_empty() {
            return Err(PipelineError::InvalidConfiguration(
                "scale list is empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .scales
            .iter()
            .find(|s| !s.is_finite() || **s <= 0.0 || **s > 1.0)
        {
            return Err(PipelineError::InvalidConfiguration(format!(
                "scale {bad} is outside (0, 1]"
            )));
        }
        if self.max_width == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "max_width must be positive".to_string(),
            ));
        }
        if self.adaptive_block < 3 || self.adaptive_block % 2 == 0 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "adaptive_block {} must be odd and at least 3",
                self.adaptive_block
            )));
        }
        if !(self.alignment.ratio > 0.0 && self.alignment.ratio <= 1.0) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "alignment ratio {} is outside (0, 1]",
                self.alignment.ratio
            )));
        }
        Ok(())
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            max_width: Self::DEFAULT_MAX_WIDTH,
            enable_alignment: true,
            alignment: AlignmentConfig::default(),
            scales: Self::DEFAULT_SCALES.to_vec(),
            noise_floor_area: Self::DEFAULT_NOISE_FLOOR_AREA,
            diff_threshold: Self::DEFAULT_DIFF_THRESHOLD,
            adaptive_block: Self::DEFAULT_ADAPTIVE_BLOCK,
            adaptive_offset: Self::DEFAULT_ADAPTIVE_OFFSET,
            crack: CrackConfig::default(),
        }
    }
}
