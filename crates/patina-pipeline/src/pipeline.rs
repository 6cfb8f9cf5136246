//! Incremental comparison: advance stage by stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::compare`], which runs every stage in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use patina_pipeline::{CompareConfig, Pipeline, PipelineError};
//! # fn run(before: Vec<u8>, after: Vec<u8>) -> Result<(), PipelineError> {
//! let comparison = Pipeline::new(before, after, CompareConfig::default())?
//!     .decode()?
//!     .normalize()
//!     .align()
//!     .measure()
//!     .compare_scales()
//!     .fuse()
//!     .extract_zones()
//!     .render();
//!
//! let (analysis, artifacts) = comparison.into_parts();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state,
//! carrying forward the intermediates later stages need. Every state
//! after [`Pending`] reports its [`StageMetrics`] for diagnostics.

use rand::Rng;

use crate::align::{AlignmentOutcome, AlignmentResult};
use crate::config::CompareConfig;
use crate::contour::{ChangeRegion, external_contours, regions_of};
use crate::diagnostics::StageMetrics;
use crate::fusion::Fusion;
use crate::grayscale::{decode_rgb, equalize, to_gray};
use crate::metrics::ConditionMetrics;
use crate::render::Artifacts;
use crate::result::Analysis;
use crate::ssim::ssim;
use crate::types::{Dimensions, GrayImage, PipelineError, RgbImage, ScaleSample};
use crate::zone::{Zone, build_zones};

/// Common interface of the pipeline states.
pub trait PipelineStage {
    /// Short stage name used in logs.
    const NAME: &str;

    /// Metrics describing the work done to reach this state.
    fn metrics(&self) -> StageMetrics;
}

/// Entry point of the staged pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Start a comparison of two encoded images.
    ///
    /// The configuration is validated before anything is decoded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] if `config` is
    /// rejected by [`CompareConfig::validate`].
    #[allow(clippy::new_ret_no_self)]
    pub fn new(before: Vec<u8>, after: Vec<u8>, config: CompareConfig) -> Result<Pending, PipelineError> {
        config.validate()?;
        Ok(Pending {
            config,
            before,
            after,
        })
    }

    /// Start a comparison of two already decoded images, skipping the
    /// decode stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] if `config` is
    /// rejected, and [`PipelineError::EmptyInput`] if either image has
    /// no pixels.
    pub fn from_images(before: RgbImage, after: RgbImage, config: CompareConfig) -> Result<Decoded, PipelineError> {
        config.validate()?;
        if before.is_empty() || after.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        Ok(Decoded {
            config,
            bytes: (0, 0),
            before,
            after,
        })
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Validated configuration and the raw input bytes.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: CompareConfig,
    before: Vec<u8>,
    after: Vec<u8>,
}

impl Pending {
    /// The configuration the run will use.
    #[must_use]
    pub const fn config(&self) -> &CompareConfig {
        &self.config
    }

    /// Decode both images.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if either buffer is empty
    /// and [`PipelineError::ImageLoad`] if either cannot be decoded.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let before = decode_rgb(&self.before)?;
        let after = decode_rgb(&self.after)?;
        tracing::debug!(
            before_width = before.width(),
            before_height = before.height(),
            after_width = after.width(),
            after_height = after.height(),
            "decoded input images",
        );
        Ok(Decoded {
            config: self.config,
            bytes: (self.before.len(), self.after.len()),
            before,
            after,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Both images decoded at their source sizes.
#[must_use = "pipeline stages are consumed by advancing; call .normalize() to continue"]
pub struct Decoded {
    config: CompareConfig,
    bytes: (usize, usize),
    before: RgbImage,
    after: RgbImage,
}

impl Decoded {
    /// The decoded "before" image.
    #[must_use]
    pub const fn before(&self) -> &RgbImage {
        &self.before
    }

    /// The decoded "after" image.
    #[must_use]
    pub const fn after(&self) -> &RgbImage {
        &self.after
    }

    /// Resize both images to the shared working size.
    pub fn normalize(self) -> Normalized {
        let source = Dimensions::of(&self.before);
        let (before, after) = crate::normalize::normalize_pair(&self.before, &self.after, self.config.max_width);
        tracing::debug!(
            width = before.width(),
            height = before.height(),
            "normalized to working size",
        );
        Normalized {
            config: self.config,
            bytes: self.bytes,
            source,
            before,
            after,
        }
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";

    fn metrics(&self) -> StageMetrics {
        let dims = Dimensions::of(&self.before);
        StageMetrics::Normalize {
            before_bytes: self.bytes.0,
            after_bytes: self.bytes.1,
            source: dims,
            working: dims,
        }
    }
}

// ───────────────────────── Stage 2: Normalized ───────────────────────

/// Both images at the working size.
#[must_use = "pipeline stages are consumed by advancing; call .align() to continue"]
pub struct Normalized {
    config: CompareConfig,
    bytes: (usize, usize),
    source: Dimensions,
    before: RgbImage,
    after: RgbImage,
}

impl Normalized {
    /// The normalized "before" image.
    #[must_use]
    pub const fn before(&self) -> &RgbImage {
        &self.before
    }

    /// The normalized, unaligned "after" image.
    #[must_use]
    pub const fn after(&self) -> &RgbImage {
        &self.after
    }

    /// Align the "after" image, seeding the estimator from the
    /// configuration.
    pub fn align(self) -> Aligned {
        let alignment = if self.config.enable_alignment {
            crate::align::align(&self.before, self.after, &self.config.alignment)
        } else {
            AlignmentResult::skipped(self.after)
        };
        Aligned {
            config: self.config,
            before: self.before,
            alignment,
        }
    }

    /// Align the "after" image using `rng` for the robust estimator.
    pub fn align_with_rng(self, rng: &mut impl Rng) -> Aligned {
        let alignment = if self.config.enable_alignment {
            crate::align::align_with_rng(&self.before, self.after, &self.config.alignment, rng)
        } else {
            AlignmentResult::skipped(self.after)
        };
        Aligned {
            config: self.config,
            before: self.before,
            alignment,
        }
    }
}

impl PipelineStage for Normalized {
    const NAME: &str = "normalize";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Normalize {
            before_bytes: self.bytes.0,
            after_bytes: self.bytes.1,
            source: self.source,
            working: Dimensions::of(&self.before),
        }
    }
}

// ───────────────────────── Stage 3: Aligned ──────────────────────────

/// The "after" image in the "before" frame (or passed through).
#[must_use = "pipeline stages are consumed by advancing; call .measure() to continue"]
pub struct Aligned {
    config: CompareConfig,
    before: RgbImage,
    alignment: AlignmentResult,
}

impl Aligned {
    /// The alignment stage result.
    #[must_use]
    pub const fn alignment(&self) -> &AlignmentResult {
        &self.alignment
    }

    /// Measure the condition of both images.
    pub fn measure(self) -> Measured {
        let crack = &self.config.crack;
        let (before_metrics, after_metrics) = rayon::join(
            || ConditionMetrics::measure(&self.before, crack),
            || ConditionMetrics::measure(&self.alignment.transformed_image, crack),
        );
        tracing::debug!(
            before_rust = before_metrics.corrosion_pct(),
            after_rust = after_metrics.corrosion_pct(),
            before_cracks = before_metrics.crack_count,
            after_cracks = after_metrics.crack_count,
            "condition metrics measured",
        );
        Measured {
            config: self.config,
            before: self.before,
            alignment: self.alignment,
            before_metrics,
            after_metrics,
        }
    }
}

impl PipelineStage for Aligned {
    const NAME: &str = "align";

    fn metrics(&self) -> StageMetrics {
        let (matches, inliers) = match self.alignment.outcome {
            AlignmentOutcome::Aligned { matches, inliers } => (matches, inliers),
            _ => (0, 0),
        };
        StageMetrics::Align {
            enabled: self.config.enable_alignment,
            success: self.alignment.success(),
            matches,
            inliers,
        }
    }
}

// ───────────────────────── Stage 4: Measured ─────────────────────────

/// Condition metrics of both images.
#[must_use = "pipeline stages are consumed by advancing; call .compare_scales() to continue"]
pub struct Measured {
    config: CompareConfig,
    before: RgbImage,
    alignment: AlignmentResult,
    before_metrics: ConditionMetrics,
    after_metrics: ConditionMetrics,
}

impl Measured {
    /// Condition of the "before" image.
    #[must_use]
    pub const fn before_metrics(&self) -> &ConditionMetrics {
        &self.before_metrics
    }

    /// Condition of the aligned "after" image.
    #[must_use]
    pub const fn after_metrics(&self) -> &ConditionMetrics {
        &self.after_metrics
    }

    /// Corrosion change in percentage points.
    #[must_use]
    pub fn rust_delta_pct(&self) -> f64 {
        self.after_metrics.corrosion_pct() - self.before_metrics.corrosion_pct()
    }

    /// Compute structural similarity at every configured scale.
    pub fn compare_scales(self) -> Scaled {
        let multiscale = crate::multiscale::multiscale_similarity(
            &self.before,
            &self.alignment.transformed_image,
            &self.config.scales,
        );
        tracing::debug!(scales = multiscale.len(), "multi-scale similarity computed");
        Scaled {
            measured: self,
            multiscale,
        }
    }
}

impl PipelineStage for Measured {
    const NAME: &str = "measure";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Condition {
            before_cracks: self.before_metrics.crack_count,
            after_cracks: self.after_metrics.crack_count,
            rust_delta_pct: self.rust_delta_pct(),
        }
    }
}

// ───────────────────────── Stage 5: Scaled ───────────────────────────

/// Multi-scale similarity samples.
#[must_use = "pipeline stages are consumed by advancing; call .fuse() to continue"]
pub struct Scaled {
    measured: Measured,
    multiscale: Vec<ScaleSample>,
}

impl Scaled {
    /// One sample per configured scale, in configuration order.
    #[must_use]
    pub fn multiscale(&self) -> &[ScaleSample] {
        &self.multiscale
    }

    /// Score global similarity and fuse the change signals into a mask.
    pub fn fuse(self) -> Fused {
        let m = &self.measured;
        let before_gray = to_gray(&m.before);
        let after_gray = to_gray(&m.alignment.transformed_image);

        let similarity = ssim(&equalize(&before_gray), &equalize(&after_gray))
            .mean()
            .clamp(0.0, 1.0);
        let dissimilarity = ssim(&before_gray, &after_gray).dissimilarity();
        let fusion = crate::fusion::fuse(&before_gray, &after_gray, &dissimilarity, &m.config);
        tracing::debug!(
            similarity,
            changed_pixels = fusion.changed_pixels(),
            "difference signals fused",
        );
        Fused {
            scaled: self,
            similarity,
            dissimilarity,
            fusion,
        }
    }
}

impl PipelineStage for Scaled {
    const NAME: &str = "multiscale";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::MultiScale {
            scale_count: self.multiscale.len(),
            min_similarity: self
                .multiscale
                .iter()
                .map(|s| s.similarity)
                .fold(1.0, f64::min),
        }
    }
}

// ───────────────────────── Stage 6: Fused ────────────────────────────

/// Global similarity and the fused change mask.
#[must_use = "pipeline stages are consumed by advancing; call .extract_zones() to continue"]
pub struct Fused {
    scaled: Scaled,
    similarity: f64,
    dissimilarity: GrayImage,
    fusion: Fusion,
}

impl Fused {
    /// Global similarity in `[0, 1]`.
    #[must_use]
    pub const fn similarity(&self) -> f64 {
        self.similarity
    }

    /// 8-bit structural dissimilarity map.
    #[must_use]
    pub const fn dissimilarity(&self) -> &GrayImage {
        &self.dissimilarity
    }

    /// Fused binary change mask.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.fusion.mask
    }

    /// Extract change regions and classify them into zones.
    pub fn extract_zones(self) -> Zoned {
        let m = &self.scaled.measured;
        let contours = external_contours(&self.fusion.mask);
        let regions = regions_of(&contours, m.config.noise_floor_area);
        let zones = build_zones(&regions, &m.before, &m.alignment.transformed_image, m.rust_delta_pct());
        tracing::debug!(
            contours = contours.len(),
            regions = regions.len(),
            "change zones extracted",
        );
        Zoned {
            fused: self,
            contour_count: contours.len(),
            regions,
            zones,
        }
    }
}

impl PipelineStage for Fused {
    const NAME: &str = "fusion";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Fusion {
            similarity: self.similarity,
            absolute_pixels: self.fusion.absolute_pixels,
            adaptive_pixels: self.fusion.adaptive_pixels,
            structural_pixels: self.fusion.structural_pixels,
            mask_pixels: self.fusion.changed_pixels(),
            total_pixels: Dimensions::of(&self.fusion.mask).pixel_count(),
        }
    }
}

// ───────────────────────── Stage 7: Zoned ────────────────────────────

/// Change regions and their zones.
#[must_use = "pipeline stages are consumed by advancing; call .render() to continue"]
pub struct Zoned {
    fused: Fused,
    contour_count: usize,
    regions: Vec<ChangeRegion>,
    zones: Vec<Zone>,
}

impl Zoned {
    /// Regions above the noise floor, in contour order.
    #[must_use]
    pub fn regions(&self) -> &[ChangeRegion] {
        &self.regions
    }

    /// Classified zones, one per region.
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Assemble the analysis without rendering artifacts.
    #[must_use]
    pub fn analysis(&self) -> Analysis {
        let f = &self.fused;
        let m = &f.scaled.measured;
        Analysis {
            similarity: f.similarity,
            change_percent: (1.0 - f.similarity) * 100.0,
            regions: self.regions.len(),
            before: m.before_metrics,
            after: m.after_metrics,
            multiscale: f.scaled.multiscale.clone(),
            zones: self.zones.clone(),
            alignment_success: m.alignment.success(),
            dimensions: Dimensions::of(&m.before),
        }
    }

    /// Render the artifacts and finish the comparison.
    pub fn render(self) -> Comparison {
        let analysis = self.analysis();
        let f = &self.fused;
        let m = &f.scaled.measured;
        let boxes: Vec<_> = self.regions.iter().map(|r| r.bbox).collect();
        let artifacts = crate::render::render(
            &m.before,
            &m.alignment.transformed_image,
            &f.dissimilarity,
            &f.fusion.mask,
            &boxes,
        );
        Comparison {
            analysis,
            artifacts,
        }
    }
}

impl PipelineStage for Zoned {
    const NAME: &str = "zones";

    fn metrics(&self) -> StageMetrics {
        let mut labels: Vec<_> = self.zones.iter().map(|z| z.label).collect();
        labels.sort_unstable();
        labels.dedup();
        StageMetrics::Zones {
            contour_count: self.contour_count,
            region_count: self.regions.len(),
            label_count: labels.len(),
        }
    }
}

// ───────────────────────── Stage 8: Comparison ───────────────────────

/// The finished comparison: numeric results and in-memory artifacts.
#[must_use]
pub struct Comparison {
    analysis: Analysis,
    artifacts: Artifacts,
}

impl Comparison {
    /// Numeric results.
    #[must_use]
    pub const fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    /// Rendered rasters.
    #[must_use]
    pub const fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// Split into results and artifacts.
    #[must_use]
    pub fn into_parts(self) -> (Analysis, Artifacts) {
        (self.analysis, self.artifacts)
    }
}

impl PipelineStage for Comparison {
    const NAME: &str = "render";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Render {
            boxes: self.analysis.regions,
        }
    }
}
