//! patina-pipeline: Pure before/after image comparison engine (sans-IO).
//!
//! Compares two photographs of the same equipment through:
//! decode -> normalize -> align -> condition metrics -> multi-scale
//! similarity -> difference fusion -> zone extraction -> rendering.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and image buffers and returns structured data plus
//! in-memory artifacts. All filesystem interaction lives in
//! `patina-io`.

pub mod align;
pub mod colormap;
pub mod config;
pub mod contour;
pub mod corrosion;
pub mod damage;
pub mod diagnostics;
pub mod edges;
pub mod features;
pub mod filter;
pub mod fusion;
pub mod grayscale;
pub mod homography;
pub mod hough;
pub mod metrics;
pub mod morphology;
pub mod multiscale;
pub mod normalize;
pub mod objects;
pub mod pipeline;
pub mod quality;
pub mod render;
pub mod result;
pub mod ssim;
pub mod types;
pub mod zone;

pub use align::{AlignmentFailure, AlignmentOutcome, AlignmentResult};
pub use config::{AlignmentConfig, CompareConfig, CrackConfig};
pub use diagnostics::{Clock, NoClock, PipelineDiagnostics, StageDiagnostics, StageMetrics};
pub use metrics::ConditionMetrics;
pub use objects::{Detection, LabelDetector, LabelDiff, compare_labels};
pub use pipeline::{Comparison, Pipeline, PipelineStage};
pub use render::Artifacts;
pub use result::{Analysis, ArtifactPaths, ComparisonResult};
pub use types::{BoundingBox, Dimensions, GrayImage, PipelineError, RgbImage, ScaleSample};
pub use zone::{Significance, Zone, ZoneId, ZoneLabel};

use diagnostics::timed;

/// Compare two encoded images.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) for the "before" and
/// "after" captures and runs every stage, returning the numeric
/// [`Analysis`] and the rendered [`Artifacts`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfiguration`] before decoding if
/// `config` is invalid, [`PipelineError::EmptyInput`] if either buffer
/// is empty, and [`PipelineError::ImageLoad`] if either image cannot be
/// decoded. Alignment failure is not an error.
pub fn compare(before: &[u8], after: &[u8], config: &CompareConfig) -> Result<Comparison, PipelineError> {
    Ok(Pipeline::new(before.to_vec(), after.to_vec(), config.clone())?
        .decode()?
        .normalize()
        .align()
        .measure()
        .compare_scales()
        .fuse()
        .extract_zones()
        .render())
}

/// Compare two decoded images.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfiguration`] if `config` is
/// invalid and [`PipelineError::EmptyInput`] if either image has no
/// pixels.
pub fn compare_images(
    before: RgbImage,
    after: RgbImage,
    config: &CompareConfig,
) -> Result<Comparison, PipelineError> {
    Ok(Pipeline::from_images(before, after, config.clone())?
        .normalize()
        .align()
        .measure()
        .compare_scales()
        .fuse()
        .extract_zones()
        .render())
}

/// Advance one stage, timing it on `clock`.
fn step<S: PipelineStage>(clock: &impl Clock, advance: impl FnOnce() -> S) -> (S, StageDiagnostics) {
    let (stage, duration) = timed(clock, advance);
    tracing::debug!(
        stage = S::NAME,
        elapsed_ms = duration.as_secs_f64() * 1000.0,
        "stage complete",
    );
    let metrics = stage.metrics();
    (stage, StageDiagnostics { duration, metrics })
}

/// Like [`compare`], also returning per-stage diagnostics timed on
/// `clock`.
///
/// # Errors
///
/// Same as [`compare`].
pub fn compare_with_diagnostics(
    before: &[u8],
    after: &[u8],
    config: &CompareConfig,
    clock: &impl Clock,
) -> Result<(Comparison, PipelineDiagnostics), PipelineError> {
    let pending = Pipeline::new(before.to_vec(), after.to_vec(), config.clone())?;
    let (decoded, decode_time) = timed(clock, || pending.decode());
    let decoded = decoded?;

    let (normalized, mut normalize) = step(clock, || decoded.normalize());
    normalize.duration += decode_time;
    let (aligned, align) = step(clock, || normalized.align());
    let (measured, condition) = step(clock, || aligned.measure());
    let (scaled, multiscale) = step(clock, || measured.compare_scales());
    let (fused, fusion) = step(clock, || scaled.fuse());
    let (zoned, zones) = step(clock, || fused.extract_zones());
    let (comparison, render) = step(clock, || zoned.render());

    let total_duration = [&normalize, &align, &condition, &multiscale, &fusion, &zones, &render]
        .iter()
        .map(|s| s.duration)
        .sum();
    let diagnostics = PipelineDiagnostics {
        normalize,
        align,
        condition,
        multiscale,
        fusion,
        zones,
        render,
        total_duration,
    };
    Ok((comparison, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    fn png(image: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    /// Mid-gray plate with a few darker bolts and a faint gradient.
    fn equipment() -> RgbImage {
        let mut img = RgbImage::from_fn(300, 300, |x, y| {
            let v = u8::try_from(170 + (x + y) / 20).unwrap();
            Rgb([v, v, v])
        });
        for (cx, cy) in [(150, 150), (250, 60), (60, 250)] {
            draw_filled_circle_mut(&mut img, (cx, cy), 6, Rgb([90, 90, 95]));
        }
        img
    }

    fn label(name: &str) -> ZoneLabel {
        serde_json::from_str(&format!("\"{name}\"")).unwrap()
    }

    fn unaligned() -> CompareConfig {
        CompareConfig {
            enable_alignment: false,
            ..CompareConfig::default()
        }
    }

    #[test]
    fn identical_images_show_no_change() {
        let bytes = png(&equipment());
        let comparison = compare(&bytes, &bytes, &CompareConfig::default()).unwrap();
        let a = comparison.analysis();
        assert!((a.similarity - 1.0).abs() < f64::EPSILON);
        assert!(a.change_percent.abs() < f64::EPSILON);
        assert_eq!(a.regions, 0);
        assert!(a.zones.is_empty());
        assert!(a.rust_delta_pct().abs() < f64::EPSILON);
    }

    #[test]
    fn rust_patch_is_found_in_its_zone() {
        let before = equipment();
        let mut after = before.clone();
        draw_filled_circle_mut(&mut after, (50, 50), 25, Rgb([180, 90, 30]));

        let comparison = compare(&png(&before), &png(&after), &unaligned()).unwrap();
        let a = comparison.analysis();
        assert!(a.regions >= 1);
        assert!(a.rust_delta_pct() > 0.0);
        assert!(!a.alignment_success);
        let top_left = label("top-left");
        assert!(a.zone_labels().contains(&top_left), "labels: {:?}", a.zone_labels());
        let zone = a.zones_labeled(top_left).next().unwrap();
        assert!(zone.rust_change > 0.0);
        assert_eq!(zone.part_name, "upper assembly");
    }

    #[test]
    fn change_percent_matches_similarity() {
        let before = equipment();
        let mut after = before.clone();
        draw_filled_circle_mut(&mut after, (200, 200), 40, Rgb([20, 20, 20]));
        let comparison = compare(&png(&before), &png(&after), &unaligned()).unwrap();
        let a = comparison.analysis();
        assert!((0.0..=1.0).contains(&a.similarity));
        assert!((0.0..=100.0).contains(&a.change_percent));
        assert!((a.change_percent - (1.0 - a.similarity) * 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zones_stay_inside_the_frame() {
        let before = equipment();
        let mut after = before.clone();
        draw_filled_circle_mut(&mut after, (295, 295), 30, Rgb([10, 200, 10]));
        draw_filled_circle_mut(&mut after, (0, 150), 30, Rgb([200, 10, 10]));
        let comparison = compare(&png(&before), &png(&after), &unaligned()).unwrap();
        let a = comparison.analysis();
        assert!(a.regions >= 2);
        for zone in &a.zones {
            assert!(zone.bbox.fits_within(a.dimensions), "{zone:?}");
            assert!(zone.area_percent < 100.0);
        }
        let middle_left = label("middle-left");
        let bottom_right = label("bottom-right");
        assert!(a.zone_labels().contains(&middle_left), "labels: {:?}", a.zone_labels());
        assert!(a.zone_labels().contains(&bottom_right), "labels: {:?}", a.zone_labels());
        assert!(a.zones_labeled(middle_left).any(|z| z.bbox.x == 0));
    }

    #[test]
    fn rust_patch_on_left_edge_is_a_region() {
        let before = equipment();
        let mut after = before.clone();
        draw_filled_rect_mut(&mut after, Rect::at(0, 0).of_size(60, 60), Rgb([180, 90, 30]));

        let a = compare_images(before, after, &unaligned()).unwrap().into_parts().0;
        assert!(a.regions >= 1);
        assert!(a.rust_delta_pct() > 0.0);
        let zone = a.zones_labeled(label("top-left")).next().unwrap();
        assert_eq!((zone.bbox.x, zone.bbox.y), (0, 0));
        assert!(zone.bbox.w >= 55 && zone.bbox.h >= 55, "{zone:?}");
    }

    #[test]
    fn black_border_of_a_warped_capture_is_a_region() {
        let before = equipment();
        let shift = nalgebra::Matrix3::new(1.0, 0.0, 15.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let after = align::warp_into_frame(&before, &shift).unwrap();
        assert_eq!(*after.get_pixel(5, 150), Rgb([0, 0, 0]));

        let a = compare_images(before, after, &unaligned()).unwrap().into_parts().0;
        let border = a
            .zones_labeled(label("middle-left"))
            .find(|z| z.bbox.x == 0)
            .unwrap();
        assert!(border.bbox.w >= 15, "{border:?}");
        assert!(border.bbox.h > 200, "{border:?}");
        for zone in &a.zones {
            assert!(zone.bbox.fits_within(a.dimensions), "{zone:?}");
        }
    }

    #[test]
    fn multiscale_follows_requested_order() {
        let before = equipment();
        let mut after = before.clone();
        draw_filled_circle_mut(&mut after, (100, 100), 20, Rgb([0, 0, 0]));
        let config = CompareConfig {
            scales: vec![0.25, 1.0, 0.5],
            ..unaligned()
        };
        let comparison = compare(&png(&before), &png(&after), &config).unwrap();
        let scales: Vec<f64> = comparison.analysis().multiscale.iter().map(|s| s.scale).collect();
        assert_eq!(scales, [0.25, 1.0, 0.5]);
        for sample in &comparison.analysis().multiscale {
            assert!((0.0..=1.0).contains(&sample.similarity));
        }
    }

    #[test]
    fn repeated_runs_are_identical() {
        let before = png(&equipment());
        let mut after = equipment();
        draw_filled_circle_mut(&mut after, (220, 80), 22, Rgb([150, 70, 20]));
        let after = png(&after);
        let config = CompareConfig::default();
        let a = compare(&before, &after, &config).unwrap();
        let b = compare(&before, &after, &config).unwrap();
        assert_eq!(a.analysis(), b.analysis());
        assert_eq!(a.artifacts().annotated, b.artifacts().annotated);
    }

    #[test]
    fn bad_scale_fails_before_decoding() {
        let config = CompareConfig {
            scales: vec![1.5],
            ..CompareConfig::default()
        };
        let result = compare(b"not an image", b"", &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfiguration(_))));
    }

    #[test]
    fn corrupt_input_is_a_load_error() {
        let good = png(&equipment());
        let result = compare(&good, &[0xFF, 0x00, 0x12], &CompareConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageLoad(_))));
    }

    #[test]
    fn decoded_images_give_same_result_as_bytes() {
        let before = equipment();
        let mut after = before.clone();
        draw_filled_circle_mut(&mut after, (150, 60), 25, Rgb([180, 90, 30]));
        let from_bytes = compare(&png(&before), &png(&after), &unaligned()).unwrap();
        let from_images = compare_images(before, after, &unaligned()).unwrap();
        assert_eq!(from_bytes.analysis(), from_images.analysis());
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let before = equipment();
        let mut after = before.clone();
        draw_filled_circle_mut(&mut after, (150, 150), 30, Rgb([180, 90, 30]));
        let (comparison, diagnostics) =
            compare_with_diagnostics(&png(&before), &png(&after), &unaligned(), &NoClock).unwrap();
        assert!(matches!(
            diagnostics.zones.metrics,
            StageMetrics::Zones { region_count, .. } if region_count == comparison.analysis().regions
        ));
        assert!(matches!(diagnostics.align.metrics, StageMetrics::Align { enabled: false, .. }));
        assert!(diagnostics.report().contains("Zones"));
    }
}
