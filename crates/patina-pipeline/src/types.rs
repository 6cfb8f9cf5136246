//! Shared types for the patina comparison engine.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the
/// working images and rendered artifacts without depending on `image`
/// directly.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Axis-aligned bounding box in pixel space.
///
/// `x`/`y` is the top-left pixel; `w`/`h` count pixels, so the box
/// covers columns `x..x + w` and rows `y..y + h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge (pixels from the left of the image).
    pub x: u32,
    /// Top edge (pixels from the top of the image).
    pub y: u32,
    /// Width in pixels.
    pub w: u32,
    /// Height in pixels.
    pub h: u32,
}

impl BoundingBox {
    /// Smallest box covering every point of `points`.
    ///
    /// Returns `None` for an empty point set.
    #[must_use]
    pub fn enclosing(points: &[imageproc::point::Point<u32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            w: max_x - min_x + 1,
            h: max_y - min_y + 1,
        })
    }

    /// Geometric center of the box.
    #[must_use]
    pub fn center(self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.w) / 2.0,
            f64::from(self.y) + f64::from(self.h) / 2.0,
        )
    }

    /// Whether the box lies entirely within an image of `dimensions`.
    #[must_use]
    pub const fn fits_within(self, dimensions: Dimensions) -> bool {
        self.x as u64 + self.w as u64 <= dimensions.width as u64
            && self.y as u64 + self.h as u64 <= dimensions.height as u64
    }
}

/// Structural similarity measured at one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleSample {
    /// Resize factor applied to both images, in `(0, 1]`.
    pub scale: f64,
    /// Mean SSIM at this scale, clamped to `[0, 1]`.
    pub similarity: f64,
}

/// Errors that can occur during comparison.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageLoad` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// One of the input rasters could not be decoded.
    #[error("failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    /// One of the input byte buffers was empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Comparison configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageLoad`
/// variant stores its `Display` string instead.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageLoad(String),
    EmptyInput,
    InvalidConfiguration(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageLoad(e) => PipelineErrorProxy::ImageLoad(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::InvalidConfiguration(s) => PipelineErrorProxy::InvalidConfiguration(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::ImageLoad(msg) => {
                // The typed decoder error cannot be rebuilt; keep its message.
                Self::ImageLoad(image::ImageError::IoError(std::io::Error::other(msg)))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::InvalidConfiguration(s) => Self::InvalidConfiguration(s),
        })
    }
}
