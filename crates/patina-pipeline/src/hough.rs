//! Probabilistic Hough transform for line segments.
//!
//! Edge pixels are visited in random order. Each visit votes into a
//! `(theta, rho)` accumulator with 1 degree and 1 pixel resolution;
//! once a bin reaches the vote threshold, the detector walks along the
//! corresponding line in both directions from the current pixel,
//! bridging gaps of up to `max_line_gap` pixels. If the walked extent is
//! long enough the pixels on it are removed from the edge set and their
//! votes withdrawn, so each edge pixel contributes to at most one
//! segment.

use image::GrayImage;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::CrackConfig;

/// A detected line segment with inclusive pixel endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    /// First endpoint `(x, y)`.
    pub start: (u32, u32),
    /// Second endpoint `(x, y)`.
    pub end: (u32, u32),
}

impl LineSegment {
    /// Euclidean length in pixels.
    #[must_use]
    pub fn length(&self) -> f64 {
        let dx = f64::from(self.end.0) - f64::from(self.start.0);
        let dy = f64::from(self.end.1) - f64::from(self.start.1);
        dx.hypot(dy)
    }
}

const ANGLE_BINS: usize = 180;
const SHIFT: u32 = 16;

struct Accumulator {
    trig: Vec<(f64, f64)>,
    rho_bins: usize,
    votes: Vec<i64>,
}

impl Accumulator {
    fn new(width: u32, height: u32) -> Self {
        let trig = (0..ANGLE_BINS)
            .map(|n| {
                #[allow(clippy::cast_precision_loss)]
                let theta = n as f64 * std::f64::consts::PI / ANGLE_BINS as f64;
                (theta.cos(), theta.sin())
            })
            .collect();
        let rho_bins = ((width as usize + height as usize) * 2) + 1;
        Self {
            trig,
            rho_bins,
            votes: vec![0; ANGLE_BINS * rho_bins],
        }
    }

    fn bin(&self, n: usize, x: u32, y: u32) -> usize {
        let (c, s) = self.trig[n];
        #[allow(clippy::cast_possible_truncation)]
        let r = (f64::from(x) * c + f64::from(y) * s).round() as i64;
        let offset = (self.rho_bins as i64 - 1) / 2;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let r = (r + offset) as usize;
        n * self.rho_bins + r
    }

    /// Vote for `(x, y)` and return the strongest angle bin and its count.
    fn vote(&mut self, x: u32, y: u32) -> (usize, i64) {
        let mut best = (0, 0);
        for n in 0..ANGLE_BINS {
            let idx = self.bin(n, x, y);
            self.votes[idx] += 1;
            if self.votes[idx] > best.1 {
                best = (n, self.votes[idx]);
            }
        }
        best
    }

    fn unvote(&mut self, x: u32, y: u32) {
        for n in 0..ANGLE_BINS {
            let idx = self.bin(n, x, y);
            self.votes[idx] -= 1;
        }
    }
}

/// Fixed-point stepper along a line through `(x0, y0)` with normal
/// angle bin `n`.
#[derive(Clone, Copy)]
struct Walker {
    x: i64,
    y: i64,
    dx: i64,
    dy: i64,
    x_major: bool,
}

impl Walker {
    #[allow(clippy::cast_possible_truncation)]
    fn new(x0: u32, y0: u32, cos: f64, sin: f64) -> Self {
        let a = -sin;
        let b = cos;
        let one = f64::from(1u32 << SHIFT);
        let half = 1i64 << (SHIFT - 1);
        if a.abs() > b.abs() {
            Self {
                x: i64::from(x0),
                y: (i64::from(y0) << SHIFT) + half,
                dx: if a > 0.0 { 1 } else { -1 },
                dy: (b * one / a.abs()).round() as i64,
                x_major: true,
            }
        } else {
            Self {
                x: (i64::from(x0) << SHIFT) + half,
                y: i64::from(y0),
                dx: (a * one / b.abs()).round() as i64,
                dy: if b > 0.0 { 1 } else { -1 },
                x_major: false,
            }
        }
    }

    const fn reversed(self) -> Self {
        Self {
            dx: -self.dx,
            dy: -self.dy,
            ..self
        }
    }

    const fn pixel(&self) -> (i64, i64) {
        if self.x_major {
            (self.x, self.y >> SHIFT)
        } else {
            (self.x >> SHIFT, self.y)
        }
    }

    const fn step(&mut self) {
        self.x += self.dx;
        self.y += self.dy;
    }
}

fn in_bounds(p: (i64, i64), w: u32, h: u32) -> Option<(u32, u32)> {
    let x = u32::try_from(p.0).ok()?;
    let y = u32::try_from(p.1).ok()?;
    (x < w && y < h).then_some((x, y))
}

/// Detect line segments in a binary edge map.
///
/// `rng` only decides the order in which edge pixels are visited; a
/// seeded generator makes the result reproducible.
#[must_use]
pub fn detect_segments(edges: &GrayImage, config: &CrackConfig, rng: &mut impl Rng) -> Vec<LineSegment> {
    let (w, h) = edges.dimensions();
    let mut mask: Vec<bool> = edges.as_raw().iter().map(|v| *v > 0).collect();
    let mut points: Vec<(u32, u32)> = edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] > 0)
        .map(|(x, y, _)| (x, y))
        .collect();
    points.shuffle(rng);

    let mut acc = Accumulator::new(w, h);
    let mut segments = Vec::new();
    let idx = |x: u32, y: u32| (y as usize) * (w as usize) + x as usize;
    let max_gap = i64::from(config.max_line_gap);
    let min_len = i64::from(config.min_line_length);

    for (px, py) in points {
        if !mask[idx(px, py)] {
            continue;
        }
        let (n, count) = acc.vote(px, py);
        if count < i64::from(config.vote_threshold) {
            continue;
        }

        let (cos, sin) = acc.trig[n];
        let forward = Walker::new(px, py, cos, sin);
        let mut ends = [(px, py); 2];
        for (k, end) in ends.iter_mut().enumerate() {
            let mut walker = if k == 0 { forward } else { forward.reversed() };
            let mut gap = 0;
            while let Some((x, y)) = in_bounds(walker.pixel(), w, h) {
                if mask[idx(x, y)] {
                    gap = 0;
                    *end = (x, y);
                } else {
                    gap += 1;
                    if gap > max_gap {
                        break;
                    }
                }
                walker.step();
            }
        }

        let good = (i64::from(ends[1].0) - i64::from(ends[0].0)).abs() >= min_len
            || (i64::from(ends[1].1) - i64::from(ends[0].1)).abs() >= min_len;

        for (k, end) in ends.iter().enumerate() {
            let mut walker = if k == 0 { forward } else { forward.reversed() };
            while let Some((x, y)) = in_bounds(walker.pixel(), w, h) {
                let i = idx(x, y);
                if mask[i] {
                    if good {
                        acc.unvote(x, y);
                    }
                    mask[i] = false;
                }
                if (x, y) == *end {
                    break;
                }
                walker.step();
            }
        }

        if good {
            segments.push(LineSegment {
                start: ends[0],
                end: ends[1],
            });
        }
    }
    segments
}
