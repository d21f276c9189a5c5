//! Per-pixel perceptual comparison of two raster images.
//!
//! Each pixel pair is compared in YIQ space (alpha blended onto white) and
//! counted as different when its squared delta exceeds
//! `35215 * threshold^2`, where 35215 is the largest possible YIQ delta.
//! Pixels that look like anti-aliasing in either image are not counted unless
//! [`CompareOptions::include_anti_aliasing`] is set.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_YIQ_DELTA: f64 = 35215.0;
pub const DEFAULT_THRESHOLD: f64 = 0.1;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Incomparable dimensions: {left_width}x{left_height} vs {right_width}x{right_height}")]
    IncomparableDimensions {
        left_width: u32,
        left_height: u32,
        right_width: u32,
        right_height: u32,
    },
    #[error("Threshold must be between 0 and 1, got {0}")]
    InvalidThreshold(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CompareOptions {
    /// Sensitivity on a 0-1 scale; smaller is stricter.
    pub threshold: f64,
    /// Count anti-aliased pixels as differences.
    pub include_anti_aliasing: bool,
    /// Opacity of unchanged pixels in the diff image.
    pub diff_alpha: f64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            include_anti_aliasing: false,
            diff_alpha: 0.1,
        }
    }
}

impl CompareOptions {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CompareError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(CompareError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CompareOutcome {
    pub width: u32,
    pub height: u32,
    pub total_pixels: u64,
    pub different_pixels: u64,
    pub anti_aliased_pixels: u64,
    /// `(total - different) / total`, 1.0 for empty images.
    pub matching_ratio: f64,
    pub diff_image: Option<RgbaImage>,
}

const DIFF_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const AA_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);

#[derive(Debug, Clone, Copy, Default)]
pub struct PixelComparator {
    options: CompareOptions,
}

impl PixelComparator {
    pub fn new(options: CompareOptions) -> Result<Self, CompareError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    /// Decode two encoded images (PNG, JPEG, ...) and compare them.
    pub fn compare_bytes(&self, left: &[u8], right: &[u8]) -> Result<CompareOutcome, CompareError> {
        let left = image::load_from_memory(left)?.to_rgba8();
        let right = image::load_from_memory(right)?.to_rgba8();
        self.compare(&left, &right, false)
    }

    /// Compare two decoded images; `with_diff` also renders a diff image.
    pub fn compare(
        &self,
        left: &RgbaImage,
        right: &RgbaImage,
        with_diff: bool,
    ) -> Result<CompareOutcome, CompareError> {
        if left.dimensions() != right.dimensions() {
            return Err(CompareError::IncomparableDimensions {
                left_width: left.width(),
                left_height: left.height(),
                right_width: right.width(),
                right_height: right.height(),
            });
        }

        let (width, height) = left.dimensions();
        let total_pixels = u64::from(width) * u64::from(height);
        let mut diff_image = with_diff.then(|| RgbaImage::new(width, height));

        if left.as_raw() == right.as_raw() {
            if let Some(out) = diff_image.as_mut() {
                for (x, y, pixel) in left.enumerate_pixels() {
                    out.put_pixel(x, y, faded_gray(pixel, self.options.diff_alpha));
                }
            }
            return Ok(CompareOutcome {
                width,
                height,
                total_pixels,
                different_pixels: 0,
                anti_aliased_pixels: 0,
                matching_ratio: 1.0,
                diff_image,
            });
        }

        let max_delta = MAX_YIQ_DELTA * self.options.threshold * self.options.threshold;
        let mut different_pixels = 0u64;
        let mut anti_aliased_pixels = 0u64;

        for y in 0..height {
            for x in 0..width {
                let a = left.get_pixel(x, y);
                let b = right.get_pixel(x, y);
                let delta = color_delta(a, b, false);

                let marker = if delta.abs() > max_delta {
                    let anti_aliased = !self.options.include_anti_aliasing
                        && (is_anti_aliased(left, x, y, right)
                            || is_anti_aliased(right, x, y, left));
                    if anti_aliased {
                        anti_aliased_pixels += 1;
                        AA_COLOR
                    } else {
                        different_pixels += 1;
                        DIFF_COLOR
                    }
                } else {
                    faded_gray(a, self.options.diff_alpha)
                };

                if let Some(out) = diff_image.as_mut() {
                    out.put_pixel(x, y, marker);
                }
            }
        }

        Ok(CompareOutcome {
            width,
            height,
            total_pixels,
            different_pixels,
            anti_aliased_pixels,
            matching_ratio: matching_ratio(total_pixels, different_pixels),
            diff_image,
        })
    }
}

pub fn matching_ratio(total_pixels: u64, different_pixels: u64) -> f64 {
    if total_pixels == 0 {
        return 1.0;
    }
    (total_pixels - different_pixels.min(total_pixels)) as f64 / total_pixels as f64
}

fn blend(channel: f64, alpha: f64) -> f64 {
    255.0 + (channel - 255.0) * alpha
}

fn blended_rgb(pixel: &Rgba<u8>) -> (f64, f64, f64) {
    let [r, g, b, a] = pixel.0;
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    if a == 255 {
        return (r, g, b);
    }
    let alpha = f64::from(a) / 255.0;
    (blend(r, alpha), blend(g, alpha), blend(b, alpha))
}

fn rgb_to_y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23
}

fn rgb_to_i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.595_977_99 - g * 0.274_176_10 - b * 0.321_801_89
}

fn rgb_to_q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94
}

/// Squared YIQ distance between two pixels, negative when `b` is lighter.
/// With `brightness_only`, returns the signed luma difference instead.
fn color_delta(a: &Rgba<u8>, b: &Rgba<u8>, brightness_only: bool) -> f64 {
    if a == b {
        return 0.0;
    }

    let (r1, g1, b1) = blended_rgb(a);
    let (r2, g2, b2) = blended_rgb(b);

    let y1 = rgb_to_y(r1, g1, b1);
    let y2 = rgb_to_y(r2, g2, b2);
    let y = y1 - y2;
    if brightness_only {
        return y;
    }

    let i = rgb_to_i(r1, g1, b1) - rgb_to_i(r2, g2, b2);
    let q = rgb_to_q(r1, g1, b1) - rgb_to_q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;

    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

/// Clamped 3x3 neighbourhood around `(x, y)` and whether the pixel sits on
/// the image edge.
fn neighbourhood(image: &RgbaImage, x: u32, y: u32) -> (u32, u32, u32, u32, bool) {
    let x0 = x.saturating_sub(1);
    let y0 = y.saturating_sub(1);
    let x2 = (x + 1).min(image.width() - 1);
    let y2 = (y + 1).min(image.height() - 1);
    let on_edge = x == x0 || x == x2 || y == y0 || y == y2;
    (x0, y0, x2, y2, on_edge)
}

/// Anti-aliasing heuristic (Vyšniauskas, 2009): the pixel has both a darker
/// and a lighter neighbour, few identical neighbours, and the extreme
/// neighbour sits in a flat area in both images.
fn is_anti_aliased(image: &RgbaImage, x: u32, y: u32, other: &RgbaImage) -> bool {
    let (x0, y0, x2, y2, on_edge) = neighbourhood(image, x, y);
    let center = image.get_pixel(x, y);
    let mut zeroes = u32::from(on_edge);
    let mut min = 0.0f64;
    let mut max = 0.0f64;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0u32, 0u32, 0u32, 0u32);

    for nx in x0..=x2 {
        for ny in y0..=y2 {
            if nx == x && ny == y {
                continue;
            }
            let delta = color_delta(center, image.get_pixel(nx, ny), true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_x = nx;
                min_y = ny;
            } else if delta > max {
                max = delta;
                max_x = nx;
                max_y = ny;
            }
        }
    }

    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(image, min_x, min_y) && has_many_siblings(other, min_x, min_y))
        || (has_many_siblings(image, max_x, max_y) && has_many_siblings(other, max_x, max_y))
}

/// More than two neighbours share this pixel's exact colour.
fn has_many_siblings(image: &RgbaImage, x: u32, y: u32) -> bool {
    let (x0, y0, x2, y2, on_edge) = neighbourhood(image, x, y);
    let center = image.get_pixel(x, y);
    let mut zeroes = u32::from(on_edge);

    for nx in x0..=x2 {
        for ny in y0..=y2 {
            if nx == x && ny == y {
                continue;
            }
            if image.get_pixel(nx, ny) == center {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

fn faded_gray(pixel: &Rgba<u8>, alpha: f64) -> Rgba<u8> {
    let (r, g, b) = blended_rgb(pixel);
    let luma = blend(rgb_to_y(r, g, b), alpha * f64::from(pixel.0[3]) / 255.0);
    let v = luma.round().clamp(0.0, 255.0) as u8;
    Rgba([v, v, v, 255])
}
