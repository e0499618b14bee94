//! Radial boundary scanning over an RGBA raster.
//!
//! Rays are cast from a center point at a fixed angular step. Each ray
//! marches outward at a fixed radial step while pixels classify as
//! background (transparent or near-white). The radius where the first
//! non-background pixel is hit, or where the ray leaves the image, is the
//! boundary for that angle.

use crate::color_utils::{luminance, normalize_rgba, saturation};

use super::DetectionParams;

/// Pixel classification thresholds, all in 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundThresholds {
    /// Pixels with alpha below this are transparent background
    pub alpha_threshold: f32,
    /// Minimum luminance for near-white background
    pub white_cutoff: f32,
    /// Maximum saturation for near-white background
    pub max_saturation: f32,
    /// Tolerance added to both white tests for off-white paper
    pub offwhite_boost: f32,
}

impl BackgroundThresholds {
    /// Whether an RGBA pixel counts as background.
    pub fn is_background(&self, pixel: [u8; 4]) -> bool {
        let [r, g, b, a] = normalize_rgba(pixel);
        if a < self.alpha_threshold {
            return true;
        }
        luminance(r, g, b) > self.white_cutoff - self.offwhite_boost
            && saturation(r, g, b) < self.max_saturation + self.offwhite_boost
    }
}

/// Borrowed RGBA8 pixel buffer.
#[derive(Debug, Clone, Copy)]
pub struct RasterView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> RasterView<'a> {
    /// Wrap a row-major RGBA8 buffer.
    ///
    /// Returns `None` for empty images or when the buffer length does not
    /// match the dimensions.
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if width == 0 || height == 0 || data.len() != expected {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    /// View a decoded image.
    pub fn from_image(image: &'a image::RgbaImage) -> Option<Self> {
        Self::new(image.as_raw(), image.width(), image.height())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at (x, y); caller guarantees bounds.
    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Pixel at rounded floating coordinates, `None` outside the image.
    fn pixel_at(&self, x: f64, y: f64) -> Option<[u8; 4]> {
        let (x, y) = (x.round(), y.round());
        if x < 0.0 || y < 0.0 || x >= f64::from(self.width) || y >= f64::from(self.height) {
            return None;
        }
        Some(self.pixel(x as u32, y as u32))
    }
}

/// Center estimate for the background opening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterEstimate {
    pub x: f64,
    pub y: f64,
    /// Fraction of pixels classified as background
    pub background_fraction: f64,
    /// Whether the geometric center was used instead of the mask centroid
    pub fallback: bool,
}

/// Centroid of all background pixels.
///
/// Falls back to the geometric center when fewer than
/// `min_background_fraction` of the pixels are background.
pub fn background_centroid(
    raster: &RasterView<'_>,
    thresholds: &BackgroundThresholds,
    min_background_fraction: f64,
) -> CenterEstimate {
    let mut count = 0u64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for y in 0..raster.height {
        for x in 0..raster.width {
            if thresholds.is_background(raster.pixel(x, y)) {
                count += 1;
                sum_x += f64::from(x);
                sum_y += f64::from(y);
            }
        }
    }

    let total = f64::from(raster.width) * f64::from(raster.height);
    let background_fraction = count as f64 / total;
    if count == 0 || background_fraction < min_background_fraction {
        log::debug!(
            "Background mask too small ({:.4}), using geometric center",
            background_fraction
        );
        return CenterEstimate {
            x: f64::from(raster.width - 1) / 2.0,
            y: f64::from(raster.height - 1) / 2.0,
            background_fraction,
            fallback: true,
        };
    }

    CenterEstimate {
        x: sum_x / count as f64,
        y: sum_y / count as f64,
        background_fraction,
        fallback: false,
    }
}

/// Largest radius that stays inside the image from `(cx, cy)`.
pub fn max_radius(width: u32, height: u32, cx: f64, cy: f64) -> f64 {
    let right = f64::from(width) - 1.0 - cx;
    let bottom = f64::from(height) - 1.0 - cy;
    cx.min(cy).min(right).min(bottom).max(0.0)
}

/// Boundary radius for each angle, starting at 0° and stepping by
/// `params.angle_step_deg` around the full circle.
pub fn scan_boundaries(
    raster: &RasterView<'_>,
    center: (f64, f64),
    thresholds: &BackgroundThresholds,
    params: &DetectionParams,
) -> Vec<f64> {
    let (cx, cy) = center;
    let limit = max_radius(raster.width, raster.height, cx, cy);
    let angle_step = if params.angle_step_deg > 0.0 {
        params.angle_step_deg
    } else {
        crate::constants::DEFAULT_ANGLE_STEP_DEG
    };
    let radius_step = if params.radius_step_px > 0.0 {
        params.radius_step_px
    } else {
        crate::constants::DEFAULT_RADIUS_STEP_PX
    };

    let samples = (360.0 / angle_step).floor().max(1.0) as usize;
    (0..samples)
        .map(|i| {
            let theta = (i as f64 * angle_step).to_radians();
            let (sin, cos) = theta.sin_cos();
            let mut r = 0.0;
            while r <= limit {
                match raster.pixel_at(cx + r * cos, cy + r * sin) {
                    Some(pixel) if thresholds.is_background(pixel) => r += radius_step,
                    _ => return r,
                }
            }
            limit
        })
        .collect()
}
