//! Calibration region to chart fit.

use serde::{Deserialize, Serialize};

use crate::model::{CalibrationRegion, ChartFit};

/// Chart geometry in chart-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartGeometry {
    pub center_x: f64,
    pub center_y: f64,
    /// Radius of the outermost ring, which is matched to the opening
    pub outer_ring_radius: f64,
}

/// Pixel size of the canvas the frame image is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Fit that centers the chart on the region and scales its outer ring to
/// the region's horizontal radius.
///
/// `rotation_deg` is carried over unchanged. Returns `None` when the
/// geometry or canvas cannot produce a valid fit (non-positive ring radius
/// or canvas width, zero region radius, non-finite input).
pub fn calibration_to_fit(
    chart: &ChartGeometry,
    region: &CalibrationRegion,
    canvas: CanvasSize,
    rotation_deg: f64,
) -> Option<ChartFit> {
    if chart.outer_ring_radius <= 0.0 || canvas.width <= 0.0 || canvas.height <= 0.0 {
        return None;
    }
    let cx = region.center_x_norm * canvas.width;
    let cy = region.center_y_norm * canvas.height;
    let scale = region.radius_x_norm * canvas.width / chart.outer_ring_radius;
    ChartFit::new(cx - chart.center_x, cy - chart.center_y, scale, rotation_deg)
        .validate()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart() -> ChartGeometry {
        ChartGeometry {
            center_x: 500.0,
            center_y: 500.0,
            outer_ring_radius: 400.0,
        }
    }

    #[test]
    fn test_maps_region_to_fit() {
        let region = CalibrationRegion {
            center_x_norm: 0.5,
            center_y_norm: 0.25,
            radius_x_norm: 0.2,
            radius_y_norm: 0.4,
        };
        let fit = calibration_to_fit(&chart(), &region, CanvasSize::new(2000.0, 1000.0), 12.0)
            .unwrap();
        assert_eq!(fit.dx, 500.0);
        assert_eq!(fit.dy, -250.0);
        assert_eq!(fit.scale, 1.0);
        assert_eq!(fit.rotation_deg, 12.0);
    }

    #[test]
    fn test_degenerate_inputs_give_none() {
        let region = CalibrationRegion {
            center_x_norm: 0.5,
            center_y_norm: 0.5,
            radius_x_norm: 0.0,
            radius_y_norm: 0.0,
        };
        let canvas = CanvasSize::new(1000.0, 1000.0);
        assert_eq!(calibration_to_fit(&chart(), &region, canvas, 0.0), None);

        let flat = ChartGeometry {
            outer_ring_radius: 0.0,
            ..chart()
        };
        let region = CalibrationRegion {
            radius_x_norm: 0.3,
            ..region
        };
        assert_eq!(calibration_to_fit(&flat, &region, canvas, 0.0), None);
    }
}
