//! Ellipse fitting over boundary radii.
//!
//! An axis-aligned ellipse centered on the scan origin satisfies
//! `cos²θ / rx² + sin²θ / ry² = 1 / r²`. Solving for `a = 1/rx²` and
//! `b = 1/ry²` is linear, so the fit is a 2x2 least-squares system. When
//! the system is singular or the solution is not an ellipse, a low
//! percentile of the radii is used as a circle instead, which ignores the
//! outward spikes that noise and artwork produce.

use std::f64::consts::TAU;

use super::DetectionParams;

/// Fitted radii in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EllipseRadii {
    pub rx: f64,
    pub ry: f64,
}

/// How the radii were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMethod {
    LeastSquares,
    Percentile,
    /// No usable samples
    Empty,
}

/// Fit result before and after the safety margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseFit {
    pub radii: EllipseRadii,
    pub method: FitMethod,
    /// Margin subtracted from the raw radii
    pub margin: f64,
}

/// Safety margin for an image of `width` pixels.
pub fn safety_margin(width: u32, params: &DetectionParams) -> f64 {
    (f64::from(width) * params.safety_margin_fraction).max(params.min_safety_margin_px)
}

/// Fit an ellipse to `radii`, evenly spaced over the full circle.
///
/// Zero and non-finite radii are ignored. An input with no usable samples
/// yields zero radii.
pub fn fit_ellipse(radii: &[f64], width: u32, params: &DetectionParams) -> EllipseFit {
    let n = radii.len();
    let samples: Vec<(f64, f64)> = radii
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_finite() && **r > 0.0)
        .map(|(i, r)| (TAU * i as f64 / n as f64, *r))
        .collect();

    if samples.is_empty() {
        return EllipseFit {
            radii: EllipseRadii::default(),
            method: FitMethod::Empty,
            margin: 0.0,
        };
    }

    let margin = safety_margin(width, params);
    let (raw, method) = match least_squares(&samples) {
        Some(raw) => (raw, FitMethod::LeastSquares),
        None => {
            let r = percentile(&samples, params.fallback_percentile);
            log::debug!("Ellipse fit degenerate, using percentile radius {:.2}", r);
            (EllipseRadii { rx: r, ry: r }, FitMethod::Percentile)
        }
    };

    EllipseFit {
        radii: EllipseRadii {
            rx: (raw.rx - margin).max(0.0),
            ry: (raw.ry - margin).max(0.0),
        },
        method,
        margin,
    }
}

fn least_squares(samples: &[(f64, f64)]) -> Option<EllipseRadii> {
    let (mut scc, mut sss, mut scs, mut scy, mut ssy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for &(theta, r) in samples {
        let c = theta.cos().powi(2);
        let s = theta.sin().powi(2);
        let y = 1.0 / (r * r);
        scc += c * c;
        sss += s * s;
        scs += c * s;
        scy += c * y;
        ssy += s * y;
    }

    let det = scc * sss - scs * scs;
    // Relative tolerance: an exactly singular system can come out slightly
    // positive in floating point.
    if det <= 1e-12 * scc.max(sss).powi(2) {
        return None;
    }
    let a = (sss * scy - scs * ssy) / det;
    let b = (scc * ssy - scs * scy) / det;
    if a <= 0.0 || b <= 0.0 || !a.is_finite() || !b.is_finite() {
        return None;
    }
    Some(EllipseRadii {
        rx: 1.0 / a.sqrt(),
        ry: 1.0 / b.sqrt(),
    })
}

fn percentile(samples: &[(f64, f64)], fraction: f64) -> f64 {
    let mut sorted: Vec<f64> = samples.iter().map(|&(_, r)| r).collect();
    sorted.sort_by(f64::total_cmp);
    let index = ((sorted.len() as f64 * fraction.clamp(0.0, 1.0)) as usize).min(sorted.len() - 1);
    sorted[index]
}
