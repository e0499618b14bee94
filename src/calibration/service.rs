//! Frame calibration service with per-image caching.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use image::RgbaImage;

use super::fetch::ImageFetcher;
use super::fitter::fit_ellipse;
use super::scanner::{RasterView, background_centroid, scan_boundaries};
use super::DetectionParams;
use crate::cache::{DurableCache, get_json, set_json};
use crate::constants::CALIBRATION_NAMESPACE;
use crate::error::CalibrationError;
use crate::model::CalibrationRegion;

/// Explicit scan center in image-fraction coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterOverride {
    pub x_norm: f64,
    pub y_norm: f64,
}

/// Durable cache key for an image's calibration.
pub fn calibration_cache_key(image_id: &str) -> String {
    format!("{}:{}", CALIBRATION_NAMESPACE, image_id)
}

/// Detects and caches calibration regions per image identity.
///
/// Results are kept in memory and in the durable cache. Entries are only
/// dropped through [`invalidate`](Self::invalidate); a different image has
/// a different identity. Clones share the in-memory layer.
#[derive(Debug, Clone)]
pub struct FrameCalibrationService<C, F> {
    cache: C,
    fetcher: F,
    params: DetectionParams,
    memory: Rc<RefCell<HashMap<String, CalibrationRegion>>>,
}

impl<C: DurableCache, F: ImageFetcher> FrameCalibrationService<C, F> {
    pub fn new(cache: C, fetcher: F) -> Self {
        Self::with_params(cache, fetcher, DetectionParams::default())
    }

    pub fn with_params(cache: C, fetcher: F, params: DetectionParams) -> Self {
        Self {
            cache,
            fetcher,
            params,
            memory: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    /// In-memory result for `image_id`, without touching the durable cache.
    pub fn cached(&self, image_id: &str) -> Option<CalibrationRegion> {
        self.memory.borrow().get(image_id).copied()
    }

    /// Calibration region for `image_id`, computed once and cached.
    pub async fn detect(&self, image_id: &str) -> Result<CalibrationRegion, CalibrationError> {
        if let Some(region) = self.cached(image_id) {
            log::debug!("Calibration memory hit for {}", image_id);
            return Ok(region);
        }

        let key = calibration_cache_key(image_id);
        match get_json::<C, CalibrationRegion>(&self.cache, &key).await {
            Ok(Some(region)) => match region.validate() {
                Ok(region) => {
                    log::debug!("Calibration cache hit for {}", image_id);
                    self.remember(image_id, region);
                    return Ok(region);
                }
                Err(e) => log::warn!("Ignoring cached calibration for {}: {}", image_id, e),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Calibration cache read failed for {}: {}", image_id, e),
        }

        log::debug!("Calibration miss for {}, detecting", image_id);
        let image = self.load(image_id).await?;
        let region = analyze(image_id, &image, None, &self.params)?;
        self.remember(image_id, region);

        if let Err(e) = set_json(&self.cache, &key, &region).await {
            log::warn!("Could not persist calibration for {}: {}", image_id, e);
        }
        Ok(region)
    }

    /// Detect with an explicit center and thresholds. Never cached.
    pub async fn detect_with_override_center(
        &self,
        image_id: &str,
        center: Option<CenterOverride>,
        white_cutoff: f32,
        offwhite_boost: f32,
    ) -> Result<CalibrationRegion, CalibrationError> {
        let params = DetectionParams {
            white_cutoff,
            offwhite_boost,
            ..self.params
        };
        let image = self.load(image_id).await?;
        analyze(image_id, &image, center, &params)
    }

    /// Forget the result for `image_id` in memory and in the durable cache.
    pub async fn invalidate(&self, image_id: &str) {
        self.memory.borrow_mut().remove(image_id);
        if let Err(e) = self.cache.delete(&calibration_cache_key(image_id)).await {
            log::warn!("Could not remove cached calibration for {}: {}", image_id, e);
        }
        log::debug!("Calibration invalidated for {}", image_id);
    }

    fn remember(&self, image_id: &str, region: CalibrationRegion) {
        self.memory.borrow_mut().insert(image_id.to_string(), region);
    }

    async fn load(&self, image_id: &str) -> Result<RgbaImage, CalibrationError> {
        let bytes = self.fetcher.fetch(image_id).await?;
        let image =
            image::load_from_memory(&bytes).map_err(|source| CalibrationError::ImageLoad {
                source_id: image_id.to_string(),
                source,
            })?;
        Ok(image.to_rgba8())
    }
}

/// Run scan and fit on a decoded image and normalize the result.
pub fn analyze(
    image_id: &str,
    image: &RgbaImage,
    center: Option<CenterOverride>,
    params: &DetectionParams,
) -> Result<CalibrationRegion, CalibrationError> {
    let raster =
        RasterView::from_image(image).ok_or_else(|| CalibrationError::ContextUnavailable {
            source_id: image_id.to_string(),
            width: image.width(),
            height: image.height(),
        })?;
    let (width, height) = (raster.width(), raster.height());
    let thresholds = params.thresholds();

    let (cx, cy) = match center {
        Some(c) => (c.x_norm * f64::from(width), c.y_norm * f64::from(height)),
        None => {
            let estimate = background_centroid(&raster, &thresholds, params.min_background_fraction);
            (estimate.x, estimate.y)
        }
    };

    let radii = scan_boundaries(&raster, (cx, cy), &thresholds, params);
    let fit = fit_ellipse(&radii, width, params);
    log::info!(
        "🎯 Calibrated {} ({}x{}): center ({:.1}, {:.1}), radii ({:.1}, {:.1}) via {:?}",
        image_id,
        width,
        height,
        cx,
        cy,
        fit.radii.rx,
        fit.radii.ry,
        fit.method
    );
    Ok(CalibrationRegion::from_pixels(
        cx,
        cy,
        fit.radii.rx,
        fit.radii.ry,
        width,
        height,
    ))
}
