//! Per-element position and color overrides.
//!
//! Overrides are keyed by element id. An entry that has no remaining keys is
//! never kept around: every helper that can empty an entry removes it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::color_utils::is_hex_color;
use crate::error::ValidationError;

/// Partial adjustment of one chart element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementOverride {
    /// Horizontal offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dx: Option<f64>,
    /// Vertical offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dy: Option<f64>,
    /// Radial offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dr: Option<f64>,
    /// Tangential (angular) offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>,
    /// Hex color replacing the element's default color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Overrides keyed by element id.
pub type Overrides = BTreeMap<String, ElementOverride>;

impl ElementOverride {
    /// An override that only moves the element.
    pub fn offset(dx: f64, dy: f64) -> Self {
        Self {
            dx: Some(dx),
            dy: Some(dy),
            ..Default::default()
        }
    }

    /// An override that only recolors the element.
    pub fn colored(color: impl Into<String>) -> Self {
        Self {
            color: Some(color.into()),
            ..Default::default()
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.dx.is_none()
            && self.dy.is_none()
            && self.dr.is_none()
            && self.dt.is_none()
            && self.color.is_none()
    }

    /// Overlay the fields set in `patch` onto this entry.
    pub fn merge(&mut self, patch: &ElementOverride) {
        if patch.dx.is_some() {
            self.dx = patch.dx;
        }
        if patch.dy.is_some() {
            self.dy = patch.dy;
        }
        if patch.dr.is_some() {
            self.dr = patch.dr;
        }
        if patch.dt.is_some() {
            self.dt = patch.dt;
        }
        if patch.color.is_some() {
            self.color.clone_from(&patch.color);
        }
    }

    fn validate(&self, element: &str) -> Result<(), ValidationError> {
        for (field, value) in [("dx", self.dx), ("dy", self.dy), ("dr", self.dr), ("dt", self.dt)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ValidationError::non_finite(format!("{element}.{field}")));
            }
        }
        if let Some(color) = &self.color {
            if !is_hex_color(color) {
                return Err(ValidationError::InvalidColor {
                    element: element.to_string(),
                    color: color.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Set or remove the color of every target element.
///
/// With `None` the `color` key is removed and entries left empty are deleted.
pub fn apply_color(overrides: &mut Overrides, targets: &[String], color: Option<&str>) {
    for target in targets {
        match color {
            Some(color) => {
                overrides.entry(target.clone()).or_default().color = Some(color.to_string());
            }
            None => {
                let now_empty = match overrides.get_mut(target) {
                    Some(entry) => {
                        entry.color = None;
                        entry.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    overrides.remove(target);
                }
            }
        }
    }
}

/// Merge a partial override into the entry for `element`.
pub fn update_override(overrides: &mut Overrides, element: &str, patch: &ElementOverride) {
    let entry = overrides.entry(element.to_string()).or_default();
    entry.merge(patch);
    if entry.is_empty() {
        overrides.remove(element);
    }
}

/// Validate every entry and drop the empty ones.
pub fn normalize_overrides(overrides: Overrides) -> Result<Overrides, ValidationError> {
    let mut normalized = Overrides::new();
    for (element, entry) in overrides {
        entry.validate(&element)?;
        if entry.is_empty() {
            log::debug!("Dropping empty override for '{}'", element);
            continue;
        }
        normalized.insert(element, entry);
    }
    Ok(normalized)
}
