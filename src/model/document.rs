//! The canonical, serializable editing state of one context.

use std::fmt;

use serde::{Deserialize, Serialize};
use web_time::{SystemTime, UNIX_EPOCH};

use crate::constants::{CHART_ONLY_MARKER, DRAFT_NAMESPACE};
use crate::model::calibration::CalibrationRegion;
use crate::model::fit::ChartFit;
use crate::model::overrides::Overrides;

/// Wall-clock time in milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Current wall-clock time as a [`Timestamp`].
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// Frame half of a context key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRef {
    /// Editing the chart without a frame
    ChartOnly,
    /// Editing the chart inside a specific frame
    Frame(String),
}

/// Identity of one editing session: chart plus frame (or chart-only).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextKey {
    pub chart_id: String,
    pub frame: FrameRef,
}

impl ContextKey {
    /// Context for a chart inside a frame.
    pub fn framed(chart_id: impl Into<String>, frame_id: impl Into<String>) -> Self {
        Self {
            chart_id: chart_id.into(),
            frame: FrameRef::Frame(frame_id.into()),
        }
    }

    /// Context for a chart without a frame.
    pub fn chart_only(chart_id: impl Into<String>) -> Self {
        Self {
            chart_id: chart_id.into(),
            frame: FrameRef::ChartOnly,
        }
    }

    /// Frame id, if this context has one.
    pub fn frame_id(&self) -> Option<&str> {
        match &self.frame {
            FrameRef::Frame(id) => Some(id),
            FrameRef::ChartOnly => None,
        }
    }

    /// Durable cache key under which drafts for this context are stored.
    ///
    /// Ids are percent-escaped so that no two contexts share a key.
    pub fn draft_cache_key(&self) -> String {
        let frame = match &self.frame {
            FrameRef::ChartOnly => CHART_ONLY_MARKER.to_string(),
            // Keep a frame named like the marker apart from chart-only.
            FrameRef::Frame(id) if id == CHART_ONLY_MARKER => {
                format!("%{:02X}{}", b'c', &id[1..])
            }
            FrameRef::Frame(id) => escape_key_part(id),
        };
        format!(
            "{}:{}:{}",
            DRAFT_NAMESPACE,
            escape_key_part(&self.chart_id),
            frame
        )
    }
}

fn escape_key_part(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.frame {
            FrameRef::ChartOnly => write!(f, "{}:{}", self.chart_id, CHART_ONLY_MARKER),
            FrameRef::Frame(id) => write!(f, "{}:{}", self.chart_id, id),
        }
    }
}

/// Design settings (layer order, opacities, glyph scales, ...).
///
/// Opaque to the core: only compared, versioned and persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Design(pub serde_json::Map<String, serde_json::Value>);

impl Design {
    /// Return a copy with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Look up a design setting.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

/// Versioned document for one editing context.
///
/// Invariant: `server_version <= client_version`. A larger `client_version`
/// means local edits have not been acknowledged by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentModel {
    pub context_key: ContextKey,
    #[serde(default)]
    pub fit: ChartFit,
    #[serde(default)]
    pub overrides: Overrides,
    #[serde(default)]
    pub design: Design,
    #[serde(default)]
    pub calibration_region: Option<CalibrationRegion>,
    /// The user removed the region; blocks automatic re-detection
    #[serde(default)]
    pub calibration_cleared: bool,
    #[serde(default)]
    pub client_version: u64,
    #[serde(default)]
    pub server_version: u64,
    #[serde(default)]
    pub last_saved_at: Option<Timestamp>,
    #[serde(default)]
    pub last_synced_at: Option<Timestamp>,
}

impl DocumentModel {
    /// Empty document for a context.
    pub fn new(context_key: ContextKey) -> Self {
        Self {
            context_key,
            fit: ChartFit::identity(),
            overrides: Overrides::new(),
            design: Design::default(),
            calibration_region: None,
            calibration_cleared: false,
            client_version: 0,
            server_version: 0,
            last_saved_at: None,
            last_synced_at: None,
        }
    }

    /// Whether local edits exist that the remote store has not acknowledged.
    pub fn has_unsynced_changes(&self) -> bool {
        self.client_version > self.server_version
    }

    /// Serialize for the durable cache.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a cached draft.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
