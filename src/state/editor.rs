//! Editing state and its transitions.
//!
//! Every change to a document goes through [`Action`]. Transitions are pure:
//! [`reduce`] maps `(state, action)` to a new state, and
//! [`EditorState::apply`] is the in-place form used by the sync engine.
//!
//! Version rules:
//! - user edits (`SetFit`, `SetOverrides`, `UpdateOverride`, `SetDesign`,
//!   `ApplyColor`, `ClearCalibration`, user-sourced `SetCalibration`, resets
//!   and history application) bump `client_version` by exactly one;
//! - `Load`, `ApplyDraft` and `AutoFitApplied` never bump it, nor do
//!   auto-detected calibrations (both are derived, not authored);
//! - `MarkSynced` only ever raises `server_version`, and never above
//!   `client_version`.

use crate::model::{
    CalibrationRegion, CalibrationSource, CalibrationState, ChartFit, ContextKey, Design,
    DocumentModel, ElementOverride, Overrides, Timestamp, apply_color, update_override,
};
use crate::state::snapshot::HistorySnapshot;

/// A transition of the editing state.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Establish a new baseline from the server (or an empty document)
    Load {
        fit: ChartFit,
        overrides: Overrides,
        design: Design,
        calibration: Option<CalibrationRegion>,
        calibration_cleared: bool,
        user_adjusted: bool,
    },
    /// Replace the state wholesale from a restored draft
    ApplyDraft {
        fit: ChartFit,
        overrides: Overrides,
        design: Design,
        calibration: Option<CalibrationRegion>,
        calibration_cleared: bool,
        client_version: u64,
        server_version: u64,
        saved_at: Option<Timestamp>,
        synced_at: Option<Timestamp>,
    },
    /// Manual fit change (drag, numeric input)
    SetFit(ChartFit),
    /// Replace all overrides
    SetOverrides(Overrides),
    /// Merge a partial override into one element
    UpdateOverride {
        element: String,
        patch: ElementOverride,
    },
    /// Replace design settings
    SetDesign(Design),
    /// Set (`Some`) or remove (`None`) the color of several elements
    ApplyColor {
        targets: Vec<String>,
        color: Option<String>,
    },
    /// Change the selected elements (not versioned)
    SetSelection(Vec<String>),
    /// Store a calibration region
    SetCalibration {
        region: CalibrationRegion,
        source: CalibrationSource,
    },
    /// Remove the calibration region and block automatic re-detection
    ClearCalibration,
    /// The remote store acknowledged `acknowledged_version`
    MarkSynced {
        acknowledged_version: u64,
        saved_at: Timestamp,
    },
    /// Revert fit/overrides/design to the loaded baseline
    ResetToInitial,
    /// Revert fit/overrides/design to the last saved state
    ResetToSaved,
    /// Fit derived from calibration; not a user edit
    AutoFitApplied(ChartFit),
    /// Undo/redo step; tagged so the history watcher ignores it
    ApplyHistory(HistorySnapshot),
}

impl Action {
    /// Short name used in log output.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Load { .. } => "LOAD",
            Action::ApplyDraft { .. } => "APPLY_DRAFT",
            Action::SetFit(_) => "SET_FIT",
            Action::SetOverrides(_) => "SET_OVERRIDES",
            Action::UpdateOverride { .. } => "UPDATE_OVERRIDE",
            Action::SetDesign(_) => "SET_DESIGN",
            Action::ApplyColor { .. } => "APPLY_COLOR",
            Action::SetSelection(_) => "SET_SELECTION",
            Action::SetCalibration { .. } => "SET_CALIBRATION",
            Action::ClearCalibration => "CLEAR_CALIBRATION",
            Action::MarkSynced { .. } => "MARK_SYNCED",
            Action::ResetToInitial => "RESET_TO_INITIAL",
            Action::ResetToSaved => "RESET_TO_SAVED",
            Action::AutoFitApplied(_) => "AUTO_FIT_APPLIED",
            Action::ApplyHistory(_) => "APPLY_HISTORY",
        }
    }

    /// Whether this action came from undo/redo.
    pub fn is_history(&self) -> bool {
        matches!(self, Action::ApplyHistory(_))
    }
}

/// Full editing state for one context.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    /// The persisted document
    pub doc: DocumentModel,
    /// The user moved/scaled the fit by hand; blocks auto-fit
    pub user_adjusted: bool,
    /// Selected element ids
    pub selection: Vec<String>,
    /// Calibration region and how it was obtained
    pub calibration: CalibrationState,
    /// Baseline captured at load time (and updated by auto-fit)
    pub initial: HistorySnapshot,
    /// Last state acknowledged by the remote store
    pub saved: HistorySnapshot,
}

impl EditorState {
    /// Blank state for a context, before any baseline arrives.
    pub fn new(context_key: ContextKey) -> Self {
        let doc = DocumentModel::new(context_key);
        let baseline = HistorySnapshot::of(&doc);
        Self {
            doc,
            user_adjusted: false,
            selection: Vec::new(),
            calibration: CalibrationState::Unset,
            initial: baseline.clone(),
            saved: baseline,
        }
    }

    /// The undoable slice of the current document.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot::of(&self.doc)
    }

    /// Apply a transition in place.
    pub fn apply(&mut self, action: Action) {
        log::trace!("Transition {} on {}", action.name(), self.doc.context_key);
        match action {
            Action::Load {
                fit,
                overrides,
                design,
                calibration,
                calibration_cleared,
                user_adjusted,
            } => {
                self.doc.fit = fit;
                self.doc.overrides = overrides;
                self.doc.design = design;
                self.doc.client_version = 0;
                self.doc.server_version = 0;
                self.doc.last_saved_at = None;
                self.doc.last_synced_at = None;
                self.user_adjusted = user_adjusted;
                self.selection.clear();
                self.set_calibration_state(CalibrationState::from_saved(calibration, calibration_cleared));
                self.initial = self.snapshot();
                self.saved = self.snapshot();
            }
            Action::ApplyDraft {
                fit,
                overrides,
                design,
                calibration,
                calibration_cleared,
                client_version,
                server_version,
                saved_at,
                synced_at,
            } => {
                self.doc.fit = fit;
                self.doc.overrides = overrides;
                self.doc.design = design;
                self.doc.client_version = client_version;
                self.doc.server_version = server_version.min(client_version);
                self.doc.last_saved_at = saved_at;
                self.doc.last_synced_at = synced_at;
                self.user_adjusted = true;
                self.selection.clear();
                self.set_calibration_state(CalibrationState::from_saved(calibration, calibration_cleared));
            }
            Action::SetFit(fit) => {
                self.doc.fit = fit;
                self.user_adjusted = true;
                self.bump();
            }
            Action::SetOverrides(overrides) => {
                self.doc.overrides = overrides;
                self.bump();
            }
            Action::UpdateOverride { element, patch } => {
                update_override(&mut self.doc.overrides, &element, &patch);
                self.bump();
            }
            Action::SetDesign(design) => {
                self.doc.design = design;
                self.bump();
            }
            Action::ApplyColor { targets, color } => {
                apply_color(&mut self.doc.overrides, &targets, color.as_deref());
                self.bump();
            }
            Action::SetSelection(ids) => {
                self.selection = ids;
            }
            Action::SetCalibration { region, source } => {
                self.set_calibration_state(CalibrationState::from_source(region, source));
                if source == CalibrationSource::User {
                    self.bump();
                }
            }
            Action::ClearCalibration => {
                self.set_calibration_state(CalibrationState::ClearedByUser);
                self.bump();
            }
            Action::MarkSynced {
                acknowledged_version,
                saved_at,
            } => {
                let acknowledged = acknowledged_version.min(self.doc.client_version);
                self.doc.server_version = self.doc.server_version.max(acknowledged);
                self.doc.last_saved_at = Some(saved_at);
                self.doc.last_synced_at = Some(saved_at);
                if !self.doc.has_unsynced_changes() {
                    self.saved = self.snapshot();
                }
            }
            Action::ResetToInitial => {
                let baseline = self.initial.clone();
                baseline.apply_to(&mut self.doc);
                self.bump();
            }
            Action::ResetToSaved => {
                let baseline = self.saved.clone();
                baseline.apply_to(&mut self.doc);
                self.bump();
            }
            Action::AutoFitApplied(fit) => {
                self.doc.fit = fit;
                self.initial.fit = fit;
            }
            Action::ApplyHistory(snapshot) => {
                snapshot.apply_to(&mut self.doc);
                self.bump();
            }
        }
        debug_assert!(self.doc.server_version <= self.doc.client_version);
    }

    fn bump(&mut self) {
        self.doc.client_version += 1;
    }

    fn set_calibration_state(&mut self, calibration: CalibrationState) {
        self.calibration = calibration;
        self.doc.calibration_region = calibration.region();
        self.doc.calibration_cleared = calibration.is_cleared();
    }
}

/// Pure transition function: `(state, action) -> state'`.
pub fn reduce(state: &EditorState, action: Action) -> EditorState {
    let mut next = state.clone();
    next.apply(action);
    next
}
