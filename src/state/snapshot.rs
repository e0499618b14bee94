//! Document snapshot for undo/redo functionality.

use crate::model::{ChartFit, Design, DocumentModel, Overrides};

/// The undoable slice of a document.
///
/// Version counters and the calibration region are deliberately absent:
/// undo/redo never touches them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistorySnapshot {
    /// Overlay fit
    pub fit: ChartFit,
    /// Per-element overrides
    pub overrides: Overrides,
    /// Design settings
    pub design: Design,
}

impl HistorySnapshot {
    /// Capture the undoable slice of a document.
    pub fn of(doc: &DocumentModel) -> Self {
        Self {
            fit: doc.fit,
            overrides: doc.overrides.clone(),
            design: doc.design.clone(),
        }
    }

    /// Write this snapshot back into a document.
    pub fn apply_to(&self, doc: &mut DocumentModel) {
        doc.fit = self.fit;
        doc.overrides.clone_from(&self.overrides);
        doc.design.clone_from(&self.design);
    }
}
