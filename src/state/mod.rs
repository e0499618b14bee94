//! Editing state management modules.

mod editor;
mod snapshot;

pub use editor::{Action, EditorState, reduce};
pub use snapshot::HistorySnapshot;
