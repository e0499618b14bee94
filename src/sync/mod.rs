//! Draft persistence, save reconciliation and conflict detection.

mod debounce;
mod engine;
mod status;

pub use debounce::Debouncer;
pub use engine::{
    ConflictChoice, ConflictPrompt, ContextLoad, ContextOutcome, ContextToken, LoadedContext,
    SaveReceipt, SaveRequest, SyncEngine, SyncWarning,
};
pub use status::SyncStatus;
