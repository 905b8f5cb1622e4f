//! Domain types for the reconciliation engine.
//!
//! This module contains the core data structures:
//! - Library: source entries, catalog candidates, owned entries
//! - Events: Immutable records of run progress
//! - Run: Import run state and result

pub mod events;
pub mod library;
pub mod run;

// Re-export commonly used types
pub use events::{EventType, ImportEvent};
pub use library::{
    AchievementUnlockRecord, CanonicalCandidate, CatalogId, OwnedLibraryEntry, ResolvedMatch,
    SourceLibraryEntry, UserId,
};
pub use run::{ImportRun, ImportState, ImportSummary, RunFailure};
