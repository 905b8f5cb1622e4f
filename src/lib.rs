//! shelfsync - Library reconciliation engine
//!
//! Imports a user's owned titles from a third-party platform (Steam),
//! resolves each title against a canonical game catalog (IGDB), and
//! writes the newly matched titles into the user's owned library.
//!
//! # Architecture
//!
//! An import runs as a fixed sequence of stages:
//! - Fetch the source library and normalize titles
//! - Resolve names with batched exact-name lookups
//! - Search the catalog for names the batches could not resolve
//! - Deduplicate against the owned library and within the run
//! - Compute achievement progress per matched title
//! - Persist all new entries in one atomic write
//!
//! Every stage transition is appended to a per-run event log, so a run's
//! outcome can be inspected after the process exits.
//!
//! # Modules
//!
//! - `adapters`: Catalog, source platform and store interfaces (IGDB, Steam)
//! - `core`: Matching, fallback search, dedup, progress, limits, orchestrator
//! - `domain`: Data structures (entries, candidates, events, runs)
//! - `library`: SQLite owned-library store
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Import a Steam library into user 42
//! shelfsync import --user 42 --steam-id 76561197960287930
//!
//! # Inspect the run afterwards
//! shelfsync status <run-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{CatalogClient, LibraryStore, SourcePlatform};
pub use core::{ImportLimits, ImportOrchestrator, RunControl, TieBreak};
pub use domain::{EventType, ImportEvent, ImportRun, ImportState, ImportSummary, RunFailure};
pub use library::SqliteLibraryStore;
