//! Owned library persistence.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.shelfsync/
//! ├── library.db                # owned_games (user_id, catalog_id, date_added, progress_percent)
//! └── runs/
//!     └── <run_id>/
//!         └── events.jsonl      # Import run log
//! ```

pub mod store;

pub use store::SqliteLibraryStore;
