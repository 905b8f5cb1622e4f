//! Core reconciliation logic.
//!
//! This module contains:
//! - Normalize: title cleanup and grouping keys
//! - Matcher: exact-name batch resolution and candidate ranking
//! - Fallback: per-name free-text search
//! - Dedup: per-run duplicate guard
//! - Progress: achievement completion percentage
//! - Limits: rate limits, deadlines and cancellation
//! - RunLog: append-only import history
//! - Orchestrator: main import engine

pub mod dedup;
pub mod fallback;
pub mod limits;
pub mod matcher;
pub mod normalize;
pub mod orchestrator;
pub mod progress;
pub mod run_log;

// Re-export commonly used types
pub use dedup::DeduplicationGuard;
pub use fallback::{FallbackOutcome, FallbackSearcher, SearchFailure};
pub use limits::{ImportLimits, LimitViolation, RunControl, Throttle, TieBreak};
pub use matcher::{select_best, BatchFailure, BatchMatcher, BatchOutcome};
pub use normalize::{grouping_key, normalize};
pub use orchestrator::ImportOrchestrator;
pub use progress::compute_progress;
pub use run_log::RunLog;
