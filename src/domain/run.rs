//! Import run state and reconstruction from events.
//!
//! An ImportRun represents a single reconciliation of one user's source
//! library against the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::events::{EventType, ImportEvent};
use super::library::UserId;

/// A single import execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRun {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Host user receiving the imported entries
    pub user_id: UserId,

    /// Account on the source platform
    pub source_user_id: String,

    /// Current stage of the run
    pub state: ImportState,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// Result counts (zero until the run completes)
    pub summary: ImportSummary,

    /// Run-level failure, if any
    pub failure: Option<RunFailure>,
}

impl ImportRun {
    pub fn new(id: Uuid, user_id: UserId, source_user_id: impl Into<String>) -> Self {
        Self {
            id,
            user_id,
            source_user_id: source_user_id.into(),
            state: ImportState::Idle,
            started_at: Utc::now(),
            completed_at: None,
            summary: ImportSummary::default(),
            failure: None,
        }
    }

    /// Reconstruct a run from its event log
    pub fn from_events(events: &[ImportEvent]) -> Option<Self> {
        let first_event = events.first()?;

        let mut run = Self {
            id: first_event.run_id,
            user_id: 0,
            source_user_id: String::new(),
            state: ImportState::Idle,
            started_at: first_event.timestamp,
            completed_at: None,
            summary: ImportSummary::default(),
            failure: None,
        };

        for event in events {
            run.apply_event(event);
        }

        Some(run)
    }

    /// Apply a single event to update run state
    pub fn apply_event(&mut self, event: &ImportEvent) {
        match event.event_type {
            EventType::RunStarted => {
                self.state = event.stage;
                self.started_at = event.timestamp;
                if let Some(user_id) = event.user_id {
                    self.user_id = user_id;
                }
                if let Some(ref source_user_id) = event.source_user_id {
                    self.source_user_id = source_user_id.clone();
                }
            }
            EventType::StageEntered => {
                self.state = event.stage;
            }
            EventType::BatchFailed | EventType::SearchFailed | EventType::AchievementsFailed => {}
            EventType::RunCompleted => {
                self.state = ImportState::Done;
                self.completed_at = Some(event.timestamp);
                if let Some(ref summary) = event.summary {
                    self.summary = summary.clone();
                }
            }
            EventType::RunFailed => {
                self.state = ImportState::Failed;
                self.completed_at = Some(event.timestamp);
                self.failure = event.failure.clone();
            }
            EventType::RunCancelled => {
                self.state = ImportState::Cancelled;
                self.completed_at = Some(event.timestamp);
                self.failure = event.failure.clone();
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Caller-facing outcome
    pub fn outcome(&self) -> Result<&ImportSummary, &RunFailure> {
        match self.failure {
            Some(ref failure) => Err(failure),
            None => Ok(&self.summary),
        }
    }
}

/// Stages of an import run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    #[default]
    Idle,
    Fetching,
    Normalizing,
    BatchResolving,
    FallbackResolving,
    Deduplicating,
    ComputingProgress,
    Persisting,
    Done,
    Failed,
    Cancelled,
}

impl ImportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::BatchResolving => "batch_resolving",
            Self::FallbackResolving => "fallback_resolving",
            Self::Deduplicating => "deduplicating",
            Self::ComputingProgress => "computing_progress",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ImportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Counts reported to the caller when a run ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Owned entries written by this run
    pub imported_count: usize,

    /// First few raw names that matched nothing
    pub unmatched_sample: Vec<String>,

    /// Total number of unmatched names
    pub unmatched_total: usize,

    /// Source library was empty, nothing was attempted
    #[serde(default)]
    pub nothing_to_import: bool,
}

impl ImportSummary {
    pub fn nothing_to_import() -> Self {
        Self {
            nothing_to_import: true,
            ..Self::default()
        }
    }
}

/// Failures surfaced at run level; every other failure is absorbed per item
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RunFailure {
    #[error("Source platform unavailable: {error}")]
    SourceUnavailable { error: String },

    #[error("Persisting owned entries failed: {error}")]
    Persistence { error: String },

    #[error("Run cancelled: {reason}")]
    Cancelled { reason: String },
}
