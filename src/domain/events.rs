//! Events recorded while an import run progresses.
//!
//! Each run appends its events to a JSONL log. The final state of a run can be
//! reconstructed by replaying them in order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::library::UserId;
use super::run::{ImportState, ImportSummary, RunFailure};

/// A single entry in a run's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The run this event belongs to
    pub run_id: Uuid,

    /// Type of event
    pub event_type: EventType,

    /// Stage the run was in when the event was recorded
    pub stage: ImportState,

    /// Human-readable summary (NO credentials)
    pub payload_summary: String,

    /// Host user being imported for (RunStarted only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Source platform account (RunStarted only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_user_id: Option<String>,

    /// Time taken in milliseconds (terminal events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Error message for absorbed or fatal failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Final counts (RunCompleted only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ImportSummary>,

    /// Run-level failure (RunFailed / RunCancelled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
}

impl ImportEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        run_id: Uuid,
        event_type: EventType,
        stage: ImportState,
        payload_summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_id,
            event_type,
            stage,
            payload_summary: payload_summary.into(),
            user_id: None,
            source_user_id: None,
            duration_ms: None,
            error: None,
            summary: None,
            failure: None,
        }
    }

    pub fn with_subject(mut self, user_id: UserId, source_user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id);
        self.source_user_id = Some(source_user_id.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_summary(mut self, summary: ImportSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn with_failure(mut self, failure: RunFailure) -> Self {
        self.error = Some(failure.to_string());
        self.failure = Some(failure);
        self
    }
}

/// Types of events that can occur during an import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A new run has started
    RunStarted,

    /// The run moved to a new stage
    StageEntered,

    /// A catalog batch request failed; its names fall through to search
    BatchFailed,

    /// A fallback search failed; the name stays unmatched
    SearchFailed,

    /// Achievement data could not be fetched; progress defaults to 0
    AchievementsFailed,

    /// The run finished and its entries were committed
    RunCompleted,

    /// The run failed at run level
    RunFailed,

    /// The run was cancelled or exceeded its deadline
    RunCancelled,
}
