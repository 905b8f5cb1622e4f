//! Main orchestrator for library imports.
//!
//! Coordinates normalization, batch and fallback resolution, deduplication,
//! progress computation and the final commit, and records each stage in the
//! run log.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{CatalogClient, LibraryStore, SourcePlatform};
use crate::domain::{
    CanonicalCandidate, EventType, ImportEvent, ImportRun, ImportState, ImportSummary,
    OwnedLibraryEntry, ResolvedMatch, RunFailure, SourceLibraryEntry, UserId,
};

use super::dedup::DeduplicationGuard;
use super::fallback::FallbackSearcher;
use super::limits::{ImportLimits, LimitViolation, RunControl};
use super::matcher::BatchMatcher;
use super::normalize::{grouping_key, normalize};
use super::progress::compute_progress;
use super::run_log::RunLog;

/// Source entries sharing one normalized name
#[derive(Debug)]
struct NameGroup {
    name: String,
    key: String,
    /// Indices into the fetched entry list, in source order
    entries: Vec<usize>,
}

/// Normalize every entry and group them case-insensitively.
///
/// Returns the groups in first-seen order plus the indices of entries whose
/// name normalizes to nothing.
fn group_entries(entries: &[SourceLibraryEntry]) -> (Vec<NameGroup>, Vec<usize>) {
    let mut groups: Vec<NameGroup> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();
    let mut blank = Vec::new();

    for (idx, entry) in entries.iter().enumerate() {
        let name = normalize(&entry.raw_name);
        if name.is_empty() {
            blank.push(idx);
            continue;
        }
        let key = grouping_key(&name);
        match index_by_key.get(&key) {
            Some(&group_idx) => groups[group_idx].entries.push(idx),
            None => {
                index_by_key.insert(key.clone(), groups.len());
                groups.push(NameGroup {
                    name,
                    key,
                    entries: vec![idx],
                });
            }
        }
    }

    (groups, blank)
}

/// Bookkeeping for one run: state transitions plus the optional log
struct RunContext {
    run: ImportRun,
    log: Option<RunLog>,
    started: Instant,
}

impl RunContext {
    async fn record(&self, event: ImportEvent) {
        if let Some(ref log) = self.log {
            if let Err(e) = log.append(&event).await {
                warn!(error = %e, "Failed to append to run log");
            }
        }
    }

    async fn start(&mut self) {
        self.run.state = ImportState::Fetching;
        let event = ImportEvent::new(
            self.run.id,
            EventType::RunStarted,
            ImportState::Fetching,
            format!("Import for user {} started", self.run.user_id),
        )
        .with_subject(self.run.user_id, self.run.source_user_id.clone());
        self.record(event).await;
    }

    async fn enter(&mut self, stage: ImportState, summary: String) {
        info!(%stage, "Entering stage");
        self.run.state = stage;
        let event = ImportEvent::new(self.run.id, EventType::StageEntered, stage, summary);
        self.record(event).await;
    }

    async fn note(&self, event_type: EventType, summary: String, error: &str) {
        let event = ImportEvent::new(self.run.id, event_type, self.run.state, summary)
            .with_error(error);
        self.record(event).await;
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    async fn complete(mut self, summary: ImportSummary) -> ImportRun {
        info!(
            run_id = %self.run.id,
            imported = summary.imported_count,
            unmatched = summary.unmatched_total,
            "Import completed"
        );
        self.run.state = ImportState::Done;
        self.run.completed_at = Some(Utc::now());
        self.run.summary = summary.clone();

        let event = ImportEvent::new(
            self.run.id,
            EventType::RunCompleted,
            ImportState::Done,
            format!(
                "Imported {} titles, {} unmatched",
                summary.imported_count, summary.unmatched_total
            ),
        )
        .with_duration(self.elapsed_ms())
        .with_summary(summary);
        self.record(event).await;

        self.run
    }

    async fn fail(mut self, failure: RunFailure) -> ImportRun {
        error!(run_id = %self.run.id, stage = %self.run.state, %failure, "Import failed");
        let event = ImportEvent::new(
            self.run.id,
            EventType::RunFailed,
            ImportState::Failed,
            format!("Import failed during {}", self.run.state),
        )
        .with_duration(self.elapsed_ms())
        .with_failure(failure.clone());

        self.run.state = ImportState::Failed;
        self.run.completed_at = Some(Utc::now());
        self.run.summary = ImportSummary::default();
        self.run.failure = Some(failure);
        self.record(event).await;

        self.run
    }

    async fn cancel(mut self, violation: LimitViolation) -> ImportRun {
        warn!(run_id = %self.run.id, stage = %self.run.state, %violation, "Import cancelled");
        let failure = RunFailure::Cancelled {
            reason: violation.to_string(),
        };
        let event = ImportEvent::new(
            self.run.id,
            EventType::RunCancelled,
            ImportState::Cancelled,
            format!("Import cancelled during {}", self.run.state),
        )
        .with_duration(self.elapsed_ms())
        .with_failure(failure.clone());

        self.run.state = ImportState::Cancelled;
        self.run.completed_at = Some(Utc::now());
        self.run.summary = ImportSummary::default();
        self.run.failure = Some(failure);
        self.record(event).await;

        self.run
    }
}

/// Imports a user's source library into their owned library
pub struct ImportOrchestrator {
    catalog: Arc<dyn CatalogClient>,
    source: Arc<dyn SourcePlatform>,
    store: Arc<dyn LibraryStore>,
    limits: ImportLimits,
    runs_dir: Option<PathBuf>,
}

impl ImportOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        source: Arc<dyn SourcePlatform>,
        store: Arc<dyn LibraryStore>,
        limits: ImportLimits,
    ) -> Self {
        Self {
            catalog,
            source,
            store,
            limits,
            runs_dir: None,
        }
    }

    /// Record every run under `runs_dir`
    pub fn with_run_log(mut self, runs_dir: impl Into<PathBuf>) -> Self {
        self.runs_dir = Some(runs_dir.into());
        self
    }

    /// Run one import for `user_id` from the source account `source_user_id`.
    ///
    /// Per-item failures are absorbed; the returned run carries either a
    /// summary or a run-level failure. A run log that cannot be created is
    /// skipped with a warning.
    #[instrument(skip(self, control), fields(source = %self.source.name()))]
    pub async fn run_import(
        &self,
        user_id: UserId,
        source_user_id: &str,
        control: &RunControl,
    ) -> ImportRun {
        let run_id = Uuid::new_v4();
        info!(%run_id, "Starting library import");

        let log = match self.runs_dir {
            Some(ref dir) => match RunLog::open_in(dir, run_id).await {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!(%run_id, error = %e, "Run log unavailable, continuing without it");
                    None
                }
            },
            None => None,
        };

        let mut ctx = RunContext {
            run: ImportRun::new(run_id, user_id, source_user_id),
            log,
            started: Instant::now(),
        };
        ctx.start().await;

        // Fetching
        if let Err(violation) = control.check() {
            return ctx.cancel(violation).await;
        }
        let entries = match self.source.list_owned_titles(source_user_id).await {
            Ok(entries) => entries,
            Err(e) => {
                return ctx
                    .fail(RunFailure::SourceUnavailable {
                        error: format!("{:#}", e),
                    })
                    .await;
            }
        };
        if entries.is_empty() {
            info!("Source library is empty, nothing to import");
            return ctx.complete(ImportSummary::nothing_to_import()).await;
        }

        let owned = match self.store.existing_catalog_ids(user_id).await {
            Ok(owned) => owned,
            Err(e) => {
                return ctx
                    .fail(RunFailure::Persistence {
                        error: format!("loading owned library: {:#}", e),
                    })
                    .await;
            }
        };

        // Normalizing
        ctx.enter(
            ImportState::Normalizing,
            format!("Normalizing {} titles", entries.len()),
        )
        .await;
        let (groups, blank) = group_entries(&entries);
        let names: Vec<String> = groups.iter().map(|g| g.name.clone()).collect();

        // BatchResolving
        ctx.enter(
            ImportState::BatchResolving,
            format!("Resolving {} distinct names", names.len()),
        )
        .await;
        let matcher = BatchMatcher::new(self.catalog.as_ref(), &self.limits);
        let batch = match matcher.match_batch(&names, control).await {
            Ok(batch) => batch,
            Err(violation) => return ctx.cancel(violation).await,
        };
        for failure in &batch.failures {
            ctx.note(
                EventType::BatchFailed,
                format!(
                    "Batch {} ({} names) fell through to search",
                    failure.batch_index, failure.names
                ),
                &failure.error,
            )
            .await;
        }

        // FallbackResolving
        let unresolved = batch.unresolved(&names);
        ctx.enter(
            ImportState::FallbackResolving,
            format!("Searching {} unresolved names", unresolved.len()),
        )
        .await;
        let mut searcher = FallbackSearcher::new(self.catalog.as_ref(), &self.limits);
        let fallback = match searcher.search_all(&unresolved, control).await {
            Ok(fallback) => fallback,
            Err(violation) => return ctx.cancel(violation).await,
        };
        for failure in &fallback.failures {
            ctx.note(
                EventType::SearchFailed,
                format!("Search for '{}' failed", failure.name),
                &failure.error,
            )
            .await;
        }

        let resolved: HashMap<String, CanonicalCandidate> = batch
            .matches
            .into_iter()
            .chain(fallback.matches)
            .filter_map(|(key, found)| found.map(|c| (key, c)))
            .collect();

        // Deduplicating
        ctx.enter(
            ImportState::Deduplicating,
            format!("Deduplicating {} resolved names", resolved.len()),
        )
        .await;
        let mut guard = DeduplicationGuard::new(owned);
        let mut accepted: Vec<ResolvedMatch> = Vec::new();
        let mut unmatched: Vec<(usize, &str)> = Vec::new();

        for group in &groups {
            let Some(candidate) = resolved.get(&group.key) else {
                let first = group.entries[0];
                unmatched.push((first, entries[first].raw_name.as_str()));
                continue;
            };
            for &idx in &group.entries {
                if guard.accept(candidate.catalog_id) {
                    accepted.push(ResolvedMatch {
                        catalog_id: candidate.catalog_id,
                        source_external_app_id: entries[idx].external_app_id.clone(),
                    });
                } else {
                    let reason = if guard.is_owned(candidate.catalog_id) {
                        "already owned"
                    } else {
                        "duplicate in run"
                    };
                    debug!(
                        raw_name = %entries[idx].raw_name,
                        catalog_id = candidate.catalog_id,
                        reason,
                        "Dropping title"
                    );
                }
            }
        }
        info!(accepted = guard.claimed_count(), "Deduplicated resolved titles");

        let mut seen_blank = HashSet::new();
        for &idx in &blank {
            let raw = entries[idx].raw_name.as_str();
            if seen_blank.insert(raw) {
                unmatched.push((idx, raw));
            }
        }
        unmatched.sort_by_key(|&(idx, _)| idx);

        // ComputingProgress
        ctx.enter(
            ImportState::ComputingProgress,
            format!("Fetching achievements for {} titles", accepted.len()),
        )
        .await;
        let date_added = Utc::now();
        let mut owned_entries = Vec::with_capacity(accepted.len());
        for pairing in &accepted {
            if let Err(violation) = control.check() {
                return ctx.cancel(violation).await;
            }
            let progress_percent = match self
                .source
                .list_achievements(source_user_id, &pairing.source_external_app_id)
                .await
            {
                Ok(records) => compute_progress(&records),
                Err(e) => {
                    warn!(
                        app_id = %pairing.source_external_app_id,
                        error = %e,
                        "Achievement fetch failed, progress defaults to 0"
                    );
                    ctx.note(
                        EventType::AchievementsFailed,
                        format!(
                            "Achievements for app {} unavailable",
                            pairing.source_external_app_id
                        ),
                        &e.to_string(),
                    )
                    .await;
                    0
                }
            };
            owned_entries.push(OwnedLibraryEntry {
                user_id,
                catalog_id: pairing.catalog_id,
                date_added,
                progress_percent,
            });
        }

        // Persisting
        ctx.enter(
            ImportState::Persisting,
            format!("Writing {} owned entries", owned_entries.len()),
        )
        .await;
        if let Err(violation) = control.check() {
            return ctx.cancel(violation).await;
        }
        if !owned_entries.is_empty() {
            if let Err(e) = self.store.insert_owned_entries(user_id, &owned_entries).await {
                return ctx
                    .fail(RunFailure::Persistence {
                        error: format!("{:#}", e),
                    })
                    .await;
            }
        }

        let summary = ImportSummary {
            imported_count: owned_entries.len(),
            unmatched_sample: unmatched
                .iter()
                .take(self.limits.unmatched_sample_size)
                .map(|&(_, raw)| raw.to_string())
                .collect(),
            unmatched_total: unmatched.len(),
            nothing_to_import: false,
        };

        ctx.complete(summary).await
    }
}
