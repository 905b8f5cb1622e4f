//! Append-only import history with file-based persistence.
//!
//! Events are stored as newline-delimited JSON (JSONL), one directory per run
//! under `$SHELFSYNC_HOME/runs/<run_id>/events.jsonl`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::domain::{EventType, ImportEvent, ImportRun};

/// File-based run log using JSONL format
#[derive(Debug, Clone)]
pub struct RunLog {
    /// Path to the events.jsonl file
    events_path: PathBuf,
}

impl RunLog {
    /// Create or open the log for a run in the configured runs directory
    pub async fn open(run_id: Uuid) -> Result<Self> {
        let base_dir = crate::config::runs_dir()?;
        Self::open_in(&base_dir, run_id).await
    }

    /// Create or open the log for a run under `base_dir`
    pub async fn open_in(base_dir: &Path, run_id: Uuid) -> Result<Self> {
        let run_dir = base_dir.join(run_id.to_string());

        fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;

        let events_path = run_dir.join("events.jsonl");

        Ok(Self { events_path })
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Append an event to the log
    pub async fn append(&self, event: &ImportEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open events file: {}",
                    self.events_path.display()
                )
            })?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<ImportEvent>> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.events_path)
            .await
            .with_context(|| format!("Failed to open events file: {}", self.events_path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: ImportEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Replay the log into the run's current state
    pub async fn load_run(&self) -> Result<Option<ImportRun>> {
        let events = self.replay().await?;
        Ok(ImportRun::from_events(&events))
    }

    /// Count events of one type, e.g. absorbed failures
    pub async fn count_events(&self, event_type: EventType) -> Result<usize> {
        let events = self.replay().await?;
        Ok(events.iter().filter(|e| e.event_type == event_type).count())
    }

    /// List all run IDs under `base_dir`
    pub async fn list_runs_in(base_dir: &Path) -> Result<Vec<Uuid>> {
        if !base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        let mut entries = fs::read_dir(base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(uuid) = Uuid::parse_str(name) {
                        runs.push(uuid);
                    }
                }
            }
        }

        Ok(runs)
    }

    /// List all run IDs in the configured runs directory
    pub async fn list_runs() -> Result<Vec<Uuid>> {
        let base_dir = crate::config::runs_dir()?;
        Self::list_runs_in(&base_dir).await
    }
}
