//! Rate limits, run deadlines and cancellation for import runs.
//!
//! Both remote services enforce request quotas, so every run issues its
//! calls one at a time with fixed delays between them:
//! - Batch size and inter-batch delay for exact-name lookups
//! - Candidate window and inter-search delay for fallback searches
//! - Total run timeout, checked before every remote call

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunables for a single import run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLimits {
    /// Names per exact-name batch request (default: 50)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between batch requests in ms (default: 150)
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Delay between fallback searches in ms (default: 250)
    #[serde(default = "default_search_delay_ms")]
    pub search_delay_ms: u64,

    /// Candidates requested per fallback search (default: 10)
    #[serde(default = "default_search_window")]
    pub search_window: usize,

    /// Unmatched names included in the run summary (default: 10)
    #[serde(default = "default_unmatched_sample_size")]
    pub unmatched_sample_size: usize,

    /// Total run timeout in seconds (default: 1800 = 30 min)
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,

    /// Secondary ordering for equally rated candidates
    #[serde(default)]
    pub tie_break: TieBreak,
}

fn default_batch_size() -> usize {
    50
}
fn default_batch_delay_ms() -> u64 {
    150
}
fn default_search_delay_ms() -> u64 {
    250
}
fn default_search_window() -> usize {
    10
}
fn default_unmatched_sample_size() -> usize {
    10
}
fn default_run_timeout() -> u64 {
    1800
} // 30 min

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            search_delay_ms: default_search_delay_ms(),
            search_window: default_search_window(),
            unmatched_sample_size: default_unmatched_sample_size(),
            run_timeout_seconds: default_run_timeout(),
            tie_break: TieBreak::default(),
        }
    }
}

impl ImportLimits {
    /// Limits with no delays, for fakes that have no quota
    pub fn unthrottled() -> Self {
        Self {
            batch_delay_ms: 0,
            search_delay_ms: 0,
            ..Default::default()
        }
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_delay_ms)
    }

    /// Batch size never drops below one
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }
}

/// How equally rated candidates are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First candidate returned by the catalog wins
    #[default]
    FirstSeen,

    /// A case-sensitive exact name match wins, then first seen
    ExactNameFirst,
}

/// Cancellation handle shared between a caller and a running import
#[derive(Debug, Clone)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    started_at: Instant,
    timeout: Option<Duration>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    /// No deadline, only explicit cancellation
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            started_at: Instant::now(),
            timeout: None,
        }
    }

    /// Deadline `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new()
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Called before every remote request
    pub fn check(&self) -> Result<(), LimitViolation> {
        if self.is_cancelled() {
            return Err(LimitViolation::Cancelled);
        }

        if let Some(timeout) = self.timeout {
            let elapsed = self.started_at.elapsed();
            if elapsed >= timeout {
                return Err(LimitViolation::RunTimeout {
                    elapsed_seconds: elapsed.as_secs(),
                    limit_seconds: timeout.as_secs(),
                });
            }
        }

        Ok(())
    }
}

/// Reasons a run stops before committing anything
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitViolation {
    #[error("Cancelled by caller")]
    Cancelled,

    #[error("Run timeout: {elapsed_seconds}s >= {limit_seconds}s")]
    RunTimeout {
        elapsed_seconds: u64,
        limit_seconds: u64,
    },
}

/// Spaces consecutive requests of one kind by a fixed delay
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last_request: Option<Instant>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: None,
        }
    }

    /// Wait out the remainder of the delay, then check the run control.
    /// The first request goes out immediately.
    pub async fn ready(&mut self, control: &RunControl) -> Result<(), LimitViolation> {
        if let Some(last) = self.last_request {
            let since = last.elapsed();
            if since < self.delay {
                tokio::time::sleep(self.delay - since).await;
            }
        }
        control.check()?;
        self.last_request = Some(Instant::now());
        Ok(())
    }
}
