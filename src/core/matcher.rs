//! Exact-name batch resolution and the candidate ranking rule.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::limits::{ImportLimits, LimitViolation, RunControl, Throttle, TieBreak};
use super::normalize::grouping_key;
use crate::adapters::CatalogClient;
use crate::domain::CanonicalCandidate;

/// Pick the highest rated candidate. Missing ratings rank lowest; equal
/// ratings are settled by `policy`, falling back to catalog order.
pub fn select_best<'a, I>(
    candidates: I,
    wanted: &str,
    policy: TieBreak,
) -> Option<&'a CanonicalCandidate>
where
    I: IntoIterator<Item = &'a CanonicalCandidate>,
{
    let mut best: Option<&CanonicalCandidate> = None;
    for candidate in candidates {
        best = match best {
            Some(current) if !outranks(candidate, current, wanted, policy) => Some(current),
            _ => Some(candidate),
        };
    }
    best
}

fn rating(candidate: &CanonicalCandidate) -> f64 {
    candidate
        .aggregated_rating
        .filter(|r| !r.is_nan())
        .unwrap_or(f64::NEG_INFINITY)
}

fn outranks(
    challenger: &CanonicalCandidate,
    current: &CanonicalCandidate,
    wanted: &str,
    policy: TieBreak,
) -> bool {
    let (a, b) = (rating(challenger), rating(current));
    if a != b {
        return a > b;
    }
    match policy {
        TieBreak::FirstSeen => false,
        TieBreak::ExactNameFirst => challenger.name == wanted && current.name != wanted,
    }
}

/// A batch request that failed; its names fall through to fallback search
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub names: usize,
    pub error: String,
}

/// Result of the batch pass
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Keyed by grouping key; `None` means unresolved
    pub matches: HashMap<String, Option<CanonicalCandidate>>,

    /// Catalog requests issued
    pub requests: usize,

    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    /// Input names (in input order) left unresolved
    pub fn unresolved<'n>(&self, names: &'n [String]) -> Vec<&'n String> {
        names
            .iter()
            .filter(|name| {
                self.matches
                    .get(&grouping_key(name))
                    .map_or(true, Option::is_none)
            })
            .collect()
    }
}

/// Resolves names by exact-name equality, many names per request
pub struct BatchMatcher<'a> {
    catalog: &'a dyn CatalogClient,
    limits: &'a ImportLimits,
}

impl<'a> BatchMatcher<'a> {
    pub fn new(catalog: &'a dyn CatalogClient, limits: &'a ImportLimits) -> Self {
        Self { catalog, limits }
    }

    /// Resolve each of `names` (distinct, normalized) to its best base title.
    ///
    /// Issues `ceil(len / batch_size)` requests strictly in sequence. A failed
    /// request leaves its names unresolved instead of aborting.
    pub async fn match_batch(
        &self,
        names: &[String],
        control: &RunControl,
    ) -> Result<BatchOutcome, LimitViolation> {
        let batch_size = self.limits.effective_batch_size();
        let mut throttle = Throttle::new(self.limits.batch_delay());
        let mut outcome = BatchOutcome::default();

        for (batch_index, batch) in names.chunks(batch_size).enumerate() {
            throttle.ready(control).await?;
            outcome.requests += 1;

            let candidates = match self.catalog.exact_name_batch(batch, batch_size).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(
                        batch_index,
                        names = batch.len(),
                        error = %e,
                        "Catalog batch failed, names fall through to search"
                    );
                    outcome.failures.push(BatchFailure {
                        batch_index,
                        names: batch.len(),
                        error: e.to_string(),
                    });
                    for name in batch {
                        outcome.matches.insert(grouping_key(name), None);
                    }
                    continue;
                }
            };

            let mut by_name: HashMap<String, Vec<&CanonicalCandidate>> = HashMap::new();
            for candidate in candidates.iter().filter(|c| c.is_base_title()) {
                by_name
                    .entry(grouping_key(&candidate.name))
                    .or_default()
                    .push(candidate);
            }

            for name in batch {
                let key = grouping_key(name);
                let best = by_name.get(&key).and_then(|group| {
                    select_best(group.iter().copied(), name, self.limits.tie_break)
                });
                debug!(%name, catalog_id = ?best.map(|c| c.catalog_id), "Batch lookup");
                outcome.matches.insert(key, best.cloned());
            }
        }

        Ok(outcome)
    }
}
