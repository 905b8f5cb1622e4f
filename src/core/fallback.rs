//! Free-text search for names the batch pass could not resolve.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::limits::{ImportLimits, LimitViolation, RunControl, Throttle};
use super::matcher::select_best;
use super::normalize::grouping_key;
use crate::adapters::CatalogClient;
use crate::domain::CanonicalCandidate;

/// A search that failed; the name stays unmatched for this run
#[derive(Debug, Clone)]
pub struct SearchFailure {
    pub name: String,
    pub error: String,
}

/// Result of the fallback pass
#[derive(Debug, Default)]
pub struct FallbackOutcome {
    /// Keyed by grouping key; `None` means still unresolved
    pub matches: HashMap<String, Option<CanonicalCandidate>>,

    /// Catalog searches issued
    pub searches: usize,

    pub failures: Vec<SearchFailure>,
}

/// One search request per name, spaced by the search delay
pub struct FallbackSearcher<'a> {
    catalog: &'a dyn CatalogClient,
    limits: &'a ImportLimits,
    throttle: Throttle,
}

impl<'a> FallbackSearcher<'a> {
    pub fn new(catalog: &'a dyn CatalogClient, limits: &'a ImportLimits) -> Self {
        Self {
            catalog,
            limits,
            throttle: Throttle::new(limits.search_delay()),
        }
    }

    /// Search for a single name.
    ///
    /// The outer error stops the run; the inner one only loses this name.
    pub async fn search_one(
        &mut self,
        name: &str,
        control: &RunControl,
    ) -> Result<anyhow::Result<Option<CanonicalCandidate>>, LimitViolation> {
        self.throttle.ready(control).await?;

        let candidates = match self
            .catalog
            .text_search(name, self.limits.search_window)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => return Ok(Err(e)),
        };

        let best = select_best(
            candidates.iter().filter(|c| c.is_base_title()),
            name,
            self.limits.tie_break,
        );
        debug!(%name, catalog_id = ?best.map(|c| c.catalog_id), "Fallback search");
        Ok(Ok(best.cloned()))
    }

    /// Search every name once, in order
    pub async fn search_all<S: AsRef<str>>(
        &mut self,
        names: &[S],
        control: &RunControl,
    ) -> Result<FallbackOutcome, LimitViolation> {
        let mut outcome = FallbackOutcome::default();

        for name in names {
            let name = name.as_ref();
            outcome.searches += 1;
            let found = match self.search_one(name, control).await? {
                Ok(found) => found,
                Err(e) => {
                    warn!(%name, error = %e, "Catalog search failed, name stays unmatched");
                    outcome.failures.push(SearchFailure {
                        name: name.to_string(),
                        error: e.to_string(),
                    });
                    None
                }
            };
            outcome.matches.insert(grouping_key(name), found);
        }

        Ok(outcome)
    }
}
