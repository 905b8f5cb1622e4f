//! Per-run guard against importing a catalog id twice.

use std::collections::HashSet;

use crate::domain::CatalogId;

/// Tracks ids the user already owns and ids claimed during this run.
///
/// Construct one per run; the owned set is loaded once up front.
#[derive(Debug, Default)]
pub struct DeduplicationGuard {
    owned: HashSet<CatalogId>,
    claimed: HashSet<CatalogId>,
}

impl DeduplicationGuard {
    pub fn new(owned: HashSet<CatalogId>) -> Self {
        Self {
            owned,
            claimed: HashSet::new(),
        }
    }

    /// Claim `catalog_id` for this run. Returns false if it is already owned
    /// or was claimed earlier in the run.
    pub fn accept(&mut self, catalog_id: CatalogId) -> bool {
        if self.owned.contains(&catalog_id) {
            return false;
        }
        self.claimed.insert(catalog_id)
    }

    pub fn is_owned(&self, catalog_id: CatalogId) -> bool {
        self.owned.contains(&catalog_id)
    }

    /// Number of ids claimed so far
    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }
}
