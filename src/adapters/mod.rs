//! Interfaces for the external systems the engine depends on.
//!
//! The orchestrator only ever talks to these traits, so tests can substitute
//! deterministic fakes for the catalog, the source platform and the store.

pub mod igdb;
pub mod steam;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{
    AchievementUnlockRecord, CanonicalCandidate, CatalogId, OwnedLibraryEntry,
    SourceLibraryEntry, UserId,
};

pub use igdb::{IgdbCatalogClient, IgdbConfig};
pub use steam::{SteamClient, SteamConfig};

/// Canonical game catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Human-readable client name
    fn name(&self) -> &str;

    /// Base titles whose name equals one of `names`
    async fn exact_name_batch(
        &self,
        names: &[String],
        limit: usize,
    ) -> Result<Vec<CanonicalCandidate>>;

    /// Free-text search excluding edition variants
    async fn text_search(&self, query: &str, limit: usize) -> Result<Vec<CanonicalCandidate>>;
}

/// Third-party platform a library is imported from
#[async_trait]
pub trait SourcePlatform: Send + Sync {
    fn name(&self) -> &str;

    async fn list_owned_titles(&self, source_user_id: &str) -> Result<Vec<SourceLibraryEntry>>;

    async fn list_achievements(
        &self,
        source_user_id: &str,
        external_app_id: &str,
    ) -> Result<Vec<AchievementUnlockRecord>>;
}

/// Durable owned-library storage of the host application
#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn existing_catalog_ids(&self, user_id: UserId) -> Result<HashSet<CatalogId>>;

    /// Write all entries or none
    async fn insert_owned_entries(
        &self,
        user_id: UserId,
        entries: &[OwnedLibraryEntry],
    ) -> Result<()>;
}
