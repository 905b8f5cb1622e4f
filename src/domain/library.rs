//! Library records exchanged between the engine and its collaborators.
//!
//! Everything here except [`OwnedLibraryEntry`] is transient and lives only
//! for the duration of a single import run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a user in the host application
pub type UserId = i64;

/// Identifier of a title in the canonical catalog
pub type CatalogId = i64;

/// A title as reported by the source platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLibraryEntry {
    /// Platform-specific application id (Steam appid)
    pub external_app_id: String,

    /// Title exactly as the platform reports it
    pub raw_name: String,

    /// Total playtime in minutes
    pub playtime_minutes: i64,
}

impl SourceLibraryEntry {
    pub fn new(
        external_app_id: impl Into<String>,
        raw_name: impl Into<String>,
        playtime_minutes: i64,
    ) -> Self {
        Self {
            external_app_id: external_app_id.into(),
            raw_name: raw_name.into(),
            playtime_minutes,
        }
    }
}

/// A catalog record returned by a lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalCandidate {
    pub catalog_id: CatalogId,

    pub name: String,

    /// `0` marks a base or standalone title
    pub category: i32,

    /// Set when the record is an edition variant of another title
    pub version_parent_id: Option<CatalogId>,

    /// Critic rating, absent for many records
    pub aggregated_rating: Option<f64>,
}

impl CanonicalCandidate {
    /// Base title that is not an edition variant
    pub fn is_base_title(&self) -> bool {
        self.category == 0 && self.version_parent_id.is_none()
    }
}

/// An accepted pairing of one source entry to one catalog id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMatch {
    pub catalog_id: CatalogId,
    pub source_external_app_id: String,
}

/// Unlock state of a single achievement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementUnlockRecord {
    pub api_name: String,
    pub achieved: bool,
}

impl AchievementUnlockRecord {
    pub fn new(api_name: impl Into<String>, achieved: bool) -> Self {
        Self {
            api_name: api_name.into(),
            achieved,
        }
    }
}

/// A row of the user's owned library, written once at commit time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedLibraryEntry {
    pub user_id: UserId,
    pub catalog_id: CatalogId,
    pub date_added: DateTime<Utc>,

    /// Completion percentage in `0..=100`
    pub progress_percent: u8,
}
