//! Deterministic fakes for the catalog, the source platform and the store.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use shelfsync::adapters::{CatalogClient, LibraryStore, SourcePlatform};
use shelfsync::core::{ImportLimits, ImportOrchestrator, RunControl};
use shelfsync::domain::{
    AchievementUnlockRecord, CanonicalCandidate, CatalogId, OwnedLibraryEntry,
    SourceLibraryEntry, UserId,
};

pub const USER: UserId = 7;
pub const STEAM_ID: &str = "76561197960287930";

pub fn game(catalog_id: CatalogId, name: &str, rating: Option<f64>) -> CanonicalCandidate {
    CanonicalCandidate {
        catalog_id,
        name: name.to_string(),
        category: 0,
        version_parent_id: None,
        aggregated_rating: rating,
    }
}

pub fn dlc(catalog_id: CatalogId, name: &str) -> CanonicalCandidate {
    CanonicalCandidate {
        category: 1,
        ..game(catalog_id, name, Some(90.0))
    }
}

pub fn edition(catalog_id: CatalogId, name: &str, parent: CatalogId) -> CanonicalCandidate {
    CanonicalCandidate {
        version_parent_id: Some(parent),
        ..game(catalog_id, name, Some(95.0))
    }
}

/// Catalog backed by a fixed game list
#[derive(Default)]
pub struct FakeCatalog {
    games: Vec<CanonicalCandidate>,
    failing_batch_names: HashSet<String>,
    failing_searches: HashSet<String>,
    cancel_on_search: Option<RunControl>,
    pub batch_calls: Mutex<Vec<Vec<String>>>,
    pub search_calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new(games: Vec<CanonicalCandidate>) -> Self {
        Self {
            games,
            ..Default::default()
        }
    }

    /// Any batch containing `name` fails with a transport error
    pub fn fail_batch_with(mut self, name: &str) -> Self {
        self.failing_batch_names.insert(name.to_string());
        self
    }

    pub fn fail_search_for(mut self, name: &str) -> Self {
        self.failing_searches.insert(name.to_string());
        self
    }

    /// Cancel `control` as soon as the first search is issued
    pub fn cancel_on_search(mut self, control: RunControl) -> Self {
        self.cancel_on_search = Some(control);
        self
    }

    pub fn batch_calls(&self) -> Vec<Vec<String>> {
        self.batch_calls.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    fn name(&self) -> &str {
        "fake-catalog"
    }

    async fn exact_name_batch(
        &self,
        names: &[String],
        limit: usize,
    ) -> Result<Vec<CanonicalCandidate>> {
        self.batch_calls.lock().unwrap().push(names.to_vec());
        if names.iter().any(|n| self.failing_batch_names.contains(n)) {
            bail!("connection reset by peer");
        }

        let wanted: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        Ok(self
            .games
            .iter()
            .filter(|g| wanted.contains(&g.name.to_lowercase()))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn text_search(&self, query: &str, limit: usize) -> Result<Vec<CanonicalCandidate>> {
        self.search_calls.lock().unwrap().push(query.to_string());
        if let Some(ref control) = self.cancel_on_search {
            control.cancel();
        }
        if self.failing_searches.contains(query) {
            bail!("HTTP 503 from catalog");
        }

        let query = query.to_lowercase();
        Ok(self
            .games
            .iter()
            .filter(|g| g.version_parent_id.is_none() && g.name.to_lowercase().contains(&query))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Source platform with a fixed library
#[derive(Default)]
pub struct FakeSource {
    entries: Vec<SourceLibraryEntry>,
    achievements: HashMap<String, Vec<AchievementUnlockRecord>>,
    failing_achievements: HashSet<String>,
    unavailable: bool,
    pub achievement_calls: Mutex<Vec<String>>,
}

impl FakeSource {
    /// Library of `(app_id, raw_name)` pairs
    pub fn new(titles: &[(&str, &str)]) -> Self {
        Self {
            entries: titles
                .iter()
                .map(|(id, name)| SourceLibraryEntry::new(*id, *name, 60))
                .collect(),
            ..Default::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    /// `unlocked` of `total` achievements earned for `app_id`
    pub fn with_achievements(mut self, app_id: &str, unlocked: usize, total: usize) -> Self {
        let records = (0..total)
            .map(|i| AchievementUnlockRecord::new(format!("ACH_{}", i), i < unlocked))
            .collect();
        self.achievements.insert(app_id.to_string(), records);
        self
    }

    pub fn fail_achievements_for(mut self, app_id: &str) -> Self {
        self.failing_achievements.insert(app_id.to_string());
        self
    }

    pub fn achievement_calls(&self) -> Vec<String> {
        self.achievement_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourcePlatform for FakeSource {
    fn name(&self) -> &str {
        "fake-source"
    }

    async fn list_owned_titles(&self, _source_user_id: &str) -> Result<Vec<SourceLibraryEntry>> {
        if self.unavailable {
            bail!("profile is private");
        }
        Ok(self.entries.clone())
    }

    async fn list_achievements(
        &self,
        _source_user_id: &str,
        external_app_id: &str,
    ) -> Result<Vec<AchievementUnlockRecord>> {
        self.achievement_calls
            .lock()
            .unwrap()
            .push(external_app_id.to_string());
        if self.failing_achievements.contains(external_app_id) {
            bail!("Requested app has no stats");
        }
        Ok(self
            .achievements
            .get(external_app_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory owned library with the same all-or-nothing write contract
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<(UserId, CatalogId), OwnedLibraryEntry>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn with_owned(user_id: UserId, ids: &[CatalogId]) -> Self {
        let store = Self::default();
        {
            let mut rows = store.rows.lock().unwrap();
            for &catalog_id in ids {
                rows.insert(
                    (user_id, catalog_id),
                    OwnedLibraryEntry {
                        user_id,
                        catalog_id,
                        date_added: chrono::Utc::now(),
                        progress_percent: 0,
                    },
                );
            }
        }
        store
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn entries(&self, user_id: UserId) -> Vec<OwnedLibraryEntry> {
        let mut entries: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.catalog_id);
        entries
    }

    pub fn progress_of(&self, user_id: UserId, catalog_id: CatalogId) -> Option<u8> {
        self.rows
            .lock()
            .unwrap()
            .get(&(user_id, catalog_id))
            .map(|e| e.progress_percent)
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn existing_catalog_ids(&self, user_id: UserId) -> Result<HashSet<CatalogId>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("database is locked");
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .keys()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, id)| *id)
            .collect())
    }

    async fn insert_owned_entries(
        &self,
        user_id: UserId,
        entries: &[OwnedLibraryEntry],
    ) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("disk I/O error");
        }
        let mut rows = self.rows.lock().unwrap();
        if let Some(dup) = entries
            .iter()
            .find(|e| rows.contains_key(&(user_id, e.catalog_id)))
        {
            return Err(anyhow!("UNIQUE constraint failed: {}", dup.catalog_id));
        }
        for entry in entries {
            rows.insert((user_id, entry.catalog_id), entry.clone());
        }
        Ok(())
    }
}

pub fn orchestrator(
    catalog: &Arc<FakeCatalog>,
    source: &Arc<FakeSource>,
    store: &Arc<MemoryStore>,
    limits: ImportLimits,
) -> ImportOrchestrator {
    ImportOrchestrator::new(catalog.clone(), source.clone(), store.clone(), limits)
}
