//! SQLite-backed owned library.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::adapters::LibraryStore;
use crate::domain::{CatalogId, OwnedLibraryEntry, UserId};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS owned_games (
    user_id INTEGER NOT NULL,
    catalog_id INTEGER NOT NULL,
    date_added TEXT NOT NULL,
    progress_percent INTEGER NOT NULL CHECK (progress_percent BETWEEN 0 AND 100),
    PRIMARY KEY (user_id, catalog_id)
)";

/// Owned library stored in a single SQLite table
#[derive(Clone)]
pub struct SqliteLibraryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLibraryStore {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open library database: {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])
            .context("Failed to initialize library schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow!("library database lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .context("library database task panicked")?
    }

    /// All owned entries of a user, oldest first
    pub async fn owned_entries(&self, user_id: UserId) -> Result<Vec<OwnedLibraryEntry>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT catalog_id, date_added, progress_percent FROM owned_games
                 WHERE user_id = ?1 ORDER BY date_added ASC, catalog_id ASC",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, CatalogId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u8>(2)?,
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (catalog_id, date_added, progress_percent) = row?;
                let date_added = DateTime::parse_from_rfc3339(&date_added)
                    .with_context(|| format!("Invalid date_added: {}", date_added))?
                    .with_timezone(&Utc);
                entries.push(OwnedLibraryEntry {
                    user_id,
                    catalog_id,
                    date_added,
                    progress_percent,
                });
            }
            Ok(entries)
        })
        .await
    }
}

#[async_trait]
impl LibraryStore for SqliteLibraryStore {
    async fn existing_catalog_ids(&self, user_id: UserId) -> Result<HashSet<CatalogId>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT catalog_id FROM owned_games WHERE user_id = ?1")?;
            let ids = stmt
                .query_map(params![user_id], |row| row.get::<_, CatalogId>(0))?
                .collect::<rusqlite::Result<HashSet<_>>>()?;
            Ok(ids)
        })
        .await
        .context("Failed to load owned catalog ids")
    }

    async fn insert_owned_entries(
        &self,
        user_id: UserId,
        entries: &[OwnedLibraryEntry],
    ) -> Result<()> {
        let entries = entries.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO owned_games (user_id, catalog_id, date_added, progress_percent)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for entry in &entries {
                    stmt.execute(params![
                        user_id,
                        entry.catalog_id,
                        entry.date_added.to_rfc3339(),
                        entry.progress_percent.min(100),
                    ])
                    .with_context(|| format!("Failed to insert catalog id {}", entry.catalog_id))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}
