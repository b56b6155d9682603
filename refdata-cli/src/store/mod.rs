//! Batched, transactional upsert layer.
//!
//! [`EntryStore`] owns the lookup caches for the whole process lifetime and
//! routes each buffered batch to a table-specific insert strategy.

pub mod entries;
pub mod lookup;

use anyhow::{Context, Result};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::catalog;
use crate::ingest::entry::Entry;
use lookup::LookupCache;

pub struct EntryStore {
    pool: SqlitePool,
    cache: LookupCache,
}

impl EntryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: LookupCache::default(),
        }
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to start transaction")
    }

    /// Route a batch to the insert strategy for its table. Empty batches are
    /// a no-op. Any failure here is fatal for the enclosing file transaction.
    pub async fn save_batch(
        &mut self,
        conn: &mut SqliteConnection,
        entries: Vec<Entry>,
        table_name: &str,
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        match table_name {
            catalog::TABLE_COUNTRIES => self.insert_countries(conn, entries).await,
            catalog::TABLE_DISTRICTS => self.insert_districts(conn, entries).await,
            catalog::TABLE_MUNICIPALITIES => self.insert_municipalities(conn, entries).await,
            catalog::TABLE_PARISHES => self.insert_parishes(conn, entries).await,
            catalog::TABLE_INE_ZONES => self.insert_ine_zones(conn, entries).await,
            catalog::TABLE_STEPS | catalog::TABLE_RECORDS | catalog::TABLE_FIELDS => {
                self.insert_structural(conn, entries, table_name).await
            }
            _ => self.insert_catalog_values(conn, entries, table_name).await,
        }
        .with_context(|| format!("Failed to save batch for table {}", table_name))
    }
}
