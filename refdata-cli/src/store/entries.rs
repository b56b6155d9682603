//! Per-table insert strategies.
//!
//! Every strategy deduplicates the batch by natural key, resolves the
//! identifiers its rows depend on, and issues multi-row upserts in
//! sub-batches small enough to stay within statement parameter limits.

use anyhow::{Context, Result};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashSet;

use super::EntryStore;
use crate::catalog;
use crate::ingest::entry::Entry;

/// Upper bound on rows per INSERT statement.
const MAX_ROWS_PER_STATEMENT: usize = 500;

/// Deduplicate a batch by natural key. The last occurrence wins: a source
/// row that repeats a code is taken as a correction of the earlier one, and
/// the upsert conflict target forbids hitting the same key twice in one
/// statement anyway.
fn dedup_last_wins(entries: Vec<Entry>, table_name: &str) -> Vec<Entry> {
    let mut seen = HashSet::new();
    let mut kept: Vec<Entry> = entries
        .into_iter()
        .rev()
        .filter(|e| seen.insert(e.natural_key(table_name).to_string()))
        .collect();
    kept.reverse();
    kept
}

impl EntryStore {
    pub(super) async fn insert_countries(
        &mut self,
        conn: &mut SqliteConnection,
        entries: Vec<Entry>,
    ) -> Result<()> {
        let entries = dedup_last_wins(entries, catalog::TABLE_COUNTRIES);
        let tv_id = self
            .cache
            .table_version_id(conn, &entries[0].table_code, &entries[0].version)
            .await?;

        for chunk in entries.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO countries (table_version_id, code, name) ");
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(tv_id).push_bind(&e.code).push_bind(&e.name);
            });
            qb.push(
                " ON CONFLICT (table_version_id, code)
                  DO UPDATE SET name = excluded.name, updated_at = CURRENT_TIMESTAMP",
            );
            qb.build()
                .execute(&mut *conn)
                .await
                .context("Batch insert into countries failed")?;
        }
        Ok(())
    }

    pub(super) async fn insert_districts(
        &mut self,
        conn: &mut SqliteConnection,
        entries: Vec<Entry>,
    ) -> Result<()> {
        let entries = dedup_last_wins(entries, catalog::TABLE_DISTRICTS);
        let country_id = self.cache.country_pt_id(conn).await?;
        let tv_id = self
            .cache
            .table_version_id(conn, &entries[0].table_code, &entries[0].version)
            .await?;

        for chunk in entries.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO districts (table_version_id, code, name, country_id) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(tv_id)
                    .push_bind(&e.code)
                    .push_bind(&e.name)
                    .push_bind(country_id);
            });
            qb.push(
                " ON CONFLICT (table_version_id, code)
                  DO UPDATE SET name = excluded.name, updated_at = CURRENT_TIMESTAMP",
            );
            qb.build()
                .execute(&mut *conn)
                .await
                .context("Batch insert into districts failed")?;
        }
        Ok(())
    }

    pub(super) async fn insert_municipalities(
        &mut self,
        conn: &mut SqliteConnection,
        entries: Vec<Entry>,
    ) -> Result<()> {
        let entries = dedup_last_wins(entries, catalog::TABLE_MUNICIPALITIES);
        let tv_id = self
            .cache
            .table_version_id(conn, &entries[0].table_code, &entries[0].version)
            .await?;

        // Resolve all parents up front; a single unresolvable district
        // aborts the file rather than committing a partial hierarchy.
        let mut resolved = Vec::with_capacity(entries.len());
        for entry in &entries {
            let district_id = self.cache.district_id_for(conn, &entry.code).await?;
            resolved.push((district_id, entry));
        }

        for chunk in resolved.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO municipalities (table_version_id, code, name, district_id) ",
            );
            qb.push_values(chunk, |mut b, (district_id, e)| {
                b.push_bind(tv_id)
                    .push_bind(&e.code)
                    .push_bind(&e.name)
                    .push_bind(district_id);
            });
            qb.push(
                " ON CONFLICT (table_version_id, code)
                  DO UPDATE SET name = excluded.name, updated_at = CURRENT_TIMESTAMP",
            );
            qb.build()
                .execute(&mut *conn)
                .await
                .context("Batch insert into municipalities failed")?;
        }
        Ok(())
    }

    pub(super) async fn insert_parishes(
        &mut self,
        conn: &mut SqliteConnection,
        entries: Vec<Entry>,
    ) -> Result<()> {
        let entries = dedup_last_wins(entries, catalog::TABLE_PARISHES);
        let tv_id = self
            .cache
            .table_version_id(conn, &entries[0].table_code, &entries[0].version)
            .await?;

        let mut resolved = Vec::with_capacity(entries.len());
        for entry in &entries {
            let municipality_id = self.cache.municipality_id_for(conn, &entry.code).await?;
            resolved.push((municipality_id, entry));
        }

        for chunk in resolved.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO parishes (table_version_id, code, name, municipality_id) ",
            );
            qb.push_values(chunk, |mut b, (municipality_id, e)| {
                b.push_bind(tv_id)
                    .push_bind(&e.code)
                    .push_bind(&e.name)
                    .push_bind(municipality_id);
            });
            qb.push(
                " ON CONFLICT (table_version_id, code)
                  DO UPDATE SET name = excluded.name, updated_at = CURRENT_TIMESTAMP",
            );
            qb.build()
                .execute(&mut *conn)
                .await
                .context("Batch insert into parishes failed")?;
        }
        Ok(())
    }

    pub(super) async fn insert_ine_zones(
        &mut self,
        conn: &mut SqliteConnection,
        entries: Vec<Entry>,
    ) -> Result<()> {
        let entries = dedup_last_wins(entries, catalog::TABLE_INE_ZONES);
        let tv_id = self
            .cache
            .table_version_id(conn, &entries[0].table_code, &entries[0].version)
            .await?;

        for chunk in entries.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO ine_zones
                 (table_version_id, zone_code, zone_name, zone_name_formatted, ine_municipality_code) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(tv_id)
                    .push_bind(&e.zone_code)
                    .push_bind(&e.zone_name)
                    .push_bind(&e.zone_name_formatted)
                    .push_bind(&e.ine_municipality_code);
            });
            qb.push(
                " ON CONFLICT (table_version_id, zone_code)
                  DO UPDATE SET zone_name = excluded.zone_name,
                                zone_name_formatted = excluded.zone_name_formatted,
                                updated_at = CURRENT_TIMESTAMP",
            );
            qb.build()
                .execute(&mut *conn)
                .await
                .context("Batch insert into ine_zones failed")?;
        }
        Ok(())
    }

    /// Steps, records and fields share a layout; the table name comes from
    /// the closed catalog set, never from user input.
    pub(super) async fn insert_structural(
        &mut self,
        conn: &mut SqliteConnection,
        entries: Vec<Entry>,
        table_name: &str,
    ) -> Result<()> {
        let entries = dedup_last_wins(entries, table_name);
        let tv_id = self
            .cache
            .table_version_id(conn, &entries[0].table_code, &entries[0].version)
            .await?;

        for chunk in entries.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "INSERT INTO {} (table_version_id, code, description) ",
                table_name
            ));
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(tv_id)
                    .push_bind(&e.code)
                    .push_bind(&e.description);
            });
            qb.push(
                " ON CONFLICT (table_version_id, code)
                  DO UPDATE SET description = excluded.description, updated_at = CURRENT_TIMESTAMP",
            );
            qb.build()
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Batch insert into {} failed", table_name))?;
        }
        Ok(())
    }

    /// Default strategy: generic lookup tables land in catalog_values under
    /// a catalog auto-created from the table name.
    pub(super) async fn insert_catalog_values(
        &mut self,
        conn: &mut SqliteConnection,
        entries: Vec<Entry>,
        table_name: &str,
    ) -> Result<()> {
        let entries = dedup_last_wins(entries, table_name);
        let catalog_id = self.cache.catalog_id(conn, table_name).await?;
        let tv_id = self
            .cache
            .table_version_id(conn, &entries[0].table_code, &entries[0].version)
            .await?;

        for chunk in entries.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO catalog_values (catalog_id, table_version_id, code, description) ",
            );
            qb.push_values(chunk, |mut b, e| {
                b.push_bind(catalog_id)
                    .push_bind(tv_id)
                    .push_bind(&e.code)
                    .push_bind(&e.description);
            });
            qb.push(
                " ON CONFLICT (catalog_id, table_version_id, code)
                  DO UPDATE SET description = excluded.description, updated_at = CURRENT_TIMESTAMP",
            );
            qb.build()
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Batch insert into catalog_values (slug={}) failed", table_name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, description: &str) -> Entry {
        Entry {
            table_code: "T12210".into(),
            version: "1".into(),
            code: code.into(),
            description: description.into(),
            ..Entry::default()
        }
    }

    #[test]
    fn test_dedup_last_occurrence_wins() {
        let batch = vec![
            entry("BT", "first"),
            entry("MT", "medium"),
            entry("BT", "second"),
        ];
        let deduped = dedup_last_wins(batch, "voltage_levels");
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].code, "MT");
        assert_eq!(deduped[1].code, "BT");
        assert_eq!(deduped[1].description, "second");
    }

    #[test]
    fn test_dedup_keeps_distinct_keys() {
        let batch = vec![entry("A", "a"), entry("B", "b"), entry("C", "c")];
        assert_eq!(dedup_last_wins(batch, "voltage_levels").len(), 3);
    }
}
