//! Dependency Resolver / Lookup Cache.
//!
//! Parent-entity identifiers needed by child-table inserts are resolved
//! lazily and memoized for the lifetime of the store. Entries are never
//! invalidated: the geographic taxonomy does not change within one run, and
//! a re-run in the same process is expected to see the warm cache.

use anyhow::{Context, Result, anyhow};
use sqlx::SqliteConnection;
use std::collections::HashMap;

/// Administrative code hierarchy: a municipality's district is identified by
/// the first 2 characters of the municipality code.
pub fn district_prefix(code: &str) -> &str {
    code.get(..2).unwrap_or(code)
}

/// A parish's municipality is identified by the first 4 characters of the
/// parish code.
pub fn municipality_prefix(code: &str) -> &str {
    code.get(..4).unwrap_or(code)
}

/// Fields and records are matched on a shared 5-character code prefix.
pub const RECORD_CODE_PREFIX_LEN: i64 = 5;

/// "processes" slug becomes the catalog name "Processes".
pub fn title_case(slug: &str) -> String {
    slug.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default)]
pub struct LookupCache {
    /// "table_code|version" -> table_versions.id
    table_versions: HashMap<String, i64>,
    /// slug -> catalogs.id
    catalogs: HashMap<String, i64>,
    country_pt: Option<i64>,
    /// 2-character code prefix -> districts.id, bulk-loaded on first use
    districts: Option<HashMap<String, i64>>,
    /// 4-character code prefix -> municipalities.id, bulk-loaded on first use
    municipalities: Option<HashMap<String, i64>>,
}

impl LookupCache {
    /// Resolve the TableVersion id for a (table_code, version) pair,
    /// creating the row on first sight.
    pub async fn table_version_id(
        &mut self,
        conn: &mut SqliteConnection,
        table_code: &str,
        version: &str,
    ) -> Result<i64> {
        let key = format!("{}|{}", table_code, version);
        if let Some(&id) = self.table_versions.get(&key) {
            return Ok(id);
        }

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM table_versions WHERE table_code = ? AND version = ? AND deleted_at IS NULL",
        )
        .bind(table_code)
        .bind(version)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("Failed to look up table version {} {}", table_code, version))?;

        let id = match existing {
            Some(id) => id,
            None => sqlx::query_scalar(
                "INSERT INTO table_versions (table_code, version) VALUES (?, ?)
                 ON CONFLICT (table_code, version)
                 DO UPDATE SET updated_at = CURRENT_TIMESTAMP
                 RETURNING id",
            )
            .bind(table_code)
            .bind(version)
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("Failed to create table version {} {}", table_code, version))?,
        };

        self.table_versions.insert(key, id);
        Ok(id)
    }

    /// Resolve the Catalog id for a slug, auto-creating the catalog with a
    /// title-cased display name the first time a generic table needs it.
    pub async fn catalog_id(&mut self, conn: &mut SqliteConnection, slug: &str) -> Result<i64> {
        if let Some(&id) = self.catalogs.get(slug) {
            return Ok(id);
        }

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM catalogs WHERE slug = ? AND deleted_at IS NULL")
                .bind(slug)
                .fetch_optional(&mut *conn)
                .await
                .with_context(|| format!("Failed to look up catalog {}", slug))?;

        let id = match existing {
            Some(id) => id,
            None => sqlx::query_scalar(
                "INSERT INTO catalogs (slug, name) VALUES (?, ?)
                 ON CONFLICT (slug) DO UPDATE SET updated_at = CURRENT_TIMESTAMP
                 RETURNING id",
            )
            .bind(slug)
            .bind(title_case(slug))
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("Failed to create catalog {}", slug))?,
        };

        self.catalogs.insert(slug.to_string(), id);
        Ok(id)
    }

    /// Id of the fixed "PT" country row every district hangs from. Its
    /// absence is a hard failure: the countries file must be imported first.
    pub async fn country_pt_id(&mut self, conn: &mut SqliteConnection) -> Result<i64> {
        if let Some(id) = self.country_pt {
            return Ok(id);
        }

        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM countries WHERE code = 'PT' AND deleted_at IS NULL")
                .fetch_optional(&mut *conn)
                .await
                .context("Failed to query country PT")?;

        let id = id.ok_or_else(|| {
            anyhow!("no country with code 'PT' found; import the countries file first")
        })?;
        self.country_pt = Some(id);
        Ok(id)
    }

    /// District id for a municipality code, from the prefix map loaded in
    /// bulk on the first municipality batch. A missing parent aborts the
    /// whole file.
    pub async fn district_id_for(
        &mut self,
        conn: &mut SqliteConnection,
        municipality_code: &str,
    ) -> Result<i64> {
        if self.districts.is_none() {
            let rows: Vec<(i64, String)> =
                sqlx::query_as("SELECT id, code FROM districts WHERE deleted_at IS NULL")
                    .fetch_all(&mut *conn)
                    .await
                    .context("Failed to load districts cache")?;

            let mut map = HashMap::new();
            for (id, code) in rows {
                if code.len() >= 2 {
                    map.insert(district_prefix(&code).to_string(), id);
                }
            }
            self.districts = Some(map);
        }

        let prefix = district_prefix(municipality_code);
        self.districts
            .as_ref()
            .and_then(|m| m.get(prefix).copied())
            .ok_or_else(|| {
                anyhow!(
                    "district not found for municipality code {} (prefix {})",
                    municipality_code,
                    prefix
                )
            })
    }

    /// Municipality id for a parish code, from the prefix map loaded in bulk
    /// on the first parish batch.
    pub async fn municipality_id_for(
        &mut self,
        conn: &mut SqliteConnection,
        parish_code: &str,
    ) -> Result<i64> {
        if self.municipalities.is_none() {
            let rows: Vec<(i64, String)> =
                sqlx::query_as("SELECT id, code FROM municipalities WHERE deleted_at IS NULL")
                    .fetch_all(&mut *conn)
                    .await
                    .context("Failed to load municipalities cache")?;

            let mut map = HashMap::new();
            for (id, code) in rows {
                if code.len() >= 4 {
                    map.insert(municipality_prefix(&code).to_string(), id);
                }
            }
            self.municipalities = Some(map);
        }

        let prefix = municipality_prefix(parish_code);
        self.municipalities
            .as_ref()
            .and_then(|m| m.get(prefix).copied())
            .ok_or_else(|| {
                anyhow!(
                    "municipality not found for parish code {} (prefix {})",
                    parish_code,
                    prefix
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_extraction() {
        assert_eq!(district_prefix("1106"), "11");
        assert_eq!(district_prefix("1"), "1");
        assert_eq!(municipality_prefix("110633"), "1106");
        assert_eq!(municipality_prefix("110"), "110");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("processes"), "Processes");
        assert_eq!(title_case("voltage_levels"), "Voltage Levels");
        assert_eq!(title_case("cae_rev4"), "Cae Rev4");
    }
}
