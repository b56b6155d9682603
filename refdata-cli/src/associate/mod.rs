//! Association Reconciler.
//!
//! Runs after all files are ingested and derives relationships between
//! already-loaded entities. Each procedure is idempotent and runs in its own
//! transaction; unresolvable codes are skipped and counted, never fatal.

pub mod carry_forward;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;

use crate::sheet;
use crate::store::lookup::RECORD_CODE_PREFIX_LEN;
use carry_forward::carry_forward_step_rows;

/// Link each field to the record sharing its 5-character code prefix.
///
/// Pure intra-store reconciliation, one set-based statement. Fields whose
/// record reference is already set are left untouched.
pub async fn associate_fields_records(pool: &SqlitePool) -> Result<u64> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let result = sqlx::query(
        "UPDATE fields
         SET record_id = r.id, updated_at = CURRENT_TIMESTAMP
         FROM records r
         WHERE substr(fields.code, 1, ?) = substr(r.code, 1, ?)
           AND fields.deleted_at IS NULL
           AND r.deleted_at IS NULL
           AND fields.record_id IS NULL",
    )
    .bind(RECORD_CODE_PREFIX_LEN)
    .bind(RECORD_CODE_PREFIX_LEN)
    .execute(&mut *tx)
    .await
    .context("Failed to associate fields with records")?;

    tx.commit()
        .await
        .context("Failed to commit field-record association")?;

    log::info!("Associated {} fields with records", result.rows_affected());
    Ok(result.rows_affected())
}

/// Set each record's record type from an auxiliary sheet.
///
/// Row 0 is a header; columns [1] and [2] carry the record code and the
/// record-type code. Returns (associated, skipped).
pub async fn associate_record_types(pool: &SqlitePool, rows: &[Vec<String>]) -> Result<(usize, usize)> {
    let record_types = load_code_map(
        pool,
        "SELECT cv.id, cv.code
         FROM catalog_values cv
         JOIN catalogs c ON cv.catalog_id = c.id
         WHERE c.slug = 'record_types' AND cv.deleted_at IS NULL",
    )
    .await
    .context("Failed to load record types")?;

    let mut tx = pool.begin().await.context("Failed to start transaction")?;
    let mut associated = 0usize;
    let mut skipped = 0usize;

    for row in rows.iter().skip(1) {
        if row.len() < 3 {
            continue;
        }
        let record_code = &row[1];
        let record_type_code = &row[2];
        if record_code.is_empty() || record_type_code.is_empty() {
            continue;
        }

        let Some(&record_type_id) = record_types.get(record_type_code) else {
            skipped += 1;
            continue;
        };

        let result = sqlx::query(
            "UPDATE records
             SET record_type_id = ?, updated_at = CURRENT_TIMESTAMP
             WHERE code = ? AND deleted_at IS NULL",
        )
        .bind(record_type_id)
        .bind(record_code)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to set record type of record {}", record_code))?;

        if result.rows_affected() == 0 {
            skipped += 1;
        } else {
            associated += 1;
        }
    }

    tx.commit()
        .await
        .context("Failed to commit record-type association")?;

    log::info!("Associated {} record types ({} rows skipped)", associated, skipped);
    Ok((associated, skipped))
}

pub async fn associate_record_types_file(
    pool: &SqlitePool,
    path: &Path,
    sheet_name: &str,
) -> Result<(usize, usize)> {
    let rows = sheet::read_rows(path, sheet_name)?;
    associate_record_types(pool, &rows)
        .await
        .with_context(|| format!("Failed to associate record types from {}", path.display()))
}

/// Header-type codes and record codes accumulated for one step.
#[derive(Debug, Default)]
struct StepLinks {
    header_type_codes: Vec<String>,
    record_codes: Vec<String>,
}

/// Group effective tuples by step. The first non-empty header-type list per
/// step wins; later rows for the same step only contribute record codes.
fn group_by_step(tuples: &[carry_forward::StepRow]) -> HashMap<String, StepLinks> {
    let mut groups: HashMap<String, StepLinks> = HashMap::new();

    for tuple in tuples {
        let links = groups.entry(tuple.step_code.clone()).or_default();

        if links.header_type_codes.is_empty() {
            links.header_type_codes = tuple
                .header_type_code
                .split(',')
                .map(str::trim)
                .filter(|ht| !ht.is_empty())
                .map(str::to_string)
                .collect();
        }

        links.record_codes.push(tuple.record_code.clone());
    }

    groups
}

/// Create step↔header-type and step↔record links from an auxiliary sheet.
/// Returns (created links, skipped lookups).
pub async fn associate_steps(pool: &SqlitePool, rows: &[Vec<String>]) -> Result<(usize, usize)> {
    let header_types = load_code_map(
        pool,
        "SELECT cv.id, cv.code
         FROM catalog_values cv
         JOIN catalogs c ON cv.catalog_id = c.id
         WHERE c.slug = 'header_types' AND cv.deleted_at IS NULL",
    )
    .await
    .context("Failed to load header types")?;

    let records = load_code_map(pool, "SELECT id, code FROM records WHERE deleted_at IS NULL")
        .await
        .context("Failed to load records")?;

    let steps = load_code_map(pool, "SELECT id, code FROM steps WHERE deleted_at IS NULL")
        .await
        .context("Failed to load steps")?;

    let groups = group_by_step(&carry_forward_step_rows(rows));

    let mut tx = pool.begin().await.context("Failed to start transaction")?;
    let mut created = 0usize;
    let mut skipped = 0usize;

    for (step_code, links) in &groups {
        let Some(&step_id) = steps.get(step_code) else {
            skipped += 1;
            continue;
        };

        for header_type_code in &links.header_type_codes {
            let Some(&header_type_id) = header_types.get(header_type_code) else {
                skipped += 1;
                continue;
            };

            sqlx::query(
                "INSERT INTO step_header_types (step_id, header_type_id) VALUES (?, ?)
                 ON CONFLICT (step_id, header_type_id) DO NOTHING",
            )
            .bind(step_id)
            .bind(header_type_id)
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!("Failed to link step {} to header type {}", step_code, header_type_code)
            })?;
            created += 1;
        }

        for record_code in &links.record_codes {
            let Some(&record_id) = records.get(record_code) else {
                skipped += 1;
                continue;
            };

            sqlx::query(
                "INSERT INTO step_records (step_id, record_id) VALUES (?, ?)
                 ON CONFLICT (step_id, record_id) DO NOTHING",
            )
            .bind(step_id)
            .bind(record_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to link step {} to record {}", step_code, record_code))?;
            created += 1;
        }
    }

    tx.commit()
        .await
        .context("Failed to commit step associations")?;

    log::info!(
        "Created {} step links across {} steps ({} lookups skipped)",
        created,
        groups.len(),
        skipped
    );
    Ok((created, skipped))
}

pub async fn associate_steps_file(
    pool: &SqlitePool,
    path: &Path,
    sheet_name: &str,
) -> Result<(usize, usize)> {
    let rows = sheet::read_rows(path, sheet_name)?;
    associate_steps(pool, &rows)
        .await
        .with_context(|| format!("Failed to associate steps from {}", path.display()))
}

/// Load (id, code) pairs into a code-keyed map for in-memory resolution.
async fn load_code_map(pool: &SqlitePool, sql: &str) -> Result<HashMap<String, i64>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(id, code)| (code, id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::import_rows;
    use crate::store::EntryStore;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    async fn count(pool: &SqlitePool, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
    }

    #[test]
    fn test_first_header_type_list_per_step_wins() {
        let tuples = carry_forward_step_rows(&[
            row(&["Passo", "Cabeçalho", "Registo"]),
            row(&["P1", "I", "R1"]),
            row(&["P1", "O, X", "R2"]),
        ]);
        let groups = group_by_step(&tuples);
        assert_eq!(groups["P1"].header_type_codes, vec!["I"]);
        assert_eq!(groups["P1"].record_codes, vec!["R1", "R2"]);
    }

    #[test]
    fn test_comma_separated_header_types_are_split_and_trimmed() {
        let tuples = carry_forward_step_rows(&[
            row(&["Passo", "Cabeçalho", "Registo"]),
            row(&["P2", "O, I,", "R3"]),
        ]);
        let groups = group_by_step(&tuples);
        assert_eq!(groups["P2"].header_type_codes, vec!["O", "I"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_fields_link_to_records_by_prefix(pool: SqlitePool) {
        let mut store = EntryStore::new(pool.clone());
        let rows = vec![
            row(&["T00040", "1"]),
            row(&["T00040", "1", "T00050XXXXX", "A record"]),
            row(&["T00050", "1"]),
            row(&["T00050", "1", "T00050ABCDE", "A field"]),
            row(&["T00050", "1", "T11111ABCDE", "Unrelated field"]),
        ];
        import_rows(&mut store, &rows).await.unwrap();

        let updated = associate_fields_records(&pool).await.unwrap();
        assert_eq!(updated, 1);

        let record_id: Option<i64> =
            sqlx::query_scalar("SELECT record_id FROM fields WHERE code = 'T00050ABCDE'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(record_id.is_some());

        let unrelated: Option<i64> =
            sqlx::query_scalar("SELECT record_id FROM fields WHERE code = 'T11111ABCDE'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(unrelated.is_none());

        // Already-linked fields must not be rewritten by a re-run
        let updated_again = associate_fields_records(&pool).await.unwrap();
        assert_eq!(updated_again, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_record_types_with_skips(pool: SqlitePool) {
        let mut store = EntryStore::new(pool.clone());
        let rows = vec![
            row(&["T00040", "1"]),
            row(&["T00040", "1", "R0001", "A record"]),
            row(&["T00070", "1"]),
            row(&["T00070", "1", "RT1", "Type one"]),
        ];
        import_rows(&mut store, &rows).await.unwrap();

        let sheet = vec![
            row(&["#", "Registo", "Tipo"]),
            row(&["1", "R0001", "RT1"]),
            row(&["2", "R0001", "UNKNOWN"]),
            row(&["3", "GHOST", "RT1"]),
            row(&["4", "", ""]),
        ];
        let (associated, skipped) = associate_record_types(&pool, &sheet).await.unwrap();
        assert_eq!(associated, 1);
        assert_eq!(skipped, 2);

        let type_id: Option<i64> =
            sqlx::query_scalar("SELECT record_type_id FROM records WHERE code = 'R0001'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(type_id.is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_step_links_with_carry_forward(pool: SqlitePool) {
        let mut store = EntryStore::new(pool.clone());
        let rows = vec![
            row(&["T00020", "1"]),
            row(&["T00020", "1", "P1", "Step one"]),
            row(&["T00020", "1", "P2", "Step two"]),
            row(&["T00040", "1"]),
            row(&["T00040", "1", "R1", ""]),
            row(&["T00040", "1", "R2", ""]),
            row(&["T00040", "1", "R3", ""]),
            row(&["T00060", "1"]),
            row(&["T00060", "1", "I", "Input"]),
            row(&["T00060", "1", "O", "Output"]),
        ];
        import_rows(&mut store, &rows).await.unwrap();

        let sheet = vec![
            row(&["Passo", "Cabeçalho", "Registo"]),
            row(&["P1", "I", "R1"]),
            row(&["", "", "R2"]),
            row(&["P2", "O,I", "R3"]),
        ];
        associate_steps(&pool, &sheet).await.unwrap();
        // Rerun must not duplicate links
        associate_steps(&pool, &sheet).await.unwrap();

        let p1_headers: Vec<(String,)> = sqlx::query_as(
            "SELECT cv.code FROM step_header_types sht
             JOIN steps s ON sht.step_id = s.id
             JOIN catalog_values cv ON sht.header_type_id = cv.id
             WHERE s.code = 'P1'",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(p1_headers, vec![("I".to_string(),)]);

        let p1_records = count(
            &pool,
            "SELECT COUNT(*) FROM step_records sr
             JOIN steps s ON sr.step_id = s.id WHERE s.code = 'P1'",
        )
        .await;
        assert_eq!(p1_records, 2);

        let p2_headers = count(
            &pool,
            "SELECT COUNT(*) FROM step_header_types sht
             JOIN steps s ON sht.step_id = s.id WHERE s.code = 'P2'",
        )
        .await;
        assert_eq!(p2_headers, 2);

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM step_records").await, 3);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM step_header_types").await, 3);
    }
}
