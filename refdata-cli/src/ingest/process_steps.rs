//! Process/Step linking from the process-steps auxiliary sheet.
//!
//! Column 0 is the process code (merged cells carry forward), column 1 the
//! step code. Steps are linked to their process in sheet order, 1-based;
//! re-running refreshes the order.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::sheet;
use crate::store::EntryStore;

/// Group step codes by effective process code. Row 0 is a header. An empty
/// process cell inherits the last non-empty process seen; rows with an empty
/// step cell are merged-cell filler and are skipped.
pub fn group_steps_by_process(rows: &[Vec<String>]) -> HashMap<String, Vec<String>> {
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    let mut last_process = String::new();

    for row in rows.iter().skip(1) {
        let process = row.first().cloned().unwrap_or_default();
        let step = row.get(1).cloned().unwrap_or_default();

        let process = if process.is_empty() {
            last_process.clone()
        } else {
            last_process = process.clone();
            process
        };

        if step.is_empty() || process.is_empty() {
            continue;
        }

        groups.entry(process).or_default().push(step);
    }

    groups
}

pub async fn link_file(store: &mut EntryStore, path: &Path, sheet_name: &str) -> Result<()> {
    let rows = sheet::read_rows(path, sheet_name)?;
    link_rows(store, &rows)
        .await
        .with_context(|| format!("Failed to link process steps from {}", path.display()))
}

pub async fn link_rows(store: &mut EntryStore, rows: &[Vec<String>]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let groups = group_steps_by_process(rows);
    let mut tx = store.begin().await?;
    let mut linked = 0usize;
    let mut skipped_steps = 0usize;

    for (process_code, step_codes) in &groups {
        // The table spreadsheet may already have imported a description for
        // this process into the 'processes' catalog.
        let description: Option<String> = sqlx::query_scalar(
            "SELECT cv.description
             FROM catalog_values cv
             JOIN catalogs c ON cv.catalog_id = c.id
             WHERE c.slug = 'processes' AND cv.code = ? AND cv.deleted_at IS NULL
             LIMIT 1",
        )
        .bind(process_code)
        .fetch_optional(&mut *tx)
        .await
        .with_context(|| format!("Failed to fetch description for process {}", process_code))?;

        let process_id: i64 = sqlx::query_scalar(
            "INSERT INTO processes (code, description) VALUES (?, ?)
             ON CONFLICT (code)
             DO UPDATE SET description = excluded.description, updated_at = CURRENT_TIMESTAMP
             RETURNING id",
        )
        .bind(process_code)
        .bind(description.unwrap_or_default())
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("Failed to upsert process {}", process_code))?;

        for (index, step_code) in step_codes.iter().enumerate() {
            let step_id: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM steps WHERE code = ? AND deleted_at IS NULL LIMIT 1",
            )
            .bind(step_code)
            .fetch_optional(&mut *tx)
            .await
            .with_context(|| format!("Failed to look up step {}", step_code))?;

            let Some(step_id) = step_id else {
                skipped_steps += 1;
                continue;
            };

            sqlx::query(
                "INSERT INTO process_steps (process_id, step_id, step_order) VALUES (?, ?, ?)
                 ON CONFLICT (process_id, step_id)
                 DO UPDATE SET step_order = excluded.step_order, updated_at = CURRENT_TIMESTAMP",
            )
            .bind(process_id)
            .bind(step_id)
            .bind((index + 1) as i64)
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!("Failed to link process {} to step {}", process_code, step_code)
            })?;
            linked += 1;
        }
    }

    tx.commit().await.context("Failed to commit process-step links")?;
    log::info!(
        "Linked {} process steps across {} processes ({} unknown steps skipped)",
        linked,
        groups.len(),
        skipped_steps
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_grouping_with_merged_process_cells() {
        let rows = vec![
            row(&["Processo", "Passo"]),
            row(&["MC", "MC01"]),
            row(&["", "MC02"]),
            row(&["", ""]),
            row(&["LC", "LC01"]),
        ];
        let groups = group_steps_by_process(&rows);
        assert_eq!(groups["MC"], vec!["MC01", "MC02"]);
        assert_eq!(groups["LC"], vec!["LC01"]);
    }

    #[test]
    fn test_rows_without_any_process_are_skipped() {
        let rows = vec![row(&["Processo", "Passo"]), row(&["", "orphan"])];
        assert!(group_steps_by_process(&rows).is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_links_are_ordered_and_rerun_safe(pool: SqlitePool) {
        let mut store = EntryStore::new(pool.clone());

        let steps = vec![
            row(&["T00020", "1"]),
            row(&["T00020", "1", "MC01", "Request"]),
            row(&["T00020", "1", "MC02", "Response"]),
        ];
        crate::ingest::import_rows(&mut store, &steps).await.unwrap();

        let sheet = vec![
            row(&["Processo", "Passo"]),
            row(&["MC", "MC01"]),
            row(&["", "MC02"]),
            row(&["", "GHOST"]),
        ];
        link_rows(&mut store, &sheet).await.unwrap();
        link_rows(&mut store, &sheet).await.unwrap();

        let links: Vec<(String, i64)> = sqlx::query_as(
            "SELECT s.code, ps.step_order
             FROM process_steps ps
             JOIN steps s ON ps.step_id = s.id
             ORDER BY ps.step_order",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(links, vec![("MC01".to_string(), 1), ("MC02".to_string(), 2)]);

        let processes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(processes, 1);
    }
}
