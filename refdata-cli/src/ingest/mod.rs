//! Per-file import: classification, parsing, batching and transactional
//! upserts. One file is ingested inside one transaction; any failure rolls
//! the whole file back.

pub mod classify;
pub mod entry;
pub mod process_steps;

use anyhow::{Context, Result};
use std::path::Path;

use crate::catalog::TABLE_UNRECOGNIZED;
use crate::sheet;
use crate::store::EntryStore;
use classify::{RowKind, TableSwitcher};
use entry::{Entry, parse_row};

/// Pending entries are flushed once this many rows accumulate, in addition
/// to flushes at table boundaries and end of stream.
pub const FLUSH_THRESHOLD: usize = 500;

/// Import one spreadsheet file's "Data" sheet.
pub async fn import_file(store: &mut EntryStore, path: &Path, sheet_name: &str) -> Result<u64> {
    let rows = sheet::read_rows(path, sheet_name)?;
    let processed = import_rows(store, &rows)
        .await
        .with_context(|| format!("Failed to import {}", path.display()))?;
    log::info!("Imported {} rows from {}", processed, path.display());
    Ok(processed)
}

/// Ingest a sheet's rows inside a single transaction.
///
/// An empty sheet, or one containing only header rows, imports zero rows and
/// is not an error.
pub async fn import_rows(store: &mut EntryStore, rows: &[Vec<String>]) -> Result<u64> {
    let mut tx = store.begin().await?;

    let mut switcher = TableSwitcher::new();
    let mut pending: Vec<Entry> = Vec::new();
    let mut pending_table: &'static str = TABLE_UNRECOGNIZED;
    let mut processed = 0u64;

    for row in rows {
        match switcher.classify(row) {
            RowKind::Boundary(table) => {
                // Table boundary: flush accumulated entries before switching
                if !pending.is_empty() {
                    let batch = std::mem::take(&mut pending);
                    processed += batch.len() as u64;
                    store.save_batch(&mut tx, batch, pending_table).await?;
                }
                pending_table = table;
            }
            RowKind::Data(table) => {
                pending.push(parse_row(row, table));
                if pending.len() >= FLUSH_THRESHOLD {
                    let batch = std::mem::take(&mut pending);
                    processed += batch.len() as u64;
                    store.save_batch(&mut tx, batch, pending_table).await?;
                }
            }
            RowKind::Dropped => {}
        }
    }

    if !pending.is_empty() {
        processed += pending.len() as u64;
        store.save_batch(&mut tx, pending, pending_table).await?;
    }

    tx.commit().await.context("Failed to commit import")?;
    Ok(processed)
}
