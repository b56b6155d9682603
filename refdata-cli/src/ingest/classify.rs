//! Row Classifier & Table Switcher.
//!
//! A sheet interleaves header/boundary rows with data rows. A header row
//! names the table via its first cell; every following data row belongs to
//! that table until the next header row.

use crate::catalog::{self, TABLE_UNRECOGNIZED};

/// Outcome of classifying one row against the current switcher state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowKind {
    /// Header/boundary row; the named table is now active.
    Boundary(&'static str),
    /// Data row belonging to the active table.
    Data(&'static str),
    /// Data row before any header, or under an unrecognized table code.
    Dropped,
}

/// A row is a header/boundary row iff it has at least 2 cells AND (it has
/// exactly 2 cells, OR its 3rd cell is empty).
pub fn is_header_row(row: &[String]) -> bool {
    row.len() >= 2 && (row.len() == 2 || row[2].is_empty())
}

/// Tracks the active table across a sheet's row sequence.
#[derive(Debug, Default)]
pub struct TableSwitcher {
    active: Option<&'static str>,
}

impl TableSwitcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&mut self, row: &[String]) -> RowKind {
        if is_header_row(row) {
            let table = catalog::table_for_code(&row[0]);
            self.active = Some(table);
            return RowKind::Boundary(table);
        }

        match self.active {
            Some(table) if table != TABLE_UNRECOGNIZED => RowKind::Data(table),
            _ => RowKind::Dropped,
        }
    }
}
