//! Read a worksheet into plain string rows.

use anyhow::{Context, Result};
use calamine::{Data, Reader, Xlsx, open_workbook};
use std::path::Path;

/// Read one sheet of an xlsx workbook as rows of strings.
///
/// Trailing cells a spreadsheet omits simply do not appear in the row;
/// downstream parsing treats missing cells as empty.
pub fn read_rows(path: &Path, sheet_name: &str) -> Result<Vec<Vec<String>>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open Excel file: {}", path.display()))?;

    let range = workbook
        .worksheet_range(sheet_name)
        .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_string).collect())
        .collect();

    Ok(rows)
}

fn cell_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Codes like "11" come back as floats; keep whole numbers intact
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_string_coercion() {
        assert_eq!(cell_string(&Data::String("PT".into())), "PT");
        assert_eq!(cell_string(&Data::Int(11)), "11");
        assert_eq!(cell_string(&Data::Float(11.0)), "11");
        assert_eq!(cell_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_string(&Data::Empty), "");
    }
}
