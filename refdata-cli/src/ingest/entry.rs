//! Typed record parsed from one data row.

use crate::catalog;

/// One parsed data row. The first two cells of every row carry the source
/// table code and the version tag; the rest of the layout depends on the
/// table the row belongs to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    pub table_code: String,
    pub version: String,
    pub code: String,
    pub name: String,
    pub description: String,
    pub zone_code: String,
    pub zone_name: String,
    pub zone_name_formatted: String,
    pub ine_municipality_code: String,
}

impl Entry {
    /// Natural key used for in-batch deduplication.
    pub fn natural_key(&self, table_name: &str) -> &str {
        if table_name == catalog::TABLE_INE_ZONES {
            &self.zone_code
        } else {
            &self.code
        }
    }
}

/// Parse a raw row into an [`Entry`] using the layout of `table_name`.
///
/// Missing trailing cells leave the corresponding field empty; spreadsheets
/// routinely omit trailing blanks, so short rows are not an error.
pub fn parse_row(row: &[String], table_name: &str) -> Entry {
    let cell = |i: usize| row.get(i).cloned().unwrap_or_default();

    let mut entry = Entry {
        table_code: cell(0),
        version: cell(1),
        ..Entry::default()
    };

    match table_name {
        catalog::TABLE_COUNTRIES
        | catalog::TABLE_DISTRICTS
        | catalog::TABLE_MUNICIPALITIES
        | catalog::TABLE_PARISHES => {
            entry.name = cell(2);
            entry.code = cell(3);
        }
        catalog::TABLE_INE_ZONES => {
            entry.zone_code = cell(2);
            entry.zone_name = cell(3);
            entry.zone_name_formatted = cell(4);
            entry.ine_municipality_code = cell(5);
        }
        _ => {
            entry.code = cell(2);
            entry.description = cell(3);
        }
    }

    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_geographic_layout() {
        let entry = parse_row(&row(&["T10120", "1", "Lisboa", "11"]), catalog::TABLE_DISTRICTS);
        assert_eq!(entry.table_code, "T10120");
        assert_eq!(entry.version, "1");
        assert_eq!(entry.name, "Lisboa");
        assert_eq!(entry.code, "11");
    }

    #[test]
    fn test_parse_ine_zone_layout() {
        let entry = parse_row(
            &row(&["T10150", "2", "Z001", "Grande Lisboa", "GRANDE LISBOA", "1106"]),
            catalog::TABLE_INE_ZONES,
        );
        assert_eq!(entry.zone_code, "Z001");
        assert_eq!(entry.zone_name, "Grande Lisboa");
        assert_eq!(entry.zone_name_formatted, "GRANDE LISBOA");
        assert_eq!(entry.ine_municipality_code, "1106");
        assert_eq!(entry.natural_key(catalog::TABLE_INE_ZONES), "Z001");
    }

    #[test]
    fn test_parse_generic_layout() {
        let entry = parse_row(&row(&["T12210", "3", "BT", "Baixa tensão"]), "voltage_levels");
        assert_eq!(entry.code, "BT");
        assert_eq!(entry.description, "Baixa tensão");
        assert_eq!(entry.natural_key("voltage_levels"), "BT");
    }

    #[test]
    fn test_short_rows_default_to_empty() {
        let entry = parse_row(&row(&["T12210", "3", "BT"]), "voltage_levels");
        assert_eq!(entry.code, "BT");
        assert_eq!(entry.description, "");

        let entry = parse_row(&row(&["T10150", "2"]), catalog::TABLE_INE_ZONES);
        assert_eq!(entry.zone_code, "");
    }
}
