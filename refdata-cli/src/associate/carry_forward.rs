//! Merged-cell carry-forward semantics.
//!
//! When a spreadsheet merges cells vertically, only the first row of the
//! merged region carries the value; the rest read as empty. The fold below
//! makes each row self-contained before any grouping happens.

/// Effective values of one step-association row.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRow {
    pub step_code: String,
    pub header_type_code: String,
    pub record_code: String,
}

/// Fold a sheet's rows into effective (step, header-type, record) tuples.
///
/// Row 0 is a header and is skipped, as are rows with fewer than 3 cells.
/// The step and header-type columns carry forward independently; the record
/// column never does. Rows where any effective value is still empty are
/// dropped.
pub fn carry_forward_step_rows(rows: &[Vec<String>]) -> Vec<StepRow> {
    let mut last_step = String::new();
    let mut last_header_type = String::new();
    let mut out = Vec::new();

    for row in rows.iter().skip(1) {
        if row.len() < 3 {
            continue;
        }

        let step_code = if row[0].is_empty() {
            last_step.clone()
        } else {
            last_step = row[0].clone();
            row[0].clone()
        };

        let header_type_code = if row[1].is_empty() {
            last_header_type.clone()
        } else {
            last_header_type = row[1].clone();
            row[1].clone()
        };

        let record_code = row[2].clone();

        if step_code.is_empty() || header_type_code.is_empty() || record_code.is_empty() {
            continue;
        }

        out.push(StepRow {
            step_code,
            header_type_code,
            record_code,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_both_columns_carry_forward_independently() {
        let rows = vec![
            row(&["Passo", "Cabeçalho", "Registo"]),
            row(&["P1", "I", "R1"]),
            row(&["", "", "R2"]),
            row(&["P2", "O,I", "R3"]),
            row(&["", "X", "R4"]),
        ];
        let tuples = carry_forward_step_rows(&rows);
        assert_eq!(
            tuples,
            vec![
                StepRow { step_code: "P1".into(), header_type_code: "I".into(), record_code: "R1".into() },
                StepRow { step_code: "P1".into(), header_type_code: "I".into(), record_code: "R2".into() },
                StepRow { step_code: "P2".into(), header_type_code: "O,I".into(), record_code: "R3".into() },
                StepRow { step_code: "P2".into(), header_type_code: "X".into(), record_code: "R4".into() },
            ]
        );
    }

    #[test]
    fn test_incomplete_rows_are_dropped() {
        let rows = vec![
            row(&["Passo", "Cabeçalho", "Registo"]),
            // Nothing carried forward yet
            row(&["", "", "R1"]),
            row(&["P1", "I", ""]),
            row(&["P1", "I"]),
        ];
        assert!(carry_forward_step_rows(&rows).is_empty());
    }
}
