use std::io::Read;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::models::{NormalizedPoints, RawCell, RawRow, SprintRecord, SprintTable};

pub mod columns {
    pub const TEAM: &str = "Team";
    pub const SPRINT: &str = "Sprint";
    pub const TARGET_VELOCITY: &str = "Target Velocity";
    pub const COMMITTED: &str = "Committed SP";
    pub const DELIVERED: &str = "Delivered SP";
    pub const INFLATION: &str = "Inflation correction";
    pub const PRODUCTIVITY: &str = "Productivity";
    pub const PREDICTABILITY: &str = "Predictability";
    pub const NOTES: &str = "Notes";
    pub const NORMALIZED_TARGET_VELOCITY: &str = "Normalized Target Velocity";
    pub const NORMALIZED_PLANNED: &str = "Normalized Planned SP";
    pub const NORMALIZED_DELIVERED: &str = "Normalized Delivered SP";
    pub const NORMALIZED_INFLATION: &str = "Normalized Inflation SP";

    pub const REQUIRED: [&str; 8] = [
        TEAM,
        SPRINT,
        TARGET_VELOCITY,
        COMMITTED,
        DELIVERED,
        INFLATION,
        PRODUCTIVITY,
        PREDICTABILITY,
    ];
}

const SENTINELS: [&str; 2] = ["/", "#VALUE!"];

static EMPTY: RawCell = RawCell::Empty;

pub fn is_sentinel(value: &str) -> bool {
    SENTINELS.contains(&value.trim())
}

/// Replaces "no data" markers with `Empty`. Applies to every column.
pub fn clean_cell(cell: &RawCell) -> RawCell {
    match cell {
        RawCell::Text(text) if is_sentinel(text) => RawCell::Empty,
        RawCell::Number(value) if !value.is_finite() => RawCell::Empty,
        other => other.clone(),
    }
}

pub fn parse_numeric(cell: &RawCell) -> Option<f64> {
    match clean_cell(cell) {
        RawCell::Empty => None,
        RawCell::Number(value) => Some(value),
        RawCell::Text(text) => match text.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                debug!(value = %text, "non-numeric cell coerced to missing");
                None
            }
        },
    }
}

/// Accepts "82.5%" (divided by 100) or a bare fraction such as "0.825".
pub fn clean_percentage(cell: &RawCell) -> Option<f64> {
    let value = match clean_cell(cell) {
        RawCell::Empty => return None,
        RawCell::Number(value) => value,
        RawCell::Text(text) => {
            let trimmed = text.trim();
            let parsed = if trimmed.contains('%') {
                trimmed
                    .trim_matches('%')
                    .trim()
                    .parse::<f64>()
                    .map(|v| v / 100.0)
            } else {
                trimmed.parse::<f64>()
            };
            match parsed {
                Ok(value) => value,
                Err(_) => {
                    debug!(value = %text, "malformed percentage coerced to missing");
                    return None;
                }
            }
        }
    };

    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

fn cell_text(cell: &RawCell) -> Option<String> {
    match clean_cell(cell) {
        RawCell::Empty => None,
        RawCell::Number(value) => Some(value.to_string()),
        RawCell::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}

fn cell<'a>(row: &'a RawRow, column: &str) -> &'a RawCell {
    row.get(column).unwrap_or(&EMPTY)
}

fn record_from_row(row: &RawRow, team: &str) -> SprintRecord {
    SprintRecord {
        sprint: cell_text(cell(row, columns::SPRINT)).unwrap_or_default(),
        team: team.to_string(),
        target_velocity: parse_numeric(cell(row, columns::TARGET_VELOCITY)),
        committed: parse_numeric(cell(row, columns::COMMITTED)),
        delivered: parse_numeric(cell(row, columns::DELIVERED)),
        inflation_correction: parse_numeric(cell(row, columns::INFLATION)).unwrap_or(0.0),
        productivity: clean_percentage(cell(row, columns::PRODUCTIVITY)),
        predictability: clean_percentage(cell(row, columns::PREDICTABILITY)),
        notes: cell_text(cell(row, columns::NOTES)),
        normalized: NormalizedPoints {
            target_velocity: parse_numeric(cell(row, columns::NORMALIZED_TARGET_VELOCITY)),
            planned: parse_numeric(cell(row, columns::NORMALIZED_PLANNED)),
            delivered: parse_numeric(cell(row, columns::NORMALIZED_DELIVERED)),
            inflation: parse_numeric(cell(row, columns::NORMALIZED_INFLATION)),
        },
    }
}

/// Turns raw rows into typed records, preserving row order.
pub fn clean_rows(rows: &[RawRow]) -> Result<SprintTable, LoadError> {
    let first = rows.first().ok_or(LoadError::EmptyTable)?;
    let team_name = match cell_text(cell(first, columns::TEAM)) {
        Some(name) => name,
        None => {
            warn!("first row has no team name");
            String::new()
        }
    };

    let records = rows
        .iter()
        .map(|row| record_from_row(row, &team_name))
        .collect();

    Ok(SprintTable { team_name, records })
}

pub fn read_rows<R: Read>(input: R) -> Result<Vec<RawRow>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    for required in columns::REQUIRED {
        if !headers.iter().any(|h| h == required) {
            return Err(LoadError::MissingColumn(required.to_string()));
        }
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(name, field)| (name.clone(), RawCell::from_field(field)))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

pub fn load_csv(path: &Path) -> Result<SprintTable, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound(path.to_path_buf()));
    }

    let file = std::fs::File::open(path)?;
    let rows = read_rows(file)?;
    let table = clean_rows(&rows)?;

    info!(
        path = %path.display(),
        team = %table.team_name,
        rows = table.total_rows(),
        "loaded sprint table"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "Team,Sprint,Target Velocity,Committed SP,Delivered SP,Inflation correction,Productivity,Predictability,Notes";

    fn text(value: &str) -> RawCell {
        RawCell::Text(value.to_string())
    }

    #[test]
    fn percentage_strings_are_divided_by_100() {
        assert_eq!(clean_percentage(&text("85%")), Some(0.85));
        assert_eq!(clean_percentage(&text(" 62.5 % ")), Some(0.625));
        assert_eq!(clean_percentage(&text("0%")), Some(0.0));
    }

    #[test]
    fn bare_numbers_are_taken_as_fractions() {
        assert_eq!(clean_percentage(&text("0.73")), Some(0.73));
        assert_eq!(clean_percentage(&RawCell::Number(0.9)), Some(0.9));
    }

    #[test]
    fn sentinels_are_missing_in_every_column() {
        for sentinel in ["/", "#VALUE!", " / ", "#VALUE! "] {
            let cell = text(sentinel);
            assert_eq!(clean_cell(&cell), RawCell::Empty);
            assert_eq!(clean_cell(&clean_cell(&cell)), RawCell::Empty);
            assert_eq!(clean_percentage(&cell), None);
            assert_eq!(parse_numeric(&cell), None);
            assert_eq!(cell_text(&cell), None);
        }
    }

    #[test]
    fn malformed_cells_become_missing() {
        assert_eq!(clean_percentage(&text("abc%")), None);
        assert_eq!(clean_percentage(&text("n/a")), None);
        assert_eq!(clean_percentage(&text("NaN")), None);
        assert_eq!(clean_percentage(&text("-5%")), None);
        assert_eq!(parse_numeric(&text("twelve")), None);
        assert_eq!(parse_numeric(&text("inf")), None);
        assert_eq!(parse_numeric(&RawCell::Empty), None);
    }

    #[test]
    fn missing_inflation_defaults_to_zero_but_other_numbers_stay_missing() {
        let mut row = RawRow::new();
        row.insert(columns::TEAM.to_string(), text(" Falcons "));
        row.insert(columns::SPRINT.to_string(), text("S25.01"));
        row.insert(columns::INFLATION.to_string(), text("/"));
        row.insert(columns::COMMITTED.to_string(), RawCell::Empty);
        row.insert(columns::PRODUCTIVITY.to_string(), text("80%"));

        let table = clean_rows(&[row]).unwrap();
        let record = &table.records[0];
        assert_eq!(table.team_name, "Falcons");
        assert_eq!(record.inflation_correction, 0.0);
        assert_eq!(record.committed, None);
        assert_eq!(record.target_velocity, None);
        assert_eq!(record.productivity, Some(0.8));
        assert_eq!(record.predictability, None);
    }

    #[test]
    fn empty_rows_are_rejected() {
        assert!(matches!(clean_rows(&[]), Err(LoadError::EmptyTable)));
    }

    #[test]
    fn reads_csv_with_bom_and_optional_columns_absent() {
        let data = format!(
            "\u{feff}{HEADER}\nApollo ,S25.01,120,110,95,-5,86.4%,79.2%,Holiday week\nApollo,S25.02,120,/,#VALUE!,,/,/,\n"
        );
        let rows = read_rows(data.as_bytes()).unwrap();
        let table = clean_rows(&rows).unwrap();

        assert_eq!(table.team_name, "Apollo");
        assert_eq!(table.total_rows(), 2);
        let first = &table.records[0];
        assert_eq!(first.sprint, "S25.01");
        assert_eq!(first.target_velocity, Some(120.0));
        assert_eq!(first.inflation_correction, -5.0);
        assert_eq!(first.notes.as_deref(), Some("Holiday week"));
        assert_eq!(first.normalized, NormalizedPoints::default());
        let second = &table.records[1];
        assert_eq!(second.committed, None);
        assert_eq!(second.delivered, None);
        assert_eq!(second.productivity, None);
        assert_eq!(second.notes, None);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let data = "Team,Sprint,Target Velocity\nA,S1,120\n";
        let err = read_rows(data.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(ref c) if c == "Committed SP"));
    }

    #[test]
    fn load_csv_reports_absent_file() {
        let err = load_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound(_)));
    }

    #[test]
    fn load_csv_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER},Normalized Planned SP").unwrap();
        writeln!(file, "Team X,S1,100,100,90,0,90%,90%,,95").unwrap();
        let table = load_csv(file.path()).unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].normalized.planned, Some(95.0));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn suffixed_percentage_is_divided_by_100(p in 0.0f64..10_000.0) {
                prop_assert_eq!(clean_percentage(&text(&format!("{p}%"))), Some(p / 100.0));
            }

            #[test]
            fn bare_percentage_is_kept_as_fraction(p in 0.0f64..100.0) {
                prop_assert_eq!(clean_percentage(&text(&format!("{p}"))), Some(p));
            }

            #[test]
            fn cleaning_a_cell_twice_changes_nothing(
                value in prop_oneof![Just("/".to_string()), Just("#VALUE!".to_string()), ".{0,12}"]
            ) {
                let once = clean_cell(&text(&value));
                prop_assert_eq!(clean_cell(&once), once);
            }
        }
    }
}
