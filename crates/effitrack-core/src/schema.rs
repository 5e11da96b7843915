//! Schema migration for the efficiency dataset.
//!
//! [`normalize`] upgrades a [`RawTable`] of any vintage to the canonical
//! column set. It is pure and idempotent: a table that is already canonical
//! comes back unchanged.
//!
//! Legacy shapes handled:
//! - a single `Week` column instead of `Week_Start`/`Week_End`
//!   (end = start + 6 days);
//! - the singular `Area_of_Efficiency` header.
//!
//! Columns unknown to the current schema are dropped, so files written by a
//! newer version still load.

use chrono::{Days, NaiveDate};

use crate::types::{
    format_number, Column, ColumnKind, EfficiencyDataset, EfficiencyRecord, RawTable, Value,
    FLAG_NO, FLAG_YES,
};

/// Header of the legacy single-period column.
pub const LEGACY_WEEK_COLUMN: &str = "Week";

/// Legacy header of [`Column::AreasOfEfficiency`].
pub const LEGACY_AREA_COLUMN: &str = "Area_of_Efficiency";

/// Days between period start and period end.
const PERIOD_LENGTH_DAYS: u64 = 6;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Date layouts accepted when reading legacy or hand-edited cells.
const DATE_INPUT_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// True when the table already has exactly the canonical columns in order.
///
/// This is the column-presence check done at load time; cells may still
/// need coercion.
pub fn is_canonical(table: &RawTable) -> bool {
    table.column_names() == Column::names()
}

/// True when the table still carries the legacy single-period column.
pub fn has_legacy_period(table: &RawTable) -> bool {
    table.has_column(LEGACY_WEEK_COLUMN) && !table.has_column(Column::WeekStart.name())
}

/// Upgrade a raw table to the canonical schema.
pub fn normalize(mut table: RawTable) -> RawTable {
    let rows = table.row_count();

    if has_legacy_period(&table) {
        let week = table.remove_column(LEGACY_WEEK_COLUMN).unwrap_or_default();
        let (starts, ends) = split_legacy_period(week);
        push_matching(&mut table, Column::WeekStart.name(), starts);
        push_matching(&mut table, Column::WeekEnd.name(), ends);
    }

    if !table.has_column(Column::AreasOfEfficiency.name()) {
        if let Some(areas) = table.remove_column(LEGACY_AREA_COLUMN) {
            push_matching(&mut table, Column::AreasOfEfficiency.name(), areas);
        }
    }

    // The first pushed column fixes the row count, and every column here
    // has exactly `rows` cells.
    let mut canonical = RawTable::empty();
    for column in Column::ALL {
        let kind = column.kind();
        let values = match table.remove_column(column.name()) {
            Some(values) => values.into_iter().map(|v| coerce(kind, v)).collect(),
            None => vec![kind.default_value(); rows],
        };
        push_matching(&mut canonical, column.name(), values);
    }
    debug_assert_eq!(canonical.row_count(), rows);
    canonical
}

/// Append a column cut from the same table, so its length always matches.
fn push_matching(table: &mut RawTable, name: &str, values: Vec<Value>) {
    let pushed = table.push_column(name, values);
    debug_assert!(pushed.is_ok(), "column '{name}' does not match the table");
}

/// Normalize and convert to typed records.
pub fn normalize_dataset(table: RawTable) -> EfficiencyDataset {
    let table = normalize(table);
    let rows = table.row_count();
    let mut columns: Vec<_> = table
        .into_columns()
        .into_iter()
        .map(|c| c.values.into_iter())
        .collect();
    (0..rows)
        .map(|_| {
            EfficiencyRecord::from_canonical(
                columns
                    .iter_mut()
                    .map(|values| values.next().unwrap_or_default())
                    .collect(),
            )
        })
        .collect()
}

/// Coerce a cell to a column kind.
///
/// Idempotent: `coerce(k, coerce(k, v)) == coerce(k, v)`.
pub fn coerce(kind: ColumnKind, value: Value) -> Value {
    match kind {
        ColumnKind::Number => Value::Number(match value {
            Value::Number(n) if n.is_finite() => n,
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .unwrap_or(0.0),
            _ => 0.0,
        }),
        ColumnKind::Text => Value::Text(match value {
            Value::Null => String::new(),
            Value::Number(n) => format_number(n),
            Value::Text(s) => s,
        }),
        ColumnKind::Flag => Value::Text(
            if is_truthy(&value) { FLAG_YES } else { FLAG_NO }.to_string(),
        ),
        ColumnKind::Date => Value::Text(match value {
            Value::Null => String::new(),
            Value::Number(n) => format_number(n),
            Value::Text(s) => match parse_date(&s) {
                Some(date) => date.format(DATE_FORMAT).to_string(),
                None => s,
            },
        }),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Number(n) => *n != 0.0,
        Value::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "yes" | "y" | "true" | "1"
        ),
    }
}

/// Parse a date cell, accepting a trailing time component.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidates = [Some(trimmed), trimmed.get(..10)];
    candidates.into_iter().flatten().find_map(|candidate| {
        DATE_INPUT_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(candidate, format).ok())
    })
}

fn split_legacy_period(week: Vec<Value>) -> (Vec<Value>, Vec<Value>) {
    week.into_iter()
        .map(|value| {
            let parsed = match &value {
                Value::Text(s) => parse_date(s),
                _ => None,
            };
            match parsed {
                Some(start) => {
                    let end = start
                        .checked_add_days(Days::new(PERIOD_LENGTH_DAYS))
                        .map(|d| d.format(DATE_FORMAT).to_string())
                        .unwrap_or_default();
                    (
                        Value::Text(start.format(DATE_FORMAT).to_string()),
                        Value::Text(end),
                    )
                }
                // Unparseable: keep what was there as the start, leave the end blank.
                None => (
                    coerce(ColumnKind::Date, value),
                    Value::Text(String::new()),
                ),
            }
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn legacy_table() -> RawTable {
        RawTable::from_rows(
            &[
                "Week",
                "Story_ID",
                "Developer_Name",
                "Team_Name",
                "Original_Estimate_Hours",
                "Copilot_Used",
                "Area_of_Efficiency",
                "Sentiment_Score",
            ],
            vec![
                vec![
                    text("2024-01-15"),
                    text("ENG-1001"),
                    text("Alice Johnson"),
                    text("Platform Team"),
                    Value::Number(8.0),
                    text("Yes"),
                    text("Debugging"),
                    Value::Number(0.7),
                ],
                vec![
                    text("2024-02-05 00:00:00"),
                    Value::Number(42.0),
                    text("Bob Smith"),
                    text("QA Team"),
                    text("3.5"),
                    Value::Null,
                    Value::Null,
                    Value::Null,
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_legacy_week_is_split() {
        let table = normalize(
            RawTable::from_rows(&["Week"], vec![vec![text("2024-01-15")]]).unwrap(),
        );
        assert!(!table.has_column(LEGACY_WEEK_COLUMN));
        assert_eq!(
            table.column(Column::WeekStart.name()).unwrap(),
            &[text("2024-01-15")]
        );
        assert_eq!(
            table.column(Column::WeekEnd.name()).unwrap(),
            &[text("2024-01-21")]
        );
    }

    #[test]
    fn test_normalize_yields_canonical_columns() {
        let table = normalize(legacy_table());
        assert!(is_canonical(&table));
        assert_eq!(table.row_count(), 2);
        assert!(!table.has_column("Sentiment_Score"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(legacy_table());
        let twice = normalize(once.clone());
        assert_eq!(once, twice);

        let empty_once = normalize(RawTable::empty());
        assert_eq!(normalize(empty_once.clone()), empty_once);
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let dataset = normalize_dataset(legacy_table());
        let second = &dataset.records()[1];
        assert_eq!(second.text(Column::WeekStart), "2024-02-05");
        assert_eq!(second.text(Column::WeekEnd), "2024-02-11");
        assert_eq!(second.text(Column::StoryId), "42");
        assert_eq!(second.number(Column::OriginalEstimateHours), 3.5);
        assert_eq!(second.number(Column::LinesOfCodeSaved), 0.0);
        assert_eq!(second.text(Column::CopilotUsed), "No");
        assert_eq!(second.text(Column::Technology), "");

        let first = &dataset.records()[0];
        assert_eq!(first.text(Column::AreasOfEfficiency), "Debugging");
        assert!(first.flag(Column::CopilotUsed));
    }

    #[test]
    fn test_week_dropped_when_start_present() {
        let table = RawTable::from_rows(
            &["Week", "Week_Start", "Week_End"],
            vec![vec![text("2023-01-02"), text("2024-01-15"), text("2024-01-21")]],
        )
        .unwrap();
        let table = normalize(table);
        assert_eq!(
            table.column(Column::WeekStart.name()).unwrap(),
            &[text("2024-01-15")]
        );
        assert!(!table.has_column(LEGACY_WEEK_COLUMN));
    }

    #[test]
    fn test_unparseable_week_is_kept_as_start() {
        let table = normalize(
            RawTable::from_rows(&["Week"], vec![vec![text("week 3")]]).unwrap(),
        );
        assert_eq!(
            table.column(Column::WeekStart.name()).unwrap(),
            &[text("week 3")]
        );
        assert_eq!(table.column(Column::WeekEnd.name()).unwrap(), &[text("")]);
    }

    #[test]
    fn test_rows_without_columns_get_defaults() {
        let mut table = RawTable::empty();
        table.set_row_count(3).unwrap();
        let dataset = normalize_dataset(table);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.records()[2], EfficiencyRecord::new());
    }

    #[test]
    fn test_renamed_columns_keep_every_row() {
        let table = normalize(
            RawTable::from_rows(
                &["Week", "Area_of_Efficiency", "Story_ID"],
                vec![
                    vec![text("2024-01-15"), text("Debugging"), text("ENG-1")],
                    vec![text("2024-01-22"), text("Test Writing"), text("ENG-2")],
                ],
            )
            .unwrap(),
        );
        assert_eq!(table.row_count(), 2);
        assert!(table.columns().iter().all(|c| c.values.len() == 2));
        assert_eq!(
            table.column(Column::AreasOfEfficiency.name()).unwrap(),
            &[text("Debugging"), text("Test Writing")]
        );
        assert_eq!(
            table.column(Column::WeekEnd.name()).unwrap(),
            &[text("2024-01-21"), text("2024-01-28")]
        );
    }

    #[test]
    fn test_coerce_is_idempotent() {
        let samples = [
            Value::Null,
            Value::Number(f64::NAN),
            Value::Number(2.0),
            text(" 7 "),
            text("TRUE"),
            text("no"),
            text("1/15/2024"),
            text("garbage"),
        ];
        for kind in [
            ColumnKind::Date,
            ColumnKind::Text,
            ColumnKind::Number,
            ColumnKind::Flag,
        ] {
            for sample in &samples {
                let once = coerce(kind, sample.clone());
                assert_eq!(coerce(kind, once.clone()), once, "{kind:?} {sample:?}");
            }
        }
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_date("2024-01-15"), expected);
        assert_eq!(parse_date("2024-01-15T08:30:00"), expected);
        assert_eq!(parse_date("01/15/2024"), expected);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("soon"), None);
    }
}
