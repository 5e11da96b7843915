//! The tabular data model for efficiency records.
//!
//! Two shapes exist. A [`RawTable`] is whatever came off storage: any set of
//! named columns in any order, possibly from an older schema. An
//! [`EfficiencyDataset`] is the normalized form: every [`EfficiencyRecord`]
//! carries exactly the canonical [`Column`] set, in canonical order.
//! [`crate::schema::normalize`] turns the first into the second.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::schema::coerce;
use crate::Result;

/// How a column's values are typed and defaulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Calendar date rendered as `YYYY-MM-DD`. Defaults to empty text.
    Date,
    /// Free or categorical text. Defaults to empty text.
    Text,
    /// Numeric measure. Defaults to `0`.
    Number,
    /// Yes/No flag. Defaults to `"No"`.
    Flag,
}

impl ColumnKind {
    /// The value a missing cell of this kind is filled with.
    pub fn default_value(self) -> Value {
        match self {
            ColumnKind::Date | ColumnKind::Text => Value::Text(String::new()),
            ColumnKind::Number => Value::Number(0.0),
            ColumnKind::Flag => Value::Text(FLAG_NO.to_string()),
        }
    }
}

/// Canonical text of a set flag.
pub const FLAG_YES: &str = "Yes";

/// Canonical text of a cleared flag.
pub const FLAG_NO: &str = "No";

macro_rules! define_columns {
    ($($(#[$meta:meta])* $variant:ident => ($name:literal, $kind:ident)),+ $(,)?) => {
        /// A column of the canonical efficiency-records schema.
        ///
        /// Declaration order is the canonical column order.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Column {
            $($(#[$meta])* $variant),+
        }

        impl Column {
            /// Every canonical column, in canonical order.
            pub const ALL: &'static [Column] = &[$(Column::$variant),+];

            /// The header name stored on disk.
            pub fn name(self) -> &'static str {
                match self {
                    $(Column::$variant => $name),+
                }
            }

            /// The value kind of this column.
            pub fn kind(self) -> ColumnKind {
                match self {
                    $(Column::$variant => ColumnKind::$kind),+
                }
            }

            /// Look up a canonical column by its header name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Column::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

define_columns! {
    /// First day of the reporting period.
    WeekStart => ("Week_Start", Date),
    /// Last day of the reporting period.
    WeekEnd => ("Week_End", Date),
    /// Record (story/ticket) identifier. Not unique.
    StoryId => ("Story_ID", Text),
    DeveloperName => ("Developer_Name", Text),
    TeamName => ("Team_Name", Text),
    /// Baseline estimate without assistance.
    OriginalEstimateHours => ("Original_Estimate_Hours", Number),
    /// Hours saved against the baseline.
    EfficiencyGainedHours => ("Efficiency_Gained_Hours", Number),
    LinesOfCodeSaved => ("Lines_of_Code_Saved", Number),
    ReviewTimeSavedHours => ("Review_Time_Saved_Hours", Number),
    /// Satisfaction rating 1 to 5; 0 means not rated.
    SubjectiveEaseRating => ("Subjective_Ease_Rating", Number),
    /// Whether an assistance tool was used.
    CopilotUsed => ("Copilot_Used", Flag),
    Category => ("Category", Text),
    Technology => ("Technology", Text),
    TaskType => ("Task_Type", Text),
    /// Kind of assistance (inline suggestion, chat, ...).
    CompletionType => ("Completion_Type", Text),
    /// Comma-separated efficiency areas.
    AreasOfEfficiency => ("Areas_of_Efficiency", Text),
    BugsPrevented => ("Bugs_Prevented", Flag),
    PrMerged => ("PR_Merged", Flag),
    NotesObservations => ("Notes_Observations", Text),
}

impl Column {
    /// Position of this column in canonical order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Columns that must be populated for a record to be accepted.
    pub const IDENTIFYING: &'static [Column] = &[
        Column::WeekStart,
        Column::WeekEnd,
        Column::StoryId,
        Column::DeveloperName,
        Column::TeamName,
    ];

    /// Canonical header names, in order.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.name()).collect()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single scalar cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing cell. Never present after normalization.
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    /// Text content, if this is a text cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content, if this is a number cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// True for null cells and blank text.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::Number(_) => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Text(if b { FLAG_YES } else { FLAG_NO }.to_string())
    }
}

/// Render a number the way it reads in a spreadsheet: integers without `.0`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// A named column of raw cells.
#[derive(Clone, Debug, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<Value>,
}

/// A table as loaded from storage, before schema normalization.
///
/// Columns keep the order they had on disk. All columns have the same
/// number of cells.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<RawColumn>,
    row_count: usize,
}

impl RawTable {
    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from a header and row-major cells.
    pub fn from_rows(header: &[&str], rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut columns: Vec<RawColumn> = header
            .iter()
            .map(|name| RawColumn {
                name: (*name).to_string(),
                values: Vec::with_capacity(rows.len()),
            })
            .collect();
        let row_count = rows.len();
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != header.len() {
                return Err(TrackerError::validation(format!(
                    "Row {i} has {} cells, header has {}",
                    row.len(),
                    header.len()
                )));
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.values.push(value);
            }
        }
        Ok(Self { columns, row_count })
    }

    /// Append a column. The first column fixes the row count.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if self.columns.is_empty() {
            self.row_count = values.len();
        } else if values.len() != self.row_count {
            return Err(TrackerError::validation(format!(
                "Column '{name}' has {} cells, table has {} rows",
                values.len(),
                self.row_count
            )));
        }
        self.columns.push(RawColumn { name, values });
        Ok(())
    }

    /// Remove and return the first column with this name.
    pub fn remove_column(&mut self, name: &str) -> Option<Vec<Value>> {
        let pos = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(pos).values)
    }

    /// Cells of the first column with this name.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Header names in stored order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<RawColumn> {
        self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Set the row count of a table that has no columns yet.
    ///
    /// A Parquet file can carry rows with zero columns; this keeps that
    /// count so defaults are filled for every row.
    pub fn set_row_count(&mut self, rows: usize) -> Result<()> {
        if !self.columns.is_empty() && rows != self.row_count {
            return Err(TrackerError::Internal {
                message: "Cannot change the row count of a populated table".to_string(),
            });
        }
        self.row_count = rows;
        Ok(())
    }
}

/// Field updates for [`EfficiencyRecord::merge`], keyed by column.
pub type FieldUpdates = std::collections::BTreeMap<Column, Value>;

/// One normalized row of the efficiency dataset.
///
/// Always holds exactly one value per canonical column, coerced to the
/// column's kind. There is no way to construct a record in legacy shape.
#[derive(Clone, Debug, PartialEq)]
pub struct EfficiencyRecord {
    values: Vec<Value>,
}

impl Default for EfficiencyRecord {
    fn default() -> Self {
        Self {
            values: Column::ALL.iter().map(|c| c.kind().default_value()).collect(),
        }
    }
}

impl EfficiencyRecord {
    /// A record with every field at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap values that are already canonical and coerced.
    pub(crate) fn from_canonical(values: Vec<Value>) -> Self {
        debug_assert_eq!(values.len(), Column::ALL.len());
        Self { values }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, column: Column, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a field, coercing the value to the column's kind.
    pub fn set(&mut self, column: Column, value: impl Into<Value>) {
        self.values[column.index()] = coerce(column.kind(), value.into());
    }

    /// Apply every update in `fields`.
    pub fn merge(&mut self, fields: &FieldUpdates) {
        for (column, value) in fields {
            self.set(*column, value.clone());
        }
    }

    pub fn get(&self, column: Column) -> &Value {
        &self.values[column.index()]
    }

    /// Text of a field; numbers are rendered as text.
    pub fn text(&self, column: Column) -> String {
        self.get(column).to_string()
    }

    /// Numeric value of a field; non-numeric fields read as 0.
    pub fn number(&self, column: Column) -> f64 {
        self.get(column).as_f64().unwrap_or(0.0)
    }

    /// Whether a flag field is set.
    pub fn flag(&self, column: Column) -> bool {
        self.get(column).as_str() == Some(FLAG_YES)
    }

    /// Values in canonical column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// `(column, value)` pairs in canonical order.
    pub fn fields(&self) -> impl Iterator<Item = (Column, &Value)> {
        Column::ALL.iter().copied().zip(self.values.iter())
    }

    /// Minimum shape checks applied before a record is stored.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = Column::IDENTIFYING
            .iter()
            .filter(|c| self.get(**c).is_blank())
            .map(|c| c.name())
            .collect();
        if !missing.is_empty() {
            return Err(TrackerError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        for column in [
            Column::OriginalEstimateHours,
            Column::EfficiencyGainedHours,
            Column::LinesOfCodeSaved,
            Column::ReviewTimeSavedHours,
        ] {
            if self.number(column) < 0.0 {
                return Err(TrackerError::validation(format!(
                    "{column} must not be negative"
                )));
            }
        }

        let rating = self.number(Column::SubjectiveEaseRating);
        if rating != 0.0 && !(1.0..=5.0).contains(&rating) {
            return Err(TrackerError::validation(format!(
                "{} must be between 1 and 5, got {}",
                Column::SubjectiveEaseRating,
                format_number(rating)
            )));
        }
        Ok(())
    }
}

/// The normalized efficiency dataset: records in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EfficiencyDataset {
    records: Vec<EfficiencyRecord>,
}

impl EfficiencyDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[EfficiencyRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<EfficiencyRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: EfficiencyRecord) {
        self.records.push(record);
    }

    pub fn get(&self, index: usize) -> Option<&EfficiencyRecord> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut EfficiencyRecord> {
        self.records.get_mut(index)
    }

    /// Remove the record at `index`, or fail with `OutOfRange`.
    pub fn remove(&mut self, index: usize) -> Result<EfficiencyRecord> {
        if index >= self.records.len() {
            return Err(TrackerError::OutOfRange {
                index,
                len: self.records.len(),
            });
        }
        Ok(self.records.remove(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EfficiencyRecord> {
        self.records.iter()
    }

    /// Records whose `column` text equals `value`.
    pub fn filter_by(&self, column: Column, value: &str) -> EfficiencyDataset {
        self.records
            .iter()
            .filter(|r| r.get(column).as_str() == Some(value))
            .cloned()
            .collect()
    }

    /// The dataset as a canonical column-major table.
    pub fn to_table(&self) -> RawTable {
        let columns = Column::ALL
            .iter()
            .map(|column| RawColumn {
                name: column.name().to_string(),
                values: self
                    .records
                    .iter()
                    .map(|r| r.get(*column).clone())
                    .collect(),
            })
            .collect();
        RawTable {
            columns,
            row_count: self.records.len(),
        }
    }
}

impl FromIterator<EfficiencyRecord> for EfficiencyDataset {
    fn from_iter<I: IntoIterator<Item = EfficiencyRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<EfficiencyRecord>> for EfficiencyDataset {
    fn from(records: Vec<EfficiencyRecord>) -> Self {
        Self { records }
    }
}

impl<'a> IntoIterator for &'a EfficiencyDataset {
    type Item = &'a EfficiencyRecord;
    type IntoIter = std::slice::Iter<'a, EfficiencyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
