// ********* Input data structures ***********

use chrono::NaiveDateTime;
use log::warn;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

/// The raw content of one answer cell, as delivered by the loader.
#[derive(PartialEq, Debug, Clone)]
pub enum CellValue {
    /// Nothing was written in the cell.
    Empty,
    /// Free text, as typed or selected in the form.
    Text(String),
    /// A cell that the spreadsheet already stores as a number.
    Number(f64),
}

impl CellValue {
    /// Empty cells and cells with only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// The textual rendering of the cell, used for the audit log and for
    /// program names. Blank cells have no rendering.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) if s.trim().is_empty() => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(format!("{}", n)),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> CellValue {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> CellValue {
        CellValue::Number(n)
    }
}

/// One survey submission.
///
/// The cells are positional: the n-th cell belongs to the n-th column of the
/// table that holds the row.
#[derive(PartialEq, Debug, Clone)]
pub struct ResponseRow {
    pub timestamp: Option<NaiveDateTime>,
    pub program: Option<String>,
    pub cells: Vec<CellValue>,
}

impl ResponseRow {
    pub fn cell(&self, position: usize) -> Option<&CellValue> {
        self.cells.get(position)
    }
}

/// A snapshot of the responses of one modality.
///
/// Column identifiers are unique within a table. The engine never mutates a
/// table: filtering produces a new one.
#[derive(PartialEq, Debug, Clone)]
pub struct ResponseTable {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
    rows: Vec<ResponseRow>,
    timestamp_column: Option<String>,
    program_column: Option<String>,
}

impl ResponseTable {
    pub fn new(columns: Vec<String>) -> Result<ResponseTable, ScoringError> {
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (idx, name) in columns.iter().enumerate() {
            if positions.insert(name.clone(), idx).is_some() {
                return Err(ScoringError::DuplicateColumn { name: name.clone() });
            }
        }
        Ok(ResponseTable {
            columns,
            positions,
            rows: Vec::new(),
            timestamp_column: None,
            program_column: None,
        })
    }

    pub fn set_timestamp_column(&mut self, name: &str) -> Result<(), ScoringError> {
        self.check_column(name)?;
        self.timestamp_column = Some(name.to_string());
        Ok(())
    }

    pub fn set_program_column(&mut self, name: &str) -> Result<(), ScoringError> {
        self.check_column(name)?;
        self.program_column = Some(name.to_string());
        Ok(())
    }

    fn check_column(&self, name: &str) -> Result<(), ScoringError> {
        if self.positions.contains_key(name) {
            Ok(())
        } else {
            Err(ScoringError::UnknownColumn {
                name: name.to_string(),
            })
        }
    }

    /// Adds a row. Rows shorter than the header are padded with empty cells
    /// (spreadsheet exports drop trailing blanks), longer rows are truncated.
    pub fn push_row(&mut self, mut row: ResponseRow) {
        let width = self.columns.len();
        if row.cells.len() > width {
            warn!(
                "push_row: row has {} cells for {} columns, dropping the extra cells",
                row.cells.len(),
                width
            );
            row.cells.truncate(width);
        }
        row.cells.resize(width, CellValue::Empty);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ResponseRow] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position_of(&self, column: &str) -> Option<usize> {
        self.positions.get(column).cloned()
    }

    pub fn timestamp_column(&self) -> Option<&str> {
        self.timestamp_column.as_deref()
    }

    pub fn program_column(&self) -> Option<&str> {
        self.program_column.as_deref()
    }

    /// A new table with the same layout, holding only the rows accepted by the predicate.
    pub fn filtered<F>(&self, keep: F) -> ResponseTable
    where
        F: Fn(&ResponseRow) -> bool,
    {
        ResponseTable {
            columns: self.columns.clone(),
            positions: self.positions.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
            timestamp_column: self.timestamp_column.clone(),
            program_column: self.program_column.clone(),
        }
    }
}

// ******** Output data structures *********

/// Statistics for one question (one column) of a section.
#[derive(PartialEq, Debug, Clone)]
pub struct QuestionAggregate {
    pub column: String,
    pub mean: Option<f64>,
    pub valid_count: u64,
}

/// Statistics for one section.
///
/// The mean is the flattened mean of every valid cell of the section: each
/// answered cell weighs the same, regardless of its row or column. It is `None`
/// when no valid value was found, which is different from a mean of zero.
#[derive(PartialEq, Debug, Clone)]
pub struct SectionAggregate {
    pub name: String,
    pub mean: Option<f64>,
    pub valid_count: u64,
    pub columns_used: usize,
    /// Rows with at least one valid value in the section.
    pub respondents: u64,
    pub missing_count: u64,
    pub unknown_count: u64,
    pub questions: Vec<QuestionAggregate>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct TableAggregate {
    pub modality: String,
    pub label: String,
    /// Rows that passed the row filter.
    pub total_rows: u64,
    pub mean: Option<f64>,
    pub sections: Vec<SectionAggregate>,
}

/// The institution-wide figure, combining several modalities.
#[derive(PartialEq, Debug, Clone)]
pub struct InstitutionSummary {
    pub mean: Option<f64>,
    pub total_rows: u64,
    pub sections_high: u32,
    pub sections_medium: u32,
    pub sections_low: u32,
    pub sections_without_data: u32,
}

/// The traffic-light reading of a section mean.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Semaphore {
    High,
    Medium,
    Low,
    NoData,
}

impl Semaphore {
    pub fn as_str(&self) -> &'static str {
        match self {
            Semaphore::High => "high",
            Semaphore::Medium => "medium",
            Semaphore::Low => "low",
            Semaphore::NoData => "noData",
        }
    }
}

/// Errors that prevent a report from being computed.
///
/// Missing or unmappable answers are not errors: they are absorbed by the
/// aggregation and show up in the counts and in the audit log.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ScoringError {
    /// The table is narrower than the layout declared for its schema version.
    LayoutMismatch {
        modality: String,
        schema_version: u32,
        expected_min: usize,
        actual: usize,
    },
    DuplicateColumn {
        name: String,
    },
    UnknownColumn {
        name: String,
    },
}

impl Error for ScoringError {}

impl Display for ScoringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringError::LayoutMismatch {
                modality,
                schema_version,
                expected_min,
                actual,
            } => write!(
                f,
                "modality {} (schema version {}) expects at least {} columns, the table has {}",
                modality, schema_version, expected_min, actual
            ),
            ScoringError::DuplicateColumn { name } => {
                write!(f, "duplicate column identifier {:?}", name)
            }
            ScoringError::UnknownColumn { name } => write!(f, "unknown column {:?}", name),
        }
    }
}

// ********* Configuration **********

/// The valid numeric range of a form's answers.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ScaleRange {
    ZeroToFive,
    OneToFive,
}

impl ScaleRange {
    pub fn min(&self) -> f64 {
        match self {
            ScaleRange::ZeroToFive => 0.0,
            ScaleRange::OneToFive => 1.0,
        }
    }

    pub fn max(&self) -> f64 {
        5.0
    }

    pub fn contains(&self, score: f64) -> bool {
        score >= self.min() && score <= self.max()
    }
}

/// A named group of questions, addressed by spreadsheet column labels.
/// Both ends are inclusive and may be given in any order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SectionRange {
    pub name: String,
    pub start: String,
    pub end: String,
}

/// The layout of one survey form family.
#[derive(PartialEq, Debug, Clone)]
pub struct ModalityDefinition {
    pub key: String,
    pub label: String,
    /// Incremented whenever the upstream form is restructured.
    pub schema_version: u32,
    /// The minimum table width expected for this schema version, if known.
    pub min_columns: Option<usize>,
    pub scale: ScaleRange,
    pub sections: Vec<SectionRange>,
}

impl ModalityDefinition {
    pub fn new(key: &str, label: &str) -> ModalityDefinition {
        ModalityDefinition {
            key: key.to_string(),
            label: label.to_string(),
            schema_version: 1,
            min_columns: None,
            scale: ScaleRange::ZeroToFive,
            sections: Vec::new(),
        }
    }

    pub fn section(mut self, name: &str, start: &str, end: &str) -> ModalityDefinition {
        self.sections.push(SectionRange {
            name: name.to_string(),
            start: start.to_string(),
            end: end.to_string(),
        });
        self
    }

    pub fn schema(mut self, version: u32, min_columns: Option<usize>) -> ModalityDefinition {
        self.schema_version = version;
        self.min_columns = min_columns;
        self
    }

    pub fn scale(mut self, scale: ScaleRange) -> ModalityDefinition {
        self.scale = scale;
        self
    }

    /// Checks that the table is wide enough for the declared schema version.
    ///
    /// Without a declared minimum, any width is accepted and sections that fall
    /// outside the table simply come out empty.
    pub fn check_layout(&self, table: &ResponseTable) -> Result<(), ScoringError> {
        match self.min_columns {
            Some(expected_min) if table.width() < expected_min => {
                Err(ScoringError::LayoutMismatch {
                    modality: self.key.clone(),
                    schema_version: self.schema_version,
                    expected_min,
                    actual: table.width(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Cut points of the traffic-light classification.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct SemaphoreThresholds {
    pub high: f64,
    pub medium: f64,
}

impl SemaphoreThresholds {
    pub const DEFAULT: SemaphoreThresholds = SemaphoreThresholds {
        high: 4.5,
        medium: 3.5,
    };

    pub fn classify(&self, mean: Option<f64>) -> Semaphore {
        match mean {
            None => Semaphore::NoData,
            Some(m) if m >= self.high => Semaphore::High,
            Some(m) if m >= self.medium => Semaphore::Medium,
            Some(_) => Semaphore::Low,
        }
    }
}

impl Default for SemaphoreThresholds {
    fn default() -> Self {
        SemaphoreThresholds::DEFAULT
    }
}
