pub use crate::config::*;
use chrono::NaiveDateTime;

/// A builder for response tables.
///
/// The loaders use it to assemble a table row by row; it is also the
/// simplest way to put a table together by hand.
///
/// ```
/// use survey_scoring::builder::TableBuilder;
/// use survey_scoring::*;
///
/// let mut builder = TableBuilder::new(&["Marca temporal", "Carrera", "P1", "P2"])?
///     .program_column("Carrera")?;
///
/// builder.add_text_row(&["", "Derecho", "Siempre", "5 - Excelente"]);
/// builder.add_text_row(&["", "Derecho", "Casi nunca", ""]);
///
/// let table = builder.build();
/// let modality = ModalityDefinition::new("virtual", "Virtual").section("Aprendizaje", "C", "D");
/// let dictionary = ScaleDictionary::standard();
/// let mut audit = ConversionAuditLog::new();
/// let res = SectionAggregator::new(&dictionary, &mut audit)
///     .aggregate_table(&table, &modality, &all_rows);
///
/// assert_eq!(res.sections[0].valid_count, 3);
/// assert_eq!(res.sections[0].mean, Some(4.0));
/// # Ok::<(), ScoringError>(())
/// ```
pub struct TableBuilder {
    table: ResponseTable,
}

impl TableBuilder {
    pub fn new(columns: &[&str]) -> Result<TableBuilder, ScoringError> {
        Ok(TableBuilder {
            table: ResponseTable::new(columns.iter().map(|s| s.to_string()).collect())?,
        })
    }

    pub fn from_columns(columns: Vec<String>) -> Result<TableBuilder, ScoringError> {
        Ok(TableBuilder {
            table: ResponseTable::new(columns)?,
        })
    }

    /// Declares the column that holds the submission time.
    pub fn timestamp_column(mut self, name: &str) -> Result<TableBuilder, ScoringError> {
        self.table.set_timestamp_column(name)?;
        Ok(self)
    }

    /// Declares the column that holds the program (career) of the respondent.
    /// The program of each row is read from this column when the row is added.
    pub fn program_column(mut self, name: &str) -> Result<TableBuilder, ScoringError> {
        self.table.set_program_column(name)?;
        Ok(self)
    }

    /// Adds a row of text cells. Empty strings are empty cells.
    pub fn add_text_row(&mut self, cells: &[&str]) {
        self.add_row(cells.iter().map(|s| CellValue::from(*s)).collect(), None)
    }

    /// Adds a row, with the timestamp already parsed by the caller.
    pub fn add_row(&mut self, cells: Vec<CellValue>, timestamp: Option<NaiveDateTime>) {
        let program = self
            .table
            .program_column()
            .and_then(|c| self.table.position_of(c))
            .and_then(|p| cells.get(p))
            .and_then(|c| c.to_text())
            .map(|s| s.trim().to_string());
        self.table.push_row(ResponseRow {
            timestamp,
            program,
            cells,
        });
    }

    pub fn build(self) -> ResponseTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_is_read_from_its_column() {
        let mut b = TableBuilder::new(&["Carrera", "P1"])
            .unwrap()
            .program_column("Carrera")
            .unwrap();
        b.add_text_row(&[" Derecho ", "5"]);
        b.add_text_row(&["", "4"]);
        let t = b.build();
        assert_eq!(t.rows()[0].program.as_deref(), Some("Derecho"));
        assert_eq!(t.rows()[1].program, None);
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let res = TableBuilder::new(&["P1"]).unwrap().timestamp_column("Fecha");
        assert!(matches!(res, Err(ScoringError::UnknownColumn { .. })));
    }
}
