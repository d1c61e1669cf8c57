// Primitives for reading CSV files.

use log::debug;
use snafu::prelude::*;

use survey_scoring::{CellValue, ResponseTable};

use crate::report::config_reader::FileSource;
use crate::report::io_common::build_table;
use crate::report::{BReportResult, CsvLineParseSnafu, CsvOpenSnafu, EmptyTableSnafu};

/// Reads a CSV export of a form. All the cells are read as text.
pub fn read_csv_table(path: &str, cfs: &FileSource) -> BReportResult<ResponseTable> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();

    let header: Vec<String> = records
        .next()
        .context(EmptyTableSnafu { path })?
        .context(CsvLineParseSnafu { path, lineno: 1usize })?
        .iter()
        .map(|s| s.to_string())
        .collect();
    debug!("read_csv_table: header: {:?}", header);

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        debug!("read_csv_table: lineno: {:?} row: {:?}", lineno, line);
        rows.push(line.iter().map(|s| CellValue::from(s.trim())).collect());
    }
    build_table(path, header, rows, cfs)
}
