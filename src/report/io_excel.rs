use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use log::{debug, warn};
use snafu::prelude::*;

use survey_scoring::{CellValue, ResponseTable};

use crate::report::config_reader::FileSource;
use crate::report::io_common::build_table;
use crate::report::{BReportResult, EmptyTableSnafu, OpeningExcelSnafu, ReportError};

/// Reads a worksheet of an Excel workbook, as exported by the forms.
pub fn read_excel_table(path: &str, cfs: &FileSource) -> BReportResult<ResponseTable> {
    let wrange = get_range(path, cfs)?;
    // Keep the column letters aligned when the used range does not start in A.
    let offset = wrange.start().map(|(_, c)| c as usize).unwrap_or(0);
    if offset > 0 {
        debug!("read_excel_table: range starts at column {}", offset);
    }

    let mut iter = wrange.rows();
    let header: Vec<String> = std::iter::repeat(String::new())
        .take(offset)
        .chain(
            iter.next()
                .context(EmptyTableSnafu { path })?
                .iter()
                .map(header_text),
        )
        .collect();
    debug!("read_excel_table: header: {:?}", header);

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    for (idx, row) in iter.enumerate() {
        debug!("read_excel_table: idx: {:?} row: {:?}", idx, row);
        let cells: Vec<CellValue> = std::iter::repeat(CellValue::Empty)
            .take(offset)
            .chain(row.iter().map(read_cell))
            .collect();
        rows.push(cells);
    }
    build_table(path, header, rows, cfs)
}

fn header_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn read_cell(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(s) if s.trim().is_empty() => CellValue::Empty,
        DataType::String(s) => CellValue::Text(s.trim().to_string()),
        DataType::Float(f) => CellValue::Number(*f),
        DataType::Int(i) => CellValue::Number(*i as f64),
        // Dates stay as spreadsheet serial numbers.
        DataType::DateTime(f) => CellValue::Number(*f),
        DataType::Bool(b) => CellValue::Text(b.to_string()),
        DataType::Empty => CellValue::Empty,
        other => {
            warn!("read_cell: unreadable cell {:?}", other);
            CellValue::Empty
        }
    }
}

fn get_range(path: &str, cfs: &FileSource) -> BReportResult<Range<DataType>> {
    debug!("get_range: path: {:?}", path);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    let mut candidates: Vec<String> = cfs.excel_worksheet_name.iter().cloned().collect();
    candidates.extend(cfs.excel_worksheet_aliases.clone().unwrap_or_default());
    if !candidates.is_empty() {
        for name in candidates.iter() {
            if let Some(wrange) = workbook.worksheet_range(name) {
                debug!("get_range: worksheet {:?}", name);
                return Ok(wrange.context(OpeningExcelSnafu { path })?);
            }
        }
        return Err(Box::new(ReportError::MissingWorksheet {
            path: path.to_string(),
            worksheet: candidates.join(" | "),
        }));
    }

    let all_worksheets = workbook.worksheets();
    match all_worksheets.as_slice() {
        [] => Err(Box::new(ReportError::EmptyTable {
            path: path.to_string(),
        })),
        [(name, wrange)] => {
            debug!("get_range: using the only worksheet {:?}", name);
            Ok(wrange.clone())
        }
        _ => Err(Box::new(ReportError::AmbiguousWorksheet {
            path: path.to_string(),
            names: all_worksheets.iter().map(|(n, _)| n.clone()).collect(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells() {
        assert_eq!(read_cell(&DataType::String("  ".to_string())), CellValue::Empty);
        assert_eq!(
            read_cell(&DataType::String(" Siempre ".to_string())),
            CellValue::Text("Siempre".to_string())
        );
        assert_eq!(read_cell(&DataType::Int(4)), CellValue::Number(4.0));
        assert_eq!(read_cell(&DataType::Float(3.0)), CellValue::Number(3.0));
        assert_eq!(
            read_cell(&DataType::DateTime(45731.5)),
            CellValue::Number(45731.5)
        );
        assert_eq!(read_cell(&DataType::Empty), CellValue::Empty);
        assert_eq!(header_text(&DataType::Empty), "");
        assert_eq!(header_text(&DataType::Int(3)), "3");
    }
}
