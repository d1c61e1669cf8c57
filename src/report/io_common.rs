use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use snafu::prelude::*;
use std::collections::HashSet;
use std::path::Path;

use survey_scoring::builder::TableBuilder;
use survey_scoring::columns::label_of;
use survey_scoring::{Application, CellValue, ResponseTable};

use crate::report::config_reader::FileSource;
use crate::report::{BReportResult, ReportResult, ScoringSnafu};

/// The timestamp column of the spreadsheets exported from the forms.
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "Marca temporal";
/// The program (career) column of the forms.
pub const DEFAULT_PROGRAM_COLUMN: &str = "Carrera de procedencia";

const DATETIME_FORMATS: [&str; 6] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Makes the names of the header unique.
///
/// The first occurrence keeps its name, the following ones get a `_2`, `_3`...
/// suffix. Empty headers are named after their column letter, `(D)`, and
/// that name goes through the same check as the others.
pub fn disambiguate_headers(raw: &[String]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut res: Vec<String> = Vec::with_capacity(raw.len());
    for (idx, name) in raw.iter().enumerate() {
        let clean = name.trim_start_matches('\u{feff}').trim();
        let base = if clean.is_empty() {
            format!("({})", label_of(idx))
        } else {
            clean.to_string()
        };
        let mut candidate = base.clone();
        let mut k = 2;
        while used.contains(&candidate) {
            candidate = format!("{}_{}", base, k);
            k += 1;
        }
        if candidate != base {
            debug!(
                "disambiguate_headers: column {} renamed {:?}",
                label_of(idx),
                candidate
            );
        }
        used.insert(candidate.clone());
        res.push(candidate);
    }
    res
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// Spreadsheet dates are stored as a number of days since 1899-12-30.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_465.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let secs = (serial * 86400.0).round() as i64;
    base.checked_add_signed(Duration::seconds(secs))
}

pub fn cell_timestamp(cell: &CellValue) -> Option<NaiveDateTime> {
    match cell {
        CellValue::Empty => None,
        CellValue::Text(s) => parse_timestamp(s),
        CellValue::Number(x) => excel_serial_to_datetime(*x),
    }
}

pub fn cell_date(cell: &CellValue) -> Option<NaiveDate> {
    cell_timestamp(cell).map(|ts| ts.date())
}

// The declared column, or the default one when the table has it.
fn pick_column(
    columns: &[String],
    declared: &Option<String>,
    default: &str,
    path: &str,
) -> Option<String> {
    match declared {
        Some(name) if columns.contains(name) => Some(name.clone()),
        Some(name) => {
            warn!(
                "pick_column: {}: column {:?} not found in the header",
                simplify_file_name(path),
                name
            );
            None
        }
        None if columns.iter().any(|c| c == default) => Some(default.to_string()),
        None => None,
    }
}

/// Turns the raw grid of a spreadsheet into a response table.
///
/// The first line is the header. The timestamps are read from the timestamp
/// column, either as text or as spreadsheet dates.
pub fn build_table(
    path: &str,
    header: Vec<String>,
    rows: Vec<Vec<CellValue>>,
    cfs: &FileSource,
) -> BReportResult<ResponseTable> {
    let columns = disambiguate_headers(&header);
    let ts_column = pick_column(
        &columns,
        &cfs.timestamp_column,
        DEFAULT_TIMESTAMP_COLUMN,
        path,
    );
    let program_column = pick_column(&columns, &cfs.program_column, DEFAULT_PROGRAM_COLUMN, path);

    let mut builder = TableBuilder::from_columns(columns.clone()).context(ScoringSnafu { path })?;
    if let Some(c) = ts_column.as_ref() {
        builder = builder.timestamp_column(c).context(ScoringSnafu { path })?;
    }
    if let Some(c) = program_column.as_ref() {
        builder = builder.program_column(c).context(ScoringSnafu { path })?;
    }
    let ts_pos = ts_column
        .as_ref()
        .and_then(|c| columns.iter().position(|x| x == c));

    let mut unreadable_timestamps = 0;
    for row in rows.into_iter() {
        if row.iter().all(|c| c.is_blank()) {
            continue;
        }
        let ts_cell = ts_pos.and_then(|p| row.get(p));
        let ts = ts_cell.and_then(cell_timestamp);
        if ts.is_none() && ts_cell.map_or(false, |c| !c.is_blank()) {
            unreadable_timestamps += 1;
        }
        builder.add_row(row, ts);
    }
    if unreadable_timestamps > 0 {
        warn!(
            "build_table: {}: {} timestamps could not be read",
            simplify_file_name(path),
            unreadable_timestamps
        );
    }
    let table = builder.build();
    info!(
        "build_table: {}: {} rows, {} columns, timestamp column {:?}, program column {:?}",
        simplify_file_name(path),
        table.len(),
        table.width(),
        ts_column,
        program_column
    );
    Ok(table)
}

fn text_at(table: &ResponseTable, row: usize, column: Option<usize>) -> Option<String> {
    column
        .and_then(|p| table.rows()[row].cell(p))
        .and_then(|c| c.to_text())
        .map(|s| s.trim().to_string())
}

/// Reads the applications sheet.
///
/// The sheet has the columns `aplicacion_id`, `descripcion`, `formulario`,
/// `fecha_inicio` and `fecha_fin`. Lines without a form are skipped.
pub fn applications_from_table(table: &ResponseTable) -> ReportResult<Vec<Application>> {
    let id_pos = table.position_of("aplicacion_id");
    let desc_pos = table.position_of("descripcion");
    let start_pos = table.position_of("fecha_inicio");
    let end_pos = table.position_of("fecha_fin");
    let form_pos = match table.position_of("formulario") {
        Some(p) => p,
        None => whatever!(
            "The applications sheet has no 'formulario' column, found {:?}",
            table.columns()
        ),
    };
    let mut res: Vec<Application> = Vec::new();
    for (idx, row) in table.rows().iter().enumerate() {
        let form = match text_at(table, idx, Some(form_pos)) {
            Some(f) if !f.is_empty() => f,
            _ => {
                debug!("applications_from_table: line {} has no form", idx + 2);
                continue;
            }
        };
        let app = Application {
            id: text_at(table, idx, id_pos).unwrap_or_default(),
            description: text_at(table, idx, desc_pos).unwrap_or_default(),
            form,
            start: start_pos.and_then(|p| row.cell(p)).and_then(cell_date),
            end: end_pos.and_then(|p| row.cell(p)).and_then(cell_date),
        };
        debug!("applications_from_table: {:?}", app);
        res.push(app);
    }
    info!("applications_from_table: {} applications", res.len());
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn source() -> FileSource {
        FileSource {
            modality: "prepa".to_string(),
            provider: "csv".to_string(),
            file_path: "prepa.csv".to_string(),
            excel_worksheet_name: None,
            excel_worksheet_aliases: None,
            timestamp_column: None,
            program_column: None,
            form: None,
        }
    }

    #[test]
    fn duplicate_headers() {
        let res = disambiguate_headers(&strings(&["\u{feff}Marca temporal", "P", "P", "", "P"]));
        assert_eq!(
            res,
            strings(&["Marca temporal", "P", "P_2", "(D)", "P_3"])
        );
        let res = disambiguate_headers(&strings(&["X", "X_2", "X"]));
        assert_eq!(res, strings(&["X", "X_2", "X_3"]));
        let res = disambiguate_headers(&strings(&["(B)", ""]));
        assert_eq!(res, strings(&["(B)", "(B)_2"]));
        let res = disambiguate_headers(&strings(&["A", "", "(B)"]));
        assert_eq!(res, strings(&["A", "(B)", "(B)_2"]));
    }

    #[test]
    fn timestamps() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("15/03/2025 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-15 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-03-15T10:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("15/03/2025"),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("mañana"), None);
        // 2025-03-15 12:00
        assert_eq!(
            excel_serial_to_datetime(45731.5),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap().and_hms_opt(12, 0, 0)
        );
        assert_eq!(excel_serial_to_datetime(f64::NAN), None);
        assert_eq!(
            cell_date(&CellValue::Number(45731.0)),
            NaiveDate::from_ymd_opt(2025, 3, 15)
        );
    }

    #[test]
    fn default_columns() {
        let header = strings(&["Marca temporal", "Carrera de procedencia", "P1"]);
        let rows = vec![
            vec![
                CellValue::from("15/03/2025 10:30:00"),
                CellValue::from("Derecho"),
                CellValue::from("Siempre"),
            ],
            vec![CellValue::Empty, CellValue::Empty, CellValue::Empty],
            vec![
                CellValue::from("pronto"),
                CellValue::from("Psicología"),
                CellValue::from("Nunca"),
            ],
        ];
        let table = build_table("a/b/prepa.csv", header, rows, &source()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.timestamp_column(), Some("Marca temporal"));
        assert_eq!(table.program_column(), Some("Carrera de procedencia"));
        assert!(table.rows()[0].timestamp.is_some());
        assert_eq!(table.rows()[1].timestamp, None);
        assert_eq!(table.rows()[1].program.as_deref(), Some("Psicología"));
    }

    #[test]
    fn missing_declared_column() {
        let mut cfs = source();
        cfs.timestamp_column = Some("Fecha".to_string());
        let table = build_table("prepa.csv", strings(&["P1"]), vec![], &cfs).unwrap();
        assert_eq!(table.timestamp_column(), None);
        assert!(table.is_empty());
    }

    #[test]
    fn applications() {
        let header = strings(&[
            "aplicacion_id",
            "descripcion",
            "formulario",
            "fecha_inicio",
            "fecha_fin",
        ]);
        let rows = vec![
            vec![
                CellValue::from("2025-1"),
                CellValue::from("Primavera"),
                CellValue::from("Preparatoria"),
                CellValue::from("2025-03-01"),
                CellValue::Number(45747.0),
            ],
            vec![
                CellValue::from("2025-2"),
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Empty,
            ],
        ];
        let table = build_table("aplicaciones.csv", header, rows, &source()).unwrap();
        let apps = applications_from_table(&table).unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].id, "2025-1");
        assert_eq!(apps[0].form, "Preparatoria");
        assert_eq!(apps[0].start, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(apps[0].end, NaiveDate::from_ymd_opt(2025, 3, 31));

        let table = build_table("x.csv", strings(&["aplicacion_id"]), vec![], &source()).unwrap();
        assert!(applications_from_table(&table).is_err());
    }
}
