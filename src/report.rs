use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::NaiveDate;
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use survey_scoring::scope::{apply, programs, select_applications};
use survey_scoring::*;

use crate::report::cache::TableCache;
use crate::report::config_reader::*;
use crate::report::io_common::{applications_from_table, parse_date, simplify_file_name};

pub mod cache;
pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod presets;

#[derive(Debug, Snafu)]
pub enum ReportError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook {path} has no worksheet named {worksheet}"))]
    MissingWorksheet { path: String, worksheet: String },
    #[snafu(display(
        "The workbook {path} has several worksheets {names:?}, the worksheet name must be provided"
    ))]
    AmbiguousWorksheet { path: String, names: Vec<String> },
    #[snafu(display("The file {path} has no header"))]
    EmptyTable { path: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading CSV file {path} at line {lineno}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Field {field}: expected a number or a column letter, found {value}"))]
    ParsingJsonNumber { field: String, value: String },
    #[snafu(display(
        "Unknown view {view:?}, expected institutional, academicDirection or director"
    ))]
    UnknownView { view: String },
    #[snafu(display("Unknown scale {scale:?}, expected zeroToFive or oneToFive"))]
    UnknownScale { scale: String },
    #[snafu(display("Source {path} refers to the unknown modality {modality:?}"))]
    UnknownModality { modality: String, path: String },
    #[snafu(display("Provider {provider:?} is not supported, expected xlsx or csv"))]
    UnknownProvider { provider: String },
    #[snafu(display("No data source in the configuration"))]
    NoSources {},
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("Invalid table in {path}: {source}"))]
    Scoring { source: ScoringError, path: String },
    #[snafu(display("Error writing {path}"))]
    Writing {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing the audit log {path}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display("Difference detected between the computed summary and the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;
/// The errors are boxed to keep the results small.
pub type BReportResult<T> = Result<T, Box<ReportError>>;

/// Values from the command line. They take precedence over the configuration.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Overrides {
    pub out: Option<String>,
    pub audit_out: Option<String>,
    pub view: Option<String>,
    pub program: Option<String>,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub application: Option<String>,
    pub year: Option<i32>,
}

// The scope of the run, once the configuration and the command line are merged.
#[derive(Debug, Clone)]
struct RunScope {
    view: View,
    view_name: String,
    program: Option<String>,
    date_start: Option<NaiveDate>,
    date_end: Option<NaiveDate>,
    application: Option<String>,
    year: Option<i32>,
}

impl RunScope {
    fn has_explicit_dates(&self) -> bool {
        self.date_start.is_some() || self.date_end.is_some()
    }

    fn to_scope(&self, dates: DateFilter) -> Scope {
        let scope = match (self.view, self.program.as_deref()) {
            (View::Institutional, _) => Scope::institutional(),
            (View::AcademicDirection, p) => Scope::academic_direction(p),
            (View::Director, Some(p)) => Scope::director(p),
            // No program: nothing can be shown.
            (View::Director, None) => Scope {
                view: View::Director,
                program: None,
                dates: DateFilter::Any,
            },
        };
        scope.with_dates(dates)
    }
}

fn parse_view(s: &str) -> ReportResult<View> {
    match s {
        "institutional" => Ok(View::Institutional),
        "academicDirection" => Ok(View::AcademicDirection),
        "director" => Ok(View::Director),
        x => UnknownViewSnafu { view: x }.fail(),
    }
}

// Invalid dates are ignored: the report covers all the dates.
fn read_date(field: &str, s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let res = parse_date(s);
    if res.is_none() {
        warn!("read_date: {}: could not read the date {:?}, ignoring it", field, s);
    }
    res
}

fn resolve_scope(config: &ReportConfig, ov: &Overrides) -> ReportResult<RunScope> {
    let from_config = config.scope.clone().unwrap_or_default();
    let view_name = ov
        .view
        .clone()
        .or(from_config.view)
        .unwrap_or_else(|| "institutional".to_string());
    let view = parse_view(&view_name)?;
    let program = ov
        .program
        .clone()
        .or(from_config.program)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    let start_s = ov.date_start.clone().or(from_config.date_start);
    let end_s = ov.date_end.clone().or(from_config.date_end);
    let res = RunScope {
        view,
        view_name,
        program,
        date_start: read_date("dateStart", start_s.as_deref()),
        date_end: read_date("dateEnd", end_s.as_deref()),
        application: ov.application.clone().or(from_config.application_id),
        year: ov.year.or(from_config.year),
    };
    if res.view == View::Director && res.program.is_none() {
        warn!("resolve_scope: the director view requires a program, no response will be shown");
    }
    info!("resolve_scope: {:?}", res);
    Ok(res)
}

fn resolve_modalities(config: &ReportConfig) -> BReportResult<Vec<ModalityDefinition>> {
    match config.modalities.as_ref() {
        Some(ms) if !ms.is_empty() => {
            let res = ms
                .iter()
                .map(|m| m.to_definition())
                .collect::<ReportResult<Vec<ModalityDefinition>>>()?;
            Ok(res)
        }
        _ => {
            info!("resolve_modalities: using the built-in modalities");
            Ok(presets::builtin_modalities())
        }
    }
}

/// Reads the data sources, keeping the tables in a cache.
pub struct Loader {
    root: PathBuf,
    cache: TableCache,
}

impl Loader {
    pub fn new(root: &Path, cache: TableCache) -> Loader {
        Loader {
            root: root.to_path_buf(),
            cache,
        }
    }

    pub fn resolve(&self, file_path: &str) -> String {
        let p: PathBuf = [self.root.clone(), PathBuf::from(file_path)].iter().collect();
        p.as_path().display().to_string()
    }

    pub fn load(&mut self, cfs: &FileSource) -> BReportResult<Rc<ResponseTable>> {
        let path = self.resolve(&cfs.file_path);
        let key = cfs.cache_key(&path);
        info!("Attempting to read file {:?}", path);
        self.cache.get_or_load(&key, || match cfs.provider.as_str() {
            "xlsx" | "msforms" => io_excel::read_excel_table(&path, cfs),
            "csv" => io_csv::read_csv_table(&path, cfs),
            x => Err(Box::new(ReportError::UnknownProvider {
                provider: x.to_string(),
            })),
        })
    }

    /// Drops the cached table of the source, which will be read again.
    pub fn invalidate(&mut self, cfs: &FileSource) -> bool {
        let key = cfs.cache_key(&self.resolve(&cfs.file_path));
        self.cache.invalidate(&key)
    }

    pub fn cached_tables(&self) -> usize {
        self.cache.len()
    }

    /// Loads the responses of a source and checks them against the layout of
    /// the modality. A table that does not fit is not kept in the cache.
    pub fn load_checked(
        &mut self,
        cfs: &FileSource,
        modality: &ModalityDefinition,
    ) -> BReportResult<Rc<ResponseTable>> {
        let table = self.load(cfs)?;
        let layout = modality.check_layout(&table);
        if layout.is_err() {
            self.invalidate(cfs);
        }
        layout.context(ScoringSnafu {
            path: cfs.file_path.clone(),
        })?;
        Ok(table)
    }
}

fn load_applications(loader: &mut Loader, config: &ReportConfig) -> BReportResult<Vec<Application>> {
    match config.applications.as_ref() {
        Some(src) => {
            let cfs = src.to_file_source();
            let table = loader.load(&cfs)?;
            let res = applications_from_table(&table)?;
            // Only read once per run.
            loader.invalidate(&cfs);
            Ok(res)
        }
        None => Ok(Vec::new()),
    }
}

// The name of the form in the applications sheet.
fn form_of(cfs: &FileSource) -> String {
    cfs.form
        .clone()
        .or_else(|| presets::default_form(&cfs.modality).map(|s| s.to_string()))
        .unwrap_or_else(|| cfs.modality.clone())
}

fn date_filter_for(scope: &RunScope, applications: &[Application], cfs: &FileSource) -> DateFilter {
    if scope.has_explicit_dates() {
        DateFilter::between(scope.date_start, scope.date_end)
    } else {
        select_applications(
            applications,
            &form_of(cfs),
            scope.year,
            scope.application.as_deref(),
        )
    }
}

fn round_js(x: Option<f64>, places: u32) -> JSValue {
    match x {
        Some(v) => {
            let f = 10f64.powi(places as i32);
            json!((v * f).round() / f)
        }
        None => JSValue::Null,
    }
}

fn section_to_json(s: &SectionAggregate, thresholds: &SemaphoreThresholds, places: u32) -> JSValue {
    let questions: Vec<JSValue> = s
        .questions
        .iter()
        .map(|q| {
            json!({
                "column": q.column,
                "mean": round_js(q.mean, places),
                "validCount": q.valid_count,
            })
        })
        .collect();
    json!({
        "section": s.name,
        "mean": round_js(s.mean, places),
        "validCount": s.valid_count,
        "columnsUsed": s.columns_used,
        "respondents": s.respondents,
        "semaphore": thresholds.classify(s.mean).as_str(),
        "questions": questions,
    })
}

fn table_to_json(t: &TableAggregate, thresholds: &SemaphoreThresholds, places: u32) -> JSValue {
    let sections: Vec<JSValue> = t
        .sections
        .iter()
        .map(|s| section_to_json(s, thresholds, places))
        .collect();
    json!({
        "modality": t.modality,
        "label": t.label,
        "totalRows": t.total_rows,
        "mean": round_js(t.mean, places),
        "sections": sections,
    })
}

fn build_summary_js(
    config: &ReportConfig,
    scope: &RunScope,
    tables: &[TableAggregate],
    institution: &InstitutionSummary,
    audit: &ConversionAuditLog,
    thresholds: &SemaphoreThresholds,
) -> JSValue {
    let places = config.output_settings.decimal_places.unwrap_or(4);
    let modalities: Vec<JSValue> = tables
        .iter()
        .map(|t| table_to_json(t, thresholds, places))
        .collect();
    let audit_js: Vec<JSValue> = audit
        .export()
        .iter()
        .map(|e| {
            json!({
                "modality": e.modality,
                "column": e.column,
                "text": e.text,
                "count": e.count,
            })
        })
        .collect();
    json!({
        "config": {
            "report": config.output_settings.report_name,
            "view": scope.view_name,
            "program": scope.program,
            "dateStart": scope.date_start.map(|d| d.format("%Y-%m-%d").to_string()),
            "dateEnd": scope.date_end.map(|d| d.format("%Y-%m-%d").to_string()),
        },
        "modalities": modalities,
        "institution": {
            "mean": round_js(institution.mean, places),
            "totalRows": institution.total_rows,
            "sectionsHigh": institution.sections_high,
            "sectionsMedium": institution.sections_medium,
            "sectionsLow": institution.sections_low,
            "sectionsWithoutData": institution.sections_without_data,
        },
        "audit": audit_js,
    })
}

fn write_text(path: &str, content: &str) -> BReportResult<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(WritingSnafu { path })?;
        }
    }
    fs::write(path, content).context(WritingSnafu { path })?;
    info!("Wrote {}", path);
    Ok(())
}

fn write_summary(
    loader: &Loader,
    config: &ReportConfig,
    ov: &Overrides,
    pretty_js_stats: &str,
) -> BReportResult<()> {
    let target = match (ov.out.as_deref(), config.output_settings.output_directory.as_deref()) {
        (Some("stdout"), _) | (Some(""), _) => None,
        (Some(p), _) => Some(p.to_string()),
        (None, Some(dir)) => Some(loader.resolve(&format!("{}/summary.json", dir))),
        (None, None) => None,
    };
    match target {
        Some(p) => write_text(&p, pretty_js_stats),
        None => {
            println!("{}", pretty_js_stats);
            Ok(())
        }
    }
}

fn write_audit(
    loader: &Loader,
    config: &ReportConfig,
    ov: &Overrides,
    audit: &ConversionAuditLog,
) -> BReportResult<()> {
    let path = match (ov.audit_out.as_deref(), config.output_settings.audit_file.as_deref()) {
        (Some(""), _) => return Ok(()),
        (Some(p), _) => p.to_string(),
        (None, Some(p)) => loader.resolve(p),
        (None, None) => {
            debug!("write_audit: no audit file requested");
            return Ok(());
        }
    };
    let mut wtr = csv::Writer::from_path(&path).context(WritingCsvSnafu { path: path.clone() })?;
    wtr.write_record(["modality", "column", "text", "count"])
        .context(WritingCsvSnafu { path: path.clone() })?;
    for e in audit.export() {
        wtr.write_record([
            e.modality.as_str(),
            e.column.as_str(),
            e.text.as_str(),
            e.count.to_string().as_str(),
        ])
        .context(WritingCsvSnafu { path: path.clone() })?;
    }
    wtr.flush().context(WritingSnafu { path: path.clone() })?;
    info!("Wrote {} audit entries to {}", audit.len(), path);
    Ok(())
}

fn check_reference(summary_path: &str, pretty_js_stats: &str) -> BReportResult<()> {
    let summary_ref = read_summary(summary_path)?;
    debug!("check_reference: summary: {:?}", summary_ref);
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference summary");
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_stats, "\n");
        return Err(Box::new(ReportError::ReferenceMismatch {
            path: summary_path.to_string(),
        }));
    }
    Ok(())
}

/// Runs a full report: reads the configuration and the data sources, scores
/// every section and writes the summary and the audit log.
///
/// When a reference summary is provided, the computed summary must be
/// identical to it.
pub fn run_report(
    config_path: &str,
    check_summary_path: Option<&str>,
    ov: &Overrides,
) -> BReportResult<()> {
    let config = read_config(config_path)?;
    info!("config: {:?}", config);

    if config.sources.is_empty() {
        return Err(Box::new(ReportError::NoSources {}));
    }
    let scope = resolve_scope(&config, ov)?;
    let modalities = resolve_modalities(&config)?;
    let thresholds = config
        .thresholds
        .as_ref()
        .map(|t| t.to_semaphore())
        .unwrap_or_default();

    let root_p = Path::new(config_path)
        .parent()
        .context(MissingParentDirSnafu {})?;
    let mut loader = Loader::new(root_p, TableCache::default());

    let applications = if scope.has_explicit_dates() {
        info!("run_report: explicit dates given, the applications are not used");
        Vec::new()
    } else {
        load_applications(&mut loader, &config)?
    };

    let dictionary = ScaleDictionary::standard();
    let mut audit = ConversionAuditLog::new();
    let mut tables: Vec<Rc<ResponseTable>> = Vec::new();
    let mut aggregates: Vec<TableAggregate> = Vec::new();
    for cfs in config.sources.iter() {
        let modality = modalities
            .iter()
            .find(|m| m.key == cfs.modality)
            .context(UnknownModalitySnafu {
                modality: cfs.modality.clone(),
                path: cfs.file_path.clone(),
            })?;
        let table = loader.load_checked(cfs, modality)?;

        let dates = date_filter_for(&scope, &applications, cfs);
        let scoped = apply(&table, &scope.to_scope(dates));
        info!(
            "run_report: {}: {} of {} rows in scope",
            simplify_file_name(&cfs.file_path),
            scoped.len(),
            table.len()
        );
        let res = SectionAggregator::new(&dictionary, &mut audit)
            .aggregate_table(&scoped, modality, &all_rows);
        aggregates.push(res);
        tables.push(table);
    }

    if let Some(p) = scope.program.as_ref() {
        let refs: Vec<&ResponseTable> = tables.iter().map(|t| t.as_ref()).collect();
        let known = programs(&refs);
        if !known.contains(p) {
            warn!(
                "run_report: program {:?} not found in the data, known programs: {:?}",
                p, known
            );
        }
    }

    debug!("run_report: {} tables in the cache", loader.cached_tables());

    let institution = summarize_institution(&aggregates, &thresholds);
    info!("run_report: institution: {:?}", institution);

    let result_js = build_summary_js(
        &config,
        &scope,
        &aggregates,
        &institution,
        &audit,
        &thresholds,
    );
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_summary(&loader, &config, ov, &pretty_js_stats)?;
    write_audit(&loader, &config, ov, &audit)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        check_reference(summary_p, &pretty_js_stats)?;
    }
    Ok(())
}

#[cfg(test)]
fn run_report_test(test_name: &str, config_lpath: &str, summary_lpath: &str) -> BReportResult<()> {
    let test_dir = option_env!("SURVEY_TEST_DIR")
        .unwrap_or(concat!(env!("CARGO_MANIFEST_DIR"), "/tests"));
    info!("Running test {}", test_name);
    let res = run_report(
        format!("{}/{}/{}", test_dir, test_name, config_lpath).as_str(),
        Some(format!("{}/{}/{}", test_dir, test_name, summary_lpath).as_str()),
        &Overrides::default(),
    );
    if let Err(e) = &res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = snafu::ErrorCompat::backtrace(e.as_ref()) {
            eprintln!("trace: {}", bt);
        } else {
            eprintln!("No trace found");
        }
    }
    res
}

#[cfg(test)]
pub fn test_wrapper(test_name: &str) -> BReportResult<()> {
    run_report_test(
        test_name,
        format!("{}_config.json", test_name).as_str(),
        format!("{}_expected_summary.json", test_name).as_str(),
    )
}
