use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use std::collections::BTreeSet;

use crate::config::{ResponseRow, ResponseTable};

/// The audience of a report.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum View {
    /// Everything, across all the modalities.
    Institutional,
    /// Everything, or a single program when one is requested.
    AcademicDirection,
    /// The director of one program only sees that program.
    Director,
}

/// An inclusive range of days. A missing bound leaves that side open.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> DateWindow {
        DateWindow { start, end }
    }

    pub fn unbounded() -> DateWindow {
        DateWindow {
            start: None,
            end: None,
        }
    }

    /// The end day is included: the comparison is made against the first
    /// instant of the following day, whatever the time of the timestamp.
    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        if let Some(start) = self.start.and_then(|d| d.and_hms_opt(0, 0, 0)) {
            if *ts < start {
                return false;
            }
        }
        if let Some(end_excl) = self
            .end
            .and_then(|d| d.succ_opt())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            if *ts >= end_excl {
                return false;
            }
        }
        true
    }
}

/// Restriction on the submission dates.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum DateFilter {
    /// No restriction.
    Any,
    /// Rows within at least one of the windows. An empty list keeps nothing.
    Windows(Vec<DateWindow>),
}

impl DateFilter {
    /// A single window between two optional dates. Without any date, no
    /// filtering happens.
    pub fn between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> DateFilter {
        if start.is_none() && end.is_none() {
            DateFilter::Any
        } else {
            DateFilter::Windows(vec![DateWindow::new(start, end)])
        }
    }

    fn accepts(&self, ts: Option<&NaiveDateTime>) -> bool {
        match (self, ts) {
            (DateFilter::Any, _) => true,
            (DateFilter::Windows(_), None) => false,
            (DateFilter::Windows(ws), Some(ts)) => ws.iter().any(|w| w.contains(ts)),
        }
    }
}

/// The restrictions of one report request.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Scope {
    pub view: View,
    pub program: Option<String>,
    pub dates: DateFilter,
}

impl Scope {
    pub fn institutional() -> Scope {
        Scope {
            view: View::Institutional,
            program: None,
            dates: DateFilter::Any,
        }
    }

    pub fn academic_direction(program: Option<&str>) -> Scope {
        Scope {
            view: View::AcademicDirection,
            program: program.map(|s| s.to_string()),
            dates: DateFilter::Any,
        }
    }

    pub fn director(program: &str) -> Scope {
        Scope {
            view: View::Director,
            program: Some(program.to_string()),
            dates: DateFilter::Any,
        }
    }

    pub fn with_dates(self, dates: DateFilter) -> Scope {
        Scope { dates, ..self }
    }
}

fn same_program(row: &ResponseRow, program: &str) -> bool {
    row.program.as_deref() == Some(program)
}

/// Restricts a table to the rows visible in the scope.
///
/// A director scope fails closed: without a program to filter on, or without
/// a program column in the table, no row is visible.
pub fn apply(table: &ResponseTable, scope: &Scope) -> ResponseTable {
    let program_filter: Option<&str> = match (scope.view, scope.program.as_deref()) {
        (View::Institutional, _) => None,
        (View::AcademicDirection, p) => p,
        (View::Director, None) => {
            warn!("apply: director scope without a program, no rows are visible");
            return table.filtered(|_| false);
        }
        (View::Director, Some(p)) => Some(p),
    };

    if program_filter.is_some() && table.program_column().is_none() {
        warn!(
            "apply: {:?} scope on a table without a program column, no rows are visible",
            scope.view
        );
        return table.filtered(|_| false);
    }

    let ignore_dates = table.timestamp_column().is_none() && scope.dates != DateFilter::Any;
    if ignore_dates {
        warn!("apply: the table has no timestamp column, the date filter is ignored");
    }

    let res = table.filtered(|row| {
        program_filter.map_or(true, |p| same_program(row, p))
            && (ignore_dates || scope.dates.accepts(row.timestamp.as_ref()))
    });
    info!(
        "apply: {:?} (program {:?}): kept {} of {} rows",
        scope.view,
        program_filter,
        res.len(),
        table.len()
    );
    res
}

/// One administration of a survey, as listed in the applications sheet.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Application {
    pub id: String,
    pub description: String,
    /// The name of the form this application belongs to.
    pub form: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// The date filter for the responses of one form, given the applications of
/// interest.
///
/// The year of the start date and the application id select among all the
/// applications first, whatever their form:
///
/// - no applications at all, or none selected: no filtering
/// - applications selected but none belongs to the form: no row is kept
/// - an application with a missing date covers all the dates
pub fn select_applications(
    applications: &[Application],
    form: &str,
    year: Option<i32>,
    application_id: Option<&str>,
) -> DateFilter {
    if applications.is_empty() {
        return DateFilter::Any;
    }
    let selected: Vec<&Application> = applications
        .iter()
        .filter(|a| year.map_or(true, |y| a.start.map(|d| d.year()) == Some(y)))
        .filter(|a| application_id.map_or(true, |id| a.id == id))
        .collect();
    if selected.is_empty() {
        warn!(
            "select_applications: no application for year {:?} and id {:?}, the dates are not filtered",
            year, application_id
        );
        return DateFilter::Any;
    }
    let windows: Vec<DateWindow> = selected
        .into_iter()
        .filter(|a| a.form == form)
        .map(|a| match (a.start, a.end) {
            (Some(s), Some(e)) => DateWindow::new(Some(s), Some(e)),
            _ => {
                warn!(
                    "select_applications: application {:?} has incomplete dates, using all the dates",
                    a.id
                );
                DateWindow::unbounded()
            }
        })
        .collect();
    debug!(
        "select_applications: form {:?} year {:?} id {:?}: windows {:?}",
        form, year, application_id, windows
    );
    DateFilter::Windows(windows)
}

/// The distinct programs found in the tables, sorted.
pub fn programs(tables: &[&ResponseTable]) -> Vec<String> {
    let mut res: BTreeSet<String> = BTreeSet::new();
    for t in tables {
        for row in t.rows() {
            if let Some(p) = row.program.as_ref() {
                if !p.trim().is_empty() {
                    res.insert(p.clone());
                }
            }
        }
    }
    res.into_iter().collect()
}
