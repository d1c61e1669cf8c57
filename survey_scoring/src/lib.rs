/*!
Scoring engine for quality surveys.

Form answers arrive as free text in several Likert vocabularies ("Totalmente de
acuerdo", "Siempre", "5 - Excelente", ...). This crate converts them to a 0-5
scale, aggregates them over sections of a form, and keeps track of the answers
that could not be read. See the [manual] for the details of each step.
*/

mod config;
use log::{debug, info};

pub mod audit;
pub mod builder;
pub mod columns;
pub mod manual;
pub mod scale;
pub mod scope;

pub use crate::audit::{AuditLogEntry, ConversionAuditLog};
pub use crate::config::*;
pub use crate::scale::{CellStatus, MappedCell, ScaleDictionary, ScaleFamily, ScaleMapper};
pub use crate::scope::{Application, DateFilter, DateWindow, Scope, View};

/// A row filter that keeps every row.
pub fn all_rows(_row: &ResponseRow) -> bool {
    true
}

// Running sums for one question.
#[derive(Default, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: u64,
}

impl Accumulator {
    fn add(&mut self, score: f64) {
        self.sum += score;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Computes section and table aggregates, recording the unreadable answers in
/// an audit log.
///
/// The aggregator holds no other state: running it twice on the same table
/// gives the same aggregates (the audit counts add up).
pub struct SectionAggregator<'a> {
    dictionary: &'a ScaleDictionary,
    audit: &'a mut ConversionAuditLog,
}

impl<'a> SectionAggregator<'a> {
    pub fn new(
        dictionary: &'a ScaleDictionary,
        audit: &'a mut ConversionAuditLog,
    ) -> SectionAggregator<'a> {
        SectionAggregator { dictionary, audit }
    }

    /// Aggregates one section over the rows accepted by the filter.
    ///
    /// The cells are visited row by row, so the result does not depend on
    /// anything else than the table content.
    pub fn aggregate_section(
        &mut self,
        table: &ResponseTable,
        modality: &ModalityDefinition,
        section: &SectionRange,
        row_filter: &dyn Fn(&ResponseRow) -> bool,
    ) -> SectionAggregate {
        let columns = columns::columns_in_range(table, &section.start, &section.end);
        if columns.is_empty() {
            info!(
                "aggregate_section: {} / {}: range {}..{} does not match any column (table width {})",
                modality.key,
                section.name,
                section.start,
                section.end,
                table.width()
            );
        }
        let positions: Vec<(usize, &String)> = columns
            .iter()
            .filter_map(|c| table.position_of(c).map(|p| (p, c)))
            .collect();

        let mapper = ScaleMapper::new(modality.scale, self.dictionary);
        let mut per_question: Vec<Accumulator> = vec![Accumulator::default(); positions.len()];
        let mut total = Accumulator::default();
        let mut respondents: u64 = 0;
        let mut missing_count: u64 = 0;
        let mut unknown_count: u64 = 0;

        for row in table.rows().iter().filter(|r| row_filter(r)) {
            let mut answered = false;
            for (q_idx, (position, column)) in positions.iter().enumerate() {
                let raw = row.cell(*position);
                let mapped = mapper.map_cell(raw);
                match (mapped.status, mapped.score) {
                    (status, Some(score)) if status.is_valid() => {
                        per_question[q_idx].add(score);
                        total.add(score);
                        answered = true;
                    }
                    (CellStatus::Missing, _) => {
                        missing_count += 1;
                    }
                    _ => {
                        unknown_count += 1;
                        let text = raw.and_then(|c| c.to_text()).unwrap_or_default();
                        self.audit.record(&modality.key, column, &text);
                    }
                }
            }
            if answered {
                respondents += 1;
            }
        }

        let res = SectionAggregate {
            name: section.name.clone(),
            mean: total.mean(),
            valid_count: total.count,
            columns_used: positions.len(),
            respondents,
            missing_count,
            unknown_count,
            questions: positions
                .iter()
                .zip(per_question.iter())
                .map(|((_, column), acc)| QuestionAggregate {
                    column: (*column).clone(),
                    mean: acc.mean(),
                    valid_count: acc.count,
                })
                .collect(),
        };
        debug!(
            "aggregate_section: {} / {}: mean {:?} valid {} missing {} unknown {}",
            modality.key, section.name, res.mean, res.valid_count, missing_count, unknown_count
        );
        res
    }

    /// Aggregates every section of the modality, in the declared order.
    /// Sections without data are kept, with no mean.
    pub fn aggregate_table(
        &mut self,
        table: &ResponseTable,
        modality: &ModalityDefinition,
        row_filter: &dyn Fn(&ResponseRow) -> bool,
    ) -> TableAggregate {
        let total_rows = table.rows().iter().filter(|r| row_filter(r)).count() as u64;
        let sections: Vec<SectionAggregate> = modality
            .sections
            .iter()
            .map(|s| self.aggregate_section(table, modality, s, row_filter))
            .collect();
        // Weighting by the number of valid cells gives the flattened mean of
        // all the cells of the table.
        let mean = weighted_combine(
            &sections
                .iter()
                .map(|s| (s.mean, s.valid_count))
                .collect::<Vec<(Option<f64>, u64)>>(),
        );
        info!(
            "aggregate_table: {}: {} rows, {} sections, mean {:?}",
            modality.key,
            total_rows,
            sections.len(),
            mean
        );
        TableAggregate {
            modality: modality.key.clone(),
            label: modality.label.clone(),
            total_rows,
            mean,
            sections,
        }
    }
}

/// The weighted mean of already aggregated values.
///
/// Entries without a mean or with a zero weight are ignored. Returns `None`
/// when no entry is left. Averages from groups of different sizes must be
/// combined with this function rather than averaged directly.
pub fn weighted_combine(entries: &[(Option<f64>, u64)]) -> Option<f64> {
    let mut sum = 0.0;
    let mut weights: u64 = 0;
    for (mean, weight) in entries.iter() {
        if let (Some(m), w) = (mean, *weight) {
            if w > 0 {
                sum += m * w as f64;
                weights += w;
            }
        }
    }
    if weights == 0 {
        None
    } else {
        Some(sum / weights as f64)
    }
}

/// Combines the aggregates of several modalities into the institution figure.
///
/// The mean weighs each section mean by its number of respondents.
pub fn summarize_institution(
    tables: &[TableAggregate],
    thresholds: &SemaphoreThresholds,
) -> InstitutionSummary {
    let mut res = InstitutionSummary {
        mean: None,
        total_rows: tables.iter().map(|t| t.total_rows).sum(),
        sections_high: 0,
        sections_medium: 0,
        sections_low: 0,
        sections_without_data: 0,
    };
    let mut weighted: Vec<(Option<f64>, u64)> = Vec::new();
    for section in tables.iter().flat_map(|t| t.sections.iter()) {
        weighted.push((section.mean, section.respondents));
        match thresholds.classify(section.mean) {
            Semaphore::High => res.sections_high += 1,
            Semaphore::Medium => res.sections_medium += 1,
            Semaphore::Low => res.sections_low += 1,
            Semaphore::NoData => res.sections_without_data += 1,
        }
    }
    res.mean = weighted_combine(&weighted);
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TableBuilder;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // Columns A and B hold the timestamp and the program, C to E the answers.
    fn three_rows() -> ResponseTable {
        let mut b = TableBuilder::new(&["Marca temporal", "Carrera", "P1", "P2", "P3"]).unwrap();
        b.add_text_row(&["", "", "Sí", "No", "3"]);
        b.add_text_row(&["", "", "Totalmente de acuerdo", "", ""]);
        b.add_text_row(&["", "", "bogus", "Siempre", "muy malo"]);
        b.build()
    }

    fn modality() -> ModalityDefinition {
        ModalityDefinition::new("virtual", "Virtual").section("Apoyo", "C", "E")
    }

    #[test]
    fn end_to_end_section() {
        init();
        let dict = ScaleDictionary::standard();
        let mut audit = ConversionAuditLog::new();
        let table = three_rows();
        let m = modality();
        let res = SectionAggregator::new(&dict, &mut audit).aggregate_section(
            &table,
            &m,
            &m.sections[0],
            &all_rows,
        );
        assert_eq!(res.valid_count, 6);
        assert_eq!(res.columns_used, 3);
        assert_eq!(res.respondents, 3);
        assert_eq!(res.missing_count, 2);
        assert_eq!(res.unknown_count, 1);
        assert_eq!(res.mean, Some(20.0 / 6.0));
        assert_eq!(audit.len(), 1);
        assert_eq!(audit.count_of("virtual", "P1", "bogus"), 1);

        let p1 = &res.questions[0];
        assert_eq!(p1.column, "P1");
        assert_eq!(p1.valid_count, 2);
        assert_eq!(p1.mean, Some(5.0));
    }

    #[test]
    fn aggregation_is_idempotent() {
        let dict = ScaleDictionary::standard();
        let mut audit = ConversionAuditLog::new();
        let table = three_rows();
        let m = modality().section("Vacía", "F", "H");
        let first = SectionAggregator::new(&dict, &mut audit).aggregate_table(&table, &m, &all_rows);
        let second =
            SectionAggregator::new(&dict, &mut audit).aggregate_table(&table, &m, &all_rows);
        assert_eq!(first, second);
        assert_eq!(
            first.mean.map(f64::to_bits),
            second.mean.map(f64::to_bits)
        );
        assert_eq!(audit.count_of("virtual", "P1", "bogus"), 2);
    }

    #[test]
    fn out_of_range_sections_are_kept_without_data() {
        let dict = ScaleDictionary::standard();
        let mut audit = ConversionAuditLog::new();
        let m = modality().section("Fuera", "X", "Z");
        let res = SectionAggregator::new(&dict, &mut audit).aggregate_table(
            &three_rows(),
            &m,
            &all_rows,
        );
        assert_eq!(res.sections.len(), 2);
        assert_eq!(res.sections[1].name, "Fuera");
        assert_eq!(res.sections[1].mean, None);
        assert_eq!(res.sections[1].valid_count, 0);
        assert_eq!(res.sections[1].columns_used, 0);
        assert_eq!(res.total_rows, 3);
        assert_eq!(res.mean, Some(20.0 / 6.0));
    }

    #[test]
    fn empty_section_differs_from_a_zero_score() {
        let dict = ScaleDictionary::standard();
        let mut audit = ConversionAuditLog::new();
        let mut b = TableBuilder::new(&["A", "B", "C", "D"]).unwrap();
        b.add_text_row(&["", "", "No lo utilizo", ""]);
        b.add_text_row(&["", "", "no lo utilizo", ""]);
        let table = b.build();
        let m = ModalityDefinition::new("escolar", "Escolar")
            .section("Uso", "C", "C")
            .section("Sin respuesta", "D", "D");
        let res = SectionAggregator::new(&dict, &mut audit).aggregate_table(&table, &m, &all_rows);
        assert_eq!(res.sections[0].mean, Some(0.0));
        assert_eq!(res.sections[0].valid_count, 2);
        assert_eq!(res.sections[1].mean, None);
        assert_eq!(res.sections[1].valid_count, 0);
        assert_eq!(res.sections[1].columns_used, 1);
        assert!(audit.is_empty());
    }

    #[test]
    fn row_filter_restricts_rows() {
        let dict = ScaleDictionary::standard();
        let mut audit = ConversionAuditLog::new();
        let table = three_rows();
        let m = modality();
        // Only the second row.
        let second_only = |r: &ResponseRow| r.cells[3].is_blank();
        let res = SectionAggregator::new(&dict, &mut audit).aggregate_table(&table, &m, &second_only);
        assert_eq!(res.total_rows, 1);
        assert_eq!(res.sections[0].valid_count, 1);
        assert_eq!(res.sections[0].mean, Some(5.0));
        assert!(audit.is_empty());
    }

    #[test]
    fn weighted_combine_weighs_by_count() {
        assert_eq!(weighted_combine(&[(Some(4.0), 10), (Some(2.0), 90)]), Some(2.2));
        assert_eq!(
            weighted_combine(&[(Some(4.0), 10), (None, 50), (Some(1.0), 0)]),
            Some(4.0)
        );
        assert_eq!(weighted_combine(&[(None, 3), (Some(2.0), 0)]), None);
        assert_eq!(weighted_combine(&[]), None);
    }

    #[test]
    fn institution_summary() {
        let section = |mean: Option<f64>, respondents: u64| SectionAggregate {
            name: "s".to_string(),
            mean,
            valid_count: respondents,
            columns_used: 1,
            respondents,
            missing_count: 0,
            unknown_count: 0,
            questions: vec![],
        };
        let tables = vec![
            TableAggregate {
                modality: "virtual".to_string(),
                label: "Virtual".to_string(),
                total_rows: 10,
                mean: Some(4.0),
                sections: vec![section(Some(4.0), 10), section(None, 0)],
            },
            TableAggregate {
                modality: "prepa".to_string(),
                label: "Prepa".to_string(),
                total_rows: 90,
                mean: Some(2.0),
                sections: vec![section(Some(2.0), 90), section(Some(4.6), 0)],
            },
        ];
        let res = summarize_institution(&tables, &SemaphoreThresholds::DEFAULT);
        assert_eq!(res.total_rows, 100);
        assert_eq!(res.mean, Some(2.2));
        assert_eq!(res.sections_high, 1);
        assert_eq!(res.sections_medium, 1);
        assert_eq!(res.sections_low, 1);
        assert_eq!(res.sections_without_data, 1);
    }
}
