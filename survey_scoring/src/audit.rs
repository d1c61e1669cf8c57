use log::debug;
use std::collections::HashMap;

/// One distinct unmapped answer, with the number of times it was seen.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AuditLogEntry {
    pub modality: String,
    pub column: String,
    pub text: String,
    pub count: u64,
}

/// Collects the answers that could not be converted to a score, so that the
/// mapping tables can be extended.
///
/// A fresh log is created for every report. Entries are only ever added or
/// incremented.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ConversionAuditLog {
    counts: HashMap<(String, String, String), u64>,
}

impl ConversionAuditLog {
    pub fn new() -> ConversionAuditLog {
        ConversionAuditLog::default()
    }

    pub fn record(&mut self, modality: &str, column: &str, raw_text: &str) {
        let key = (
            modality.to_string(),
            column.to_string(),
            raw_text.to_string(),
        );
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        debug!(
            "ConversionAuditLog::record: {} / {}: {:?} (seen {} times)",
            modality, column, raw_text, count
        );
    }

    /// All the entries, most frequent first. Entries with the same count are
    /// ordered by modality, column and text.
    pub fn export(&self) -> Vec<AuditLogEntry> {
        let mut entries: Vec<AuditLogEntry> = self
            .counts
            .iter()
            .map(|((modality, column, text), count)| AuditLogEntry {
                modality: modality.clone(),
                column: column.clone(),
                text: text.clone(),
                count: *count,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.modality.cmp(&b.modality))
                .then_with(|| a.column.cmp(&b.column))
                .then_with(|| a.text.cmp(&b.text))
        });
        entries
    }

    pub fn count_of(&self, modality: &str, column: &str, raw_text: &str) -> u64 {
        self.counts
            .get(&(
                modality.to_string(),
                column.to_string(),
                raw_text.to_string(),
            ))
            .cloned()
            .unwrap_or(0)
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total_occurrences(&self) -> u64 {
        self.counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_triples_are_counted() {
        let mut log = ConversionAuditLog::new();
        log.record("virtual", "P1", "xyz-not-a-scale");
        assert_eq!(log.len(), 1);
        assert_eq!(log.count_of("virtual", "P1", "xyz-not-a-scale"), 1);
        log.record("virtual", "P1", "xyz-not-a-scale");
        assert_eq!(log.len(), 1);
        assert_eq!(log.count_of("virtual", "P1", "xyz-not-a-scale"), 2);
        // Same text in another column is a different entry.
        log.record("virtual", "P2", "xyz-not-a-scale");
        assert_eq!(log.len(), 2);
        assert_eq!(log.total_occurrences(), 3);
    }

    #[test]
    fn export_is_sorted_by_descending_count() {
        let mut log = ConversionAuditLog::new();
        log.record("prepa", "P9", "b");
        log.record("escolar", "P1", "a");
        log.record("virtual", "P3", "c");
        log.record("virtual", "P3", "c");
        let exported = log.export();
        let keys: Vec<(&str, u64)> = exported
            .iter()
            .map(|e| (e.modality.as_str(), e.count))
            .collect();
        assert_eq!(keys, vec![("virtual", 2), ("escolar", 1), ("prepa", 1)]);
    }
}
