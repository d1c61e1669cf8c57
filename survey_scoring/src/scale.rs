use log::{debug, warn};
use std::collections::HashMap;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::{CellValue, ScaleRange};

/// How a cell was read.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum CellStatus {
    /// A single digit, or a number already stored as such.
    OkNumeric,
    /// A known answer of one of the scale families.
    OkMapped,
    /// A digit followed by a label, such as `5 - Excelente`.
    OkPattern,
    Missing,
    /// Some content that could not be read as a score.
    Unknown,
}

impl CellStatus {
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            CellStatus::OkNumeric | CellStatus::OkMapped | CellStatus::OkPattern
        )
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct MappedCell {
    pub score: Option<f64>,
    pub status: CellStatus,
}

impl MappedCell {
    const MISSING: MappedCell = MappedCell {
        score: None,
        status: CellStatus::Missing,
    };
    const UNKNOWN: MappedCell = MappedCell {
        score: None,
        status: CellStatus::Unknown,
    };

    fn ok(score: f64, status: CellStatus) -> MappedCell {
        MappedCell {
            score: Some(score),
            status,
        }
    }
}

/// The vocabularies in which the same ordinal scale is phrased, depending on the
/// kind of question.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum ScaleFamily {
    Agreement,
    Frequency,
    Performance,
    Satisfaction,
    /// Yes/no answers, read as a recommendation.
    Recommendation,
}

impl ScaleFamily {
    /// The order in which the families are merged into one dictionary.
    /// On a collision, the family that comes first keeps the token.
    pub const MERGE_ORDER: [ScaleFamily; 5] = [
        ScaleFamily::Recommendation,
        ScaleFamily::Agreement,
        ScaleFamily::Satisfaction,
        ScaleFamily::Performance,
        ScaleFamily::Frequency,
    ];

    pub fn entries(&self) -> &'static [(&'static str, f64)] {
        match self {
            ScaleFamily::Recommendation => &[
                ("si", 5.0),
                ("definitivamente si", 5.0),
                ("probablemente si", 4.0),
                ("tal vez", 3.0),
                ("no estoy seguro", 3.0),
                ("probablemente no", 2.0),
                ("definitivamente no", 1.0),
                ("no", 1.0),
            ],
            ScaleFamily::Agreement => &[
                ("totalmente de acuerdo", 5.0),
                ("muy de acuerdo", 5.0),
                ("de acuerdo", 4.0),
                ("ni de acuerdo ni en desacuerdo", 3.0),
                ("neutral", 3.0),
                ("en desacuerdo", 2.0),
                ("muy en desacuerdo", 1.0),
                ("totalmente en desacuerdo", 1.0),
            ],
            ScaleFamily::Satisfaction => &[
                ("muy satisfecho", 5.0),
                ("totalmente satisfecho", 5.0),
                ("satisfecho", 4.0),
                ("ni satisfecho ni insatisfecho", 3.0),
                ("neutral", 3.0),
                ("poco satisfecho", 2.0),
                ("insatisfecho", 2.0),
                ("nada satisfecho", 1.0),
                ("muy insatisfecho", 1.0),
            ],
            ScaleFamily::Performance => &[
                ("excelente", 5.0),
                ("muy bueno", 4.0),
                ("bueno", 4.0),
                ("regular", 3.0),
                ("malo", 2.0),
                ("deficiente", 1.0),
                ("muy malo", 1.0),
                ("pesimo", 1.0),
            ],
            ScaleFamily::Frequency => &[
                ("siempre", 5.0),
                ("casi siempre", 4.0),
                ("frecuentemente", 4.0),
                ("algunas veces", 3.0),
                ("a veces", 3.0),
                ("ocasionalmente", 3.0),
                ("casi nunca", 2.0),
                ("rara vez", 2.0),
                ("nunca", 1.0),
                ("no lo utilizo", 0.0),
                ("no lo uso", 0.0),
            ],
        }
    }
}

/// A token claimed by more than one family while merging.
#[derive(PartialEq, Debug, Clone)]
pub struct Collision {
    pub token: String,
    pub kept: (ScaleFamily, f64),
    pub shadowed: (ScaleFamily, f64),
}

/// The union of several scale families, keyed by normalized answer text.
#[derive(PartialEq, Debug, Clone)]
pub struct ScaleDictionary {
    entries: HashMap<String, (ScaleFamily, f64)>,
    collisions: Vec<Collision>,
}

impl ScaleDictionary {
    /// Merges the families in the given order. The first family to define a
    /// token keeps it; later definitions are recorded as collisions.
    pub fn merged(families: &[ScaleFamily]) -> ScaleDictionary {
        let mut dict = ScaleDictionary {
            entries: HashMap::new(),
            collisions: Vec::new(),
        };
        for family in families {
            for (token, score) in family.entries() {
                dict.insert(*family, token, *score);
            }
        }
        debug!(
            "ScaleDictionary::merged: {} tokens, {} collisions",
            dict.entries.len(),
            dict.collisions.len()
        );
        dict
    }

    /// All the families, in `ScaleFamily::MERGE_ORDER`.
    pub fn standard() -> ScaleDictionary {
        ScaleDictionary::merged(&ScaleFamily::MERGE_ORDER)
    }

    fn insert(&mut self, family: ScaleFamily, token: &str, score: f64) {
        let key = normalize_answer(token);
        if let Some(existing) = self.entries.get(&key) {
            if existing.1 != score {
                warn!(
                    "ScaleDictionary: token {:?} is {} in {:?}, ignoring {} from {:?}",
                    key, existing.1, existing.0, score, family
                );
            }
            self.collisions.push(Collision {
                token: key,
                kept: *existing,
                shadowed: (family, score),
            });
            return;
        }
        self.entries.insert(key, (family, score));
    }

    pub fn lookup(&self, normalized: &str) -> Option<(ScaleFamily, f64)> {
        self.entries.get(normalized).cloned()
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical form of an answer: trimmed, lowercase, without diacritics and with
/// single spaces between words.
pub fn normalize_answer(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<&str>>().join(" ")
}

const SEPARATORS: [char; 7] = ['-', '–', '—', '.', ')', ':', '/'];

// Reads answers such as "5 - Excelente" or "4) Muy bueno".
// The label after the separators must start with a letter, so that "4.5" or
// "3-4" are not taken for a pattern.
fn leading_digit(normalized: &str) -> Option<u32> {
    let mut chars = normalized.chars();
    let digit = chars.next()?.to_digit(10)?;
    let rest = chars.as_str();
    let label = rest.trim_start_matches(|c: char| c.is_whitespace() || SEPARATORS.contains(&c));
    if label.len() == rest.len() {
        return None;
    }
    match label.chars().next() {
        Some(c) if c.is_alphabetic() => Some(digit),
        _ => None,
    }
}

/// Maps raw answers to scores within a scale range.
pub struct ScaleMapper<'d> {
    range: ScaleRange,
    dictionary: &'d ScaleDictionary,
}

impl<'d> ScaleMapper<'d> {
    pub fn new(range: ScaleRange, dictionary: &'d ScaleDictionary) -> ScaleMapper<'d> {
        ScaleMapper { range, dictionary }
    }

    pub fn range(&self) -> ScaleRange {
        self.range
    }

    /// Reads a cell. Absent and blank cells are missing.
    ///
    /// Numbers stored as such are accepted when they are whole and within the
    /// range of the scale.
    pub fn map_cell(&self, raw: Option<&CellValue>) -> MappedCell {
        match raw {
            None | Some(CellValue::Empty) => MappedCell::MISSING,
            Some(CellValue::Text(s)) => self.map_text(s),
            Some(CellValue::Number(n)) if n.fract() == 0.0 && self.range.contains(*n) => {
                MappedCell::ok(*n, CellStatus::OkNumeric)
            }
            Some(CellValue::Number(_)) => MappedCell::UNKNOWN,
        }
    }

    pub fn map_text(&self, raw: &str) -> MappedCell {
        if raw.trim().is_empty() {
            return MappedCell::MISSING;
        }
        let text = normalize_answer(raw);

        let mut chars = text.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(d) = c.to_digit(10) {
                return self.in_range(d as f64, CellStatus::OkNumeric);
            }
        }

        if let Some(d) = leading_digit(&text) {
            return self.in_range(d as f64, CellStatus::OkPattern);
        }

        match self.dictionary.lookup(&text) {
            Some((_, score)) => self.in_range(score, CellStatus::OkMapped),
            None => MappedCell::UNKNOWN,
        }
    }

    fn in_range(&self, score: f64, status: CellStatus) -> MappedCell {
        if self.range.contains(score) {
            MappedCell::ok(score, status)
        } else {
            MappedCell::UNKNOWN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(dict: &ScaleDictionary, raw: &str) -> MappedCell {
        ScaleMapper::new(ScaleRange::ZeroToFive, dict).map_text(raw)
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_answer("  Totalménte   DE acuerdo "), "totalmente de acuerdo");
        assert_eq!(normalize_answer("Preparación"), "preparacion");
        assert_eq!(normalize_answer("Sí"), "si");
    }

    #[test]
    fn missing_values() {
        let dict = ScaleDictionary::standard();
        let mapper = ScaleMapper::new(ScaleRange::ZeroToFive, &dict);
        assert_eq!(mapper.map_cell(None), MappedCell::MISSING);
        assert_eq!(mapper.map_cell(Some(&CellValue::Empty)), MappedCell::MISSING);
        assert_eq!(mapper.map_text(""), MappedCell::MISSING);
        assert_eq!(mapper.map_text("   "), MappedCell::MISSING);
    }

    #[test]
    fn accent_and_case_invariance() {
        let dict = ScaleDictionary::standard();
        let expected = MappedCell::ok(5.0, CellStatus::OkMapped);
        assert_eq!(score(&dict, "Totalmente de acuerdo"), expected);
        assert_eq!(score(&dict, "totalmente DE ACUERDO"), expected);
        assert_eq!(score(&dict, "Totalménte de acuerdo"), expected);
    }

    #[test]
    fn digits_and_patterns() {
        let dict = ScaleDictionary::standard();
        assert_eq!(score(&dict, "3"), MappedCell::ok(3.0, CellStatus::OkNumeric));
        assert_eq!(score(&dict, " 0 "), MappedCell::ok(0.0, CellStatus::OkNumeric));
        assert_eq!(
            score(&dict, "5 - Excelente"),
            MappedCell::ok(5.0, CellStatus::OkPattern)
        );
        assert_eq!(
            score(&dict, "4) Muy bueno"),
            MappedCell::ok(4.0, CellStatus::OkPattern)
        );
        assert_eq!(score(&dict, "4.5"), MappedCell::UNKNOWN);
        assert_eq!(score(&dict, "7"), MappedCell::UNKNOWN);
        assert_eq!(score(&dict, "12"), MappedCell::UNKNOWN);
        assert_eq!(score(&dict, "5Excelente"), MappedCell::UNKNOWN);
    }

    #[test]
    fn unknown_text() {
        let dict = ScaleDictionary::standard();
        assert_eq!(score(&dict, "xyz-not-a-scale"), MappedCell::UNKNOWN);
    }

    #[test]
    fn zero_is_outside_the_one_to_five_scale() {
        let dict = ScaleDictionary::standard();
        let mapper = ScaleMapper::new(ScaleRange::OneToFive, &dict);
        assert_eq!(mapper.map_text("No lo utilizo"), MappedCell::UNKNOWN);
        assert_eq!(mapper.map_text("0"), MappedCell::UNKNOWN);
        assert_eq!(
            mapper.map_text("Nunca"),
            MappedCell::ok(1.0, CellStatus::OkMapped)
        );
    }

    #[test]
    fn numeric_cells() {
        let dict = ScaleDictionary::standard();
        let mapper = ScaleMapper::new(ScaleRange::ZeroToFive, &dict);
        assert_eq!(
            mapper.map_cell(Some(&CellValue::Number(4.0))),
            MappedCell::ok(4.0, CellStatus::OkNumeric)
        );
        assert_eq!(
            mapper.map_cell(Some(&CellValue::Number(4.5))),
            MappedCell::UNKNOWN
        );
        assert_eq!(
            mapper.map_cell(Some(&CellValue::Number(9.0))),
            MappedCell::UNKNOWN
        );
    }

    #[test]
    fn collisions_are_visible() {
        let dict = ScaleDictionary::standard();
        let neutral: Vec<&Collision> = dict
            .collisions()
            .iter()
            .filter(|c| c.token == "neutral")
            .collect();
        assert_eq!(neutral.len(), 1);
        assert_eq!(neutral[0].kept.0, ScaleFamily::Agreement);
        assert_eq!(neutral[0].shadowed.0, ScaleFamily::Satisfaction);
        assert_eq!(
            dict.lookup("neutral"),
            Some((ScaleFamily::Agreement, 3.0))
        );
    }

    #[test]
    fn merge_order_decides_collisions() {
        let reversed = ScaleDictionary::merged(&[ScaleFamily::Satisfaction, ScaleFamily::Agreement]);
        assert_eq!(
            reversed.lookup("neutral"),
            Some((ScaleFamily::Satisfaction, 3.0))
        );
        assert_eq!(reversed.lookup("siempre"), None);
    }
}
