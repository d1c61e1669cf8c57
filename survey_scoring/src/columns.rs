//! Spreadsheet-style column addressing.
//!
//! Labels follow the bijective base-26 numbering of spreadsheets: `A` to `Z`,
//! then `AA`, `AB`, ... There is no zero digit.

use log::debug;

use crate::config::ResponseTable;

/// Converts a column label to a zero-based index (`A` is 0, `AA` is 26).
///
/// The label is case-insensitive and surrounding whitespace is ignored.
/// Empty labels, labels with anything else than the letters A to Z, and labels
/// too long to be represented return `None`.
pub fn index_of(label: &str) -> Option<usize> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    let mut acc: usize = 0;
    for ch in label.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    Some(acc - 1)
}

/// The label of a zero-based column index (0 is `A`, 26 is `AA`).
pub fn label_of(index: usize) -> String {
    let mut letters: Vec<char> = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Resolves a pair of labels to the inclusive range of positions that exist in a
/// table of the given width.
///
/// The labels may be given in any order. The range is clamped to the width, so
/// a form that was shortened yields a smaller (possibly empty) range.
pub fn positions_in_range(width: usize, start: &str, end: &str) -> Option<(usize, usize)> {
    let (a, b) = match (index_of(start), index_of(end)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            debug!(
                "positions_in_range: cannot resolve labels {:?}..{:?}",
                start, end
            );
            return None;
        }
    };
    let (lo, hi) = if a > b { (b, a) } else { (a, b) };
    if width == 0 || lo > width - 1 {
        return None;
    }
    Some((lo, hi.min(width - 1)))
}

/// The identifiers of the table columns between two labels, both ends included.
///
/// Returns the actual identifiers rather than positions so that the caller
/// addresses columns by name.
pub fn columns_in_range(table: &ResponseTable, start: &str, end: &str) -> Vec<String> {
    match positions_in_range(table.width(), start, end) {
        Some((lo, hi)) => table.columns()[lo..=hi].to_vec(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(width: usize) -> ResponseTable {
        ResponseTable::new((0..width).map(|i| format!("col{}", i)).collect()).unwrap()
    }

    #[test]
    fn labels_to_indexes() {
        assert_eq!(index_of("A"), Some(0));
        assert_eq!(index_of("Z"), Some(25));
        assert_eq!(index_of("AA"), Some(26));
        assert_eq!(index_of("AZ"), Some(51));
        assert_eq!(index_of("BA"), Some(52));
        assert_eq!(index_of("BE"), Some(56));
        assert_eq!(index_of("be"), Some(56));
        assert_eq!(index_of(" c "), Some(2));
    }

    #[test]
    fn invalid_labels() {
        assert_eq!(index_of(""), None);
        assert_eq!(index_of("   "), None);
        assert_eq!(index_of("A1"), None);
        assert_eq!(index_of("É"), None);
        assert_eq!(index_of(&"Z".repeat(40)), None);
    }

    #[test]
    fn indexes_to_labels() {
        assert_eq!(label_of(0), "A");
        assert_eq!(label_of(25), "Z");
        assert_eq!(label_of(26), "AA");
        assert_eq!(label_of(56), "BE");
        assert_eq!(label_of(72), "BU");
        assert_eq!(index_of(&label_of(702)), Some(702));
    }

    #[test]
    fn range_is_order_independent() {
        let t = table(10);
        let forward = columns_in_range(&t, "C", "G");
        assert_eq!(forward, vec!["col2", "col3", "col4", "col5", "col6"]);
        assert_eq!(columns_in_range(&t, "G", "C"), forward);
    }

    #[test]
    fn range_is_clamped_to_the_table() {
        let t = table(5);
        assert_eq!(columns_in_range(&t, "D", "Z"), vec!["col3", "col4"]);
        assert!(columns_in_range(&t, "F", "H").is_empty());
        assert!(columns_in_range(&t, "A", "").is_empty());
        assert!(columns_in_range(&table(0), "A", "B").is_empty());
    }
}
