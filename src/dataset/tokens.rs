//! Tolerant parsing of identifier lists.
//!
//! List values are integers separated by `,`, `;` or whitespace. Malformed
//! tokens never fail a load: classification lists drop them, export rows and
//! topology lists replace them with [`NO_EXPORT`].

use alloc::vec::Vec;

/// Sentinel for "no export" / unknown neighbor.
pub const NO_EXPORT: i64 = -1;

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|t| !t.is_empty())
}

/// Parses a classification list, dropping tokens that are not integers.
pub fn parse_id_list(text: &str) -> Vec<i64> {
    tokens(text)
        .filter_map(|t| match t.parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                log::debug!("Dropping malformed identifier token {:?}", t);
                None
            }
        })
        .collect()
}

/// Parses a list, mapping malformed tokens to [`NO_EXPORT`].
pub fn parse_tolerant(text: &str) -> Vec<i64> {
    tokens(text)
        .map(|t| t.parse::<i64>().unwrap_or(NO_EXPORT))
        .collect()
}

/// Parses one export row and right-pads it with [`NO_EXPORT`] to `width`.
///
/// Rows naming more entries than `width` are cut to `width`.
pub fn parse_export_row(text: &str, width: usize) -> Vec<i64> {
    let mut row = parse_tolerant(text);
    if row.len() > width {
        log::warn!("Export row lists {} entries for {} neighbors; truncating", row.len(), width);
        row.truncate(width);
    }
    row.resize(width, NO_EXPORT);
    row
}
