//! A1-notation helpers for building and parsing Sheets ranges.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // First cell of a range reference, e.g. "A15:N15" -> 15.
    static ref REFERENCE_START_ROW: Regex = Regex::new(r"^[A-Z]+(\d+)").unwrap();
}

/// Converts a 1-indexed column position to its letters: 1 -> A, 26 -> Z, 27 -> AA.
pub fn column_letters(position: u32) -> String {
    let mut out = Vec::new();
    let mut index = position;
    while index > 0 {
        let rem = (index - 1) % 26;
        out.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    out.iter().rev().collect()
}

/// Quotes a sheet name when Sheets requires it (spaces, punctuation, leading digits).
pub fn quote_sheet_name(name: &str) -> String {
    let plain = !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// `Sheet!A1:N1`-style range covering `first..=last` columns of one row.
pub fn row_range(sheet: &str, first: u32, last: u32, row: u32) -> String {
    format!(
        "{}!{}{}:{}{}",
        quote_sheet_name(sheet),
        column_letters(first),
        row,
        column_letters(last),
        row
    )
}

/// Single cell reference, e.g. `Title!A7`.
pub fn cell(sheet: &str, column: u32, row: u32) -> String {
    format!("{}!{}{}", quote_sheet_name(sheet), column_letters(column), row)
}

/// Whole-column range covering `first..=last`, e.g. `Creative!A:N`.
pub fn column_range(sheet: &str, first: u32, last: u32) -> String {
    format!(
        "{}!{}:{}",
        quote_sheet_name(sheet),
        column_letters(first),
        column_letters(last)
    )
}

/// Extracts the 1-indexed row of the first cell in a range reported by the store.
///
/// Returns 0 when the range cannot be parsed; callers treat 0 as "position unknown".
pub fn parse_start_row(range: &str) -> u32 {
    // Quoted sheet names may contain '!', the reference follows the last one.
    let Some((_, reference)) = range.rsplit_once('!') else {
        return 0;
    };
    REFERENCE_START_ROW
        .captures(reference)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0)
}
