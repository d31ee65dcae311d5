//! Cell address codec: "A1" style references <-> zero-based (column, row)

use std::fmt;
use std::str::FromStr;

use crate::error::{PackageError, Result};

/// Zero-based cell position with its canonical textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// Zero-based column index (A = 0)
    pub column: u32,
    /// Zero-based row index (row "1" = 0)
    pub row: u32,
}

impl CellAddress {
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Parse a reference like "H13"
    pub fn parse(reference: &str) -> Result<Self> {
        let (column, row) = decode(reference)?;
        Ok(Self { column, row })
    }

    /// One-based row number as written in the `r` attribute of `<row>`
    pub fn row_number(&self) -> u64 {
        u64::from(self.row) + 1
    }

    /// Column letters, e.g. "AA" for column 26
    pub fn column_letters(&self) -> String {
        column_to_letters(self.column)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(self.column, self.row))
    }
}

impl FromStr for CellAddress {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split a reference into its letter run and digit run.
///
/// Returns `None` when either run is empty or when anything other than ASCII
/// letters followed by ASCII digits is present.
pub fn split_reference(reference: &str) -> Option<(&str, &str)> {
    let letters_end = reference
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(reference.len());
    let (letters, digits) = reference.split_at(letters_end);
    if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((letters, digits))
}

/// Decode "B3" into `(1, 2)`.
///
/// Letters are bijective base-26 ('A' = 1 .. 'Z' = 26, no zero digit). Lowercase
/// letters are accepted. Row numbers start at 1 and must not carry leading zeros;
/// the largest accepted row number is `u32::MAX + 1`, so every zero-based `u32`
/// row has a reference.
pub fn decode(reference: &str) -> Result<(u32, u32)> {
    let malformed = || PackageError::MalformedReference(reference.to_string());
    let (letters, digits) = split_reference(reference).ok_or_else(malformed)?;
    let column = letters_to_column(letters).ok_or_else(malformed)?;
    if digits.starts_with('0') {
        return Err(malformed());
    }
    let row_number: u64 = digits.parse().map_err(|_| malformed())?;
    let row = u32::try_from(row_number - 1).map_err(|_| malformed())?;
    Ok((column, row))
}

/// Encode a zero-based `(column, row)` pair as "A1" text.
pub fn encode(column: u32, row: u32) -> String {
    format!("{}{}", column_to_letters(column), u64::from(row) + 1)
}

/// Convert a zero-based column index to letters (0 -> A, 25 -> Z, 26 -> AA).
pub fn column_to_letters(column: u32) -> String {
    let mut n = u64::from(column) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert column letters to a zero-based index. `None` on empty input,
/// non-letters, or overflow.
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col - 1)
}

/// Column letters of a reference ("U17" -> "U"), uppercased.
pub fn column_of(reference: &str) -> Result<String> {
    let (column, _) = decode(reference)?;
    Ok(column_to_letters(column))
}
