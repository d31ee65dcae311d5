//! Typed cell values and the decoding of raw `<c>` elements

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use super::shared_strings::SharedStringTable;
use crate::xml::XmlElement;

/// Value of one cell.
///
/// Numbers are exact decimals so amounts survive a read/write cycle without
/// rounding drift. Serialized output is untagged (null, string, or the number
/// as a string), so it is written but never read back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Absent,
    Text(String),
    Number(Decimal),
}

impl CellValue {
    pub fn text(text: impl Into<String>) -> Self {
        CellValue::Text(text.into())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, CellValue::Absent)
    }

    /// Absent, or text made only of whitespace
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Absent => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Absent => Ok(()),
            CellValue::Text(text) => write!(f, "{}", text),
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<Decimal> for CellValue {
    fn from(n: Decimal) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        CellValue::Text(text.to_string())
    }
}

impl From<String> for CellValue {
    fn from(text: String) -> Self {
        CellValue::Text(text)
    }
}

/// Parse a number written in invariant form ("1234.5", "-0.25", "1.5E-3").
///
/// Only digits, signs, the decimal point and an exponent marker are allowed;
/// digit separators such as `_` or `,` make the text a non-number.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit() || b"+-.eE".contains(&b)) {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// What a `<c>` element holds, decided once from its `t` attribute and
/// children
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellContent {
    /// No value and no inline string
    Empty,
    /// Inline string, runs already joined
    Text(String),
    /// Raw `<v>` text of a shared string cell
    SharedStringRef(String),
    /// Raw `<v>` text of any other cell type
    Number(String),
    /// Formula cell with its cached result, if one was stored
    Formula { cached: Option<String> },
}

impl CellContent {
    pub fn decode(cell: &XmlElement) -> Self {
        let value = cell.child("v").map(XmlElement::text);
        match cell.attr("t") {
            Some("inlineStr") => match cell.child("is") {
                Some(is) => CellContent::Text(inline_text(is)),
                None => value.map(CellContent::Number).unwrap_or(CellContent::Empty),
            },
            Some("s") => value
                .map(CellContent::SharedStringRef)
                .unwrap_or(CellContent::Empty),
            _ if cell.child("f").is_some() => CellContent::Formula { cached: value },
            _ => value.map(CellContent::Number).unwrap_or(CellContent::Empty),
        }
    }
}

/// Join the `<t>` runs of an `<is>` element (plain or rich text), skipping
/// phonetic runs
fn inline_text(is: &XmlElement) -> String {
    let mut text = String::new();
    for child in is.elements() {
        match child.local_name() {
            "t" => text.push_str(&child.text()),
            "r" => {
                if let Some(t) = child.child("t") {
                    text.push_str(&t.text());
                }
            }
            _ => {}
        }
    }
    text
}

/// A shared string cell whose index is not in the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptSharedStringRef {
    pub raw_index: String,
    pub table_len: usize,
}

impl fmt::Display for CorruptSharedStringRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shared string index '{}' is not in the table of {} entries",
            self.raw_index, self.table_len
        )
    }
}

/// Plain value text: a number when it parses as one, text otherwise
fn value_from_raw(raw: String) -> CellValue {
    if raw.is_empty() {
        return CellValue::Absent;
    }
    match parse_decimal(&raw) {
        Some(n) => CellValue::Number(n),
        None => CellValue::Text(raw),
    }
}

/// Read the value of a `<c>` element.
///
/// Inline strings are taken verbatim; shared string indexes are looked up in
/// `strings`; any other cell is read from `<v>` as a number when possible and as
/// text otherwise. Formula cells yield their cached result.
pub fn read_cell(
    cell: &XmlElement,
    strings: &SharedStringTable,
) -> Result<CellValue, CorruptSharedStringRef> {
    match CellContent::decode(cell) {
        CellContent::Empty => Ok(CellValue::Absent),
        CellContent::Text(text) => Ok(CellValue::Text(text)),
        CellContent::SharedStringRef(raw) => match strings.resolve(&raw) {
            Some(text) => Ok(CellValue::Text(text.to_string())),
            None => Err(CorruptSharedStringRef {
                raw_index: raw,
                table_len: strings.len(),
            }),
        },
        CellContent::Number(raw) => Ok(value_from_raw(raw)),
        CellContent::Formula { cached } => Ok(cached.map(value_from_raw).unwrap_or_default()),
    }
}
