//! Row extraction: worksheet rows to records keyed by column letter

use std::collections::{BTreeMap, HashSet};
use std::slice;

use log::debug;

use super::cell::{CellValue, read_cell};
use super::shared_strings::SharedStringTable;
use crate::address::{column_to_letters, decode};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Location};
use crate::xml::{XmlDocument, XmlElement, XmlNode};

static ABSENT: CellValue = CellValue::Absent;

/// One worksheet row. Only cells with a value are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    /// 1-based row number
    pub row_number: u32,
    pub values: BTreeMap<String, CellValue>,
}

impl RowRecord {
    /// Value in `column` (letters, any case), `Absent` when the row has none
    pub fn get(&self, column: &str) -> &CellValue {
        self.values
            .get(&column.to_ascii_uppercase())
            .unwrap_or(&ABSENT)
    }
}

/// Which rows and columns to extract
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// First 1-based row number to consider
    pub start_row: u32,
    /// A row is emitted only if one of these columns has a non-blank value.
    /// With no required columns, any non-blank value will do.
    pub required_columns: Vec<String>,
    /// Restrict the columns read. Required columns are always read.
    pub columns: Option<HashSet<String>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            start_row: 1,
            required_columns: Vec::new(),
            columns: None,
        }
    }
}

impl ExtractOptions {
    pub fn new(start_row: u32) -> Self {
        Self {
            start_row,
            ..Default::default()
        }
    }

    pub fn require<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.required_columns = columns
            .into_iter()
            .map(|c| c.as_ref().to_ascii_uppercase())
            .collect();
        self
    }

    pub fn only<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.columns = Some(
            columns
                .into_iter()
                .map(|c| c.as_ref().to_ascii_uppercase())
                .collect(),
        );
        self
    }

    fn reads(&self, column: &str) -> bool {
        match &self.columns {
            None => true,
            Some(columns) => {
                columns.contains(column) || self.required_columns.iter().any(|c| c == column)
            }
        }
    }

    fn accepts(&self, record: &RowRecord) -> bool {
        if self.required_columns.is_empty() {
            record.values.values().any(|v| !v.is_blank())
        } else {
            self.required_columns.iter().any(|c| !record.get(c).is_blank())
        }
    }
}

/// Lazy iterator over the accepted rows of one worksheet.
///
/// Rows are visited in document order. Rows before the start row, blank rows
/// and rows failing the required-column check are skipped. Unparseable row
/// numbers and cell references skip the row or cell and leave a diagnostic;
/// so do shared string indexes outside the table, which read as `Absent`.
pub struct RowExtractor<'a> {
    sheet: String,
    rows: Option<slice::Iter<'a, XmlNode>>,
    strings: &'a SharedStringTable,
    options: &'a ExtractOptions,
    previous_row: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> RowExtractor<'a> {
    pub fn new(
        sheet: impl Into<String>,
        worksheet: &'a XmlDocument,
        strings: &'a SharedStringTable,
        options: &'a ExtractOptions,
    ) -> Self {
        let rows = worksheet
            .root
            .child("sheetData")
            .map(|data| data.children.iter());
        Self {
            sheet: sheet.into(),
            rows,
            strings,
            options,
            previous_row: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Problems found so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn report(&mut self, kind: DiagnosticKind, location: Location, message: String) {
        let diagnostic = Diagnostic::new(kind, location, message);
        diagnostic.log();
        self.diagnostics.push(diagnostic);
    }

    fn build_row(&mut self, row: &XmlElement, row_number: u32) -> RowRecord {
        let mut values = BTreeMap::new();
        let mut next_column = 0u32;

        for cell in row.children_named("c") {
            let column = match cell.attr("r") {
                Some(reference) => match decode(reference) {
                    Ok((column, _)) => column,
                    Err(_) => {
                        self.report(
                            DiagnosticKind::MalformedReference,
                            Location::Cell(self.sheet.clone(), reference.to_string()),
                            format!("cell reference '{}' cannot be parsed, cell skipped", reference),
                        );
                        continue;
                    }
                },
                None => next_column,
            };
            next_column = column.saturating_add(1);

            let letters = column_to_letters(column);
            if !self.options.reads(&letters) {
                continue;
            }
            let value = match read_cell(cell, self.strings) {
                Ok(value) => value,
                Err(corrupt) => {
                    self.report(
                        DiagnosticKind::CorruptSharedStringRef,
                        Location::Cell(self.sheet.clone(), format!("{}{}", letters, row_number)),
                        format!("{}, read as empty", corrupt),
                    );
                    CellValue::Absent
                }
            };
            if !value.is_absent() {
                values.insert(letters, value);
            }
        }

        RowRecord { row_number, values }
    }
}

impl Iterator for RowExtractor<'_> {
    type Item = RowRecord;

    fn next(&mut self) -> Option<RowRecord> {
        loop {
            let row = match self.rows.as_mut()?.next()? {
                XmlNode::Element(el) if el.local_name() == "row" => el,
                _ => continue,
            };

            let row_number = match row.attr("r") {
                None => self.previous_row.saturating_add(1),
                Some(text) => match text.parse::<u32>() {
                    Ok(n) if n >= 1 => n,
                    _ => {
                        self.report(
                            DiagnosticKind::MalformedReference,
                            Location::Row(self.sheet.clone(), self.previous_row.saturating_add(1)),
                            format!("row number '{}' cannot be parsed, row skipped", text),
                        );
                        continue;
                    }
                },
            };
            self.previous_row = row_number;

            if row_number < self.options.start_row {
                continue;
            }

            let record = self.build_row(row, row_number);
            if self.options.accepts(&record) {
                return Some(record);
            }
            debug!("'{}' row {} has no key value, skipped", self.sheet, row_number);
        }
    }
}
