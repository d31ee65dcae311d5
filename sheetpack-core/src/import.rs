//! Table import: one record per accepted worksheet row, keyed by field name

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::config::{FieldKind, ImportProfile};
use crate::diagnostic::Diagnostic;
use crate::error::Result;
use crate::package::{Package, SheetDescriptor};
use crate::reader::{CellValue, RowExtractor, RowRecord, SharedStringTable, parse_decimal};

/// Field name -> value
pub type Record = BTreeMap<String, CellValue>;

/// Result of importing one sheet
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    /// The sheet the records were read from
    pub sheet: SheetDescriptor,
    pub records: Vec<Record>,
    /// Non-fatal problems, in the order they were found
    pub diagnostics: Vec<Diagnostic>,
}

/// Open the package at `path` and import the sheet described by `profile`
pub fn import_table<P: AsRef<Path>>(path: P, profile: &ImportProfile) -> Result<ImportOutcome> {
    let mut package = Package::open(path)?;
    import_from_package(&mut package, profile)
}

pub fn import_from_package<R: Read + Seek>(
    package: &mut Package<R>,
    profile: &ImportProfile,
) -> Result<ImportOutcome> {
    let selection = package.resolve_named_sheet(&profile.sheet_names)?;
    let mut diagnostics: Vec<Diagnostic> = selection.fallback.into_iter().collect();
    let sheet = selection.sheet;

    let strings = SharedStringTable::load(package)?;
    let options = profile.extract_options();
    let worksheet = package.document(&sheet.part)?;

    let mut rows = RowExtractor::new(&sheet.name, worksheet, &strings, &options);
    let records: Vec<Record> = rows.by_ref().map(|row| to_record(&row, profile)).collect();
    diagnostics.extend(rows.into_diagnostics());

    debug!(
        "imported {} record(s) from '{}' ({} warning(s))",
        records.len(),
        sheet.name,
        diagnostics.len()
    );
    Ok(ImportOutcome {
        sheet,
        records,
        diagnostics,
    })
}

/// Every declared field gets an entry; fields without a value are `Absent`
fn to_record(row: &RowRecord, profile: &ImportProfile) -> Record {
    profile
        .fields
        .iter()
        .map(|(name, spec)| (name.clone(), convert_field(spec.kind, row.get(&spec.column))))
        .collect()
}

/// Convert a cell value to what a field of `kind` expects.
///
/// Number fields accept numeric text with ',' grouping separators and
/// surrounding whitespace; text that still does not parse is kept as text.
/// Blank text reads as `Absent` for number and text fields.
pub fn convert_field(kind: FieldKind, value: &CellValue) -> CellValue {
    match (kind, value) {
        (FieldKind::Raw, value) => value.clone(),
        (_, value) if value.is_blank() => CellValue::Absent,
        (FieldKind::Number, CellValue::Text(text)) => {
            let cleaned: String = text
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            parse_decimal(&cleaned)
                .map(CellValue::Number)
                .unwrap_or_else(|| value.clone())
        }
        (FieldKind::Text, CellValue::Number(n)) => CellValue::Text(n.to_string()),
        (_, value) => value.clone(),
    }
}
