//! Template export: write records into a copy of a template workbook
//!
//! The template file is only ever read. The filled package is saved to the
//! destination atomically, so a failed export leaves both the template and any
//! previous destination file as they were.

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use serde::Serialize;

use crate::config::ExportProfile;
use crate::diagnostic::Diagnostic;
use crate::error::{PackageError, Result};
use crate::import::Record;
use crate::package::{Package, SheetDescriptor};
use crate::writer::{
    SheetAllocator, clone_worksheet_for_record, drop_calc_chain, remove_sheet, request_full_recalc,
    set_cell,
};

/// What an export wrote
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    /// Sheets that received record values
    pub sheets: Vec<SheetDescriptor>,
    pub cells_written: usize,
    /// Cells whose formula was replaced by a value
    pub formulas_replaced: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Fill the template sheet with one record and save the result to `dest`
pub fn export_record<P: AsRef<Path>, Q: AsRef<Path>>(
    template: P,
    dest: Q,
    record: &Record,
    profile: &ExportProfile,
) -> Result<ExportReport> {
    let mut package = Package::open(template)?;
    let report = fill_template(&mut package, record, profile)?;
    package.save_as(dest)?;
    Ok(report)
}

/// Write one record into the template sheet of an opened package
pub fn fill_template<R: Read + Seek>(
    package: &mut Package<R>,
    record: &Record,
    profile: &ExportProfile,
) -> Result<ExportReport> {
    let selection = package.resolve_named_sheet(&profile.sheet_names)?;
    let mut report = ExportReport {
        diagnostics: selection.fallback.into_iter().collect(),
        ..Default::default()
    };
    write_record(package, &selection.sheet, record, &profile.cells, &mut report)?;
    report.sheets.push(selection.sheet);
    finish(package, &report)?;
    Ok(report)
}

/// Clone the template sheet once per record, fill each clone, and save the
/// result to `dest`.
///
/// `cancel` is checked before each record; once raised the export stops with
/// [`PackageError::Cancelled`] and nothing is written.
pub fn export_records<P: AsRef<Path>, Q: AsRef<Path>>(
    template: P,
    dest: Q,
    records: &[Record],
    profile: &ExportProfile,
    cancel: Option<&AtomicBool>,
) -> Result<ExportReport> {
    let mut package = Package::open(template)?;
    let report = fill_per_record_sheets(&mut package, records, profile, cancel)?;
    package.save_as(dest)?;
    Ok(report)
}

pub fn fill_per_record_sheets<R: Read + Seek>(
    package: &mut Package<R>,
    records: &[Record],
    profile: &ExportProfile,
    cancel: Option<&AtomicBool>,
) -> Result<ExportReport> {
    let selection = package.resolve_named_sheet(&profile.sheet_names)?;
    let template = selection.sheet;
    let mut report = ExportReport {
        diagnostics: selection.fallback.into_iter().collect(),
        ..Default::default()
    };
    let mut allocator = SheetAllocator::from_package(package)?;

    for (index, record) in records.iter().enumerate() {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            info!("export cancelled after {} record(s)", index);
            return Err(PackageError::Cancelled { completed: index });
        }
        let desired = sheet_name_for(record, profile, &template, index);
        let sheet = clone_worksheet_for_record(package, &mut allocator, &template, &desired)?;
        write_record(package, &sheet, record, &profile.cells, &mut report)?;
        report.sheets.push(sheet);
    }

    // The template is the only sheet left when there were no records
    if !profile.keep_template_sheet && !records.is_empty() {
        remove_sheet(package, &mut allocator, &template)?;
    }
    finish(package, &report)?;
    Ok(report)
}

/// Display name for the sheet of record `index`: the configured name field
/// when it has a value, otherwise "<template> <n>"
fn sheet_name_for(
    record: &Record,
    profile: &ExportProfile,
    template: &SheetDescriptor,
    index: usize,
) -> String {
    profile
        .sheet_name_field
        .as_ref()
        .and_then(|field| record.get(field))
        .filter(|value| !value.is_blank())
        .map(|value| value.to_string())
        .unwrap_or_else(|| format!("{} {}", template.name, index + 1))
}

/// Set every mapped cell whose field is present in `record`. Fields missing
/// from the record leave the template cell alone; an explicit `Absent` clears
/// it.
fn write_record<R: Read + Seek>(
    package: &mut Package<R>,
    sheet: &SheetDescriptor,
    record: &Record,
    cells: &BTreeMap<String, String>,
    report: &mut ExportReport,
) -> Result<()> {
    let worksheet = package.document_mut(&sheet.part)?;
    for (reference, field) in cells {
        let Some(value) = record.get(field) else {
            debug!("{}: no value for field '{}', {} left as is", sheet.name, field, reference);
            continue;
        };
        if set_cell(worksheet, reference, value)? {
            report.formulas_replaced += 1;
        }
        report.cells_written += 1;
    }
    Ok(())
}

fn finish<R: Read + Seek>(package: &mut Package<R>, report: &ExportReport) -> Result<()> {
    if report.formulas_replaced > 0 {
        drop_calc_chain(package)?;
    }
    request_full_recalc(package)
}
