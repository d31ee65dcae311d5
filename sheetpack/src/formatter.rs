//! Output formatters for sheet listings, import results and export reports

use anyhow::Result;
use colored::*;
use sheetpack_core::{
    Diagnostic, ExportReport, ImportOutcome, Location, SheetDescriptor, SheetState,
};
use std::collections::BTreeMap;
use std::path::Path;

pub fn print_sheets_human(file_path: &Path, sheets: &[SheetDescriptor]) {
    println!("{}", format!("Workbook: {}", file_path.display()).bold());
    println!();
    for sheet in sheets {
        let state = match sheet.state {
            SheetState::Visible => "".normal(),
            SheetState::Hidden => " (hidden)".bright_black(),
            SheetState::VeryHidden => " (very hidden)".bright_black(),
        };
        println!(
            "  {:>3}  {}{}  {} {}",
            sheet.sheet_id,
            sheet.name.cyan().bold(),
            state,
            sheet.relationship_id.bright_black(),
            sheet.part.bright_black()
        );
    }
}

pub fn print_sheets_json(file_path: &Path, sheets: &[SheetDescriptor]) -> Result<()> {
    let output = serde_json::json!({
        "file": file_path.display().to_string(),
        "sheets": sheets,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Print imported records as a table, one line per record
pub fn print_import_human(file_path: &Path, outcome: &ImportOutcome) {
    println!(
        "{} {} {}",
        format!("Importing: {}", file_path.display()).bold(),
        "sheet".bright_black(),
        outcome.sheet.name.cyan().bold()
    );
    println!();

    if outcome.records.is_empty() {
        println!("{}", "No records found".yellow().bold());
    } else {
        let fields: Vec<&String> = outcome.records[0].keys().collect();
        let header: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        println!("  {}", header.join("\t").bold().underline());
        for record in &outcome.records {
            let line: Vec<String> = fields
                .iter()
                .map(|f| record.get(*f).map(|v| v.to_string()).unwrap_or_default())
                .collect();
            println!("  {}", line.join("\t"));
        }
    }
    println!();

    print_diagnostics(&outcome.diagnostics);
    println!("{}", "Summary:".bold().underline());
    println!("  {} {}", "Records:".green().bold(), outcome.records.len());
    if !outcome.diagnostics.is_empty() {
        println!("  {} {}", "Warnings:".yellow().bold(), outcome.diagnostics.len());
    }
}

pub fn print_import_json(file_path: &Path, outcome: &ImportOutcome) -> Result<()> {
    let output = serde_json::json!({
        "file": file_path.display().to_string(),
        "sheet": outcome.sheet,
        "records": outcome.records,
        "diagnostics": outcome.diagnostics,
        "summary": {
            "records": outcome.records.len(),
            "warnings": outcome.diagnostics.len(),
        }
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn print_export_human(template: &Path, output: Option<&Path>, report: &ExportReport) {
    match output {
        Some(path) => println!("{} {}", "✓ Exported to".green().bold(), path.display()),
        None => println!(
            "{} {}",
            "[DRY RUN]".yellow().bold(),
            format!("Export from '{}'", template.display()).bold()
        ),
    }
    for sheet in &report.sheets {
        println!("  {} {}", "Sheet:".bold(), sheet.name.cyan());
    }
    println!(
        "  {} {}  {} {}",
        "Cells written:".bold(),
        report.cells_written,
        "Formulas replaced:".bold(),
        report.formulas_replaced
    );
    if !report.diagnostics.is_empty() {
        println!();
        print_diagnostics(&report.diagnostics);
    }
}

/// Print warnings grouped by sheet
fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }

    let mut package_level = Vec::new();
    let mut by_sheet: BTreeMap<&str, Vec<&Diagnostic>> = BTreeMap::new();
    for diagnostic in diagnostics {
        match diagnostic.location.sheet_name() {
            Some(sheet) => by_sheet.entry(sheet).or_default().push(diagnostic),
            None => package_level.push(diagnostic),
        }
    }

    if !package_level.is_empty() {
        println!("{}", "Package warnings:".bold().underline());
        for diagnostic in package_level {
            print_diagnostic(diagnostic, 1);
        }
        println!();
    }

    for (sheet, diagnostics) in by_sheet {
        println!("{} {}", "Sheet:".bold(), sheet.cyan().bold());
        for diagnostic in diagnostics {
            let indent = match &diagnostic.location {
                Location::Cell(_, cell) => {
                    println!("  {} {}", "Cell:".bold(), cell.yellow());
                    2
                }
                Location::Row(_, row) => {
                    println!("  {} {}", "Row:".bold(), row.to_string().yellow());
                    2
                }
                _ => 1,
            };
            print_diagnostic(diagnostic, indent);
        }
        println!();
    }
}

fn print_diagnostic(diagnostic: &Diagnostic, indent: usize) {
    println!(
        "{}{} [{}] {}",
        "  ".repeat(indent),
        "WARN".yellow().bold(),
        diagnostic.kind.code().bright_black(),
        diagnostic.message
    );
}
