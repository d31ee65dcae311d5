mod common;

use common::{MockSheet, create_mock_xlsx, read_entry};
use rust_decimal::Decimal;
use sheetpack_core::writer::find_cell;
use sheetpack_core::{
    CellValue, ExportProfile, FieldKind, FieldSpec, ImportProfile, Package, PackageError, Record,
    export_record, export_records, import_table,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;

const INVOICE_SHEET: &str = r#"<dimension ref="A1:H13"/><sheetViews><sheetView tabSelected="1" workbookViewId="0"/></sheetViews><sheetData><row r="4" spans="1:8"><c r="B4" s="2" t="s"><v>0</v></c></row><row r="13" spans="1:8"><c r="G13" s="4" t="s"><v>1</v></c><c r="H13" s="9"><v>0</v></c></row></sheetData><mergeCells count="1"><mergeCell ref="B4:D4"/></mergeCells>"#;

fn invoice_template(path: &std::path::Path) -> anyhow::Result<()> {
    create_mock_xlsx(
        path,
        &[MockSheet {
            name: "Invoice",
            body: INVOICE_SHEET,
        }],
        Some(["Customer name", "Total"].as_slice()),
    )
}

fn profile() -> ExportProfile {
    let mut cells = BTreeMap::new();
    cells.insert("H13".to_string(), "total".to_string());
    cells.insert("B4".to_string(), "customer".to_string());
    ExportProfile {
        sheet_names: vec!["invoice".to_string()],
        sheet_name_field: Some("customer".to_string()),
        keep_template_sheet: false,
        cells,
    }
}

fn record(customer: &str, total: &str) -> Record {
    let mut record = Record::new();
    record.insert("customer".to_string(), CellValue::text(customer));
    record.insert(
        "total".to_string(),
        CellValue::Number(Decimal::from_str(total).unwrap()),
    );
    record
}

#[test]
fn test_export_single_record() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let template = dir.path().join("template.xlsx");
    let output = dir.path().join("out.xlsx");
    invoice_template(&template)?;
    let before = std::fs::read(&template)?;

    let report = export_record(&template, &output, &record("ACME Ltd.", "125000.00"), &profile())?;
    assert_eq!(report.cells_written, 2);
    assert_eq!(report.formulas_replaced, 0);
    assert!(report.diagnostics.is_empty());

    // Template untouched
    assert_eq!(std::fs::read(&template)?, before);

    let mut package = Package::open(&output)?;
    let sheet = package.document("xl/worksheets/sheet1.xml")?;
    let total = find_cell(sheet, "H13")?.expect("H13 exists");
    assert_eq!(total.attr("s"), Some("9"));
    assert_eq!(total.child("v").map(|v| v.text()), Some("125000.00".to_string()));
    let customer = find_cell(sheet, "B4")?.expect("B4 exists");
    assert_eq!(customer.attr("s"), Some("2"));
    assert_eq!(customer.attr("t"), Some("inlineStr"));

    // Unrelated structure and shared strings survive
    let xml = read_entry(&output, "xl/worksheets/sheet1.xml")?;
    assert!(xml.contains(r#"<mergeCell ref="B4:D4"/>"#));
    assert!(xml.contains(r#"<c r="G13" s="4" t="s"><v>1</v></c>"#));
    assert_eq!(
        read_entry(&output, "xl/sharedStrings.xml")?,
        read_entry(&template, "xl/sharedStrings.xml")?
    );
    assert!(read_entry(&output, "xl/workbook.xml")?.contains(r#"fullCalcOnLoad="1""#));
    Ok(())
}

#[test]
fn test_exported_amount_reads_back_exactly() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let template = dir.path().join("template.xlsx");
    let output = dir.path().join("out.xlsx");
    invoice_template(&template)?;
    export_record(&template, &output, &record("ACME", "125000.00"), &profile())?;

    let mut fields = BTreeMap::new();
    fields.insert(
        "total".to_string(),
        FieldSpec {
            column: "H".to_string(),
            kind: FieldKind::Number,
        },
    );
    let import = ImportProfile {
        sheet_names: vec!["Invoice".to_string()],
        start_row: 13,
        required_fields: vec!["total".to_string()],
        fields,
    };
    let outcome = import_table(&output, &import)?;
    let total = outcome.records[0]["total"].as_decimal().expect("numeric total");
    assert_eq!(total, Decimal::from_str("125000.00")?);
    assert_eq!(total.to_string(), "125000.00");
    Ok(())
}

#[test]
fn test_export_per_record_sheets() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let template = dir.path().join("template.xlsx");
    let output = dir.path().join("batch.xlsx");
    invoice_template(&template)?;

    let records = vec![
        record("ACME: North/South", "10.00"),
        record("ACME North South", "20.50"),
        record("Globex", "30"),
    ];
    let report = export_records(&template, &output, &records, &profile(), None)?;
    assert_eq!(report.sheets.len(), 3);
    assert_eq!(report.cells_written, 6);

    let mut package = Package::open(&output)?;
    let sheets = package.sheets()?;
    let names: Vec<_> = sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["ACME NorthSouth", "ACME North South", "Globex"]
    );
    assert!(!package.has_part("xl/worksheets/sheet1.xml"));

    for (sheet, expected) in sheets.iter().zip(["10.00", "20.50", "30"]) {
        let doc = package.document(&sheet.part)?;
        let total = find_cell(doc, "H13")?.expect("H13 exists");
        assert_eq!(total.child("v").map(|v| v.text()), Some(expected.to_string()));
        assert_eq!(total.attr("s"), Some("9"));
        assert!(!read_entry(&output, &sheet.part)?.contains("tabSelected"));
    }
    Ok(())
}

#[test]
fn test_export_cancelled_writes_nothing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let template = dir.path().join("template.xlsx");
    let output = dir.path().join("batch.xlsx");
    invoice_template(&template)?;

    let cancel = AtomicBool::new(true);
    let result = export_records(&template, &output, &[record("A", "1")], &profile(), Some(&cancel));
    assert!(matches!(result, Err(PackageError::Cancelled { completed: 0 })));
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_export_bad_reference_keeps_previous_output() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let template = dir.path().join("template.xlsx");
    let output = dir.path().join("out.xlsx");
    invoice_template(&template)?;
    std::fs::write(&output, b"previous")?;

    let mut bad = profile();
    bad.cells.insert("13H".to_string(), "total".to_string());
    let result = export_record(&template, &output, &record("A", "1"), &bad);
    assert!(matches!(result, Err(PackageError::MalformedReference(_))));
    assert_eq!(std::fs::read(&output)?, b"previous");
    Ok(())
}
