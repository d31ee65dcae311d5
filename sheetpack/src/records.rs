//! Records file for the export command: a JSON array of objects, or a single
//! object

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde_json::Value;
use sheetpack_core::{CellValue, Record};
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub fn from_file(path: &Path) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read records from {}", path.display()))?;
    parse(&content).with_context(|| format!("Invalid records file {}", path.display()))
}

pub fn parse(content: &str) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_str(content)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| to_record(item).with_context(|| format!("Record #{}", i + 1)))
            .collect(),
        Value::Object(_) => Ok(vec![to_record(value)?]),
        _ => anyhow::bail!("Expected an array of objects or a single object"),
    }
}

fn to_record(value: Value) -> Result<Record> {
    let Value::Object(fields) = value else {
        anyhow::bail!("Expected an object");
    };
    fields
        .into_iter()
        .map(|(name, value)| {
            let cell = to_cell_value(&value).with_context(|| format!("Field '{}'", name))?;
            Ok((name, cell))
        })
        .collect()
}

fn to_cell_value(value: &Value) -> Result<CellValue> {
    Ok(match value {
        Value::Null => CellValue::Absent,
        Value::String(text) => CellValue::Text(text.clone()),
        Value::Bool(flag) => CellValue::Text(flag.to_string()),
        Value::Number(n) => {
            let text = n.to_string();
            let number = Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .with_context(|| format!("Number {} does not fit a decimal", text))?;
            CellValue::Number(number)
        }
        Value::Array(_) | Value::Object(_) => anyhow::bail!("Nested values are not supported"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records() {
        let records = parse(r#"[{"customer": "ACME", "total": 125000.5, "note": null}, {"total": 3}]"#).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["customer"], CellValue::text("ACME"));
        assert_eq!(records[0]["total"], CellValue::Number(Decimal::from_str("125000.5").unwrap()));
        assert_eq!(records[0]["note"], CellValue::Absent);
        assert_eq!(records[1]["total"], CellValue::Number(Decimal::from(3)));
    }

    #[test]
    fn test_parse_single_object() {
        assert_eq!(parse(r#"{"a": "x"}"#).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_rejects_nested_values() {
        assert!(parse(r#"[{"a": [1, 2]}]"#).is_err());
        assert!(parse(r#"[1, 2]"#).is_err());
        assert!(parse("42").is_err());
    }
}
