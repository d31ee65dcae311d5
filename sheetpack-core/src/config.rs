//! Profile configuration: which sheet and columns an import reads, which cells
//! an export fills

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::address::{decode, letters_to_column};
use crate::reader::ExtractOptions;

/// A profile file with an optional import and an optional export section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub import: Option<ImportProfile>,
    #[serde(default)]
    pub export: Option<ExportProfile>,
}

impl Profile {
    /// Load a profile from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid profile {}", path.display()))
    }

    /// Parse and validate profile text
    pub fn parse(content: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(content)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(import) = &self.import {
            import.validate()?;
        }
        if let Some(export) = &self.export {
            export.validate()?;
        }
        Ok(())
    }
}

/// How a field's cell value is handed to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Numbers, including numeric text with ',' grouping separators
    Number,
    /// Text; numbers are rendered in invariant form
    Text,
    /// The cell value as read
    #[default]
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Column letters, e.g. "U"
    pub column: String,
    #[serde(default)]
    pub kind: FieldKind,
}

fn default_start_row() -> u32 {
    1
}

/// Import section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProfile {
    /// Preferred sheet names, tried in order, case-insensitively
    #[serde(default)]
    pub sheet_names: Vec<String>,
    /// First 1-based row holding data
    #[serde(default = "default_start_row")]
    pub start_row: u32,
    /// Rows with none of these fields set are skipped
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

impl Default for ImportProfile {
    fn default() -> Self {
        Self {
            sheet_names: Vec::new(),
            start_row: default_start_row(),
            required_fields: Vec::new(),
            fields: BTreeMap::new(),
        }
    }
}

impl ImportProfile {
    pub fn validate(&self) -> Result<()> {
        if self.start_row == 0 {
            anyhow::bail!("Configuration error: import start_row must be at least 1");
        }
        if self.fields.is_empty() {
            anyhow::bail!("Configuration error: import profile declares no fields");
        }
        for (name, spec) in &self.fields {
            if letters_to_column(&spec.column).is_none() {
                anyhow::bail!(
                    "Configuration error: field '{}' has invalid column '{}'",
                    name,
                    spec.column
                );
            }
        }
        for field in &self.required_fields {
            if !self.fields.contains_key(field) {
                anyhow::bail!(
                    "Configuration error: required field '{}' is not declared in import fields",
                    field
                );
            }
        }
        Ok(())
    }

    /// Row extraction options: required columns come from the required
    /// fields, and only declared columns are read
    pub fn extract_options(&self) -> ExtractOptions {
        let required = self
            .required_fields
            .iter()
            .filter_map(|field| self.fields.get(field))
            .map(|spec| spec.column.as_str());
        let columns = self.fields.values().map(|spec| spec.column.as_str());
        ExtractOptions::new(self.start_row).require(required).only(columns)
    }
}

/// Export section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportProfile {
    /// Preferred template sheet names, tried in order, case-insensitively
    #[serde(default)]
    pub sheet_names: Vec<String>,
    /// Record field used as the display name of per-record sheets
    #[serde(default)]
    pub sheet_name_field: Option<String>,
    /// Keep the template sheet after per-record sheets were cloned from it
    #[serde(default)]
    pub keep_template_sheet: bool,
    /// Cell reference -> record field
    #[serde(default)]
    pub cells: BTreeMap<String, String>,
}

impl ExportProfile {
    pub fn validate(&self) -> Result<()> {
        if self.cells.is_empty() {
            anyhow::bail!("Configuration error: export profile declares no cells");
        }
        for reference in self.cells.keys() {
            decode(reference).with_context(|| {
                format!("Configuration error: invalid export cell '{}'", reference)
            })?;
        }
        Ok(())
    }
}
