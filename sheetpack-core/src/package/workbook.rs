use std::collections::HashMap;
use std::io::{Read, Seek};

use serde::Serialize;

use super::Package;
use super::relationships::{RelationshipKind, rels_path_for};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Location};
use crate::error::{PackageError, Result};
use crate::xml::XmlElement;

/// Used only when the package has no root relationships part at all
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// Visibility of a sheet as declared in the workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetState {
    Visible,
    Hidden,
    VeryHidden,
}

impl SheetState {
    fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some("hidden") => SheetState::Hidden,
            Some("veryHidden") => SheetState::VeryHidden,
            _ => SheetState::Visible,
        }
    }
}

/// A worksheet as declared in the workbook, with its backing part
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetDescriptor {
    pub name: String,
    pub relationship_id: String,
    pub sheet_id: u32,
    /// Package path of the worksheet part
    pub part: String,
    pub state: SheetState,
}

/// Outcome of looking a sheet up by preferred names
#[derive(Debug, Clone)]
pub struct SheetSelection {
    pub sheet: SheetDescriptor,
    /// Set when none of the preferred names matched and the first sheet was used
    pub fallback: Option<Diagnostic>,
}

/// Relationship id attribute of a `<sheet>` element (`r:id`, whatever the
/// prefix is bound to)
pub(crate) fn sheet_relationship_attr(sheet: &XmlElement) -> Option<(&str, &str)> {
    sheet
        .attributes
        .iter()
        .find(|(key, _)| key.ends_with(":id"))
        .map(|(key, value)| (key.as_str(), value.as_str()))
}

fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl<R: Read + Seek> Package<R> {
    /// Path of the workbook part, found through the package's root
    /// relationships
    pub fn workbook_part(&mut self) -> Result<String> {
        let root_rels = rels_path_for("");
        if !self.has_part(&root_rels) {
            if self.has_part(DEFAULT_WORKBOOK_PART) {
                return Ok(DEFAULT_WORKBOOK_PART.to_string());
            }
            return Err(PackageError::MissingPart(root_rels));
        }
        self.relationship_of_kind("", RelationshipKind::OfficeDocument)?
            .map(|rel| rel.target)
            .ok_or_else(|| PackageError::MissingPart(format!("{} (officeDocument relationship)", root_rels)))
    }

    /// All sheets in workbook order
    pub fn sheets(&mut self) -> Result<Vec<SheetDescriptor>> {
        let workbook = self.workbook_part()?;
        let targets: HashMap<String, String> = self
            .relationships(&workbook)?
            .into_iter()
            .map(|rel| (rel.id, rel.target))
            .collect();
        let rels_path = rels_path_for(&workbook);

        let doc = self.document(&workbook)?;
        let sheets = doc
            .root
            .child("sheets")
            .ok_or_else(|| PackageError::malformed(&workbook, "no <sheets> element"))?;

        let mut out = Vec::new();
        for sheet in sheets.children_named("sheet") {
            let name = sheet
                .attr("name")
                .ok_or_else(|| PackageError::malformed(&workbook, "sheet without name"))?;
            let sheet_id = sheet
                .attr("sheetId")
                .and_then(|id| id.parse::<u32>().ok())
                .ok_or_else(|| {
                    PackageError::malformed(&workbook, format!("sheet '{}' has no valid sheetId", name))
                })?;
            let (_, rel_id) = sheet_relationship_attr(sheet).ok_or_else(|| {
                PackageError::malformed(&workbook, format!("sheet '{}' has no relationship id", name))
            })?;
            let part = targets.get(rel_id).cloned().ok_or_else(|| {
                PackageError::MissingPart(format!("{} (relationship {})", rels_path, rel_id))
            })?;
            out.push(SheetDescriptor {
                name: name.to_string(),
                relationship_id: rel_id.to_string(),
                sheet_id,
                part,
                state: SheetState::from_attr(sheet.attr("state")),
            });
        }
        Ok(out)
    }

    /// Look up a sheet by display name, ignoring case
    pub fn sheet_by_name(&mut self, name: &str) -> Result<Option<SheetDescriptor>> {
        Ok(self.sheets()?.into_iter().find(|s| names_match(&s.name, name)))
    }

    /// Pick the first sheet whose name matches one of `preferred`, trying the
    /// names in order. When nothing matches the first declared sheet is used and
    /// a `UsedFallbackSheet` diagnostic is attached.
    pub fn resolve_named_sheet<S: AsRef<str>>(&mut self, preferred: &[S]) -> Result<SheetSelection> {
        let sheets = self.sheets()?;
        for wanted in preferred {
            if let Some(sheet) = sheets.iter().find(|s| names_match(&s.name, wanted.as_ref())) {
                return Ok(SheetSelection {
                    sheet: sheet.clone(),
                    fallback: None,
                });
            }
        }

        let first = sheets.into_iter().next().ok_or_else(|| {
            PackageError::MissingPart("worksheet (workbook declares no sheets)".to_string())
        })?;
        let fallback = if preferred.is_empty() {
            None
        } else {
            let wanted: Vec<&str> = preferred.iter().map(|s| s.as_ref()).collect();
            let diagnostic = Diagnostic::new(
                DiagnosticKind::UsedFallbackSheet,
                Location::Sheet(first.name.clone()),
                format!(
                    "expected sheet {} not found, used '{}' instead",
                    wanted.join(" / "),
                    first.name
                ),
            );
            diagnostic.log();
            Some(diagnostic)
        };
        Ok(SheetSelection {
            sheet: first,
            fallback,
        })
    }
}
