//! Worksheet cloning and the per-session allocator behind it

use std::collections::HashSet;
use std::io::{Read, Seek};
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use super::workbook::clear_tab_selected;
use crate::error::{PackageError, Result};
use crate::package::{
    Package, RelationshipKind, SheetDescriptor, SheetState, WORKSHEET_CONTENT_TYPE,
    relationship_number, rels_path_for, sheet_relationship_attr,
};
use crate::xml::XmlElement;

/// Longest display name a sheet may have
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Characters a sheet display name may not contain
pub const RESERVED_NAME_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];

/// Highest " (n)" suffix tried before giving up on a name
const MAX_NAME_SUFFIX: u32 = 9999;

fn sheet_part_pattern() -> &'static Regex {
    static SHEET_PART: OnceLock<Regex> = OnceLock::new();
    SHEET_PART.get_or_init(|| Regex::new(r"(?i)(?:^|/)sheet(\d+)\.xml$").unwrap())
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Make `desired` usable as a sheet display name: reserved and control
/// characters are dropped, leading/trailing apostrophes and whitespace are
/// trimmed, and the result is cut to 31 characters. An empty result becomes
/// "Sheet".
pub fn legalize_sheet_name(desired: &str) -> String {
    let cleaned: String = desired
        .chars()
        .filter(|c| !RESERVED_NAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let trimmed = cleaned.trim().trim_matches('\'').trim();
    let name = truncate_chars(trimmed, MAX_SHEET_NAME_LEN)
        .trim_end()
        .trim_end_matches('\'');
    if name.is_empty() {
        "Sheet".to_string()
    } else {
        name.to_string()
    }
}

/// Everything that must stay unique while sheets are added to one package:
/// worksheet part numbers, workbook relationship ids, sheet ids and display
/// names.
///
/// Build one per export session and pass it to every clone call.
#[derive(Debug, Clone, Default)]
pub struct SheetAllocator {
    workbook_part: String,
    used_part_numbers: HashSet<u32>,
    used_relationship_ids: HashSet<String>,
    max_sheet_id: u32,
    /// Lowercased, names compare case-insensitively
    used_names: HashSet<String>,
}

impl SheetAllocator {
    /// Snapshot the identifiers already used in `package`
    pub fn from_package<R: Read + Seek>(package: &mut Package<R>) -> Result<Self> {
        let workbook_part = package.workbook_part()?;
        let used_part_numbers = package
            .part_names()
            .filter_map(|name| sheet_part_pattern().captures(name))
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .collect();
        let used_relationship_ids = package
            .relationships(&workbook_part)?
            .into_iter()
            .map(|rel| rel.id)
            .collect();
        let sheets = package.sheets()?;
        let max_sheet_id = sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0);
        let used_names = sheets.iter().map(|s| s.name.to_lowercase()).collect();

        Ok(Self {
            workbook_part,
            used_part_numbers,
            used_relationship_ids,
            max_sheet_id,
            used_names,
        })
    }

    pub fn workbook_part(&self) -> &str {
        &self.workbook_part
    }

    /// Lowest unused worksheet part number, starting at 1
    pub fn next_part_number(&mut self) -> u32 {
        let mut n = 1;
        while self.used_part_numbers.contains(&n) {
            n += 1;
        }
        self.used_part_numbers.insert(n);
        n
    }

    /// Lowest unused "rIdN" in the workbook relationships
    pub fn next_relationship_id(&mut self) -> String {
        let used: HashSet<u32> = self
            .used_relationship_ids
            .iter()
            .filter_map(|id| relationship_number(id))
            .collect();
        let mut n = 1;
        while used.contains(&n) || self.used_relationship_ids.contains(&format!("rId{}", n)) {
            n += 1;
        }
        let id = format!("rId{}", n);
        self.used_relationship_ids.insert(id.clone());
        id
    }

    /// One more than the highest sheet id handed out so far
    pub fn next_sheet_id(&mut self) -> u32 {
        self.max_sheet_id += 1;
        self.max_sheet_id
    }

    /// Legalize `desired` and make it unique, appending " (2)", " (3)", ... and
    /// shortening the base so the result still fits in 31 characters.
    pub fn unique_name(&mut self, desired: &str) -> Result<String> {
        let base = legalize_sheet_name(desired);
        if self.claim_name(&base) {
            return Ok(base);
        }
        for n in 2..=MAX_NAME_SUFFIX {
            let suffix = format!(" ({})", n);
            let room = MAX_SHEET_NAME_LEN - suffix.chars().count();
            let candidate = format!("{}{}", truncate_chars(&base, room).trim_end(), suffix);
            if self.claim_name(&candidate) {
                return Ok(candidate);
            }
        }
        Err(PackageError::NameCollision(desired.to_string()))
    }

    fn claim_name(&mut self, name: &str) -> bool {
        self.used_names.insert(name.to_lowercase())
    }

    /// Make a display name available again after its sheet was removed
    pub fn release_name(&mut self, name: &str) {
        self.used_names.remove(&name.to_lowercase());
    }
}

/// Duplicate `base` into a new worksheet part and register it in the workbook
/// as a visible sheet named after `desired_name`.
///
/// The base part and its relationships are copied byte for byte. The copy gets
/// the lowest free part number, a new workbook relationship, a new sheet id and
/// a content type override.
pub fn clone_worksheet_for_record<R: Read + Seek>(
    package: &mut Package<R>,
    allocator: &mut SheetAllocator,
    base: &SheetDescriptor,
    desired_name: &str,
) -> Result<SheetDescriptor> {
    // 1. Name first so a collision leaves the package untouched
    let name = allocator.unique_name(desired_name)?;

    // 2. Copy the worksheet part and its relationships
    let number = allocator.next_part_number();
    let part = match base.part.rsplit_once('/') {
        Some((dir, _)) => format!("{}/sheet{}.xml", dir, number),
        None => format!("sheet{}.xml", number),
    };
    let bytes = package.read_part(&base.part)?.to_vec();
    package.put_part(&part, bytes);
    let base_rels = rels_path_for(&base.part);
    if package.has_part(&base_rels) {
        let rels = package.read_part(&base_rels)?.to_vec();
        package.put_part(&rels_path_for(&part), rels);
    }
    clear_tab_selected(package, &part)?;

    // 3. Workbook relationship and <sheet> entry
    let workbook = allocator.workbook_part().to_string();
    let relationship_id = allocator.next_relationship_id();
    let sheet_id = allocator.next_sheet_id();
    package.insert_relationship(&workbook, &relationship_id, RelationshipKind::Worksheet, &part)?;

    let doc = package.document_mut(&workbook)?;
    let sheets = doc
        .root
        .child_mut("sheets")
        .ok_or_else(|| PackageError::malformed(&workbook, "no <sheets> element"))?;
    let id_key = sheets
        .children_named("sheet")
        .find_map(|s| sheet_relationship_attr(s).map(|(key, _)| key.to_string()))
        .unwrap_or_else(|| "r:id".to_string());
    let entry = XmlElement::new(sheets.qualified("sheet"))
        .with_attr("name", name.as_str())
        .with_attr("sheetId", sheet_id.to_string())
        .with_attr(&id_key, relationship_id.as_str());
    sheets.push_element(entry);

    // 4. Content type, once per part
    let content_type = package
        .content_type_of(&base.part)?
        .unwrap_or_else(|| WORKSHEET_CONTENT_TYPE.to_string());
    package.register_override(&part, &content_type)?;

    debug!(
        "cloned '{}' ({}) as '{}' ({}, {}, sheetId {})",
        base.name, base.part, name, part, relationship_id, sheet_id
    );
    Ok(SheetDescriptor {
        name,
        relationship_id,
        sheet_id,
        part,
        state: SheetState::Visible,
    })
}
