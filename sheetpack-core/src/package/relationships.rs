use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};

use log::debug;

use super::Package;
use crate::error::{PackageError, Result};
use crate::xml::{XmlDocument, XmlElement};

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const OFFICE_REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Relationship types the engine follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    OfficeDocument,
    Worksheet,
    SharedStrings,
    CalcChain,
}

impl RelationshipKind {
    fn suffix(&self) -> &'static str {
        match self {
            RelationshipKind::OfficeDocument => "officeDocument",
            RelationshipKind::Worksheet => "worksheet",
            RelationshipKind::SharedStrings => "sharedStrings",
            RelationshipKind::CalcChain => "calcChain",
        }
    }

    /// Type URI written for new relationships
    pub fn uri(&self) -> String {
        format!("{}/{}", OFFICE_REL_BASE, self.suffix())
    }

    /// Match on the last path segment so both transitional and strict type
    /// URIs are recognized
    pub fn matches(&self, rel_type: &str) -> bool {
        rel_type.rsplit('/').next() == Some(self.suffix())
    }
}

/// One entry of a `.rels` part with its target resolved to a package path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    /// Absolute path within the package (no leading '/'), or the raw target for
    /// external relationships
    pub target: String,
    pub rel_type: String,
    pub external: bool,
}

/// Relationships part belonging to `part` ("xl/workbook.xml" ->
/// "xl/_rels/workbook.xml.rels"). The empty string names the package root.
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that owns the relationship.
///
/// Targets with a leading '/' are package-root relative; anything else is
/// relative to the owner's directory, with `.` and `..` segments folded.
pub fn resolve_target(owner: &str, target: &str) -> String {
    if let Some(stripped) = target.strip_prefix('/') {
        return normalize(Path::new(stripped));
    }
    let mut base = PathBuf::from(owner);
    base.pop();
    normalize(&base.join(target))
}

fn normalize(path: &Path) -> String {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(s) => out.push(s),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out.components()
        .filter_map(|c| match c {
            Component::Normal(v) => Some(v.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Target text to store in `owner`'s relationships for `part`: relative when
/// `part` lives below the owner's directory, root-relative otherwise
pub fn relative_target(owner: &str, part: &str) -> String {
    let dir = owner.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    if dir.is_empty() {
        return part.to_string();
    }
    match part.strip_prefix(dir).and_then(|rest| rest.strip_prefix('/')) {
        Some(rest) => rest.to_string(),
        None => format!("/{}", part),
    }
}

/// Numeric suffix of an id like "rId7"
pub(crate) fn relationship_number(id: &str) -> Option<u32> {
    id.strip_prefix("rId")?.parse().ok()
}

fn relationship_from_element(owner: &str, rels_path: &str, el: &XmlElement) -> Result<Relationship> {
    let id = el
        .attr("Id")
        .ok_or_else(|| PackageError::malformed(rels_path, "relationship without Id"))?;
    let target = el
        .attr("Target")
        .ok_or_else(|| PackageError::malformed(rels_path, format!("relationship {} without Target", id)))?;
    let external = el.attr("TargetMode") == Some("External");
    Ok(Relationship {
        id: id.to_string(),
        target: if external {
            target.to_string()
        } else {
            resolve_target(owner, target)
        },
        rel_type: el.attr("Type").unwrap_or_default().to_string(),
        external,
    })
}

impl<R: Read + Seek> Package<R> {
    /// All relationships owned by `owner`. A missing relationships part is a
    /// `MissingPart` error.
    pub fn relationships(&mut self, owner: &str) -> Result<Vec<Relationship>> {
        let rels_path = rels_path_for(owner);
        let doc = self.document(&rels_path)?;
        doc.root
            .children_named("Relationship")
            .map(|el| relationship_from_element(owner, &rels_path, el))
            .collect()
    }

    /// Resolve `id` in `owner`'s relationships to a package path.
    ///
    /// An unknown id is an error rather than a guess: reading or writing the
    /// wrong part would lose data silently.
    pub fn relationship_target(&mut self, owner: &str, id: &str) -> Result<String> {
        let rels_path = rels_path_for(owner);
        self.relationships(owner)?
            .into_iter()
            .find(|rel| rel.id == id)
            .map(|rel| rel.target)
            .ok_or_else(|| PackageError::MissingPart(format!("{} (relationship {})", rels_path, id)))
    }

    /// First relationship of the given kind owned by `owner`
    pub fn relationship_of_kind(
        &mut self,
        owner: &str,
        kind: RelationshipKind,
    ) -> Result<Option<Relationship>> {
        Ok(self
            .relationships(owner)?
            .into_iter()
            .find(|rel| !rel.external && kind.matches(&rel.rel_type)))
    }

    /// Add a relationship from `owner` to `part`, creating the relationships
    /// part when needed
    pub fn insert_relationship(
        &mut self,
        owner: &str,
        id: &str,
        kind: RelationshipKind,
        part: &str,
    ) -> Result<()> {
        let rels_path = rels_path_for(owner);
        if !self.has_part(&rels_path) {
            let root = XmlElement::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS);
            self.put_document(&rels_path, XmlDocument::new(root));
        }
        let doc = self.document_mut(&rels_path)?;
        if doc.root.children_named("Relationship").any(|el| el.attr("Id") == Some(id)) {
            return Err(PackageError::malformed(
                rels_path,
                format!("relationship id {} already in use", id),
            ));
        }
        let el = XmlElement::new(doc.root.qualified("Relationship"))
            .with_attr("Id", id)
            .with_attr("Type", kind.uri())
            .with_attr("Target", relative_target(owner, part));
        doc.root.push_element(el);
        debug!("{}: added relationship {} -> {}", rels_path, id, part);
        Ok(())
    }

    /// Remove relationship `id` from `owner`, returning what was removed
    pub fn remove_relationship(&mut self, owner: &str, id: &str) -> Result<Option<Relationship>> {
        let rels_path = rels_path_for(owner);
        let doc = self.document_mut(&rels_path)?;
        let mut removed = None;
        for el in doc.root.children_named("Relationship") {
            if el.attr("Id") == Some(id) {
                removed = Some(relationship_from_element(owner, &rels_path, el)?);
                break;
            }
        }
        if removed.is_some() {
            doc.root
                .retain_elements(|el| !(el.local_name() == "Relationship" && el.attr("Id") == Some(id)));
            debug!("{}: removed relationship {}", rels_path, id);
        }
        Ok(removed)
    }
}
