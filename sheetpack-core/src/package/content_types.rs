use std::io::{Read, Seek};

use log::debug;

use super::Package;
use crate::error::Result;
use crate::xml::XmlElement;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

fn part_name(part: &str) -> String {
    format!("/{}", part.trim_start_matches('/'))
}

/// Part names in the manifest compare case-insensitively
fn is_override_for(el: &XmlElement, part: &str) -> bool {
    el.local_name() == "Override"
        && el
            .attr("PartName")
            .is_some_and(|name| name.eq_ignore_ascii_case(&part_name(part)))
}

fn extension_of(part: &str) -> Option<&str> {
    let file = part.rsplit('/').next()?;
    file.rsplit_once('.').map(|(_, ext)| ext)
}

impl<R: Read + Seek> Package<R> {
    /// Content type of `part` from the manifest: its override, else the default
    /// for its extension
    pub fn content_type_of(&mut self, part: &str) -> Result<Option<String>> {
        let doc = self.document(CONTENT_TYPES_PART)?;
        if let Some(el) = doc.root.elements().find(|el| is_override_for(el, part)) {
            return Ok(el.attr("ContentType").map(str::to_string));
        }
        let Some(ext) = extension_of(part) else {
            return Ok(None);
        };
        Ok(doc
            .root
            .children_named("Default")
            .find(|el| el.attr("Extension").is_some_and(|e| e.eq_ignore_ascii_case(ext)))
            .and_then(|el| el.attr("ContentType"))
            .map(str::to_string))
    }

    /// Register an override for `part` unless one already exists. Returns
    /// whether the manifest changed.
    pub fn register_override(&mut self, part: &str, content_type: &str) -> Result<bool> {
        if self
            .document(CONTENT_TYPES_PART)?
            .root
            .elements()
            .any(|el| is_override_for(el, part))
        {
            return Ok(false);
        }
        let doc = self.document_mut(CONTENT_TYPES_PART)?;
        let el = XmlElement::new(doc.root.qualified("Override"))
            .with_attr("PartName", part_name(part))
            .with_attr("ContentType", content_type);
        doc.root.push_element(el);
        debug!("registered content type {} for {}", content_type, part);
        Ok(true)
    }

    /// Drop the override for `part`, if any
    pub fn remove_override(&mut self, part: &str) -> Result<bool> {
        if !self
            .document(CONTENT_TYPES_PART)?
            .root
            .elements()
            .any(|el| is_override_for(el, part))
        {
            return Ok(false);
        }
        let doc = self.document_mut(CONTENT_TYPES_PART)?;
        doc.root.retain_elements(|el| !is_override_for(el, part));
        debug!("removed content type override for {}", part);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::tests::{package_from, reopen};

    const TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

    #[test]
    fn test_content_type_of() {
        let mut pkg = package_from(&[(CONTENT_TYPES_PART, TYPES)]);
        assert_eq!(
            pkg.content_type_of("xl/worksheets/sheet1.xml").unwrap().as_deref(),
            Some(WORKSHEET_CONTENT_TYPE)
        );
        assert_eq!(
            pkg.content_type_of("xl/styles.xml").unwrap().as_deref(),
            Some("application/xml")
        );
        assert_eq!(pkg.content_type_of("media/image.png").unwrap(), None);
    }

    #[test]
    fn test_register_override_once() {
        let mut pkg = package_from(&[(CONTENT_TYPES_PART, TYPES)]);
        assert!(!pkg.register_override("xl/worksheets/SHEET1.xml", WORKSHEET_CONTENT_TYPE).unwrap());
        assert!(pkg.register_override("xl/worksheets/sheet2.xml", WORKSHEET_CONTENT_TYPE).unwrap());
        assert!(!pkg.register_override("xl/worksheets/sheet2.xml", WORKSHEET_CONTENT_TYPE).unwrap());

        let mut again = reopen(&mut pkg);
        let overrides = again
            .document(CONTENT_TYPES_PART)
            .unwrap()
            .root
            .children_named("Override")
            .count();
        assert_eq!(overrides, 2);
    }

    #[test]
    fn test_remove_override() {
        let mut pkg = package_from(&[(CONTENT_TYPES_PART, TYPES)]);
        assert!(pkg.remove_override("xl/worksheets/sheet1.xml").unwrap());
        assert!(!pkg.remove_override("xl/worksheets/sheet1.xml").unwrap());
        assert_eq!(
            pkg.content_type_of("xl/worksheets/sheet1.xml").unwrap().as_deref(),
            Some("application/xml")
        );
    }
}
