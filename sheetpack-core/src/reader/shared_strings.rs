use std::io::{Read, Seek};

use log::debug;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{PackageError, Result};
use crate::package::{Package, RelationshipKind};

/// The package-wide pool of deduplicated strings, addressed by index.
///
/// The table is read-only: text written by the engine always goes into inline
/// string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedStringTable {
    strings: Vec<String>,
}

impl SharedStringTable {
    /// Load the table referenced by the workbook. A workbook without a shared
    /// strings part gets an empty table.
    pub fn load<R: Read + Seek>(package: &mut Package<R>) -> Result<Self> {
        let workbook = package.workbook_part()?;
        let part = match package.relationship_of_kind(&workbook, RelationshipKind::SharedStrings)? {
            Some(rel) => rel.target,
            None => {
                debug!("no shared strings relationship, using an empty table");
                return Ok(Self::default());
            }
        };
        if !package.has_part(&part) {
            debug!("shared strings part {} is absent, using an empty table", part);
            return Ok(Self::default());
        }
        let bytes = package.read_part(&part)?;
        Self::parse(&part, bytes)
    }

    /// Parse a shared strings part. Rich text runs of one entry are joined in
    /// order; phonetic runs (`<rPh>`) are skipped; nothing is trimmed.
    pub fn parse(part: &str, bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut strings = Vec::new();
        let mut current = String::new();
        let mut in_text = false;
        let mut phonetic_depth = 0usize;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"si" => current.clear(),
                    b"rPh" => phonetic_depth += 1,
                    b"t" if phonetic_depth == 0 => in_text = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
                Ok(Event::Text(e)) if in_text => {
                    let text = e.unescape().map_err(|err| PackageError::xml(part, err.into()))?;
                    current.push_str(&text);
                }
                Ok(Event::CData(e)) if in_text => {
                    current.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"t" => in_text = false,
                    b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                    b"si" => strings.push(std::mem::take(&mut current)),
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(PackageError::xml(part, e)),
            }
            buf.clear();
        }

        debug!("loaded {} shared strings from {}", strings.len(), part);
        Ok(Self { strings })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    /// Resolve the raw text of a `<v>` node holding a shared string index
    pub fn resolve(&self, raw_index: &str) -> Option<&str> {
        raw_index.trim().parse::<usize>().ok().and_then(|i| self.get(i))
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl From<Vec<String>> for SharedStringTable {
    fn from(strings: Vec<String>) -> Self {
        Self { strings }
    }
}
