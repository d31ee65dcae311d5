//! Package navigation: the zip container, its parts, and the relationships
//! between them
//!
//! A [`Package`] is opened once per import or export operation. Every part is
//! read from the archive at most once; parsed XML parts are kept in memory and
//! written back on save only when they were handed out mutably. Saving never
//! touches the source archive: the result is written to a temporary file next to
//! the destination and moved over it once complete.

mod content_types;
mod relationships;
mod workbook;

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{PackageError, Result};
use crate::xml::XmlDocument;

pub use content_types::{CONTENT_TYPES_PART, WORKSHEET_CONTENT_TYPE};
pub use relationships::{
    Relationship, RelationshipKind, rels_path_for, relative_target, resolve_target,
};
pub use workbook::{SheetDescriptor, SheetSelection, SheetState};
pub(crate) use relationships::relationship_number;
pub(crate) use workbook::sheet_relationship_attr;

#[derive(Debug)]
struct CachedDocument {
    doc: XmlDocument,
    dirty: bool,
}

/// An opened spreadsheet package
pub struct Package<R: Read + Seek = BufReader<File>> {
    archive: ZipArchive<R>,
    /// Entry names in archive order
    entries: Vec<String>,
    entry_set: HashSet<String>,
    /// Original bytes of parts read so far
    loaded: HashMap<String, Vec<u8>>,
    /// Bytes for parts added or replaced in this session
    written: HashMap<String, Vec<u8>>,
    documents: HashMap<String, CachedDocument>,
    /// Parts that did not exist in the archive, in creation order
    added: Vec<String>,
    removed: HashSet<String>,
}

impl Package<BufReader<File>> {
    /// Open a package from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        debug!("opening package {}", path.display());
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> Package<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;
        let entries: Vec<String> = archive.file_names().map(|n| n.to_string()).collect();
        let entry_set = entries.iter().cloned().collect();
        Ok(Self {
            archive,
            entries,
            entry_set,
            loaded: HashMap::new(),
            written: HashMap::new(),
            documents: HashMap::new(),
            added: Vec::new(),
            removed: HashSet::new(),
        })
    }

    /// Names of all parts currently in the package
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|name| !self.removed.contains(name.as_str()))
            .chain(self.added.iter())
            .map(|name| name.as_str())
    }

    pub fn has_part(&self, name: &str) -> bool {
        if self.removed.contains(name) {
            return false;
        }
        self.entry_set.contains(name) || self.written.contains_key(name)
    }

    /// Raw bytes of a part, as stored in the archive or as last set with
    /// [`Package::put_part`]. Pending edits to a parsed document are not
    /// reflected here.
    pub fn read_part(&mut self, name: &str) -> Result<&[u8]> {
        if !self.has_part(name) {
            return Err(PackageError::MissingPart(name.to_string()));
        }
        if self.written.contains_key(name) {
            return Ok(self.written.get(name).map(|b| b.as_slice()).unwrap_or_default());
        }
        if !self.loaded.contains_key(name) {
            let mut file = self.archive.by_name(name).map_err(|e| match e {
                zip::result::ZipError::FileNotFound => PackageError::MissingPart(name.to_string()),
                other => PackageError::Zip(other),
            })?;
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)?;
            debug!("read part {} ({} bytes)", name, bytes.len());
            self.loaded.insert(name.to_string(), bytes);
        }
        Ok(self.loaded.get(name).map(|b| b.as_slice()).unwrap_or_default())
    }

    /// Parsed XML of a part, loaded on first use
    pub fn document(&mut self, name: &str) -> Result<&XmlDocument> {
        Ok(&self.ensure_document(name)?.doc)
    }

    /// Parsed XML of a part for editing; the part is rewritten on save
    pub fn document_mut(&mut self, name: &str) -> Result<&mut XmlDocument> {
        let cached = self.ensure_document(name)?;
        cached.dirty = true;
        Ok(&mut cached.doc)
    }

    fn ensure_document(&mut self, name: &str) -> Result<&mut CachedDocument> {
        if !self.documents.contains_key(name) {
            let doc = {
                let bytes = self.read_part(name)?;
                XmlDocument::parse(name, bytes)?
            };
            self.documents
                .insert(name.to_string(), CachedDocument { doc, dirty: false });
        }
        self.documents
            .get_mut(name)
            .ok_or_else(|| PackageError::MissingPart(name.to_string()))
    }

    /// Create or replace a part with raw bytes
    pub fn put_part(&mut self, name: &str, bytes: Vec<u8>) {
        self.removed.remove(name);
        self.documents.remove(name);
        if !self.entry_set.contains(name) && !self.added.iter().any(|n| n == name) {
            self.added.push(name.to_string());
        }
        debug!("put part {} ({} bytes)", name, bytes.len());
        self.written.insert(name.to_string(), bytes);
    }

    /// Create or replace a part with an XML document
    pub fn put_document(&mut self, name: &str, doc: XmlDocument) {
        self.put_part(name, Vec::new());
        self.documents
            .insert(name.to_string(), CachedDocument { doc, dirty: true });
    }

    pub fn remove_part(&mut self, name: &str) {
        debug!("remove part {}", name);
        self.documents.remove(name);
        self.written.remove(name);
        self.added.retain(|n| n != name);
        if self.entry_set.contains(name) {
            self.removed.insert(name.to_string());
        }
    }

    /// Write the package to `writer`, copying untouched parts without
    /// recompressing them
    pub fn save_to<W: Write + Seek>(&mut self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for index in 0..self.archive.len() {
            let name = self.archive.by_index_raw(index)?.name().to_string();
            if self.removed.contains(&name) {
                continue;
            }
            if let Some(bytes) = self.serialized(&name)? {
                zip.start_file(name.as_str(), options)?;
                zip.write_all(&bytes)?;
            } else {
                let file = self.archive.by_index_raw(index)?;
                zip.raw_copy_file(file)?;
            }
        }

        for name in self.added.clone() {
            let bytes = self.serialized(&name)?.unwrap_or_default();
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&bytes)?;
        }

        Ok(zip.finish()?)
    }

    /// Bytes to write for a part that changed in this session, `None` when the
    /// archive copy is still current
    fn serialized(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if let Some(cached) = self.documents.get(name) {
            if cached.dirty {
                return cached.doc.to_bytes(name).map(Some);
            }
        }
        Ok(self.written.get(name).cloned())
    }

    /// Save to `path` atomically. The destination is only replaced once the new
    /// archive has been completely written.
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        self.save_to(tmp.as_file_mut())?;
        tmp.as_file_mut().flush()?;
        tmp.persist(path).map_err(|e| PackageError::Io(e.error))?;
        debug!("saved package to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use zip::write::SimpleFileOptions;

    /// Build an in-memory package from (name, content) pairs
    pub(crate) fn package_from(parts: &[(&str, &str)]) -> Package<Cursor<Vec<u8>>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in parts {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        let cursor = zip.finish().unwrap();
        Package::from_reader(Cursor::new(cursor.into_inner())).unwrap()
    }

    pub(crate) fn reopen(package: &mut Package<Cursor<Vec<u8>>>) -> Package<Cursor<Vec<u8>>> {
        let out = package.save_to(Cursor::new(Vec::new())).unwrap();
        Package::from_reader(Cursor::new(out.into_inner())).unwrap()
    }

    #[test]
    fn test_read_and_missing_parts() {
        let mut pkg = package_from(&[("a.xml", "<a/>")]);
        assert_eq!(pkg.read_part("a.xml").unwrap(), b"<a/>");
        assert!(matches!(
            pkg.read_part("b.xml"),
            Err(PackageError::MissingPart(name)) if name == "b.xml"
        ));
    }

    #[test]
    fn test_untouched_parts_survive_save() {
        let mut pkg = package_from(&[("a.xml", "<a/>"), ("bin/data.bin", "\u{1}\u{2}")]);
        let mut again = reopen(&mut pkg);
        assert_eq!(again.read_part("a.xml").unwrap(), b"<a/>");
        assert_eq!(again.read_part("bin/data.bin").unwrap(), b"\x01\x02");
    }

    #[test]
    fn test_edited_document_is_written_back() {
        let mut pkg = package_from(&[("a.xml", "<a><b/></a>")]);
        pkg.document_mut("a.xml").unwrap().root.set_attr("x", "1");
        let mut again = reopen(&mut pkg);
        assert_eq!(again.document("a.xml").unwrap().root.attr("x"), Some("1"));
    }

    #[test]
    fn test_read_only_document_is_copied_verbatim() {
        let original = "<a   spaced='yes'><b/></a>";
        let mut pkg = package_from(&[("a.xml", original)]);
        pkg.document("a.xml").unwrap();
        let mut again = reopen(&mut pkg);
        assert_eq!(again.read_part("a.xml").unwrap(), original.as_bytes());
    }

    #[test]
    fn test_put_and_remove_parts() {
        let mut pkg = package_from(&[("a.xml", "<a/>"), ("b.xml", "<b/>")]);
        pkg.put_part("c.xml", b"<c/>".to_vec());
        pkg.remove_part("b.xml");
        let names: Vec<_> = pkg.part_names().collect();
        assert_eq!(names, vec!["a.xml", "c.xml"]);

        let mut again = reopen(&mut pkg);
        assert!(again.has_part("c.xml"));
        assert!(!again.has_part("b.xml"));
        assert_eq!(again.read_part("c.xml").unwrap(), b"<c/>");
    }

    #[test]
    fn test_save_as_replaces_destination_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.xlsx");
        std::fs::write(&dest, b"old contents").unwrap();

        let mut pkg = package_from(&[("a.xml", "<a/>")]);
        pkg.save_as(&dest).unwrap();

        let mut reopened = Package::open(&dest).unwrap();
        assert_eq!(reopened.read_part("a.xml").unwrap(), b"<a/>");
        // Only the destination remains in the directory
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
