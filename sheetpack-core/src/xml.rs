//! Owned, mutable XML tree for a single package part
//!
//! Parts are parsed with quick-xml into a plain element tree that keeps
//! attribute order, namespace prefixes and whitespace text, so that a part can be
//! edited in place and written back without disturbing content the engine does not
//! understand.

use std::io::{Cursor, Write};

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{PackageError, Result};

/// `<?xml ...?>` header of a part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: Some("yes".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `row` or `x:row`
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub declaration: Option<Declaration>,
    pub root: XmlElement,
}

/// Local part of a qualified name (`x:row` -> `row`)
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.rsplit_once(':').map(|(prefix, _)| prefix)
    }

    /// Name for a new element living in this element's namespace prefix
    pub fn qualified(&self, local: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value of `key` in place, or append the attribute
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Child elements with the given local name
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.local_name() == local)
    }

    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.local_name() == local)
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.local_name() == local)
    }

    /// Index into `children` of the first element with the given local name
    pub fn child_index(&self, local: &str) -> Option<usize> {
        self.children.iter().position(|node| match node {
            XmlNode::Element(e) => e.local_name() == local,
            _ => false,
        })
    }

    pub fn push_element(&mut self, element: XmlElement) {
        self.children.push(XmlNode::Element(element));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::Text(text.into()));
    }

    /// Drop child elements for which `keep` returns false; other nodes stay
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&XmlElement) -> bool) {
        self.children.retain(|node| match node {
            XmlNode::Element(e) => keep(e),
            _ => true,
        });
    }

    /// Concatenated direct text content
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(t) | XmlNode::CData(t) => text.push_str(t),
                _ => {}
            }
        }
        text
    }
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self {
            declaration: Some(Declaration::default()),
            root,
        }
    }

    /// Parse a part. `part` is only used in error messages.
    pub fn parse(part: &str, bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes)
            .map_err(|e| PackageError::malformed(part, format!("not valid UTF-8: {}", e)))?;

        let mut reader = Reader::from_str(text);
        let mut declaration = None;
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event() {
                Ok(Event::Decl(decl)) => {
                    let version = decl
                        .version()
                        .map(|v| String::from_utf8_lossy(&v).into_owned())
                        .unwrap_or_else(|_| "1.0".to_string());
                    let encoding = decl
                        .encoding()
                        .and_then(|r| r.ok())
                        .map(|v| String::from_utf8_lossy(&v).into_owned());
                    let standalone = decl
                        .standalone()
                        .and_then(|r| r.ok())
                        .map(|v| String::from_utf8_lossy(&v).into_owned());
                    declaration = Some(Declaration {
                        version,
                        encoding,
                        standalone,
                    });
                }
                Ok(Event::Start(e)) => stack.push(element_from_start(part, &e)?),
                Ok(Event::Empty(e)) => {
                    let element = element_from_start(part, &e)?;
                    attach(part, &mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| PackageError::malformed(part, "unbalanced end tag"))?;
                    attach(part, &mut stack, &mut root, element)?;
                }
                Ok(Event::Text(e)) => {
                    // Whitespace outside the root element is not kept
                    if let Some(parent) = stack.last_mut() {
                        let text = e.unescape().map_err(|err| PackageError::xml(part, err.into()))?;
                        parent.children.push(XmlNode::Text(text.into_owned()));
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        parent.children.push(XmlNode::CData(text));
                    }
                }
                Ok(Event::Comment(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        parent.children.push(XmlNode::Comment(text));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(PackageError::xml(part, e)),
            }
        }

        if !stack.is_empty() {
            return Err(PackageError::malformed(part, "unexpected end of document"));
        }
        let root = root.ok_or_else(|| PackageError::malformed(part, "no root element"))?;
        Ok(Self { declaration, root })
    }

    /// Serialize back to bytes. `part` is only used in error messages.
    pub fn to_bytes(&self, part: &str) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        let io_err = |e: std::io::Error| PackageError::malformed(part, e.to_string());

        if let Some(decl) = &self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new(
                    &decl.version,
                    decl.encoding.as_deref(),
                    decl.standalone.as_deref(),
                )))
                .map_err(|e| PackageError::malformed(part, e.to_string()))?;
            writer.get_mut().write_all(b"\r\n").map_err(io_err)?;
        }
        write_element(part, &mut writer, &self.root)?;

        Ok(writer.into_inner().into_inner())
    }
}

fn element_from_start(part: &str, start: &BytesStart<'_>) -> Result<XmlElement> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| PackageError::xml(part, e.into()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| PackageError::xml(part, e.into()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    part: &str,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(PackageError::malformed(part, "more than one root element")),
    }
    Ok(())
}

fn write_element<W: Write>(part: &str, writer: &mut Writer<W>, element: &XmlElement) -> Result<()> {
    let err = |e: &dyn std::fmt::Display| PackageError::malformed(part, e.to_string());

    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(|e| err(&e))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(|e| err(&e))?;
    for node in &element.children {
        match node {
            XmlNode::Element(child) => write_element(part, writer, child)?,
            XmlNode::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| err(&e))?,
            XmlNode::CData(text) => writer
                .write_event(Event::CData(BytesCData::new(text.as_str())))
                .map_err(|e| err(&e))?,
            XmlNode::Comment(text) => writer
                .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                .map_err(|e| err(&e))?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| err(&e))?;
    Ok(())
}
