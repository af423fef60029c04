//! In-memory MJCF document tree.
//!
//! A [`SceneDocument`] is a small element tree read from and written back to
//! MJCF text with quick-xml. It keeps element order, attribute order and
//! comments, so a composed scene serializes close to the files it came from.

use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use nalgebra::{Vector3, Vector4};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Result, SceneError};

/// Name of the MJCF asset section.
pub const ASSET: &str = "asset";
/// Name of the MJCF world section.
pub const WORLDBODY: &str = "worldbody";
/// Name of the MJCF body element.
pub const BODY: &str = "body";

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Nested element.
    Element(Element),
    /// Character data (unescaped).
    Text(String),
    /// Comment body, stored as written.
    Comment(String),
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Tag name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Builder-style child element.
    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Get an attribute value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `name` attribute.
    pub fn name_attr(&self) -> Option<&str> {
        self.attribute("name")
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Remove an attribute, returning its old value.
    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(idx).1)
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Mutable child elements.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First child element with the given tag.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// First mutable child element with the given tag.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Append a child element.
    pub fn push_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Depth-first, pre-order iterator over this element and all descendants.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// First element (self included) in pre-order matching `pred`.
    pub fn find(&self, pred: impl Fn(&Element) -> bool) -> Option<&Element> {
        self.descendants().find(|e| pred(*e))
    }

    /// Mutable variant of [`Element::find`].
    pub fn find_mut(&mut self, pred: impl Fn(&Element) -> bool) -> Option<&mut Element> {
        find_mut_inner(self, &pred)
    }

    /// Apply `f` to this element and every descendant element, pre-order.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for child in self.elements_mut() {
            child.visit_mut(f);
        }
    }
}

fn find_mut_inner<'a>(
    element: &'a mut Element,
    pred: &dyn Fn(&Element) -> bool,
) -> Option<&'a mut Element> {
    if pred(element) {
        return Some(element);
    }
    for child in element.elements_mut() {
        if let Some(found) = find_mut_inner(child, pred) {
            return Some(found);
        }
    }
    None
}

/// Pre-order element iterator returned by [`Element::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        // Push in reverse so the first child is visited first.
        let children: Vec<&Element> = next.elements().collect();
        self.stack.extend(children.into_iter().rev());
        Some(next)
    }
}

/// A parsed MJCF scene description.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDocument {
    root: Element,
}

impl SceneDocument {
    /// Wrap an existing root element.
    pub fn from_root(root: Element) -> Self {
        Self { root }
    }

    /// Parse MJCF text.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::XmlParse`] if the text is not well-formed XML
    /// with exactly one root element.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => stack.push(element_from_start(e)?),
                Ok(Event::Empty(ref e)) => {
                    let element = element_from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| SceneError::XmlParse("unbalanced closing tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| SceneError::XmlParse(format!("invalid text: {e}")))?;
                        if !text.trim().is_empty() {
                            parent.children.push(Node::Text(text.into_owned()));
                        }
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(e).into_owned();
                        parent.children.push(Node::Text(text));
                    }
                }
                Ok(Event::Comment(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let body = String::from_utf8_lossy(e).into_owned();
                        parent.children.push(Node::Comment(body));
                    }
                }
                Ok(Event::Eof) => break,
                // Declarations, processing instructions, doctypes
                Ok(_) => {}
                Err(e) => {
                    return Err(SceneError::XmlParse(format!(
                        "at byte {}: {e}",
                        reader.buffer_position()
                    )));
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(SceneError::XmlParse(format!(
                "unexpected EOF inside <{}>",
                open.name
            )));
        }

        root.map(Self::from_root)
            .ok_or_else(|| SceneError::XmlParse("document has no root element".into()))
    }

    /// Read and parse an MJCF file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    /// Serialize to indented MJCF text.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        write_element(&mut writer, &self.root)?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| SceneError::XmlParse(format!("UTF-8 error: {e}")))
    }

    /// Serialize and write to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let xml = self.to_xml_string()?;
        let mut file = std::fs::File::create(path.as_ref())?;
        file.write_all(xml.as_bytes())?;
        Ok(())
    }

    /// The root element (`<mujoco>` for MJCF).
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Mutable root element.
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// The `model` attribute of the root.
    pub fn model_name(&self) -> Option<&str> {
        self.root.attribute("model")
    }

    /// Top-level section by tag (`asset`, `worldbody`, ...).
    pub fn section(&self, name: &str) -> Option<&Element> {
        self.root.child(name)
    }

    /// Mutable top-level section.
    pub fn section_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.root.child_mut(name)
    }

    /// First `<body>` named `name` anywhere in the world tree.
    pub fn find_body(&self, name: &str) -> Option<&Element> {
        self.section(WORLDBODY)?
            .find(|e| e.name == BODY && e.name_attr() == Some(name))
    }

    /// Number of `<body>` elements named `name`.
    pub fn count_bodies(&self, name: &str) -> usize {
        self.section(WORLDBODY).map_or(0, |wb| {
            wb.descendants()
                .filter(|e| e.name == BODY && e.name_attr() == Some(name))
                .count()
        })
    }
}

impl FromStr for SceneDocument {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn element_from_start(e: &BytesStart) -> Result<Element> {
    let name = String::from_utf8(e.name().as_ref().to_vec())
        .map_err(|e| SceneError::XmlParse(format!("invalid tag name: {e}")))?;
    let mut element = Element::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| SceneError::XmlParse(format!("invalid attribute: {e}")))?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())
            .map_err(|e| SceneError::XmlParse(format!("invalid attribute name: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| SceneError::XmlParse(format!("invalid value for '{key}': {e}")))?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.push_element(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(SceneError::XmlParse(format!(
            "multiple root elements (second is <{}>)",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return emit(writer, Event::Empty(start));
    }

    emit(writer, Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => emit(writer, Event::Text(BytesText::new(t)))?,
            Node::Comment(c) => emit(writer, Event::Comment(BytesText::from_escaped(c.as_str())))?,
        }
    }
    emit(writer, Event::End(BytesEnd::new(element.name.as_str())))
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| SceneError::XmlParse(format!("write error: {e}")))
}

// ============================================================================
// Attribute helpers
// ============================================================================

/// Parse a space-separated array of floats.
pub fn parse_float_array(s: &str) -> Result<Vec<f64>> {
    s.split_whitespace()
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| SceneError::XmlParse(format!("invalid float: {p}")))
        })
        .collect()
}

/// Parse a space-separated vector3 string.
pub fn parse_vector3(s: &str) -> Result<Vector3<f64>> {
    let parts = parse_float_array(s)?;
    if parts.len() != 3 {
        return Err(SceneError::XmlParse(format!(
            "expected 3 values in vector, got {}: {s}",
            parts.len()
        )));
    }
    Ok(Vector3::new(parts[0], parts[1], parts[2]))
}

/// Parse a space-separated vector4 string.
pub fn parse_vector4(s: &str) -> Result<Vector4<f64>> {
    let parts = parse_float_array(s)?;
    if parts.len() != 4 {
        return Err(SceneError::XmlParse(format!(
            "expected 4 values in vector, got {}: {s}",
            parts.len()
        )));
    }
    Ok(Vector4::new(parts[0], parts[1], parts[2], parts[3]))
}
