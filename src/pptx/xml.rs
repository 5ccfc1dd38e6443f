//! A small owned XML tree for OOXML parts.
//!
//! Text and attribute values are kept in their raw escaped form so that
//! parts we never touch serialize back to the same markup. Values are
//! unescaped on read and escaped on write through the accessors below.
//!
//! A [`XmlNode::Slot`] marks a position whose content was lifted out into
//! a typed model (a shape, a paragraph, a run); the owner fills it back in
//! when writing.

use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{DeckError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Raw, still-escaped character data.
    Text(String),
    CData(String),
    Slot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    /// Attribute values are stored escaped.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// A parsed part: the prolog (declaration and surrounding whitespace) and the root element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub prolog: String,
    pub root: XmlElement,
}

impl XmlDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(false);

        let mut prolog = String::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| DeckError::Xml(format!("at byte {}: {}", reader.buffer_position(), e)))?;

            match event {
                Event::Start(e) => {
                    stack.push(XmlElement::from_start(e.name().as_ref(), e.attributes())?);
                }
                Event::Empty(e) => {
                    let element = XmlElement::from_start(e.name().as_ref(), e.attributes())?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| DeckError::Xml("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(e) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    push_text(&mut stack, &mut prolog, root.is_some(), text);
                }
                Event::GeneralRef(e) => {
                    let text = format!("&{};", String::from_utf8_lossy(&e));
                    push_text(&mut stack, &mut prolog, root.is_some(), text);
                }
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(XmlNode::CData(String::from_utf8_lossy(e.as_ref()).into_owned()));
                    }
                }
                Event::Decl(e) => {
                    prolog.push_str("<?");
                    prolog.push_str(&String::from_utf8_lossy(e.as_ref()));
                    prolog.push_str("?>");
                }
                Event::Eof => break,
                // Comments, processing instructions and doctypes do not occur in presentation parts.
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(DeckError::Xml(format!("unclosed element <{}>", stack[stack.len() - 1].name)));
        }
        let root = root.ok_or_else(|| DeckError::Xml("document has no root element".to_string()))?;
        Ok(Self { prolog, root })
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(4096);
        out.push_str(&self.prolog);
        self.root.write(&mut out);
        out
    }
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(DeckError::Xml("more than one root element".to_string())),
    }
    Ok(())
}

fn push_text(stack: &mut [XmlElement], prolog: &mut String, after_root: bool, text: String) {
    match stack.last_mut() {
        Some(parent) => {
            // Entity references arrive as separate events; keep runs of text together.
            if let Some(XmlNode::Text(previous)) = parent.children.last_mut() {
                previous.push_str(&text);
            } else {
                parent.children.push(XmlNode::Text(text));
            }
        }
        None if !after_root => prolog.push_str(&text),
        None => {}
    }
}

impl XmlElement {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter taking an unescaped value.
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Parse a standalone fragment such as `<a:r><a:t>Hi</a:t></a:r>`.
    pub fn parse_fragment(xml: &str) -> Result<Self> {
        Ok(XmlDocument::parse(xml.as_bytes())?.root)
    }

    fn from_start(name: &[u8], attributes: quick_xml::events::attributes::Attributes<'_>) -> Result<Self> {
        let mut element = XmlElement::new(String::from_utf8_lossy(name).into_owned());
        for attr in attributes {
            let attr = attr.map_err(|e| DeckError::Xml(format!("bad attribute on <{}>: {}", element.name, e)))?;
            element.attributes.push((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                String::from_utf8_lossy(attr.value.as_ref()).into_owned(),
            ));
        }
        Ok(element)
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Namespace prefix, or an empty string for unprefixed names.
    pub fn prefix(&self) -> &str {
        match self.name.split_once(':') {
            Some((prefix, _)) => prefix,
            None => "",
        }
    }

    /// A sibling name in the same namespace as this element.
    pub fn qualify(&self, local_name: &str) -> String {
        match self.prefix() {
            "" => local_name.to_string(),
            prefix => format!("{}:{}", prefix, local_name),
        }
    }

    pub fn is(&self, local_name: &str) -> bool {
        self.local_name() == local_name
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.raw_attr(name).map(|raw| match unescape(raw) {
            Ok(value) => value.into_owned(),
            Err(_) => raw.to_string(),
        })
    }

    pub fn raw_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        self.set_raw_attr(name, escape(value).into_owned());
    }

    pub fn set_raw_attr(&mut self, name: &str, raw: String) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = raw,
            None => self.attributes.push((name.to_string(), raw)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|(key, _)| key != name);
    }

    /// Set the attribute when `value` is present, remove it otherwise.
    pub fn set_or_remove_attr(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => self.set_attr(name, value),
            None => self.remove_attr(name),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.is(local_name))
    }

    pub fn child_mut(&mut self, local_name: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|element| element.is(local_name))
    }

    pub fn has_child(&self, local_name: &str) -> bool {
        self.child(local_name).is_some()
    }

    pub fn remove_children(&mut self, local_names: &[&str]) {
        self.children.retain(|node| match node {
            XmlNode::Element(element) => !local_names.contains(&element.local_name()),
            _ => true,
        });
    }

    /// Insert `child` respecting a schema sequence given as local names.
    ///
    /// The child goes before the first existing sibling that the sequence
    /// places after it. Siblings missing from `order` are skipped over.
    pub fn insert_ordered(&mut self, child: XmlElement, order: &[&str]) -> &mut XmlElement {
        let rank = order.iter().position(|name| *name == child.local_name());
        let index = rank
            .and_then(|rank| {
                self.children.iter().position(|node| match node {
                    XmlNode::Element(existing) => order
                        .iter()
                        .position(|name| *name == existing.local_name())
                        .is_some_and(|existing_rank| existing_rank > rank),
                    _ => false,
                })
            })
            .unwrap_or(self.children.len());

        self.children.insert(index, XmlNode::Element(child));
        match &mut self.children[index] {
            XmlNode::Element(element) => element,
            _ => unreachable!("just inserted an element"),
        }
    }

    /// Return the named child, creating an empty one in schema order if absent.
    pub fn get_or_insert(&mut self, local_name: &str, order: &[&str]) -> &mut XmlElement {
        let name = self.qualify(local_name);
        self.get_or_insert_as(&name, order)
    }

    /// Like [`get_or_insert`](Self::get_or_insert) with an explicit qualified
    /// name, for children living in another namespace than their parent.
    pub fn get_or_insert_as(&mut self, name: &str, order: &[&str]) -> &mut XmlElement {
        let local_name = local(name);
        if let Some(index) = self.position_of(local_name) {
            return match &mut self.children[index] {
                XmlNode::Element(element) => element,
                _ => unreachable!("position_of only returns elements"),
            };
        }
        self.insert_ordered(XmlElement::new(name), order)
    }

    fn position_of(&self, local_name: &str) -> Option<usize> {
        self.children.iter().position(|node| match node {
            XmlNode::Element(element) => element.is(local_name),
            _ => false,
        })
    }

    /// Unescaped concatenation of the direct text children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(raw) => match unescape(raw) {
                    Ok(text) => out.push_str(&text),
                    Err(_) => out.push_str(raw),
                },
                XmlNode::CData(data) => out.push_str(data),
                _ => {}
            }
        }
        out
    }

    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(escape(text).into_owned()));
        }
    }

    /// Take the direct children matching `predicate` out of the tree,
    /// leaving a slot in each position.
    pub fn lift_children<F>(&mut self, mut predicate: F) -> Vec<XmlElement>
    where
        F: FnMut(&XmlElement) -> bool,
    {
        let mut lifted = Vec::new();
        for node in self.children.iter_mut() {
            let take = match node {
                XmlNode::Element(element) => predicate(element),
                _ => false,
            };
            if take {
                if let XmlNode::Element(element) = std::mem::replace(node, XmlNode::Slot) {
                    lifted.push(element);
                }
            }
        }
        lifted
    }

    pub fn slot_count(&self) -> usize {
        self.children.iter().filter(|node| matches!(node, XmlNode::Slot)).count()
    }

    /// Serialize; slots write nothing.
    pub fn write(&self, out: &mut String) {
        // Writing to a String cannot fail.
        let _ = self.write_with(out, &mut |_| Ok(()));
    }

    /// Serialize, calling `fill` once for every slot in document order.
    pub fn write_with(&self, out: &mut String, fill: &mut dyn FnMut(&mut String) -> Result<()>) -> Result<()> {
        self.write_open(out);
        if self.children.is_empty() {
            out.push_str("/>");
            return Ok(());
        }
        out.push('>');
        for node in &self.children {
            match node {
                XmlNode::Element(element) => element.write_with(out, fill)?,
                XmlNode::Text(raw) => out.push_str(raw),
                XmlNode::CData(data) => {
                    out.push_str("<![CDATA[");
                    out.push_str(data);
                    out.push_str("]]>");
                }
                XmlNode::Slot => fill(out)?,
            }
        }
        self.write_close(out);
        Ok(())
    }

    /// Write `<name attr="...">` without the closing bracket.
    pub fn write_open(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            // A raw value can only hold a double quote if it was single-quoted in the source.
            let quote = if value.contains('"') { '\'' } else { '"' };
            out.push(' ');
            out.push_str(key);
            out.push('=');
            out.push(quote);
            out.push_str(value);
            out.push(quote);
        }
    }

    pub fn write_close(&self, out: &mut String) {
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }
}

pub fn local(name: &str) -> &str {
    match name.split_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_keeps_prolog_and_entities() {
        let source = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
            <p:sld xmlns:a=\"urn:a\" xmlns:p=\"urn:p\"><a:t>Fish &amp; Chips &lt;3</a:t><a:br/></p:sld>";
        let doc = XmlDocument::parse(source.as_bytes()).unwrap();
        assert_eq!(doc.to_xml(), source);
        let t = doc.root.child("t").unwrap();
        assert_eq!(t.text(), "Fish & Chips <3");
    }

    #[test]
    fn test_attribute_escaping() {
        let mut element = XmlElement::new("a:latin");
        element.set_attr("typeface", "Foo & \"Bar\"");
        assert_eq!(element.attr("typeface").unwrap(), "Foo & \"Bar\"");
        assert_eq!(element.raw_attr("typeface").unwrap(), "Foo &amp; &quot;Bar&quot;");

        let parsed = XmlElement::parse_fragment(&element.to_xml()).unwrap();
        assert_eq!(parsed.attr("typeface").unwrap(), "Foo & \"Bar\"");
    }

    #[test]
    fn test_single_quoted_attribute_survives() {
        let parsed = XmlElement::parse_fragment("<x v='say \"hi\"'/>").unwrap();
        let again = XmlElement::parse_fragment(&parsed.to_xml()).unwrap();
        assert_eq!(again.attr("v").unwrap(), "say \"hi\"");
    }

    #[test]
    fn test_insert_ordered_follows_sequence() {
        let order = ["ln", "solidFill", "latin", "ea", "hlinkClick"];
        let mut rpr = XmlElement::parse_fragment("<a:rPr><a:ln/><a:ea typeface=\"X\"/></a:rPr>").unwrap();
        rpr.insert_ordered(XmlElement::new("a:latin"), &order);
        rpr.insert_ordered(XmlElement::new("a:solidFill"), &order);
        rpr.insert_ordered(XmlElement::new("a:hlinkClick"), &order);
        let names: Vec<&str> = rpr.elements().map(|e| e.local_name()).collect();
        assert_eq!(names, vec!["ln", "solidFill", "latin", "ea", "hlinkClick"]);
    }

    #[test]
    fn test_lift_children_leaves_slots() {
        let mut tree = XmlElement::parse_fragment("<p:spTree><p:nvGrpSpPr/><p:sp/><p:pic/></p:spTree>").unwrap();
        let lifted = tree.lift_children(|e| e.is("sp") || e.is("pic"));
        assert_eq!(lifted.len(), 2);
        assert_eq!(tree.slot_count(), 2);

        let mut out = String::new();
        let mut queue = lifted.into_iter();
        tree.write_with(&mut out, &mut |out: &mut String| {
            if let Some(element) = queue.next() {
                element.write(out);
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(out, "<p:spTree><p:nvGrpSpPr/><p:sp/><p:pic/></p:spTree>");
    }

    #[test]
    fn test_unbalanced_input_is_an_error() {
        assert!(XmlDocument::parse(b"<a><b></a>").is_err());
        assert!(XmlDocument::parse(b"").is_err());
    }
}
