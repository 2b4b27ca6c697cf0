//! XML document to nested JSON value conversion.
//!
//! Mapping rules:
//! - the document becomes `{ <root name>: <root value> }`
//! - an element with neither attributes nor children is its text, or `null`
//!   when empty
//! - otherwise it is an object: attributes under `@name`, children under
//!   their qualified tag name, and non-empty text under `#text`
//! - repeated sibling tags collapse into an array in document order
//!
//! Whitespace-only text is dropped. A document must have exactly one root
//! element and no text outside it.

use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};
use thiserror::Error;

pub const TEXT_KEY: &str = "#text";

/// Why a body could not be turned into a document tree.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error(transparent)]
    Syntax(#[from] quick_xml::Error),

    #[error("no element found")]
    NoRootElement,

    #[error("junk after document element")]
    TrailingContent,

    #[error("text outside the document element")]
    TextOutsideRoot,
}

struct Node {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Node {
    fn open(start: &BytesStart<'_>) -> Result<Self, quick_xml::Error> {
        let mut attributes = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr.unescape_value()?.into_owned();
            attributes.insert(key, Value::String(value));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            children: Map::new(),
            text: String::new(),
        })
    }

    fn into_value(self) -> Value {
        if self.attributes.is_empty() && self.children.is_empty() {
            return if self.text.is_empty() {
                Value::Null
            } else {
                Value::String(self.text)
            };
        }
        let mut object = self.attributes;
        object.extend(self.children);
        if !self.text.is_empty() {
            object.insert(TEXT_KEY.to_string(), Value::String(self.text));
        }
        Value::Object(object)
    }
}

fn insert_repeated(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

fn close(stack: &mut Vec<Node>, root: &mut Map<String, Value>, node: Node) {
    let name = node.name.clone();
    let value = node.into_value();
    match stack.last_mut() {
        Some(parent) => insert_repeated(&mut parent.children, name, value),
        None => insert_repeated(root, name, value),
    }
}

/// A top-level element is the root only if none has been seen yet.
fn claim_root(stack: &[Node], seen_root: &mut bool) -> Result<(), XmlError> {
    if !stack.is_empty() {
        return Ok(());
    }
    if *seen_root {
        return Err(XmlError::TrailingContent);
    }
    *seen_root = true;
    Ok(())
}

/// Parse `xml` into a nested `Value` following the rules in the module docs.
pub fn to_value(xml: &str) -> Result<Value, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root = Map::new();
    let mut seen_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                claim_root(&stack, &mut seen_root)?;
                stack.push(Node::open(&start)?);
            }
            Event::Empty(start) => {
                claim_root(&stack, &mut seen_root)?;
                let node = Node::open(&start)?;
                close(&mut stack, &mut root, node);
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    close(&mut stack, &mut root, node);
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(quick_xml::Error::from)?;
                match stack.last_mut() {
                    Some(node) => node.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None if seen_root => return Err(XmlError::TrailingContent),
                    None => return Err(XmlError::TextOutsideRoot),
                }
            }
            Event::CData(data) => match stack.last_mut() {
                Some(node) => node.text.push_str(&String::from_utf8_lossy(&data.into_inner())),
                None => return Err(XmlError::TextOutsideRoot),
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(node) = stack.pop() {
        return Err(quick_xml::Error::IllFormed(IllFormedError::MissingEndTag(node.name)).into());
    }
    if !seen_root {
        return Err(XmlError::NoRootElement);
    }

    Ok(Value::Object(root))
}
