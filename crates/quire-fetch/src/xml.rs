//! XML to JSON tree conversion.
//!
//! The document element itself is unwrapped; its content becomes the result.
//! Elements map to objects, attributes live under `@attributes`, text lives
//! under `#text` unless the element is a plain leaf (then it is the string
//! itself). Repeated child names collapse into arrays.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

const ATTRIBUTES_KEY: &str = "@attributes";
const TEXT_KEY: &str = "#text";

struct Frame {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            let _ = attributes.insert(key, Value::String(value.into_owned()));
        }
        Ok(Self {
            name,
            attributes,
            children: Map::new(),
            text: String::new(),
        })
    }

    fn into_value(self) -> Value {
        if self.attributes.is_empty() && self.children.is_empty() {
            return Value::String(self.text);
        }
        let mut object = self.children;
        if !self.attributes.is_empty() {
            let _ = object.insert(ATTRIBUTES_KEY.to_owned(), Value::Object(self.attributes));
        }
        if !self.text.is_empty() {
            let _ = object.insert(TEXT_KEY.to_owned(), Value::String(self.text));
        }
        Value::Object(object)
    }
}

fn insert_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            let _ = children.insert(name, value);
        }
    }
}

/// Parse an XML document into a JSON tree.
pub(crate) fn parse(input: &str) -> Result<Value, String> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let frame = Frame::open(&start)?;
                close(&mut stack, &mut root, frame);
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| "unbalanced closing tag".to_owned())?;
                close(&mut stack, &mut root, frame);
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| e.to_string())?;
                    frame.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".to_owned());
    }
    root.ok_or_else(|| "document has no root element".to_owned())
}

fn close(stack: &mut [Frame], root: &mut Option<Value>, frame: Frame) {
    let name = frame.name.clone();
    let value = frame.into_value();
    match stack.last_mut() {
        Some(parent) => insert_child(&mut parent.children, name, value),
        None => *root = Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaf_elements_become_strings() {
        let value = parse("<root><title>Hello</title><count>3</count></root>").unwrap();
        assert_eq!(value, json!({"title": "Hello", "count": "3"}));
    }

    #[test]
    fn repeated_children_become_arrays() {
        let value = parse("<list><item>a</item><item>b</item><item>c</item></list>").unwrap();
        assert_eq!(value, json!({"item": ["a", "b", "c"]}));
    }

    #[test]
    fn attributes_and_text() {
        let value = parse(r#"<root><link href="/a" rel="next">Next &amp; more</link></root>"#).unwrap();
        assert_eq!(
            value,
            json!({"link": {"@attributes": {"href": "/a", "rel": "next"}, "#text": "Next & more"}})
        );
    }

    #[test]
    fn empty_element_with_attributes() {
        let value = parse(r#"<root><img src="x.png"/><br/></root>"#).unwrap();
        assert_eq!(value, json!({"img": {"@attributes": {"src": "x.png"}}, "br": ""}));
    }

    #[test]
    fn cdata_is_text() {
        let value = parse("<root><body><![CDATA[<b>raw</b>]]></body></root>").unwrap();
        assert_eq!(value, json!({"body": "<b>raw</b>"}));
    }

    #[test]
    fn declaration_skipped() {
        let value = parse(r#"<?xml version="1.0"?><rss><channel><title>T</title></channel></rss>"#)
            .unwrap();
        assert_eq!(value, json!({"channel": {"title": "T"}}));
    }

    #[test]
    fn truncated_document_rejected() {
        assert!(parse("<root><open>").is_err());
    }

    #[test]
    fn mismatched_tags_rejected() {
        assert!(parse("<root><a></b></root>").is_err());
    }

    #[test]
    fn no_root_rejected() {
        assert!(parse("").is_err());
    }
}
