//! XML serialization of a clone tree, the way an `XMLSerializer` writes an
//! XHTML document fragment.

use crate::clone::{CloneData, CloneTree, ElementData, Namespace, NodeId};
use crate::{Error, Result};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// HTML elements that never have content.
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

enum Step<'t> {
    Open(NodeId),
    Close(&'t str),
}

/// Serialize the subtree at `id`.
pub fn serialize(tree: &CloneTree, id: NodeId) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    let mut stack = vec![Step::Open(id)];

    while let Some(step) = stack.pop() {
        let event = match step {
            Step::Close(tag) => Event::End(BytesEnd::new(tag)),
            Step::Open(id) => match tree.data(id) {
                CloneData::Text(text) => Event::Text(BytesText::from_escaped(partial_escape(text.as_str()))),
                CloneData::Comment(text) => Event::Comment(BytesText::from_escaped(text.as_str())),
                CloneData::Element(el) => {
                    let start = start_tag(el);
                    let children = tree.children(id);
                    if children.is_empty() {
                        if el.namespace == Namespace::Svg || is_void(&el.tag) {
                            Event::Empty(start)
                        } else {
                            stack.push(Step::Close(&el.tag));
                            Event::Start(start)
                        }
                    } else {
                        stack.push(Step::Close(&el.tag));
                        stack.extend(children.iter().rev().map(|c| Step::Open(*c)));
                        Event::Start(start)
                    }
                }
            },
        };
        writer
            .write_event(event)
            .map_err(|e| Error::Other(format!("XML serialization failed: {}", e)))?;
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| Error::Other(format!("XML serialization produced invalid UTF-8: {}", e)))
}

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

fn start_tag(el: &ElementData) -> BytesStart<'_> {
    let mut start = BytesStart::new(el.tag.as_str());

    // The namespace declaration leads, as serializers emit it.
    if let Some(ns) = el.attribute("xmlns") {
        start.push_attribute(("xmlns", ns));
    }
    for (name, value) in el.attributes.iter().filter(|(k, _)| k != "xmlns") {
        start.push_attribute((name.as_str(), value.as_str()));
    }
    if !el.style.is_empty() {
        start.push_attribute(("style", el.style.css_text().as_str()));
    }
    start
}
