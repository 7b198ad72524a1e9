//! Recorded DOM snapshots.
//!
//! A `DocumentSnapshot` is a JSON-friendly record of a page: its node tree
//! with each element's resolved style (and `::before`/`::after` styles), the
//! document's stylesheets and the sandbox default style of each tag. A host
//! that can read a live page (for instance over CDP) exports one of these and
//! the capture pipeline renders it like a live tree.

use super::{
    ComputedStyle, ElementKind, NodeInfo, NodeKind, PseudoElement, SourceDocument, SourceNode,
    StyleSheet, SvgKind, SVG_NAMESPACE,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};

/// A recorded document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Node to capture
    pub root: NodeSnapshot,
    /// Stylesheets in document order
    #[serde(default)]
    pub style_sheets: Vec<StyleSheetSnapshot>,
    /// Sandbox default style per tag name
    #[serde(default)]
    pub default_styles: HashMap<String, StyleSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    #[default]
    Element,
    Text,
    Comment,
}

/// A recorded node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSnapshot {
    #[serde(default)]
    pub kind: SnapshotKind,
    #[serde(default)]
    pub tag: String,
    /// Element namespace; `None` means HTML
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    /// Character data of text/comment nodes
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeSnapshot>,
    /// Children of an attached shadow root; rendered instead of `children`
    #[serde(default)]
    pub shadow_children: Option<Vec<NodeSnapshot>>,
    #[serde(default)]
    pub style: StyleSnapshot,
    #[serde(default)]
    pub before: Option<StyleSnapshot>,
    #[serde(default)]
    pub after: Option<StyleSnapshot>,
    /// Live `<input>`/`<textarea>` value
    #[serde(default)]
    pub value: Option<String>,
    /// `<canvas>` bitmap as a data URI
    #[serde(default)]
    pub canvas_data_url: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// A recorded resolved style.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleSnapshot {
    #[serde(default)]
    pub css_text: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Names of properties resolved with `!important`
    #[serde(default)]
    pub important: Vec<String>,
}

/// A recorded stylesheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleSheetSnapshot {
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub css: String,
    /// The live sheet refused rule access (cross-origin without CORS)
    #[serde(default)]
    pub cross_origin: bool,
}

impl StyleSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(name.to_string(), value.to_string());
        self
    }

    pub fn to_computed(&self) -> ComputedStyle {
        let mut style = ComputedStyle {
            css_text: self.css_text.clone(),
            properties: Vec::with_capacity(self.properties.len()),
        };
        for (name, value) in &self.properties {
            let priority = if self.important.iter().any(|n| n == name) {
                "important"
            } else {
                ""
            };
            style.set(name, value, priority);
        }
        style
    }
}

impl NodeSnapshot {
    pub fn element(tag: &str) -> Self {
        Self {
            kind: SnapshotKind::Element,
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn svg(tag: &str) -> Self {
        Self {
            namespace: Some(SVG_NAMESPACE.to_string()),
            ..Self::element(tag)
        }
    }

    pub fn text_node(text: &str) -> Self {
        Self {
            kind: SnapshotKind::Text,
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn comment(text: &str) -> Self {
        Self {
            kind: SnapshotKind::Comment,
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn child(mut self, child: NodeSnapshot) -> Self {
        self.children.push(child);
        self
    }

    pub fn css(mut self, name: &str, value: &str) -> Self {
        self.style.properties.insert(name.to_string(), value.to_string());
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

impl DocumentSnapshot {
    pub fn new(root: NodeSnapshot) -> Self {
        Self {
            root,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ConfigError(format!("invalid snapshot: {}", e)))
    }

    pub fn with_style_sheet(mut self, href: Option<&str>, css: &str) -> Self {
        self.style_sheets.push(StyleSheetSnapshot {
            href: href.map(|h| h.to_string()),
            css: css.to_string(),
            cross_origin: false,
        });
        self
    }

    pub fn with_default_style(mut self, tag: &str, style: StyleSnapshot) -> Self {
        self.default_styles.insert(tag.to_string(), style);
        self
    }
}

impl<'a> NodeInfo for &'a NodeSnapshot {
    fn kind(&self) -> NodeKind {
        match self.kind {
            SnapshotKind::Text => NodeKind::Text,
            SnapshotKind::Comment => NodeKind::Comment,
            SnapshotKind::Element if self.tag.is_empty() => NodeKind::Other,
            SnapshotKind::Element => {
                if self.namespace.as_deref() == Some(SVG_NAMESPACE) {
                    let svg = if self.tag == "rect" {
                        SvgKind::Rect
                    } else {
                        SvgKind::Other
                    };
                    return NodeKind::Element(ElementKind::Svg(svg));
                }
                let kind = match self.tag.to_ascii_lowercase().as_str() {
                    "canvas" => ElementKind::Canvas,
                    "img" => ElementKind::Image,
                    "input" => ElementKind::Input,
                    "textarea" => ElementKind::TextArea,
                    _ => ElementKind::Html,
                };
                NodeKind::Element(kind)
            }
        }
    }

    fn tag_name(&self) -> String {
        match self.kind {
            SnapshotKind::Element if self.namespace.as_deref() == Some(SVG_NAMESPACE) => {
                self.tag.clone()
            }
            SnapshotKind::Element => self.tag.to_ascii_lowercase(),
            _ => String::new(),
        }
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }
}

impl<'a> SourceNode for &'a NodeSnapshot {
    fn attributes(&self) -> Vec<(String, String)> {
        self.attributes.clone()
    }

    fn children(&self) -> Vec<Self> {
        match &self.shadow_children {
            Some(shadow) => shadow.iter().collect(),
            None => self.children.iter().collect(),
        }
    }

    fn text(&self) -> Option<String> {
        self.text.clone()
    }

    fn computed_style(&self, pseudo: Option<PseudoElement>) -> ComputedStyle {
        if self.kind != SnapshotKind::Element {
            return ComputedStyle::default();
        }
        let snapshot = match pseudo {
            None => Some(&self.style),
            Some(PseudoElement::Before) => self.before.as_ref(),
            Some(PseudoElement::After) => self.after.as_ref(),
        };
        snapshot.map(|s| s.to_computed()).unwrap_or_default()
    }

    fn canvas_data_url(&self) -> Option<String> {
        self.canvas_data_url.clone()
    }

    fn form_value(&self) -> Option<String> {
        self.value.clone()
    }

    fn box_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl SourceDocument for DocumentSnapshot {
    type Node<'a> = &'a NodeSnapshot;

    fn root(&self) -> &NodeSnapshot {
        &self.root
    }

    fn style_sheets(&self) -> Vec<Result<StyleSheet>> {
        self.style_sheets
            .iter()
            .map(|sheet| {
                if sheet.cross_origin {
                    Err(Error::StyleSheetAccess(format!(
                        "cannot read rules of {}",
                        sheet.href.as_deref().unwrap_or("<inline>")
                    )))
                } else {
                    Ok(StyleSheet::parse(sheet.href.clone(), &sheet.css))
                }
            })
            .collect()
    }

    fn default_style(&self, tag: &str) -> Option<ComputedStyle> {
        self.default_styles.get(tag).map(|s| s.to_computed())
    }

    /// Snapshots recorded with the same defaults share one sandbox.
    fn sandbox_key(&self) -> String {
        let mut entries: Vec<_> = self.default_styles.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut hasher = DefaultHasher::new();
        entries.hash(&mut hasher);
        format!("snapshot-{:016x}", hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_through_json() {
        let json = r#"{
            "root": {
                "tag": "DIV",
                "attributes": [["id", "card"]],
                "width": 120, "height": 40,
                "style": { "properties": { "color": "rgb(255, 0, 0)" }, "important": ["color"] },
                "before": { "properties": { "content": "\"*\"" } },
                "children": [
                    { "kind": "text", "text": "hello" },
                    { "tag": "rect", "namespace": "http://www.w3.org/2000/svg" }
                ]
            },
            "style_sheets": [{ "href": "http://x.com/a.css", "css": "p{}", "cross_origin": true }]
        }"#;
        let doc = DocumentSnapshot::from_json(json).unwrap();
        let root = doc.root();
        assert_eq!(root.tag_name(), "div");
        assert_eq!(root.kind(), NodeKind::Element(ElementKind::Html));
        assert_eq!(root.attribute("id").as_deref(), Some("card"));
        assert_eq!(root.box_size(), (120, 40));

        let style = root.computed_style(None);
        assert_eq!(style.get("color"), "rgb(255, 0, 0)");
        assert_eq!(style.priority("color"), "important");
        assert_eq!(root.computed_style(Some(PseudoElement::Before)).get("content"), "\"*\"");
        assert!(root.computed_style(Some(PseudoElement::After)).is_empty());

        let children = root.children();
        assert_eq!(children[0].kind(), NodeKind::Text);
        assert_eq!(children[1].kind(), NodeKind::Element(ElementKind::Svg(SvgKind::Rect)));

        assert!(matches!(doc.style_sheets()[0], Err(Error::StyleSheetAccess(_))));
    }

    #[test]
    fn shadow_children_replace_light_children() {
        let mut host = NodeSnapshot::element("x-card").child(NodeSnapshot::text_node("light"));
        host.shadow_children = Some(vec![NodeSnapshot::text_node("shadow")]);
        let node = &host;
        let children = node.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].text().as_deref(), Some("shadow"));
    }

    #[test]
    fn sandbox_key_follows_recorded_defaults() {
        let black = StyleSnapshot::new().with("color", "rgb(0, 0, 0)");
        let red = StyleSnapshot::new().with("color", "rgb(255, 0, 0)");
        let a = DocumentSnapshot::new(NodeSnapshot::element("p")).with_default_style("p", black.clone());
        let b = DocumentSnapshot::new(NodeSnapshot::element("p")).with_default_style("p", red);
        let a_again = DocumentSnapshot::new(NodeSnapshot::element("div")).with_default_style("p", black);
        assert_ne!(a.sandbox_key(), b.sandbox_key());
        assert_eq!(a.sandbox_key(), a_again.sandbox_key());
    }
}
