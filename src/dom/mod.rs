//! Host DOM binding.
//!
//! The capture pipeline never touches a concrete DOM. A host (a browser
//! binding, a CDP session, a recorded snapshot...) classifies each node into
//! the closed [`NodeKind`] set and answers a handful of capability queries:
//! attributes, children, resolved style, canvas pixels and live form values.

use crate::style::{self, StyleDeclaration};
use crate::Result;
use cssparser::{ParseError, Parser, ParserInput, Token};

pub mod snapshot;

pub use snapshot::{DocumentSnapshot, NodeSnapshot};

/// XHTML namespace written on the clone root before serialization.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
/// SVG namespace written on every SVG element of the clone.
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Closed set of node kinds the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element(ElementKind),
    Text,
    Comment,
    /// Processing instructions, doctypes... never cloned.
    Other,
}

/// Element flavours with capture-relevant behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Any HTML element without special handling
    Html,
    /// `<canvas>`: cloned as an `<img>` holding its current bitmap
    Canvas,
    /// `<img>`: `src` is inlined as a data URI
    Image,
    /// `<input>`: live value copied into the `value` attribute
    Input,
    /// `<textarea>`: live value copied into the text content
    TextArea,
    /// An element in the SVG namespace
    Svg(SvgKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvgKind {
    /// `<rect>`: `width`/`height` attributes are mirrored into inline style
    Rect,
    Other,
}

impl NodeKind {
    pub fn is_element(&self) -> bool {
        matches!(self, NodeKind::Element(_))
    }

    pub fn is_svg(&self) -> bool {
        matches!(self, NodeKind::Element(ElementKind::Svg(_)))
    }
}

/// Pseudo-elements reproduced as synthetic scoped rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoElement {
    Before,
    After,
}

impl PseudoElement {
    pub const ALL: [PseudoElement; 2] = [PseudoElement::Before, PseudoElement::After];

    /// Selector suffix without the leading colon (`before` / `after`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PseudoElement::Before => "before",
            PseudoElement::After => "after",
        }
    }
}

/// A single resolved property as reported by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedProperty {
    pub name: String,
    pub value: String,
    /// `"important"` or empty
    pub priority: String,
}

/// The resolved (computed) style of a node or pseudo-element.
///
/// `css_text` is the host's serialized form when it offers one (the fast
/// capture path); `properties` is always the full property list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedStyle {
    pub css_text: Option<String>,
    pub properties: Vec<ComputedProperty>,
}

impl ComputedStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder helper used by hosts and tests.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.set(name, value, "");
        self
    }

    pub fn set(&mut self, name: &str, value: &str, priority: &str) {
        if let Some(prop) = self.properties.iter_mut().find(|p| p.name == name) {
            prop.value = value.to_string();
            prop.priority = priority.to_string();
        } else {
            self.properties.push(ComputedProperty {
                name: name.to_string(),
                value: value.to_string(),
                priority: priority.to_string(),
            });
        }
    }

    /// Value of `name`, empty when the property is unknown (mirrors
    /// `getPropertyValue`).
    pub fn get(&self, name: &str) -> &str {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
            .unwrap_or("")
    }

    pub fn priority(&self, name: &str) -> &str {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.priority.as_str())
            .unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComputedProperty> {
        self.properties.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.css_text.is_none()
    }
}

/// A top-level stylesheet rule, as far as capture cares.
#[derive(Debug, Clone, PartialEq)]
pub enum CssRule {
    /// `@font-face { ... }` with its parsed descriptors
    FontFace {
        css_text: String,
        descriptors: StyleDeclaration,
    },
    /// Any other rule, kept verbatim
    Other(String),
}

impl CssRule {
    pub fn css_text(&self) -> &str {
        match self {
            CssRule::FontFace { css_text, .. } => css_text,
            CssRule::Other(text) => text,
        }
    }
}

/// A readable stylesheet of the source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSheet {
    /// URL of the sheet; `None` for inline `<style>` blocks
    pub href: Option<String>,
    pub rules: Vec<CssRule>,
}

impl StyleSheet {
    /// Split raw CSS text into top-level rules, picking out `@font-face`.
    ///
    /// Comments between rules are dropped; nested blocks (`@media`) are kept
    /// as a single opaque rule.
    pub fn parse(href: Option<String>, css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules = Vec::new();

        loop {
            parser.skip_whitespace();
            let start = parser.position();
            let mut font_face = None;
            let mut descriptors = None;

            while let Ok(token) = parser.next().cloned() {
                let is_font_face = *font_face.get_or_insert_with(|| {
                    matches!(&token, Token::AtKeyword(name) if name.eq_ignore_ascii_case("font-face"))
                });
                match token {
                    // `@import ...;` / `@charset ...;`
                    Token::Semicolon => break,
                    Token::CurlyBracketBlock => {
                        descriptors = parser
                            .parse_nested_block(|p| read_rule_block(p, is_font_face))
                            .ok()
                            .flatten();
                        break;
                    }
                    _ => {}
                }
            }

            let text = parser.slice_from(start).trim();
            if text.is_empty() {
                break;
            }
            rules.push(match descriptors {
                Some(descriptors) => CssRule::FontFace {
                    css_text: text.to_string(),
                    descriptors,
                },
                None => CssRule::Other(text.to_string()),
            });
        }

        Self { href, rules }
    }
}

fn read_rule_block<'i, 't>(
    input: &mut Parser<'i, 't>,
    font_face: bool,
) -> std::result::Result<Option<StyleDeclaration>, ParseError<'i, ()>> {
    if font_face {
        return Ok(Some(style::parse_block(input)));
    }
    while input.next().is_ok() {}
    Ok(None)
}

/// Read-only view of a node, handed to the caller's `filter`.
pub trait NodeInfo {
    fn kind(&self) -> NodeKind;

    /// Tag name (lower case for HTML, case preserved for SVG); empty for
    /// non-elements.
    fn tag_name(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;
}

/// A node of the live source tree.
pub trait SourceNode: NodeInfo + Clone {
    /// Attributes in document order.
    fn attributes(&self) -> Vec<(String, String)>;

    /// Children to clone, in order. Hosts return the shadow root's children
    /// when the element hosts one.
    fn children(&self) -> Vec<Self>;

    /// Character data of text and comment nodes.
    fn text(&self) -> Option<String>;

    /// Resolved style of the node itself or of one of its pseudo-elements.
    fn computed_style(&self, pseudo: Option<PseudoElement>) -> ComputedStyle;

    /// Current bitmap of a `<canvas>` as a data URI.
    fn canvas_data_url(&self) -> Option<String> {
        None
    }

    /// Live value of `<input>` / `<textarea>`.
    fn form_value(&self) -> Option<String> {
        None
    }

    /// Scroll/border-inclusive box size in CSS pixels.
    fn box_size(&self) -> (u32, u32);
}

/// The document owning the source tree.
pub trait SourceDocument {
    type Node<'a>: SourceNode
    where
        Self: 'a;

    /// Root node handle of the document.
    fn root(&self) -> Self::Node<'_>;

    /// All stylesheets in document order. A sheet whose rules cannot be read
    /// is reported as an `Err` and skipped by the font resolver.
    fn style_sheets(&self) -> Vec<Result<StyleSheet>>;

    /// Baseline computed style of a fresh, text-bearing `tag` instance
    /// rendered in an invisible sandbox.
    fn default_style(&self, tag: &str) -> Option<ComputedStyle>;

    /// Identity of the sandbox answering [`default_style`](Self::default_style).
    /// Cached defaults are shared only between documents returning the same
    /// key, so documents whose defaults differ must return different keys.
    fn sandbox_key(&self) -> String;
}
