//! Style capture: turn a node's resolved style into inline declarations.
//!
//! Stylesheet rules do not survive serialization, inline styles do. When the
//! host offers a serialized `cssText` it is copied verbatim (fast path);
//! otherwise each property is diffed against the tag's sandbox default and
//! the parent's resolved value and only meaningful ones are written.

use super::{DefaultStyleTable, StyleDeclaration};
use crate::dom::{ComputedStyle, SourceDocument};

/// Font longhands re-asserted after a `cssText` copy; some hosts lose them
/// when the `font` shorthand is serialized.
const FONT_LONGHANDS: [&str; 7] = [
    "font-family",
    "font-size",
    "font-style",
    "font-variant",
    "font-weight",
    "font-stretch",
    "line-height",
];

/// Properties also written under a vendor-prefixed alias.
const PREFIXED_ALIASES: [(&str, &str); 1] = [("background-clip", "-webkit-background-clip")];

/// Offsets reset on the capture root so it is drawn at its own origin.
const ROOT_OFFSETS: [&str; 11] = [
    "left",
    "top",
    "right",
    "bottom",
    "inset",
    "inset-block",
    "inset-block-start",
    "inset-block-end",
    "inset-inline",
    "inset-inline-start",
    "inset-inline-end",
];

pub struct StyleCapture<'a, D: SourceDocument + ?Sized> {
    document: &'a D,
    defaults: &'a DefaultStyleTable,
    sandbox: String,
}

impl<'a, D: SourceDocument + ?Sized> StyleCapture<'a, D> {
    pub fn new(document: &'a D, defaults: &'a DefaultStyleTable) -> Self {
        Self {
            document,
            defaults,
            sandbox: document.sandbox_key(),
        }
    }

    /// Write the captured style of an element with tag `tag` into `target`.
    ///
    /// `target` starts out holding the element's own inline style; the slow
    /// path layers on top of it, the fast path replaces it.
    pub fn capture(
        &self,
        tag: &str,
        source: &ComputedStyle,
        parent: Option<&ComputedStyle>,
        is_root: bool,
        target: &mut StyleDeclaration,
    ) {
        match source.css_text.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(css_text) => {
                target.set_css_text(css_text);
                for name in FONT_LONGHANDS {
                    let value = source.get(name);
                    if !value.is_empty() {
                        target.set_property(name, value, source.priority(name) == "important");
                    }
                }
            }
            None => self.capture_differential(tag, source, parent, target),
        }

        if is_root {
            reset_root_offsets(target);
        }
    }

    fn capture_differential(
        &self,
        tag: &str,
        source: &ComputedStyle,
        parent: Option<&ComputedStyle>,
        target: &mut StyleDeclaration,
    ) {
        let defaults = self.defaults.get(self.document, &self.sandbox, tag);
        for prop in source.iter() {
            let differs_from_default = prop.value != defaults.get(&prop.name);
            let differs_from_parent = parent
                .map(|p| p.get(&prop.name) != prop.value)
                .unwrap_or(false);
            if !differs_from_default && !differs_from_parent {
                continue;
            }
            set_with_aliases(target, &prop.name, &prop.value, prop.priority == "important");
        }
    }
}

fn set_with_aliases(target: &mut StyleDeclaration, name: &str, value: &str, important: bool) {
    target.set_property(name, value, important);
    for (property, alias) in PREFIXED_ALIASES {
        if property == name {
            target.set_property(alias, value, important);
        }
    }
}

fn reset_root_offsets(target: &mut StyleDeclaration) {
    for name in ROOT_OFFSETS {
        if target.get(name).is_some() {
            let important = target.is_important(name);
            target.set_property(name, "0px", important);
        }
    }
}
