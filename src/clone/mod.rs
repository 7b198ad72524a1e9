//! Clone engine: copy a source subtree into a [`CloneTree`] with every
//! element's resolved style inlined.
//!
//! The walk uses an explicit work stack instead of recursion. Visiting an
//! element pushes a `Finish` item below its children, so post-processing
//! (style capture, pseudo-elements, form values, SVG fix-ups) runs only once
//! the whole subtree has been cloned. Children are pushed in reverse so they
//! pop, and are appended, in source order.

pub mod tree;

pub use tree::{CloneData, CloneNode, CloneTree, ElementData, Namespace, NodeId};

use crate::dom::{
    ComputedStyle, ElementKind, NodeInfo, NodeKind, PseudoElement, SourceDocument, SourceNode,
    SvgKind, SVG_NAMESPACE,
};
use crate::style::{DefaultStyleTable, StyleCapture, StyleDeclaration};
use crate::{util, Error, Result};
use std::rc::Rc;

/// Caller predicate deciding whether a node (and its subtree) is cloned.
pub type FilterFn = dyn Fn(&dyn NodeInfo) -> bool + Send + Sync;

enum Work<N> {
    Visit {
        source: N,
        parent: NodeId,
        parent_style: Rc<ComputedStyle>,
    },
    Finish {
        source: N,
        id: NodeId,
        style: Rc<ComputedStyle>,
        parent_style: Option<Rc<ComputedStyle>>,
        is_root: bool,
    },
}

pub struct CloneEngine<'a, 'f, D: SourceDocument + ?Sized> {
    capture: StyleCapture<'a, D>,
    filter: Option<&'f FilterFn>,
}

impl<'a, 'f, D: SourceDocument + ?Sized> CloneEngine<'a, 'f, D> {
    pub fn new(document: &'a D, defaults: &'a DefaultStyleTable, filter: Option<&'f FilterFn>) -> Self {
        Self {
            capture: StyleCapture::new(document, defaults),
            filter,
        }
    }

    /// Clone `root` and everything below it that passes the filter.
    ///
    /// The root itself is never filtered. A root that is neither an element
    /// nor character data cannot be captured.
    pub fn clone_tree(&self, root: D::Node<'a>) -> Result<CloneTree> {
        let (data, is_element) = match self.shallow_clone(&root) {
            Some(cloned) => cloned,
            None => {
                return Err(Error::Other(format!(
                    "cannot capture node of kind {:?}",
                    root.kind()
                )))
            }
        };
        let mut tree = CloneTree::new(data);
        if !is_element {
            return Ok(tree);
        }

        let root_id = tree.root();
        let style = Rc::new(root.computed_style(None));
        let mut stack = Vec::new();
        self.push_element(&mut stack, root, root_id, style, None, true);

        while let Some(work) = stack.pop() {
            match work {
                Work::Visit {
                    source,
                    parent,
                    parent_style,
                } => {
                    if !self.accepts(&source) {
                        log::trace!("filter excluded <{}>", source.tag_name());
                        continue;
                    }
                    let Some((data, is_element)) = self.shallow_clone(&source) else {
                        continue;
                    };
                    let id = tree.append_child(parent, data);
                    if is_element {
                        let style = Rc::new(source.computed_style(None));
                        self.push_element(&mut stack, source, id, style, Some(parent_style), false);
                    }
                }
                Work::Finish {
                    source,
                    id,
                    style,
                    parent_style,
                    is_root,
                } => {
                    self.finish(&mut tree, &source, id, &style, parent_style.as_deref(), is_root);
                }
            }
        }

        Ok(tree)
    }

    fn accepts(&self, node: &D::Node<'a>) -> bool {
        match self.filter {
            Some(filter) => filter(node as &dyn NodeInfo),
            None => true,
        }
    }

    /// Queue the finish step, then the children above it.
    fn push_element(
        &self,
        stack: &mut Vec<Work<D::Node<'a>>>,
        source: D::Node<'a>,
        id: NodeId,
        style: Rc<ComputedStyle>,
        parent_style: Option<Rc<ComputedStyle>>,
        is_root: bool,
    ) {
        // A canvas is replaced by an image of its bitmap; its fallback
        // content is not cloned.
        let children = match source.kind() {
            NodeKind::Element(ElementKind::Canvas) => Vec::new(),
            _ => source.children(),
        };
        stack.push(Work::Finish {
            source,
            id,
            style: Rc::clone(&style),
            parent_style,
            is_root,
        });
        for child in children.into_iter().rev() {
            stack.push(Work::Visit {
                source: child,
                parent: id,
                parent_style: Rc::clone(&style),
            });
        }
    }

    /// Structural copy of a single node; `None` for kinds that are dropped.
    fn shallow_clone(&self, source: &D::Node<'a>) -> Option<(CloneData, bool)> {
        match source.kind() {
            NodeKind::Text => Some((CloneData::Text(source.text().unwrap_or_default()), false)),
            NodeKind::Comment => Some((CloneData::Comment(source.text().unwrap_or_default()), false)),
            NodeKind::Other => None,
            NodeKind::Element(ElementKind::Canvas) => {
                let mut img = ElementData::new("img", Namespace::Html);
                match source.canvas_data_url() {
                    Some(src) => img.set_attribute("src", &src),
                    None => log::warn!("canvas without a readable bitmap; cloned as an empty image"),
                }
                Some((CloneData::Element(img), true))
            }
            NodeKind::Element(kind) => {
                let namespace = match kind {
                    ElementKind::Svg(_) => Namespace::Svg,
                    _ => Namespace::Html,
                };
                let mut el = ElementData::new(&source.tag_name(), namespace);
                for (name, value) in source.attributes() {
                    el.set_attribute(&name, &value);
                }
                Some((CloneData::Element(el), true))
            }
        }
    }

    fn finish(
        &self,
        tree: &mut CloneTree,
        source: &D::Node<'a>,
        id: NodeId,
        style: &ComputedStyle,
        parent_style: Option<&ComputedStyle>,
        is_root: bool,
    ) {
        let tag = source.tag_name();
        if let Some(target) = tree.style_mut(id) {
            self.capture.capture(&tag, style, parent_style, is_root, target);
        }
        clone_pseudo_elements(tree, source, id);
        copy_user_input(tree, source, id);
        fix_svg(tree, source, id);
    }
}

/// Reproduce `::before`/`::after` as a `<style>` child scoped to a fresh
/// class on the clone.
fn clone_pseudo_elements<N: SourceNode>(tree: &mut CloneTree, source: &N, id: NodeId) {
    for pseudo in PseudoElement::ALL {
        let style = source.computed_style(Some(pseudo));
        let content = style.get("content");
        if content.is_empty() || content == "none" {
            continue;
        }

        let class = util::uid();
        tree.add_class(id, &class);
        let rule = format!(
            ".{}:{}{{{}}}",
            class,
            pseudo.as_str(),
            pseudo_declarations(&style).css_text()
        );
        let style_el = tree.append_child(
            id,
            CloneData::Element(ElementData::new("style", Namespace::Html)),
        );
        tree.append_child(style_el, CloneData::Text(rule));
    }
}

/// Declarations of a pseudo-element rule. A later declaration of the same
/// property replaces an earlier one, priority included, and `content` always
/// comes last.
fn pseudo_declarations(style: &ComputedStyle) -> StyleDeclaration {
    let mut declarations = match style.css_text.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(css_text) => StyleDeclaration::from_css_text(css_text),
        None => {
            let mut declarations = StyleDeclaration::new();
            for prop in style.iter() {
                declarations.set_property(&prop.name, &prop.value, prop.priority == "important");
            }
            declarations
        }
    };
    let content = declarations
        .remove_property("content")
        .map(|d| (d.value, d.important))
        .unwrap_or_else(|| (style.get("content").to_string(), false));
    declarations.set_property("content", &content.0, content.1);
    declarations
}

fn copy_user_input<N: SourceNode>(tree: &mut CloneTree, source: &N, id: NodeId) {
    let Some(value) = source.form_value() else {
        return;
    };
    match source.kind() {
        NodeKind::Element(ElementKind::TextArea) => tree.set_text_content(id, &value),
        NodeKind::Element(ElementKind::Input) => tree.set_attribute(id, "value", &value),
        _ => {}
    }
}

fn fix_svg<N: SourceNode>(tree: &mut CloneTree, source: &N, id: NodeId) {
    let NodeKind::Element(ElementKind::Svg(svg)) = source.kind() else {
        return;
    };
    let Some(el) = tree.element_mut(id) else {
        return;
    };
    el.set_attribute("xmlns", SVG_NAMESPACE);
    if svg == SvgKind::Rect {
        for dimension in ["width", "height"] {
            if let Some(value) = el.attribute(dimension).map(str::to_string) {
                el.style.set_property(dimension, &value, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::snapshot::{DocumentSnapshot, NodeSnapshot, StyleSnapshot};

    fn clone_doc(doc: &DocumentSnapshot, filter: Option<&FilterFn>) -> CloneTree {
        let table = DefaultStyleTable::default();
        let engine = CloneEngine::new(doc, &table, filter);
        engine.clone_tree(doc.root()).unwrap()
    }

    fn tags(tree: &CloneTree) -> Vec<String> {
        tree.elements().map(|(_, el)| el.tag.clone()).collect()
    }

    #[test]
    fn clones_in_source_order() {
        let doc = DocumentSnapshot::new(
            NodeSnapshot::element("div")
                .child(NodeSnapshot::element("h1").child(NodeSnapshot::text_node("title")))
                .child(NodeSnapshot::comment("note"))
                .child(
                    NodeSnapshot::element("ul")
                        .child(NodeSnapshot::element("li").child(NodeSnapshot::text_node("a")))
                        .child(NodeSnapshot::element("li").child(NodeSnapshot::text_node("b"))),
                )
                .child(NodeSnapshot::text_node("tail")),
        );
        let tree = clone_doc(&doc, None);
        assert_eq!(tags(&tree), vec!["div", "h1", "ul", "li", "li"]);
        assert_eq!(tree.text_content(tree.root()), "titleabtail");
        assert!(matches!(tree.data(tree.children(tree.root())[1]), CloneData::Comment(c) if c == "note"));
    }

    #[test]
    fn filter_prunes_subtrees_but_never_the_root() {
        let doc = DocumentSnapshot::new(
            NodeSnapshot::element("div")
                .attr("class", "skip")
                .child(
                    NodeSnapshot::element("section")
                        .attr("class", "skip")
                        .child(NodeSnapshot::element("p")),
                )
                .child(NodeSnapshot::element("span")),
        );
        let filter = |node: &dyn NodeInfo| node.attribute("class").as_deref() != Some("skip");
        let tree = clone_doc(&doc, Some(&filter));
        assert_eq!(tags(&tree), vec!["div", "span"]);
    }

    #[test]
    fn canvas_becomes_image_of_its_bitmap() {
        let mut canvas = NodeSnapshot::element("canvas").child(NodeSnapshot::text_node("fallback"));
        canvas.canvas_data_url = Some("data:image/png;base64,AAAA".into());
        let doc = DocumentSnapshot::new(NodeSnapshot::element("div").child(canvas));
        let tree = clone_doc(&doc, None);
        let img = tree.find_by_tag("img").unwrap();
        assert_eq!(tree.attribute(img, "src"), Some("data:image/png;base64,AAAA"));
        assert!(tree.children(img).is_empty());
    }

    #[test]
    fn pseudo_elements_become_scoped_rules() {
        let mut root = NodeSnapshot::element("div");
        root.before = Some(
            StyleSnapshot::new()
                .with("content", "\"*\"")
                .with("color", "red"),
        );
        root.after = Some(StyleSnapshot::new().with("content", "none"));
        let doc = DocumentSnapshot::new(root);
        let tree = clone_doc(&doc, None);

        let el = tree.element(tree.root()).unwrap();
        let class = el.attribute("class").unwrap().to_string();
        let style = tree.find_by_tag("style").unwrap();
        assert_eq!(
            tree.text_content(style),
            format!(".{}:before{{color: red; content: \"*\";}}", class)
        );
        assert_eq!(tree.elements().filter(|(_, e)| e.tag == "style").count(), 1);
    }

    #[test]
    fn explicit_content_declaration_wins() {
        let mut style = ComputedStyle::new().with("content", "\"a\"");
        style.css_text = Some("content: \"b\" !important; color: blue".into());
        let declarations = pseudo_declarations(&style);
        assert_eq!(declarations.css_text(), "color: blue; content: \"b\" !important;");
    }

    #[test]
    fn form_values_are_copied() {
        let mut input = NodeSnapshot::element("input").attr("type", "text");
        input.value = Some("typed".into());
        let mut textarea = NodeSnapshot::element("textarea").child(NodeSnapshot::text_node("initial"));
        textarea.value = Some("edited".into());
        let doc = DocumentSnapshot::new(NodeSnapshot::element("form").child(input).child(textarea));
        let tree = clone_doc(&doc, None);

        let input = tree.find_by_tag("input").unwrap();
        assert_eq!(tree.attribute(input, "value"), Some("typed"));
        let textarea = tree.find_by_tag("textarea").unwrap();
        assert_eq!(tree.text_content(textarea), "edited");
    }

    #[test]
    fn svg_elements_get_namespace_and_rect_size_style() {
        let doc = DocumentSnapshot::new(
            NodeSnapshot::element("div").child(
                NodeSnapshot::svg("svg").child(
                    NodeSnapshot::svg("rect")
                        .attr("width", "10")
                        .attr("height", "20"),
                ),
            ),
        );
        let tree = clone_doc(&doc, None);
        let svg = tree.find_by_tag("svg").unwrap();
        assert_eq!(tree.attribute(svg, "xmlns"), Some(SVG_NAMESPACE));
        let rect = tree.find_by_tag("rect").unwrap();
        let rect = tree.element(rect).unwrap();
        assert_eq!(rect.namespace, Namespace::Svg);
        assert_eq!(rect.style.get("width"), Some("10"));
        assert_eq!(rect.style.get("height"), Some("20"));
    }

    #[test]
    fn children_see_their_parents_resolved_style() {
        let doc = DocumentSnapshot::new(
            NodeSnapshot::element("div")
                .css("color", "rgb(0, 0, 255)")
                .child(NodeSnapshot::element("span").css("color", "rgb(0, 0, 255)"))
                .child(NodeSnapshot::element("em").css("color", "rgb(0, 0, 0)")),
        )
        .with_default_style("span", StyleSnapshot::new().with("color", "rgb(0, 0, 0)"))
        .with_default_style("em", StyleSnapshot::new().with("color", "rgb(0, 0, 0)"));
        let tree = clone_doc(&doc, None);

        // Same as parent but not default: kept. Same as default but not parent: kept.
        let span = tree.element(tree.find_by_tag("span").unwrap()).unwrap();
        assert_eq!(span.style.get("color"), Some("rgb(0, 0, 255)"));
        let em = tree.element(tree.find_by_tag("em").unwrap()).unwrap();
        assert_eq!(em.style.get("color"), Some("rgb(0, 0, 0)"));
    }

    #[test]
    fn deep_trees_do_not_recurse() {
        let mut node = NodeSnapshot::element("div");
        for _ in 0..2_000 {
            node = NodeSnapshot::element("div").child(node);
        }
        let doc = DocumentSnapshot::new(node);
        let tree = clone_doc(&doc, None);
        assert_eq!(tree.node_count(), 2_001);
    }
}
