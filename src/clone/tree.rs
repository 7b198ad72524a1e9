//! Arena-allocated clone tree.
//!
//! Nodes live in a single `Vec` and refer to each other by [`NodeId`]. A
//! conversion owns its tree outright; nothing in it is shared.

use crate::style::StyleDeclaration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Html,
    Svg,
}

/// A cloned element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub tag: String,
    pub namespace: Namespace,
    /// Attributes in source order, `style` excluded
    pub attributes: Vec<(String, String)>,
    /// Inline style, serialized as the `style` attribute
    pub style: StyleDeclaration,
}

impl ElementData {
    pub fn new(tag: &str, namespace: Namespace) -> Self {
        Self {
            tag: tag.to_string(),
            namespace,
            attributes: Vec::new(),
            style: StyleDeclaration::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        if name == "style" {
            self.style.set_css_text(value);
            return;
        }
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(idx).1)
    }

    pub fn add_class(&mut self, class: &str) {
        let classes = match self.attribute("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute("class", &classes);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .map(|c| c.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CloneData {
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloneNode {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: CloneData,
}

/// The clone of a captured subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct CloneTree {
    nodes: Vec<CloneNode>,
    root: NodeId,
}

impl CloneTree {
    pub fn new(root: CloneData) -> Self {
        Self {
            nodes: vec![CloneNode {
                parent: None,
                children: Vec::new(),
                data: root,
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &CloneNode {
        &self.nodes[id.0]
    }

    pub fn data(&self, id: NodeId) -> &CloneData {
        &self.nodes[id.0].data
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Append a new node as last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, data: CloneData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(CloneNode {
            parent: Some(parent),
            children: Vec::new(),
            data,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Unlink `id` from its parent. The node stays in the arena but is no
    /// longer reachable from the root.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].data {
            CloneData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].data {
            CloneData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attribute(name))
    }

    /// No-op on text and comment nodes.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.set_attribute(name, value);
        }
    }

    pub fn style_mut(&mut self, id: NodeId) -> Option<&mut StyleDeclaration> {
        self.element_mut(id).map(|el| &mut el.style)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if let Some(el) = self.element_mut(id) {
            el.add_class(class);
        }
    }

    /// Replace every child of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        for child in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[child.0].parent = None;
        }
        if !text.is_empty() {
            self.append_child(id, CloneData::Text(text.to_string()));
        }
    }

    /// Concatenated text of `id` and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| match &self.nodes[n.0].data {
                CloneData::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// `id` and every node below it, in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev().copied());
        }
        out
    }

    /// Elements reachable from the root, in document order.
    pub fn elements(&self) -> impl Iterator<Item = (NodeId, &ElementData)> + '_ {
        self.descendants(self.root)
            .into_iter()
            .filter_map(move |id| self.element(id).map(|el| (id, el)))
    }

    /// First reachable element with tag `tag`.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.elements()
            .find(|(_, el)| el.tag.eq_ignore_ascii_case(tag))
            .map(|(id, _)| id)
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.descendants(self.root).len()
    }
}
