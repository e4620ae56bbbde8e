//! Owned, index-addressed DOM.
//!
//! Parsing goes through `scraper`, which also decodes character entities.
//! The resulting tree is flattened into an arena so the region and sequence
//! heuristics can walk parents, siblings and subtrees by plain indices.

use scraper::{ElementRef, Html, Node};

use crate::util::normalize_whitespace;


pub type NodeId = usize;

pub const ROOT: NodeId = 0;

const MAX_TREE_DEPTH: usize = 512;

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "object", "link",
];

const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "br",
    "caption",
    "dd",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "legend",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

pub const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct DomNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    /// Whitespace-only text separated this node from its previous sibling.
    pub space_before: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub node: NodeId,
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<DomNode>,
}

impl DomTree {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut tree = DomTree {
            nodes: vec![DomNode {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                depth: 0,
                space_before: false,
            }],
        };

        let root_element = document.root_element();
        if let Some(html_id) = tree.push_element(ROOT, root_element, false) {
            tree.build_children(html_id, root_element);
        }

        tree
    }

    fn build_children(&mut self, parent: NodeId, element: ElementRef<'_>) {
        if self.nodes[parent].depth >= MAX_TREE_DEPTH {
            return;
        }

        let mut pending_space = false;
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    if text.trim().is_empty() {
                        pending_space = true;
                        continue;
                    }
                    self.push(parent, NodeKind::Text(collapse_whitespace(text)), pending_space);
                    pending_space = false;
                }
                Node::Element(_) => {
                    let Some(child_element) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if let Some(child_id) = self.push_element(parent, child_element, pending_space)
                    {
                        self.build_children(child_id, child_element);
                        pending_space = false;
                    }
                }
                _ => {}
            }
        }
    }

    fn push_element(
        &mut self,
        parent: NodeId,
        element: ElementRef<'_>,
        space_before: bool,
    ) -> Option<NodeId> {
        let value = element.value();
        let tag = value.name().to_ascii_lowercase();
        if SKIPPED_TAGS.contains(&tag.as_str()) {
            return None;
        }

        let attrs = value
            .attrs()
            .map(|(name, content)| (name.to_ascii_lowercase(), content.to_string()))
            .collect::<Vec<(String, String)>>();

        Some(self.push(parent, NodeKind::Element { tag, attrs }, space_before))
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind, space_before: bool) -> NodeId {
        let id = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(DomNode {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            depth,
            space_before,
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.nodes[id].depth
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].kind, NodeKind::Element { .. })
    }

    pub fn is_tag(&self, id: NodeId, expected: &str) -> bool {
        self.tag(id) == Some(expected)
    }

    pub fn is_heading(&self, id: NodeId) -> bool {
        self.tag(id)
            .map(|tag| HEADING_TAGS.contains(&tag))
            .unwrap_or(false)
    }

    pub fn is_block(&self, id: NodeId) -> bool {
        self.tag(id)
            .map(|tag| BLOCK_TAGS.contains(&tag))
            .unwrap_or(false)
    }

    /// Text node content, `None` for elements.
    pub fn text_content(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|value| value.split_whitespace().any(|item| item == class))
            .unwrap_or(false)
    }

    /// Pre-order descendants, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = self.nodes[id]
            .children
            .iter()
            .rev()
            .copied()
            .collect::<Vec<NodeId>>();

        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current].children.iter().rev().copied());
        }

        out
    }

    pub fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        while let Some(parent) = self.nodes[node].parent {
            if parent == ancestor {
                return true;
            }
            node = parent;
        }
        false
    }

    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.is_ancestor(ancestor, node)
    }

    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &[], &mut out);
        normalize_whitespace(&out)
    }

    fn collect_text(&self, id: NodeId, skipped: &[NodeId], out: &mut String) {
        if self.nodes[id].space_before {
            out.push(' ');
        }
        if skipped.contains(&id) {
            out.push(' ');
            return;
        }
        match &self.nodes[id].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Document | NodeKind::Element { .. } => {
                let block = self.is_block(id);
                if block {
                    out.push(' ');
                }
                for child in &self.nodes[id].children {
                    self.collect_text(*child, skipped, out);
                }
                if block {
                    out.push(' ');
                }
            }
        }
    }

    pub fn text_of_nodes(&self, ids: &[NodeId]) -> String {
        self.text_of_nodes_without(ids, &[])
    }

    /// Text of `ids` with the subtrees rooted at `skipped` left out.
    pub fn text_of_nodes_without(&self, ids: &[NodeId], skipped: &[NodeId]) -> String {
        let mut out = String::new();
        for id in ids {
            self.collect_text(*id, skipped, &mut out);
            out.push(' ');
        }
        normalize_whitespace(&out)
    }

    pub fn links(&self, id: NodeId) -> Vec<Link> {
        let mut candidates = vec![id];
        candidates.extend(self.descendants(id));
        self.links_in(&candidates)
    }

    pub fn links_in_nodes(&self, ids: &[NodeId]) -> Vec<Link> {
        let mut candidates = Vec::new();
        for id in ids {
            candidates.push(*id);
            candidates.extend(self.descendants(*id));
        }
        self.links_in(&candidates)
    }

    fn links_in(&self, candidates: &[NodeId]) -> Vec<Link> {
        candidates
            .iter()
            .copied()
            .filter(|node| self.is_tag(*node, "a"))
            .filter_map(|node| {
                let href = self.attr(node, "href")?.trim();
                if href.is_empty() {
                    return None;
                }
                Some(Link {
                    node,
                    href: href.to_string(),
                    text: self.text(node),
                })
            })
            .collect()
    }

    /// CSS-like location such as `html>body>div:2>ul`.
    pub fn path(&self, id: NodeId) -> String {
        let mut segments = Vec::<String>::new();
        let mut current = Some(id);

        while let Some(node) = current {
            if let Some(tag) = self.tag(node) {
                let segment = match self.nodes[node].parent {
                    Some(parent) => {
                        let same_tag = self.nodes[parent]
                            .children
                            .iter()
                            .copied()
                            .filter(|sibling| self.tag(*sibling) == Some(tag))
                            .collect::<Vec<NodeId>>();
                        if same_tag.len() > 1 {
                            let position = same_tag
                                .iter()
                                .position(|sibling| *sibling == node)
                                .unwrap_or(0);
                            format!("{}:{}", tag, position + 1)
                        } else {
                            tag.to_string()
                        }
                    }
                    None => tag.to_string(),
                };
                segments.push(segment);
            }
            current = self.nodes[node].parent;
        }

        segments.reverse();
        segments.join(">")
    }

    pub fn find_first(&self, tag: &str) -> Option<NodeId> {
        (0..self.nodes.len()).find(|id| self.is_tag(*id, tag))
    }

    pub fn title(&self) -> Option<String> {
        let id = self.find_first("title")?;
        let text = self.text(id);
        if text.is_empty() { None } else { Some(text) }
    }

    /// `(name or property, content)` for every `<meta>` with content, in document order.
    pub fn meta_tags(&self) -> Vec<(String, String)> {
        (0..self.nodes.len())
            .filter(|id| self.is_tag(*id, "meta"))
            .filter_map(|id| {
                let key = self
                    .attr(id, "name")
                    .or_else(|| self.attr(id, "property"))?
                    .trim();
                let content = self.attr(id, "content")?.trim();
                if key.is_empty() || content.is_empty() {
                    return None;
                }
                Some((key.to_string(), normalize_whitespace(content)))
            })
            .collect()
    }
}

/// Runs of whitespace become one space; the caller drops whitespace-only text.
fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut previous_space = false;

    for ch in input.chars() {
        if ch.is_whitespace() {
            if !previous_space {
                out.push(' ');
                previous_space = true;
            }
        } else {
            out.push(ch);
            previous_space = false;
        }
    }

    out
}
