/// AST node types for CommonMark documents, stored in an arena
use std::collections::BTreeMap;

use indextree::{Arena, NodeEdge};
use serde::{Deserialize, Serialize};

use crate::source::{SourceSpan, merge_spans};

pub use indextree::NodeId;

/// The kind of a node and the data that goes with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeValue {
    Document,
    // Block-level nodes
    BlockQuote,
    BulletList(BulletList),
    OrderedList(OrderedList),
    ListItem(ListItem),
    FencedCodeBlock(FencedCodeBlock),
    IndentedCodeBlock {
        literal: String,
    },
    Heading {
        level: u8,
    },
    HtmlBlock {
        literal: String,
    },
    Paragraph,
    ThematicBreak,
    LinkReferenceDefinition(LinkReferenceDefinition),
    // Inline nodes
    Text(String),
    Code(String),
    Emphasis {
        delimiter: char,
    },
    StrongEmphasis {
        delimiter: char,
    },
    Link(Link),
    Image(Link),
    HtmlInline(String),
    SoftLineBreak,
    HardLineBreak,
    // Kinds contributed by extensions
    CustomBlock(CustomNode),
    CustomInline(CustomNode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletList {
    pub marker: char,
    pub tight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedList {
    pub start: u32,
    pub delimiter: char,
    pub tight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    /// Column of the list marker.
    pub marker_indent: usize,
    /// Columns from the marker to the start of the item's content.
    pub content_indent: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FencedCodeBlock {
    pub fence_char: char,
    pub fence_length: usize,
    pub fence_indent: usize,
    pub info: String,
    pub literal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReferenceDefinition {
    pub label: String,
    pub destination: String,
    pub title: Option<String>,
}

/// Destination and title shared by links and images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub destination: String,
    pub title: Option<String>,
}

/// A node kind defined outside the core, identified by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomNode {
    pub name: String,
    /// Custom blocks only: whether other blocks may be nested inside.
    pub container: bool,
    pub literal: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl CustomNode {
    pub fn new(name: impl Into<String>) -> Self {
        CustomNode {
            name: name.into(),
            ..CustomNode::default()
        }
    }
}

impl NodeValue {
    pub fn is_block(&self) -> bool {
        !matches!(
            self,
            NodeValue::Text(_)
                | NodeValue::Code(_)
                | NodeValue::Emphasis { .. }
                | NodeValue::StrongEmphasis { .. }
                | NodeValue::Link(_)
                | NodeValue::Image(_)
                | NodeValue::HtmlInline(_)
                | NodeValue::SoftLineBreak
                | NodeValue::HardLineBreak
                | NodeValue::CustomInline(_)
        )
    }

    /// Blocks that hold other blocks rather than inline content.
    pub fn is_container(&self) -> bool {
        match self {
            NodeValue::Document
            | NodeValue::BlockQuote
            | NodeValue::BulletList(_)
            | NodeValue::OrderedList(_)
            | NodeValue::ListItem(_) => true,
            NodeValue::CustomBlock(custom) => custom.container,
            _ => false,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, NodeValue::BulletList(_) | NodeValue::OrderedList(_))
    }

    /// Tightness of a list node, `None` for anything else.
    pub fn list_tight(&self) -> Option<bool> {
        match self {
            NodeValue::BulletList(list) => Some(list.tight),
            NodeValue::OrderedList(list) => Some(list.tight),
            _ => None,
        }
    }

    pub(crate) fn set_list_tight(&mut self, tight: bool) {
        match self {
            NodeValue::BulletList(list) => list.tight = tight,
            NodeValue::OrderedList(list) => list.tight = tight,
            _ => {}
        }
    }
}

/// A node as stored in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub value: NodeValue,
    pub source_spans: Vec<SourceSpan>,
}

/// Whether a visitor wants to see the children of the node it just entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Children,
    SkipChildren,
}

pub trait Visitor {
    fn enter(&mut self, document: &Document, node: NodeId) -> Visit;

    fn leave(&mut self, _document: &Document, _node: NodeId) {}
}

/// A parsed document: the node arena plus its root.
///
/// The tree invariants (single parent, no cycles, ordered children) are kept by the
/// mutation methods, which panic when asked to make a node its own ancestor.
#[derive(Debug, Clone)]
pub struct Document {
    arena: Arena<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(Node {
            value: NodeValue::Document,
            source_spans: Vec::new(),
        });
        Document { arena, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Creates a detached node.
    pub fn new_node(&mut self, value: NodeValue) -> NodeId {
        self.arena.new_node(Node {
            value,
            source_spans: Vec::new(),
        })
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.arena[id].get()
    }

    pub fn value(&self, id: NodeId) -> &NodeValue {
        &self.arena[id].get().value
    }

    pub fn value_mut(&mut self, id: NodeId) -> &mut NodeValue {
        &mut self.arena[id].get_mut().value
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].first_child()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].last_child()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].previous_sibling()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].next_sibling()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// The node itself followed by all its descendants in document order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        parent.append(child, &mut self.arena);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        parent.prepend(child, &mut self.arena);
    }

    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        sibling.insert_before(node, &mut self.arena);
    }

    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) {
        sibling.insert_after(node, &mut self.arena);
    }

    /// Detaches a node (with its subtree) from its parent and siblings.
    pub fn unlink(&mut self, id: NodeId) {
        id.detach(&mut self.arena);
    }

    pub fn source_spans(&self, id: NodeId) -> &[SourceSpan] {
        &self.arena[id].get().source_spans
    }

    pub fn set_source_spans(&mut self, id: NodeId, spans: Vec<SourceSpan>) {
        self.arena[id].get_mut().source_spans = spans;
    }

    pub fn add_source_span(&mut self, id: NodeId, span: SourceSpan) {
        self.arena[id].get_mut().source_spans.push(span);
    }

    /// Adds spans, merging with the node's last span where they are contiguous.
    pub fn merge_source_spans(&mut self, id: NodeId, spans: &[SourceSpan]) {
        merge_spans(&mut self.arena[id].get_mut().source_spans, spans);
    }

    /// Moves the siblings strictly between `start` and `end` into a new node
    /// inserted right after `start`, and returns the new node.
    pub fn wrap_between(&mut self, start: NodeId, end: NodeId, value: NodeValue) -> NodeId {
        let wrapper = self.new_node(value);
        let mut next = self.next_sibling(start);
        while let Some(node) = next {
            if node == end {
                break;
            }
            next = self.next_sibling(node);
            self.append_child(wrapper, node);
        }
        self.insert_after(start, wrapper);
        wrapper
    }

    /// Concatenated literal text below `id`; line breaks become `\n`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        for node in self.descendants(id) {
            match self.value(node) {
                NodeValue::Text(literal) | NodeValue::Code(literal) => text.push_str(literal),
                NodeValue::SoftLineBreak | NodeValue::HardLineBreak => text.push('\n'),
                _ => {}
            }
        }
        text
    }

    /// Walks the subtree under `id` depth first, calling `enter` and `leave` on each node.
    pub fn walk(&self, id: NodeId, visitor: &mut impl Visitor) {
        let mut skipping: Option<NodeId> = None;
        for edge in id.traverse(&self.arena) {
            match edge {
                NodeEdge::Start(node) => {
                    if skipping.is_none() && visitor.enter(self, node) == Visit::SkipChildren {
                        skipping = Some(node);
                    }
                }
                NodeEdge::End(node) => {
                    if skipping == Some(node) {
                        skipping = None;
                        visitor.leave(self, node);
                    } else if skipping.is_none() {
                        visitor.leave(self, node);
                    }
                }
            }
        }
    }

    /// A nested, serializable copy of the subtree under `id`.
    pub fn to_tree(&self, id: NodeId) -> TreeNode {
        TreeNode {
            value: self.value(id).clone(),
            source_spans: self.source_spans(id).to_vec(),
            children: self.children(id).map(|child| self.to_tree(child)).collect(),
        }
    }
}

/// Owned snapshot of a subtree, used for serialization and structural comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub value: NodeValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_spans: Vec<SourceSpan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(doc: &mut Document, s: &str) -> NodeId {
        doc.new_node(NodeValue::Text(s.to_string()))
    }

    #[test]
    fn test_navigation_after_mutation() {
        let mut doc = Document::new();
        let paragraph = doc.new_node(NodeValue::Paragraph);
        doc.append_child(doc.root(), paragraph);
        let b = text(&mut doc, "b");
        doc.append_child(paragraph, b);
        let a = text(&mut doc, "a");
        doc.prepend_child(paragraph, a);
        let c = text(&mut doc, "c");
        doc.insert_after(b, c);

        assert_eq!(doc.first_child(paragraph), Some(a));
        assert_eq!(doc.last_child(paragraph), Some(c));
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.previous_sibling(c), Some(b));
        assert_eq!(doc.parent(b), Some(paragraph));
        assert_eq!(doc.text_content(doc.root()), "abc");

        doc.unlink(b);
        assert_eq!(doc.parent(b), None);
        assert_eq!(doc.next_sibling(a), Some(c));
        assert_eq!(doc.text_content(paragraph), "ac");
    }

    #[test]
    fn test_wrap_between() {
        let mut doc = Document::new();
        let paragraph = doc.new_node(NodeValue::Paragraph);
        doc.append_child(doc.root(), paragraph);
        let nodes: Vec<NodeId> = ["*", "x", "y", "*"]
            .iter()
            .map(|s| {
                let node = text(&mut doc, s);
                doc.append_child(paragraph, node);
                node
            })
            .collect();

        let emphasis = doc.wrap_between(nodes[0], nodes[3], NodeValue::Emphasis { delimiter: '*' });
        assert_eq!(doc.children(paragraph).count(), 3);
        assert_eq!(doc.children(emphasis).collect::<Vec<_>>(), vec![nodes[1], nodes[2]]);
        assert_eq!(doc.next_sibling(emphasis), Some(nodes[3]));
    }

    #[test]
    #[should_panic]
    fn test_cannot_append_ancestor() {
        let mut doc = Document::new();
        let quote = doc.new_node(NodeValue::BlockQuote);
        doc.append_child(doc.root(), quote);
        let root = doc.root();
        doc.append_child(quote, root);
    }

    struct Counter {
        entered: Vec<String>,
    }

    impl Visitor for Counter {
        fn enter(&mut self, document: &Document, node: NodeId) -> Visit {
            match document.value(node) {
                NodeValue::Text(s) => self.entered.push(s.clone()),
                NodeValue::Image(_) => return Visit::SkipChildren,
                _ => {}
            }
            Visit::Children
        }
    }

    #[test]
    fn test_walk_skips_children() {
        let mut doc = Document::new();
        let paragraph = doc.new_node(NodeValue::Paragraph);
        doc.append_child(doc.root(), paragraph);
        let before = text(&mut doc, "before");
        doc.append_child(paragraph, before);
        let image = doc.new_node(NodeValue::Image(Link {
            destination: "/img".into(),
            title: None,
        }));
        doc.append_child(paragraph, image);
        let alt = text(&mut doc, "alt");
        doc.append_child(image, alt);
        let after = text(&mut doc, "after");
        doc.append_child(paragraph, after);

        let mut counter = Counter { entered: Vec::new() };
        doc.walk(doc.root(), &mut counter);
        assert_eq!(counter.entered, vec!["before", "after"]);
    }

    #[test]
    fn test_tree_snapshot_serializes() {
        let mut doc = Document::new();
        let heading = doc.new_node(NodeValue::Heading { level: 2 });
        doc.append_child(doc.root(), heading);
        let title = text(&mut doc, "Title");
        doc.append_child(heading, title);

        let tree = doc.to_tree(doc.root());
        let json = serde_json::to_string(&tree).unwrap();
        let back: TreeNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
        assert_eq!(back.children[0].value, NodeValue::Heading { level: 2 });
    }
}
