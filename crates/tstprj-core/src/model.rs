//! Generic tree model shared by the binary project tree and the derived
//! markup tree.
//!
//! Nodes live in an arena (`Vec<NodeData>`) owned by a single [`Tree`] and
//! are addressed by [`NodeId`] indices; parent links are plain indices, so
//! no reference-counted cycles can form. Node 0 is a synthetic root named
//! `"root"`; the parsed document root is its sole child.
//!
//! The model exposes structural operations only. It knows nothing about the
//! wire encoding: the element/attribute split is decided once by the parser
//! and stored as the shapes themselves, never re-derived from key casing.

use crate::error::{Error, Result};

/// Index of a node in a tree arena.
pub type NodeId = usize;

/// Key of the synthetic root node above the document root.
pub const ROOT_KEY: &str = "root";

/// Reserved key of the markup-bearing string attribute.
pub const MARKUP_KEY: &str = "tsml";

/// Attribute type discriminants of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttrType {
    Int = 0x01,
    Double = 0x04,
    String = 0x05,
}

impl AttrType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(AttrType::Int),
            0x04 => Some(AttrType::Double),
            0x05 => Some(AttrType::String),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Scalar value of an attribute; the variant is the authoritative type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i32),
    Double(f64),
    Str(String),
}

impl AttrValue {
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::Int(_) => AttrType::Int,
            AttrValue::Double(_) => AttrType::Double,
            AttrValue::Str(_) => AttrType::String,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            AttrValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            AttrValue::Double(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Int(n) => write!(f, "{}", n),
            AttrValue::Double(x) => write!(f, "{}", x),
            AttrValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// A typed leaf scalar attached to an element.
///
/// A string attribute keyed [`MARKUP_KEY`] may additionally carry a derived
/// markup tree (see the `markup` module); the string value stays the source
/// of truth and the derived tree is dropped whenever the value is
/// reassigned out-of-band.
#[derive(Debug, Clone)]
pub struct Attribute {
    key: String,
    value: AttrValue,
    parent: Option<NodeId>,
    pub(crate) markup: Option<Box<Tree>>,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: AttrValue) -> Self {
        Attribute {
            key: key.into(),
            value,
            parent: None,
            markup: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &AttrValue {
        &self.value
    }

    pub fn attr_type(&self) -> AttrType {
        self.value.attr_type()
    }

    /// Owning element, if the attribute has been attached to a tree.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Reassigns the scalar value and invalidates any derived markup tree.
    pub fn set_value(&mut self, value: AttrValue) {
        self.value = value;
        self.markup = None;
    }

    // For the flatten path, which re-renders the (still valid) derived
    // tree into the value.
    pub(crate) fn set_value_keep_markup(&mut self, value: AttrValue) {
        self.value = value;
    }

    /// Whether this is the reserved markup-bearing string attribute.
    pub fn is_markup_bearing(&self) -> bool {
        self.key == MARKUP_KEY && matches!(self.value, AttrValue::Str(_))
    }

    /// The derived markup tree, if it has been parsed.
    pub fn markup(&self) -> Option<&Tree> {
        self.markup.as_deref()
    }

    pub fn markup_mut(&mut self) -> Option<&mut Tree> {
        self.markup.as_deref_mut()
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    key: String,
    parent: Option<NodeId>,
    attributes: Vec<Attribute>,
    children: Vec<NodeId>,
    // Markup text node: empty key, direct string value, no attrs/children.
    text: Option<String>,
}

impl NodeData {
    fn element(key: String, parent: Option<NodeId>) -> Self {
        NodeData {
            key,
            parent,
            attributes: Vec::new(),
            children: Vec::new(),
            text: None,
        }
    }
}

/// Arena-backed tree of elements, attributes and (for markup trees) text
/// nodes.
///
/// Every node except the synthetic root has exactly one parent and appears
/// exactly once in that parent's child list; insertion order is preserved
/// verbatim by the serializers. Detached nodes stay in the arena but are
/// unreachable from the root.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
}

impl Tree {
    /// Creates a tree holding only the synthetic root node.
    pub fn new() -> Self {
        Tree {
            nodes: vec![NodeData::element(ROOT_KEY.to_string(), None)],
        }
    }

    /// The synthetic root node.
    pub fn root(&self) -> NodeId {
        0
    }

    /// The document root: sole child of the synthetic root, if present.
    pub fn document_root(&self) -> Option<NodeId> {
        self.nodes[0].children.first().copied()
    }

    /// Appends a new element under `parent` and returns its id.
    pub fn add_child(&mut self, parent: NodeId, key: impl Into<String>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeData::element(key.into(), Some(parent)));
        self.nodes[parent].children.push(id);
        id
    }

    /// Splices a new element into `parent`'s child list at `index`
    /// (clamped to the list length).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, key: impl Into<String>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeData::element(key.into(), Some(parent)));
        let children = &mut self.nodes[parent].children;
        let at = index.min(children.len());
        children.insert(at, id);
        id
    }

    /// Removes the `index`-th child of `parent` from its child list. The
    /// node stays in the arena but becomes unreachable.
    pub fn detach_child(&mut self, parent: NodeId, index: usize) -> Option<NodeId> {
        if index >= self.nodes[parent].children.len() {
            return None;
        }
        let id = self.nodes[parent].children.remove(index);
        self.nodes[id].parent = None;
        Some(id)
    }

    /// Appends a text node (markup trees only) under `parent`.
    pub fn add_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        let id = self.nodes.len();
        let mut node = NodeData::element(String::new(), Some(parent));
        node.text = Some(text.into());
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    /// Appends `attr` to `id`'s attribute list, wiring the back-reference.
    pub fn push_attribute(&mut self, id: NodeId, mut attr: Attribute) {
        attr.parent = Some(id);
        self.nodes[id].attributes.push(attr);
    }

    /// Splices `attr` into `id`'s attribute list at `index` (clamped).
    pub fn insert_attribute(&mut self, id: NodeId, index: usize, mut attr: Attribute) {
        attr.parent = Some(id);
        let attrs = &mut self.nodes[id].attributes;
        let at = index.min(attrs.len());
        attrs.insert(at, attr);
    }

    /// Removes and returns the attribute keyed `key` on `id`, if any.
    pub fn remove_attribute(&mut self, id: NodeId, key: &str) -> Option<Attribute> {
        let attrs = &mut self.nodes[id].attributes;
        let pos = attrs.iter().position(|a| a.key == key)?;
        let mut attr = attrs.remove(pos);
        attr.parent = None;
        Some(attr)
    }

    pub fn key(&self, id: NodeId) -> &str {
        &self.nodes[id].key
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        &self.nodes[id].attributes
    }

    pub fn attributes_mut(&mut self, id: NodeId) -> &mut [Attribute] {
        &mut self.nodes[id].attributes
    }

    /// First attribute keyed `key` on `id`.
    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&Attribute> {
        self.nodes[id].attributes.iter().find(|a| a.key == key)
    }

    pub fn attribute_mut(&mut self, id: NodeId, key: &str) -> Option<&mut Attribute> {
        self.nodes[id].attributes.iter_mut().find(|a| a.key == key)
    }

    /// Text content, if `id` is a markup text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.nodes[id].text.as_deref()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.nodes[id].text.is_some()
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<()> {
        if self.nodes[id].text.is_none() {
            return Err(Error::InvalidKey {
                key: self.nodes[id].key.clone(),
                reason: "not a text node",
            });
        }
        self.nodes[id].text = Some(text.into());
        Ok(())
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}
