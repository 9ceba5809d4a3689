//! XPath values and node references

use std::cmp::Ordering;

use crate::xml::model::{Attribute, Document, NodeId, NodeKind};

/// A node an XPath expression can select: a tree node or an attribute of an
/// element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum XNode {
    Node(NodeId),
    /// Element id and attribute index
    Attribute(NodeId, usize),
}

impl XNode {
    /// Document-order key; attributes sort after their element and before
    /// its children
    pub const fn order_key(self) -> (usize, usize) {
        match self {
            Self::Node(id) => (id.index(), 0),
            Self::Attribute(id, i) => (id.index(), i + 1),
        }
    }

    pub fn attribute(self, doc: &Document) -> Option<&Attribute> {
        match self {
            Self::Attribute(id, i) => doc.element(id).and_then(|e| e.attributes.get(i)),
            Self::Node(_) => None,
        }
    }

    /// Parent in the XPath sense: attributes belong to their element
    pub fn parent(self, doc: &Document) -> Option<NodeId> {
        match self {
            Self::Node(id) => doc.parent(id),
            Self::Attribute(id, _) => Some(id),
        }
    }

    pub fn string_value(self, doc: &Document) -> String {
        match self {
            Self::Node(id) => doc.string_value(id),
            Self::Attribute(..) => self
                .attribute(doc)
                .map(|attr| attr.value.clone())
                .unwrap_or_default(),
        }
    }

    /// Qualified name as written in the source
    pub fn name(self, doc: &Document) -> String {
        match self {
            Self::Node(id) => match &doc.node(id).kind {
                NodeKind::Element(element) => element.name.to_string(),
                NodeKind::ProcessingInstruction { target, .. } => target.clone(),
                _ => String::new(),
            },
            Self::Attribute(..) => self
                .attribute(doc)
                .map(|attr| attr.name.to_string())
                .unwrap_or_default(),
        }
    }

    pub fn local_name(self, doc: &Document) -> String {
        match self {
            Self::Node(id) => match &doc.node(id).kind {
                NodeKind::Element(element) => element.name.local.clone(),
                NodeKind::ProcessingInstruction { target, .. } => target.clone(),
                _ => String::new(),
            },
            Self::Attribute(..) => self
                .attribute(doc)
                .map(|attr| attr.name.local.clone())
                .unwrap_or_default(),
        }
    }

    pub fn namespace_uri(self, doc: &Document) -> Option<&str> {
        match self {
            Self::Node(id) => doc.element(id).and_then(|e| e.namespace.as_deref()),
            Self::Attribute(..) => self.attribute(doc).and_then(|a| a.namespace.as_deref()),
        }
    }

    /// Source line of the node, or of the owning element for attributes
    pub fn line(self, doc: &Document) -> u32 {
        match self {
            Self::Node(id) | Self::Attribute(id, _) => doc.node(id).line,
        }
    }
}

impl PartialOrd for XNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for XNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

/// Result of evaluating an XPath expression
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Nodes in document order without duplicates
    NodeSet(Vec<XNode>),
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Value {
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::NodeSet(nodes) => !nodes.is_empty(),
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
        }
    }

    pub fn to_number(&self, doc: &Document) -> f64 {
        match self {
            Self::NodeSet(_) => parse_number(&self.to_string_value(doc)),
            Self::Boolean(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => parse_number(s),
        }
    }

    /// String conversion; a node-set converts through its first node
    pub fn to_string_value(&self, doc: &Document) -> String {
        match self {
            Self::NodeSet(nodes) => nodes
                .first()
                .map(|node| node.string_value(doc))
                .unwrap_or_default(),
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
        }
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::NodeSet(_) => "node-set",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }
}

/// Parse a string as an XPath number: optional minus, digits with at most
/// one decimal point, surrounding whitespace allowed; anything else is NaN
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1
        && digits != ".";
    if !valid {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Render a number the way XPath `string()` does
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}
