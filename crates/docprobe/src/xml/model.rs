//! XML data model
//!
//! Nodes live in a single arena owned by [`Document`] and are addressed by
//! [`NodeId`]. Ids are handed out in document order, which XPath relies on
//! for sorting node-sets.

use std::fmt;

use indexmap::IndexMap;

/// Namespace bound to the `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Index of a node inside its document arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in document order
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Qualified element or attribute name as written in the source
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    /// Split `prefix:local` on the first colon
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => Self {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
            },
            _ => Self {
                prefix: None,
                local: raw.to_string(),
            },
        }
    }

    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Element attribute with its resolved namespace
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: QName,
    pub namespace: Option<String>,
    pub value: String,
}

/// Element payload
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub name: QName,
    /// Namespace URI the element name resolved to
    pub namespace: Option<String>,
    pub attributes: Vec<Attribute>,
    /// Namespace declarations made on this element; the default namespace
    /// is keyed by the empty string
    pub declarations: IndexMap<String, String>,
}

impl Element {
    /// Attribute value by local name, ignoring namespaces
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.local == local && attr.name.prefix.is_none())
            .map(|attr| attr.value.as_str())
    }

    /// Attribute value by expanded name
    pub fn attribute_ns(&self, namespace: Option<&str>, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.local == local && attr.namespace.as_deref() == namespace)
            .map(|attr| attr.value.as_str())
    }
}

/// XML content node
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

/// Arena node
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Line the node starts on (1-based)
    pub line: u32,
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match &self.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Character data carried directly by text and CDATA nodes
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) | NodeKind::CData(text) => Some(text),
            _ => None,
        }
    }
}

/// `<?xml ...?>` declaration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// `<!DOCTYPE ...>` declaration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Doctype {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    /// Raw text between `[` and `]`
    pub internal_subset: Option<String>,
    pub line: u32,
}

/// XML document
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
    pub declaration: Option<Declaration>,
    pub doctype: Option<Doctype>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document holding only the document node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                line: 1,
            }],
            declaration: None,
            doctype: None,
        }
    }

    /// The document node
    pub const fn document_node(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a node under `parent`
    pub(crate) fn append(&mut self, parent: NodeId, kind: NodeKind, line: u32) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            line,
        });
        if let Some(parent) = self.nodes.get_mut(parent.0) {
            parent.children.push(id);
        }
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Node by id
    #[allow(clippy::indexing_slicing)]
    pub fn node(&self, id: NodeId) -> &Node {
        // ids are only minted by `append`, so they always index the arena
        &self.nodes[id.0]
    }

    /// Number of nodes, document node included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root_element().is_none()
    }

    /// The document element
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.document_node())
            .iter()
            .copied()
            .find(|id| self.node(*id).as_element().is_some())
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.node(id).as_element()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Element children of `id`
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.node(*child).as_element().is_some())
    }

    /// All nodes below `id` in document order, `id` excluded
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            out.push(parent);
            current = self.parent(parent);
        }
        out
    }

    /// Concatenated character data of `id` and its descendants
    pub fn string_value(&self, id: NodeId) -> String {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Text(text) | NodeKind::CData(text) | NodeKind::Comment(text) => text.clone(),
            NodeKind::ProcessingInstruction { data, .. } => data.clone(),
            NodeKind::Document | NodeKind::Element(_) => self
                .descendants(id)
                .into_iter()
                .filter_map(|child| self.node(child).text())
                .collect(),
        }
    }

    /// Resolve `prefix` (empty for the default namespace) in scope of `id`
    pub fn lookup_namespace_uri(&self, id: NodeId, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        let mut current = Some(id);
        while let Some(node_id) = current {
            if let Some(uri) = self
                .element(node_id)
                .and_then(|element| element.declarations.get(prefix))
            {
                // xmlns="" undeclares the default namespace
                return (!uri.is_empty()).then_some(uri.as_str());
            }
            current = self.parent(node_id);
        }
        None
    }

    /// First non-empty prefix bound to `uri` in scope of `id`
    pub fn lookup_prefix(&self, id: NodeId, uri: &str) -> Option<&str> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if let Some(element) = self.element(node_id) {
                let found = element
                    .declarations
                    .iter()
                    .find(|(prefix, bound)| !prefix.is_empty() && bound.as_str() == uri)
                    .map(|(prefix, _)| prefix.as_str());
                if let Some(prefix) = found {
                    if self.lookup_namespace_uri(id, prefix) == Some(uri) {
                        return Some(prefix);
                    }
                }
            }
            current = self.parent(node_id);
        }
        None
    }
}
