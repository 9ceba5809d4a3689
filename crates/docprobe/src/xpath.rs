//! XPath 1.0 engine
//!
//! Expressions are compiled once into an AST ([`XPath::compile`]), optionally
//! rewritten, and evaluated against a [`Document`] through a [`Context`]
//! that carries the registered namespace prefixes.
//!
//! ```
//! use docprobe::xml::XmlDocument;
//! use docprobe::xpath::{Context, XPath};
//!
//! let doc = XmlDocument::parse(r#"<a xmlns:p="urn:p"><p:b>1</p:b><p:b>2</p:b></a>"#)?;
//! let mut context = Context::new(doc.document());
//! context.register_namespace("p", "urn:p");
//! let nodes = context.select(&XPath::compile("/a/p:b")?)?;
//! assert_eq!(nodes.string_values(), vec!["1", "2"]);
//! # Ok::<(), docprobe::Error>(())
//! ```

pub mod ast;
mod eval;
mod functions;
pub mod parser;
pub mod rewrite;
mod value;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result, Span};
use crate::xml::model::{Document, NodeId, NodeKind};
use ast::Expr;
use eval::{Evaluator, Frame};
use value::{Value, XNode};

pub use value::{format_number, parse_number};

/// Compiled XPath expression
#[derive(Clone, Debug, PartialEq)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    pub fn compile(source: &str) -> Result<Self> {
        Ok(Self {
            source: source.to_string(),
            expr: parser::parse(source)?,
        })
    }

    /// Text the expression was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Qualify every unprefixed element name test with `prefix`
    pub fn qualify_default_namespace(&mut self, prefix: &str) {
        rewrite::qualify_default_namespace(&mut self.expr, prefix);
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

/// Evaluation context: a document plus prefix and variable bindings
#[derive(Clone, Debug)]
pub struct Context<'d> {
    doc: &'d Document,
    namespaces: IndexMap<String, String>,
    variables: HashMap<String, Value>,
}

impl<'d> Context<'d> {
    pub fn new(doc: &'d Document) -> Self {
        Self {
            doc,
            namespaces: IndexMap::new(),
            variables: HashMap::new(),
        }
    }

    /// Bind `prefix` to `uri`; a later registration of the same prefix
    /// replaces the earlier one
    pub fn register_namespace(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.namespaces.insert(prefix.into(), uri.into());
    }

    pub fn namespaces(&self) -> &IndexMap<String, String> {
        &self.namespaces
    }

    /// Bind `$name` to a value
    pub fn set_variable(&mut self, name: impl Into<String>, value: XPathValue<'_>) {
        let value = match value {
            XPathValue::NodeSet(nodes) => Value::NodeSet(nodes.nodes),
            XPathValue::Boolean(b) => Value::Boolean(b),
            XPathValue::Number(n) => Value::Number(n),
            XPathValue::String(s) => Value::String(s),
        };
        self.variables.insert(name.into(), value);
    }

    /// Evaluate with the document node as context node
    pub fn evaluate(&self, xpath: &XPath) -> Result<XPathValue<'d>> {
        self.evaluate_at(xpath, self.doc.document_node())
    }

    /// Evaluate with `node` as context node
    pub fn evaluate_at(&self, xpath: &XPath, node: NodeId) -> Result<XPathValue<'d>> {
        let evaluator = Evaluator::new(self.doc, &xpath.source, &self.namespaces, &self.variables);
        let value = evaluator.eval(&xpath.expr, Frame::single(XNode::Node(node)))?;
        Ok(match value {
            Value::NodeSet(nodes) => XPathValue::NodeSet(NodeSet {
                doc: self.doc,
                nodes,
            }),
            Value::Boolean(b) => XPathValue::Boolean(b),
            Value::Number(n) => XPathValue::Number(n),
            Value::String(s) => XPathValue::String(s),
        })
    }

    /// Evaluate an expression that must produce a node-set
    pub fn select(&self, xpath: &XPath) -> Result<NodeSet<'d>> {
        match self.evaluate(xpath)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(Error::with_message(
                ErrorKind::InvalidXPath {
                    expression: xpath.source.clone(),
                },
                Span::empty(),
                format!(
                    "Invalid expression '{}': result is a {}, not a node-set",
                    xpath.source,
                    other.type_name()
                ),
            )),
        }
    }
}

/// Result of evaluating an expression
#[derive(Clone, Debug, PartialEq)]
pub enum XPathValue<'d> {
    NodeSet(NodeSet<'d>),
    Boolean(bool),
    Number(f64),
    String(String),
}

impl XPathValue<'_> {
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::NodeSet(_) => "node-set",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }

    /// XPath `string()` conversion
    pub fn to_string_value(&self) -> String {
        match self {
            Self::NodeSet(nodes) => nodes.first().map(|n| n.string_value()).unwrap_or_default(),
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
        }
    }

    /// XPath `boolean()` conversion
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::NodeSet(nodes) => !nodes.is_empty(),
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
        }
    }
}

/// Nodes selected by a query, in document order
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSet<'d> {
    doc: &'d Document,
    nodes: Vec<XNode>,
}

impl<'d> NodeSet<'d> {
    /// Node-set with no members
    pub const fn empty(doc: &'d Document) -> Self {
        Self {
            doc,
            nodes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NodeRef<'d>> {
        self.nodes.get(index).map(|node| NodeRef {
            doc: self.doc,
            node: *node,
        })
    }

    pub fn first(&self) -> Option<NodeRef<'d>> {
        self.get(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeRef<'d>> + '_ {
        let doc = self.doc;
        self.nodes.iter().map(move |node| NodeRef { doc, node: *node })
    }

    /// String value of every member
    pub fn string_values(&self) -> Vec<String> {
        self.iter().map(|node| node.string_value()).collect()
    }
}

/// A selected node: an element, text, comment, processing instruction,
/// the document node, or an attribute
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeRef<'d> {
    doc: &'d Document,
    node: XNode,
}

impl<'d> NodeRef<'d> {
    /// Qualified name as written in the source; empty for unnamed nodes
    pub fn name(&self) -> String {
        self.node.name(self.doc)
    }

    pub fn local_name(&self) -> String {
        self.node.local_name(self.doc)
    }

    pub fn namespace_uri(&self) -> Option<&'d str> {
        self.node.namespace_uri(self.doc)
    }

    pub fn string_value(&self) -> String {
        self.node.string_value(self.doc)
    }

    /// Line the node starts on; attributes report their element's line
    pub fn line(&self) -> u32 {
        self.node.line(self.doc)
    }

    /// Tree node id, `None` for attributes
    pub const fn id(&self) -> Option<NodeId> {
        match self.node {
            XNode::Node(id) => Some(id),
            XNode::Attribute(..) => None,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.node, XNode::Attribute(..))
    }

    pub fn is_element(&self) -> bool {
        match self.node {
            XNode::Node(id) => matches!(self.doc.node(id).kind, NodeKind::Element(_)),
            XNode::Attribute(..) => false,
        }
    }

    /// Unprefixed attribute of an element node
    pub fn attribute(&self, local: &str) -> Option<&'d str> {
        self.id()
            .and_then(|id| self.doc.element(id))
            .and_then(|element| element.attribute(local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parser::Parser;

    fn document(xml: &str) -> Result<Document> {
        Parser::new(xml.as_bytes()).parse()
    }

    #[test]
    fn test_compile_errors_carry_expression() {
        let err = XPath::compile("//a[").err();
        assert_eq!(
            err.map(|e| e.kind().clone()),
            Some(ErrorKind::InvalidXPath {
                expression: "//a[".into()
            })
        );
    }

    #[test]
    fn test_select_with_registered_prefix() -> Result<()> {
        let doc = document(r#"<a xmlns="urn:d"><b id="1">x</b><b id="2">y</b></a>"#)?;
        let mut xpath = XPath::compile("/a/b[@id = '2']")?;
        xpath.qualify_default_namespace("rootns");
        assert_eq!(xpath.to_string(), "/rootns:a/rootns:b[(@id = '2')]");

        let mut context = Context::new(&doc);
        context.register_namespace("rootns", "urn:d");
        let nodes = context.select(&xpath)?;
        assert_eq!(nodes.len(), 1);
        let node = nodes.first();
        assert_eq!(node.map(|n| n.string_value()).as_deref(), Some("y"));
        assert_eq!(node.and_then(|n| n.attribute("id")), Some("2"));
        assert_eq!(node.and_then(|n| n.namespace_uri()), Some("urn:d"));
        Ok(())
    }

    #[test]
    fn test_scalar_results() -> Result<()> {
        let doc = document("<a><b/><b/></a>")?;
        let context = Context::new(&doc);
        let value = context.evaluate(&XPath::compile("count(//b) * 2")?)?;
        assert_eq!(value, XPathValue::Number(4.0));
        assert_eq!(value.to_string_value(), "4");
        assert!(context.select(&XPath::compile("count(//b)")?).is_err());
        Ok(())
    }

    #[test]
    fn test_variables() -> Result<()> {
        let doc = document("<a><b>1</b><b>2</b></a>")?;
        let mut context = Context::new(&doc);
        context.set_variable("wanted", XPathValue::String("2".into()));
        let nodes = context.select(&XPath::compile("//b[. = $wanted]")?)?;
        assert_eq!(nodes.string_values(), vec!["2"]);
        Ok(())
    }

    #[test]
    fn test_attribute_node_refs() -> Result<()> {
        let doc = document("<a>\n<b k=\"v\"/></a>")?;
        let context = Context::new(&doc);
        let nodes = context.select(&XPath::compile("//@k")?)?;
        let attr = nodes.first();
        assert_eq!(attr.map(|n| n.is_attribute()), Some(true));
        assert_eq!(attr.map(|n| n.name()).as_deref(), Some("k"));
        assert_eq!(attr.map(|n| n.line()), Some(2));
        assert_eq!(attr.and_then(|n| n.id()), None);
        Ok(())
    }
}
