//! XPath 1.0 evaluator
//!
//! Walks an [`Expr`] against a [`Document`]. Every step produces nodes in
//! axis order so predicate positions count nearest-first on reverse axes;
//! the step result is then sorted back into document order.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result, Span};
use crate::xml::model::{Document, NodeId, NodeKind};
use crate::xpath::ast::{Axis, BinaryOp, Expr, LocationPath, NodeTest, Step};
use crate::xpath::value::{Value, XNode};

/// Context node with its position inside the current node-set
#[derive(Clone, Copy, Debug)]
pub(crate) struct Frame {
    pub node: XNode,
    pub position: usize,
    pub size: usize,
}

impl Frame {
    pub const fn single(node: XNode) -> Self {
        Self {
            node,
            position: 1,
            size: 1,
        }
    }
}

pub(crate) struct Evaluator<'a> {
    pub(crate) doc: &'a Document,
    source: &'a str,
    namespaces: &'a IndexMap<String, String>,
    variables: &'a HashMap<String, Value>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        doc: &'a Document,
        source: &'a str,
        namespaces: &'a IndexMap<String, String>,
        variables: &'a HashMap<String, Value>,
    ) -> Self {
        Self {
            doc,
            source,
            namespaces,
            variables,
        }
    }

    pub fn eval(&self, expr: &Expr, frame: Frame) -> Result<Value> {
        match expr {
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, frame),
            Expr::Negate(inner) => {
                let value = self.eval(inner, frame)?;
                Ok(Value::Number(-value.to_number(self.doc)))
            }
            Expr::Union(left, right) => {
                let mut nodes = self.eval_node_set(left, frame)?;
                nodes.extend(self.eval_node_set(right, frame)?);
                nodes.sort();
                nodes.dedup();
                Ok(Value::NodeSet(nodes))
            }
            Expr::Path(path) => self.eval_path(path, frame).map(Value::NodeSet),
            Expr::Filter {
                primary,
                predicates,
            } => {
                let nodes = self.eval_node_set(primary, frame)?;
                self.apply_predicates(nodes, predicates).map(Value::NodeSet)
            }
            Expr::PathFrom { filter, steps } => {
                let nodes = self.eval_node_set(filter, frame)?;
                self.apply_steps(nodes, steps).map(Value::NodeSet)
            }
            Expr::Literal(text) => Ok(Value::String(text.clone())),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Variable(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| self.error(&format!("Undefined variable '{name}'"))),
            Expr::Function { name, args } => self.call(name, args, frame),
        }
    }

    pub fn eval_node_set(&self, expr: &Expr, frame: Frame) -> Result<Vec<XNode>> {
        match self.eval(expr, frame)? {
            Value::NodeSet(nodes) => Ok(nodes),
            other => Err(self.error(&format!(
                "expected a node-set, got a {}",
                other.type_name()
            ))),
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr, frame: Frame) -> Result<Value> {
        match op {
            BinaryOp::Or => {
                if self.eval(left, frame)?.to_boolean() {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(self.eval(right, frame)?.to_boolean()))
            }
            BinaryOp::And => {
                if !self.eval(left, frame)?.to_boolean() {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(self.eval(right, frame)?.to_boolean()))
            }
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => {
                let lhs = self.eval(left, frame)?;
                let rhs = self.eval(right, frame)?;
                Ok(Value::Boolean(self.compare(op, &lhs, &rhs)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let a = self.eval(left, frame)?.to_number(self.doc);
                let b = self.eval(right, frame)?.to_number(self.doc);
                Ok(Value::Number(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                }))
            }
        }
    }

    /// Comparison with existential node-set semantics
    fn compare(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
        let doc = self.doc;
        match (lhs, rhs) {
            (Value::NodeSet(left), Value::NodeSet(right)) => left.iter().any(|a| {
                let a = Value::String(a.string_value(doc));
                right
                    .iter()
                    .any(|b| self.compare_atoms(op, &a, &Value::String(b.string_value(doc))))
            }),
            (Value::NodeSet(_), Value::Boolean(_)) => {
                self.compare_atoms(op, &Value::Boolean(lhs.to_boolean()), rhs)
            }
            (Value::Boolean(_), Value::NodeSet(_)) => {
                self.compare_atoms(op, lhs, &Value::Boolean(rhs.to_boolean()))
            }
            (Value::NodeSet(nodes), other) => nodes
                .iter()
                .any(|n| self.compare_atoms(op, &Value::String(n.string_value(doc)), other)),
            (other, Value::NodeSet(nodes)) => nodes
                .iter()
                .any(|n| self.compare_atoms(op, other, &Value::String(n.string_value(doc)))),
            _ => self.compare_atoms(op, lhs, rhs),
        }
    }

    fn compare_atoms(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
        let doc = self.doc;
        if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
            let equal = match (lhs, rhs) {
                (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
                    lhs.to_boolean() == rhs.to_boolean()
                }
                (Value::Number(_), _) | (_, Value::Number(_)) => {
                    lhs.to_number(doc) == rhs.to_number(doc)
                }
                _ => lhs.to_string_value(doc) == rhs.to_string_value(doc),
            };
            return (op == BinaryOp::Eq) == equal;
        }
        let a = lhs.to_number(doc);
        let b = rhs.to_number(doc);
        match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Lte => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        }
    }

    fn eval_path(&self, path: &LocationPath, frame: Frame) -> Result<Vec<XNode>> {
        let start = if path.absolute {
            XNode::Node(self.doc.document_node())
        } else {
            frame.node
        };
        self.apply_steps(vec![start], &path.steps)
    }

    fn apply_steps(&self, mut nodes: Vec<XNode>, steps: &[Step]) -> Result<Vec<XNode>> {
        for step in steps {
            // unknown prefixes fail even when nothing would match
            match &step.test {
                NodeTest::Name {
                    prefix: Some(prefix),
                    ..
                }
                | NodeTest::NamespaceWildcard(prefix) => {
                    self.resolve(Some(prefix))?;
                }
                _ => {}
            }
            let mut next = Vec::new();
            for node in &nodes {
                let mut matched = Vec::new();
                for candidate in self.axis(*node, step.axis)? {
                    if self.matches(candidate, step.axis, &step.test)? {
                        matched.push(candidate);
                    }
                }
                next.extend(self.apply_predicates(matched, &step.predicates)?);
            }
            next.sort();
            next.dedup();
            nodes = next;
        }
        Ok(nodes)
    }

    /// Filter `nodes` (already in the order positions count in) by each
    /// predicate in turn
    fn apply_predicates(&self, mut nodes: Vec<XNode>, predicates: &[Expr]) -> Result<Vec<XNode>> {
        for predicate in predicates {
            let size = nodes.len();
            let mut kept = Vec::with_capacity(size);
            for (i, node) in nodes.into_iter().enumerate() {
                let frame = Frame {
                    node,
                    position: i + 1,
                    size,
                };
                let keep = match self.eval(predicate, frame)? {
                    Value::Number(n) => count_to_number(frame.position) == n,
                    other => other.to_boolean(),
                };
                if keep {
                    kept.push(node);
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    fn axis(&self, node: XNode, axis: Axis) -> Result<Vec<XNode>> {
        let doc = self.doc;
        let wrap = |ids: &[NodeId]| ids.iter().copied().map(XNode::Node).collect::<Vec<_>>();
        Ok(match (axis, node) {
            (Axis::Namespace, _) => return Err(self.error("the namespace axis is not supported")),
            (Axis::SelfAxis, _) => vec![node],
            (Axis::Attribute, XNode::Node(id)) => doc
                .element(id)
                .map(|e| (0..e.attributes.len()).map(|i| XNode::Attribute(id, i)).collect())
                .unwrap_or_default(),
            (Axis::Child, XNode::Node(id)) => wrap(doc.children(id)),
            (Axis::Descendant, XNode::Node(id)) => wrap(&doc.descendants(id)),
            (Axis::DescendantOrSelf, XNode::Node(id)) => {
                let mut out = vec![node];
                out.extend(wrap(&doc.descendants(id)));
                out
            }
            (Axis::DescendantOrSelf, XNode::Attribute(..)) => vec![node],
            (
                Axis::Attribute
                | Axis::Child
                | Axis::Descendant
                | Axis::FollowingSibling
                | Axis::PrecedingSibling,
                XNode::Attribute(..),
            ) => Vec::new(),
            (Axis::Parent, _) => node.parent(doc).map(XNode::Node).into_iter().collect(),
            (Axis::Ancestor, _) => self.ancestors(node),
            (Axis::AncestorOrSelf, _) => {
                let mut out = vec![node];
                out.extend(self.ancestors(node));
                out
            }
            (Axis::FollowingSibling, XNode::Node(id)) => {
                let (siblings, index) = self.siblings(id);
                wrap(siblings.get(index + 1..).unwrap_or_default())
            }
            (Axis::PrecedingSibling, XNode::Node(id)) => {
                let (siblings, index) = self.siblings(id);
                let mut out = wrap(siblings.get(..index).unwrap_or_default());
                out.reverse();
                out
            }
            (Axis::Following, _) => self.following(node),
            (Axis::Preceding, _) => self.preceding(node),
        })
    }

    fn ancestors(&self, node: XNode) -> Vec<XNode> {
        let mut out = Vec::new();
        let mut current = node.parent(self.doc);
        while let Some(id) = current {
            out.push(XNode::Node(id));
            current = self.doc.parent(id);
        }
        out
    }

    /// Siblings of `id` including itself, and its index among them
    fn siblings(&self, id: NodeId) -> (&'a [NodeId], usize) {
        match self.doc.parent(id) {
            Some(parent) => {
                let siblings = self.doc.children(parent);
                let index = siblings.iter().position(|s| *s == id).unwrap_or(0);
                (siblings, index)
            }
            None => (&[], 0),
        }
    }

    fn following(&self, node: XNode) -> Vec<XNode> {
        let mut out = Vec::new();
        let mut current = match node {
            XNode::Node(id) => id,
            XNode::Attribute(id, _) => {
                out.extend(self.doc.descendants(id).into_iter().map(XNode::Node));
                id
            }
        };
        while let Some(parent) = self.doc.parent(current) {
            let (siblings, index) = self.siblings(current);
            for sibling in siblings.get(index + 1..).unwrap_or_default() {
                out.push(XNode::Node(*sibling));
                out.extend(self.doc.descendants(*sibling).into_iter().map(XNode::Node));
            }
            current = parent;
        }
        out
    }

    /// Preceding nodes in reverse document order, ancestors excluded
    fn preceding(&self, node: XNode) -> Vec<XNode> {
        let mut out = Vec::new();
        let (XNode::Node(mut current) | XNode::Attribute(mut current, _)) = node;
        while let Some(parent) = self.doc.parent(current) {
            let (siblings, index) = self.siblings(current);
            for sibling in siblings.get(..index).unwrap_or_default().iter().rev() {
                out.extend(
                    self.doc
                        .descendants(*sibling)
                        .into_iter()
                        .rev()
                        .map(XNode::Node),
                );
                out.push(XNode::Node(*sibling));
            }
            current = parent;
        }
        out
    }

    fn matches(&self, node: XNode, axis: Axis, test: &NodeTest) -> Result<bool> {
        let doc = self.doc;
        if let XNode::Attribute(..) = node {
            let principal = axis == Axis::Attribute;
            return Ok(match test {
                NodeTest::Node => true,
                NodeTest::Wildcard => principal,
                NodeTest::Name { prefix, local } => {
                    principal
                        && node.local_name(doc) == *local
                        && node.namespace_uri(doc) == self.resolve(prefix.as_deref())?
                }
                NodeTest::NamespaceWildcard(prefix) => {
                    principal && node.namespace_uri(doc) == self.resolve(Some(prefix))?
                }
                _ => false,
            });
        }

        let XNode::Node(id) = node else {
            return Ok(false);
        };
        Ok(match (&doc.node(id).kind, test) {
            (_, NodeTest::Node) => true,
            (NodeKind::Text(_) | NodeKind::CData(_), NodeTest::Text) => true,
            (NodeKind::Comment(_), NodeTest::Comment) => true,
            (NodeKind::ProcessingInstruction { target, .. }, NodeTest::ProcessingInstruction(t)) => {
                t.as_ref().is_none_or(|t| t == target)
            }
            (NodeKind::Element(_), NodeTest::Wildcard) => axis != Axis::Attribute,
            (NodeKind::Element(element), NodeTest::Name { prefix, local }) => {
                axis != Axis::Attribute
                    && element.name.local == *local
                    && element.namespace.as_deref() == self.resolve(prefix.as_deref())?
            }
            (NodeKind::Element(element), NodeTest::NamespaceWildcard(prefix)) => {
                axis != Axis::Attribute
                    && element.namespace.as_deref() == self.resolve(Some(prefix))?
            }
            _ => false,
        })
    }

    /// Namespace URI a name-test prefix stands for; no prefix means no
    /// namespace
    fn resolve(&self, prefix: Option<&str>) -> Result<Option<&'a str>> {
        match prefix {
            None => Ok(None),
            Some("xml") => Ok(Some(crate::xml::model::XML_NAMESPACE)),
            Some(prefix) => self
                .namespaces
                .get(prefix)
                .map(|uri| Some(uri.as_str()))
                .ok_or_else(|| self.error(&format!("Undefined namespace prefix '{prefix}'"))),
        }
    }

    pub(crate) fn error(&self, detail: &str) -> Error {
        Error::with_message(
            ErrorKind::InvalidXPath {
                expression: self.source.to_string(),
            },
            Span::empty(),
            format!("Invalid expression '{}': {detail}", self.source),
        )
    }
}

/// Lossless for any realistic node count
pub(crate) fn count_to_number(n: usize) -> f64 {
    u32::try_from(n).map_or(f64::INFINITY, f64::from)
}
