//! RelaxNG validation (XML syntax)
//!
//! The grammar is simplified while compiling: references are inlined and
//! every `element` pattern gets a slot in an arena, which is where recursion
//! goes through. Documents are checked with pattern derivatives: each start
//! tag, attribute, text run and end tag derives the current pattern, and the
//! document is valid when the final pattern is nullable.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, instrument};

use crate::error::{Error, ErrorKind, Result, Span};
use crate::schema::datatype::{Builtin, Facet, SimpleType};
use crate::schema::{descend, element_path, parse_grammar, Validate};
use crate::schema::{ValidationError, ValidationOutcome};
use crate::xml::model::{Document, NodeId, NodeKind};

pub const RELAXNG_NAMESPACE: &str = "http://relaxng.org/ns/structure/1.0";
const XSD_DATATYPES: &str = "http://www.w3.org/2001/XMLSchema-datatypes";

type Pat = Rc<Pattern>;

#[derive(Clone, Debug)]
enum NameClass {
    Name(Option<String>, String),
    AnyName(Option<Box<NameClass>>),
    NsName(Option<String>, Option<Box<NameClass>>),
    Choice(Box<NameClass>, Box<NameClass>),
}

impl NameClass {
    fn contains(&self, namespace: Option<&str>, local: &str) -> bool {
        match self {
            Self::Name(ns, name) => ns.as_deref() == namespace && name == local,
            Self::AnyName(except) => !except.as_ref().is_some_and(|e| e.contains(namespace, local)),
            Self::NsName(ns, except) => {
                ns.as_deref() == namespace
                    && !except.as_ref().is_some_and(|e| e.contains(namespace, local))
            }
            Self::Choice(a, b) => a.contains(namespace, local) || b.contains(namespace, local),
        }
    }
}

#[derive(Clone, Debug)]
struct Datatype {
    simple: SimpleType,
}

#[derive(Debug)]
enum Pattern {
    Empty,
    NotAllowed,
    Text,
    Choice(Pat, Pat),
    Interleave(Pat, Pat),
    Group(Pat, Pat),
    OneOrMore(Pat),
    List(Pat),
    Data(Datatype, Option<Pat>),
    Value(Datatype, String),
    Attribute(NameClass, Pat),
    /// Name class and arena slot of the content pattern
    Element(NameClass, usize),
    /// Pattern for the rest of the current element, then what follows it
    After(Pat, Pat),
}

fn is_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

/// Derivative constructors with the usual simplifications
mod build {
    use super::{Pat, Pattern};
    use std::rc::Rc;

    pub fn empty() -> Pat {
        Rc::new(Pattern::Empty)
    }

    pub fn not_allowed() -> Pat {
        Rc::new(Pattern::NotAllowed)
    }

    pub fn choice(a: Pat, b: Pat) -> Pat {
        match (&*a, &*b) {
            (Pattern::NotAllowed, _) => b,
            (_, Pattern::NotAllowed) => a,
            (Pattern::Empty, Pattern::Empty) => a,
            _ if Rc::ptr_eq(&a, &b) => a,
            _ => Rc::new(Pattern::Choice(a, b)),
        }
    }

    pub fn group(a: Pat, b: Pat) -> Pat {
        match (&*a, &*b) {
            (Pattern::NotAllowed, _) | (_, Pattern::NotAllowed) => not_allowed(),
            (Pattern::Empty, _) => b,
            (_, Pattern::Empty) => a,
            _ => Rc::new(Pattern::Group(a, b)),
        }
    }

    pub fn interleave(a: Pat, b: Pat) -> Pat {
        match (&*a, &*b) {
            (Pattern::NotAllowed, _) | (_, Pattern::NotAllowed) => not_allowed(),
            (Pattern::Empty, _) => b,
            (_, Pattern::Empty) => a,
            _ => Rc::new(Pattern::Interleave(a, b)),
        }
    }

    pub fn after(a: Pat, b: Pat) -> Pat {
        match (&*a, &*b) {
            (Pattern::NotAllowed, _) | (_, Pattern::NotAllowed) => not_allowed(),
            _ => Rc::new(Pattern::After(a, b)),
        }
    }

    pub fn one_or_more(p: Pat) -> Pat {
        match &*p {
            Pattern::NotAllowed => p,
            _ => Rc::new(Pattern::OneOrMore(p)),
        }
    }

    pub fn optional(p: Pat) -> Pat {
        choice(p, empty())
    }
}

use build::{after, choice, empty, group, interleave, not_allowed, one_or_more, optional};

fn is_not_allowed(p: &Pat) -> bool {
    matches!(**p, Pattern::NotAllowed)
}

/// A compiled RelaxNG grammar
#[derive(Debug)]
pub struct RelaxNgSchema {
    start: Pat,
    elements: Vec<Pat>,
}

impl RelaxNgSchema {
    /// Compile a grammar written in the XML syntax
    #[instrument(level = "debug", skip_all)]
    pub fn parse(text: &str) -> Result<Self> {
        let doc = parse_grammar(text)?;
        let schema = Compiler::new(&doc)?.compile()?;
        debug!(elements = schema.elements.len(), "compiled relax ng grammar");
        Ok(schema)
    }
}

impl Validate<Document> for RelaxNgSchema {
    fn check(&self, doc: &Document) -> Result<ValidationOutcome> {
        let mut run = Derivation {
            elements: &self.elements,
            doc,
            errors: Vec::new(),
        };
        if let Some(root) = doc.root_element() {
            if let Some(rest) = run.element(Rc::clone(&self.start), root) {
                if !run.nullable(&rest) {
                    run.report(root, format!("Element {} failed to validate content", run.label(root)));
                }
            }
        } else {
            run.errors
                .push(ValidationError::new("/", "The document has no document element"));
        }
        Ok(ValidationOutcome::from_errors(run.errors))
    }
}

struct Derivation<'a> {
    elements: &'a [Pat],
    doc: &'a Document,
    errors: Vec<ValidationError>,
}

impl Derivation<'_> {
    fn report(&mut self, node: NodeId, message: String) {
        let line = self.doc.node(node).line;
        self.errors
            .push(ValidationError::new(element_path(self.doc, node), message).at_line(line));
    }

    fn label(&self, node: NodeId) -> String {
        self.doc
            .element(node)
            .map(|element| element.name.to_string())
            .unwrap_or_default()
    }

    fn nullable(&self, p: &Pat) -> bool {
        match &**p {
            Pattern::Empty | Pattern::Text => true,
            Pattern::Group(a, b) | Pattern::Interleave(a, b) => self.nullable(a) && self.nullable(b),
            Pattern::Choice(a, b) => self.nullable(a) || self.nullable(b),
            Pattern::OneOrMore(p) => self.nullable(p),
            _ => false,
        }
    }

    fn text(&self, p: &Pat, s: &str) -> Pat {
        match &**p {
            Pattern::Choice(a, b) => choice(self.text(a, s), self.text(b, s)),
            Pattern::Interleave(a, b) => choice(
                interleave(self.text(a, s), Rc::clone(b)),
                interleave(Rc::clone(a), self.text(b, s)),
            ),
            Pattern::Group(a, b) => {
                let first = group(self.text(a, s), Rc::clone(b));
                if self.nullable(a) {
                    choice(first, self.text(b, s))
                } else {
                    first
                }
            }
            Pattern::After(a, b) => after(self.text(a, s), Rc::clone(b)),
            Pattern::OneOrMore(inner) => group(
                self.text(inner, s),
                optional(Rc::clone(p)),
            ),
            Pattern::Text => Rc::clone(p),
            Pattern::Value(datatype, value) => {
                let matches = datatype
                    .simple
                    .validate(s)
                    .is_ok_and(|normalized| datatype.simple.equal(&normalized, value));
                if matches {
                    empty()
                } else {
                    not_allowed()
                }
            }
            Pattern::Data(datatype, except) => {
                let excluded = except
                    .as_ref()
                    .is_some_and(|except| self.nullable(&self.text(except, s)));
                if datatype.simple.validate(s).is_ok() && !excluded {
                    empty()
                } else {
                    not_allowed()
                }
            }
            Pattern::List(inner) => {
                let mut current = Rc::clone(inner);
                for word in s.split_whitespace() {
                    current = self.text(&current, word);
                }
                if self.nullable(&current) {
                    empty()
                } else {
                    not_allowed()
                }
            }
            _ => not_allowed(),
        }
    }

    fn apply_after(&self, p: &Pat, f: &dyn Fn(Pat) -> Pat) -> Pat {
        match &**p {
            Pattern::After(a, b) => after(Rc::clone(a), f(Rc::clone(b))),
            Pattern::Choice(a, b) => choice(self.apply_after(a, f), self.apply_after(b, f)),
            _ => not_allowed(),
        }
    }

    fn start_tag_open(&self, p: &Pat, namespace: Option<&str>, local: &str) -> Pat {
        match &**p {
            Pattern::Choice(a, b) => choice(
                self.start_tag_open(a, namespace, local),
                self.start_tag_open(b, namespace, local),
            ),
            Pattern::Element(name_class, slot) => match self.elements.get(*slot) {
                Some(content) if name_class.contains(namespace, local) => {
                    after(Rc::clone(content), empty())
                }
                _ => not_allowed(),
            },
            Pattern::Interleave(a, b) => choice(
                self.apply_after(&self.start_tag_open(a, namespace, local), &|x| {
                    interleave(x, Rc::clone(b))
                }),
                self.apply_after(&self.start_tag_open(b, namespace, local), &|x| {
                    interleave(Rc::clone(a), x)
                }),
            ),
            Pattern::OneOrMore(inner) => {
                let rest = optional(Rc::clone(p));
                self.apply_after(&self.start_tag_open(inner, namespace, local), &|x| {
                    group(x, Rc::clone(&rest))
                })
            }
            Pattern::Group(a, b) => {
                let first = self.apply_after(&self.start_tag_open(a, namespace, local), &|x| {
                    group(x, Rc::clone(b))
                });
                if self.nullable(a) {
                    choice(first, self.start_tag_open(b, namespace, local))
                } else {
                    first
                }
            }
            Pattern::After(a, b) => {
                self.apply_after(&self.start_tag_open(a, namespace, local), &|x| {
                    after(x, Rc::clone(b))
                })
            }
            _ => not_allowed(),
        }
    }

    fn attribute(&self, p: &Pat, namespace: Option<&str>, local: &str, value: &str) -> Pat {
        match &**p {
            Pattern::After(a, b) => after(self.attribute(a, namespace, local, value), Rc::clone(b)),
            Pattern::Choice(a, b) => choice(
                self.attribute(a, namespace, local, value),
                self.attribute(b, namespace, local, value),
            ),
            Pattern::Group(a, b) => choice(
                group(self.attribute(a, namespace, local, value), Rc::clone(b)),
                group(Rc::clone(a), self.attribute(b, namespace, local, value)),
            ),
            Pattern::Interleave(a, b) => choice(
                interleave(self.attribute(a, namespace, local, value), Rc::clone(b)),
                interleave(Rc::clone(a), self.attribute(b, namespace, local, value)),
            ),
            Pattern::OneOrMore(inner) => group(
                self.attribute(inner, namespace, local, value),
                optional(Rc::clone(p)),
            ),
            Pattern::Attribute(name_class, content) => {
                let matches = name_class.contains(namespace, local)
                    && ((self.nullable(content) && is_whitespace(value))
                        || self.nullable(&self.text(content, value)));
                if matches {
                    empty()
                } else {
                    not_allowed()
                }
            }
            _ => not_allowed(),
        }
    }

    fn start_tag_close(&self, p: &Pat) -> Pat {
        match &**p {
            Pattern::After(a, b) => after(self.start_tag_close(a), Rc::clone(b)),
            Pattern::Choice(a, b) => choice(self.start_tag_close(a), self.start_tag_close(b)),
            Pattern::Group(a, b) => group(self.start_tag_close(a), self.start_tag_close(b)),
            Pattern::Interleave(a, b) => {
                interleave(self.start_tag_close(a), self.start_tag_close(b))
            }
            Pattern::OneOrMore(inner) => one_or_more(self.start_tag_close(inner)),
            Pattern::Attribute(..) => not_allowed(),
            _ => Rc::clone(p),
        }
    }

    fn end_tag(&self, p: &Pat) -> Pat {
        match &**p {
            Pattern::Choice(a, b) => choice(self.end_tag(a), self.end_tag(b)),
            Pattern::After(a, b) if self.nullable(a) => Rc::clone(b),
            _ => not_allowed(),
        }
    }

    /// Derive by a whole element; `None` once an error was reported
    fn element(&mut self, p: Pat, node: NodeId) -> Option<Pat> {
        descend(|| self.derive_element(p, node))
    }

    fn derive_element(&mut self, p: Pat, node: NodeId) -> Option<Pat> {
        let doc = self.doc;
        let element = doc.element(node)?;
        let label = element.name.to_string();
        let namespace = element.namespace.as_deref();

        let mut p = self.start_tag_open(&p, namespace, &element.name.local);
        if is_not_allowed(&p) {
            self.report(node, format!("Did not expect element {label} there"));
            return None;
        }
        for attribute in &element.attributes {
            p = self.attribute(
                &p,
                attribute.namespace.as_deref(),
                &attribute.name.local,
                &attribute.value,
            );
            if is_not_allowed(&p) {
                self.report(
                    node,
                    format!("Invalid attribute {} for element {label}", attribute.name),
                );
                return None;
            }
        }
        p = self.start_tag_close(&p);
        if is_not_allowed(&p) {
            self.report(node, format!("Element {label} failed to validate attributes"));
            return None;
        }

        p = self.children(p, node, &label)?;
        let rest = self.end_tag(&p);
        if is_not_allowed(&rest) {
            self.report(node, format!("Element {label} failed to validate content"));
            return None;
        }
        Some(rest)
    }

    fn children(&mut self, mut p: Pat, node: NodeId, label: &str) -> Option<Pat> {
        let doc = self.doc;
        let items = content_items(doc, node);

        if !items.iter().any(|item| matches!(item, Item::Element(_))) {
            let text: String = items
                .iter()
                .filter_map(|item| match item {
                    Item::Text(text) => Some(text.as_str()),
                    Item::Element(_) => None,
                })
                .collect();
            let derived = self.text(&p, &text);
            let p = if is_whitespace(&text) {
                choice(p, derived)
            } else {
                derived
            };
            if is_not_allowed(&p) {
                self.report(node, format!("Element {label} failed to validate content"));
                return None;
            }
            return Some(p);
        }

        for item in items {
            match item {
                Item::Text(text) if is_whitespace(&text) => {}
                Item::Text(text) => {
                    p = self.text(&p, &text);
                    if is_not_allowed(&p) {
                        self.report(node, format!("Element {label} failed to validate content"));
                        return None;
                    }
                }
                Item::Element(child) => p = self.element(p, child)?,
            }
        }
        Some(p)
    }
}

enum Item {
    Text(String),
    Element(NodeId),
}

/// Child elements and coalesced text runs; comments and PIs dropped
fn content_items(doc: &Document, node: NodeId) -> Vec<Item> {
    let mut items: Vec<Item> = Vec::new();
    for child in doc.children(node) {
        match &doc.node(*child).kind {
            NodeKind::Text(text) | NodeKind::CData(text) => match items.last_mut() {
                Some(Item::Text(existing)) => existing.push_str(text),
                _ => items.push(Item::Text(text.clone())),
            },
            NodeKind::Element(_) => items.push(Item::Element(*child)),
            _ => {}
        }
    }
    items
}

fn invalid(line: u32, message: impl Into<String>) -> Error {
    Error::with_message(ErrorKind::InvalidSchema, Span::line(line), message)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combine {
    Choice,
    Interleave,
}

struct Compiler<'s> {
    doc: &'s Document,
    root: NodeId,
    start: Vec<NodeId>,
    start_combine: Option<Combine>,
    defines: HashMap<&'s str, Vec<NodeId>>,
    combines: HashMap<&'s str, Combine>,
    /// References being inlined since the nearest enclosing element
    expanding: Vec<&'s str>,
    slots: HashMap<NodeId, usize>,
    elements: Vec<Pat>,
}

impl<'s> Compiler<'s> {
    fn new(doc: &'s Document) -> Result<Self> {
        let root = doc
            .root_element()
            .ok_or_else(|| invalid(1, "The grammar document is empty"))?;
        let in_namespace = doc
            .element(root)
            .is_some_and(|element| element.namespace.as_deref() == Some(RELAXNG_NAMESPACE));
        if !in_namespace {
            return Err(invalid(
                doc.node(root).line,
                "The document is not a RelaxNG grammar",
            ));
        }
        Ok(Self {
            doc,
            root,
            start: Vec::new(),
            start_combine: None,
            defines: HashMap::new(),
            combines: HashMap::new(),
            expanding: Vec::new(),
            slots: HashMap::new(),
            elements: Vec::new(),
        })
    }

    fn compile(mut self) -> Result<RelaxNgSchema> {
        let start = if self.local(self.root) == "grammar" {
            self.collect(self.root)?;
            let nodes = std::mem::take(&mut self.start);
            if nodes.is_empty() {
                return Err(invalid(self.line(self.root), "The grammar has no start"));
            }
            let combine = self.start_combine.unwrap_or(Combine::Choice);
            self.combined(&nodes, combine)?
        } else {
            self.pattern(self.root)?
        };
        Ok(RelaxNgSchema {
            start,
            elements: self.elements,
        })
    }

    fn local(&self, node: NodeId) -> &'s str {
        self.doc
            .element(node)
            .map_or("", |element| element.name.local.as_str())
    }

    fn line(&self, node: NodeId) -> u32 {
        self.doc.node(node).line
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&'s str> {
        self.doc
            .element(node)
            .and_then(|element| element.attribute(name))
            .map(str::trim)
    }

    /// Attribute value from the nearest ancestor-or-self carrying it
    fn inherited(&self, node: NodeId, name: &str) -> Option<&'s str> {
        std::iter::once(node)
            .chain(self.doc.ancestors(node))
            .find_map(|id| self.doc.element(id).and_then(|element| element.attribute(name)))
    }

    /// RelaxNG-namespace element children
    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.doc
            .child_elements(node)
            .filter(|child| {
                self.doc
                    .element(*child)
                    .is_some_and(|element| element.namespace.as_deref() == Some(RELAXNG_NAMESPACE))
            })
            .collect()
    }

    fn collect(&mut self, grammar: NodeId) -> Result<()> {
        for child in self.children(grammar) {
            let combine = match self.attr(child, "combine") {
                None => None,
                Some("choice") => Some(Combine::Choice),
                Some("interleave") => Some(Combine::Interleave),
                Some(other) => {
                    return Err(invalid(
                        self.line(child),
                        format!("Invalid combine value '{other}'"),
                    ))
                }
            };
            match self.local(child) {
                "start" => {
                    self.start.push(child);
                    if combine.is_some() {
                        self.start_combine = combine;
                    }
                }
                "define" => {
                    let name = self.attr(child, "name").ok_or_else(|| {
                        invalid(self.line(child), "define has no name attribute")
                    })?;
                    self.defines.entry(name).or_default().push(child);
                    if let Some(combine) = combine {
                        self.combines.insert(name, combine);
                    }
                }
                "div" => self.collect(child)?,
                other => {
                    return Err(invalid(
                        self.line(child),
                        format!("Unsupported grammar construct '{other}'"),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Bodies of several `start` or `define` elements combined
    fn combined(&mut self, nodes: &[NodeId], combine: Combine) -> Result<Pat> {
        let mut out: Option<Pat> = None;
        for node in nodes {
            let body = self.group_of(*node)?;
            out = Some(match (out, combine) {
                (None, _) => body,
                (Some(prev), Combine::Choice) => choice(prev, body),
                (Some(prev), Combine::Interleave) => interleave(prev, body),
            });
        }
        out.ok_or_else(|| invalid(1, "Empty definition"))
    }

    /// Children of `node` as one group
    fn group_of(&mut self, node: NodeId) -> Result<Pat> {
        self.sequence(&self.children(node))
    }

    fn sequence(&mut self, nodes: &[NodeId]) -> Result<Pat> {
        let mut out: Option<Pat> = None;
        for node in nodes {
            let p = self.pattern(*node)?;
            out = Some(match out {
                None => p,
                Some(prev) => group(prev, p),
            });
        }
        out.ok_or_else(|| invalid(nodes.first().map_or(1, |n| self.line(*n)), "Empty pattern"))
    }

    fn pattern(&mut self, node: NodeId) -> Result<Pat> {
        let line = self.line(node);
        let local = self.local(node);
        Ok(match local {
            "empty" => empty(),
            "notAllowed" => not_allowed(),
            "text" => Rc::new(Pattern::Text),
            "group" => self.group_of(node)?,
            "choice" | "interleave" => {
                let mut out: Option<Pat> = None;
                for child in self.children(node) {
                    let p = self.pattern(child)?;
                    out = Some(match out {
                        None => p,
                        Some(prev) if local == "choice" => choice(prev, p),
                        Some(prev) => interleave(prev, p),
                    });
                }
                out.ok_or_else(|| invalid(line, format!("Empty {local}")))?
            }
            "optional" => optional(self.group_of(node)?),
            "zeroOrMore" => optional(one_or_more(self.group_of(node)?)),
            "oneOrMore" => one_or_more(self.group_of(node)?),
            "mixed" => interleave(self.group_of(node)?, Rc::new(Pattern::Text)),
            "list" => Rc::new(Pattern::List(self.group_of(node)?)),
            "element" => self.element(node)?,
            "attribute" => self.attribute(node)?,
            "data" => self.data(node)?,
            "value" => {
                let datatype = self.datatype(node, self.attr(node, "type").unwrap_or("token"), &[])?;
                Rc::new(Pattern::Value(datatype, self.doc.string_value(node)))
            }
            "ref" => self.reference(node)?,
            other => {
                return Err(invalid(
                    line,
                    format!("Unsupported grammar construct '{other}'"),
                ))
            }
        })
    }

    fn reference(&mut self, node: NodeId) -> Result<Pat> {
        let line = self.line(node);
        let name = self
            .attr(node, "name")
            .ok_or_else(|| invalid(line, "ref has no name attribute"))?;
        let Some(nodes) = self.defines.get(name).cloned() else {
            return Err(invalid(
                line,
                format!("Reference {name} has no matching definition"),
            ));
        };
        if self.expanding.contains(&name) {
            return Err(invalid(
                line,
                format!("Detected a cycle in {name} references"),
            ));
        }
        self.expanding.push(name);
        let combine = self.combines.get(name).copied().unwrap_or(Combine::Choice);
        let body = self.combined(&nodes, combine);
        self.expanding.pop();
        body
    }

    fn element(&mut self, node: NodeId) -> Result<Pat> {
        let mut children = self.children(node);
        let name_class = match self.attr(node, "name") {
            Some(name) => self.qname(node, name, true)?,
            None => {
                if children.is_empty() {
                    return Err(invalid(self.line(node), "element has no name class"));
                }
                let first = children.remove(0);
                self.name_class(first)?
            }
        };

        if let Some(slot) = self.slots.get(&node) {
            return Ok(Rc::new(Pattern::Element(name_class, *slot)));
        }
        let slot = self.elements.len();
        self.elements.push(not_allowed());
        self.slots.insert(node, slot);

        let outer = std::mem::take(&mut self.expanding);
        let content = self.sequence(&children);
        self.expanding = outer;
        if let Some(entry) = self.elements.get_mut(slot) {
            *entry = content?;
        }
        Ok(Rc::new(Pattern::Element(name_class, slot)))
    }

    fn attribute(&mut self, node: NodeId) -> Result<Pat> {
        let mut children = self.children(node);
        let name_class = match self.attr(node, "name") {
            Some(name) => self.qname(node, name, false)?,
            None => {
                if children.is_empty() {
                    return Err(invalid(self.line(node), "attribute has no name class"));
                }
                let first = children.remove(0);
                self.name_class(first)?
            }
        };
        let content = if children.is_empty() {
            Rc::new(Pattern::Text)
        } else {
            self.sequence(&children)?
        };
        Ok(Rc::new(Pattern::Attribute(name_class, content)))
    }

    /// Resolve a `name` attribute; unprefixed attribute names only take a
    /// namespace from an explicit `ns` on the attribute itself
    fn qname(&self, node: NodeId, raw: &str, is_element: bool) -> Result<NameClass> {
        if let Some((prefix, local)) = raw.split_once(':') {
            let ns = self.doc.lookup_namespace_uri(node, prefix).ok_or_else(|| {
                invalid(self.line(node), format!("Undefined namespace prefix '{prefix}'"))
            })?;
            return Ok(NameClass::Name(Some(ns.to_string()), local.to_string()));
        }
        let ns = if is_element {
            self.inherited(node, "ns")
        } else {
            self.attr(node, "ns")
        };
        Ok(NameClass::Name(
            ns.filter(|ns| !ns.is_empty()).map(str::to_string),
            raw.to_string(),
        ))
    }

    fn name_class(&self, node: NodeId) -> Result<NameClass> {
        let except = |this: &Self| -> Result<Option<Box<NameClass>>> {
            match this
                .children(node)
                .into_iter()
                .find(|child| this.local(*child) == "except")
            {
                Some(except) => Ok(Some(Box::new(this.name_choice(except)?))),
                None => Ok(None),
            }
        };
        match self.local(node) {
            "name" => {
                let text = self.doc.string_value(node);
                self.qname(node, text.trim(), true)
            }
            "anyName" => Ok(NameClass::AnyName(except(self)?)),
            "nsName" => {
                let ns = self.inherited(node, "ns").filter(|ns| !ns.is_empty());
                Ok(NameClass::NsName(ns.map(str::to_string), except(self)?))
            }
            "choice" => self.name_choice(node),
            other => Err(invalid(
                self.line(node),
                format!("Unsupported name class '{other}'"),
            )),
        }
    }

    fn name_choice(&self, node: NodeId) -> Result<NameClass> {
        let mut out: Option<NameClass> = None;
        for child in self.children(node) {
            let class = self.name_class(child)?;
            out = Some(match out {
                None => class,
                Some(prev) => NameClass::Choice(Box::new(prev), Box::new(class)),
            });
        }
        out.ok_or_else(|| invalid(self.line(node), "Empty name class choice"))
    }

    fn data(&mut self, node: NodeId) -> Result<Pat> {
        let name = self
            .attr(node, "type")
            .ok_or_else(|| invalid(self.line(node), "data has no type attribute"))?;
        let mut params = Vec::new();
        let mut except = None;
        for child in self.children(node) {
            match self.local(child) {
                "param" => {
                    let facet = self.attr(child, "name").unwrap_or_default();
                    params.push((facet, self.doc.string_value(child)));
                }
                "except" => except = Some(self.group_of(child)?),
                other => {
                    return Err(invalid(
                        self.line(child),
                        format!("Unexpected '{other}' in data"),
                    ))
                }
            }
        }
        let datatype = self.datatype(node, name, &params)?;
        Ok(Rc::new(Pattern::Data(datatype, except)))
    }

    fn datatype(&self, node: NodeId, name: &str, params: &[(&str, String)]) -> Result<Datatype> {
        let library = self.inherited(node, "datatypeLibrary").unwrap_or_default();
        let builtin = match library {
            "" => match name {
                "string" => Some(Builtin::String),
                "token" => Some(Builtin::Token),
                _ => None,
            },
            XSD_DATATYPES => Builtin::from_name(name),
            _ => None,
        };
        let builtin = builtin.ok_or_else(|| {
            invalid(
                self.line(node),
                format!("Type {name} is not defined in datatype library '{library}'"),
            )
        })?;
        let facets = params
            .iter()
            .map(|(facet, value)| Facet::parse(facet, value))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|message| invalid(self.line(node), message))?;
        Ok(Datatype {
            simple: SimpleType::builtin(builtin).restrict(Facet::merge(facets)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parser::Parser;

    const ADDRESS_BOOK: &str = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"
    datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
  <start>
    <element name="addressBook">
      <zeroOrMore>
        <ref name="card"/>
      </zeroOrMore>
    </element>
  </start>
  <define name="card">
    <element name="card">
      <attribute name="id"><data type="positiveInteger"/></attribute>
      <optional><attribute name="kind"><choice><value>home</value><value>work</value></choice></attribute></optional>
      <interleave>
        <element name="name"><text/></element>
        <element name="email"><text/></element>
      </interleave>
    </element>
  </define>
</grammar>"#;

    fn check(schema: &str, instance: &str) -> Result<ValidationOutcome> {
        let doc = Parser::new(instance.as_bytes()).parse()?;
        RelaxNgSchema::parse(schema)?.check(&doc)
    }

    fn first_message(outcome: &ValidationOutcome) -> Option<&str> {
        outcome.first_error().map(|error| error.message.as_str())
    }

    #[test]
    fn test_valid_document() -> Result<()> {
        let outcome = check(
            ADDRESS_BOOK,
            r#"<addressBook>
  <card id="1" kind="work"><email>a@example.com</email><name>A</name></card>
  <card id="2"><name>B</name><email>b@example.com</email></card>
</addressBook>"#,
        )?;
        assert!(outcome.is_valid(), "{:?}", outcome.errors);
        assert!(check(ADDRESS_BOOK, "<addressBook/>")?.is_valid());
        Ok(())
    }

    #[test]
    fn test_unexpected_element() -> Result<()> {
        let outcome = check(
            ADDRESS_BOOK,
            "<addressBook>\n<card id=\"1\"><name>A</name><phone/></card>\n</addressBook>",
        )?;
        let error = outcome.first_error();
        assert_eq!(
            error.map(|e| e.message.as_str()),
            Some("Did not expect element phone there")
        );
        assert_eq!(error.and_then(|e| e.line), Some(2));
        Ok(())
    }

    #[test]
    fn test_missing_content() -> Result<()> {
        let outcome = check(
            ADDRESS_BOOK,
            r#"<addressBook><card id="1"><name>A</name></card></addressBook>"#,
        )?;
        assert_eq!(
            first_message(&outcome),
            Some("Element card failed to validate content")
        );
        Ok(())
    }

    #[test]
    fn test_attribute_errors() -> Result<()> {
        let outcome = check(
            ADDRESS_BOOK,
            r#"<addressBook><card id="x"><name>A</name><email>e</email></card></addressBook>"#,
        )?;
        assert_eq!(
            first_message(&outcome),
            Some("Invalid attribute id for element card")
        );
        let outcome = check(
            ADDRESS_BOOK,
            r#"<addressBook><card><name>A</name><email>e</email></card></addressBook>"#,
        )?;
        assert_eq!(
            first_message(&outcome),
            Some("Element card failed to validate attributes")
        );
        Ok(())
    }

    #[test]
    fn test_namespaced_grammar_without_grammar_element() -> Result<()> {
        let schema = r#"<element name="note" ns="urn:notes" xmlns="http://relaxng.org/ns/structure/1.0">
  <oneOrMore><element name="line"><text/></element></oneOrMore>
</element>"#;
        assert!(check(schema, r#"<note xmlns="urn:notes"><line>a</line><line>b</line></note>"#)?
            .is_valid());
        assert!(!check(schema, "<note><line>a</line></note>")?.is_valid());
        assert!(!check(schema, r#"<note xmlns="urn:notes"/>"#)?.is_valid());
        Ok(())
    }

    #[test]
    fn test_recursive_definitions() -> Result<()> {
        let schema = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="node"/></start>
  <define name="node">
    <element name="node"><zeroOrMore><ref name="node"/></zeroOrMore></element>
  </define>
</grammar>"#;
        assert!(check(schema, "<node><node><node/></node><node/></node>")?.is_valid());
        Ok(())
    }

    #[test]
    fn test_mixed_list_and_any_name() -> Result<()> {
        let schema = r#"<element name="p" xmlns="http://relaxng.org/ns/structure/1.0"
    datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
  <attribute name="sizes"><list><oneOrMore><data type="int"/></oneOrMore></list></attribute>
  <mixed>
    <zeroOrMore><element><anyName/><text/></element></zeroOrMore>
  </mixed>
</element>"#;
        assert!(check(schema, r#"<p sizes="1 2 3">Hi <b>there</b> <i>you</i></p>"#)?.is_valid());
        assert!(!check(schema, r#"<p sizes="1 x">Hi</p>"#)?.is_valid());
        Ok(())
    }

    #[test]
    fn test_combine_choice() -> Result<()> {
        let schema = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="root"/></start>
  <define name="root"><element name="a"><empty/></element></define>
  <define name="root" combine="choice"><element name="b"><empty/></element></define>
</grammar>"#;
        assert!(check(schema, "<a/>")?.is_valid());
        assert!(check(schema, "<b/>")?.is_valid());
        assert!(!check(schema, "<c/>")?.is_valid());
        Ok(())
    }

    #[test]
    fn test_invalid_grammars() {
        let external = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <include href="other.rng"/>
</grammar>"#;
        let err = RelaxNgSchema::parse(external).err();
        assert_eq!(err.as_ref().map(Error::kind), Some(&ErrorKind::InvalidSchema));
        assert!(RelaxNgSchema::parse("<grammar/>").is_err());
        let dangling = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="missing"/></start>
</grammar>"#;
        assert!(RelaxNgSchema::parse(dangling).is_err());
        let cyclic = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
  <start><ref name="a"/></start>
  <define name="a"><choice><ref name="a"/><empty/></choice></define>
</grammar>"#;
        assert!(RelaxNgSchema::parse(cyclic).is_err());
    }
}
