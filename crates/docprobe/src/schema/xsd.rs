//! W3C XML Schema validation
//!
//! The schema document is compiled into an arena of type definitions and
//! element declarations. Global components are looked up lazily by name so
//! recursive types and forward references compile in one pass. Validation
//! walks the instance, matching each element's children against its content
//! model, then checking attributes and simple values. Messages follow
//! libxml2's wording.

use std::borrow::Cow;
use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::error::{Error, ErrorKind, Result, Span};
use crate::schema::content::{Mismatch, Particle, Term};
use crate::schema::datatype::{Builtin, Facet, SimpleType};
use crate::schema::{clark_name, descend, element_path, parse_grammar, Validate};
use crate::schema::{ValidationError, ValidationOutcome};
use crate::xml::model::{Document, NodeId, NodeKind};

pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Namespace URI and local name
type ExpandedName = (Option<String>, String);

fn display(name: &ExpandedName) -> String {
    clark_name(name.0.as_deref(), &name.1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TypeId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DeclId(usize);

#[derive(Clone, Debug)]
enum TypeDef {
    AnyType,
    Simple(SimpleType),
    Complex(ComplexType),
}

#[derive(Clone, Debug)]
struct ComplexType {
    /// Base of a `complexContent` extension
    base: Option<TypeId>,
    mixed: bool,
    content: Content,
    attributes: Vec<AttributeUse>,
    any_attribute: Option<Wildcard>,
}

#[derive(Clone, Debug)]
enum Content {
    Elements(Particle<Leaf>),
    Simple(SimpleType),
}

#[derive(Clone, Debug)]
struct AttributeUse {
    name: ExpandedName,
    simple: SimpleType,
    required: bool,
    fixed: Option<String>,
}

#[derive(Clone, Debug)]
struct ElementDecl {
    name: ExpandedName,
    type_id: TypeId,
    nillable: bool,
    fixed: Option<String>,
    default: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
enum Leaf {
    Element { name: ExpandedName, decl: DeclId },
    Any(Wildcard),
}

impl Term<ExpandedName> for Leaf {
    fn accepts(&self, item: &ExpandedName) -> bool {
        match self {
            Self::Element { name, .. } => name == item,
            Self::Any(wildcard) => wildcard.allows(item.0.as_deref()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Element { name, .. } => display(name),
            Self::Any(_) => "*".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Namespaces {
    Any,
    /// Any namespace other than this one; unqualified names excluded
    Other(Option<String>),
    Set(Vec<Option<String>>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Process {
    Strict,
    Lax,
    Skip,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Wildcard {
    namespaces: Namespaces,
    process: Process,
}

impl Wildcard {
    fn allows(&self, namespace: Option<&str>) -> bool {
        match &self.namespaces {
            Namespaces::Any => true,
            Namespaces::Other(target) => namespace.is_some() && namespace != target.as_deref(),
            Namespaces::Set(allowed) => allowed.iter().any(|ns| ns.as_deref() == namespace),
        }
    }
}

/// A compiled XML Schema
#[derive(Clone, Debug)]
pub struct XsdSchema {
    target_namespace: Option<String>,
    types: Vec<TypeDef>,
    decls: Vec<ElementDecl>,
    globals: IndexMap<ExpandedName, DeclId>,
    /// Named and builtin types, for `xsi:type`
    named: HashMap<ExpandedName, TypeId>,
}

impl XsdSchema {
    /// Compile a schema document
    #[instrument(level = "debug", skip_all)]
    pub fn parse(text: &str) -> Result<Self> {
        let doc = parse_grammar(text)?;
        let schema = Compiler::new(&doc)?.compile()?;
        debug!(
            elements = schema.globals.len(),
            types = schema.types.len(),
            "compiled xml schema"
        );
        Ok(schema)
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Names of the global element declarations
    pub fn global_elements(&self) -> impl Iterator<Item = String> + '_ {
        self.globals.keys().map(display)
    }
}

impl Validate<Document> for XsdSchema {
    fn check(&self, doc: &Document) -> Result<ValidationOutcome> {
        let mut run = Validation {
            schema: self,
            doc,
            errors: Vec::new(),
        };
        run.document();
        Ok(ValidationOutcome::from_errors(run.errors))
    }
}

fn invalid(line: u32, message: impl Into<String>) -> Error {
    Error::with_message(ErrorKind::InvalidSchema, Span::line(line), message)
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("true" | "1"))
}

const FACETS: &[&str] = &[
    "enumeration",
    "pattern",
    "length",
    "minLength",
    "maxLength",
    "minInclusive",
    "maxInclusive",
    "minExclusive",
    "maxExclusive",
    "totalDigits",
    "fractionDigits",
    "whiteSpace",
];

struct Compiler<'s> {
    doc: &'s Document,
    target: Option<String>,
    elements_qualified: bool,
    attributes_qualified: bool,
    element_nodes: IndexMap<String, NodeId>,
    type_nodes: IndexMap<String, NodeId>,
    attribute_nodes: HashMap<String, NodeId>,
    group_nodes: HashMap<String, NodeId>,
    attribute_group_nodes: HashMap<String, NodeId>,
    types: Vec<TypeDef>,
    named: HashMap<ExpandedName, TypeId>,
    decls: Vec<ElementDecl>,
    globals: IndexMap<ExpandedName, DeclId>,
    /// Nesting of group references being expanded
    depth: usize,
}

impl<'s> Compiler<'s> {
    fn new(doc: &'s Document) -> Result<Self> {
        let root = doc
            .root_element()
            .ok_or_else(|| invalid(1, "The schema document is empty"))?;
        let is_schema = doc.element(root).is_some_and(|element| {
            element.name.local == "schema" && element.namespace.as_deref() == Some(XS_NAMESPACE)
        });
        if !is_schema {
            return Err(invalid(
                doc.node(root).line,
                "The XML document is not a schema document",
            ));
        }

        let attr = |name: &str| doc.element(root).and_then(|e| e.attribute(name));
        Ok(Self {
            doc,
            target: attr("targetNamespace").map(str::to_string),
            elements_qualified: attr("elementFormDefault") == Some("qualified"),
            attributes_qualified: attr("attributeFormDefault") == Some("qualified"),
            element_nodes: IndexMap::new(),
            type_nodes: IndexMap::new(),
            attribute_nodes: HashMap::new(),
            group_nodes: HashMap::new(),
            attribute_group_nodes: HashMap::new(),
            types: Vec::new(),
            named: HashMap::new(),
            decls: Vec::new(),
            globals: IndexMap::new(),
            depth: 0,
        })
    }

    fn compile(mut self) -> Result<XsdSchema> {
        let Some(root) = self.doc.root_element() else {
            return Err(invalid(1, "The schema document is empty"));
        };

        for (child, local) in self.children(root) {
            let line = self.line(child);
            if matches!(local, "import" | "include" | "redefine" | "override") {
                return Err(invalid(
                    line,
                    format!("Unsupported schema construct 'xs:{local}'"),
                ));
            }
            if local == "notation" {
                continue;
            }
            let name = self.required(child, local, "name")?.to_string();
            let table = match local {
                "element" => &mut self.element_nodes,
                "complexType" | "simpleType" => &mut self.type_nodes,
                "attribute" => {
                    self.attribute_nodes.insert(name, child);
                    continue;
                }
                "group" => {
                    self.group_nodes.insert(name, child);
                    continue;
                }
                "attributeGroup" => {
                    self.attribute_group_nodes.insert(name, child);
                    continue;
                }
                other => {
                    return Err(invalid(
                        line,
                        format!("Element 'xs:{other}' is not allowed in 'xs:schema'"),
                    ))
                }
            };
            if table.insert(name.clone(), child).is_some() {
                return Err(invalid(
                    line,
                    format!("A global component named '{name}' is already declared"),
                ));
            }
        }

        // reserve global declarations so references resolve before bodies
        let any = self.builtin_type("anyType").unwrap_or(TypeId(0));
        let element_nodes: Vec<(String, NodeId)> = self
            .element_nodes
            .iter()
            .map(|(name, node)| (name.clone(), *node))
            .collect();
        for (local, _) in &element_nodes {
            let name = (self.target.clone(), local.clone());
            let id = DeclId(self.decls.len());
            self.decls.push(ElementDecl {
                name: name.clone(),
                type_id: any,
                nillable: false,
                fixed: None,
                default: None,
            });
            self.globals.insert(name, id);
        }
        for (index, (_, node)) in element_nodes.into_iter().enumerate() {
            let decl = self.element_decl(node, true)?;
            if let Some(slot) = self.decls.get_mut(index) {
                *slot = decl;
            }
        }

        let type_names: Vec<String> = self.type_nodes.keys().cloned().collect();
        for name in type_names {
            self.named_type(&name)?;
        }

        Ok(XsdSchema {
            target_namespace: self.target,
            types: self.types,
            decls: self.decls,
            globals: self.globals,
            named: self.named,
        })
    }

    /// Schema-namespace element children, annotations skipped
    fn children(&self, node: NodeId) -> Vec<(NodeId, &'s str)> {
        let doc = self.doc;
        doc.child_elements(node)
            .filter_map(|child| {
                let element = doc.element(child)?;
                (element.namespace.as_deref() == Some(XS_NAMESPACE)
                    && element.name.local != "annotation")
                    .then_some((child, element.name.local.as_str()))
            })
            .collect()
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&'s str> {
        self.doc.element(node).and_then(|element| element.attribute(name))
    }

    fn required(&self, node: NodeId, local: &str, name: &str) -> Result<&'s str> {
        self.attr(node, name).ok_or_else(|| {
            invalid(
                self.line(node),
                format!("Element 'xs:{local}': The attribute '{name}' is required but missing."),
            )
        })
    }

    fn line(&self, node: NodeId) -> u32 {
        self.doc.node(node).line
    }

    /// Resolve a QName-valued attribute in scope of `node`
    fn qname(&self, node: NodeId, raw: &str) -> Result<ExpandedName> {
        let raw = raw.trim();
        let (prefix, local) = raw.split_once(':').unwrap_or(("", raw));
        let namespace = self.doc.lookup_namespace_uri(node, prefix);
        if namespace.is_none() && !prefix.is_empty() {
            return Err(invalid(
                self.line(node),
                format!("The QName value '{raw}' has no corresponding namespace declaration in scope."),
            ));
        }
        Ok((namespace.map(str::to_string), local.to_string()))
    }

    fn push_type(&mut self, def: TypeDef) -> TypeId {
        self.types.push(def);
        TypeId(self.types.len().saturating_sub(1))
    }

    fn builtin_type(&mut self, local: &str) -> Option<TypeId> {
        let key = (Some(XS_NAMESPACE.to_string()), local.to_string());
        if let Some(id) = self.named.get(&key) {
            return Some(*id);
        }
        let def = match local {
            "anyType" => TypeDef::AnyType,
            other => TypeDef::Simple(SimpleType::builtin(Builtin::from_name(other)?)),
        };
        let id = self.push_type(def);
        self.named.insert(key, id);
        Some(id)
    }

    /// Compile the named global type on first use
    fn named_type(&mut self, local: &str) -> Result<Option<TypeId>> {
        let key = (self.target.clone(), local.to_string());
        if let Some(id) = self.named.get(&key) {
            return Ok(Some(*id));
        }
        let Some(node) = self.type_nodes.get(local).copied() else {
            return Ok(None);
        };
        // recursive references see the reserved slot
        let id = self.push_type(TypeDef::AnyType);
        self.named.insert(key, id);
        let def = self.type_def(node)?;
        if let Some(slot) = self.types.get_mut(id.0) {
            *slot = def;
        }
        Ok(Some(id))
    }

    fn type_def(&mut self, node: NodeId) -> Result<TypeDef> {
        let local = self.doc.element(node).map(|e| e.name.local.as_str());
        if local == Some("complexType") {
            Ok(TypeDef::Complex(self.complex_type(node)?))
        } else {
            Ok(TypeDef::Simple(self.simple_type(node)?))
        }
    }

    fn resolve_type(&mut self, node: NodeId, raw: &str) -> Result<TypeId> {
        let name = self.qname(node, raw)?;
        let found = if name.0.as_deref() == Some(XS_NAMESPACE) {
            self.builtin_type(&name.1)
        } else if name.0 == self.target {
            self.named_type(&name.1)?
        } else {
            None
        };
        found.ok_or_else(|| {
            invalid(
                self.line(node),
                format!("The QName value '{}' does not resolve to a(n) type definition.", raw.trim()),
            )
        })
    }

    /// The simple type behind `id`: a simple type itself or the content of
    /// a complex type with simple content
    fn simple_of(&self, id: TypeId, node: NodeId) -> Result<SimpleType> {
        match self.types.get(id.0) {
            Some(TypeDef::Simple(simple)) => Ok(simple.clone()),
            Some(TypeDef::Complex(ComplexType {
                content: Content::Simple(simple),
                ..
            })) => Ok(simple.clone()),
            Some(TypeDef::AnyType) => Ok(SimpleType::builtin(Builtin::AnySimpleType)),
            _ => Err(invalid(
                self.line(node),
                "The base type must be a simple type or a complex type with simple content",
            )),
        }
    }

    fn simple_type(&mut self, node: NodeId) -> Result<SimpleType> {
        for (child, local) in self.children(node) {
            match local {
                "restriction" => {
                    let mut base = None;
                    let mut facets = Vec::new();
                    if let Some(raw) = self.attr(child, "base") {
                        let id = self.resolve_type(child, raw)?;
                        base = Some(self.simple_of(id, child)?);
                    }
                    for (item, item_local) in self.children(child) {
                        if item_local == "simpleType" {
                            base = Some(self.simple_type(item)?);
                        } else if FACETS.contains(&item_local) {
                            let value = self.required(item, item_local, "value")?;
                            let facet = Facet::parse(item_local, value)
                                .map_err(|message| invalid(self.line(item), message))?;
                            facets.push(facet);
                        } else {
                            return Err(invalid(
                                self.line(item),
                                format!("Unsupported facet 'xs:{item_local}'"),
                            ));
                        }
                    }
                    let base = base.ok_or_else(|| {
                        invalid(self.line(child), "Restriction without a base type")
                    })?;
                    return Ok(base.restrict(Facet::merge(facets)));
                }
                "list" => {
                    let item = match self.attr(child, "itemType") {
                        Some(raw) => {
                            let id = self.resolve_type(child, raw)?;
                            self.simple_of(id, child)?
                        }
                        None => match self.children(child).first() {
                            Some((inner, _)) => self.simple_type(*inner)?,
                            None => {
                                return Err(invalid(self.line(child), "List without an item type"))
                            }
                        },
                    };
                    return Ok(SimpleType::List {
                        item: Box::new(item),
                        facets: Vec::new(),
                    });
                }
                "union" => {
                    let mut members = Vec::new();
                    for raw in self.attr(child, "memberTypes").unwrap_or_default().split_whitespace() {
                        let id = self.resolve_type(child, raw)?;
                        members.push(self.simple_of(id, child)?);
                    }
                    for (inner, _) in self.children(child) {
                        members.push(self.simple_type(inner)?);
                    }
                    if members.is_empty() {
                        return Err(invalid(self.line(child), "Union without member types"));
                    }
                    return Ok(SimpleType::Union(members));
                }
                _ => {}
            }
        }
        Err(invalid(
            self.line(node),
            "Element 'xs:simpleType': The content is not valid. Expected is (annotation?, (restriction | list | union)).",
        ))
    }

    fn complex_type(&mut self, node: NodeId) -> Result<ComplexType> {
        let mut complex = ComplexType {
            base: None,
            mixed: is_true(self.attr(node, "mixed")),
            content: Content::Elements(Particle::Empty),
            attributes: Vec::new(),
            any_attribute: None,
        };
        for (child, local) in self.children(node) {
            match local {
                "simpleContent" => self.simple_content(child, &mut complex)?,
                "complexContent" => self.complex_content(child, &mut complex)?,
                other => self.content_item(child, other, &mut complex)?,
            }
        }
        Ok(complex)
    }

    /// Model groups and attribute declarations inside a complex type
    fn content_item(
        &mut self,
        node: NodeId,
        local: &str,
        complex: &mut ComplexType,
    ) -> Result<()> {
        match local {
            "sequence" | "choice" | "all" | "group" => {
                if let Some(particle) = self.particle(node, local)? {
                    complex.content = Content::Elements(particle);
                }
            }
            "attribute" | "attributeGroup" | "anyAttribute" => {
                self.attribute_item(node, local, complex)?;
            }
            "unique" | "key" | "keyref" => {
                return Err(invalid(
                    self.line(node),
                    format!("Unsupported schema construct 'xs:{local}'"),
                ))
            }
            other => {
                return Err(invalid(
                    self.line(node),
                    format!("Element 'xs:{other}' is not allowed in a complex type"),
                ))
            }
        }
        Ok(())
    }

    fn derivation(&self, node: NodeId) -> Result<(NodeId, &'s str)> {
        self.children(node)
            .into_iter()
            .find(|(_, local)| matches!(*local, "extension" | "restriction"))
            .ok_or_else(|| invalid(self.line(node), "Expected an extension or a restriction"))
    }

    fn inherit_attributes(&self, base: TypeId, complex: &mut ComplexType) {
        if let Some(TypeDef::Complex(parent)) = self.types.get(base.0) {
            complex.attributes.clone_from(&parent.attributes);
            complex.any_attribute.clone_from(&parent.any_attribute);
        }
    }

    fn simple_content(&mut self, node: NodeId, complex: &mut ComplexType) -> Result<()> {
        let (derivation, kind) = self.derivation(node)?;
        let raw = self.required(derivation, kind, "base")?;
        let base = self.resolve_type(derivation, raw)?;
        let mut simple = self.simple_of(base, derivation)?;
        self.inherit_attributes(base, complex);

        let mut facets = Vec::new();
        for (child, local) in self.children(derivation) {
            if kind == "restriction" && local == "simpleType" {
                simple = self.simple_type(child)?;
            } else if kind == "restriction" && FACETS.contains(&local) {
                let value = self.required(child, local, "value")?;
                facets.push(
                    Facet::parse(local, value).map_err(|message| invalid(self.line(child), message))?,
                );
            } else {
                self.attribute_item(child, local, complex)?;
            }
        }
        complex.content = Content::Simple(simple.restrict(Facet::merge(facets)));
        Ok(())
    }

    fn complex_content(&mut self, node: NodeId, complex: &mut ComplexType) -> Result<()> {
        if let Some(mixed) = self.attr(node, "mixed") {
            complex.mixed = is_true(Some(mixed));
        }
        let (derivation, kind) = self.derivation(node)?;
        let raw = self.required(derivation, kind, "base")?;
        let base = self.resolve_type(derivation, raw)?;
        if kind == "extension" {
            complex.base = Some(base);
        } else {
            self.inherit_attributes(base, complex);
        }
        for (child, local) in self.children(derivation) {
            self.content_item(child, local, complex)?;
        }
        Ok(())
    }

    fn attribute_item(
        &mut self,
        node: NodeId,
        local: &str,
        complex: &mut ComplexType,
    ) -> Result<()> {
        match local {
            "attribute" => {
                let (name, attribute) = self.attribute_use(node)?;
                complex.attributes.retain(|existing| existing.name != name);
                if let Some(attribute) = attribute {
                    complex.attributes.push(attribute);
                }
            }
            "anyAttribute" => complex.any_attribute = Some(self.wildcard(node)),
            "attributeGroup" => {
                let raw = self.required(node, local, "ref")?;
                let (_, name) = self.qname(node, raw)?;
                let group = self.attribute_group_nodes.get(&name).copied().ok_or_else(|| {
                    invalid(
                        self.line(node),
                        format!("The QName value '{raw}' does not resolve to a(n) attribute group definition."),
                    )
                })?;
                self.enter(node)?;
                for (child, child_local) in self.children(group) {
                    self.attribute_item(child, child_local, complex)?;
                }
                self.depth -= 1;
            }
            other => {
                return Err(invalid(
                    self.line(node),
                    format!("Element 'xs:{other}' is not allowed here"),
                ))
            }
        }
        Ok(())
    }

    fn enter(&mut self, node: NodeId) -> Result<()> {
        self.depth += 1;
        if self.depth > 64 {
            return Err(invalid(self.line(node), "Circular group reference"));
        }
        Ok(())
    }

    /// Attribute declaration or reference; `None` for a prohibited use
    fn attribute_use(&mut self, node: NodeId) -> Result<(ExpandedName, Option<AttributeUse>)> {
        let usage = self.attr(node, "use").unwrap_or("optional");
        let mut fixed = self.attr(node, "fixed").map(str::to_string);

        let (decl, name) = match self.attr(node, "ref") {
            Some(raw) => {
                let name = self.qname(node, raw)?;
                let decl = self.attribute_nodes.get(&name.1).copied().ok_or_else(|| {
                    invalid(
                        self.line(node),
                        format!("The QName value '{raw}' does not resolve to a(n) attribute declaration."),
                    )
                })?;
                if fixed.is_none() {
                    fixed = self.attr(decl, "fixed").map(str::to_string);
                }
                (decl, (self.target.clone(), name.1))
            }
            None => {
                let local = self.required(node, "attribute", "name")?.to_string();
                let qualified = match self.attr(node, "form") {
                    Some(form) => form == "qualified",
                    None => self.attributes_qualified,
                };
                let namespace = if qualified { self.target.clone() } else { None };
                (node, (namespace, local))
            }
        };

        if usage == "prohibited" {
            return Ok((name, None));
        }
        let simple = match self.attr(decl, "type") {
            Some(raw) => {
                let id = self.resolve_type(decl, raw)?;
                self.simple_of(id, decl)?
            }
            None => match self.children(decl).first() {
                Some((inner, _)) => self.simple_type(*inner)?,
                None => SimpleType::builtin(Builtin::AnySimpleType),
            },
        };
        let attribute = AttributeUse {
            name: name.clone(),
            simple,
            required: usage == "required",
            fixed,
        };
        Ok((name, Some(attribute)))
    }

    fn wildcard(&self, node: NodeId) -> Wildcard {
        let namespaces = match self.attr(node, "namespace").map(str::trim) {
            None | Some("##any") => Namespaces::Any,
            Some("##other") => Namespaces::Other(self.target.clone()),
            Some(list) => Namespaces::Set(
                list.split_whitespace()
                    .map(|token| match token {
                        "##targetNamespace" => self.target.clone(),
                        "##local" => None,
                        uri => Some(uri.to_string()),
                    })
                    .collect(),
            ),
        };
        let process = match self.attr(node, "processContents") {
            Some("lax") => Process::Lax,
            Some("skip") => Process::Skip,
            _ => Process::Strict,
        };
        Wildcard {
            namespaces,
            process,
        }
    }

    fn occurs(&self, node: NodeId) -> Result<(usize, Option<usize>)> {
        let parse = |name: &str, raw: &str| {
            raw.trim().parse::<usize>().map_err(|_| {
                invalid(
                    self.line(node),
                    format!("The value '{raw}' of attribute '{name}' is not a valid occurrence count"),
                )
            })
        };
        let min = match self.attr(node, "minOccurs") {
            Some(raw) => parse("minOccurs", raw)?,
            None => 1,
        };
        let max = match self.attr(node, "maxOccurs").map(str::trim) {
            Some("unbounded") => None,
            Some(raw) => Some(parse("maxOccurs", raw)?),
            None => Some(1),
        };
        if max.is_some_and(|max| max < min) {
            return Err(invalid(
                self.line(node),
                "The value of 'maxOccurs' must be greater than or equal to 'minOccurs'",
            ));
        }
        Ok((min, max))
    }

    fn particle(&mut self, node: NodeId, local: &str) -> Result<Option<Particle<Leaf>>> {
        let particle = match local {
            "element" => match self.attr(node, "ref") {
                Some(raw) => {
                    let name = self.qname(node, raw)?;
                    let decl = self.globals.get(&name).copied().ok_or_else(|| {
                        invalid(
                            self.line(node),
                            format!("The QName value '{raw}' does not resolve to a(n) element declaration."),
                        )
                    })?;
                    Particle::Term(Leaf::Element { name, decl })
                }
                None => {
                    let decl = self.element_decl(node, false)?;
                    let name = decl.name.clone();
                    self.decls.push(decl);
                    Particle::Term(Leaf::Element {
                        name,
                        decl: DeclId(self.decls.len().saturating_sub(1)),
                    })
                }
            },
            "any" => Particle::Term(Leaf::Any(self.wildcard(node))),
            "sequence" | "choice" | "all" => {
                let mut items = Vec::new();
                for (child, child_local) in self.children(node) {
                    match self.particle(child, child_local)? {
                        Some(item) => items.push(item),
                        None => {
                            return Err(invalid(
                                self.line(child),
                                format!("Element 'xs:{child_local}' is not allowed in 'xs:{local}'"),
                            ))
                        }
                    }
                }
                match local {
                    "sequence" => Particle::Sequence(items),
                    "choice" => Particle::Choice(items),
                    _ => Particle::All(items),
                }
            }
            "group" => {
                let raw = self.required(node, local, "ref")?;
                let (_, name) = self.qname(node, raw)?;
                let group = self.group_nodes.get(&name).copied().ok_or_else(|| {
                    invalid(
                        self.line(node),
                        format!("The QName value '{raw}' does not resolve to a(n) model group definition."),
                    )
                })?;
                self.enter(node)?;
                let mut inner = Particle::Empty;
                for (child, child_local) in self.children(group) {
                    if let Some(particle) = self.particle(child, child_local)? {
                        inner = particle;
                    }
                }
                self.depth -= 1;
                inner
            }
            _ => return Ok(None),
        };
        let (min, max) = self.occurs(node)?;
        Ok(Some(particle.occurs(min, max)))
    }

    fn element_decl(&mut self, node: NodeId, global: bool) -> Result<ElementDecl> {
        let local = self.required(node, "element", "name")?.to_string();
        let qualified = match self.attr(node, "form") {
            Some(form) => form == "qualified",
            None => global || self.elements_qualified,
        };
        let namespace = if qualified { self.target.clone() } else { None };

        let mut type_id = match self.attr(node, "type") {
            Some(raw) => Some(self.resolve_type(node, raw)?),
            None => None,
        };
        for (child, child_local) in self.children(node) {
            match child_local {
                "complexType" => {
                    let def = TypeDef::Complex(self.complex_type(child)?);
                    type_id = Some(self.push_type(def));
                }
                "simpleType" => {
                    let def = TypeDef::Simple(self.simple_type(child)?);
                    type_id = Some(self.push_type(def));
                }
                other => {
                    return Err(invalid(
                        self.line(child),
                        format!("Unsupported schema construct 'xs:{other}'"),
                    ))
                }
            }
        }
        let type_id = match type_id {
            Some(id) => id,
            None => self.builtin_type("anyType").unwrap_or(TypeId(0)),
        };

        Ok(ElementDecl {
            name: (namespace, local),
            type_id,
            nillable: is_true(self.attr(node, "nillable")),
            fixed: self.attr(node, "fixed").map(str::to_string),
            default: self.attr(node, "default").map(str::to_string),
        })
    }
}

/// Content of a complex type after folding in its extension bases
struct Effective {
    particle: Particle<Leaf>,
    mixed: bool,
    simple: Option<SimpleType>,
    attributes: Vec<AttributeUse>,
    any_attribute: Option<Wildcard>,
}

impl Effective {
    const fn empty() -> Self {
        Self {
            particle: Particle::Empty,
            mixed: false,
            simple: None,
            attributes: Vec::new(),
            any_attribute: None,
        }
    }
}

fn join(first: Particle<Leaf>, second: Particle<Leaf>) -> Particle<Leaf> {
    match (first, second) {
        (Particle::Empty, other) | (other, Particle::Empty) => other,
        (first, second) => Particle::Sequence(vec![first, second]),
    }
}

impl XsdSchema {
    fn effective(&self, complex: &ComplexType, depth: usize) -> Effective {
        let mut out = match complex.base.and_then(|id| self.types.get(id.0)) {
            Some(TypeDef::Complex(base)) if depth < self.types.len() => {
                self.effective(base, depth + 1)
            }
            Some(TypeDef::Simple(simple)) => Effective {
                simple: Some(simple.clone()),
                ..Effective::empty()
            },
            _ => Effective::empty(),
        };
        match &complex.content {
            Content::Elements(particle) => {
                out.particle = join(out.particle, particle.clone());
            }
            Content::Simple(simple) => out.simple = Some(simple.clone()),
        }
        out.mixed |= complex.mixed;
        for attribute in &complex.attributes {
            out.attributes.retain(|existing| existing.name != attribute.name);
            out.attributes.push(attribute.clone());
        }
        if complex.any_attribute.is_some() {
            out.any_attribute.clone_from(&complex.any_attribute);
        }
        out
    }
}

struct Validation<'a> {
    schema: &'a XsdSchema,
    doc: &'a Document,
    errors: Vec<ValidationError>,
}

impl<'a> Validation<'a> {
    fn report(&mut self, node: NodeId, message: String) {
        let line = self.doc.node(node).line;
        self.errors
            .push(ValidationError::new(element_path(self.doc, node), message).at_line(line));
    }

    fn name_of(&self, node: NodeId) -> ExpandedName {
        self.doc.element(node).map_or_else(
            || (None, String::new()),
            |element| (element.namespace.clone(), element.name.local.clone()),
        )
    }

    fn document(&mut self) {
        let Some(root) = self.doc.root_element() else {
            self.errors
                .push(ValidationError::new("/", "The document has no document element."));
            return;
        };
        let name = self.name_of(root);
        match self.schema.globals.get(&name) {
            Some(decl) => self.element(root, *decl),
            None => self.report(
                root,
                format!(
                    "Element '{}': No matching global declaration available for the validation root.",
                    display(&name)
                ),
            ),
        }
    }

    /// Type named by `xsi:type`, if present and resolvable
    fn instance_type(&mut self, node: NodeId, label: &str) -> Option<Option<Cow<'a, TypeDef>>> {
        let (schema, doc) = (self.schema, self.doc);
        let raw = doc
            .element(node)?
            .attribute_ns(Some(XSI_NAMESPACE), "type")?
            .trim();
        let (prefix, local) = raw.split_once(':').unwrap_or(("", raw));
        let namespace = doc.lookup_namespace_uri(node, prefix).map(str::to_string);
        let key = (namespace, local.to_string());
        let found = match schema.named.get(&key).and_then(|id| schema.types.get(id.0)) {
            Some(def) => Some(Cow::Borrowed(def)),
            None if key.0.as_deref() == Some(XS_NAMESPACE) => Builtin::from_name(local)
                .map(|builtin| Cow::Owned(TypeDef::Simple(SimpleType::builtin(builtin)))),
            None => None,
        };
        if found.is_none() {
            let message = format!(
                "Element '{label}', attribute '{{{XSI_NAMESPACE}}}type': The QName value '{raw}' of the xsi:type attribute does not resolve to a type definition."
            );
            self.report(node, message);
        }
        Some(found)
    }

    fn element(&mut self, node: NodeId, decl_id: DeclId) {
        descend(|| self.check_element(node, decl_id));
    }

    fn check_element(&mut self, node: NodeId, decl_id: DeclId) {
        let schema = self.schema;
        let Some(decl) = schema.decls.get(decl_id.0) else {
            return;
        };
        let label = display(&self.name_of(node));

        let nil = is_true(
            self.doc
                .element(node)
                .and_then(|element| element.attribute_ns(Some(XSI_NAMESPACE), "nil")),
        );
        if nil {
            if !decl.nillable {
                self.report(node, format!("Element '{label}': The element is not 'nillable'."));
            } else if !self.doc.children(node).is_empty() {
                self.report(
                    node,
                    format!("Element '{label}': The element cannot be 'nilled' because there is a character or element value."),
                );
            }
            return;
        }

        let def: Cow<'a, TypeDef> = match self.instance_type(node, &label) {
            Some(Some(def)) => def,
            Some(None) => return,
            None => match schema.types.get(decl.type_id.0) {
                Some(def) => Cow::Borrowed(def),
                None => return,
            },
        };

        match &*def {
            TypeDef::AnyType => self.any_content(node),
            TypeDef::Simple(simple) => {
                self.attributes(node, &label, &[], None);
                self.simple_content(node, &label, decl, simple, "the type definition is simple");
            }
            TypeDef::Complex(complex) => {
                let effective = schema.effective(complex, 0);
                self.attributes(
                    node,
                    &label,
                    &effective.attributes,
                    effective.any_attribute.as_ref(),
                );
                match &effective.simple {
                    Some(simple) => self.simple_content(
                        node,
                        &label,
                        decl,
                        simple,
                        "the content type is a simple type definition",
                    ),
                    None => self.element_content(node, &label, &effective),
                }
            }
        }
    }

    /// anyType: children with a global declaration are still checked
    fn any_content(&mut self, node: NodeId) {
        let children: Vec<NodeId> = self.doc.child_elements(node).collect();
        for child in children {
            let name = self.name_of(child);
            if let Some(decl) = self.schema.globals.get(&name).copied() {
                self.element(child, decl);
            }
        }
    }

    fn simple_content(
        &mut self,
        node: NodeId,
        label: &str,
        decl: &ElementDecl,
        simple: &SimpleType,
        reason: &str,
    ) {
        if self.doc.child_elements(node).next().is_some() {
            self.report(
                node,
                format!("Element '{label}': Element content is not allowed, because {reason}."),
            );
            return;
        }
        let mut text = self.doc.string_value(node);
        if text.is_empty() {
            if let Some(default) = &decl.default {
                text.clone_from(default);
            }
        }
        match simple.validate(&text) {
            Err(message) => self.report(node, format!("Element '{label}': {message}")),
            Ok(value) => {
                if let Some(fixed) = &decl.fixed {
                    if !text.is_empty() && !simple.equal(&value, fixed) {
                        self.report(
                            node,
                            format!("Element '{label}': The value '{value}' does not match the fixed value constraint '{fixed}'."),
                        );
                    }
                }
            }
        }
    }

    fn element_content(&mut self, node: NodeId, label: &str, effective: &Effective) {
        if !effective.mixed {
            let has_text = self.doc.children(node).iter().any(|child| {
                matches!(&self.doc.node(*child).kind,
                    NodeKind::Text(text) | NodeKind::CData(text) if !text.trim().is_empty())
            });
            if has_text {
                let message = if matches!(effective.particle, Particle::Empty) {
                    format!("Element '{label}': Character content is not allowed, because the content type is empty.")
                } else {
                    format!("Element '{label}': Character content other than whitespace is not allowed because the content type is 'element-only'.")
                };
                self.report(node, message);
            }
        }

        let children: Vec<NodeId> = self.doc.child_elements(node).collect();
        let names: Vec<ExpandedName> = children.iter().map(|child| self.name_of(*child)).collect();
        match effective.particle.check(&names) {
            Ok(()) => {}
            Err(mismatch @ Mismatch::Unexpected { index, .. }) => {
                if let (Some(child), Some(name)) = (children.get(index), names.get(index)) {
                    let message = format!(
                        "Element '{}': This element is not expected.{}",
                        display(name),
                        mismatch.expected_clause()
                    );
                    self.report(*child, message);
                }
                return;
            }
            Err(mismatch @ Mismatch::Incomplete { .. }) => {
                self.report(
                    node,
                    format!(
                        "Element '{label}': Missing child element(s).{}",
                        mismatch.expected_clause()
                    ),
                );
                return;
            }
        }

        let terms = effective.particle.terms();
        for (child, name) in children.into_iter().zip(names) {
            let declared = terms.iter().find_map(|term| match term {
                Leaf::Element { name: declared, decl } if *declared == name => Some(*decl),
                _ => None,
            });
            if let Some(decl) = declared {
                self.element(child, decl);
                continue;
            }
            let process = terms.iter().find_map(|term| match term {
                Leaf::Any(wildcard) if wildcard.allows(name.0.as_deref()) => {
                    Some(wildcard.process)
                }
                _ => None,
            });
            let global = self.schema.globals.get(&name).copied();
            match (process, global) {
                (Some(Process::Skip) | None, _) => {}
                (Some(_), Some(decl)) => self.element(child, decl),
                (Some(Process::Lax), None) => {}
                (Some(Process::Strict), None) => self.report(
                    child,
                    format!(
                        "Element '{}': No matching global element declaration available, but demanded by the strict wildcard.",
                        display(&name)
                    ),
                ),
            }
        }
    }

    fn attributes(
        &mut self,
        node: NodeId,
        label: &str,
        declared: &[AttributeUse],
        any_attribute: Option<&Wildcard>,
    ) {
        let doc = self.doc;
        let Some(element) = doc.element(node) else {
            return;
        };
        let mut messages = Vec::new();
        for attribute in &element.attributes {
            if attribute.namespace.as_deref() == Some(XSI_NAMESPACE) {
                continue;
            }
            let key = (attribute.namespace.clone(), attribute.name.local.clone());
            let shown = display(&key);
            match declared.iter().find(|usage| usage.name == key) {
                Some(usage) => match usage.simple.validate(&attribute.value) {
                    Err(message) => messages.push(format!(
                        "Element '{label}', attribute '{shown}': {message}"
                    )),
                    Ok(value) => {
                        if let Some(fixed) = &usage.fixed {
                            if !usage.simple.equal(&value, fixed) {
                                messages.push(format!(
                                    "Element '{label}', attribute '{shown}': The value '{value}' does not match the fixed value constraint '{fixed}'."
                                ));
                            }
                        }
                    }
                },
                None if any_attribute.is_some_and(|w| w.allows(key.0.as_deref())) => {}
                None => messages.push(format!(
                    "Element '{label}', attribute '{shown}': The attribute '{shown}' is not allowed."
                )),
            }
        }
        for usage in declared.iter().filter(|usage| usage.required) {
            let present = element.attributes.iter().any(|attribute| {
                attribute.namespace == usage.name.0 && attribute.name.local == usage.name.1
            });
            if !present {
                messages.push(format!(
                    "Element '{label}': The attribute '{}' is required but missing.",
                    display(&usage.name)
                ));
            }
        }
        for message in messages {
            self.report(node, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parser::Parser;

    const ORDER_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="sku">
    <xs:restriction base="xs:string">
      <xs:pattern value="[A-Z]{3}-\d+"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:complexType name="itemType">
    <xs:sequence>
      <xs:element name="name" type="xs:string"/>
      <xs:element name="qty" type="xs:positiveInteger"/>
      <xs:element name="note" type="xs:string" minOccurs="0"/>
    </xs:sequence>
    <xs:attribute name="sku" type="sku" use="required"/>
  </xs:complexType>
  <xs:element name="order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="item" type="itemType" maxOccurs="unbounded"/>
      </xs:sequence>
      <xs:attribute name="status">
        <xs:simpleType>
          <xs:restriction base="xs:token">
            <xs:enumeration value="open"/>
            <xs:enumeration value="closed"/>
          </xs:restriction>
        </xs:simpleType>
      </xs:attribute>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    fn check(schema: &str, instance: &str) -> Result<ValidationOutcome> {
        let doc = Parser::new(instance.as_bytes()).parse()?;
        XsdSchema::parse(schema)?.check(&doc)
    }

    fn first_message(outcome: &ValidationOutcome) -> Option<&str> {
        outcome.first_error().map(|error| error.message.as_str())
    }

    #[test]
    fn test_valid_instance() -> Result<()> {
        let outcome = check(
            ORDER_XSD,
            r#"<order status="open"><item sku="ABC-1"><name>Pen</name><qty>2</qty></item></order>"#,
        )?;
        assert!(outcome.is_valid(), "{:?}", outcome.errors);
        Ok(())
    }

    #[test]
    fn test_unexpected_child_reports_line() -> Result<()> {
        let outcome = check(
            ORDER_XSD,
            "<order>\n<item sku=\"ABC-1\">\n<qty>2</qty>\n</item>\n</order>",
        )?;
        let error = outcome.first_error();
        assert_eq!(
            error.map(|e| e.message.as_str()),
            Some("Element 'qty': This element is not expected. Expected is ( name ).")
        );
        assert_eq!(error.and_then(|e| e.line), Some(3));
        Ok(())
    }

    #[test]
    fn test_missing_child() -> Result<()> {
        let outcome = check(ORDER_XSD, "<order/>")?;
        assert_eq!(
            first_message(&outcome),
            Some("Element 'order': Missing child element(s). Expected is ( item ).")
        );
        Ok(())
    }

    #[test]
    fn test_attribute_checks() -> Result<()> {
        let outcome = check(
            ORDER_XSD,
            r#"<order status="lost"><item sku="abc"><name>a</name><qty>1</qty></item><item><name>b</name><qty>1</qty></item></order>"#,
        )?;
        let messages: Vec<&str> = outcome.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Element 'order', attribute 'status': [facet 'enumeration'] The value 'lost' is not an element of the set {'open', 'closed'}.",
                "Element 'item', attribute 'sku': [facet 'pattern'] The value 'abc' is not accepted by the pattern '[A-Z]{3}-\\d+'.",
                "Element 'item': The attribute 'sku' is required but missing.",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_simple_value_error() -> Result<()> {
        let outcome = check(
            ORDER_XSD,
            r#"<order><item sku="ABC-1"><name>a</name><qty>0</qty></item></order>"#,
        )?;
        assert_eq!(
            first_message(&outcome),
            Some("Element 'qty': '0' is not a valid value of the atomic type 'xs:positiveInteger'.")
        );
        Ok(())
    }

    #[test]
    fn test_unknown_root() -> Result<()> {
        let outcome = check(ORDER_XSD, "<invoice/>")?;
        assert_eq!(
            first_message(&outcome),
            Some("Element 'invoice': No matching global declaration available for the validation root.")
        );
        Ok(())
    }

    #[test]
    fn test_target_namespace_and_extension() -> Result<()> {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    xmlns:t="urn:t" targetNamespace="urn:t" elementFormDefault="qualified">
  <xs:complexType name="base">
    <xs:sequence><xs:element name="id" type="xs:int"/></xs:sequence>
  </xs:complexType>
  <xs:complexType name="derived">
    <xs:complexContent>
      <xs:extension base="t:base">
        <xs:sequence><xs:element name="label" type="xs:string"/></xs:sequence>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:element name="thing" type="t:derived"/>
</xs:schema>"#;
        assert!(check(schema, r#"<thing xmlns="urn:t"><id>1</id><label>x</label></thing>"#)?
            .is_valid());
        let outcome = check(schema, r#"<thing xmlns="urn:t"><label>x</label></thing>"#)?;
        assert_eq!(
            first_message(&outcome),
            Some("Element '{urn:t}label': This element is not expected. Expected is ( {urn:t}id ).")
        );
        Ok(())
    }

    #[test]
    fn test_simple_content_and_choice() -> Result<()> {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="price">
    <xs:complexType>
      <xs:choice>
        <xs:element name="amount">
          <xs:complexType>
            <xs:simpleContent>
              <xs:extension base="xs:decimal">
                <xs:attribute name="currency" type="xs:string" use="required"/>
              </xs:extension>
            </xs:simpleContent>
          </xs:complexType>
        </xs:element>
        <xs:element name="free" type="xs:boolean"/>
      </xs:choice>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;
        assert!(check(schema, r#"<price><amount currency="EUR">9.50</amount></price>"#)?.is_valid());
        assert!(check(schema, "<price><free>true</free></price>")?.is_valid());
        let outcome = check(schema, r#"<price><amount currency="EUR">cheap</amount></price>"#)?;
        assert_eq!(
            first_message(&outcome),
            Some("Element 'amount': 'cheap' is not a valid value of the atomic type 'xs:decimal'.")
        );
        Ok(())
    }

    #[test]
    fn test_wildcards_and_mixed() -> Result<()> {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="doc">
    <xs:complexType mixed="true">
      <xs:sequence>
        <xs:any processContents="skip" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
      <xs:anyAttribute processContents="skip"/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;
        assert!(check(schema, r#"<doc lang="en">Hello <b>world</b></doc>"#)?.is_valid());
        Ok(())
    }

    #[test]
    fn test_element_only_rejects_text() -> Result<()> {
        let outcome = check(
            ORDER_XSD,
            r#"<order>oops<item sku="ABC-1"><name>a</name><qty>1</qty></item></order>"#,
        )?;
        assert_eq!(
            first_message(&outcome),
            Some("Element 'order': Character content other than whitespace is not allowed because the content type is 'element-only'.")
        );
        Ok(())
    }

    #[test]
    fn test_nillable() -> Result<()> {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="n" type="xs:int" nillable="true"/>
</xs:schema>"#;
        let instance = r#"<n xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:nil="true"/>"#;
        assert!(check(schema, instance)?.is_valid());
        Ok(())
    }

    #[test]
    fn test_unsupported_constructs_are_invalid_schemas() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:import namespace="urn:other" schemaLocation="other.xsd"/>
</xs:schema>"#;
        let err = XsdSchema::parse(schema).err();
        assert_eq!(err.as_ref().map(Error::kind), Some(&ErrorKind::InvalidSchema));
        assert_eq!(err.and_then(|e| e.line()), Some(2));

        assert!(XsdSchema::parse("<notaschema/>").is_err());
        assert!(XsdSchema::parse("<xs:schema").is_err());
        let unresolved = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="a" type="missing"/>
</xs:schema>"#;
        assert!(XsdSchema::parse(unresolved).is_err());
    }

    #[test]
    fn test_recursive_types() -> Result<()> {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="node">
    <xs:sequence>
      <xs:element name="node" type="node" minOccurs="0" maxOccurs="unbounded"/>
    </xs:sequence>
    <xs:attribute name="id" type="xs:ID"/>
  </xs:complexType>
  <xs:element name="node" type="node"/>
</xs:schema>"#;
        assert!(check(schema, r#"<node id="a"><node id="b"><node/></node></node>"#)?.is_valid());
        Ok(())
    }
}
