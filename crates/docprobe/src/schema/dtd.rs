//! DTD validation against the internal subset
//!
//! Only declarations written inside the DOCTYPE brackets are used; external
//! subsets are never fetched.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use crate::error::{Error, ErrorKind, Result, Span};
use crate::lexer::cursor::Cursor;
use crate::schema::content::{Particle, Term};
use crate::schema::datatype::is_name;
use crate::schema::{element_path, Validate, ValidationError, ValidationOutcome};
use crate::xml::model::{Document, NodeId, NodeKind};
use crate::xml::parser::{decode_entities, internal_entities};

impl Term<String> for String {
    fn accepts(&self, item: &String) -> bool {
        self == item
    }

    fn describe(&self) -> String {
        self.clone()
    }
}

/// Allowed content of an element
#[derive(Clone, Debug, PartialEq)]
pub enum ContentSpec {
    Empty,
    Any,
    /// `(#PCDATA | a | b)*`
    Mixed(Vec<String>),
    Children {
        model: Particle<String>,
        /// Model as written, for messages
        source: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeType {
    Cdata,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Enumeration(Vec<String>),
    Notation(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeDefault {
    Required,
    Implied,
    Fixed(String),
    Value(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeDef {
    pub name: String,
    pub kind: AttributeType,
    pub default: AttributeDefault,
}

/// Declarations from a document's internal subset
#[derive(Clone, Debug, PartialEq)]
pub struct Dtd {
    root: String,
    elements: IndexMap<String, ContentSpec>,
    attributes: IndexMap<String, Vec<AttributeDef>>,
}

impl Dtd {
    /// The DTD a document declares, if it has a DOCTYPE.
    ///
    /// A DOCTYPE naming only an external subset cannot be validated and
    /// fails with `SchemaValidationFailed`.
    #[instrument(level = "debug", skip_all)]
    pub fn from_document(doc: &Document) -> Result<Option<Self>> {
        let Some(doctype) = &doc.doctype else {
            return Ok(None);
        };
        match (&doctype.internal_subset, &doctype.system_id) {
            (Some(subset), _) => Self::parse(&doctype.name, subset, doctype.line).map(Some),
            (None, Some(system_id)) => {
                warn!(system_id, "external DTD subsets are not loaded");
                Err(Error::with_message(
                    ErrorKind::SchemaValidationFailed,
                    Span::line(doctype.line),
                    format!("Could not load the external subset \"{system_id}\""),
                ))
            }
            (None, None) => Self::parse(&doctype.name, "", doctype.line).map(Some),
        }
    }

    /// Parse the declarations of an internal subset. `line` is the source
    /// line the subset starts on.
    pub fn parse(root: &str, subset: &str, line: u32) -> Result<Self> {
        let mut parser = SubsetParser {
            cursor: Cursor::new(subset.as_bytes()),
            base_line: line,
            entities: internal_entities(subset),
            dtd: Self {
                root: root.to_string(),
                elements: IndexMap::new(),
                attributes: IndexMap::new(),
            },
        };
        parser.parse()?;
        debug!(
            elements = parser.dtd.elements.len(),
            attlists = parser.dtd.attributes.len(),
            "parsed internal subset"
        );
        Ok(parser.dtd)
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn element(&self, name: &str) -> Option<&ContentSpec> {
        self.elements.get(name)
    }

    pub fn attributes(&self, element: &str) -> &[AttributeDef] {
        self.attributes.get(element).map_or(&[], Vec::as_slice)
    }
}

struct SubsetParser<'a> {
    cursor: Cursor<'a>,
    base_line: u32,
    entities: HashMap<String, String>,
    dtd: Dtd,
}

impl SubsetParser<'_> {
    fn error(&self, message: impl Into<String>) -> Error {
        let line = self.base_line + self.cursor.line().saturating_sub(1);
        Error::with_message(ErrorKind::InvalidSchema, Span::line(line), message)
    }

    fn parse(&mut self) -> Result<()> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.is_eof() {
                return Ok(());
            }
            if self.cursor.consume_bytes(b"<!--") {
                self.skip_past(b"-->")?;
            } else if self.cursor.consume_bytes(b"<?") {
                self.skip_past(b"?>")?;
            } else if self.cursor.consume_bytes(b"<!ELEMENT") {
                self.element_decl()?;
            } else if self.cursor.consume_bytes(b"<!ATTLIST") {
                self.attlist_decl()?;
            } else if self.cursor.consume_bytes(b"<!ENTITY") {
                self.cursor.skip_whitespace();
                if self.cursor.current() == Some(b'%') {
                    return Err(self.error("Parameter entities are not supported"));
                }
                self.skip_declaration()?;
            } else if self.cursor.consume_bytes(b"<!NOTATION") {
                self.skip_declaration()?;
            } else if self.cursor.current() == Some(b'%') {
                return Err(self.error("Parameter entities are not supported"));
            } else {
                return Err(self.error("Malformed declaration in the internal subset"));
            }
        }
    }

    fn skip_past(&mut self, end: &[u8]) -> Result<()> {
        while !self.cursor.is_eof() {
            if self.cursor.consume_bytes(end) {
                return Ok(());
            }
            self.cursor.advance();
        }
        Err(self.error("Unterminated construct in the internal subset"))
    }

    /// Skip to the closing `>` of a declaration, honouring quotes
    fn skip_declaration(&mut self) -> Result<()> {
        let mut quote = None;
        while let Some(b) = self.cursor.current() {
            self.cursor.advance();
            match (b, quote) {
                (b'>', None) => return Ok(()),
                (b'"' | b'\'', None) => quote = Some(b),
                (b, Some(q)) if b == q => quote = None,
                _ => {}
            }
        }
        Err(self.error("Unterminated declaration in the internal subset"))
    }

    fn name(&mut self) -> Result<String> {
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b.is_ascii_whitespace() || b"()|,?*+>\"'".contains(&b) {
                break;
            }
            self.cursor.advance();
        }
        let name = String::from_utf8_lossy(self.cursor.slice_from(start)).into_owned();
        if name.is_empty() {
            return Err(self.error("Name expected in the internal subset"));
        }
        Ok(name)
    }

    fn expect(&mut self, b: u8) -> Result<()> {
        self.cursor.skip_whitespace();
        if self.cursor.consume(b) {
            Ok(())
        } else {
            Err(self.error(format!("Expected '{}' in the internal subset", char::from(b))))
        }
    }

    fn element_decl(&mut self) -> Result<()> {
        self.cursor.skip_whitespace();
        let name = self.name()?;
        self.cursor.skip_whitespace();
        let spec = if self.cursor.consume_bytes(b"EMPTY") {
            ContentSpec::Empty
        } else if self.cursor.consume_bytes(b"ANY") {
            ContentSpec::Any
        } else {
            let start = self.cursor.pos();
            self.expect(b'(')?;
            self.cursor.skip_whitespace();
            if self.cursor.consume_bytes(b"#PCDATA") {
                self.mixed()?
            } else {
                let model = self.group()?;
                let raw = String::from_utf8_lossy(self.cursor.slice_from(start)).into_owned();
                ContentSpec::Children {
                    model,
                    source: raw.split_whitespace().collect::<Vec<_>>().join(""),
                }
            }
        };
        self.expect(b'>')?;
        if self.dtd.elements.contains_key(&name) {
            return Err(self.error(format!("Redefinition of element {name}")));
        }
        self.dtd.elements.insert(name, spec);
        Ok(())
    }

    /// Rest of `(#PCDATA ...)` after the keyword
    fn mixed(&mut self) -> Result<ContentSpec> {
        let mut names = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.consume(b')') {
                break;
            }
            self.expect(b'|')?;
            self.cursor.skip_whitespace();
            names.push(self.name()?);
        }
        if !self.cursor.consume(b'*') && !names.is_empty() {
            return Err(self.error("Mixed content with element names must end with ')*'"));
        }
        Ok(ContentSpec::Mixed(names))
    }

    /// A parenthesised group, opening paren already consumed
    fn group(&mut self) -> Result<Particle<String>> {
        let mut items = vec![self.content_particle()?];
        let mut separator = None;
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.consume(b')') {
                break;
            }
            let sep = match self.cursor.current() {
                Some(b @ (b',' | b'|')) => b,
                _ => return Err(self.error("Expected ',', '|' or ')' in content model")),
            };
            if separator.is_some_and(|existing| existing != sep) {
                return Err(self.error("Mixing ',' and '|' in one content model group"));
            }
            separator = Some(sep);
            self.cursor.advance();
            items.push(self.content_particle()?);
        }
        let group = if separator == Some(b'|') {
            Particle::Choice(items)
        } else {
            Particle::Sequence(items)
        };
        Ok(self.occurrence(group))
    }

    fn content_particle(&mut self) -> Result<Particle<String>> {
        self.cursor.skip_whitespace();
        if self.cursor.consume(b'(') {
            return self.group();
        }
        let name = self.name()?;
        Ok(self.occurrence(Particle::Term(name)))
    }

    fn occurrence(&mut self, particle: Particle<String>) -> Particle<String> {
        let (min, max) = match self.cursor.current() {
            Some(b'?') => (0, Some(1)),
            Some(b'*') => (0, None),
            Some(b'+') => (1, None),
            _ => return particle,
        };
        self.cursor.advance();
        particle.occurs(min, max)
    }

    fn attlist_decl(&mut self) -> Result<()> {
        self.cursor.skip_whitespace();
        let element = self.name()?;
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.consume(b'>') {
                return Ok(());
            }
            let name = self.name()?;
            self.cursor.skip_whitespace();
            let kind = self.attribute_type()?;
            self.cursor.skip_whitespace();
            let default = if self.cursor.consume_bytes(b"#REQUIRED") {
                AttributeDefault::Required
            } else if self.cursor.consume_bytes(b"#IMPLIED") {
                AttributeDefault::Implied
            } else if self.cursor.consume_bytes(b"#FIXED") {
                self.cursor.skip_whitespace();
                AttributeDefault::Fixed(self.literal()?)
            } else {
                AttributeDefault::Value(self.literal()?)
            };

            let defs = self.dtd.attributes.entry(element.clone()).or_default();
            // the first declaration of an attribute is binding
            if !defs.iter().any(|def| def.name == name) {
                defs.push(AttributeDef {
                    name,
                    kind,
                    default,
                });
            }
        }
    }

    fn attribute_type(&mut self) -> Result<AttributeType> {
        if self.cursor.current() == Some(b'(') {
            self.cursor.advance();
            return Ok(AttributeType::Enumeration(self.name_list()?));
        }
        let keyword = self.name()?;
        Ok(match keyword.as_str() {
            "CDATA" => AttributeType::Cdata,
            "ID" => AttributeType::Id,
            "IDREF" => AttributeType::IdRef,
            "IDREFS" => AttributeType::IdRefs,
            "ENTITY" => AttributeType::Entity,
            "ENTITIES" => AttributeType::Entities,
            "NMTOKEN" => AttributeType::NmToken,
            "NMTOKENS" => AttributeType::NmTokens,
            "NOTATION" => {
                self.expect(b'(')?;
                AttributeType::Notation(self.name_list()?)
            }
            other => return Err(self.error(format!("Unknown attribute type {other}"))),
        })
    }

    /// `a | b | c)` after the opening paren
    fn name_list(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        loop {
            self.cursor.skip_whitespace();
            names.push(self.name()?);
            self.cursor.skip_whitespace();
            if self.cursor.consume(b')') {
                return Ok(names);
            }
            self.expect(b'|')?;
        }
    }

    fn literal(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.error("Quoted default value expected")),
        };
        self.cursor.advance();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = String::from_utf8_lossy(self.cursor.slice_from(start)).into_owned();
                self.cursor.advance();
                return decode_entities(&raw, &self.entities).map_err(|message| self.error(message));
            }
            self.cursor.advance();
        }
        Err(self.error("Unterminated default value"))
    }
}

impl Validate<Document> for Dtd {
    fn check(&self, doc: &Document) -> Result<ValidationOutcome> {
        let mut run = Validation {
            dtd: self,
            doc,
            errors: Vec::new(),
            ids: HashSet::new(),
            references: Vec::new(),
        };
        if let Some(root) = doc.root_element() {
            let name = run.name(root);
            if name != self.root {
                run.report(
                    root,
                    format!(
                        "Not valid: root and DTD name do not match '{name}' and '{}'",
                        self.root
                    ),
                );
            }
            for node in std::iter::once(root).chain(doc.descendants(root)) {
                if doc.element(node).is_some() {
                    run.element(node);
                }
            }
            run.resolve_references();
        }
        Ok(ValidationOutcome::from_errors(run.errors))
    }
}

struct Validation<'a> {
    dtd: &'a Dtd,
    doc: &'a Document,
    errors: Vec<ValidationError>,
    ids: HashSet<String>,
    /// IDREF values with the element and attribute that used them
    references: Vec<(NodeId, String, String)>,
}

impl Validation<'_> {
    fn report(&mut self, node: NodeId, message: String) {
        let line = self.doc.node(node).line;
        self.errors
            .push(ValidationError::new(element_path(self.doc, node), message).at_line(line));
    }

    fn name(&self, node: NodeId) -> String {
        self.doc
            .element(node)
            .map(|element| element.name.to_string())
            .unwrap_or_default()
    }

    fn element(&mut self, node: NodeId) {
        let dtd = self.dtd;
        let name = self.name(node);
        let Some(spec) = dtd.elements.get(&name) else {
            self.report(node, format!("No declaration for element {name}"));
            return;
        };
        self.attributes(node, &name);

        let doc = self.doc;
        let children: Vec<String> = doc.child_elements(node).map(|child| self.name(child)).collect();
        let has_text = doc.children(node).iter().any(|child| {
            matches!(&doc.node(*child).kind,
                NodeKind::Text(text) | NodeKind::CData(text) if !text.trim().is_empty())
        });

        match spec {
            ContentSpec::Any => {}
            ContentSpec::Empty => {
                let has_content = doc.children(node).iter().any(|child| {
                    !matches!(doc.node(*child).kind, NodeKind::Comment(_) | NodeKind::ProcessingInstruction { .. })
                });
                if has_content {
                    self.report(
                        node,
                        format!("Element {name} was declared EMPTY this one has content"),
                    );
                }
            }
            ContentSpec::Mixed(allowed) => {
                for child in children.iter().filter(|child| !allowed.contains(child)) {
                    self.report(
                        node,
                        format!("Element {child} is not declared in {name} list of possible children"),
                    );
                }
            }
            ContentSpec::Children { model, source } => {
                if has_text {
                    self.report(
                        node,
                        format!("Element {name} content does not follow the DTD, text is not allowed"),
                    );
                } else if model.check(&children).is_err() {
                    let got: String = children.iter().map(|child| format!("{child} ")).collect();
                    self.report(
                        node,
                        format!("Element {name} content does not follow the DTD, expecting {source}, got ({got})"),
                    );
                }
            }
        }
    }

    fn attributes(&mut self, node: NodeId, name: &str) {
        let (dtd, doc) = (self.dtd, self.doc);
        let Some(element) = doc.element(node) else {
            return;
        };
        let defs = dtd.attributes(name);
        let mut messages = Vec::new();

        for attribute in &element.attributes {
            let attr_name = attribute.name.to_string();
            let Some(def) = defs.iter().find(|def| def.name == attr_name) else {
                messages.push(format!("No declaration for attribute {attr_name} of element {name}"));
                continue;
            };
            let value = match def.kind {
                AttributeType::Cdata => attribute.value.clone(),
                _ => attribute.value.split_whitespace().collect::<Vec<_>>().join(" "),
            };
            if let AttributeDefault::Fixed(fixed) = &def.default {
                if *fixed != value {
                    messages.push(format!(
                        "Value for attribute {attr_name} of {name} is different from default \"{fixed}\""
                    ));
                }
            }
            if let Some(message) = self.check_value(node, def, &attr_name, name, &value) {
                messages.push(message);
            }
        }

        for def in defs {
            let present = element
                .attributes
                .iter()
                .any(|attribute| attribute.name.to_string() == def.name);
            if def.default == AttributeDefault::Required && !present {
                messages.push(format!("Element {name} does not carry attribute {}", def.name));
            }
        }
        for message in messages {
            self.report(node, message);
        }
    }

    fn check_value(
        &mut self,
        node: NodeId,
        def: &AttributeDef,
        attr_name: &str,
        element: &str,
        value: &str,
    ) -> Option<String> {
        let syntax = || Some(format!("Syntax of value for attribute {attr_name} of {element} is not valid"));
        let is_token = |token: &str| {
            !token.is_empty()
                && token
                    .chars()
                    .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '\u{B7}'))
        };
        match &def.kind {
            AttributeType::Cdata => None,
            AttributeType::Id => {
                if !is_name(value) {
                    return syntax();
                }
                if !self.ids.insert(value.to_string()) {
                    return Some(format!("ID {value} already defined"));
                }
                None
            }
            AttributeType::IdRef | AttributeType::Entity => {
                if !is_name(value) {
                    return syntax();
                }
                if def.kind == AttributeType::IdRef {
                    self.references
                        .push((node, attr_name.to_string(), value.to_string()));
                }
                None
            }
            AttributeType::IdRefs | AttributeType::Entities => {
                if value.is_empty() || !value.split(' ').all(is_name) {
                    return syntax();
                }
                if def.kind == AttributeType::IdRefs {
                    for token in value.split(' ') {
                        self.references
                            .push((node, attr_name.to_string(), token.to_string()));
                    }
                }
                None
            }
            AttributeType::NmToken => (!is_token(value)).then(syntax).flatten(),
            AttributeType::NmTokens => {
                (value.is_empty() || !value.split(' ').all(is_token)).then(syntax).flatten()
            }
            AttributeType::Enumeration(allowed) | AttributeType::Notation(allowed) => {
                (!allowed.iter().any(|v| v == value)).then(|| {
                    format!(
                        "Value \"{value}\" for attribute {attr_name} of {element} is not among the enumerated set"
                    )
                })
            }
        }
    }

    fn resolve_references(&mut self) {
        let references = std::mem::take(&mut self.references);
        for (node, attr_name, value) in references {
            if !self.ids.contains(&value) {
                self.report(
                    node,
                    format!("IDREF attribute {attr_name} references an unknown ID \"{value}\""),
                );
            }
        }
    }
}
