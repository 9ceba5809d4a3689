//! XML parser implementation
//!
//! Non-validating and whitespace preserving: every character between tags
//! becomes a text node. Well-formedness errors are fatal and reported with
//! the line they were detected on.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::warn;

use crate::error::{Error, ErrorKind, Result, Span};
use crate::lexer::Cursor;
use crate::xml::model::{Attribute, Declaration, Doctype, Document, Element, NodeId, NodeKind, QName};

/// Deepest element nesting accepted
pub const MAX_DEPTH: usize = 2048;

/// Start tag that has not been closed yet
#[derive(Debug)]
struct OpenTag {
    id: NodeId,
    name: String,
    line: u32,
}

/// XML parser
#[derive(Debug)]
pub struct Parser<'a> {
    cursor: Cursor<'a>,
    doc: Document,
    entities: HashMap<String, String>,
}

impl<'a> Parser<'a> {
    /// Create a new XML parser
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(input),
            doc: Document::new(),
            entities: HashMap::new(),
        }
    }

    /// Parse an XML document
    pub fn parse(&mut self) -> Result<Document> {
        self.cursor.consume_bytes(b"\xEF\xBB\xBF");
        if self.cursor.remaining().iter().all(|b| is_space(*b)) {
            return Err(self.error_here("Document is empty"));
        }

        if self.cursor.starts_with(b"<?xml") && self.cursor.peek(5).is_some_and(is_space) {
            self.parse_declaration()?;
        }

        self.parse_misc(true)?;
        if self.cursor.current() != Some(b'<') || self.cursor.peek(1) == Some(b'/') {
            return Err(self.error_here("Start tag expected, '<' not found"));
        }
        self.parse_root()?;
        self.parse_misc(false)?;

        if !self.cursor.is_eof() {
            return Err(self.error_here("Extra content at the end of the document"));
        }

        Ok(std::mem::take(&mut self.doc))
    }

    /// Comments, processing instructions and whitespace outside the root
    fn parse_misc(&mut self, before_root: bool) -> Result<()> {
        let document = self.doc.document_node();
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.starts_with(b"<!--") {
                self.parse_comment(document)?;
            } else if self.cursor.starts_with(b"<?") {
                self.parse_processing_instruction(document)?;
            } else if before_root && self.cursor.starts_with(b"<!DOCTYPE") {
                if self.doc.doctype.is_some() {
                    return Err(self.error_here("Extra content at the end of the document"));
                }
                self.parse_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_root(&mut self) -> Result<()> {
        let mut open: Vec<OpenTag> = Vec::new();
        loop {
            let parent = open.last().map_or(self.doc.document_node(), |tag| tag.id);

            let Some(byte) = self.cursor.current() else {
                return Err(match open.last() {
                    Some(tag) => self.error_here(&format!(
                        "Premature end of data in tag {} line {}",
                        tag.name, tag.line
                    )),
                    None => self.error_here("Start tag expected, '<' not found"),
                });
            };

            if byte != b'<' {
                self.parse_text(parent)?;
                continue;
            }

            if self.cursor.starts_with(b"</") {
                self.parse_end_tag(&mut open)?;
                if open.is_empty() {
                    return Ok(());
                }
            } else if self.cursor.starts_with(b"<!--") {
                self.parse_comment(parent)?;
            } else if self.cursor.starts_with(b"<![CDATA[") {
                self.parse_cdata(parent)?;
            } else if self.cursor.starts_with(b"<?") {
                self.parse_processing_instruction(parent)?;
            } else if self.cursor.peek(1) == Some(b'!') {
                return Err(self.error_here("StartTag: invalid element name"));
            } else {
                if open.len() >= MAX_DEPTH {
                    return Err(self.error_here(&format!(
                        "Excessive depth in document: {MAX_DEPTH} use XML_PARSE_HUGE option"
                    )));
                }
                let (tag, self_closing) = self.parse_start_tag(parent)?;
                if !self_closing {
                    open.push(tag);
                } else if open.is_empty() {
                    return Ok(());
                }
            }
        }
    }

    fn parse_start_tag(&mut self, parent: NodeId) -> Result<(OpenTag, bool)> {
        let line = self.cursor.line();
        self.cursor.advance();
        let name = self
            .parse_name()
            .map_err(|_| self.error_here("StartTag: invalid element name"))?;

        let mut raw_attributes: Vec<(String, String)> = Vec::new();
        let mut declarations = IndexMap::new();
        let self_closing = loop {
            let had_space = self.skip_space();
            match self.cursor.current() {
                Some(b'>') => {
                    self.cursor.advance();
                    break false;
                }
                Some(b'/') => {
                    self.cursor.advance();
                    if !self.cursor.consume(b'>') {
                        return Err(self.unterminated_start_tag(&name, line));
                    }
                    break true;
                }
                None => return Err(self.unterminated_start_tag(&name, line)),
                Some(_) if !had_space => {
                    return Err(self.error_here("attributes construct error"));
                }
                Some(_) => {}
            }

            let attr_name = self
                .parse_name()
                .map_err(|_| self.unterminated_start_tag(&name, line))?;
            self.skip_space();
            if !self.cursor.consume(b'=') {
                return Err(self.error_here(&format!(
                    "Specification mandates value for attribute {attr_name}"
                )));
            }
            self.skip_space();
            let value = self.parse_attribute_value()?;

            if attr_name == "xmlns" || attr_name.starts_with("xmlns:") {
                let prefix = attr_name.strip_prefix("xmlns:").unwrap_or_default().to_string();
                if declarations.insert(prefix, value).is_some() {
                    return Err(self.error_here(&format!("Attribute {attr_name} redefined")));
                }
                continue;
            }
            if raw_attributes.iter().any(|(existing, _)| *existing == attr_name) {
                return Err(self.error_here(&format!("Attribute {attr_name} redefined")));
            }
            raw_attributes.push((attr_name, value));
        };

        let qname = QName::parse(&name);
        let id = self.doc.append(
            parent,
            NodeKind::Element(Element {
                name: qname.clone(),
                namespace: None,
                attributes: Vec::new(),
                declarations,
            }),
            line,
        );

        let namespace = self.resolve(id, qname.prefix.as_deref().unwrap_or_default(), &name);
        let attributes = raw_attributes
            .into_iter()
            .map(|(raw, value)| {
                let attr_name = QName::parse(&raw);
                let namespace = attr_name
                    .prefix
                    .as_deref()
                    .and_then(|prefix| self.resolve(id, prefix, &raw));
                Attribute {
                    name: attr_name,
                    namespace,
                    value,
                }
            })
            .collect();

        if let Some(NodeKind::Element(element)) = self.doc.node_mut(id).map(|node| &mut node.kind) {
            element.namespace = namespace;
            element.attributes = attributes;
        }

        Ok((OpenTag { id, name, line }, self_closing))
    }

    fn resolve(&self, id: NodeId, prefix: &str, name: &str) -> Option<String> {
        let uri = self.doc.lookup_namespace_uri(id, prefix).map(str::to_string);
        if uri.is_none() && !prefix.is_empty() {
            warn!(prefix, name, "namespace prefix is not defined");
        }
        uri
    }

    fn parse_end_tag(&mut self, open: &mut Vec<OpenTag>) -> Result<()> {
        self.cursor.advance_by(2);
        let name = self
            .parse_name()
            .map_err(|_| self.error_here("expected '>'"))?;
        self.skip_space();
        if !self.cursor.consume(b'>') {
            return Err(self.error_here("expected '>'"));
        }
        match open.pop() {
            Some(tag) if tag.name == name => Ok(()),
            Some(tag) => Err(self.error_here(&format!(
                "Opening and ending tag mismatch: {} line {} and {name}",
                tag.name, tag.line
            ))),
            None => Err(self.error_here("Extra content at the end of the document")),
        }
    }

    fn unterminated_start_tag(&self, name: &str, line: u32) -> Error {
        self.error_here(&format!("Couldn't find end of Start Tag {name} line {line}"))
    }

    fn parse_attribute_value(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(b'"') => b'"',
            Some(b'\'') => b'\'',
            _ => return Err(self.error_here("AttValue: \" or ' expected")),
        };
        self.cursor.advance();

        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let raw = self.cursor.slice_from(start);
                let text = self.utf8(raw)?;
                self.cursor.advance();
                let normalized: String = text
                    .chars()
                    .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
                    .collect();
                return self.decode(&normalized);
            }
            if b == b'<' {
                return Err(self.error_here("Unescaped '<' not allowed in attributes values"));
            }
            self.cursor.advance();
        }

        Err(self.error_here("AttValue: ' expected"))
    }

    fn parse_text(&mut self, parent: NodeId) -> Result<()> {
        let line = self.cursor.line();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == b'<' {
                break;
            }
            if self.cursor.starts_with(b"]]>") {
                return Err(self.error_here("Sequence ']]>' not allowed in content"));
            }
            self.cursor.advance();
        }

        let raw = self.cursor.slice_from(start);
        let text = self.utf8(raw)?;
        let text = self.decode(text)?;
        self.doc.append(parent, NodeKind::Text(text), line);
        Ok(())
    }

    fn parse_cdata(&mut self, parent: NodeId) -> Result<()> {
        let line = self.cursor.line();
        self.cursor.advance_by(b"<![CDATA[".len());
        let text = self
            .take_until(b"]]>")
            .ok_or_else(|| self.error_here("CData section not finished"))?;
        let text = self.utf8(text)?.to_string();
        self.doc.append(parent, NodeKind::CData(text), line);
        Ok(())
    }

    fn parse_comment(&mut self, parent: NodeId) -> Result<()> {
        let line = self.cursor.line();
        self.cursor.advance_by(b"<!--".len());
        let text = self
            .take_until(b"-->")
            .ok_or_else(|| self.error_here("Comment not terminated"))?;
        let text = self.utf8(text)?.to_string();
        self.doc.append(parent, NodeKind::Comment(text), line);
        Ok(())
    }

    fn parse_processing_instruction(&mut self, parent: NodeId) -> Result<()> {
        let line = self.cursor.line();
        self.cursor.advance_by(2);
        let target = self
            .parse_name()
            .map_err(|_| self.error_here("xmlParsePI : no target name"))?;
        if target.eq_ignore_ascii_case("xml") {
            return Err(self.error_here(
                "XML declaration allowed only at the start of the document",
            ));
        }
        self.skip_space();
        let data = self
            .take_until(b"?>")
            .ok_or_else(|| self.error_here(&format!("PI {target} never end ...")))?;
        let data = self.utf8(data)?.to_string();
        self.doc
            .append(parent, NodeKind::ProcessingInstruction { target, data }, line);
        Ok(())
    }

    fn parse_declaration(&mut self) -> Result<()> {
        self.cursor.advance_by(b"<?xml".len());
        let mut pseudo = IndexMap::new();
        loop {
            self.skip_space();
            if self.cursor.consume_bytes(b"?>") {
                break;
            }
            if self.cursor.is_eof() {
                return Err(self.error_here("parsing XML declaration: '?>' expected"));
            }
            let name = self
                .parse_name()
                .map_err(|_| self.error_here("parsing XML declaration: '?>' expected"))?;
            self.skip_space();
            if !self.cursor.consume(b'=') {
                return Err(self.error_here("Blank needed here"));
            }
            self.skip_space();
            let value = self.parse_attribute_value()?;
            pseudo.insert(name, value);
        }

        let Some(version) = pseudo.get("version").cloned() else {
            return Err(self.error_here("Malformed declaration expecting version"));
        };
        self.doc.declaration = Some(Declaration {
            version,
            encoding: pseudo.get("encoding").cloned(),
            standalone: pseudo.get("standalone").cloned(),
        });
        Ok(())
    }

    fn parse_doctype(&mut self) -> Result<()> {
        let line = self.cursor.line();
        self.cursor.advance_by(b"<!DOCTYPE".len());
        if !self.skip_space() {
            return Err(self.error_here("Space required after '<!DOCTYPE'"));
        }
        let name = self
            .parse_name()
            .map_err(|_| self.error_here("xmlParseDocTypeDecl : no DOCTYPE name !"))?;
        self.skip_space();

        let mut public_id = None;
        let mut system_id = None;
        if self.cursor.consume_bytes(b"SYSTEM") {
            self.skip_space();
            system_id = Some(self.parse_literal()?);
        } else if self.cursor.consume_bytes(b"PUBLIC") {
            self.skip_space();
            public_id = Some(self.parse_literal()?);
            self.skip_space();
            system_id = Some(self.parse_literal()?);
        }
        self.skip_space();

        let mut internal_subset = None;
        if self.cursor.consume(b'[') {
            let start = self.cursor.pos();
            let mut quote: Option<u8> = None;
            loop {
                match (self.cursor.current(), quote) {
                    (None, _) => return Err(self.error_here("DOCTYPE improperly terminated")),
                    (Some(b), Some(q)) if b == q => quote = None,
                    (Some(_), Some(_)) => {}
                    (Some(b'"' | b'\''), None) => quote = self.cursor.current(),
                    (Some(b']'), None) => break,
                    (Some(_), None) if self.cursor.starts_with(b"<!--") => {
                        self.cursor.advance_by(4);
                        self.take_until(b"-->")
                            .ok_or_else(|| self.error_here("Comment not terminated"))?;
                        continue;
                    }
                    (Some(_), None) => {}
                }
                self.cursor.advance();
            }
            let subset = self.utf8(self.cursor.slice_from(start))?.to_string();
            self.cursor.advance();
            self.skip_space();
            self.entities = internal_entities(&subset);
            internal_subset = Some(subset);
        }

        if !self.cursor.consume(b'>') {
            return Err(self.error_here("DOCTYPE improperly terminated"));
        }

        self.doc.doctype = Some(Doctype {
            name,
            public_id,
            system_id,
            internal_subset,
            line,
        });
        Ok(())
    }

    fn parse_literal(&mut self) -> Result<String> {
        let quote = match self.cursor.current() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return Err(self.error_here("SystemLiteral \" or ' expected")),
        };
        self.cursor.advance();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if b == quote {
                let literal = self.utf8(self.cursor.slice_from(start))?.to_string();
                self.cursor.advance();
                return Ok(literal);
            }
            self.cursor.advance();
        }
        Err(self.error_here("Unfinished System or Public ID \" or ' expected"))
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.cursor.pos();

        let Some(first) = self.cursor.current() else {
            return Err(self.error_here("expected name"));
        };
        if !is_name_start(first) {
            return Err(self.error_here("expected name"));
        }

        self.cursor.advance();
        while let Some(b) = self.cursor.current() {
            if is_name_char(b) {
                self.cursor.advance();
            } else {
                break;
            }
        }

        let raw = self.cursor.slice_from(start);
        self.utf8(raw).map(str::to_string)
    }

    /// Consume through `pattern`, returning the bytes before it
    fn take_until(&mut self, pattern: &[u8]) -> Option<&'a [u8]> {
        let start = self.cursor.pos();
        while !self.cursor.is_eof() {
            if self.cursor.starts_with(pattern) {
                let content = self.cursor.slice_from(start);
                self.cursor.advance_by(pattern.len());
                return Some(content);
            }
            self.cursor.advance();
        }
        None
    }

    /// Skip whitespace, reporting whether any was present
    fn skip_space(&mut self) -> bool {
        let start = self.cursor.pos();
        self.cursor.skip_whitespace();
        self.cursor.pos() != start
    }

    fn utf8(&self, bytes: &'a [u8]) -> Result<&'a str> {
        std::str::from_utf8(bytes)
            .map_err(|_| self.error_here("Input is not proper UTF-8, indicate encoding !"))
    }

    fn decode(&self, input: &str) -> Result<String> {
        decode_entities(input, &self.entities).map_err(|message| self.error_here(&message))
    }

    fn error_here(&self, message: &str) -> Error {
        let pos = self.cursor.position();
        Error::with_message(ErrorKind::MalformedXml, Span::new(pos, pos), message)
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_name_start(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || matches!(b, b'0'..=b'9' | b'-' | b'.')
}

/// General entities declared as `<!ENTITY name "value">` in an internal subset
pub(crate) fn internal_entities(subset: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    let mut rest = subset;
    while let Some(at) = rest.find("<!ENTITY") {
        rest = rest.get(at + "<!ENTITY".len()..).unwrap_or_default();
        let decl = rest.trim_start();
        if decl.starts_with('%') {
            continue;
        }
        let name: String = decl
            .chars()
            .take_while(|c| !c.is_whitespace())
            .collect();
        let after_name = decl.get(name.len()..).unwrap_or_default().trim_start();
        let Some(quote) = after_name.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let body = after_name.get(1..).unwrap_or_default();
        if let Some(end) = body.find(quote) {
            let value = body.get(..end).unwrap_or_default();
            let value = decode_entities(value, &HashMap::new()).unwrap_or_else(|_| value.to_string());
            entities.entry(name).or_insert(value);
        }
    }
    entities
}

/// Expand predefined, numeric and declared entity references
pub(crate) fn decode_entities(
    input: &str,
    entities: &HashMap<String, String>,
) -> std::result::Result<String, String> {
    if !input.contains('&') {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '&' {
            result.push(ch);
            continue;
        }

        let mut entity = String::new();
        let mut terminated = false;
        for next in chars.by_ref() {
            if next == ';' {
                terminated = true;
                break;
            }
            entity.push(next);
            if next.is_whitespace() || next == '&' || next == '<' {
                break;
            }
        }
        if !terminated {
            return Err("EntityRef: expecting ';'".to_string());
        }

        match entity.as_str() {
            "amp" => result.push('&'),
            "lt" => result.push('<'),
            "gt" => result.push('>'),
            "quot" => result.push('"'),
            "apos" => result.push('\''),
            numeric if numeric.starts_with('#') => match decode_numeric_entity(numeric) {
                Some(ch) => result.push(ch),
                None => return Err(format!("CharRef: invalid xmlChar value {numeric}")),
            },
            "" => return Err("xmlParseEntityRef: no name".to_string()),
            name => match entities.get(name) {
                Some(value) => result.push_str(value),
                None => return Err(format!("Entity '{name}' not defined")),
            },
        }
    }

    Ok(result)
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    let value = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else {
        entity.strip_prefix('#').and_then(|dec| dec.parse::<u32>().ok())
    };
    value.filter(|v| *v != 0).and_then(char::from_u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Document> {
        Parser::new(input.as_bytes()).parse()
    }

    fn root_name(doc: &Document) -> Option<String> {
        doc.root_element()
            .and_then(|id| doc.element(id))
            .map(|element| element.name.to_string())
    }

    #[test]
    fn test_parse_simple_element() -> Result<()> {
        let doc = parse("<root></root>")?;
        assert_eq!(root_name(&doc).as_deref(), Some("root"));
        let root = doc.root_element().ok_or_else(|| Error::msg(ErrorKind::MalformedXml, "no root"))?;
        assert!(doc.children(root).is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_with_attributes() -> Result<()> {
        let doc = parse("<root id=\"1\" name='test' note=\"a&amp;b\"></root>")?;
        let root = doc.root_element().and_then(|id| doc.element(id));
        assert_eq!(root.and_then(|e| e.attribute("id")), Some("1"));
        assert_eq!(root.and_then(|e| e.attribute("name")), Some("test"));
        assert_eq!(root.and_then(|e| e.attribute("note")), Some("a&b"));
        Ok(())
    }

    #[test]
    fn test_whitespace_is_preserved() -> Result<()> {
        let doc = parse("<root>\n  <child>text</child>\n</root>")?;
        let root = doc.root_element().ok_or_else(|| Error::msg(ErrorKind::MalformedXml, "no root"))?;
        assert_eq!(doc.children(root).len(), 3);
        assert_eq!(doc.string_value(root), "\n  text\n");
        Ok(())
    }

    #[test]
    fn test_line_numbers() -> Result<()> {
        let doc = parse("<?xml version=\"1.0\"?>\n<root>\n<a/>\n</root>")?;
        let root = doc.root_element().ok_or_else(|| Error::msg(ErrorKind::MalformedXml, "no root"))?;
        let child = doc.child_elements(root).next();
        assert_eq!(child.map(|id| doc.node(id).line), Some(3));
        assert_eq!(doc.declaration.as_ref().map(|d| d.version.as_str()), Some("1.0"));
        Ok(())
    }

    #[test]
    fn test_namespaces_resolved() -> Result<()> {
        let doc = parse(r#"<a xmlns="urn:d" xmlns:p="urn:p"><p:b p:x="1"/><c xmlns=""/></a>"#)?;
        let root = doc.root_element().ok_or_else(|| Error::msg(ErrorKind::MalformedXml, "no root"))?;
        let children: Vec<_> = doc.child_elements(root).collect();
        let namespaces: Vec<_> = children
            .iter()
            .filter_map(|id| doc.element(*id))
            .map(|e| e.namespace.clone())
            .collect();
        assert_eq!(doc.element(root).and_then(|e| e.namespace.clone()).as_deref(), Some("urn:d"));
        assert_eq!(namespaces, vec![Some("urn:p".to_string()), None]);
        let attr_ns = children
            .first()
            .and_then(|id| doc.element(*id))
            .and_then(|e| e.attribute_ns(Some("urn:p"), "x"));
        assert_eq!(attr_ns, Some("1"));
        Ok(())
    }

    #[test]
    fn test_cdata_comment_pi() -> Result<()> {
        let doc = parse("<!-- lead --><r><![CDATA[<x>]]><!--c--><?pi data?></r>")?;
        let root = doc.root_element().ok_or_else(|| Error::msg(ErrorKind::MalformedXml, "no root"))?;
        assert_eq!(doc.children(root).len(), 3);
        assert_eq!(doc.string_value(root), "<x>");
        assert_eq!(doc.children(doc.document_node()).len(), 2);
        Ok(())
    }

    #[test]
    fn test_doctype_and_internal_entities() -> Result<()> {
        let doc = parse("<!DOCTYPE r [<!ENTITY who \"world\"><!ELEMENT r (#PCDATA)>]><r>hello &who;</r>")?;
        let root = doc.root_element().ok_or_else(|| Error::msg(ErrorKind::MalformedXml, "no root"))?;
        assert_eq!(doc.string_value(root), "hello world");
        assert_eq!(doc.doctype.as_ref().map(|d| d.name.as_str()), Some("r"));
        Ok(())
    }

    #[test]
    fn test_mismatched_tag() {
        let err = parse("<a>\n<b></c></a>").err();
        assert_eq!(
            err.as_ref().map(Error::message),
            Some("Opening and ending tag mismatch: b line 2 and c")
        );
        assert_eq!(err.and_then(|e| e.line()), Some(2));
    }

    #[test]
    fn test_unterminated() {
        let err = parse("<a><b>text</b>").err();
        assert_eq!(
            err.as_ref().map(Error::message),
            Some("Premature end of data in tag a line 1")
        );
        assert_eq!(err.map(|e| e.kind().clone()), Some(ErrorKind::MalformedXml));
    }

    fn nested(levels: usize) -> String {
        format!("{}{}", "<a>".repeat(levels), "</a>".repeat(levels))
    }

    #[test]
    fn test_depth_limit() {
        assert!(parse(&nested(MAX_DEPTH)).is_ok());
        let open = "<a>".repeat(MAX_DEPTH - 1);
        let close = "</a>".repeat(MAX_DEPTH - 1);
        assert!(parse(&format!("{open}<b/>{close}")).is_ok());

        let err = parse(&nested(MAX_DEPTH + 1)).err();
        assert_eq!(
            err.as_ref().map(Error::message),
            Some("Excessive depth in document: 2048 use XML_PARSE_HUGE option")
        );
        assert_eq!(err.map(|e| e.kind().clone()), Some(ErrorKind::MalformedXml));
    }

    #[test]
    fn test_document_errors() {
        let message = |input: &str| parse(input).err().map(|e| e.message().to_string());
        assert_eq!(message("   ").as_deref(), Some("Document is empty"));
        assert_eq!(message("hello").as_deref(), Some("Start tag expected, '<' not found"));
        assert_eq!(
            message("<a/><b/>").as_deref(),
            Some("Extra content at the end of the document")
        );
        assert_eq!(message("<a x='1' x='2'/>").as_deref(), Some("Attribute x redefined"));
        assert_eq!(message("<a>&bogus;</a>").as_deref(), Some("Entity 'bogus' not defined"));
        assert_eq!(message("<a>&amp</a>").as_deref(), Some("EntityRef: expecting ';'"));
    }

    #[test]
    fn test_decode_numeric_entities() {
        let decoded = decode_entities("&#65;&#x42;", &HashMap::new());
        assert_eq!(decoded.as_deref(), Ok("AB"));
    }
}
