//! Parsed XML response body

use std::fmt;
use std::str::FromStr;

use tracing::{debug, instrument};

use crate::error::Result;
use crate::schema::{Dtd, RelaxNgSchema, Validate, XsdSchema};
use crate::xml::encoding;
use crate::xml::model::Document;
use crate::xml::namespace::{has_default_namespace, NamespaceMap, DEFAULT_PREFIX};
use crate::xml::parser::Parser;
use crate::xml::serialize;
use crate::xpath::{Context, NodeSet, XPath, XPathValue};

/// An XML document with namespace-aware querying and grammar validation
#[derive(Clone, Debug, PartialEq)]
pub struct XmlDocument {
    document: Document,
}

impl XmlDocument {
    /// Parse `text`; whitespace is preserved and no grammar is applied
    #[instrument(level = "debug", skip_all, fields(len = text.len()))]
    pub fn parse(text: &str) -> Result<Self> {
        let document = Parser::new(text.as_bytes()).parse()?;
        Ok(Self { document })
    }

    /// Parse a raw body, transcoding it to UTF-8 by its byte order mark or
    /// declared encoding
    #[instrument(level = "debug", skip_all, fields(len = bytes.len()))]
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        let input = encoding::transcode(bytes)?;
        let document = Parser::new(&input).parse()?;
        Ok(Self { document })
    }

    pub const fn from_document(document: Document) -> Self {
        Self { document }
    }

    pub const fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Formatted text with an XML declaration line
    pub fn serialize(&self) -> String {
        serialize::to_string_pretty(&self.document)
    }

    /// Every namespace declared from the root down
    pub fn namespaces(&self) -> NamespaceMap {
        NamespaceMap::from_document(&self.document)
    }

    pub fn has_default_namespace(&self) -> bool {
        has_default_namespace(&self.document)
    }

    /// Run `expression` and return the selected nodes; a rejected
    /// expression selects nothing
    pub fn query(&self, expression: &str) -> NodeSet<'_> {
        match self.try_query(expression) {
            Ok(nodes) => nodes,
            Err(err) => {
                debug!(expression, error = %err, "xpath query rejected");
                NodeSet::empty(&self.document)
            }
        }
    }

    /// Like [`query`](Self::query) but reports rejected expressions
    pub fn try_query(&self, expression: &str) -> Result<NodeSet<'_>> {
        let (xpath, context) = self.prepare(expression)?;
        context.select(&xpath)
    }

    /// Evaluate `expression` to any XPath value
    pub fn evaluate(&self, expression: &str) -> Result<XPathValue<'_>> {
        let (xpath, context) = self.prepare(expression)?;
        context.evaluate(&xpath)
    }

    /// Compile `expression` against this document's namespaces
    fn prepare(&self, expression: &str) -> Result<(XPath, Context<'_>)> {
        let mut xpath = XPath::compile(expression)?;
        let mut context = Context::new(&self.document);

        let namespaces = self.namespaces();
        if namespaces.is_empty() {
            return Ok((xpath, context));
        }

        let has_default = self.has_default_namespace();
        if has_default {
            xpath.qualify_default_namespace(DEFAULT_PREFIX);
            debug!(expression, rewritten = %xpath, "qualified default namespace");
        }
        for (prefix, uri) in namespaces.registrations(has_default) {
            context.register_namespace(prefix, uri);
        }
        Ok((xpath, context))
    }

    /// Validate against the internal DTD subset; a document without a
    /// DOCTYPE passes
    #[instrument(level = "debug", skip_all)]
    pub fn validate(&self) -> Result<()> {
        match Dtd::from_document(&self.document)? {
            Some(dtd) => dtd.check(&self.document)?.into_result(),
            None => Ok(()),
        }
    }

    /// Validate against an XML Schema given as text
    #[instrument(level = "debug", skip_all)]
    pub fn validate_xsd(&self, schema: &str) -> Result<()> {
        XsdSchema::parse(schema)?.check(&self.document)?.into_result()
    }

    /// Validate against a RelaxNG grammar in XML syntax
    #[instrument(level = "debug", skip_all)]
    pub fn validate_relax_ng(&self, schema: &str) -> Result<()> {
        RelaxNgSchema::parse(schema)?
            .check(&self.document)?
            .into_result()
    }
}

impl FromStr for XmlDocument {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:m="urn:meta">
  <title>News</title>
  <entry m:id="1"><title>First</title><m:tag>a</m:tag></entry>
  <entry m:id="2"><title>Second</title><m:tag>b</m:tag></entry>
</feed>"#;

    #[test]
    fn test_bare_names_match_default_namespace() -> Result<()> {
        let doc = XmlDocument::parse(FEED)?;
        assert!(doc.has_default_namespace());
        assert_eq!(
            doc.query("/feed/entry/title").string_values(),
            vec!["First", "Second"]
        );
        assert_eq!(
            doc.query("//entry[title = 'Second']/m:tag").string_values(),
            vec!["b"]
        );
        assert_eq!(doc.query("//entry/@m:id").string_values(), vec!["1", "2"]);
        Ok(())
    }

    #[test]
    fn test_explicit_default_prefix() -> Result<()> {
        let doc = XmlDocument::parse(FEED)?;
        assert_eq!(doc.query("/rootns:feed/rootns:title").len(), 1);
        Ok(())
    }

    #[test]
    fn test_no_namespaces_runs_unmodified() -> Result<()> {
        let doc = XmlDocument::parse("<a><b>1</b></a>")?;
        assert!(!doc.has_default_namespace());
        assert_eq!(doc.query("/a/b").string_values(), vec!["1"]);
        Ok(())
    }

    #[test]
    fn test_default_uri_also_bound_to_prefix() -> Result<()> {
        let doc = XmlDocument::parse(r#"<a xmlns="urn:x" xmlns:x="urn:x"><b/></a>"#)?;
        assert!(!doc.has_default_namespace());
        assert_eq!(doc.query("/x:a/x:b").len(), 1);
        assert!(doc.query("/a/b").is_empty());
        Ok(())
    }

    #[test]
    fn test_rejected_queries() -> Result<()> {
        let doc = XmlDocument::parse(FEED)?;
        assert!(doc.query("//entry[").is_empty());
        assert!(doc.query("//zz:entry").is_empty());
        let err = doc.try_query("//zz:entry").err();
        assert!(matches!(
            err.as_ref().map(crate::error::Error::kind),
            Some(ErrorKind::InvalidXPath { .. })
        ));
        assert!(doc.try_query("count(//entry)").is_err());
        assert_eq!(
            doc.evaluate("count(//entry)")?,
            XPathValue::Number(2.0)
        );
        Ok(())
    }

    #[test]
    fn test_validate_without_doctype_passes() -> Result<()> {
        XmlDocument::parse("<a/>")?.validate()
    }

    #[test]
    fn test_display_serializes() -> Result<()> {
        let doc: XmlDocument = "<a><b/></a>".parse()?;
        assert_eq!(doc.to_string(), "<?xml version=\"1.0\"?>\n<a>\n  <b/>\n</a>\n");
        Ok(())
    }

    #[test]
    fn test_parse_bytes_follows_declared_encoding() -> Result<()> {
        let latin1 = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>\xe9</a>";
        let doc = XmlDocument::parse_bytes(latin1)?;
        assert_eq!(doc.query("/a").string_values(), vec!["\u{e9}"]);

        let err = XmlDocument::parse_bytes(b"<a>\xe9</a>").err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("Input is not proper UTF-8, indicate encoding ! at line 1")
        );
        Ok(())
    }
}
