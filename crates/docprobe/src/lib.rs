//! docprobe - inspect and validate JSON/XML HTTP response bodies
//!
//! Test scenarios hand a response body to [`JsonDocument`] or
//! [`XmlDocument`], then read a value by path, query with XPath, or check
//! the whole document against a grammar.
//!
//! # Quick Start
//!
//! ```
//! use docprobe::{EvaluationMode, Inspector, JsonDocument, XmlDocument};
//! # fn main() -> Result<(), docprobe::Error> {
//! let json = JsonDocument::parse(r#"{"status": "ok", "items": [1, 2, 3]}"#)?;
//! assert_eq!(json.read("root.items[2]")?, &serde_json::json!(3));
//!
//! let inspector = Inspector::new(EvaluationMode::Javascript);
//! assert_eq!(inspector.evaluate(&json, "root->status")?, "ok");
//!
//! let xml = XmlDocument::parse(r#"<a xmlns="ns1"><b>hi</b></a>"#)?;
//! assert_eq!(xml.query("/a/b/text()").string_values(), vec!["hi"]);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, ErrorKind, Pos, Result, Span};

pub mod config;
pub use config::{Config, EvaluationMode};

pub mod lexer;

pub mod json;
pub use json::{Inspector, JsonDocument};

pub mod xml;
pub use xml::{NamespaceMap, XmlDocument};

pub mod xpath;
pub use xpath::{NodeSet, XPath, XPathValue};

pub mod schema;
pub use schema::{
    Dtd, JsonSchema, RelaxNgSchema, SchemaRegistry, Validate, ValidationError,
    ValidationOutcome, XsdSchema,
};

pub mod http;
pub use http::{curl_command, CallResult, Headers, HttpExchange, RecordedExchange};

pub mod assert;
pub use assert::{JsonAssertions, ResponseAssertions, XmlAssertions};

/// Parse a JSON body
pub fn from_json_str(text: &str) -> Result<JsonDocument> {
    JsonDocument::parse(text)
}

/// Parse an XML body
pub fn from_xml_str(text: &str) -> Result<XmlDocument> {
    XmlDocument::parse(text)
}

/// Parse an XML body given as bytes
pub fn from_xml_bytes(bytes: &[u8]) -> Result<XmlDocument> {
    XmlDocument::parse_bytes(bytes)
}
