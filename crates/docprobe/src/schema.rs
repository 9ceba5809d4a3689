//! Grammar validation for JSON and XML documents
//!
//! Every grammar implements [`Validate`] and reports a
//! [`ValidationOutcome`]. Compiling a grammar that is malformed or uses an
//! unsupported construct fails with [`ErrorKind::InvalidSchema`].
//!
//! [`ErrorKind::InvalidSchema`]: crate::error::ErrorKind::InvalidSchema

pub mod content;
pub mod datatype;
pub mod dtd;
pub mod json;
pub mod outcome;
pub mod relaxng;
pub mod xsd;

pub use dtd::Dtd;
pub use json::{JsonSchema, SchemaRegistry};
pub use outcome::{ValidationError, ValidationOutcome};
pub use relaxng::RelaxNgSchema;
pub use xsd::XsdSchema;

use crate::error::{Error, ErrorKind, Result};
use crate::xml::model::{Document, NodeId};
use crate::xml::parser::Parser;

/// A compiled grammar that can check documents of type `D`
pub trait Validate<D: ?Sized> {
    /// Check `doc`; a non-conforming document is an `Ok` outcome with
    /// errors, not an `Err`
    fn check(&self, doc: &D) -> Result<ValidationOutcome>;

    /// Convenience wrapper over [`check`](Self::check)
    fn is_valid(&self, doc: &D) -> Result<bool> {
        Ok(self.check(doc)?.is_valid())
    }
}

/// Stack left free before a recursive instance walk grows onto the heap
const RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

/// Run one level of a recursive walk over instance elements
pub(crate) fn descend<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_GROWTH, f)
}

/// Parse grammar text written in XML; malformed text is an invalid schema
pub(crate) fn parse_grammar(text: &str) -> Result<Document> {
    Parser::new(text.as_bytes())
        .parse()
        .map_err(|err| Error::with_message(ErrorKind::InvalidSchema, err.span(), err.message()))
}

/// `/a/b/c` path of element names from the root down to `node`
pub(crate) fn element_path(doc: &Document, node: NodeId) -> String {
    let mut names: Vec<String> = std::iter::once(node)
        .chain(doc.ancestors(node))
        .filter_map(|id| doc.element(id))
        .map(|element| element.name.to_string())
        .collect();
    names.reverse();
    format!("/{}", names.join("/"))
}

/// libxml-style element name: `{uri}local` when namespaced
pub(crate) fn clark_name(namespace: Option<&str>, local: &str) -> String {
    match namespace {
        Some(uri) => format!("{{{uri}}}{local}"),
        None => local.to_string(),
    }
}
