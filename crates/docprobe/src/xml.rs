//! XML documents: parsing, serialization, namespaces and querying

pub mod document;
pub mod encoding;
pub mod model;
pub mod namespace;
pub mod parser;
pub mod serialize;

pub use document::XmlDocument;
pub use model::{Document, Element, NodeId, NodeKind, QName};
pub use namespace::{has_default_namespace, NamespaceMap, DEFAULT_PREFIX};
pub use parser::Parser;
