//! JSON documents, path expressions and inspection

pub mod document;
pub mod inspector;
pub mod path;

pub use document::JsonDocument;
pub use inspector::Inspector;
pub use path::{evaluate, PathExpression, Segment};
