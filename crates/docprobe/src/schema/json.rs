//! JSON Schema validation
//!
//! `$ref`s resolve first against documents registered in a
//! [`SchemaRegistry`], then against `file://` URIs on disk. No other scheme
//! is retrieved.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Error, ErrorKind, Result};
use crate::json::JsonDocument;
use crate::schema::outcome::{ValidationError, ValidationOutcome};
use crate::schema::Validate;

type RetrieveError = Box<dyn std::error::Error + Send + Sync>;

/// Schema documents addressable by URI
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    documents: HashMap<String, Value>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `schema` under `uri`
    pub fn insert(&mut self, uri: impl Into<String>, schema: Value) {
        self.documents.insert(uri.into(), schema);
    }

    #[must_use]
    pub fn with_document(mut self, uri: impl Into<String>, schema: Value) -> Self {
        self.insert(uri, schema);
        self
    }

    pub fn get(&self, uri: &str) -> Option<&Value> {
        let bare = uri.split_once('#').map_or(uri, |(head, _)| head);
        self.documents
            .get(uri)
            .or_else(|| self.documents.get(bare))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn resolve(&self, uri: &str) -> std::result::Result<Value, RetrieveError> {
        if let Some(schema) = self.get(uri) {
            return Ok(schema.clone());
        }
        let url = Url::parse(uri)?;
        if url.scheme() != "file" {
            return Err(format!("Schema '{uri}' is not registered").into());
        }
        let path = url
            .to_file_path()
            .map_err(|()| format!("Schema '{uri}' is not a local path"))?;
        debug!(path = %path.display(), "reading referenced schema");
        let text = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl jsonschema::Retrieve for SchemaRegistry {
    fn retrieve(
        &self,
        uri: &jsonschema::Uri<&str>,
    ) -> std::result::Result<Value, RetrieveError> {
        self.resolve(uri.as_str())
    }
}

/// A compiled JSON Schema
pub struct JsonSchema {
    schema: Value,
    validator: jsonschema::Validator,
}

impl JsonSchema {
    /// Compile `schema` with no registered documents
    pub fn new(schema: Value) -> Result<Self> {
        Self::with_registry(schema, SchemaRegistry::new())
    }

    /// Compile `schema`, resolving `$ref`s through `registry`
    #[instrument(level = "debug", skip_all, fields(documents = registry.len()))]
    pub fn with_registry(schema: Value, registry: SchemaRegistry) -> Result<Self> {
        let validator = jsonschema::options()
            .with_retriever(registry)
            .build(&schema)
            .map_err(|err| {
                Error::msg(
                    ErrorKind::InvalidSchema,
                    format!("Invalid JSON schema: {err}"),
                )
            })?;
        Ok(Self { schema, validator })
    }

    /// Compile schema text
    pub fn parse(text: &str) -> Result<Self> {
        Self::new(parse_schema_text(text)?)
    }

    /// Load a schema file; relative `$ref`s resolve against its location
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut schema = parse_schema_text(&text)?;
        let absolute = fs::canonicalize(path)?;
        if let (Value::Object(map), Ok(base)) = (&mut schema, Url::from_file_path(&absolute)) {
            if !map.contains_key("$id") {
                map.insert("$id".to_string(), Value::String(base.to_string()));
            }
        }
        Self::new(schema)
    }

    pub const fn schema(&self) -> &Value {
        &self.schema
    }

    fn errors(&self, instance: &Value) -> Vec<ValidationError> {
        self.validator
            .iter_errors(instance)
            .map(|err| ValidationError::new(err.instance_path.to_string(), err.to_string()))
            .collect()
    }
}

fn parse_schema_text(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|err| {
        Error::msg(
            ErrorKind::InvalidSchema,
            format!("Invalid JSON schema: {err}"),
        )
    })
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Validate<JsonDocument> for JsonSchema {
    fn check(&self, doc: &JsonDocument) -> Result<ValidationOutcome> {
        <Self as Validate<Value>>::check(self, doc.content())
    }
}

impl Validate<Value> for JsonSchema {
    fn check(&self, doc: &Value) -> Result<ValidationOutcome> {
        Ok(ValidationOutcome::from_errors(self.errors(doc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> Value {
        json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0}
            }
        })
    }

    #[test]
    fn test_conforming_document() -> Result<()> {
        let schema = JsonSchema::new(person())?;
        let doc = JsonDocument::parse(r#"{"name": "Ada", "age": 36}"#)?;
        assert!(schema.is_valid(&doc)?);
        Ok(())
    }

    #[test]
    fn test_errors_carry_instance_path() -> Result<()> {
        let schema = JsonSchema::new(person())?;
        let doc = JsonDocument::parse(r#"{"name": "Ada", "age": -1}"#)?;
        let outcome = schema.check(&doc)?;
        assert!(!outcome.is_valid());
        assert_eq!(
            outcome.first_error().map(|e| e.path.as_str()),
            Some("/age")
        );
        Ok(())
    }

    #[test]
    fn test_missing_required_property() -> Result<()> {
        let schema = JsonSchema::new(person())?;
        let outcome = schema.check(&json!({"age": 3}))?;
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome
            .first_error()
            .is_some_and(|e| e.message.contains("name")));
        Ok(())
    }

    #[test]
    fn test_malformed_schema() {
        let err = JsonSchema::new(json!({"type": "string", "pattern": "("})).err();
        assert_eq!(err.map(|e| e.kind().clone()), Some(ErrorKind::InvalidSchema));

        let err = JsonSchema::parse("{\"type\":").err();
        assert_eq!(err.map(|e| e.kind().clone()), Some(ErrorKind::InvalidSchema));
    }

    #[test]
    fn test_registry_resolves_refs() -> Result<()> {
        let registry = SchemaRegistry::new().with_document(
            "http://example.com/address.json",
            json!({"type": "object", "required": ["city"]}),
        );
        let schema = JsonSchema::with_registry(
            json!({
                "type": "object",
                "properties": {"home": {"$ref": "http://example.com/address.json"}}
            }),
            registry,
        )?;
        assert!(schema.is_valid(&json!({"home": {"city": "Oslo"}}))?);
        assert!(!schema.is_valid(&json!({"home": {}}))?);
        Ok(())
    }

    #[test]
    fn test_file_refs_resolve_relative_to_schema() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("item.json"),
            r#"{"type": "string", "maxLength": 3}"#,
        )?;
        let main = dir.path().join("main.json");
        fs::write(
            &main,
            r#"{"type": "array", "items": {"$ref": "item.json"}}"#,
        )?;
        let schema = JsonSchema::from_path(&main)?;
        assert!(schema.is_valid(&json!(["ab", "cde"]))?);
        assert!(!schema.is_valid(&json!(["abcd"]))?);
        Ok(())
    }
}
