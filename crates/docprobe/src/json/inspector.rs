//! Expression evaluation and schema validation with a fixed dialect

use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::{Config, EvaluationMode};
use crate::error::Result;
use crate::json::document::JsonDocument;
use crate::schema::{JsonSchema, SchemaRegistry, Validate};

/// Reads and validates JSON documents using one evaluation dialect
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Inspector {
    mode: EvaluationMode,
}

impl Inspector {
    pub const fn new(mode: EvaluationMode) -> Self {
        Self { mode }
    }

    pub const fn from_config(config: &Config) -> Self {
        Self::new(config.evaluation_mode)
    }

    pub const fn mode(&self) -> EvaluationMode {
        self.mode
    }

    /// Resolve `expression` in `json`
    ///
    /// Fails with `EvaluationFailed` whether the expression is malformed or
    /// does not resolve. In javascript mode the error quotes the expression
    /// with `->` already rewritten to `.`.
    #[instrument(level = "debug", skip(self, json), fields(mode = %self.mode))]
    pub fn evaluate<'a>(&self, json: &'a JsonDocument, expression: &str) -> Result<&'a Value> {
        json.read_with(expression, self.mode)
    }

    /// Whether `json` conforms to `schema`; non-conformance is `Ok(false)`
    pub fn validate(&self, json: &JsonDocument, schema: &JsonSchema) -> Result<bool> {
        let outcome = schema.check(json)?;
        for error in &outcome.errors {
            debug!(path = %error.path, message = %error.message, "schema violation");
        }
        Ok(outcome.is_valid())
    }

    /// Compile `schema` against `registry`, then [`validate`](Self::validate)
    pub fn validate_with(
        &self,
        json: &JsonDocument,
        schema: Value,
        registry: SchemaRegistry,
    ) -> Result<bool> {
        let schema = JsonSchema::with_registry(schema, registry)?;
        self.validate(json, &schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_mode_comes_from_config() -> Result<()> {
        let config = Config::default().with_evaluation_mode(EvaluationMode::Javascript);
        let inspector = Inspector::from_config(&config);
        let doc = JsonDocument::parse(r#"{"a": [{"b": "c"}]}"#)?;
        assert_eq!(inspector.evaluate(&doc, "root->a->0->b")?, &json!("c"));
        Ok(())
    }

    #[test]
    fn test_failures_carry_expression() -> Result<()> {
        let doc = JsonDocument::parse(r#"{"a": 1}"#)?;
        let err = Inspector::default().evaluate(&doc, "root.b").err();
        assert_eq!(
            err.map(|e| e.kind().clone()),
            Some(ErrorKind::EvaluationFailed {
                expression: "root.b".to_string()
            })
        );
        Ok(())
    }

    #[test]
    fn test_javascript_failure_quotes_dotted_form() -> Result<()> {
        let doc = JsonDocument::parse(r#"{"a": {"b": 1}}"#)?;
        let err = Inspector::new(EvaluationMode::Javascript)
            .evaluate(&doc, "root->a->c")
            .err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("Failed to evaluate expression 'root.a.c'")
        );
        Ok(())
    }

    #[test]
    fn test_validate_reports_bool() -> Result<()> {
        let inspector = Inspector::default();
        let schema = JsonSchema::new(json!({"type": "array", "items": {"type": "integer"}}))?;
        assert!(inspector.validate(&JsonDocument::parse("[1, 2]")?, &schema)?);
        assert!(!inspector.validate(&JsonDocument::parse("[1, \"2\"]")?, &schema)?);
        Ok(())
    }

    #[test]
    fn test_validate_with_registry() -> Result<()> {
        let registry = SchemaRegistry::new()
            .with_document("http://example.com/id.json", json!({"type": "string", "minLength": 2}));
        let doc = JsonDocument::parse(r#"{"id": "x"}"#)?;
        let valid = Inspector::default().validate_with(
            &doc,
            json!({"properties": {"id": {"$ref": "http://example.com/id.json"}}}),
            registry,
        )?;
        assert!(!valid);
        Ok(())
    }
}
