//! Expectations about JSON bodies

use serde_json::Value;

use crate::assert::ensure;
use crate::error::{Error, Result};
use crate::json::{Inspector, JsonDocument};
use crate::schema::{JsonSchema, Validate};

/// Assertions over a parsed JSON body
#[derive(Debug)]
pub struct JsonAssertions<'a> {
    doc: &'a JsonDocument,
    inspector: Inspector,
}

impl<'a> JsonAssertions<'a> {
    pub const fn new(doc: &'a JsonDocument, inspector: Inspector) -> Self {
        Self { doc, inspector }
    }

    fn node(&self, expression: &str) -> Result<&'a Value> {
        self.inspector.evaluate(self.doc, expression)
    }

    /// String nodes compare by content, others by compact encoding
    pub fn node_should_be_equal_to(&self, expression: &str, expected: &str) -> Result<()> {
        let actual = display(self.node(expression)?);
        ensure(actual == expected, || {
            format!("The node '{expression}' value is '{actual}', expected '{expected}'")
        })
    }

    pub fn node_should_exist(&self, expression: &str) -> Result<&'a Value> {
        self.node(expression)
            .map_err(|_| Error::expectation(format!("The node '{expression}' does not exist")))
    }

    pub fn node_should_not_exist(&self, expression: &str) -> Result<()> {
        match self.node(expression) {
            Ok(value) => Err(Error::expectation(format!(
                "The node '{expression}' exists and contains '{}'",
                display(value)
            ))),
            Err(_) => Ok(()),
        }
    }

    /// Array length or object member count equals `count`
    pub fn node_should_have_elements(&self, expression: &str, count: usize) -> Result<()> {
        let len = match self.node(expression)? {
            Value::Array(items) => items.len(),
            Value::Object(members) => members.len(),
            other => {
                return Err(Error::expectation(format!(
                    "The node '{expression}' is not an array or object, it is '{}'",
                    display(other)
                )))
            }
        };
        ensure(len == count, || {
            format!("The node '{expression}' has {len} elements, expected {count}")
        })
    }

    pub fn node_should_contain(&self, expression: &str, text: &str) -> Result<()> {
        let actual = display(self.node(expression)?);
        ensure(actual.contains(text), || {
            format!("The node '{expression}' value is '{actual}', it should contain '{text}'")
        })
    }

    pub fn node_should_be_null(&self, expression: &str) -> Result<()> {
        let actual = self.node(expression)?;
        ensure(actual.is_null(), || {
            format!(
                "The node '{expression}' value is not null, it is '{}'",
                display(actual)
            )
        })
    }

    pub fn node_should_be_true(&self, expression: &str) -> Result<()> {
        self.node_should_be_bool(expression, true)
    }

    pub fn node_should_be_false(&self, expression: &str) -> Result<()> {
        self.node_should_be_bool(expression, false)
    }

    fn node_should_be_bool(&self, expression: &str, expected: bool) -> Result<()> {
        let actual = self.node(expression)?;
        ensure(actual.as_bool() == Some(expected), || {
            format!(
                "The node '{expression}' value is not {expected}, it is '{}'",
                display(actual)
            )
        })
    }

    /// Every schema violation is listed in the failure message
    pub fn should_be_valid_according_to(&self, schema: &JsonSchema) -> Result<()> {
        let outcome = schema.check(self.doc)?;
        ensure(outcome.is_valid(), || {
            let details: Vec<String> = outcome.errors.iter().map(ToString::to_string).collect();
            format!(
                "The JSON is not valid according to the schema:\n{}",
                details.join("\n")
            )
        })
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationMode;
    use serde_json::json;

    const BODY: &str = r#"{"status":"ok","items":[1,2,3],"owner":null,"active":true,"meta":{"page":1}}"#;

    #[test]
    fn test_node_values() -> Result<()> {
        let doc = JsonDocument::parse(BODY)?;
        let json = JsonAssertions::new(&doc, Inspector::default());
        json.node_should_be_equal_to("root.status", "ok")?;
        json.node_should_be_equal_to("root.items[2]", "3")?;
        json.node_should_be_equal_to("root.meta", r#"{"page":1}"#)?;
        json.node_should_contain("root.items", "2,3")?;
        json.node_should_be_null("owner")?;
        json.node_should_be_true("active")?;
        assert!(json.node_should_be_false("active").is_err());

        let err = json.node_should_be_equal_to("root.status", "failed").err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("The node 'root.status' value is 'ok', expected 'failed'")
        );
        Ok(())
    }

    #[test]
    fn test_existence() -> Result<()> {
        let doc = JsonDocument::parse(BODY)?;
        let json = JsonAssertions::new(&doc, Inspector::new(EvaluationMode::Javascript));
        assert_eq!(json.node_should_exist("root->meta->page")?, &json!(1));
        json.node_should_not_exist("root->meta->size")?;
        let err = json.node_should_exist("root->nope").err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("The node 'root->nope' does not exist")
        );
        Ok(())
    }

    #[test]
    fn test_element_counts() -> Result<()> {
        let doc = JsonDocument::parse(BODY)?;
        let json = JsonAssertions::new(&doc, Inspector::default());
        json.node_should_have_elements("items", 3)?;
        json.node_should_have_elements("meta", 1)?;
        assert!(json.node_should_have_elements("status", 1).is_err());
        let err = json.node_should_have_elements("items", 2).err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("The node 'items' has 3 elements, expected 2")
        );
        Ok(())
    }

    #[test]
    fn test_schema_expectation() -> Result<()> {
        let doc = JsonDocument::parse(BODY)?;
        let json = JsonAssertions::new(&doc, Inspector::default());
        json.should_be_valid_according_to(&JsonSchema::new(json!({"required": ["status"]}))?)?;
        let schema = JsonSchema::new(json!({"properties": {"status": {"type": "integer"}}}))?;
        let err = json.should_be_valid_according_to(&schema).err();
        assert!(err
            .map(|e| e.to_string())
            .is_some_and(|m| m.starts_with("The JSON is not valid according to the schema:\n/status: ")));
        Ok(())
    }
}
