//! Parsed JSON response body

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use serde_json::{Deserializer, Serializer, Value};
use tracing::instrument;

use crate::config::EvaluationMode;
use crate::error::{Error, ErrorKind, Pos, Result, Span};
use crate::json::path;

/// Deepest array/object nesting a body may use
pub const MAX_DEPTH: usize = 512;

/// A JSON value tree, insertion order of object members preserved
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JsonDocument {
    content: Value,
}

impl JsonDocument {
    /// Strict decode of `text`
    ///
    /// Syntax errors, trailing data and nesting deeper than [`MAX_DEPTH`]
    /// levels all fail with [`ErrorKind::InvalidJson`], carrying the line and
    /// column of the offending byte.
    #[instrument(level = "debug", skip_all, fields(len = text.len()))]
    pub fn parse(text: &str) -> Result<Self> {
        if let Some(offset) = excessive_nesting(text) {
            let (line, col) = line_col(text, offset);
            return Err(invalid_json(text, line, col));
        }

        let mut deserializer = Deserializer::from_str(text);
        deserializer.disable_recursion_limit();
        let content = Value::deserialize(serde_stacker::Deserializer::new(&mut deserializer))
            .and_then(|content| deserializer.end().map(|()| content))
            .map_err(|err| invalid_json(text, err.line(), err.column()))?;
        Ok(Self { content })
    }

    pub const fn from_value(content: Value) -> Self {
        Self { content }
    }

    pub const fn content(&self) -> &Value {
        &self.content
    }

    pub fn into_value(self) -> Value {
        self.content
    }

    /// Swap in a whole new tree, returning the previous one
    pub fn replace(&mut self, content: Value) -> Value {
        std::mem::replace(&mut self.content, content)
    }

    /// Read a property-dialect path such as `root.items[0].name`
    pub fn read(&self, expression: &str) -> Result<&Value> {
        self.read_with(expression, EvaluationMode::Property)
    }

    /// Read a path written in `mode`'s dialect
    pub fn read_with(&self, expression: &str, mode: EvaluationMode) -> Result<&Value> {
        path::evaluate(&self.content, expression, mode)
    }

    /// Serialize for display; `/` and non-ASCII characters stay unescaped
    /// and pretty output indents by four spaces
    pub fn encode(&self, pretty: bool) -> Result<String> {
        if pretty {
            write_with(&self.content, PrettyFormatter::with_indent(b"    "))
        } else {
            write_with(&self.content, CompactFormatter)
        }
    }
}

fn invalid_json(text: &str, line: usize, col: usize) -> Error {
    let line = u32::try_from(line).unwrap_or(u32::MAX);
    let col = u32::try_from(col).unwrap_or(u32::MAX);
    let pos = Pos::new(0, line, col);
    Error::with_message(
        ErrorKind::InvalidJson,
        Span::new(pos, pos),
        format!("The string '{text}' is not valid json"),
    )
}

/// Offset of the bracket that opens level `MAX_DEPTH + 1`, if any
fn excessive_nesting(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, b) in text.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth = depth.saturating_add(1);
                if depth > MAX_DEPTH {
                    return Some(offset);
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// 1-based line and column of a byte offset
fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count().saturating_add(1);
    let col = before
        .rfind('\n')
        .map_or(before.len(), |at| before.len().saturating_sub(at).saturating_sub(1))
        .saturating_add(1);
    (line, col)
}

fn write_with<F: Formatter>(value: &Value, formatter: F) -> Result<String> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|err| Error::msg(ErrorKind::Encoding, err.to_string()))?;
    String::from_utf8(out).map_err(|err| Error::msg(ErrorKind::Encoding, err.to_string()))
}

impl From<Value> for JsonDocument {
    fn from(content: Value) -> Self {
        Self::from_value(content)
    }
}

impl FromStr for JsonDocument {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.encode(false).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_read() -> Result<()> {
        let doc = JsonDocument::parse(r#"{"status":"ok","items":[1,2,3]}"#)?;
        assert_eq!(doc.read("root.items[2]")?, &json!(3));
        assert_eq!(doc.read("root")?, doc.content());
        Ok(())
    }

    #[test]
    fn test_invalid_json_quotes_text() {
        let err = JsonDocument::parse("{\n\"a\": }").err();
        assert_eq!(err.as_ref().map(Error::kind), Some(&ErrorKind::InvalidJson));
        assert_eq!(
            err.as_ref().map(Error::message),
            Some("The string '{\n\"a\": }' is not valid json")
        );
        assert_eq!(err.and_then(|e| e.line()), Some(2));
    }

    #[test]
    fn test_trailing_data_is_rejected() {
        assert!(JsonDocument::parse("{} {}").is_err());
        assert!(JsonDocument::parse("").is_err());
    }

    fn nested(levels: usize) -> String {
        format!("{}{}", "[".repeat(levels), "]".repeat(levels))
    }

    #[test]
    fn test_nesting_limit() {
        assert!(JsonDocument::parse(&nested(200)).is_ok());
        assert!(JsonDocument::parse(&nested(MAX_DEPTH)).is_ok());

        let err = JsonDocument::parse(&nested(MAX_DEPTH + 1)).err();
        assert_eq!(err.as_ref().map(Error::kind), Some(&ErrorKind::InvalidJson));
        assert_eq!(err.and_then(|e| e.line()), Some(1));
    }

    #[test]
    fn test_brackets_inside_strings_do_not_nest() -> Result<()> {
        let text = format!(r#"{{"a": "{}\"{}"}}"#, "[".repeat(600), "{".repeat(600));
        let doc = JsonDocument::parse(&text)?;
        assert!(doc.read("root.a")?.is_string());
        Ok(())
    }

    #[test]
    fn test_line_col_of_offset() {
        assert_eq!(line_col("ab\ncd", 4), (2, 2));
        assert_eq!(line_col("abc", 0), (1, 1));
    }

    #[test]
    fn test_encode_keeps_slashes_and_unicode() -> Result<()> {
        let doc = JsonDocument::from_value(json!({"url": "http://x/y", "name": "Zoë"}));
        assert_eq!(doc.encode(false)?, r#"{"url":"http://x/y","name":"Zoë"}"#);
        assert_eq!(
            doc.encode(true)?,
            "{\n    \"url\": \"http://x/y\",\n    \"name\": \"Zoë\"\n}"
        );
        assert_eq!(doc.to_string(), doc.encode(false)?);
        Ok(())
    }

    #[test]
    fn test_replace_swaps_tree() -> Result<()> {
        let mut doc: JsonDocument = "[1]".parse()?;
        let previous = doc.replace(json!({"fresh": true}));
        assert_eq!(previous, json!([1]));
        assert_eq!(doc.read("root.fresh")?, &json!(true));
        Ok(())
    }

    #[test]
    fn test_member_order_preserved() -> Result<()> {
        let doc = JsonDocument::parse(r#"{"z":1,"a":2,"m":3}"#)?;
        assert_eq!(doc.to_string(), r#"{"z":1,"a":2,"m":3}"#);
        Ok(())
    }
}
