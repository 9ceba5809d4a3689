//! Error types for docprobe

use std::fmt;
use thiserror::Error;

/// Position in a source document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pos {
    pub offset: usize,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.offset, self.line, self.col)
    }
}

impl Pos {
    pub const fn new(offset: usize, line: u32, col: u32) -> Self {
        Self { offset, line, col }
    }
}

/// Span representing a range in a source document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub const fn empty() -> Self {
        Self {
            start: Pos::new(0, 0, 0),
            end: Pos::new(0, 0, 0),
        }
    }

    /// Span covering a single line, used when only a line number is known
    pub const fn line(line: u32) -> Self {
        let pos = Pos::new(0, line, 0);
        Self {
            start: pos,
            end: pos,
        }
    }
}

/// Error kind for detailed categorization
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Body is not well-formed JSON
    InvalidJson,
    /// A value tree could not be serialized
    Encoding,
    /// A JSON path expression could not be resolved
    EvaluationFailed { expression: String },
    /// Body is not well-formed XML
    MalformedXml,
    /// An XPath expression was rejected
    InvalidXPath { expression: String },
    /// A document does not conform to its grammar
    SchemaValidationFailed,
    /// A grammar (JSON Schema, XSD, RelaxNG, DTD) could not be compiled
    InvalidSchema,
    /// A response header is absent
    HeaderNotFound { name: String },
    /// An assertion did not hold
    Expectation,
    /// Reading an input failed
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "invalid json"),
            Self::Encoding => write!(f, "encoding error"),
            Self::EvaluationFailed { expression } => {
                write!(f, "Failed to evaluate expression '{expression}'")
            }
            Self::MalformedXml => write!(f, "malformed xml"),
            Self::InvalidXPath { expression } => write!(f, "Invalid expression '{expression}'"),
            Self::SchemaValidationFailed => write!(f, "schema validation failed"),
            Self::InvalidSchema => write!(f, "invalid schema"),
            Self::HeaderNotFound { name } => write!(f, "The header '{name}' doesn't exist"),
            Self::Expectation => write!(f, "expectation failed"),
            Self::Io => write!(f, "i/o error"),
        }
    }
}

/// Main error type for docprobe
#[derive(Error, Clone, Debug, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    span: Span,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            span,
            message,
        }
    }

    pub fn with_message(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    /// Error without any source location
    pub fn msg(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::with_message(kind, Span::empty(), message)
    }

    /// Create error at specific position
    pub fn at(kind: ErrorKind, offset: usize, line: u32, col: u32) -> Self {
        let pos = Pos::new(offset, line, col);
        Self::new(kind, Span::new(pos, pos))
    }

    pub fn evaluation_failed(expression: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::EvaluationFailed {
                expression: expression.into(),
            },
            Span::empty(),
        )
    }

    pub fn header_not_found(name: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::HeaderNotFound {
                name: name.into().to_lowercase(),
            },
            Span::empty(),
        )
    }

    pub fn expectation(message: impl Into<String>) -> Self {
        Self::msg(ErrorKind::Expectation, message)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source line the error refers to, if known
    pub fn line(&self) -> Option<u32> {
        match self.span.start.line {
            0 => None,
            line => Some(line),
        }
    }

    fn reports_line(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::MalformedXml | ErrorKind::SchemaValidationFailed | ErrorKind::InvalidSchema
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line() {
            Some(line) if self.reports_line() => write!(f, "{} at line {line}", self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::msg(ErrorKind::Io, err.to_string())
    }
}

/// Result type alias for docprobe
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_display() {
        let pos = Pos::new(42, 10, 5);
        assert_eq!(pos.to_string(), "42:10:5");
    }

    #[test]
    fn test_error_creation() {
        let err = Error::at(ErrorKind::MalformedXml, 0, 1, 1);
        assert_eq!(err.kind(), &ErrorKind::MalformedXml);
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_xml_error_display_carries_line() {
        let err = Error::with_message(
            ErrorKind::MalformedXml,
            Span::line(3),
            "Premature end of data in tag a line 1",
        );
        assert_eq!(
            err.to_string(),
            "Premature end of data in tag a line 1 at line 3"
        );
    }

    #[test]
    fn test_evaluation_error_hides_line() {
        let err = Error::evaluation_failed("root.a");
        assert_eq!(err.to_string(), "Failed to evaluate expression 'root.a'");
        assert_eq!(err.line(), None);
    }

    #[test]
    fn test_header_name_is_lowercased() {
        let err = Error::header_not_found("Content-Type");
        assert_eq!(err.to_string(), "The header 'content-type' doesn't exist");
    }
}
