//! Validation results shared by every grammar

use std::fmt;

use crate::error::{Error, ErrorKind, Result, Span};

/// One reason a document does not conform
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// Location inside the document: a JSON pointer or an element path
    pub path: String,
    pub message: String,
    /// Source line, when the document format has lines
    pub line: Option<u32>,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            line: None,
        }
    }

    #[must_use]
    pub const fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.path.is_empty() {
            write!(f, "{}: ", self.path)?;
        }
        f.write_str(&self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        Ok(())
    }
}

/// Whether a document conforms, and if not, why
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationOutcome {
    pub const fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Outcome for `errors`; valid exactly when there are none
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn first_error(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    /// `Ok` when valid, otherwise a `SchemaValidationFailed` error built
    /// from the first error record
    pub fn into_result(self) -> Result<()> {
        if self.valid {
            return Ok(());
        }
        let (message, span) = match self.errors.into_iter().next() {
            Some(first) => (first.message, first.line.map_or_else(Span::empty, Span::line)),
            None => ("Document does not validate".to_string(), Span::empty()),
        };
        Err(Error::with_message(
            ErrorKind::SchemaValidationFailed,
            span,
            message,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_outcome_is_ok() {
        assert!(ValidationOutcome::valid().into_result().is_ok());
        assert!(ValidationOutcome::from_errors(Vec::new()).is_valid());
    }

    #[test]
    fn test_first_error_becomes_the_failure() {
        let outcome = ValidationOutcome::from_errors(vec![
            ValidationError::new("/a", "Element 'a': first").at_line(3),
            ValidationError::new("/b", "second"),
        ]);
        assert!(!outcome.is_valid());
        let err = outcome.into_result().err();
        assert_eq!(
            err.as_ref().map(ToString::to_string).as_deref(),
            Some("Element 'a': first at line 3")
        );
        assert_eq!(err.and_then(|e| e.line()), Some(3));
    }

    #[test]
    fn test_error_display() {
        let error = ValidationError::new("/items/0", "\"x\" is not of type \"integer\"");
        assert_eq!(error.to_string(), "/items/0: \"x\" is not of type \"integer\"");
    }
}
