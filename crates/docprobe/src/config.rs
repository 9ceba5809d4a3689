//! Inspector configuration

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Addressing dialect of JSON path expressions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum EvaluationMode {
    /// `root.items[0].name`
    #[default]
    Property,
    /// `root->items->0->name`
    Javascript,
}

impl EvaluationMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Javascript => "javascript",
        }
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An evaluation mode name that is neither `property` nor `javascript`
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("unknown evaluation mode '{0}', expected 'property' or 'javascript'")]
pub struct ParseModeError(String);

impl FromStr for EvaluationMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "property" => Ok(Self::Property),
            "javascript" => Ok(Self::Javascript),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Settings shared by the inspectors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct Config {
    /// Dialect used to read JSON path expressions
    pub evaluation_mode: EvaluationMode,
    /// Pretty-print documents when encoding them for display
    pub pretty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            evaluation_mode: EvaluationMode::Property,
            pretty: true,
        }
    }
}

impl Config {
    pub const fn new(evaluation_mode: EvaluationMode, pretty: bool) -> Self {
        Self {
            evaluation_mode,
            pretty,
        }
    }

    #[must_use]
    pub const fn with_evaluation_mode(mut self, evaluation_mode: EvaluationMode) -> Self {
        self.evaluation_mode = evaluation_mode;
        self
    }

    #[must_use]
    pub const fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("javascript".parse(), Ok(EvaluationMode::Javascript));
        assert_eq!(" Property ".parse(), Ok(EvaluationMode::Property));
        assert!("jsonpath".parse::<EvaluationMode>().is_err());
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_evaluation_mode(EvaluationMode::Javascript)
            .with_pretty(false);
        assert_eq!(config, Config::new(EvaluationMode::Javascript, false));
        assert_eq!(config.evaluation_mode.to_string(), "javascript");
    }
}
