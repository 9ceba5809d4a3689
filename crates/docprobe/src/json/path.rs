//! Property-path expressions over JSON value trees
//!
//! Two dialects address the same tree: `root.items[0].name` and
//! `root->items->0->name`. Both are normalized to the first before a single
//! traversal runs. The leading `root` prefix is optional.

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::config::EvaluationMode;
use crate::error::{Error, Result};

/// One step of a path
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// `.name`; on an array a non-negative integer key addresses an index
    Key(String),
    /// `[n]`; only valid on arrays
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, ".{key}"),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A compiled path; empty means the whole document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathExpression {
    segments: Vec<Segment>,
}

impl PathExpression {
    /// Compile `expression` for a tree whose root is a scalar when
    /// `scalar_root` is set; errors quote the expression after `->`
    /// normalization
    pub fn compile(expression: &str, mode: EvaluationMode, scalar_root: bool) -> Result<Self> {
        let normalized = normalize(expression, mode);
        let body = strip_root(&normalized, scalar_root);
        parse_segments(body)
            .map(|segments| Self { segments })
            .ok_or_else(|| Error::evaluation_failed(&*normalized))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walk `root`; `None` when a key or index is absent
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| step(current, segment))
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("root")?;
        self.segments
            .iter()
            .try_for_each(|segment| write!(f, "{segment}"))
    }
}

/// Evaluate `expression` against `root`; every failure is reported as
/// `EvaluationFailed` carrying the normalized expression
pub fn evaluate<'a>(root: &'a Value, expression: &str, mode: EvaluationMode) -> Result<&'a Value> {
    let expression = normalize(expression, mode);
    let scalar_root = !matches!(root, Value::Array(_) | Value::Object(_));
    let path = PathExpression::compile(&expression, EvaluationMode::Property, scalar_root)?;
    path.resolve(root).ok_or_else(|| {
        debug!(expression = %expression, path = %path, "path does not resolve");
        Error::evaluation_failed(&*expression)
    })
}

fn normalize(expression: &str, mode: EvaluationMode) -> Cow<'_, str> {
    match mode {
        EvaluationMode::Property => Cow::Borrowed(expression),
        EvaluationMode::Javascript => Cow::Owned(expression.replace("->", ".")),
    }
}

/// Drop the literal prefix `root`; scalar roots lose the following `.` too
fn strip_root(expression: &str, scalar_root: bool) -> &str {
    let Some(rest) = expression.strip_prefix("root") else {
        return expression;
    };
    if scalar_root {
        rest.strip_prefix('.').unwrap_or(rest)
    } else {
        rest
    }
}

fn parse_segments(body: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = body.trim();
    let mut first = true;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let (inner, tail) = after.split_once(']')?;
            let inner = inner.trim();
            if !is_index(inner) {
                return None;
            }
            segments.push(Segment::Index(inner.parse().ok()?));
            rest = tail;
        } else {
            let body = match rest.strip_prefix('.') {
                Some(body) => body,
                None if first => rest,
                None => return None,
            };
            let end = body.find(['.', '[']).unwrap_or(body.len());
            let (key, tail) = body.split_at(end);
            if key.is_empty() {
                return None;
            }
            segments.push(Segment::Key(key.to_string()));
            rest = tail;
        }
        first = false;
    }
    Some(segments)
}

fn is_index(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn step<'a>(current: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Array(items), Segment::Key(key)) if is_index(key) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index))
        }
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        _ => None,
    }
}
