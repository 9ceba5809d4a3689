//! XPath 1.0 abstract syntax tree

use std::fmt;

/// Binary operators, lowest precedence first
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "div",
            Self::Mod => "mod",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Ancestor,
    AncestorOrSelf,
    Attribute,
    Child,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Namespace,
    Parent,
    Preceding,
    PrecedingSibling,
    SelfAxis,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "attribute" => Self::Attribute,
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "following" => Self::Following,
            "following-sibling" => Self::FollowingSibling,
            "namespace" => Self::Namespace,
            "parent" => Self::Parent,
            "preceding" => Self::Preceding,
            "preceding-sibling" => Self::PrecedingSibling,
            "self" => Self::SelfAxis,
            _ => return None,
        })
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Ancestor => "ancestor",
            Self::AncestorOrSelf => "ancestor-or-self",
            Self::Attribute => "attribute",
            Self::Child => "child",
            Self::Descendant => "descendant",
            Self::DescendantOrSelf => "descendant-or-self",
            Self::Following => "following",
            Self::FollowingSibling => "following-sibling",
            Self::Namespace => "namespace",
            Self::Parent => "parent",
            Self::Preceding => "preceding",
            Self::PrecedingSibling => "preceding-sibling",
            Self::SelfAxis => "self",
        }
    }

    /// Reverse axes number their predicate positions nearest-first
    pub const fn is_reverse(self) -> bool {
        matches!(
            self,
            Self::Ancestor | Self::AncestorOrSelf | Self::Preceding | Self::PrecedingSibling
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeTest {
    /// `prefix:local` or `local`
    Name {
        prefix: Option<String>,
        local: String,
    },
    /// `*`
    Wildcard,
    /// `prefix:*`
    NamespaceWildcard(String),
    Text,
    Node,
    Comment,
    ProcessingInstruction(Option<String>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    /// `descendant-or-self::node()`, the expansion of `//`
    pub fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path(LocationPath),
    /// Primary expression with predicates
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
    },
    /// Filter expression followed by `/` or `//` steps
    PathFrom {
        filter: Box<Expr>,
        steps: Vec<Step>,
    },
    Literal(String),
    Number(f64),
    Variable(String),
    Function {
        name: String,
        args: Vec<Expr>,
    },
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name {
                prefix: Some(prefix),
                local,
            } => write!(f, "{prefix}:{local}"),
            Self::Name { prefix: None, local } => f.write_str(local),
            Self::Wildcard => f.write_str("*"),
            Self::NamespaceWildcard(prefix) => write!(f, "{prefix}:*"),
            Self::Text => f.write_str("text()"),
            Self::Node => f.write_str("node()"),
            Self::Comment => f.write_str("comment()"),
            Self::ProcessingInstruction(Some(target)) => {
                write!(f, "processing-instruction('{target}')")
            }
            Self::ProcessingInstruction(None) => f.write_str("processing-instruction()"),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.axis, &self.test) {
            (Axis::SelfAxis, NodeTest::Node) if self.predicates.is_empty() => {
                return f.write_str(".")
            }
            (Axis::Parent, NodeTest::Node) if self.predicates.is_empty() => {
                return f.write_str("..")
            }
            (Axis::Child, test) => write!(f, "{test}")?,
            (Axis::Attribute, test) => write!(f, "@{test}")?,
            (axis, test) => write!(f, "{}::{test}", axis.name())?,
        }
        for predicate in &self.predicates {
            write!(f, "[{predicate}]")?;
        }
        Ok(())
    }
}

/// Write steps, collapsing `descendant-or-self::node()` back into `//`
fn write_steps(f: &mut fmt::Formatter<'_>, steps: &[Step], leading_slash: bool) -> fmt::Result {
    let mut pending_slash = leading_slash;
    for (i, step) in steps.iter().enumerate() {
        let is_abbreviation = step.axis == Axis::DescendantOrSelf
            && step.test == NodeTest::Node
            && step.predicates.is_empty()
            && i + 1 < steps.len();
        if is_abbreviation {
            f.write_str("//")?;
            pending_slash = false;
            continue;
        }
        if pending_slash {
            f.write_str("/")?;
        }
        write!(f, "{step}")?;
        pending_slash = true;
    }
    Ok(())
}

/// Subject of a filter or of a trailing path, parenthesized unless it is a
/// primary expression
fn write_subject(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Literal(_)
        | Expr::Number(_)
        | Expr::Variable(_)
        | Expr::Function { .. }
        | Expr::Binary { .. }
        | Expr::Filter { .. } => write!(f, "{expr}"),
        _ => write!(f, "({expr})"),
    }
}

impl fmt::Display for LocationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute && self.steps.is_empty() {
            return f.write_str("/");
        }
        write_steps(f, &self.steps, self.absolute)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Self::Negate(inner) => {
                f.write_str("-")?;
                write_subject(f, inner)
            }
            Self::Union(left, right) => write!(f, "{left} | {right}"),
            Self::Path(path) => write!(f, "{path}"),
            Self::Filter {
                primary,
                predicates,
            } => {
                write_subject(f, primary)?;
                for predicate in predicates {
                    write!(f, "[{predicate}]")?;
                }
                Ok(())
            }
            Self::PathFrom { filter, steps } => {
                write_subject(f, filter)?;
                write_steps(f, steps, true)
            }
            Self::Literal(text) if text.contains('\'') => write!(f, "\"{text}\""),
            Self::Literal(text) => write!(f, "'{text}'"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Variable(name) => write!(f, "${name}"),
            Self::Function { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}
