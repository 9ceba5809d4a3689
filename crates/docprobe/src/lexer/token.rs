//! Token types for the XPath lexer

use crate::error::Span;

/// XPath token types
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Structural
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    Dot,          // .
    DotDot,       // ..
    At,           // @
    Comma,        // ,
    ColonColon,   // ::
    Slash,        // /
    DoubleSlash,  // //

    // Operators
    Pipe,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Multiply,
    And,
    Or,
    Mod,
    Div,

    // Values
    Literal(String),
    Number(f64),

    // Names
    /// `*`, `prefix:*` or a QName; `local` is `None` for wildcards
    NameTest {
        prefix: Option<String>,
        local: Option<String>,
    },
    NodeType(String),
    FunctionName(String),
    AxisName(String),
    Variable(String),

    // Special
    Eof,
}

impl TokenKind {
    /// Get token name for error messages
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LeftParen => "'('",
            Self::RightParen => "')'",
            Self::LeftBracket => "'['",
            Self::RightBracket => "']'",
            Self::Dot => "'.'",
            Self::DotDot => "'..'",
            Self::At => "'@'",
            Self::Comma => "','",
            Self::ColonColon => "'::'",
            Self::Slash => "'/'",
            Self::DoubleSlash => "'//'",
            Self::Pipe => "'|'",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Eq => "'='",
            Self::NotEq => "'!='",
            Self::Lt => "'<'",
            Self::Lte => "'<='",
            Self::Gt => "'>'",
            Self::Gte => "'>='",
            Self::Multiply => "'*'",
            Self::And => "'and'",
            Self::Or => "'or'",
            Self::Mod => "'mod'",
            Self::Div => "'div'",
            Self::Literal(_) => "literal",
            Self::Number(_) => "number",
            Self::NameTest { .. } => "name test",
            Self::NodeType(_) => "node type",
            Self::FunctionName(_) => "function name",
            Self::AxisName(_) => "axis name",
            Self::Variable(_) => "variable",
            Self::Eof => "end of expression",
        }
    }

    /// Whether the token is an operator in the XPath lexical sense
    pub const fn is_operator(&self) -> bool {
        matches!(
            self,
            Self::And
                | Self::Or
                | Self::Mod
                | Self::Div
                | Self::Multiply
                | Self::Slash
                | Self::DoubleSlash
                | Self::Pipe
                | Self::Plus
                | Self::Minus
                | Self::Eq
                | Self::NotEq
                | Self::Lt
                | Self::Lte
                | Self::Gt
                | Self::Gte
        )
    }
}

/// Token with its source span
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}
