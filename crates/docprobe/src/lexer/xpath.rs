//! XPath-specific lexer
//!
//! Applies the XPath 1.0 disambiguation rules: after a token that can end
//! an operand, `*` is multiplication and a bare name must be an operator
//! name; a name followed by `(` is a function or node type, a name followed
//! by `::` is an axis.

use crate::error::{Error, ErrorKind, Result, Span};
use crate::lexer::cursor::Cursor;
use crate::lexer::token::{Token, TokenKind};

const NODE_TYPES: [&str; 4] = ["comment", "text", "processing-instruction", "node"];

/// XPath lexer that tokenizes an expression
#[derive(Clone, Debug)]
pub struct XPathLexer<'a> {
    source: &'a str,
    cursor: Cursor<'a>,
    previous: Option<TokenKind>,
}

impl<'a> XPathLexer<'a> {
    /// Create a new lexer over an expression
    pub const fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: Cursor::new(source.as_bytes()),
            previous: None,
        }
    }

    /// Tokenize the whole expression, ending with [`TokenKind::Eof`]
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Token> {
        self.cursor.skip_whitespace();
        let start = self.cursor.position();

        let kind = match self.cursor.current() {
            None => TokenKind::Eof,
            Some(b) => match b {
                b'(' => self.single(TokenKind::LeftParen),
                b')' => self.single(TokenKind::RightParen),
                b'[' => self.single(TokenKind::LeftBracket),
                b']' => self.single(TokenKind::RightBracket),
                b'@' => self.single(TokenKind::At),
                b',' => self.single(TokenKind::Comma),
                b'|' => self.single(TokenKind::Pipe),
                b'+' => self.single(TokenKind::Plus),
                b'-' => self.single(TokenKind::Minus),
                b'=' => self.single(TokenKind::Eq),
                b'/' => {
                    self.cursor.advance();
                    if self.cursor.consume(b'/') {
                        TokenKind::DoubleSlash
                    } else {
                        TokenKind::Slash
                    }
                }
                b'!' if self.cursor.peek(1) == Some(b'=') => {
                    self.cursor.advance_by(2);
                    TokenKind::NotEq
                }
                b'<' => {
                    self.cursor.advance();
                    if self.cursor.consume(b'=') {
                        TokenKind::Lte
                    } else {
                        TokenKind::Lt
                    }
                }
                b'>' => {
                    self.cursor.advance();
                    if self.cursor.consume(b'=') {
                        TokenKind::Gte
                    } else {
                        TokenKind::Gt
                    }
                }
                b':' if self.cursor.peek(1) == Some(b':') => {
                    self.cursor.advance_by(2);
                    TokenKind::ColonColon
                }
                b'.' if self.cursor.peek(1) == Some(b'.') => {
                    self.cursor.advance_by(2);
                    TokenKind::DotDot
                }
                b'.' if self.cursor.peek(1).is_some_and(|d| d.is_ascii_digit()) => {
                    self.lex_number()?
                }
                b'.' => self.single(TokenKind::Dot),
                b'0'..=b'9' => self.lex_number()?,
                b'"' | b'\'' => self.lex_literal()?,
                b'$' => {
                    self.cursor.advance();
                    let name = self.lex_qname()?;
                    TokenKind::Variable(name)
                }
                b'*' => {
                    self.cursor.advance();
                    if self.operator_expected() {
                        TokenKind::Multiply
                    } else {
                        TokenKind::NameTest {
                            prefix: None,
                            local: None,
                        }
                    }
                }
                b if is_name_start(b) => self.lex_name()?,
                other => {
                    return Err(self.error(&format!(
                        "unexpected character '{}'",
                        char::from(other)
                    )));
                }
            },
        };

        self.previous = Some(kind.clone());
        let end = self.cursor.position();
        Ok(Token::new(kind, Span::new(start, end)))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.cursor.advance();
        kind
    }

    /// True when the previous token can end an operand
    fn operator_expected(&self) -> bool {
        match &self.previous {
            None => false,
            Some(kind) => !(kind.is_operator()
                || matches!(
                    kind,
                    TokenKind::At
                        | TokenKind::ColonColon
                        | TokenKind::LeftParen
                        | TokenKind::LeftBracket
                        | TokenKind::Comma
                )),
        }
    }

    fn lex_name(&mut self) -> Result<TokenKind> {
        let first = self.lex_ncname()?;

        if self.operator_expected() {
            return match first.as_str() {
                "and" => Ok(TokenKind::And),
                "or" => Ok(TokenKind::Or),
                "mod" => Ok(TokenKind::Mod),
                "div" => Ok(TokenKind::Div),
                _ => Err(self.error(&format!("unexpected name '{first}'"))),
            };
        }

        // prefix:* or prefix:local, but not the axis separator
        if self.cursor.current() == Some(b':') && self.cursor.peek(1) != Some(b':') {
            self.cursor.advance();
            if self.cursor.consume(b'*') {
                return Ok(TokenKind::NameTest {
                    prefix: Some(first),
                    local: None,
                });
            }
            let local = self.lex_ncname()?;
            if self.next_significant() == Some(b'(') {
                return Ok(TokenKind::FunctionName(format!("{first}:{local}")));
            }
            return Ok(TokenKind::NameTest {
                prefix: Some(first),
                local: Some(local),
            });
        }

        match self.next_significant() {
            Some(b'(') if NODE_TYPES.contains(&first.as_str()) => Ok(TokenKind::NodeType(first)),
            Some(b'(') => Ok(TokenKind::FunctionName(first)),
            Some(b':') if self.lookahead_is(b"::") => Ok(TokenKind::AxisName(first)),
            _ => Ok(TokenKind::NameTest {
                prefix: None,
                local: Some(first),
            }),
        }
    }

    fn lex_qname(&mut self) -> Result<String> {
        let mut name = self.lex_ncname()?;
        if self.cursor.current() == Some(b':') && self.cursor.peek(1) != Some(b':') {
            self.cursor.advance();
            name.push(':');
            name.push_str(&self.lex_ncname()?);
        }
        Ok(name)
    }

    fn lex_ncname(&mut self) -> Result<String> {
        let start = self.cursor.pos();
        match self.cursor.current() {
            Some(b) if is_name_start(b) => self.cursor.advance(),
            _ => return Err(self.error("expected a name")),
        }
        while let Some(b) = self.cursor.current() {
            if is_name_char(b) {
                self.cursor.advance();
            } else {
                break;
            }
        }
        self.text(start)
    }

    fn lex_number(&mut self) -> Result<TokenKind> {
        let start = self.cursor.pos();
        while self.cursor.current().is_some_and(|b| b.is_ascii_digit()) {
            self.cursor.advance();
        }
        if self.cursor.consume(b'.') {
            while self.cursor.current().is_some_and(|b| b.is_ascii_digit()) {
                self.cursor.advance();
            }
        }
        let text = self.text(start)?;
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| self.error(&format!("invalid number '{text}'")))
    }

    fn lex_literal(&mut self) -> Result<TokenKind> {
        let quote = self.cursor.current();
        self.cursor.advance();
        let start = self.cursor.pos();
        while let Some(b) = self.cursor.current() {
            if Some(b) == quote {
                let literal = self.text(start)?;
                self.cursor.advance();
                return Ok(TokenKind::Literal(literal));
            }
            self.cursor.advance();
        }
        Err(self.error("unterminated string literal"))
    }

    /// Next non-whitespace byte without consuming
    fn next_significant(&self) -> Option<u8> {
        let mut ahead = self.cursor.clone();
        ahead.skip_whitespace();
        ahead.current()
    }

    fn lookahead_is(&self, pattern: &[u8]) -> bool {
        let mut ahead = self.cursor.clone();
        ahead.skip_whitespace();
        ahead.starts_with(pattern)
    }

    fn text(&self, start: usize) -> Result<String> {
        std::str::from_utf8(self.cursor.slice_from(start))
            .map(str::to_string)
            .map_err(|_| self.error("invalid utf-8"))
    }

    fn error(&self, detail: &str) -> Error {
        let pos = self.cursor.position();
        Error::with_message(
            ErrorKind::InvalidXPath {
                expression: self.source.to_string(),
            },
            Span::new(pos, pos),
            format!("Invalid expression '{}': {detail} at column {}", self.source, pos.col),
        )
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit() || matches!(b, b'-' | b'.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Result<Vec<TokenKind>> {
        Ok(XPathLexer::new(source)
            .tokenize()?
            .into_iter()
            .map(|token| token.kind)
            .collect())
    }

    fn name(local: &str) -> TokenKind {
        TokenKind::NameTest {
            prefix: None,
            local: Some(local.to_string()),
        }
    }

    #[test]
    fn test_simple_path() -> Result<()> {
        assert_eq!(
            kinds("/a//b")?,
            vec![
                TokenKind::Slash,
                name("a"),
                TokenKind::DoubleSlash,
                name("b"),
                TokenKind::Eof
            ]
        );
        Ok(())
    }

    #[test]
    fn test_star_disambiguation() -> Result<()> {
        assert_eq!(
            kinds("* * 2")?,
            vec![
                TokenKind::NameTest {
                    prefix: None,
                    local: None
                },
                TokenKind::Multiply,
                TokenKind::Number(2.0),
                TokenKind::Eof
            ]
        );
        Ok(())
    }

    #[test]
    fn test_operator_names() -> Result<()> {
        assert_eq!(
            kinds("div div div")?,
            vec![name("div"), TokenKind::Div, name("div"), TokenKind::Eof]
        );
        Ok(())
    }

    #[test]
    fn test_axis_function_and_node_type() -> Result<()> {
        assert_eq!(
            kinds("child::text() | count(x)")?,
            vec![
                TokenKind::AxisName("child".into()),
                TokenKind::ColonColon,
                TokenKind::NodeType("text".into()),
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Pipe,
                TokenKind::FunctionName("count".into()),
                TokenKind::LeftParen,
                name("x"),
                TokenKind::RightParen,
                TokenKind::Eof
            ]
        );
        Ok(())
    }

    #[test]
    fn test_prefixed_names() -> Result<()> {
        assert_eq!(
            kinds("p:a/p:*")?,
            vec![
                TokenKind::NameTest {
                    prefix: Some("p".into()),
                    local: Some("a".into())
                },
                TokenKind::Slash,
                TokenKind::NameTest {
                    prefix: Some("p".into()),
                    local: None
                },
                TokenKind::Eof
            ]
        );
        Ok(())
    }

    #[test]
    fn test_literals_and_numbers() -> Result<()> {
        assert_eq!(
            kinds("'a\"b' != .5")?,
            vec![
                TokenKind::Literal("a\"b".into()),
                TokenKind::NotEq,
                TokenKind::Number(0.5),
                TokenKind::Eof
            ]
        );
        Ok(())
    }

    #[test]
    fn test_rejects_garbage() {
        let err = kinds("/a#b").err();
        assert!(matches!(
            err.map(|e| e.kind().clone()),
            Some(ErrorKind::InvalidXPath { .. })
        ));
        assert!(kinds("'open").is_err());
    }
}
