//! Recursive-descent XPath 1.0 parser

use crate::error::{Error, ErrorKind, Result, Span};
use crate::lexer::token::{Token, TokenKind};
use crate::lexer::xpath::XPathLexer;
use crate::xpath::ast::{Axis, BinaryOp, Expr, LocationPath, NodeTest, Step};

/// XPath parser over a token stream
#[derive(Debug)]
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Tokenize `source` and prepare to parse it
    pub fn new(source: &'a str) -> Result<Self> {
        let tokens = XPathLexer::new(source).tokenize()?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
        })
    }

    /// Parse a complete expression
    pub fn parse(&mut self) -> Result<Expr> {
        if self.peek() == &TokenKind::Eof {
            return Err(self.error("empty expression"));
        }
        let expr = self.parse_or()?;
        if self.peek() != &TokenKind::Eof {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Lte => BinaryOp::Lte,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Gte => BinaryOp::Gte,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Multiply => BinaryOp::Mul,
                TokenKind::Div => BinaryOp::Div,
                TokenKind::Mod => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::Minus) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr> {
        let mut left = self.parse_path()?;
        while self.eat(&TokenKind::Pipe) {
            let right = self.parse_path()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_path(&mut self) -> Result<Expr> {
        let starts_primary = matches!(
            self.peek(),
            TokenKind::Variable(_)
                | TokenKind::LeftParen
                | TokenKind::Literal(_)
                | TokenKind::Number(_)
                | TokenKind::FunctionName(_)
        );
        if !starts_primary {
            return self.parse_location_path().map(Expr::Path);
        }

        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let filter = if predicates.is_empty() {
            primary
        } else {
            Expr::Filter {
                primary: Box::new(primary),
                predicates,
            }
        };

        let mut steps = Vec::new();
        match self.peek() {
            TokenKind::Slash => {
                self.advance();
                self.parse_relative_steps(&mut steps)?;
            }
            TokenKind::DoubleSlash => {
                self.advance();
                steps.push(Step::descendant_or_self());
                self.parse_relative_steps(&mut steps)?;
            }
            _ => return Ok(filter),
        }
        Ok(Expr::PathFrom {
            filter: Box::new(filter),
            steps,
        })
    }

    fn parse_location_path(&mut self) -> Result<LocationPath> {
        let mut steps = Vec::new();
        match self.peek() {
            TokenKind::Slash => {
                self.advance();
                if self.starts_step() {
                    self.parse_relative_steps(&mut steps)?;
                }
                Ok(LocationPath {
                    absolute: true,
                    steps,
                })
            }
            TokenKind::DoubleSlash => {
                self.advance();
                steps.push(Step::descendant_or_self());
                self.parse_relative_steps(&mut steps)?;
                Ok(LocationPath {
                    absolute: true,
                    steps,
                })
            }
            _ => {
                self.parse_relative_steps(&mut steps)?;
                Ok(LocationPath {
                    absolute: false,
                    steps,
                })
            }
        }
    }

    fn parse_relative_steps(&mut self, steps: &mut Vec<Step>) -> Result<()> {
        steps.push(self.parse_step()?);
        loop {
            match self.peek() {
                TokenKind::Slash => {
                    self.advance();
                }
                TokenKind::DoubleSlash => {
                    self.advance();
                    steps.push(Step::descendant_or_self());
                }
                _ => return Ok(()),
            }
            steps.push(self.parse_step()?);
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::NameTest { .. }
                | TokenKind::NodeType(_)
                | TokenKind::AxisName(_)
                | TokenKind::At
                | TokenKind::Dot
                | TokenKind::DotDot
        )
    }

    fn parse_step(&mut self) -> Result<Step> {
        if self.eat(&TokenKind::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&TokenKind::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = match self.peek().clone() {
            TokenKind::At => {
                self.advance();
                Axis::Attribute
            }
            TokenKind::AxisName(name) => {
                let axis = Axis::from_name(&name)
                    .ok_or_else(|| self.error(&format!("unknown axis '{name}'")))?;
                self.advance();
                self.expect(&TokenKind::ColonColon)?;
                axis
            }
            _ => Axis::Child,
        };

        let test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest> {
        match self.peek().clone() {
            TokenKind::NameTest { prefix, local } => {
                self.advance();
                Ok(match (prefix, local) {
                    (None, None) => NodeTest::Wildcard,
                    (Some(prefix), None) => NodeTest::NamespaceWildcard(prefix),
                    (prefix, Some(local)) => NodeTest::Name { prefix, local },
                })
            }
            TokenKind::NodeType(kind) => {
                self.advance();
                self.expect(&TokenKind::LeftParen)?;
                let test = match kind.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    "comment" => NodeTest::Comment,
                    _ => match self.peek().clone() {
                        TokenKind::Literal(target) => {
                            self.advance();
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                };
                self.expect(&TokenKind::RightParen)?;
                Ok(test)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>> {
        let mut predicates = Vec::new();
        while self.eat(&TokenKind::LeftBracket) {
            predicates.push(self.parse_or()?);
            self.expect(&TokenKind::RightBracket)?;
        }
        Ok(predicates)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            TokenKind::Variable(name) => {
                self.advance();
                Ok(Expr::Variable(name))
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(inner)
            }
            TokenKind::Literal(text) => {
                self.advance();
                Ok(Expr::Literal(text))
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::FunctionName(name) => {
                self.advance();
                self.expect(&TokenKind::LeftParen)?;
                let mut args = Vec::new();
                if !self.eat(&TokenKind::RightParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&TokenKind::RightParen) {
                            break;
                        }
                        self.expect(&TokenKind::Comma)?;
                    }
                }
                Ok(Expr::Function { name, args })
            }
            _ => Err(self.unexpected()),
        }
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map_or(&TokenKind::Eof, |token| &token.kind)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map_or_else(Span::empty, |token| token.span)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected {}, found {}",
                kind.name(),
                self.peek().name()
            )))
        }
    }

    fn unexpected(&self) -> Error {
        self.error(&format!("unexpected {}", self.peek().name()))
    }

    fn error(&self, detail: &str) -> Error {
        let span = self.span();
        Error::with_message(
            ErrorKind::InvalidXPath {
                expression: self.source.to_string(),
            },
            span,
            format!(
                "Invalid expression '{}': {detail} at column {}",
                self.source, span.start.col
            ),
        )
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Parse an XPath expression
pub fn parse(source: &str) -> Result<Expr> {
    Parser::new(source)?.parse()
}
