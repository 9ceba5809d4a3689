//! Lexer module for tokenization

pub mod cursor;
pub mod token;
pub mod xpath;

pub use cursor::Cursor;
pub use token::{Token, TokenKind};
