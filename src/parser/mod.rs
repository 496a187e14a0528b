//! Block Parser
//!
//! Tokenization and syntax for a single G-code block. Each word is parsed
//! once; the interpreter then queries the resolved [`Block`].

pub mod ast;
pub mod block;
pub mod lexer;

pub use ast::{Assignment, ParsedBlock, Value, Word};
pub use block::{ABSENT_INTEGER, Block};
pub use lexer::{Token, TokenKind, tokenize_block};

/// Parse a single block into structured data
pub fn parse_block(text: &str) -> ParsedBlock {
    ast::tokens_to_block(lexer::tokenize_block(text))
}
