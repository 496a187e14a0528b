//! Block Syntax
//!
//! Words and assignments parsed once per block. Values stay unresolved until
//! they are read against the committed parameter store.

use crate::parameters::ParameterStore;
use crate::parser::lexer::{Token, TokenKind};

/// A word or assignment operand
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Literal(f64),
    /// `#<value>`, nestable
    Reference(Box<Value>),
    /// `-#<value>`
    Negated(Box<Value>),
    Malformed,
}

impl Value {
    /// Resolve against committed parameters. Malformed values and references
    /// to missing parameters resolve to NaN.
    pub fn resolve(&self, params: &ParameterStore) -> f64 {
        match self {
            Value::Literal(v) => *v,
            Value::Reference(inner) => {
                let index = inner.resolve(params);
                if index.is_finite() && index >= 0.0 {
                    params.get(index as usize)
                } else {
                    f64::NAN
                }
            }
            Value::Negated(inner) => -inner.resolve(params),
            Value::Malformed => f64::NAN,
        }
    }
}

/// An address word like `X-10.5`
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub letter: char,
    pub value: Value,
}

/// `#target=value`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Value,
    pub value: Value,
}

/// One parsed block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedBlock {
    pub words: Vec<Word>,
    pub assignments: Vec<Assignment>,
    /// Tokens that were neither words, assignments nor comments
    pub unknown: Vec<String>,
}

impl ParsedBlock {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.assignments.is_empty()
    }
}

/// Convert tokens into a parsed block
pub fn tokens_to_block(tokens: Vec<Token>) -> ParsedBlock {
    let mut block = ParsedBlock::default();

    for token in tokens {
        match token.kind {
            TokenKind::Word => {
                if let Some(word) = parse_word_token(&token.text) {
                    block.words.push(word);
                }
            }
            TokenKind::Assignment => match token.text.split_once('=') {
                Some((target, value)) => block.assignments.push(Assignment {
                    // `#1=` addresses #1 itself, `##3=` addresses #(#3)
                    target: target
                        .strip_prefix('#')
                        .map_or(Value::Malformed, parse_value),
                    value: parse_value(value),
                }),
                None => block.unknown.push(token.text),
            },
            TokenKind::Comment => {}
            TokenKind::Unknown => block.unknown.push(token.text),
        }
    }

    block
}

/// Parse a word token like "X10.5"
fn parse_word_token(text: &str) -> Option<Word> {
    let mut chars = text.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !letter.is_ascii_alphabetic() {
        return None;
    }

    Some(Word {
        letter,
        value: parse_value(chars.as_str()),
    })
}

/// Parse "10.5", "#12", "##3" or "-#4"
pub fn parse_value(text: &str) -> Value {
    if let Some(rest) = text.strip_prefix('#') {
        return Value::Reference(Box::new(parse_value(rest)));
    }
    if let Some(rest) = text.strip_prefix('-').filter(|rest| rest.starts_with('#')) {
        return Value::Negated(Box::new(parse_value(rest)));
    }

    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Literal(v),
        _ => Value::Malformed,
    }
}
