//! Block Lexer
//!
//! Splits one G-code block into word, assignment and comment tokens.
//! Sanitized input has no whitespace or comments, but both are tolerated.

/// Token types in a block
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    /// Address word like "G1", "X-10.5" or "X#12"
    Word,
    /// Parameter assignment like "#12=3.5"
    Assignment,
    /// Comment (semicolon or parenthetical)
    Comment,
    /// Anything else
    Unknown,
}

/// A token with its text content
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

/// Tokenize one block
pub fn tokenize_block(block: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = block.char_indices().peekable();

    while let Some((start_idx, ch)) = chars.next() {
        match ch {
            ' ' | '\t' | '\r' | '\n' => continue,

            // Semicolon comment: consume rest of block
            ';' => {
                tokens.push(Token {
                    kind: TokenKind::Comment,
                    text: block[start_idx..].to_string(),
                });
                break;
            }

            '(' => {
                let mut end_idx = block.len();
                for (idx, ch) in chars.by_ref() {
                    if ch == ')' {
                        end_idx = idx + 1;
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Comment,
                    text: block[start_idx..end_idx].to_string(),
                });
            }

            // "#<ref>=<value>"
            '#' => {
                let mut end_idx = consume_value(block, start_idx + 1, &mut chars);
                let kind = match chars.peek() {
                    Some(&(idx, '=')) => {
                        chars.next();
                        end_idx = consume_value(block, idx + 1, &mut chars);
                        TokenKind::Assignment
                    }
                    _ => TokenKind::Unknown,
                };
                tokens.push(Token {
                    kind,
                    text: block[start_idx..end_idx].to_string(),
                });
            }

            c if c.is_ascii_alphabetic() => {
                let end_idx = consume_value(block, start_idx + 1, &mut chars);
                tokens.push(Token {
                    kind: TokenKind::Word,
                    text: block[start_idx..end_idx].to_string(),
                });
            }

            _ => tokens.push(Token {
                kind: TokenKind::Unknown,
                text: ch.to_string(),
            }),
        }
    }

    tokens
}

/// Consume a value: an optional sign, any number of `#`, then digits and
/// dots. Returns the end index.
fn consume_value(
    block: &str,
    mut end_idx: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> usize {
    let mut allow_sign = true;
    let mut in_number = false;
    while let Some(&(idx, next_ch)) = chars.peek() {
        let accepted = match next_ch {
            '+' | '-' if allow_sign && !in_number => {
                allow_sign = false;
                true
            }
            '#' if !in_number => {
                allow_sign = true;
                true
            }
            c if c.is_ascii_digit() || c == '.' => {
                in_number = true;
                true
            }
            _ => false,
        };
        if !accepted {
            break;
        }
        end_idx = idx + next_ch.len_utf8();
        chars.next();
    }
    end_idx.min(block.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_tokenize_packed_block() {
        let tokens = tokenize_block("G01X10.5Y-2Z+3F100");
        assert_eq!(texts(&tokens), ["G01", "X10.5", "Y-2", "Z+3", "F100"]);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Word));
    }

    #[test]
    fn test_tokenize_with_spaces_and_comment() {
        let tokens = tokenize_block("G1 X10 (move) ; rest");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[2].kind, TokenKind::Comment);
        assert_eq!(tokens[2].text, "(move)");
        assert_eq!(tokens[3].text, "; rest");
    }

    #[test]
    fn test_tokenize_references() {
        let tokens = tokenize_block("X#12Y##3");
        assert_eq!(texts(&tokens), ["X#12", "Y##3"]);
    }

    #[test]
    fn test_tokenize_assignments() {
        let tokens = tokenize_block("G0X1#12=3.5#13=#12#14=-2");
        assert_eq!(texts(&tokens), ["G0", "X1", "#12=3.5", "#13=#12", "#14=-2"]);
        assert_eq!(tokens[2].kind, TokenKind::Assignment);
        assert_eq!(tokens[4].kind, TokenKind::Assignment);
    }

    #[test]
    fn test_bare_reference_is_unknown() {
        let tokens = tokenize_block("#12");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
    }

    #[test]
    fn test_tokenize_empty_block() {
        assert!(tokenize_block("   ").is_empty());
    }
}
