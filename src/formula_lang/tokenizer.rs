//! Tokenizes the human-readable property grammar: standard first-order
//! connectives, `next`/`prev`, `!=`, and the sugar call-forms `posedge(x)`,
//! `negedge(x)`, `change(x)`, `nochange(x)`, `memacc(m, i)`, `maxbvval(x)`.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Comma,
    Not,
    And,
    Or,
    Xor,
    Implies,
    Iff,
    Eq,
    Neq,
    Ult,
    Ule,
    Ugt,
    Uge,
    True,
    False,
    /// `next`/`prev` keywords and plain identifiers/function names share the
    /// same lexical class; the parser decides which role a given `Ident` plays.
    Ident(String),
    HexLit(u128),
    DecLit(u128),
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn collect_ident(chars: &mut Peekable<Chars>, first: char) -> String {
    let mut s = String::new();
    s.push(first);
    while let Some(&c) = chars.peek() {
        if is_ident_char(c) {
            s.push(c);
            chars.next();
        } else {
            break;
        }
    }
    s
}

fn collect_hex(chars: &mut Peekable<Chars>) -> Result<u128, String> {
    let mut s = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_hexdigit() {
            s.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if s.is_empty() {
        return Err("expected hex digits after '0x'".to_string());
    }
    u128::from_str_radix(&s, 16).map_err(|e| e.to_string())
}

fn collect_dec(chars: &mut Peekable<Chars>, first: char) -> Result<u128, String> {
    let mut s = String::new();
    s.push(first);
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            s.push(c);
            chars.next();
        } else {
            break;
        }
    }
    s.parse().map_err(|_| format!("invalid number literal '{s}'"))
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut chars = input.chars().peekable();
    let mut tokens = Vec::new();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            '!' => {
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Neq);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '&' => tokens.push(Token::And),
            '|' => tokens.push(Token::Or),
            '^' => tokens.push(Token::Xor),
            '=' => {
                if chars.peek() == Some(&'>') {
                    chars.next();
                    tokens.push(Token::Implies);
                } else {
                    tokens.push(Token::Eq);
                }
            }
            '<' => match chars.peek() {
                Some(&'=') => {
                    chars.next();
                    if chars.peek() == Some(&'>') {
                        chars.next();
                        tokens.push(Token::Iff);
                    } else {
                        tokens.push(Token::Ule);
                    }
                }
                _ => tokens.push(Token::Ult),
            },
            '>' => match chars.peek() {
                Some(&'=') => {
                    chars.next();
                    tokens.push(Token::Uge);
                }
                _ => tokens.push(Token::Ugt),
            },
            '0' if chars.peek() == Some(&'x') => {
                chars.next();
                tokens.push(Token::HexLit(collect_hex(&mut chars)?));
            }
            c if c.is_ascii_digit() => tokens.push(Token::DecLit(collect_dec(&mut chars, c)?)),
            c if is_ident_start(c) => {
                let name = collect_ident(&mut chars, c);
                match name.as_str() {
                    "true" => tokens.push(Token::True),
                    "false" => tokens.push(Token::False),
                    _ => tokens.push(Token::Ident(name)),
                }
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_connectives_and_literals() {
        let tokens = tokenize("a & b != 0x0a <=> c").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::And,
                Token::Ident("b".into()),
                Token::Neq,
                Token::HexLit(10),
                Token::Iff,
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_sugar_call_form() {
        let tokens = tokenize("posedge(clk)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("posedge".into()),
                Token::LParen,
                Token::Ident("clk".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_comparison_operators() {
        let tokens = tokenize("a <= b & a >= c").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::Ule,
                Token::Ident("b".into()),
                Token::And,
                Token::Ident("a".into()),
                Token::Uge,
                Token::Ident("c".into()),
            ]
        );
    }
}
