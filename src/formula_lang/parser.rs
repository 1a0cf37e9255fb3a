//! Recursive-descent parser over [Token]s, precedence levels numbered from
//! weakest to strongest binding (mirroring the teacher's `parse_1_hybrid` …
//! `parse_9_terminal_and_parentheses` ladder, adapted to this grammar's
//! connectives instead of HCTL's hybrid/temporal operators):
//!
//!  1. iff   2. implies   3. or   4. xor   5. and
//!  6. equality/comparison (`=`,`!=`,`<`,`<=`,`>`,`>=`)
//!  7. unary (`!`, `next`, `prev`)
//!  8. atoms, sugar calls, parenthesized subexpressions

use crate::error::CoreError;
use crate::expr::Expr;
use crate::formula_lang::sugar;
use crate::formula_lang::tokenizer::Token;
use crate::symbol::Symbol;
use crate::ts::{to_next, to_prev};

use std::collections::HashMap;

fn sort_err(e: String) -> CoreError {
    CoreError::Sort(e)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    env: &'a HashMap<String, Symbol>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, tok: &Token) -> Result<(), CoreError> {
        match self.advance() {
            Some(t) if t == tok => Ok(()),
            Some(t) => Err(CoreError::Parse(format!("expected {tok:?}, got {t:?}"))),
            None => Err(CoreError::Parse(format!("expected {tok:?}, got end of input"))),
        }
    }

    fn parse_iff(&mut self) -> Result<Expr, CoreError> {
        let mut left = self.parse_implies()?;
        while self.peek() == Some(&Token::Iff) {
            self.advance();
            let right = self.parse_implies()?;
            left = Expr::iff(left, right).map_err(sort_err)?;
        }
        Ok(left)
    }

    fn parse_implies(&mut self) -> Result<Expr, CoreError> {
        let left = self.parse_or()?;
        if self.peek() == Some(&Token::Implies) {
            self.advance();
            let right = self.parse_implies()?; // right-associative
            return Expr::implies(left, right).map_err(sort_err);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, CoreError> {
        let mut left = self.parse_xor()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_xor()?;
            left = Expr::or(left, right).map_err(sort_err)?;
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> Result<Expr, CoreError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Xor) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::xor(left, right).map_err(sort_err)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CoreError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::and(left, right).map_err(sort_err)?;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, CoreError> {
        let left = self.parse_unary()?;
        let ctor: Option<fn(Expr, Expr) -> Result<Expr, String>> = match self.peek() {
            Some(Token::Eq) => Some(Expr::equals),
            Some(Token::Neq) => Some(Expr::not_equals),
            Some(Token::Ult) => Some(Expr::bv_ult),
            Some(Token::Ule) => Some(Expr::bv_ule),
            Some(Token::Ugt) => Some(Expr::bv_ugt),
            Some(Token::Uge) => Some(Expr::bv_uge),
            _ => None,
        };
        match ctor {
            Some(ctor) => {
                self.advance();
                let right = self.parse_unary()?;
                let (left, right) = widen_bv_literal(left, right);
                ctor(left, right).map_err(sort_err)
            }
            None => Ok(left),
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, CoreError> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                let inner = self.parse_unary()?;
                Expr::not(inner).map_err(sort_err)
            }
            Some(Token::Ident(name)) if name == "next" => {
                self.advance();
                self.expect(&Token::LParen)?;
                let inner = self.parse_iff()?;
                self.expect(&Token::RParen)?;
                Ok(to_next(&inner))
            }
            Some(Token::Ident(name)) if name == "prev" => {
                self.advance();
                self.expect(&Token::LParen)?;
                let inner = self.parse_iff()?;
                self.expect(&Token::RParen)?;
                Ok(to_prev(&inner))
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, CoreError> {
        match self.advance().cloned() {
            Some(Token::True) => Ok(Expr::tru()),
            Some(Token::False) => Ok(Expr::fls()),
            Some(Token::HexLit(v)) => Ok(Expr::BvConst { value: v, width: bitwidth_of(v) }),
            Some(Token::DecLit(v)) => Ok(Expr::BvConst { value: v, width: bitwidth_of(v) }),
            Some(Token::LParen) => {
                let inner = self.parse_iff()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => self.parse_ident(&name),
            Some(other) => Err(CoreError::Parse(format!("unexpected token {other:?}"))),
            None => Err(CoreError::Parse("unexpected end of input".to_string())),
        }
    }

    fn parse_ident(&mut self, name: &str) -> Result<Expr, CoreError> {
        if self.peek() == Some(&Token::LParen) {
            return self.parse_call(name);
        }
        match self.env.get(name) {
            Some(sym) => Ok(Expr::var(sym.clone())),
            None => Err(CoreError::Parse(format!("unknown symbol '{name}'"))),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, CoreError> {
        if name == "memacc" {
            self.expect(&Token::LParen)?;
            let array_name = match self.advance().cloned() {
                Some(Token::Ident(n)) => n,
                other => {
                    return Err(CoreError::Parse(format!(
                        "memacc requires a bare array/family name as its first argument, got {other:?}"
                    )))
                }
            };
            self.expect(&Token::Comma)?;
            let index = self.parse_iff()?;
            self.expect(&Token::RParen)?;
            return sugar::memacc(self.env, &array_name, index);
        }

        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            args.push(self.parse_iff()?);
            while self.peek() == Some(&Token::Comma) {
                self.advance();
                args.push(self.parse_iff()?);
            }
        }
        self.expect(&Token::RParen)?;

        match (name, args.len()) {
            ("posedge", 1) => sugar::posedge(args.into_iter().next().unwrap()),
            ("negedge", 1) => sugar::negedge(args.into_iter().next().unwrap()),
            ("change", 1) => sugar::change(args.into_iter().next().unwrap()),
            ("nochange", 1) => sugar::nochange(args.into_iter().next().unwrap()),
            ("maxbvval", 1) => sugar::maxbvval(&args[0]),
            (other, n) => Err(CoreError::Parse(format!(
                "unknown function '{other}' with {n} argument(s)"
            ))),
        }
    }
}

/// Literals carry no explicit width annotation in this grammar; the smallest
/// width that fits the value is inferred (minimum 1 bit) and then widened to
/// match the other side of a comparison, if that side is a differently-sized
/// bit-vector.
fn bitwidth_of(value: u128) -> u32 {
    let bits = 128 - value.leading_zeros();
    bits.max(1)
}

/// If exactly one side is an inferred-width [Expr::BvConst] and the other is a
/// bit-vector of a different width, re-widens the constant to match.
fn widen_bv_literal(left: Expr, right: Expr) -> (Expr, Expr) {
    use crate::sorts::Sort;
    match (&left, &right) {
        (Expr::BvConst { value, width }, other) => {
            if let Sort::BitVec(w) = other.sort() {
                if w != *width {
                    return (Expr::bv_const(*value, w), right);
                }
            }
            (left, right)
        }
        (other, Expr::BvConst { value, width }) => {
            if let Sort::BitVec(w) = other.sort() {
                if w != *width {
                    return (left, Expr::bv_const(*value, w));
                }
            }
            (left, right)
        }
        _ => (left, right),
    }
}

/// Parses `input` into an [Expr], resolving identifiers against `env` (the set
/// of in-scope variable symbols, typically an HTS's `all_vars()`).
pub fn parse_formula(input: &str, env: &HashMap<String, Symbol>) -> Result<Expr, CoreError> {
    let tokens = crate::formula_lang::tokenizer::tokenize(input).map_err(CoreError::Parse)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        env,
    };
    let expr = parser.parse_iff()?;
    if parser.pos != tokens.len() {
        return Err(CoreError::Parse(format!(
            "unexpected trailing input at token {}",
            parser.pos
        )));
    }
    Ok(expr)
}
