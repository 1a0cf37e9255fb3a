//! SMT-LIB2 rendering of [Expr] trees and [Sort]s.
//!
//! Kept separate from [crate::expr] itself: the AST module owns construction and
//! rewriting, this one owns the one serialization format every solver backend and
//! the `.smt2` trace tee both need.

use crate::expr::Expr;
use crate::sorts::Sort;
use std::fmt::Write as _;

/// Render a sort in SMT-LIB2 syntax. Delegates to `Sort`'s own `Display` impl, which
/// already produces SMT-LIB2-shaped output.
pub fn sort_to_smtlib2(sort: &Sort) -> String {
    sort.to_string()
}

/// Render an expression as an SMT-LIB2 term.
pub fn expr_to_smtlib2(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::BoolConst(true) => out.push_str("true"),
        Expr::BoolConst(false) => out.push_str("false"),
        Expr::BvConst { value, width } => {
            let _ = write!(out, "(_ bv{value} {width})");
        }
        Expr::Var(s) => out.push_str(&s.name),
        Expr::Not(a) => write_unary(out, "not", a),
        Expr::BvNot(a) => write_unary(out, "bvnot", a),
        Expr::And(a, b) => write_binary(out, "and", a, b),
        Expr::Or(a, b) => write_binary(out, "or", a, b),
        Expr::Xor(a, b) => write_binary(out, "xor", a, b),
        Expr::Implies(a, b) => write_binary(out, "=>", a, b),
        Expr::Iff(a, b) => write_binary(out, "=", a, b),
        Expr::Equals(a, b) => write_binary(out, "=", a, b),
        Expr::BvAdd(a, b) => write_binary(out, "bvadd", a, b),
        Expr::BvSub(a, b) => write_binary(out, "bvsub", a, b),
        Expr::BvShl(a, b) => write_binary(out, "bvshl", a, b),
        Expr::BvAnd(a, b) => write_binary(out, "bvand", a, b),
        Expr::BvOr(a, b) => write_binary(out, "bvor", a, b),
        Expr::BvXor(a, b) => write_binary(out, "bvxor", a, b),
        Expr::BvUlt(a, b) => write_binary(out, "bvult", a, b),
        Expr::BvUle(a, b) => write_binary(out, "bvule", a, b),
        Expr::BvUgt(a, b) => write_binary(out, "bvugt", a, b),
        Expr::BvUge(a, b) => write_binary(out, "bvuge", a, b),
        Expr::Concat(a, b) => write_binary(out, "concat", a, b),
        Expr::Select(a, b) => write_binary(out, "select", a, b),
        Expr::Ite(c, t, e) => {
            out.push_str("(ite ");
            write_expr(out, c);
            out.push(' ');
            write_expr(out, t);
            out.push(' ');
            write_expr(out, e);
            out.push(')');
        }
        Expr::Store(a, i, v) => {
            out.push_str("(store ");
            write_expr(out, a);
            out.push(' ');
            write_expr(out, i);
            out.push(' ');
            write_expr(out, v);
            out.push(')');
        }
        Expr::Extract { hi, lo, expr } => {
            let _ = write!(out, "((_ extract {hi} {lo}) ");
            write_expr(out, expr);
            out.push(')');
        }
    }
}

fn write_unary(out: &mut String, op: &str, a: &Expr) {
    let _ = write!(out, "({op} ");
    write_expr(out, a);
    out.push(')');
}

fn write_binary(out: &mut String, op: &str, a: &Expr, b: &Expr) {
    let _ = write!(out, "({op} ");
    write_expr(out, a);
    out.push(' ');
    write_expr(out, b);
    out.push(')');
}

/// A `(declare-fun name () sort)` line, as emitted to the trace tee and sent to the
/// backend the first time a symbol is referenced.
pub fn declare_fun_smtlib2(name: &str, sort: &Sort) -> String {
    format!("(declare-fun {name} () {})", sort_to_smtlib2(sort))
}

/// A top-level `(assert ...)` line.
pub fn assert_smtlib2(expr: &Expr) -> String {
    format!("(assert {})", expr_to_smtlib2(expr))
}
