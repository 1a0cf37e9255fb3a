//! The abstract SMT interface the façade drives, and its one concrete, process-backed
//! implementation.

use crate::error::CoreError;
use crate::expr::Expr;
use crate::printer;
use crate::sorts::Sort;
use crate::symbol::Symbol;

use rsmt2::errors::ErrorKind;
use rsmt2::parse::{IdentParser, ValueParser};
use rsmt2::print::{Expr2Smt, Sort2Smt};
use rsmt2::{Logic as Rsmt2Logic, SmtConf, SmtRes, Solver};

use log::debug;
use std::collections::HashMap;
use std::path::Path;

/// Satisfiability verdict from the underlying solver.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SatResult {
    #[default]
    Sat,
    Unsat,
    Unknown,
}

/// Declared symbol name to its raw SMT-LIB2 value literal. Turning a literal into a
/// typed value — including walking an array's `store` chain back to a base value —
/// is the trace module's job, not the backend's.
pub type RawModel = HashMap<String, String>;

/// Abstract interface every SMT back-end implements, mirroring the operations the
/// rest of the crate is allowed to depend on: `new`, `set_logic`, `declare`,
/// `assert`, `push`, `pop`, `check_sat`, `get_model`, `reset`, `exit`.
pub trait SmtBackend {
    fn set_logic(&mut self, logic_name: &str) -> Result<(), CoreError>;
    fn declare(&mut self, symbol: &Symbol) -> Result<(), CoreError>;
    fn assert(&mut self, expr: &Expr) -> Result<(), CoreError>;
    fn push(&mut self) -> Result<(), CoreError>;
    fn pop(&mut self) -> Result<(), CoreError>;
    fn check_sat(&mut self) -> Result<SatResult, CoreError>;
    fn get_model(&mut self) -> Result<RawModel, CoreError>;
    fn reset(&mut self) -> Result<(), CoreError>;
    fn exit(&mut self) -> Result<(), CoreError>;
    /// Best-effort SMT-LIB2 trace tee; a backend that can't support this is free to
    /// no-op.
    fn tee(&mut self, path: &Path) -> Result<(), CoreError>;
    /// A `;; <text>` comment line, used to delimit labeled regions in the trace.
    fn comment(&mut self, text: &str) -> Result<(), CoreError>;
    fn supports_interpolation(&self) -> bool {
        false
    }
}

impl Expr2Smt<()> for Expr {
    fn expr_to_smt2<Writer: std::io::Write>(&self, w: &mut Writer, _: ()) -> SmtRes<()> {
        write!(w, "{}", printer::expr_to_smtlib2(self))?;
        Ok(())
    }
}

impl Sort2Smt for Sort {
    fn sort_to_smt2<Writer: std::io::Write>(&self, w: &mut Writer) -> SmtRes<()> {
        write!(w, "{self}")?;
        Ok(())
    }
}

/// A process-backed SMT-LIB2 driver over `rsmt2`. One instance per BMC run (or per
/// strategy thread, when `ALL` races strategies against each other).
pub struct Rsmt2Backend {
    solver: Solver<ModelParser>,
    declared: HashMap<String, Sort>,
}

impl Rsmt2Backend {
    /// `solver_name` selects the underlying process (`"z3"`, `"cvc4"`, `"yices2"`);
    /// unrecognized names, including `"msat"` (no `rsmt2::SmtConf` constructor for
    /// MathSAT), fall back to `z3`.
    pub fn new(solver_name: &str) -> Result<Rsmt2Backend, CoreError> {
        let conf = conf_for(solver_name);
        let mut solver =
            Solver::new(conf, ModelParser).map_err(|e| CoreError::Solver(e.to_string()))?;
        solver
            .produce_models()
            .map_err(|e| CoreError::Solver(e.to_string()))?;
        Ok(Rsmt2Backend {
            solver,
            declared: HashMap::new(),
        })
    }
}

fn conf_for(solver_name: &str) -> SmtConf {
    match solver_name {
        "z3" => SmtConf::z3("z3"),
        "cvc4" => SmtConf::cvc4("cvc4"),
        "yices2" | "yices" => SmtConf::yices_2("yices-smt2"),
        other => {
            debug!("unrecognized solver name {other:?}, defaulting to z3");
            SmtConf::z3("z3")
        }
    }
}

fn to_core_error<T>(res: SmtRes<T>) -> Result<T, CoreError> {
    res.map_err(|e| CoreError::Solver(e.to_string()))
}

impl SmtBackend for Rsmt2Backend {
    fn set_logic(&mut self, logic_name: &str) -> Result<(), CoreError> {
        let logic = match logic_name {
            "QF_BV" => Rsmt2Logic::QF_BV,
            "QF_ABV" => Rsmt2Logic::QF_AUFBV,
            other => return Err(CoreError::Solver(format!("unsupported logic {other}"))),
        };
        to_core_error(self.solver.set_logic(logic))
    }

    fn declare(&mut self, symbol: &Symbol) -> Result<(), CoreError> {
        if self.declared.contains_key(&symbol.name) {
            return Ok(());
        }
        to_core_error(self.solver.declare_const(&symbol.name, &symbol.sort))?;
        self.declared.insert(symbol.name.clone(), symbol.sort.clone());
        Ok(())
    }

    fn assert(&mut self, expr: &Expr) -> Result<(), CoreError> {
        to_core_error(self.solver.assert(expr))
    }

    fn push(&mut self) -> Result<(), CoreError> {
        to_core_error(self.solver.push(1))
    }

    fn pop(&mut self) -> Result<(), CoreError> {
        to_core_error(self.solver.pop(1))
    }

    fn check_sat(&mut self) -> Result<SatResult, CoreError> {
        match self.solver.check_sat() {
            Ok(true) => Ok(SatResult::Sat),
            Ok(false) => Ok(SatResult::Unsat),
            Err(e) => match e.kind() {
                ErrorKind::Unknown => Ok(SatResult::Unknown),
                _ => Err(CoreError::Solver(e.to_string())),
            },
        }
    }

    fn get_model(&mut self) -> Result<RawModel, CoreError> {
        let model = to_core_error(self.solver.get_model())?;
        let mut out = RawModel::new();
        for (name, args, _sort, value) in model {
            if args.is_empty() {
                out.insert(name, value);
            }
        }
        Ok(out)
    }

    fn reset(&mut self) -> Result<(), CoreError> {
        self.declared.clear();
        to_core_error(self.solver.reset())
    }

    fn exit(&mut self) -> Result<(), CoreError> {
        to_core_error(self.solver.kill())
    }

    fn tee(&mut self, path: &Path) -> Result<(), CoreError> {
        let file =
            std::fs::File::create(path).map_err(|e| CoreError::Solver(e.to_string()))?;
        to_core_error(self.solver.path_tee(file))
    }

    fn comment(&mut self, text: &str) -> Result<(), CoreError> {
        to_core_error(self.solver.comment(text))
    }
}

/// Parses the solver's raw textual responses (identifiers, sorts, value literals)
/// back into the same string-ish shapes the rest of the crate expects — typed
/// reconstruction (including array store-chain walking) happens in [crate::trace].
#[derive(Clone, Copy)]
struct ModelParser;

impl<'a> IdentParser<String, Sort, &'a str> for ModelParser {
    fn parse_ident(self, input: &'a str) -> SmtRes<String> {
        Ok(input.to_string())
    }

    fn parse_type(self, input: &'a str) -> SmtRes<Sort> {
        parse_sort(input).ok_or_else(|| format!("cannot parse sort from {input:?}").into())
    }
}

impl<'a> ValueParser<String, &'a str> for ModelParser {
    fn parse_value(self, input: &'a str) -> SmtRes<String> {
        Ok(input.to_string())
    }
}

/// Minimal hand-rolled SMT-LIB2 sort parser: `Bool`, `(_ BitVec n)`, `(Array i e)`.
fn parse_sort(input: &str) -> Option<Sort> {
    let s = input.trim();
    if s == "Bool" {
        return Some(Sort::Bool);
    }
    if let Some(rest) = s.strip_prefix("(_ BitVec ") {
        let width: u32 = rest.trim_end_matches(')').trim().parse().ok()?;
        return Some(Sort::BitVec(width));
    }
    if let Some(rest) = s.strip_prefix("(Array ") {
        let rest = rest.strip_suffix(')')?;
        let (idx_str, elem_str) = split_top_level(rest)?;
        let index = parse_sort(idx_str)?;
        let element = parse_sort(elem_str)?;
        return Some(Sort::Array {
            index: Box::new(index),
            element: Box::new(element),
        });
    }
    None
}

/// Splits `"a b"` into `("a", "b")` at the top-level space, respecting parens.
fn split_top_level(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ' ' if depth == 0 => return Some((&s[..i], s[i + 1..].trim())),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sort_atoms() {
        assert_eq!(parse_sort("Bool"), Some(Sort::Bool));
        assert_eq!(parse_sort("(_ BitVec 8)"), Some(Sort::BitVec(8)));
    }

    #[test]
    fn test_parse_sort_array() {
        assert_eq!(
            parse_sort("(Array (_ BitVec 8) (_ BitVec 8))"),
            Some(Sort::array(8, 8))
        );
    }

    #[test]
    fn test_split_top_level_respects_nesting() {
        let (a, b) = split_top_level("(_ BitVec 8) (_ BitVec 16)").unwrap();
        assert_eq!(a, "(_ BitVec 8)");
        assert_eq!(b, "(_ BitVec 16)");
    }
}
