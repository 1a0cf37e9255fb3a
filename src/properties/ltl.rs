//! LTL via tableau augmentation: negation-normal form, fresh auxiliary Boolean
//! state bits for the temporal operators with genuine memory (`Until`/`Release`),
//! and a reduction to the safety checker over the augmented system.
//!
//! Each auxiliary bit is named after its subformula's canonical string, the
//! translation-unit analogue of `HctlTreeNode::subform_str` being used as a
//! cache/identity key in the teacher.

use crate::bmc::engine::{at_time, unroll, EngineResult, Strategy};
use crate::bmc::remap::remap_fwd;
use crate::error::CoreError;
use crate::expr::Expr;
use crate::solver::{SatResult, Solver};
use crate::sorts::Sort;
use crate::symbol::Symbol;
use crate::trace::Trace;
use crate::ts::Ts;
use crate::ts::Hts;

use log::debug;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// An LTL formula over current-state atoms. `Finally`/`Globally` are sugar for
/// `Until`/`Release` and are eliminated before tableau compilation.
#[derive(Clone, Debug, PartialEq)]
pub enum LtlFormula {
    Atom(Expr),
    Not(Box<LtlFormula>),
    And(Box<LtlFormula>, Box<LtlFormula>),
    Or(Box<LtlFormula>, Box<LtlFormula>),
    Next(Box<LtlFormula>),
    Until(Box<LtlFormula>, Box<LtlFormula>),
    Release(Box<LtlFormula>, Box<LtlFormula>),
    Finally(Box<LtlFormula>),
    Globally(Box<LtlFormula>),
}

impl LtlFormula {
    pub fn not(f: LtlFormula) -> LtlFormula {
        LtlFormula::Not(Box::new(f))
    }
    pub fn and(a: LtlFormula, b: LtlFormula) -> LtlFormula {
        LtlFormula::And(Box::new(a), Box::new(b))
    }
    pub fn or(a: LtlFormula, b: LtlFormula) -> LtlFormula {
        LtlFormula::Or(Box::new(a), Box::new(b))
    }
    pub fn until(a: LtlFormula, b: LtlFormula) -> LtlFormula {
        LtlFormula::Until(Box::new(a), Box::new(b))
    }
    pub fn release(a: LtlFormula, b: LtlFormula) -> LtlFormula {
        LtlFormula::Release(Box::new(a), Box::new(b))
    }

    /// Negation-normal form: pushes `Not` to the atoms, using temporal duality
    /// (`¬(φ U ψ) = ¬φ R ¬ψ`, `¬(φ R ψ) = ¬φ U ¬ψ`, `¬X φ = X ¬φ`) and eliminating
    /// `F`/`G` in favor of `U`/`R` (`F φ = true U φ`, `G φ = false R φ`).
    pub fn nnf(&self) -> LtlFormula {
        match self {
            LtlFormula::Atom(_) => self.clone(),
            LtlFormula::Not(inner) => match inner.as_ref() {
                LtlFormula::Atom(e) => {
                    LtlFormula::Atom(Expr::not(e.clone()).expect("atom is Bool-sorted"))
                }
                LtlFormula::Not(doubly) => doubly.nnf(),
                LtlFormula::And(a, b) => {
                    LtlFormula::or(LtlFormula::not((**a).clone()).nnf(), LtlFormula::not((**b).clone()).nnf())
                }
                LtlFormula::Or(a, b) => {
                    LtlFormula::and(LtlFormula::not((**a).clone()).nnf(), LtlFormula::not((**b).clone()).nnf())
                }
                LtlFormula::Next(a) => LtlFormula::Next(Box::new(LtlFormula::not((**a).clone()).nnf())),
                LtlFormula::Until(a, b) => LtlFormula::release(
                    LtlFormula::not((**a).clone()).nnf(),
                    LtlFormula::not((**b).clone()).nnf(),
                ),
                LtlFormula::Release(a, b) => LtlFormula::until(
                    LtlFormula::not((**a).clone()).nnf(),
                    LtlFormula::not((**b).clone()).nnf(),
                ),
                LtlFormula::Finally(a) => {
                    LtlFormula::Globally(Box::new(LtlFormula::not((**a).clone()))).nnf()
                }
                LtlFormula::Globally(a) => {
                    LtlFormula::Finally(Box::new(LtlFormula::not((**a).clone()))).nnf()
                }
            },
            LtlFormula::And(a, b) => LtlFormula::and(a.nnf(), b.nnf()),
            LtlFormula::Or(a, b) => LtlFormula::or(a.nnf(), b.nnf()),
            LtlFormula::Next(a) => LtlFormula::Next(Box::new(a.nnf())),
            LtlFormula::Until(a, b) => LtlFormula::until(a.nnf(), b.nnf()),
            LtlFormula::Release(a, b) => LtlFormula::release(a.nnf(), b.nnf()),
            LtlFormula::Finally(a) => LtlFormula::until(
                LtlFormula::Atom(Expr::tru()),
                a.nnf(),
            ),
            LtlFormula::Globally(a) => LtlFormula::release(
                LtlFormula::Atom(Expr::fls()),
                a.nnf(),
            ),
        }
    }
}

impl fmt::Display for LtlFormula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LtlFormula::Atom(e) => write!(f, "{}", crate::printer::expr_to_smtlib2(e)),
            LtlFormula::Not(a) => write!(f, "(! {a})"),
            LtlFormula::And(a, b) => write!(f, "({a} & {b})"),
            LtlFormula::Or(a, b) => write!(f, "({a} | {b})"),
            LtlFormula::Next(a) => write!(f, "(X {a})"),
            LtlFormula::Until(a, b) => write!(f, "({a} U {b})"),
            LtlFormula::Release(a, b) => write!(f, "({a} R {b})"),
            LtlFormula::Finally(a) => write!(f, "(F {a})"),
            LtlFormula::Globally(a) => write!(f, "(G {a})"),
        }
    }
}

/// Recursively compiles `f` (already in NNF) into a current-state Boolean `Expr`,
/// adding one fresh state bit (with its `trans` recurrence) to `extra_ts` for every
/// `Until`/`Release` subformula encountered, memoized by canonical string so shared
/// subformulas get one bit.
fn compile(
    f: &LtlFormula,
    extra_ts: &mut Vec<Ts>,
    seen: &mut HashSet<String>,
    boundary: &mut Vec<(Expr, Expr)>,
) -> Result<Expr, CoreError> {
    match f {
        LtlFormula::Atom(e) => Ok(e.clone()),
        LtlFormula::Not(a) => Expr::not(compile(a, extra_ts, seen, boundary)?).map_err(CoreError::Sort),
        LtlFormula::And(a, b) => Expr::and(
            compile(a, extra_ts, seen, boundary)?,
            compile(b, extra_ts, seen, boundary)?,
        )
        .map_err(CoreError::Sort),
        LtlFormula::Or(a, b) => Expr::or(
            compile(a, extra_ts, seen, boundary)?,
            compile(b, extra_ts, seen, boundary)?,
        )
        .map_err(CoreError::Sort),
        LtlFormula::Next(a) => {
            // X is memoryless: its "current value" bit is the child's formula evaluated
            // one step ahead, which the BMC engine's at_time substitution already handles
            // for any free variable whose name we control — so the bit is literally the
            // child compiled, but primed (read at the next time step).
            let child = compile(a, extra_ts, seen, boundary)?;
            Ok(crate::ts::to_next(&child))
        }
        LtlFormula::Until(a, b) => compile_fixpoint(f, a, b, true, extra_ts, seen, boundary),
        LtlFormula::Release(a, b) => compile_fixpoint(f, a, b, false, extra_ts, seen, boundary),
        LtlFormula::Finally(_) | LtlFormula::Globally(_) => {
            Err(CoreError::Unsupported("F/G must be eliminated via nnf() before compile".into()))
        }
    }
}

/// `φ U ψ`: `bit ↔ ψ ∨ (φ ∧ next(bit))`. `φ R ψ`: `bit ↔ ψ ∧ (φ ∨ next(bit))`.
/// Both give the aux bit a `trans` equation linking it to its own next value, which
/// is exactly the one piece of state an HTS already knows how to carry.
///
/// That recurrence alone is satisfiable by pinning the bit `true` forever, which
/// would let a real Until-violation slip past an unrolling that never reaches
/// the subformula's actual witness. `boundary` collects `(bit, ψ)` so the caller
/// can additionally pin `bit ↔ ψ` at whichever depth is the last one examined —
/// on a finite path of length `n`, both `φ U ψ` and `φ R ψ` reduce to `ψ(n)`
/// (the base case of the Until recurrence, and its dual for Release), so one
/// boundary equation serves both. `init` is the necessary consequence of the
/// recurrence at time 0 (`bit → ψ ∨ φ`), not the full boundary closure — that
/// closure is asserted fresh by the caller for whichever `k` is being checked.
fn compile_fixpoint(
    whole: &LtlFormula,
    a: &LtlFormula,
    b: &LtlFormula,
    is_until: bool,
    extra_ts: &mut Vec<Ts>,
    seen: &mut HashSet<String>,
    boundary: &mut Vec<(Expr, Expr)>,
) -> Result<Expr, CoreError> {
    let key = whole.to_string();
    let bit = Symbol::new(format!("__ltl[{key}]"), Sort::Bool);
    let bit_expr = Expr::var(bit.clone());

    if seen.insert(key) {
        let phi = compile(a, extra_ts, seen, boundary)?;
        let psi = compile(b, extra_ts, seen, boundary)?;
        let next_bit = Expr::var(bit.prime());
        let unfold = if is_until {
            Expr::or(psi.clone(), Expr::and(phi.clone(), next_bit).map_err(CoreError::Sort)?)
                .map_err(CoreError::Sort)?
        } else {
            Expr::and(psi.clone(), Expr::or(phi.clone(), next_bit).map_err(CoreError::Sort)?)
                .map_err(CoreError::Sort)?
        };
        let trans = Expr::iff(bit_expr.clone(), unfold).map_err(CoreError::Sort)?;
        let init = Expr::implies(bit_expr.clone(), Expr::or(psi.clone(), phi).map_err(CoreError::Sort)?)
            .map_err(CoreError::Sort)?;
        let vars: HashSet<Arc<Symbol>> = [crate::expr::intern_symbol(bit.clone())].into_iter().collect();
        let state_vars = vars.clone();
        extra_ts.push(Ts::new(
            format!("ltl_{}", extra_ts.len()),
            vars,
            state_vars,
            init,
            Expr::tru(),
            trans,
        )?);
        boundary.push((bit_expr.clone(), psi));
    }
    Ok(bit_expr)
}

/// Augments `hts` with the tableau for `formula` and checks "`formula` holds
/// along every path from an initial state" over the augmented system.
///
/// Unlike a plain safety property, the root bit's truth at the examined depth
/// `k` is only meaningful once every Until/Release auxiliary bit is pinned to
/// its boundary value at `k` (see [compile_fixpoint]) — the generic engine has
/// no hook for a per-depth assertion, so this runs its own FWD-only loop rather
/// than delegating to [crate::bmc::engine::Engine]. LTL problems are already
/// restricted to the FWD strategy upstream, so `strategy`/`prove` are accepted
/// only to keep this call site uniform with the other property checkers.
pub fn check_ltl(
    hts: &Hts,
    solver: Solver,
    _strategy: Strategy,
    formula: &LtlFormula,
    bmc_length: usize,
    bmc_length_min: usize,
    _prove: bool,
) -> Result<(Hts, EngineResult), CoreError> {
    let nnf = formula.nnf();
    let mut extra_ts = Vec::new();
    let mut seen = HashSet::new();
    let mut boundary = Vec::new();
    let root = compile(&nnf, &mut extra_ts, &mut seen, &mut boundary)?;

    let mut augmented = hts.clone();
    for ts in extra_ts {
        augmented.state_vars.extend(ts.state_vars.iter().cloned());
        augmented.add_ts(ts);
    }

    let mut solver = solver;
    let init = augmented.single_init();
    let invar = augmented.single_invar();
    let trans = augmented.single_trans();

    for k in bmc_length_min..=bmc_length {
        solver.reset_assertions()?;
        solver.add_assertion(&at_time(&init, 0))?;
        solver.add_assertion(&unroll(&trans, &invar, 0, k as i64))?;
        solver.add_assertion(&at_time(&invar, k as i64))?;
        for (bit, psi) in &boundary {
            solver.add_assertion(
                &Expr::iff(at_time(bit, k as i64), at_time(psi, k as i64)).map_err(CoreError::Sort)?,
            )?;
        }

        solver.push()?;
        solver.add_assertion(&Expr::not(at_time(&root, k as i64)).map_err(CoreError::Sort)?)?;
        let result = solver.solve()?;
        debug!("LTL k={k} -> {result:?}");
        match result {
            SatResult::Sat => {
                let raw = solver.model()?;
                let trace = Trace::from_indexed_model(&remap_fwd(&raw), &augmented, k);
                solver.pop()?;
                return Ok((augmented, EngineResult::CounterexampleFound { k, trace }));
            }
            SatResult::Unsat => {
                solver.pop()?;
            }
            SatResult::Unknown => {
                solver.pop()?;
                return Ok((augmented, EngineResult::BoundExhausted { k }));
            }
        }
    }
    Ok((augmented, EngineResult::BoundExhausted { k: bmc_length }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorts::Sort as SortT;

    fn atom(name: &str) -> LtlFormula {
        LtlFormula::Atom(Expr::var(Symbol::new(name, SortT::Bool)))
    }

    #[test]
    fn test_nnf_pushes_not_through_until_via_release() {
        let f = LtlFormula::not(LtlFormula::until(atom("p"), atom("q")));
        let nnf = f.nnf();
        assert!(matches!(nnf, LtlFormula::Release(_, _)));
    }

    #[test]
    fn test_nnf_double_negation_cancels() {
        let f = LtlFormula::not(LtlFormula::not(atom("p")));
        assert_eq!(f.nnf(), atom("p"));
    }

    #[test]
    fn test_finally_eliminated_into_until() {
        let f = LtlFormula::Finally(Box::new(atom("p")));
        assert!(matches!(f.nnf(), LtlFormula::Until(_, _)));
    }

    #[test]
    fn test_compile_until_adds_one_aux_ts_with_shared_bit() {
        let f = LtlFormula::until(atom("p"), atom("q")).nnf();
        let mut extra_ts = Vec::new();
        let mut seen = HashSet::new();
        let mut boundary = Vec::new();
        let root = compile(&f, &mut extra_ts, &mut seen, &mut boundary).unwrap();
        assert_eq!(extra_ts.len(), 1);
        assert_eq!(boundary.len(), 1);
        assert!(root.free_vars().iter().any(|s| s.name.starts_with("__ltl[")));
    }

    /// `init` must be non-vacuous: a model with the aux bit true at time 0 but
    /// both `ψ` and `φ` false at time 0 should violate it.
    #[test]
    fn test_compile_until_init_is_not_tautological() {
        let f = LtlFormula::until(atom("p"), atom("q")).nnf();
        let mut extra_ts = Vec::new();
        let mut seen = HashSet::new();
        let mut boundary = Vec::new();
        let _ = compile(&f, &mut extra_ts, &mut seen, &mut boundary).unwrap();
        assert_ne!(extra_ts[0].init, Expr::tru());
    }
}
