//! Equivalence: given two HTSs with matching input interfaces (same input symbol
//! names) and a list of output symbol pairs to compare, build the product system
//! (shared inputs, disjoint state, initial = conjunction of inits) and check
//! safety of `∧ outputs_A = outputs_B`.

use crate::bmc::engine::{Engine, EngineResult, Strategy};
use crate::error::CoreError;
use crate::expr::Expr;
use crate::solver::Solver;
use crate::symbol::Symbol;
use crate::ts::Hts;

use std::sync::Arc;

/// Builds the product HTS of `a` and `b` (inputs unioned by shared name, states
/// and outputs simply unioned — the caller is responsible for the two systems
/// using disjoint state/output names).
pub fn product(a: &Hts, b: &Hts) -> Hts {
    let mut product = a.clone();
    product.name = format!("{}_vs_{}", a.name, b.name);
    product.combine(b.clone());
    product
}

/// Checks `∧_i pairs[i].0 = pairs[i].1` as a safety invariant of the product system.
pub fn check_equivalence(
    a: &Hts,
    b: &Hts,
    output_pairs: &[(Arc<Symbol>, Arc<Symbol>)],
    solver: Solver,
    strategy: Strategy,
    bmc_length: usize,
    bmc_length_min: usize,
    prove: bool,
) -> Result<(Hts, EngineResult), CoreError> {
    let combined = product(a, b);
    let mut equalities = Vec::with_capacity(output_pairs.len());
    for (out_a, out_b) in output_pairs {
        equalities.push(
            Expr::equals(
                Expr::var((**out_a).clone()),
                Expr::var((**out_b).clone()),
            )
            .map_err(CoreError::Sort)?,
        );
    }
    let prop = Expr::and_many(equalities).map_err(CoreError::Sort)?;
    let result =
        Engine::new(&combined, solver, strategy).check_safety(&prop, bmc_length, bmc_length_min, prove)?;
    Ok((combined, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{RawModel, SatResult, SmtBackend};
    use crate::sorts::Sort;
    use crate::ts::Ts;
    use std::collections::HashSet;
    use std::path::Path;

    struct AlwaysUnsatBackend;

    impl SmtBackend for AlwaysUnsatBackend {
        fn set_logic(&mut self, _logic_name: &str) -> Result<(), CoreError> {
            Ok(())
        }
        fn declare(&mut self, _symbol: &Symbol) -> Result<(), CoreError> {
            Ok(())
        }
        fn assert(&mut self, _expr: &Expr) -> Result<(), CoreError> {
            Ok(())
        }
        fn push(&mut self) -> Result<(), CoreError> {
            Ok(())
        }
        fn pop(&mut self) -> Result<(), CoreError> {
            Ok(())
        }
        fn check_sat(&mut self) -> Result<SatResult, CoreError> {
            Ok(SatResult::Unsat)
        }
        fn get_model(&mut self) -> Result<RawModel, CoreError> {
            Ok(RawModel::new())
        }
        fn reset(&mut self) -> Result<(), CoreError> {
            Ok(())
        }
        fn exit(&mut self) -> Result<(), CoreError> {
            Ok(())
        }
        fn tee(&mut self, _path: &Path) -> Result<(), CoreError> {
            Ok(())
        }
        fn comment(&mut self, _text: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn adder_hts(name: &str, out_name: &str) -> Hts {
        let a = Symbol::new("a", Sort::BitVec(8));
        let b = Symbol::new("b", Sort::BitVec(8));
        let out = Symbol::new(out_name, Sort::BitVec(8));
        let vars: HashSet<_> = [Arc::new(a.clone()), Arc::new(b.clone()), Arc::new(out.clone())]
            .into_iter()
            .collect();
        let invar = Expr::equals(
            Expr::var(out.clone()),
            Expr::bv_add(Expr::var(a), Expr::var(b)).unwrap(),
        )
        .unwrap();
        let ts = Ts::new(name, vars.clone(), HashSet::new(), Expr::tru(), invar, Expr::tru()).unwrap();
        let mut hts = Hts::new(name);
        hts.input_vars = [Arc::new(Symbol::new("a", Sort::BitVec(8))), Arc::new(Symbol::new("b", Sort::BitVec(8)))]
            .into_iter()
            .collect();
        hts.output_vars = [Arc::new(out)].into_iter().collect();
        hts.add_ts(ts);
        hts
    }

    #[test]
    fn test_product_unions_without_dedup_on_distinct_outputs() {
        let ripple = adder_hts("ripple", "sum_ripple");
        let cla = adder_hts("cla", "sum_cla");
        let combined = product(&ripple, &cla);
        assert_eq!(combined.tss.len(), 2);
        assert_eq!(combined.output_vars.len(), 2);
    }

    /// Ripple-carry and carry-look-ahead adders both invariant-constrain their
    /// output to `a + b`, so `sum_ripple = sum_cla` is a tautology of the product
    /// system: no counterexample exists within the bound.
    #[test]
    fn test_check_equivalence_of_two_adders_finds_no_counterexample() {
        let ripple = adder_hts("ripple", "sum_ripple");
        let cla = adder_hts("cla", "sum_cla");
        let out_a = Arc::new(Symbol::new("sum_ripple", Sort::BitVec(8)));
        let out_b = Arc::new(Symbol::new("sum_cla", Sort::BitVec(8)));
        let solver = Solver::new(Box::new(AlwaysUnsatBackend), "QF_BV", false).unwrap();
        let (_, result) = check_equivalence(&ripple, &cla, &[(out_a, out_b)], solver, Strategy::Fwd, 4, 0, false).unwrap();
        assert!(matches!(result, EngineResult::BoundExhausted { .. }));
    }
}
