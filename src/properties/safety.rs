//! Safety (`G P`) and eventually-never (`F P` / `G ¬P`) — both are the engine's
//! plain safety check, the latter against the negated property.

use crate::bmc::engine::{Engine, EngineResult, Strategy};
use crate::error::CoreError;
use crate::expr::Expr;
use crate::solver::Solver;
use crate::ts::Hts;

/// `G P`: `P` must hold in every reachable state up to the bound.
pub fn check_safety(
    hts: &Hts,
    solver: Solver,
    strategy: Strategy,
    prop: &Expr,
    bmc_length: usize,
    bmc_length_min: usize,
    prove: bool,
) -> Result<EngineResult, CoreError> {
    Engine::new(hts, solver, strategy).check_safety(prop, bmc_length, bmc_length_min, prove)
}

/// `G ¬P` (equivalently `F P` never holds): same encoding as [check_safety], just
/// against the negated property.
pub fn check_never(
    hts: &Hts,
    solver: Solver,
    strategy: Strategy,
    prop: &Expr,
    bmc_length: usize,
    bmc_length_min: usize,
    prove: bool,
) -> Result<EngineResult, CoreError> {
    let never_prop = Expr::not(prop.clone()).map_err(CoreError::Sort)?;
    check_safety(hts, solver, strategy, &never_prop, bmc_length, bmc_length_min, prove)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{RawModel, SatResult, SmtBackend};
    use crate::sorts::Sort;
    use crate::symbol::Symbol;
    use std::path::Path;

    struct StubBackend {
        answers: Vec<SatResult>,
    }

    impl SmtBackend for StubBackend {
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
            Ok(if self.answers.is_empty() {
                SatResult::Unsat
            } else {
                self.answers.remove(0)
            })
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

    fn toy_hts() -> Hts {
        let c = Symbol::new("c", Sort::BitVec(4));
        let vars: std::collections::HashSet<_> = [std::sync::Arc::new(c.clone())].into_iter().collect();
        let init = Expr::equals(Expr::var(c.clone()), Expr::bv_const(0, 4)).unwrap();
        let trans =
            Expr::equals(Expr::var(c.prime()), Expr::bv_add(Expr::var(c.clone()), Expr::bv_const(1, 4)).unwrap())
                .unwrap();
        let ts = crate::ts::Ts::new("counter", vars.clone(), vars.clone(), init, Expr::tru(), trans).unwrap();
        let mut hts = Hts::new("top");
        hts.state_vars = vars;
        hts.add_ts(ts);
        hts
    }

    #[test]
    fn test_check_safety_reports_bound_exhausted_when_always_unsat() {
        let hts = toy_hts();
        let backend = Box::new(StubBackend { answers: vec![] });
        let solver = Solver::new(backend, "QF_BV", false).unwrap();
        let c = Symbol::new("c", Sort::BitVec(4));
        let prop = Expr::not_equals(Expr::var(c), Expr::bv_const(15, 4)).unwrap();
        let result = check_safety(&hts, solver, Strategy::Fwd, &prop, 2, 0, false).unwrap();
        assert!(matches!(result, EngineResult::BoundExhausted { k: 2 }));
    }
}
