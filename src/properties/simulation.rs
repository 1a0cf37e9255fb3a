//! Simulation: find the smallest bound `k` for which `I ∧ unroll(0..k) ∧ Goal@k`
//! is satisfiable — a bounded reachability search, not a safety refutation, so the
//! engine's `CounterexampleFound` variant here carries a *witness*, not a bug.

use crate::bmc::engine::{at_time, unroll};
use crate::bmc::remap::remap_fwd;
use crate::bmc::EngineResult;
use crate::error::CoreError;
use crate::expr::Expr;
use crate::solver::{SatResult, Solver};
use crate::trace::Trace;
use crate::ts::Hts;

pub fn check_simulation(
    hts: &Hts,
    solver: &mut Solver,
    goal: &Expr,
    bmc_length: usize,
    bmc_length_min: usize,
) -> Result<EngineResult, CoreError> {
    let init = hts.single_init();
    let invar = hts.single_invar();
    let trans = hts.single_trans();

    for k in bmc_length_min..=bmc_length {
        solver.reset_assertions()?;
        solver.add_assertion(&at_time(&init, 0))?;
        solver.add_assertion(&unroll(&trans, &invar, 0, k as i64))?;
        solver.add_assertion(&at_time(&invar, k as i64))?;
        solver.add_assertion(&at_time(goal, k as i64))?;

        match solver.solve()? {
            SatResult::Sat => {
                let raw = solver.model()?;
                let trace = Trace::from_indexed_model(&remap_fwd(&raw), hts, k);
                return Ok(EngineResult::CounterexampleFound { k, trace });
            }
            SatResult::Unsat => continue,
            SatResult::Unknown => return Ok(EngineResult::BoundExhausted { k }),
        }
    }
    Ok(EngineResult::BoundExhausted { k: bmc_length })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{RawModel, SmtBackend};
    use crate::sorts::Sort;
    use crate::symbol::Symbol;
    use crate::ts::Ts;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Arc;

    struct CountingBackend {
        sat_at_call: usize,
        calls: usize,
    }

    impl SmtBackend for CountingBackend {
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
            self.calls += 1;
            Ok(if self.calls - 1 == self.sat_at_call {
                SatResult::Sat
            } else {
                SatResult::Unsat
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

    #[test]
    fn test_check_simulation_finds_smallest_satisfying_k() {
        let c = Symbol::new("c", Sort::BitVec(4));
        let vars: HashSet<_> = [Arc::new(c.clone())].into_iter().collect();
        let init = Expr::equals(Expr::var(c.clone()), Expr::bv_const(0, 4)).unwrap();
        let trans = Expr::equals(
            Expr::var(c.prime()),
            Expr::bv_add(Expr::var(c.clone()), Expr::bv_const(1, 4)).unwrap(),
        )
        .unwrap();
        let ts = Ts::new("t", vars.clone(), vars.clone(), init, Expr::tru(), trans).unwrap();
        let mut hts = Hts::new("top");
        hts.state_vars = vars;
        hts.add_ts(ts);

        let backend = Box::new(CountingBackend { sat_at_call: 2, calls: 0 });
        let mut solver = Solver::new(backend, "QF_BV", false).unwrap();
        let goal = Expr::equals(Expr::var(c), Expr::bv_const(2, 4)).unwrap();
        let result = check_simulation(&hts, &mut solver, &goal, 5, 0).unwrap();
        match result {
            EngineResult::CounterexampleFound { k, .. } => assert_eq!(k, 2),
            other => panic!("expected a witness, got {other:?}"),
        }
    }
}
