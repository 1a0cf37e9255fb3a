//! `G F P` (fairness / liveness) via lasso search: for each horizon `k` and each
//! candidate loop-back index `j < k`, assert `state@j = state@k` and require `P`
//! false throughout the cycle `[j, k)`. A satisfying model is a fair counterexample.

use crate::bmc::engine::{at_time, unroll};
use crate::bmc::remap::remap_fwd;
use crate::bmc::EngineResult;
use crate::error::CoreError;
use crate::expr::Expr;
use crate::solver::{SatResult, Solver};
use crate::trace::Trace;
use crate::ts::Hts;

fn lasso_equality(hts: &Hts, j: usize, k: usize) -> Result<Expr, CoreError> {
    let mut parts = Vec::new();
    for v in &hts.state_vars {
        let at_j = Expr::var(v.timed(j as i64));
        let at_k = Expr::var(v.timed(k as i64));
        parts.push(Expr::equals(at_j, at_k).map_err(CoreError::Sort)?);
    }
    Expr::and_many(parts).map_err(CoreError::Sort)
}

/// `G F prop`: search horizons `bmc_length_min..=bmc_length` for a lasso whose
/// cycle never satisfies `prop`.
pub fn check_liveness(
    hts: &Hts,
    solver: &mut Solver,
    prop: &Expr,
    bmc_length: usize,
    bmc_length_min: usize,
) -> Result<EngineResult, CoreError> {
    let init = hts.single_init();
    let invar = hts.single_invar();
    let trans = hts.single_trans();

    for k in bmc_length_min.max(1)..=bmc_length {
        solver.reset_assertions()?;
        solver.add_assertion(&at_time(&init, 0))?;
        solver.add_assertion(&unroll(&trans, &invar, 0, k as i64))?;
        solver.add_assertion(&at_time(&invar, k as i64))?;

        for j in 0..k {
            solver.push()?;
            solver.add_assertion(&lasso_equality(hts, j, k)?)?;

            let mut not_p_cycle = Vec::new();
            for t in j..k {
                not_p_cycle.push(Expr::not(at_time(prop, t as i64)).map_err(CoreError::Sort)?);
            }
            solver.add_assertion(&Expr::and_many(not_p_cycle).map_err(CoreError::Sort)?)?;

            let result = solver.solve()?;
            match result {
                SatResult::Sat => {
                    let raw = solver.model()?;
                    let trace = Trace::from_indexed_model(&remap_fwd(&raw), hts, k).with_lasso(j);
                    solver.pop()?;
                    return Ok(EngineResult::CounterexampleFound { k, trace });
                }
                SatResult::Unsat => {
                    solver.pop()?;
                }
                SatResult::Unknown => {
                    solver.pop()?;
                    return Ok(EngineResult::BoundExhausted { k });
                }
            }
        }
    }
    Ok(EngineResult::BoundExhausted { k: bmc_length })
}
