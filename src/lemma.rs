//! Lemma harness: strengthen an HTS with externally-supplied invariant candidates,
//! then test whether the strengthened system suffices to prove the property.
//!
//! Close to a direct port of `BMCSolver.add_lemmas`/`_check_lemma`/`_suff_lemmas`:
//! failing lemmas are reported but neither retried nor discarded from the
//! candidate list, and a proved lemma's assumption is added immediately so later
//! lemmas (and the sufficiency test) can lean on it.

use crate::bmc::engine::at_time;
use crate::error::CoreError;
use crate::expr::Expr;
use crate::solver::{SatResult, Solver};
use crate::ts::Hts;

use log::{debug, info};

/// One lemma's outcome: proved (and folded into `assumptions`) or rejected at
/// either initiation or consecution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LemmaOutcome {
    Proved,
    FailedInitiation,
    FailedConsecution,
}

#[derive(Debug)]
pub struct LemmaReport {
    pub outcome: LemmaOutcome,
}

/// Checks `I ∧ V ∧ ¬ℓ` unsat (initiation).
fn check_initiation(hts: &Hts, solver: &mut Solver, lemma: &Expr) -> Result<bool, CoreError> {
    solver.reset_assertions()?;
    solver.add_assertion(&at_time(&hts.single_init(), 0))?;
    solver.add_assertion(&at_time(&hts.single_invar(), 0))?;
    solver.add_assertion(&Expr::not(at_time(lemma, 0)).map_err(CoreError::Sort)?)?;
    Ok(matches!(solver.solve()?, SatResult::Unsat))
}

/// Checks `V ∧ T ∧ V[next] ∧ ℓ ∧ ¬ℓ[next]` unsat (consecution).
fn check_consecution(hts: &Hts, solver: &mut Solver, lemma: &Expr) -> Result<bool, CoreError> {
    solver.reset_assertions()?;
    solver.add_assertion(&at_time(&hts.single_invar(), 0))?;
    solver.add_assertion(&at_time(&hts.single_trans(), 0))?;
    solver.add_assertion(&at_time(&hts.single_invar(), 1))?;
    solver.add_assertion(&at_time(lemma, 0))?;
    solver.add_assertion(&Expr::not(at_time(lemma, 1)).map_err(CoreError::Sort)?)?;
    Ok(matches!(solver.solve()?, SatResult::Unsat))
}

/// Runs the harness: for each candidate lemma in order, checks initiation then
/// consecution; proved lemmas become assumptions of the returned HTS. After every
/// proved lemma, tests whether `assumptions ∧ ¬prop` is already unsat — if so,
/// returns immediately with `sufficient = true`.
pub fn add_lemmas(
    hts: &Hts,
    prop: &Expr,
    lemmas: &[Expr],
    solver: &mut Solver,
) -> Result<(Hts, bool, Vec<LemmaReport>), CoreError> {
    let mut augmented = hts.clone();
    let mut reports = Vec::with_capacity(lemmas.len());

    for lemma in lemmas {
        if !check_initiation(&augmented, solver, lemma)? {
            debug!("lemma failed initiation: {}", crate::printer::expr_to_smtlib2(lemma));
            reports.push(LemmaReport {
                outcome: LemmaOutcome::FailedInitiation,
            });
            continue;
        }
        if !check_consecution(&augmented, solver, lemma)? {
            debug!("lemma failed consecution: {}", crate::printer::expr_to_smtlib2(lemma));
            reports.push(LemmaReport {
                outcome: LemmaOutcome::FailedConsecution,
            });
            continue;
        }

        info!("lemma proved, adding as assumption");
        augmented.add_assumption(lemma.clone());
        reports.push(LemmaReport {
            outcome: LemmaOutcome::Proved,
        });

        if sufficient(&augmented, prop, solver)? {
            return Ok((augmented, true, reports));
        }
    }

    Ok((augmented, false, reports))
}

/// `assumptions ∧ ¬prop` unsat ⇒ the accumulated assumptions already prove `prop`
/// at the current (unrolled-once) depth.
fn sufficient(hts: &Hts, prop: &Expr, solver: &mut Solver) -> Result<bool, CoreError> {
    solver.reset_assertions()?;
    for assumption in &hts.assumptions {
        solver.add_assertion(&at_time(assumption, 0))?;
    }
    solver.add_assertion(&Expr::not(at_time(prop, 0)).map_err(CoreError::Sort)?)?;
    Ok(matches!(solver.solve()?, SatResult::Unsat))
}
