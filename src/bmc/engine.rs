//! Unrolling, timing substitutions, and the strategy multiplexer
//! (FWD/BWD/ZZ/INT/NU/AUTO/ALL) plus k-induction.
//!
//! `at_time`/`at_ptime`/`unroll` are close to a direct port of
//! `BMCSolver.at_time`/`at_ptime`/`unroll` in `analyzers/mcsolver.py`; the strategy
//! names and fallback precedence come from the same file's `VerificationStrategy`.

use crate::bmc::remap::{remap_bwd, remap_fwd, remap_zz};
use crate::error::CoreError;
use crate::expr::Expr;
use crate::solver::{SatResult, Solver};
use crate::trace::Trace;
use crate::ts::Hts;

use log::{debug, info};
use std::collections::HashMap;

/// Which BMC strategy to run. `Ltl` is handled by [crate::properties::ltl] (it
/// augments the HTS, then delegates back to a safety/liveness check), so the
/// engine itself never dispatches on it directly.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strategy {
    Fwd,
    Bwd,
    Zz,
    Int,
    Nu,
    Auto,
    All,
}

/// The outcome of a bounded run, before a property checker turns it into a
/// [crate::problem::VerificationStatus].
#[derive(Debug)]
pub enum EngineResult {
    CounterexampleFound { k: usize, trace: Trace },
    ProvedSafe { k: usize },
    BoundExhausted { k: usize },
}

/// Substitutes every free `v` in `expr`: current-symbol → `timed(v, t)`,
/// prime-symbol → `timed(v, t+1)`, prev-symbol → `timed(v, t-1)`.
pub fn at_time(expr: &Expr, t: i64) -> Expr {
    let mut map = HashMap::new();
    for v in expr.free_vars() {
        let target = if v.is_prime() {
            v.ref_var().timed(t + 1)
        } else if v.is_prev() {
            v.ref_var().timed(t - 1)
        } else {
            v.timed(t)
        };
        map.insert(v, Expr::var(target));
    }
    expr.substitute(&map)
}

/// Symmetric to [at_time] in the backward-time namespace: current → `ptimed(v,t)`,
/// prime → `ptimed(v, t-1)`, prev → `ptimed(v, t+1)`.
pub fn at_ptime(expr: &Expr, t: i64) -> Expr {
    let mut map = HashMap::new();
    for v in expr.free_vars() {
        let target = if v.is_prime() {
            v.ref_var().ptimed(t - 1)
        } else if v.is_prev() {
            v.ref_var().ptimed(t + 1)
        } else {
            v.ptimed(t)
        };
        map.insert(v, Expr::var(target));
    }
    expr.substitute(&map)
}

/// `Unroll(T, V, k_start, k_end)`: for `t` from `min..max-1`, emits
/// `timefn(T,t) ∧ timefn(V,t+1)` — forward (`at_time`) if `k_start ≤ k_end`,
/// otherwise backward (`at_ptime`, offsets reversed). `k_start == k_end` yields ⊤.
pub fn unroll(trans: &Expr, invar: &Expr, k_start: i64, k_end: i64) -> Expr {
    if k_start == k_end {
        return Expr::tru();
    }
    let forward = k_start <= k_end;
    let (lo, hi) = if forward {
        (k_start, k_end)
    } else {
        (k_end, k_start)
    };
    let mut parts = Vec::new();
    for t in lo..hi {
        if forward {
            parts.push(at_time(trans, t));
            parts.push(at_time(invar, t + 1));
        } else {
            parts.push(at_ptime(trans, t + 1));
            parts.push(at_ptime(invar, t));
        }
    }
    Expr::and_many(parts).expect("unrolled transitions and invariants are Bool-sorted")
}

fn sort_err(e: String) -> CoreError {
    CoreError::Sort(e)
}

/// Drives one or more BMC strategies against a single HTS and safety property.
pub struct Engine<'a> {
    hts: &'a Hts,
    solver: Solver,
    strategy: Strategy,
}

impl<'a> Engine<'a> {
    pub fn new(hts: &'a Hts, solver: Solver, strategy: Strategy) -> Engine<'a> {
        Engine {
            hts,
            solver,
            strategy,
        }
    }

    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    /// Checks safety of `prop` (a current-state Boolean expression) up to
    /// `bmc_length`, never checking before `bmc_length_min`. `prove` switches FWD
    /// into k-induction.
    pub fn check_safety(
        &mut self,
        prop: &Expr,
        bmc_length: usize,
        bmc_length_min: usize,
        prove: bool,
    ) -> Result<EngineResult, CoreError> {
        info!(
            "check_safety strategy={:?} bmc_length={} prove={}",
            self.strategy, bmc_length, prove
        );
        match self.strategy {
            Strategy::Fwd if prove => self.run_k_induction(prop, bmc_length),
            Strategy::Fwd => self.run_fwd(prop, bmc_length, bmc_length_min),
            Strategy::Bwd => self.run_bwd(prop, bmc_length, bmc_length_min),
            Strategy::Zz => self.run_zz(prop, bmc_length, bmc_length_min),
            Strategy::Nu => self.run_nu(prop),
            Strategy::Int => Err(CoreError::Unsupported(
                "INT strategy requires a Craig-interpolating backend, which this build does not wire up".into(),
            )),
            Strategy::Auto => self.run_auto(prop, bmc_length, bmc_length_min, prove),
            Strategy::All => Err(CoreError::Mismatch(
                "ALL strategy must be run through run_all, which needs a backend factory".into(),
            )),
        }
    }

    fn run_fwd(
        &mut self,
        prop: &Expr,
        bmc_length: usize,
        bmc_length_min: usize,
    ) -> Result<EngineResult, CoreError> {
        let init = self.hts.single_init();
        let invar = self.hts.single_invar();
        let trans = self.hts.single_trans();

        self.solver.reset_assertions()?;
        self.solver.add_assertion(&at_time(&init, 0))?;
        self.solver.add_assertion(&at_time(&invar, 0))?;

        for k in 0..=bmc_length {
            if k > 0 {
                self.solver.add_assertion(&at_time(&trans, (k - 1) as i64))?;
                self.solver.add_assertion(&at_time(&invar, k as i64))?;
            }
            if k < bmc_length_min {
                continue;
            }
            self.solver.push()?;
            self.solver
                .add_assertion(&Expr::not(at_time(prop, k as i64)).map_err(sort_err)?)?;
            let result = self.solver.solve()?;
            debug!("FWD k={k} -> {result:?}");
            match result {
                SatResult::Sat => {
                    let raw = self.solver.model()?;
                    let trace = Trace::from_indexed_model(&remap_fwd(&raw), self.hts, k);
                    self.solver.pop()?;
                    return Ok(EngineResult::CounterexampleFound { k, trace });
                }
                SatResult::Unsat => {
                    self.solver.pop()?;
                }
                SatResult::Unknown => {
                    self.solver.pop()?;
                    return Ok(EngineResult::BoundExhausted { k });
                }
            }
        }
        Ok(EngineResult::BoundExhausted { k: bmc_length })
    }

    fn run_bwd(
        &mut self,
        prop: &Expr,
        bmc_length: usize,
        bmc_length_min: usize,
    ) -> Result<EngineResult, CoreError> {
        let init = self.hts.single_init();
        let invar = self.hts.single_invar();
        let trans = self.hts.single_trans();
        let not_prop = Expr::not(prop.clone()).map_err(sort_err)?;

        for k in bmc_length_min..=bmc_length {
            self.solver.reset_assertions()?;
            // target state (¬P) sits at ptime 0; the initial state sits at ptime k,
            // expressed over current-step symbols only (SPEC tie-break note).
            self.solver.add_assertion(&at_ptime(&not_prop, 0))?;
            for p in 0..=k {
                self.solver.add_assertion(&at_ptime(&invar, p as i64))?;
            }
            for p in 0..k {
                self.solver.add_assertion(&at_ptime(&trans, (p + 1) as i64))?;
            }
            self.solver.add_assertion(&at_ptime(&init, k as i64))?;

            let result = self.solver.solve()?;
            debug!("BWD k={k} -> {result:?}");
            match result {
                SatResult::Sat => {
                    let raw = self.solver.model()?;
                    let trace = Trace::from_indexed_model(&remap_bwd(&raw, k), self.hts, k);
                    return Ok(EngineResult::CounterexampleFound { k, trace });
                }
                SatResult::Unsat => continue,
                SatResult::Unknown => return Ok(EngineResult::BoundExhausted { k }),
            }
        }
        Ok(EngineResult::BoundExhausted { k: bmc_length })
    }

    fn run_zz(
        &mut self,
        prop: &Expr,
        bmc_length: usize,
        bmc_length_min: usize,
    ) -> Result<EngineResult, CoreError> {
        let init = self.hts.single_init();
        let invar = self.hts.single_invar();
        let trans = self.hts.single_trans();
        let not_prop = Expr::not(prop.clone()).map_err(sort_err)?;

        for k in bmc_length_min..=bmc_length {
            let mid = k / 2;
            self.solver.reset_assertions()?;
            self.solver.add_assertion(&at_time(&init, 0))?;
            self.solver.add_assertion(&at_ptime(&not_prop, 0))?;
            for t in 0..=mid {
                self.solver.add_assertion(&at_time(&invar, t as i64))?;
            }
            for t in 0..mid {
                self.solver.add_assertion(&at_time(&trans, t as i64))?;
            }
            for p in 0..=(k - mid) {
                self.solver.add_assertion(&at_ptime(&invar, p as i64))?;
            }
            for p in 0..(k - mid) {
                self.solver.add_assertion(&at_ptime(&trans, (p + 1) as i64))?;
            }
            // meet in the middle: the forward state at `mid` equals the backward
            // state at ptime `k - mid`.
            self.solver.add_assertion(&meet_in_the_middle(
                self.hts, mid, k - mid,
            )?)?;

            let result = self.solver.solve()?;
            debug!("ZZ k={k} mid={mid} -> {result:?}");
            match result {
                SatResult::Sat => {
                    let raw = self.solver.model()?;
                    let trace = Trace::from_indexed_model(&remap_zz(&raw, k), self.hts, k);
                    return Ok(EngineResult::CounterexampleFound { k, trace });
                }
                SatResult::Unsat => continue,
                SatResult::Unknown => return Ok(EngineResult::BoundExhausted { k }),
            }
        }
        Ok(EngineResult::BoundExhausted { k: bmc_length })
    }

    /// "No unrolling": picks concrete states satisfying `I ∧ V` directly, with no
    /// transition trace built at all — stand-alone simulation mode.
    fn run_nu(&mut self, goal: &Expr) -> Result<EngineResult, CoreError> {
        let init = self.hts.single_init();
        let invar = self.hts.single_invar();
        self.solver.reset_assertions()?;
        self.solver.add_assertion(&at_time(&init, 0))?;
        self.solver.add_assertion(&at_time(&invar, 0))?;
        self.solver.add_assertion(&at_time(goal, 0))?;
        match self.solver.solve()? {
            SatResult::Sat => {
                let raw = self.solver.model()?;
                let trace = Trace::from_indexed_model(&remap_fwd(&raw), self.hts, 0);
                Ok(EngineResult::CounterexampleFound { k: 0, trace })
            }
            SatResult::Unsat => Ok(EngineResult::BoundExhausted { k: 0 }),
            SatResult::Unknown => Ok(EngineResult::BoundExhausted { k: 0 }),
        }
    }

    /// Tries FWD first; on an indeterminate outcome at the bound, falls back by
    /// strategy precedence FWD → BWD → ZZ → INT.
    fn run_auto(
        &mut self,
        prop: &Expr,
        bmc_length: usize,
        bmc_length_min: usize,
        prove: bool,
    ) -> Result<EngineResult, CoreError> {
        self.strategy = Strategy::Fwd;
        if let ok @ (EngineResult::CounterexampleFound { .. } | EngineResult::ProvedSafe { .. }) =
            self.check_safety(prop, bmc_length, bmc_length_min, prove)?
        {
            return Ok(ok);
        }
        self.strategy = Strategy::Bwd;
        if let ok @ EngineResult::CounterexampleFound { .. } =
            self.run_bwd(prop, bmc_length, bmc_length_min)?
        {
            return Ok(ok);
        }
        self.strategy = Strategy::Zz;
        if let ok @ EngineResult::CounterexampleFound { .. } =
            self.run_zz(prop, bmc_length, bmc_length_min)?
        {
            return Ok(ok);
        }
        debug!("AUTO exhausted FWD/BWD/ZZ without a conclusive answer; INT is unsupported");
        Ok(EngineResult::BoundExhausted { k: bmc_length })
    }

    /// `k`-induction: base case `I ∧ unroll(0..k) ∧ ¬P@k`, step case
    /// `unroll(0..k) ∧ (∧_{i<k} P@i) ∧ ¬P@k` with an unconstrained start.
    fn run_k_induction(
        &mut self,
        prop: &Expr,
        bmc_length: usize,
    ) -> Result<EngineResult, CoreError> {
        let init = self.hts.single_init();
        let invar = self.hts.single_invar();
        let trans = self.hts.single_trans();

        for k in 0..=bmc_length {
            self.solver.reset_assertions()?;
            self.solver.add_assertion(&at_time(&init, 0))?;
            self.solver.add_assertion(&at_time(&invar, 0))?;
            for t in 0..k {
                self.solver.add_assertion(&at_time(&trans, t as i64))?;
                self.solver.add_assertion(&at_time(&invar, (t + 1) as i64))?;
            }
            self.solver
                .add_assertion(&Expr::not(at_time(prop, k as i64)).map_err(sort_err)?)?;
            if let SatResult::Sat = self.solver.solve()? {
                let raw = self.solver.model()?;
                let trace = Trace::from_indexed_model(&remap_fwd(&raw), self.hts, k);
                return Ok(EngineResult::CounterexampleFound { k, trace });
            }

            self.solver.reset_assertions()?;
            self.solver.add_assertion(&at_time(&invar, 0))?;
            for t in 0..k {
                self.solver.add_assertion(&at_time(&trans, t as i64))?;
                self.solver.add_assertion(&at_time(&invar, (t + 1) as i64))?;
                self.solver.add_assertion(&at_time(prop, t as i64))?;
            }
            self.solver
                .add_assertion(&Expr::not(at_time(prop, k as i64)).map_err(sort_err)?)?;
            if let SatResult::Unsat = self.solver.solve()? {
                return Ok(EngineResult::ProvedSafe { k });
            }
        }
        Ok(EngineResult::BoundExhausted { k: bmc_length })
    }
}

/// Both forward and backward halves of a ZZ unrolling describe the same meeting
/// state; tying them together means asserting equality of every state variable
/// between the forward end and the backward end.
fn meet_in_the_middle(hts: &Hts, fwd_step: usize, bwd_step: usize) -> Result<Expr, CoreError> {
    let mut parts = Vec::new();
    for v in &hts.state_vars {
        let fwd_side = Expr::var(v.ref_var().timed(fwd_step as i64));
        let bwd_side = Expr::var(v.ref_var().ptimed(bwd_step as i64));
        parts.push(Expr::equals(fwd_side, bwd_side).map_err(sort_err)?);
    }
    Expr::and_many(parts).map_err(sort_err)
}

/// Runs FWD, BWD, and ZZ concurrently (one OS thread each, each owning its own
/// backend instance via `backend_factory`) and returns the first conclusive
/// result, in FWD/BWD/ZZ precedence order when more than one strategy concludes.
pub fn run_all(
    hts: &Hts,
    prop: &Expr,
    bmc_length: usize,
    bmc_length_min: usize,
    prove: bool,
    backend_factory: &(dyn Fn() -> Result<Box<dyn crate::solver::SmtBackend>, CoreError> + Sync),
    logic: &str,
    skip_solving: bool,
) -> Result<EngineResult, CoreError> {
    let strategies = [Strategy::Fwd, Strategy::Bwd, Strategy::Zz];
    let results: Vec<Result<EngineResult, CoreError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = strategies
            .iter()
            .map(|&strategy| {
                scope.spawn(move || -> Result<EngineResult, CoreError> {
                    let backend = backend_factory()?;
                    let solver = Solver::new(backend, logic, skip_solving)?;
                    let mut engine = Engine::new(hts, solver, strategy);
                    engine.check_safety(prop, bmc_length, bmc_length_min, prove)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for result in results {
        match result {
            Ok(ok @ (EngineResult::CounterexampleFound { .. } | EngineResult::ProvedSafe { .. })) => {
                return Ok(ok);
            }
            Ok(EngineResult::BoundExhausted { .. }) => continue,
            Err(e) => return Err(e),
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

    fn counter_hts() -> Hts {
        let c = Symbol::new("c", Sort::BitVec(4));
        let vars: HashSet<_> = [Arc::new(c.clone())].into_iter().collect();
        let init = Expr::equals(Expr::var(c.clone()), Expr::bv_const(0, 4)).unwrap();
        let trans =
            Expr::equals(Expr::var(c.prime()), Expr::bv_add(Expr::var(c.clone()), Expr::bv_const(1, 4)).unwrap())
                .unwrap();
        let ts = Ts::new("counter", vars.clone(), vars.clone(), init, Expr::tru(), trans).unwrap();
        let mut hts = Hts::new("top");
        hts.state_vars = vars;
        hts.add_ts(ts);
        hts
    }

    /// With an always-unsat backend standing in for "no counterexample exists within
    /// the bound", FWD, BWD and ZZ must all agree on `BoundExhausted` at the same `k`.
    #[test]
    fn test_fwd_bwd_zz_agree_on_status_within_bound() {
        let hts = counter_hts();
        let c = Symbol::new("c", Sort::BitVec(4));
        let prop = Expr::not_equals(Expr::var(c), Expr::bv_const(15, 4)).unwrap();

        let results = [Strategy::Fwd, Strategy::Bwd, Strategy::Zz].map(|strategy| {
            let solver = Solver::new(Box::new(AlwaysUnsatBackend), "QF_BV", false).unwrap();
            Engine::new(&hts, solver, strategy)
                .check_safety(&prop, 10, 0, false)
                .unwrap()
        });
        for result in &results {
            assert!(matches!(result, EngineResult::BoundExhausted { k: 10 }));
        }
    }

    #[test]
    fn test_at_time_maps_current_prime_prev() {
        let c = Symbol::new("c", Sort::BitVec(4));
        let e = Expr::and(
            Expr::equals(Expr::var(c.clone()), Expr::var(c.prime())).unwrap(),
            Expr::equals(Expr::var(c.prev()), Expr::var(c.clone())).unwrap(),
        )
        .unwrap();
        let timed = at_time(&e, 2);
        let names: Vec<String> = timed.free_vars().iter().map(|s| s.name.clone()).collect();
        assert!(names.contains(&"c_AT2".to_string()));
        assert!(names.contains(&"c_AT3".to_string()));
        assert!(names.contains(&"c_AT1".to_string()));
    }

    #[test]
    fn test_unroll_empty_when_bounds_equal() {
        let p = Expr::var(Symbol::new("p", Sort::Bool));
        assert_eq!(unroll(&p, &p, 3, 3), Expr::tru());
    }

    #[test]
    fn test_unroll_forward_emits_expected_step_count() {
        let c = Symbol::new("c", Sort::BitVec(4));
        let trans = Expr::equals(Expr::var(c.prime()), Expr::var(c.clone())).unwrap();
        let invar = Expr::tru();
        let unrolled = unroll(&trans, &invar, 0, 3);
        // 3 steps (0->1, 1->2, 2->3): trans+invar pairs => 6 conjuncts
        assert_eq!(unrolled.conjunctive_partition().len(), 6);
    }

    /// `unroll(T,V,0,k1) ∧ T@k1 ∧ V@{k1+1} ∧ unroll(T,V,k1+1,k2)` must cover the
    /// same conjuncts as `unroll(T,V,0,k2)`, up to the order they were pushed in.
    #[test]
    fn test_unroll_composes_across_a_split_point() {
        let c = Symbol::new("c", Sort::BitVec(4));
        let trans = Expr::equals(Expr::var(c.prime()), Expr::var(c.clone())).unwrap();
        let invar = Expr::equals(Expr::var(c.clone()), Expr::var(c.clone())).unwrap();

        let whole = unroll(&trans, &invar, 0, 5);
        let k1 = 2;
        let mut split = unroll(&trans, &invar, 0, k1).conjunctive_partition();
        split.push(at_time(&trans, k1));
        split.push(at_time(&invar, k1 + 1));
        split.extend(unroll(&trans, &invar, k1 + 1, 5).conjunctive_partition());

        let mut whole_conjuncts = whole.conjunctive_partition();
        let mut split_conjuncts = split;
        let key = |e: &Expr| format!("{e:?}");
        whole_conjuncts.sort_by_key(key);
        split_conjuncts.sort_by_key(key);
        assert_eq!(whole_conjuncts, split_conjuncts);
    }
}
