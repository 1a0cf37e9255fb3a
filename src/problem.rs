//! Problem driver: binds a parsed HTS, a parsed property, a verification kind and
//! a [Config] into a single checker invocation, and records the resulting
//! [VerificationStatus].
//!
//! Field-for-field port of `problem.py`'s `Problem`/`Problems`/`VerificationStatus`/
//! `VerificationType`, minus the file-loading/front-end fields (`model_file`,
//! `relative_path`, `.ini` parsing) which are out of scope here — those belong to
//! the front-end parser this module only consumes the output of.

use crate::bmc::engine::run_all;
use crate::bmc::{EngineResult, Strategy as EngineStrategy};
use crate::error::CoreError;
use crate::expr::Expr;
use crate::formula_lang;
use crate::lemma;
use crate::properties::ltl::LtlFormula;
use crate::properties::{equivalence, liveness, ltl, safety, simulation};
use crate::solver::{SmtBackend, Solver};
use crate::symbol::Symbol;
use crate::trace::Trace;
use crate::ts::Hts;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum VerificationStatus {
    #[serde(rename = "UNCHECKED")]
    Unchecked,
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "TRUE")]
    True,
    #[serde(rename = "FALSE")]
    False,
}

impl VerificationStatus {
    pub fn from_bool(ok: bool) -> VerificationStatus {
        if ok {
            VerificationStatus::True
        } else {
            VerificationStatus::False
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Unchecked => "UNCHECKED",
            VerificationStatus::Unknown => "UNKNOWN",
            VerificationStatus::True => "TRUE",
            VerificationStatus::False => "FALSE",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<VerificationStatus, CoreError> {
        match s.to_uppercase().as_str() {
            "UNCHECKED" => Ok(VerificationStatus::Unchecked),
            "UNKNOWN" => Ok(VerificationStatus::Unknown),
            "TRUE" => Ok(VerificationStatus::True),
            "FALSE" => Ok(VerificationStatus::False),
            other => Err(CoreError::Parse(format!("invalid verification status '{other}'"))),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum VerificationType {
    Safety,
    Liveness,
    Eventually,
    Equivalence,
    Simulation,
    Ltl,
}

impl std::str::FromStr for VerificationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<VerificationType, CoreError> {
        match s.to_lowercase().as_str() {
            "safety" => Ok(VerificationType::Safety),
            "liveness" => Ok(VerificationType::Liveness),
            "eventually" => Ok(VerificationType::Eventually),
            "equivalence" => Ok(VerificationType::Equivalence),
            "simulation" => Ok(VerificationType::Simulation),
            "ltl" => Ok(VerificationType::Ltl),
            other => Err(CoreError::Parse(format!("unknown verification type '{other}'"))),
        }
    }
}

/// The `strategy` configuration value. `Ltl` is a spelling distinct from the
/// engine's own [EngineStrategy] (which has no such variant, see `bmc::engine`) —
/// it just means "the engine strategy actually driving the tableau's safety check
/// defaults to FWD", since this grammar has no way to request a different one for
/// an LTL problem specifically.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum StrategyKind {
    Auto,
    Fwd,
    Bwd,
    Zz,
    Int,
    Nu,
    Ltl,
    All,
}

impl StrategyKind {
    fn to_engine_strategy(self) -> EngineStrategy {
        match self {
            StrategyKind::Auto => EngineStrategy::Auto,
            StrategyKind::Fwd | StrategyKind::Ltl => EngineStrategy::Fwd,
            StrategyKind::Bwd => EngineStrategy::Bwd,
            StrategyKind::Zz => EngineStrategy::Zz,
            StrategyKind::Int => EngineStrategy::Int,
            StrategyKind::Nu => EngineStrategy::Nu,
            StrategyKind::All => EngineStrategy::All,
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<StrategyKind, CoreError> {
        match s.to_uppercase().as_str() {
            "AUTO" => Ok(StrategyKind::Auto),
            "FWD" => Ok(StrategyKind::Fwd),
            "BWD" => Ok(StrategyKind::Bwd),
            "ZZ" => Ok(StrategyKind::Zz),
            "INT" => Ok(StrategyKind::Int),
            "NU" => Ok(StrategyKind::Nu),
            "LTL" => Ok(StrategyKind::Ltl),
            "ALL" => Ok(StrategyKind::All),
            other => Err(CoreError::Parse(format!("unknown strategy '{other}'"))),
        }
    }
}

/// Trace rendering options — these select which view of a [Trace] a front-end
/// printer should produce; the core only carries the flags through.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TraceOptions {
    pub full_trace: bool,
    pub trace_vars_change: bool,
    pub trace_all_vars: bool,
    pub vcd: bool,
    pub trace_prefix: Option<String>,
}

/// One problem's configuration, independent of how it was obtained (`.ini` file,
/// CLI flags, a hard-coded batch in `main.rs` — all out of this module's concern).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub verification: VerificationType,
    pub formula: String,
    pub strategy: StrategyKind,
    pub prove: bool,
    pub incremental: bool,
    pub bmc_length: usize,
    pub bmc_length_min: usize,
    pub solver_name: String,
    pub smt2file: Option<PathBuf>,
    pub skip_solving: bool,
    pub symbolic_init: bool,
    pub assumptions: Vec<String>,
    pub lemmas: Vec<String>,
    pub trace: TraceOptions,
    pub expected: Option<VerificationStatus>,
    pub time: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            verification: VerificationType::Safety,
            formula: String::new(),
            strategy: StrategyKind::Auto,
            prove: false,
            incremental: false,
            bmc_length: 10,
            bmc_length_min: 0,
            solver_name: "z3".to_string(),
            smt2file: None,
            skip_solving: false,
            symbolic_init: false,
            assumptions: Vec::new(),
            lemmas: Vec::new(),
            trace: TraceOptions::default(),
            expected: None,
            time: false,
        }
    }
}

/// One named problem: a [Config] plus the bookkeeping the driver fills in as it
/// runs (status, elapsed time, and whether the result matched `expected`).
#[derive(Clone, Debug)]
pub struct Problem {
    pub name: String,
    pub description: String,
    pub config: Config,
    pub status: VerificationStatus,
    pub elapsed: Option<std::time::Duration>,
}

impl Problem {
    pub fn new(name: impl Into<String>, config: Config) -> Problem {
        Problem {
            name: name.into(),
            description: String::new(),
            config,
            status: VerificationStatus::Unchecked,
            elapsed: None,
        }
    }

    /// `true` when `expected` was set and didn't match the recorded status — the
    /// driver's "non-zero exit status but don't stop the batch" signal.
    pub fn mismatched(&self) -> bool {
        match self.config.expected {
            Some(expected) => expected != self.status,
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Problems {
    pub problems: Vec<Problem>,
}

impl Problems {
    pub fn new() -> Problems {
        Problems::default()
    }

    pub fn add_problem(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    /// Any problem whose recorded status didn't match its `expected` field.
    pub fn mismatches(&self) -> Vec<&Problem> {
        self.problems.iter().filter(|p| p.mismatched()).collect()
    }
}

fn build_solver(
    config: &Config,
    hts: &Hts,
    backend_factory: &(dyn Fn() -> Result<Box<dyn SmtBackend>, CoreError> + Sync),
) -> Result<Solver, CoreError> {
    let backend = backend_factory()?;
    let mut solver = Solver::new(backend, hts.logic.name(), config.skip_solving)?;
    if let Some(path) = &config.smt2file {
        solver.enable_trace_file(path)?;
    }
    Ok(solver)
}

/// Folds `config.assumptions` (already-parsed formulas) into a cloned HTS, and
/// proves `config.lemmas` against it via the lemma harness when present.
fn prepare_hts(
    config: &Config,
    hts: &Hts,
    env: &HashMap<String, Symbol>,
    solver: &mut Solver,
) -> Result<Hts, CoreError> {
    let mut prepared = hts.clone();
    for assumption in &config.assumptions {
        let parsed = formula_lang::parse_formula(assumption, env)?;
        prepared.add_assumption(parsed);
    }
    if !config.lemmas.is_empty() {
        let prop = formula_lang::parse_formula(&config.formula, env)?;
        let parsed_lemmas: Result<Vec<Expr>, CoreError> = config
            .lemmas
            .iter()
            .map(|l| formula_lang::parse_formula(l, env))
            .collect();
        let (augmented, sufficient, reports) =
            lemma::add_lemmas(&prepared, &prop, &parsed_lemmas?, solver)?;
        let proved = reports.iter().filter(|r| r.outcome == lemma::LemmaOutcome::Proved).count();
        info!("lemma harness: {proved}/{} proved, sufficient={sufficient}", reports.len());
        prepared = augmented;
    }
    Ok(prepared)
}

fn status_for(verification: VerificationType, result: &EngineResult) -> VerificationStatus {
    match (verification, result) {
        // A witness reaching the goal means the simulation succeeded.
        (VerificationType::Simulation, EngineResult::CounterexampleFound { .. }) => VerificationStatus::True,
        (VerificationType::Simulation, EngineResult::BoundExhausted { .. }) => VerificationStatus::Unknown,
        (_, EngineResult::CounterexampleFound { .. }) => VerificationStatus::False,
        (_, EngineResult::ProvedSafe { .. }) => VerificationStatus::True,
        (_, EngineResult::BoundExhausted { .. }) => VerificationStatus::Unknown,
    }
}

fn trace_of(result: EngineResult) -> Option<Trace> {
    match result {
        EngineResult::CounterexampleFound { trace, .. } => Some(trace),
        _ => None,
    }
}

/// Runs one problem to completion against `hts` (and, for `Equivalence`, a second
/// system with a list of output symbol pairs to compare), recording `problem.status`
/// and `problem.elapsed`, and returning a witness/counterexample trace on FALSE (or
/// a successful Simulation).
pub fn analyze_problem(
    problem: &mut Problem,
    hts: &Hts,
    env: &HashMap<String, Symbol>,
    equivalence_target: Option<(&Hts, &[(Arc<Symbol>, Arc<Symbol>)])>,
    backend_factory: &(dyn Fn() -> Result<Box<dyn SmtBackend>, CoreError> + Sync),
) -> Result<Option<Trace>, CoreError> {
    let start = Instant::now();
    let config = problem.config.clone();
    info!("analyzing problem '{}': {:?}", problem.name, config.verification);

    let result = run_checker(&config, hts, env, equivalence_target, backend_factory);

    if config.time {
        problem.elapsed = Some(start.elapsed());
    }

    match result {
        Ok((status, trace)) => {
            problem.status = status;
            if problem.mismatched() {
                warn!(
                    "problem '{}': expected {:?}, got {}",
                    problem.name, config.expected, status
                );
            }
            Ok(trace)
        }
        Err(e @ (CoreError::Solver(_) | CoreError::Timeout(_))) => {
            problem.status = VerificationStatus::Unknown;
            warn!("problem '{}' solver failure, reporting UNKNOWN: {e}", problem.name);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn run_checker(
    config: &Config,
    hts: &Hts,
    env: &HashMap<String, Symbol>,
    equivalence_target: Option<(&Hts, &[(Arc<Symbol>, Arc<Symbol>)])>,
    backend_factory: &(dyn Fn() -> Result<Box<dyn SmtBackend>, CoreError> + Sync),
) -> Result<(VerificationStatus, Option<Trace>), CoreError> {
    let mut solver = build_solver(config, hts, backend_factory)?;
    let prepared = prepare_hts(config, hts, env, &mut solver)?;
    let strategy = config.strategy.to_engine_strategy();

    if config.strategy == StrategyKind::All
        && matches!(config.verification, VerificationType::Safety | VerificationType::Eventually)
    {
        let prop = formula_lang::parse_formula(&config.formula, env)?;
        let prop = match config.verification {
            VerificationType::Eventually => Expr::not(prop).map_err(CoreError::Sort)?,
            _ => prop,
        };
        let result = run_all(
            &prepared,
            &prop,
            config.bmc_length,
            config.bmc_length_min,
            config.prove,
            backend_factory,
            prepared.logic.name(),
            config.skip_solving,
        )?;
        let status = status_for(config.verification, &result);
        return Ok((status, trace_of(result)));
    }

    match config.verification {
        VerificationType::Safety => {
            let prop = formula_lang::parse_formula(&config.formula, env)?;
            let result = safety::check_safety(
                &prepared,
                solver,
                strategy,
                &prop,
                config.bmc_length,
                config.bmc_length_min,
                config.prove,
            )?;
            let status = status_for(config.verification, &result);
            Ok((status, trace_of(result)))
        }
        VerificationType::Eventually => {
            let prop = formula_lang::parse_formula(&config.formula, env)?;
            let result = safety::check_never(
                &prepared,
                solver,
                strategy,
                &prop,
                config.bmc_length,
                config.bmc_length_min,
                config.prove,
            )?;
            let status = status_for(config.verification, &result);
            Ok((status, trace_of(result)))
        }
        VerificationType::Liveness => {
            let prop = formula_lang::parse_formula(&config.formula, env)?;
            let result = liveness::check_liveness(
                &prepared,
                &mut solver,
                &prop,
                config.bmc_length,
                config.bmc_length_min,
            )?;
            let status = status_for(config.verification, &result);
            Ok((status, trace_of(result)))
        }
        VerificationType::Simulation => {
            let goal = formula_lang::parse_formula(&config.formula, env)?;
            let result = simulation::check_simulation(
                &prepared,
                &mut solver,
                &goal,
                config.bmc_length,
                config.bmc_length_min,
            )?;
            let status = status_for(config.verification, &result);
            Ok((status, trace_of(result)))
        }
        VerificationType::Ltl => {
            let atom = formula_lang::parse_formula(&config.formula, env)?;
            let formula = LtlFormula::Globally(Box::new(LtlFormula::Atom(atom)));
            let (_augmented, result) = ltl::check_ltl(
                &prepared,
                solver,
                strategy,
                &formula,
                config.bmc_length,
                config.bmc_length_min,
                config.prove,
            )?;
            let status = status_for(config.verification, &result);
            Ok((status, trace_of(result)))
        }
        VerificationType::Equivalence => {
            let (other, output_pairs) = equivalence_target.ok_or_else(|| {
                CoreError::Mismatch("equivalence problem requires a second HTS and output pairs".to_string())
            })?;
            let (_combined, result) = equivalence::check_equivalence(
                &prepared,
                other,
                output_pairs,
                solver,
                strategy,
                config.bmc_length,
                config.bmc_length_min,
                config.prove,
            )?;
            let status = status_for(config.verification, &result);
            Ok((status, trace_of(result)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::backend::{RawModel, SatResult};
    use crate::sorts::Sort;
    use crate::ts::Ts;
    use std::collections::HashSet;
    use std::path::Path;

    struct StubBackend;

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

    fn counter_hts() -> (Hts, HashMap<String, Symbol>) {
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
        let mut env = HashMap::new();
        env.insert("c".to_string(), c);
        (hts, env)
    }

    #[test]
    fn test_analyze_problem_reports_unknown_on_bound_exhausted() {
        let (hts, env) = counter_hts();
        let mut config = Config::default();
        config.formula = "c != 15".to_string();
        config.bmc_length = 2;
        config.strategy = StrategyKind::Fwd;
        let mut problem = Problem::new("bitcounter", config);

        let factory = || -> Result<Box<dyn SmtBackend>, CoreError> { Ok(Box::new(StubBackend)) };
        let trace = analyze_problem(&mut problem, &hts, &env, None, &factory).unwrap();
        assert_eq!(problem.status, VerificationStatus::Unknown);
        assert!(trace.is_none());
    }

    #[test]
    fn test_verification_type_from_str_roundtrips() {
        assert_eq!("safety".parse::<VerificationType>().unwrap(), VerificationType::Safety);
        assert_eq!("LTL".parse::<VerificationType>().unwrap(), VerificationType::Ltl);
        assert!("bogus".parse::<VerificationType>().is_err());
    }

    #[test]
    fn test_mismatched_tracks_expected_vs_actual() {
        let mut config = Config::default();
        config.expected = Some(VerificationStatus::True);
        let mut problem = Problem::new("p", config);
        problem.status = VerificationStatus::False;
        assert!(problem.mismatched());
        problem.status = VerificationStatus::True;
        assert!(!problem.mismatched());
    }
}
