//! CLI front end `htsmc`.
//!
//! Front-end parsing (Verilog/BTOR2/a structural netlist/a symbolic-TS DSL lowering
//! into an HTS) is out of this core's scope, so this binary builds its problem batch
//! directly in Rust instead of loading a config file — a stand-in for whatever
//! front-end a real deployment would plug in ahead of `hts_bmc_checker::problem`.

use hts_bmc_checker::error::CoreError;
use hts_bmc_checker::expr::Expr;
use hts_bmc_checker::problem::{self, Config, Problem, Problems, StrategyKind, VerificationStatus, VerificationType};
use hts_bmc_checker::solver::backend::Rsmt2Backend;
use hts_bmc_checker::solver::SmtBackend;
use hts_bmc_checker::sorts::Sort;
use hts_bmc_checker::symbol::Symbol;
use hts_bmc_checker::ts::{Hts, Ts};

use clap::builder::PossibleValuesParser;
use clap::Parser;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use std::collections::{HashMap, HashSet};
use std::process::ExitCode;
use std::sync::Arc;

/// Structure to collect CLI arguments.
#[derive(Parser)]
#[clap(
    author,
    version,
    about = "Symbolic bounded model checker for hierarchical transition systems over QF_ABV."
)]
struct Arguments {
    /// SMT solver process to drive.
    #[clap(short, long, default_value = "z3", value_parser = PossibleValuesParser::new(["z3", "cvc4", "yices2"]))]
    solver: String,

    /// Unrolling bound.
    #[clap(short = 'k', long, default_value_t = 16)]
    bmc_length: usize,

    /// BMC strategy.
    #[clap(long, default_value = "auto", value_parser = PossibleValuesParser::new(["auto", "fwd", "bwd", "zz", "nu", "all"]))]
    strategy: String,

    /// Measure and report elapsed time per problem.
    #[clap(long)]
    time: bool,
}

fn bit_counter_problem(strategy: StrategyKind, bmc_length: usize, time: bool) -> (Hts, HashMap<String, Symbol>, Problem) {
    let c = Symbol::new("c", Sort::BitVec(4));
    let vars: HashSet<Arc<Symbol>> = [Arc::new(c.clone())].into_iter().collect();
    let init = Expr::equals(Expr::var(c.clone()), Expr::bv_const(0, 4)).unwrap();
    let trans = Expr::equals(
        Expr::var(c.prime()),
        Expr::bv_add(Expr::var(c.clone()), Expr::bv_const(1, 4)).unwrap(),
    )
    .unwrap();
    let ts = Ts::new("counter", vars.clone(), vars.clone(), init, Expr::tru(), trans).unwrap();
    let mut hts = Hts::new("bit_counter");
    hts.state_vars = vars;
    hts.add_ts(ts);

    let mut env = HashMap::new();
    env.insert("c".to_string(), c);

    let config = Config {
        verification: VerificationType::Safety,
        formula: "c != 0xf".to_string(),
        strategy,
        bmc_length,
        time,
        ..Config::default()
    };
    let mut problem = Problem::new("bit_counter", config);
    problem.description = "4-bit free-running counter never reaches 15 within the bound".to_string();
    (hts, env, problem)
}

fn mutex_problem(strategy: StrategyKind, bmc_length: usize, time: bool) -> (Hts, HashMap<String, Symbol>, Problem) {
    let p1 = Symbol::new("p1", Sort::Bool);
    let p2 = Symbol::new("p2", Sort::Bool);
    let vars: HashSet<Arc<Symbol>> = [Arc::new(p1.clone()), Arc::new(p2.clone())].into_iter().collect();
    let init = Expr::and(
        Expr::not(Expr::var(p1.clone())).unwrap(),
        Expr::not(Expr::var(p2.clone())).unwrap(),
    )
    .unwrap();
    // T forbids p1' & p2'
    let trans = Expr::not(Expr::and(Expr::var(p1.prime()), Expr::var(p2.prime())).unwrap()).unwrap();
    let ts = Ts::new("mutex", vars.clone(), vars.clone(), init, Expr::tru(), trans).unwrap();
    let mut hts = Hts::new("mutex");
    hts.state_vars = vars;
    hts.add_ts(ts);

    let mut env = HashMap::new();
    env.insert("p1".to_string(), p1);
    env.insert("p2".to_string(), p2);

    let config = Config {
        verification: VerificationType::Safety,
        formula: "!(p1 & p2)".to_string(),
        strategy,
        bmc_length,
        prove: true,
        time,
        ..Config::default()
    };
    let mut problem = Problem::new("mutex", config);
    problem.description = "two-process mutual exclusion, proved by 1-step induction".to_string();
    (hts, env, problem)
}

fn strategy_kind(s: &str) -> StrategyKind {
    match s {
        "fwd" => StrategyKind::Fwd,
        "bwd" => StrategyKind::Bwd,
        "zz" => StrategyKind::Zz,
        "nu" => StrategyKind::Nu,
        "all" => StrategyKind::All,
        _ => StrategyKind::Auto,
    }
}

fn print_status(name: &str, status: VerificationStatus, stream: &mut StandardStream) {
    let color = match status {
        VerificationStatus::True => Color::Green,
        VerificationStatus::False => Color::Red,
        VerificationStatus::Unknown | VerificationStatus::Unchecked => Color::Yellow,
    };
    stream.set_color(ColorSpec::new().set_fg(Some(color))).ok();
    print!("{status}");
    stream.set_color(ColorSpec::new().set_fg(Some(Color::White))).ok();
    println!(" {name}");
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Arguments::parse();
    let strategy = strategy_kind(&args.strategy);

    let solver_name = args.solver.clone();
    let backend_factory = move || -> Result<Box<dyn SmtBackend>, CoreError> {
        Ok(Box::new(Rsmt2Backend::new(&solver_name)?))
    };

    let mut problems = Problems::new();
    let (bc_hts, bc_env, bc_problem) = bit_counter_problem(strategy, args.bmc_length, args.time);
    let (mx_hts, mx_env, mx_problem) = mutex_problem(strategy, args.bmc_length, args.time);
    problems.add_problem(bc_problem);
    problems.add_problem(mx_problem);

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let mut any_error = false;

    for (i, problem) in problems.problems.iter_mut().enumerate() {
        let (hts, env) = if i == 0 { (&bc_hts, &bc_env) } else { (&mx_hts, &mx_env) };
        match problem::analyze_problem(problem, hts, env, None, &backend_factory) {
            Ok(_trace) => print_status(&problem.name, problem.status, &mut stdout),
            Err(e) => {
                eprintln!("problem '{}' failed: {e}", problem.name);
                any_error = true;
            }
        }
        if let Some(elapsed) = problem.elapsed {
            println!("  ({:.3}s)", elapsed.as_secs_f64());
        }
    }

    if any_error || !problems.mismatches().is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
