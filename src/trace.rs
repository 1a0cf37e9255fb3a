//! The counterexample/witness trace data model: an ordered sequence of steps, each
//! mapping variable name to a typed value, plus lasso detection for liveness
//! witnesses and a diff-only view for printing.
//!
//! The column ordering and diff/full-trace split are the data-model analogue of
//! `printers/trace.py`'s `TextTracePrinter` and `mcsolver.py`'s `print_trace` flags
//! (`diff_only`/`all_vars`/`full_trace`), here exposed as query methods instead of
//! print-time flags.

use crate::bmc::remap::IndexedModel;
use crate::symbol::Symbol;
use crate::ts::Hts;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// A materialized value recovered from a raw SMT-LIB2 literal.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Bv(u128),
    /// A finite array model: explicit entries plus the `as-const` default for every
    /// index not listed.
    Array {
        default: u128,
        entries: BTreeMap<u128, u128>,
    },
    /// A literal the parser didn't recognize — kept verbatim rather than discarded.
    Raw(String),
}

fn strip_outer_parens(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.starts_with('(') && s.ends_with(')') {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

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

fn parse_bv_literal(s: &str) -> Option<u128> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("#x") {
        return u128::from_str_radix(hex, 16).ok();
    }
    if let Some(bin) = s.strip_prefix("#b") {
        return u128::from_str_radix(bin, 2).ok();
    }
    if let Some(inner) = s.strip_prefix("(_ bv") {
        let inner = inner.strip_suffix(')')?;
        let (value, _width) = inner.split_once(' ')?;
        return value.trim().parse().ok();
    }
    None
}

/// Walks a `store`/`as-const` chain back to `(default, explicit entries)`.
fn parse_array_literal(s: &str) -> Option<(u128, BTreeMap<u128, u128>)> {
    let inner = strip_outer_parens(s)?;
    if let Some(rest) = inner.strip_prefix("store ") {
        let (arr_str, tail) = split_top_level(rest)?;
        let (idx_str, val_str) = split_top_level(tail)?;
        let (default, mut entries) = parse_array_literal(arr_str)?;
        entries.insert(parse_bv_literal(idx_str)?, parse_bv_literal(val_str)?);
        return Some((default, entries));
    }
    if inner.starts_with("(as const") {
        let (_sort, default_str) = split_top_level(inner)?;
        let default = parse_bv_literal(default_str)?;
        return Some((default, BTreeMap::new()));
    }
    None
}

fn parse_value_literal(raw: &str) -> Value {
    let s = raw.trim();
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Some(v) = parse_bv_literal(s) {
                Value::Bv(v)
            } else if let Some((default, entries)) = parse_array_literal(s) {
                Value::Array { default, entries }
            } else {
                Value::Raw(s.to_string())
            }
        }
    }
}

/// One time step of a trace: the ordered `(name, value)` pairs for every variable
/// the model assigned at this step. Ordering is stable: inputs, then state, then
/// outputs, each alphabetical within its partition.
#[derive(Clone, Debug)]
pub struct TraceStep {
    pub step: usize,
    pub values: Vec<(String, Value)>,
}

impl TraceStep {
    fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Variables whose value differs from `prev` (or all of them, if there is no
    /// previous step).
    pub fn changed_since<'a>(&'a self, prev: Option<&TraceStep>) -> Vec<(&'a str, &'a Value)> {
        self.values
            .iter()
            .filter(|(name, value)| match prev {
                None => true,
                Some(p) => p.get(name) != Some(value),
            })
            .map(|(n, v)| (n.as_str(), v))
            .collect()
    }
}

/// A full counterexample/witness: an ordered sequence of steps, plus (for liveness
/// witnesses) the index the final step loops back to.
#[derive(Clone, Debug)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
    pub lasso_start: Option<usize>,
}

fn stable_var_order(hts: &Hts) -> Vec<String> {
    let mut names = Vec::new();
    for set in [&hts.input_vars, &hts.state_vars, &hts.output_vars] {
        let mut partition: Vec<String> = set.iter().map(|s: &Arc<Symbol>| s.name.clone()).collect();
        partition.sort();
        names.extend(partition);
    }
    names
}

impl Trace {
    /// Builds a trace from a forward-time-indexed model (the output of
    /// [crate::bmc::remap::remap_fwd]/`remap_bwd`/`remap_zz`), covering steps
    /// `0..=k`.
    pub fn from_indexed_model(model: &IndexedModel, hts: &Hts, k: usize) -> Trace {
        let order = stable_var_order(hts);
        let mut steps = Vec::with_capacity(k + 1);
        for t in 0..=k {
            let mut values = Vec::new();
            for name in &order {
                if let Some(raw) = model.get(&(name.clone(), t as i64)) {
                    values.push((name.clone(), parse_value_literal(raw)));
                }
            }
            steps.push(TraceStep { step: t, values });
        }
        Trace {
            steps,
            lasso_start: None,
        }
    }

    pub fn with_lasso(mut self, j: usize) -> Trace {
        self.lasso_start = Some(j);
        self
    }

    /// Searches for `j < k` such that `state@k = state@j` over `state_vars` —
    /// the lasso closure the liveness checker asserts before calling this.
    pub fn detect_lasso(&self, state_vars: &HashSet<Arc<Symbol>>) -> Option<usize> {
        let last = self.steps.last()?;
        let names: Vec<&str> = state_vars.iter().map(|s| s.name.as_str()).collect();
        self.steps[..self.steps.len().saturating_sub(1)]
            .iter()
            .position(|step| names.iter().all(|n| step.get(n) == last.get(n)))
    }

    /// All variables at every step (the `full_trace`/`all_vars` view).
    pub fn full(&self) -> &[TraceStep] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_and_bv_literals() {
        assert_eq!(parse_value_literal("true"), Value::Bool(true));
        assert_eq!(parse_value_literal("#x0a"), Value::Bv(10));
        assert_eq!(parse_value_literal("#b1010"), Value::Bv(10));
        assert_eq!(parse_value_literal("(_ bv10 8)"), Value::Bv(10));
    }

    #[test]
    fn test_parse_array_store_chain() {
        let lit = "(store ((as const (Array (_ BitVec 8) (_ BitVec 8))) #x00) #x01 #x2a)";
        match parse_value_literal(lit) {
            Value::Array { default, entries } => {
                assert_eq!(default, 0);
                assert_eq!(entries.get(&1), Some(&0x2a));
            }
            other => panic!("expected Array, got {other:?}"),
        }
    }

    #[test]
    fn test_changed_since_diffs_against_previous_step() {
        let prev = TraceStep {
            step: 0,
            values: vec![("a".into(), Value::Bv(1)), ("b".into(), Value::Bv(2))],
        };
        let cur = TraceStep {
            step: 1,
            values: vec![("a".into(), Value::Bv(1)), ("b".into(), Value::Bv(3))],
        };
        let diff = cur.changed_since(Some(&prev));
        assert_eq!(diff, vec![("b", &Value::Bv(3))]);
    }

    #[test]
    fn test_detect_lasso_finds_repeated_state() {
        use crate::sorts::Sort;
        let c = Symbol::new("c", Sort::BitVec(4));
        let state_vars: HashSet<Arc<Symbol>> = [Arc::new(c.clone())].into_iter().collect();
        let steps = vec![
            TraceStep {
                step: 0,
                values: vec![("c".into(), Value::Bv(0))],
            },
            TraceStep {
                step: 1,
                values: vec![("c".into(), Value::Bv(1))],
            },
            TraceStep {
                step: 2,
                values: vec![("c".into(), Value::Bv(0))],
            },
        ];
        let trace = Trace {
            steps,
            lasso_start: None,
        };
        assert_eq!(trace.detect_lasso(&state_vars), Some(0));
    }
}
