//! Transition-system algebra: a single [Ts] (init/invar/trans over a variable set),
//! and [Hts], a hierarchy of TSs and bound sub-HTS instances.
//!
//! This is close to a direct port of `transition_system.py`'s `TS`/`HTS` classes —
//! the teacher has nothing resembling a transition system, so the algebra itself is
//! grounded in the system this crate's spec was distilled from, while struct layout
//! and doc density follow `preprocessing/node.rs`.

use crate::error::CoreError;
use crate::expr::Expr;
use crate::symbol::Symbol;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// SMT-LIB2 logic a problem is discharged in. Widens monotonically: once any TS in
/// an HTS uses an array, the whole HTS is QF_ABV.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Logic {
    QfBv,
    QfAbv,
}

impl Logic {
    pub fn widen(self, other: Logic) -> Logic {
        match (self, other) {
            (Logic::QfAbv, _) | (_, Logic::QfAbv) => Logic::QfAbv,
            _ => Logic::QfBv,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Logic::QfBv => "QF_BV",
            Logic::QfAbv => "QF_ABV",
        }
    }
}

/// Substitutes every free `v` in `expr` by `prime(v)`, and every `prev(v)` by `v`.
pub fn to_next(expr: &Expr) -> Expr {
    let mut map = HashMap::new();
    for v in expr.free_vars() {
        let target = if v.is_prev() {
            Expr::var(v.ref_var())
        } else {
            Expr::var(v.prime())
        };
        map.insert(v, target);
    }
    expr.substitute(&map)
}

/// Symmetric to [to_next]: every free `v` by `prev(v)`, every `prime(v)` by `v`.
pub fn to_prev(expr: &Expr) -> Expr {
    let mut map = HashMap::new();
    for v in expr.free_vars() {
        let target = if v.is_prime() {
            Expr::var(v.ref_var())
        } else {
            Expr::var(v.prev())
        };
        map.insert(v, target);
    }
    expr.substitute(&map)
}

/// Whether any free variable of `expr` is primed.
pub fn has_next(expr: &Expr) -> bool {
    expr.free_vars().iter().any(|v| v.is_prime())
}

/// A single transition system: `init`/`invar` over current-time symbols, `trans`
/// over current + primed `state_vars` (and current-time inputs).
#[derive(Clone, Debug)]
pub struct Ts {
    pub name: String,
    pub vars: HashSet<Arc<Symbol>>,
    pub state_vars: HashSet<Arc<Symbol>>,
    pub init: Expr,
    pub invar: Expr,
    pub trans: Expr,
}

impl Ts {
    /// Builds a TS, checking the free-variable invariants from SPEC §3.
    pub fn new(
        name: impl Into<String>,
        vars: HashSet<Arc<Symbol>>,
        state_vars: HashSet<Arc<Symbol>>,
        init: Expr,
        invar: Expr,
        trans: Expr,
    ) -> Result<Ts, CoreError> {
        if !state_vars.is_subset(&vars) {
            return Err(CoreError::Sort(
                "state_vars must be a subset of vars".into(),
            ));
        }
        for (label, e) in [("init", &init), ("invar", &invar)] {
            if !e.free_vars().is_subset(&vars) {
                return Err(CoreError::Sort(format!(
                    "free variables of {label} must be a subset of vars"
                )));
            }
        }
        let trans_allowed: HashSet<Arc<Symbol>> = vars
            .iter()
            .cloned()
            .chain(state_vars.iter().map(|v| Arc::new(v.prime())))
            .chain(state_vars.iter().map(|v| Arc::new(v.prev())))
            .collect();
        if !trans.free_vars().is_subset(&trans_allowed) {
            return Err(CoreError::Sort(
                "free variables of trans must be a subset of vars ∪ prime(state_vars) ∪ prev(state_vars)"
                    .into(),
            ));
        }
        Ok(Ts {
            name: name.into(),
            vars,
            state_vars,
            init,
            invar,
            trans,
        })
    }

    /// `remove_invar`: folds the invariant into init and trans, replacing it with ⊤.
    /// `I ← I ∧ V`, `T ← T ∧ V ∧ V[next]`, `V ← ⊤`.
    pub fn remove_invar(&mut self) {
        let invar_next = to_next(&self.invar);
        self.init = Expr::and(self.init.clone(), self.invar.clone())
            .expect("init and invar are both Bool-sorted");
        self.trans = Expr::and_many(vec![self.trans.clone(), self.invar.clone(), invar_next])
            .expect("trans, invar, and invar[next] are all Bool-sorted");
        self.invar = Expr::tru();
    }

    /// Conjunction of corresponding fields, union of variable sets. Used to compose
    /// sibling TSs under the same HTS.
    pub fn compose(&self, other: &Ts) -> Result<Ts, CoreError> {
        let vars: HashSet<_> = self.vars.union(&other.vars).cloned().collect();
        let state_vars: HashSet<_> = self
            .state_vars
            .union(&other.state_vars)
            .cloned()
            .collect();
        Ts::new(
            format!("{}+{}", self.name, other.name),
            vars,
            state_vars,
            Expr::and(self.init.clone(), other.init.clone())?,
            Expr::and(self.invar.clone(), other.invar.clone())?,
            Expr::and(self.trans.clone(), other.trans.clone())?,
        )
    }
}

/// A sub-HTS instantiated inside a parent, with a port binding mapping each formal
/// parameter symbol in `sub` to an actual expression from the parent's namespace.
#[derive(Clone, Debug)]
pub struct HtsInstance {
    pub sub: Box<Hts>,
    pub port_bindings: HashMap<Symbol, Expr>,
}

impl HtsInstance {
    pub fn new(sub: Hts, port_bindings: HashMap<Symbol, Expr>) -> HtsInstance {
        HtsInstance {
            sub: Box::new(sub),
            port_bindings,
        }
    }

    fn port_map(&self) -> HashMap<Arc<Symbol>, Expr> {
        self.port_bindings
            .iter()
            .map(|(k, v)| (crate::expr::intern_symbol(k.clone()), v.clone()))
            .collect()
    }
}

fn substitute_symbol_set(
    vars: &HashSet<Arc<Symbol>>,
    map: &HashMap<Arc<Symbol>, Expr>,
) -> HashSet<Arc<Symbol>> {
    vars.iter()
        .map(|v| match map.get(v) {
            Some(Expr::Var(s)) => s.clone(),
            _ => v.clone(),
        })
        .collect()
}

/// A hierarchical transition system: a name, child TSs, instantiated sub-HTSs with
/// port bindings, partitioned variable sets, assumptions, and the three cached
/// compositions.
#[derive(Clone, Debug)]
pub struct Hts {
    pub name: String,
    pub tss: Vec<Ts>,
    pub subs: Vec<HtsInstance>,
    pub input_vars: HashSet<Arc<Symbol>>,
    pub output_vars: HashSet<Arc<Symbol>>,
    pub state_vars: HashSet<Arc<Symbol>>,
    pub assumptions: Vec<Expr>,
    pub logic: Logic,
    single_init: Option<Expr>,
    single_invar: Option<Expr>,
    single_trans: Option<Expr>,
}

impl Hts {
    pub fn new(name: impl Into<String>) -> Hts {
        Hts {
            name: name.into(),
            tss: Vec::new(),
            subs: Vec::new(),
            input_vars: HashSet::new(),
            output_vars: HashSet::new(),
            state_vars: HashSet::new(),
            assumptions: Vec::new(),
            logic: Logic::QfBv,
            single_init: None,
            single_invar: None,
            single_trans: None,
        }
    }

    pub fn add_ts(&mut self, ts: Ts) {
        if ts.vars.iter().any(|v| v.sort.is_array()) {
            self.logic = self.logic.widen(Logic::QfAbv);
        }
        self.tss.push(ts);
        self.invalidate_cache();
    }

    pub fn add_sub(&mut self, instance: HtsInstance) {
        self.logic = self.logic.widen(instance.sub.logic);
        self.subs.push(instance);
        self.invalidate_cache();
    }

    pub fn add_assumption(&mut self, assumption: Expr) {
        self.assumptions.push(assumption);
        self.invalidate_cache();
    }

    fn invalidate_cache(&mut self) {
        self.single_init = None;
        self.single_invar = None;
        self.single_trans = None;
    }

    fn compute_single(&self, field: fn(&Ts) -> &Expr, sub_field: fn(&Hts) -> Expr) -> Expr {
        let mut parts: Vec<Expr> = self.tss.iter().map(field).cloned().collect();
        for inst in &self.subs {
            let sub_value = sub_field(&inst.sub);
            parts.push(sub_value.substitute(&inst.port_map()));
        }
        Expr::and_many(parts).expect("TS/sub-HTS formulas are Bool-sorted")
    }

    pub fn single_init(&self) -> Expr {
        self.single_init
            .clone()
            .unwrap_or_else(|| self.compute_single(|ts| &ts.init, Hts::single_init))
    }

    pub fn single_invar(&self) -> Expr {
        self.single_invar
            .clone()
            .unwrap_or_else(|| self.compute_single(|ts| &ts.invar, Hts::single_invar))
    }

    pub fn single_trans(&self) -> Expr {
        self.single_trans
            .clone()
            .unwrap_or_else(|| self.compute_single(|ts| &ts.trans, Hts::single_trans))
    }

    /// Inlines every sub-HTS instance into `self`: substitutes actual port
    /// expressions for formal parameter symbols in each sub's formulas and merges
    /// the result into the parent's TS list and variable partitions. Recursive —
    /// each sub is flattened before being inlined.
    pub fn flatten(&mut self) {
        let subs = std::mem::take(&mut self.subs);
        for inst in subs {
            let mut sub = *inst.sub;
            sub.flatten();
            let port_map = inst.port_map();

            for mut ts in sub.tss {
                ts.init = ts.init.substitute(&port_map);
                ts.invar = ts.invar.substitute(&port_map);
                ts.trans = ts.trans.substitute(&port_map);
                ts.vars = substitute_symbol_set(&ts.vars, &port_map);
                ts.state_vars = substitute_symbol_set(&ts.state_vars, &port_map);
                self.tss.push(ts);
            }
            self.input_vars
                .extend(substitute_symbol_set(&sub.input_vars, &port_map));
            self.output_vars
                .extend(substitute_symbol_set(&sub.output_vars, &port_map));
            self.state_vars
                .extend(substitute_symbol_set(&sub.state_vars, &port_map));
            self.assumptions
                .extend(sub.assumptions.iter().map(|a| a.substitute(&port_map)));
            self.logic = self.logic.widen(sub.logic);
        }
        self.single_init = Some(self.compute_single(|ts| &ts.init, Hts::single_init));
        self.single_invar = Some(self.compute_single(|ts| &ts.invar, Hts::single_invar));
        self.single_trans = Some(self.compute_single(|ts| &ts.trans, Hts::single_trans));
    }

    /// Unions variable sets, appends TS and sub-HTS instance lists. No
    /// deduplication — callers pass disjoint symbol namespaces or accept the
    /// resulting redundancy.
    pub fn combine(&mut self, other: Hts) {
        self.tss.extend(other.tss);
        self.subs.extend(other.subs);
        self.input_vars.extend(other.input_vars);
        self.output_vars.extend(other.output_vars);
        self.state_vars.extend(other.state_vars);
        self.assumptions.extend(other.assumptions);
        self.logic = self.logic.widen(other.logic);
        self.invalidate_cache();
    }

    pub fn all_vars(&self) -> HashSet<Arc<Symbol>> {
        self.input_vars
            .union(&self.output_vars)
            .cloned()
            .collect::<HashSet<_>>()
            .union(&self.state_vars)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorts::Sort;

    fn bv_sym(name: &str, w: u32) -> Symbol {
        Symbol::new(name, Sort::BitVec(w))
    }

    #[test]
    fn test_to_next_primes_and_unprevs() {
        let c = Symbol::new("c", Sort::BitVec(4));
        let e = Expr::equals(Expr::var(c.prev()), Expr::var(c.clone())).unwrap();
        let next = to_next(&e);
        let fv: HashSet<String> = next.free_vars().iter().map(|s| s.name.clone()).collect();
        assert!(fv.contains("c"));
        assert!(fv.contains("c_N"));
        assert!(!fv.contains("c_P"));
    }

    #[test]
    fn test_has_next() {
        let c = Symbol::new("c", Sort::BitVec(4));
        assert!(!has_next(&Expr::var(c.clone())));
        assert!(has_next(&Expr::var(c.prime())));
    }

    #[test]
    fn test_ts_invariant_rejects_bad_trans() {
        let c = bv_sym("c", 4);
        let d = bv_sym("d", 4);
        let vars: HashSet<_> = [Arc::new(c.clone())].into_iter().collect();
        let state_vars = vars.clone();
        // trans references `d`, which is neither in vars nor prime/prev(state_vars)
        let bad_trans = Expr::equals(Expr::var(d.clone()), Expr::var(d.prime())).unwrap();
        let result = Ts::new(
            "t",
            vars,
            state_vars,
            Expr::tru(),
            Expr::tru(),
            bad_trans,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_remove_invar_folds_into_init_and_trans() {
        let c = bv_sym("c", 4);
        let vars: HashSet<_> = [Arc::new(c.clone())].into_iter().collect();
        let invar = Expr::bv_ult(Expr::var(c.clone()), Expr::bv_const(10, 4)).unwrap();
        let trans = Expr::equals(Expr::var(c.prime()), Expr::var(c.clone())).unwrap();
        let mut ts = Ts::new("t", vars.clone(), vars, Expr::tru(), invar, trans).unwrap();
        ts.remove_invar();
        assert_eq!(ts.invar, Expr::tru());
        // init now mentions `c` through the folded invariant
        assert!(ts.init.free_vars().iter().any(|s| s.name == "c"));
    }

    #[test]
    fn test_hts_combine_unions_without_dedup() {
        let mut a = Hts::new("a");
        let mut b = Hts::new("b");
        let c = bv_sym("c", 4);
        let vars: HashSet<_> = [Arc::new(c.clone())].into_iter().collect();
        a.state_vars = vars.clone();
        b.state_vars = vars.clone();
        a.combine(b);
        // union, not a multiset append, since state_vars is a HashSet
        assert_eq!(a.state_vars.len(), 1);
    }

    #[test]
    fn test_flatten_substitutes_port_bindings() {
        let formal = bv_sym("x", 4);
        let mut sub = Hts::new("child");
        let sub_vars: HashSet<_> = [Arc::new(formal.clone())].into_iter().collect();
        sub.add_ts(
            Ts::new(
                "child_ts",
                sub_vars.clone(),
                sub_vars,
                Expr::equals(Expr::var(formal.clone()), Expr::bv_const(0, 4)).unwrap(),
                Expr::tru(),
                Expr::tru(),
            )
            .unwrap(),
        );

        let actual = bv_sym("top_c", 4);
        let mut bindings = HashMap::new();
        bindings.insert(formal, Expr::var(actual.clone()));
        let mut top = Hts::new("top");
        top.add_sub(HtsInstance::new(sub, bindings));
        top.flatten();

        assert_eq!(top.tss.len(), 1);
        let fv = top.tss[0].init.free_vars();
        assert!(fv.iter().any(|s| s.name == "top_c"));
    }
}
