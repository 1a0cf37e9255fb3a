//! Semantic expansion of the grammar's sugar forms into plain [Expr] trees.
//!
//! `change`/`nochange` are implemented literally from the prose definition
//! (`x ≠ next(x)` / `x = next(x)`) rather than the original's buggy
//! `Not(EqualsOrIff(x), TS.to_next(x))` (wrong arity on both calls) — see the
//! repository's design notes for that call.

use crate::error::CoreError;
use crate::expr::Expr;
use crate::sorts::Sort;
use crate::symbol::Symbol;
use crate::ts::to_next;

use std::collections::HashMap;

fn sort_err(e: String) -> CoreError {
    CoreError::Sort(e)
}

/// `posedge(x) = x=0 ∧ next(x)=1` (BV) or `¬x ∧ next(x)` (Bool).
pub fn posedge(x: Expr) -> Result<Expr, CoreError> {
    let next_x = to_next(&x);
    match x.sort() {
        Sort::Bool => Expr::and(Expr::not(x).map_err(sort_err)?, next_x).map_err(sort_err),
        Sort::BitVec(w) => Expr::and(
            Expr::equals(x, Expr::bv_const(0, w)).map_err(sort_err)?,
            Expr::equals(next_x, Expr::bv_const(1, w)).map_err(sort_err)?,
        )
        .map_err(sort_err),
        other => Err(CoreError::Sort(format!("posedge requires Bool or BitVec, got {other}"))),
    }
}

/// `negedge(x)`: symmetric to [posedge] — current high, next low.
pub fn negedge(x: Expr) -> Result<Expr, CoreError> {
    let next_x = to_next(&x);
    match x.sort() {
        Sort::Bool => Expr::and(x, Expr::not(next_x).map_err(sort_err)?).map_err(sort_err),
        Sort::BitVec(w) => Expr::and(
            Expr::equals(x, Expr::bv_const(1, w)).map_err(sort_err)?,
            Expr::equals(next_x, Expr::bv_const(0, w)).map_err(sort_err)?,
        )
        .map_err(sort_err),
        other => Err(CoreError::Sort(format!("negedge requires Bool or BitVec, got {other}"))),
    }
}

/// `change(x) = x ≠ next(x)`.
pub fn change(x: Expr) -> Result<Expr, CoreError> {
    let next_x = to_next(&x);
    Expr::not_equals(x, next_x).map_err(sort_err)
}

/// `nochange(x) = x = next(x)`.
pub fn nochange(x: Expr) -> Result<Expr, CoreError> {
    let next_x = to_next(&x);
    Expr::equals(x, next_x).map_err(sort_err)
}

/// `maxbvval(x)`: the all-ones constant of `x`'s bit-vector width.
pub fn maxbvval(x: &Expr) -> Result<Expr, CoreError> {
    match x.sort() {
        Sort::BitVec(w) => Ok(Expr::bv_const(u128::MAX, w)),
        other => Err(CoreError::Sort(format!("maxbvval requires a bit-vector operand, got {other}"))),
    }
}

/// `memacc(m, i)`: selects from either an `Array` symbol named `m`, or a sorted
/// family of scalar sub-symbols `m_0..m_{n-1}` found in `env`. A constant index
/// selects directly (checked in bounds); a symbolic index compiles to an ITE
/// chain over the family.
pub fn memacc(env: &HashMap<String, Symbol>, m: &str, index: Expr) -> Result<Expr, CoreError> {
    if let Some(array_sym) = env.get(m) {
        if let Sort::Array { .. } = &array_sym.sort {
            return Expr::select(Expr::var(array_sym.clone()), index).map_err(sort_err);
        }
    }

    let mut entries = Vec::new();
    let mut idx = 0usize;
    loop {
        match env.get(&format!("{m}_{idx}")) {
            Some(sym) => {
                entries.push(sym.clone());
                idx += 1;
            }
            None => break,
        }
    }
    if entries.is_empty() {
        return Err(CoreError::Sort(format!(
            "memacc: no array or scalar family found for '{m}'"
        )));
    }

    if let Expr::BvConst { value, .. } = &index {
        let i = *value as usize;
        return entries
            .get(i)
            .map(|sym| Expr::var(sym.clone()))
            .ok_or_else(|| CoreError::Sort(format!("memacc: constant index {i} out of bounds for '{m}'")));
    }

    let idx_width = index
        .sort()
        .bv_width()
        .ok_or_else(|| CoreError::Sort("memacc index must be a bit-vector".to_string()))?;
    let mut acc = Expr::var(entries.last().unwrap().clone());
    for (i, sym) in entries.iter().enumerate().rev().skip(1) {
        let cond = Expr::equals(index.clone(), Expr::bv_const(i as u128, idx_width)).map_err(sort_err)?;
        acc = Expr::ite(cond, Expr::var(sym.clone()), acc).map_err(sort_err)?;
    }
    Ok(acc)
}
