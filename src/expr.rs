//! Formula AST and the global symbol-interning table.
//!
//! Expressions are plain owned trees — the unrolling step in the BMC engine builds
//! large one-off substitution maps, and hash-consing every intermediate formula would
//! just make that allocation-heavy instead of allocation-free. What *is* interned is
//! the much smaller, much longer-lived set of [Symbol]s, since those carry the global
//! name identity the timing discipline in [crate::symbol] depends on.

use crate::sorts::Sort;
use crate::symbol::Symbol;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Process-scoped, append-only, concurrently-readable symbol table. Two calls to
/// [intern_symbol] with an equal [Symbol] return the same [Arc].
static SYMBOL_TABLE: Lazy<DashMap<Symbol, Arc<Symbol>>> = Lazy::new(DashMap::new);

/// Intern a symbol, returning a shared handle. Cheap to call repeatedly: the table is
/// checked first and only populated once per distinct `(name, sort)` pair.
pub fn intern_symbol(symbol: Symbol) -> Arc<Symbol> {
    if let Some(existing) = SYMBOL_TABLE.get(&symbol) {
        return existing.clone();
    }
    let arc = Arc::new(symbol.clone());
    SYMBOL_TABLE.insert(symbol, arc.clone());
    arc
}

/// A node in the QF_ABV formula AST.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    BoolConst(bool),
    BvConst { value: u128, width: u32 },
    Var(Arc<Symbol>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Iff(Box<Expr>, Box<Expr>),
    Equals(Box<Expr>, Box<Expr>),
    Ite(Box<Expr>, Box<Expr>, Box<Expr>),
    BvAdd(Box<Expr>, Box<Expr>),
    BvSub(Box<Expr>, Box<Expr>),
    BvShl(Box<Expr>, Box<Expr>),
    BvAnd(Box<Expr>, Box<Expr>),
    BvOr(Box<Expr>, Box<Expr>),
    BvXor(Box<Expr>, Box<Expr>),
    BvNot(Box<Expr>),
    BvUlt(Box<Expr>, Box<Expr>),
    BvUle(Box<Expr>, Box<Expr>),
    BvUgt(Box<Expr>, Box<Expr>),
    BvUge(Box<Expr>, Box<Expr>),
    Extract { hi: u32, lo: u32, expr: Box<Expr> },
    Concat(Box<Expr>, Box<Expr>),
    Select(Box<Expr>, Box<Expr>),
    Store(Box<Expr>, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn bool_const(v: bool) -> Expr {
        Expr::BoolConst(v)
    }

    pub fn tru() -> Expr {
        Expr::BoolConst(true)
    }

    pub fn fls() -> Expr {
        Expr::BoolConst(false)
    }

    pub fn bv_const(value: u128, width: u32) -> Expr {
        let mask = if width >= 128 {
            u128::MAX
        } else {
            (1u128 << width) - 1
        };
        Expr::BvConst {
            value: value & mask,
            width,
        }
    }

    pub fn var(symbol: Symbol) -> Expr {
        Expr::Var(intern_symbol(symbol))
    }

    /// Structural sort inference. Assumes the tree was built through the smart
    /// constructors below (which sort-check eagerly), so this never needs to return
    /// a `Result` — it is a query, not a validator.
    pub fn sort(&self) -> Sort {
        match self {
            Expr::BoolConst(_)
            | Expr::Not(_)
            | Expr::And(_, _)
            | Expr::Or(_, _)
            | Expr::Xor(_, _)
            | Expr::Implies(_, _)
            | Expr::Iff(_, _)
            | Expr::Equals(_, _)
            | Expr::BvUlt(_, _)
            | Expr::BvUle(_, _)
            | Expr::BvUgt(_, _)
            | Expr::BvUge(_, _) => Sort::Bool,
            Expr::BvConst { width, .. } => Sort::BitVec(*width),
            Expr::Var(s) => s.sort.clone(),
            Expr::Ite(_, t, _) => t.sort(),
            Expr::BvAdd(a, _)
            | Expr::BvSub(a, _)
            | Expr::BvShl(a, _)
            | Expr::BvAnd(a, _)
            | Expr::BvOr(a, _)
            | Expr::BvXor(a, _) => a.sort(),
            Expr::BvNot(a) => a.sort(),
            Expr::Extract { hi, lo, .. } => Sort::BitVec(hi - lo + 1),
            Expr::Concat(a, b) => {
                let wa = a.sort().bv_width().unwrap_or(0);
                let wb = b.sort().bv_width().unwrap_or(0);
                Sort::BitVec(wa + wb)
            }
            Expr::Select(arr, _) => match arr.sort() {
                Sort::Array { element, .. } => *element,
                other => other,
            },
            Expr::Store(arr, _, _) => arr.sort(),
        }
    }

    // ---- smart constructors with the sort-check rules from SPEC §4.1 ----

    pub fn not(a: Expr) -> Result<Expr, String> {
        require_sort(&a, &Sort::Bool, "Not")?;
        Ok(Expr::Not(Box::new(a)))
    }

    pub fn and(a: Expr, b: Expr) -> Result<Expr, String> {
        require_sort(&a, &Sort::Bool, "And")?;
        require_sort(&b, &Sort::Bool, "And")?;
        Ok(Expr::And(Box::new(a), Box::new(b)))
    }

    pub fn and_many(mut exprs: Vec<Expr>) -> Result<Expr, String> {
        if exprs.is_empty() {
            return Ok(Expr::tru());
        }
        let mut acc = exprs.remove(0);
        require_sort(&acc, &Sort::Bool, "And")?;
        for e in exprs {
            acc = Expr::and(acc, e)?;
        }
        Ok(acc)
    }

    pub fn or(a: Expr, b: Expr) -> Result<Expr, String> {
        require_sort(&a, &Sort::Bool, "Or")?;
        require_sort(&b, &Sort::Bool, "Or")?;
        Ok(Expr::Or(Box::new(a), Box::new(b)))
    }

    pub fn or_many(mut exprs: Vec<Expr>) -> Result<Expr, String> {
        if exprs.is_empty() {
            return Ok(Expr::fls());
        }
        let mut acc = exprs.remove(0);
        require_sort(&acc, &Sort::Bool, "Or")?;
        for e in exprs {
            acc = Expr::or(acc, e)?;
        }
        Ok(acc)
    }

    pub fn xor(a: Expr, b: Expr) -> Result<Expr, String> {
        require_sort(&a, &Sort::Bool, "Xor")?;
        require_sort(&b, &Sort::Bool, "Xor")?;
        Ok(Expr::Xor(Box::new(a), Box::new(b)))
    }

    pub fn implies(a: Expr, b: Expr) -> Result<Expr, String> {
        require_sort(&a, &Sort::Bool, "Implies")?;
        require_sort(&b, &Sort::Bool, "Implies")?;
        Ok(Expr::Implies(Box::new(a), Box::new(b)))
    }

    pub fn iff(a: Expr, b: Expr) -> Result<Expr, String> {
        require_sort(&a, &Sort::Bool, "Iff")?;
        require_sort(&b, &Sort::Bool, "Iff")?;
        Ok(Expr::Iff(Box::new(a), Box::new(b)))
    }

    /// `Equals(a,b)` requires matching sorts (SPEC §4.1).
    pub fn equals(a: Expr, b: Expr) -> Result<Expr, String> {
        let (sa, sb) = (a.sort(), b.sort());
        if sa != sb {
            return Err(format!(
                "Equals requires matching sorts, got {sa} and {sb}"
            ));
        }
        Ok(Expr::Equals(Box::new(a), Box::new(b)))
    }

    /// Not-equals, via `Not(Equals(a,b))`.
    pub fn not_equals(a: Expr, b: Expr) -> Result<Expr, String> {
        Expr::not(Expr::equals(a, b)?)
    }

    /// ITE branches must share sort (SPEC §4.1).
    pub fn ite(cond: Expr, then_branch: Expr, else_branch: Expr) -> Result<Expr, String> {
        require_sort(&cond, &Sort::Bool, "Ite condition")?;
        let (st, se) = (then_branch.sort(), else_branch.sort());
        if st != se {
            return Err(format!("Ite branches must share sort, got {st} and {se}"));
        }
        Ok(Expr::Ite(Box::new(cond), Box::new(then_branch), Box::new(else_branch)))
    }

    fn bv_binop(
        a: Expr,
        b: Expr,
        ctor: fn(Box<Expr>, Box<Expr>) -> Expr,
        name: &str,
    ) -> Result<Expr, String> {
        let (wa, wb) = (bv_width_of(&a, name)?, bv_width_of(&b, name)?);
        if wa != wb {
            return Err(format!(
                "{name} requires equal bit-vector widths, got {wa} and {wb}"
            ));
        }
        Ok(ctor(Box::new(a), Box::new(b)))
    }

    pub fn bv_add(a: Expr, b: Expr) -> Result<Expr, String> {
        Expr::bv_binop(a, b, Expr::BvAdd, "BvAdd")
    }

    pub fn bv_sub(a: Expr, b: Expr) -> Result<Expr, String> {
        Expr::bv_binop(a, b, Expr::BvSub, "BvSub")
    }

    pub fn bv_shl(a: Expr, b: Expr) -> Result<Expr, String> {
        Expr::bv_binop(a, b, Expr::BvShl, "BvShl")
    }

    pub fn bv_and(a: Expr, b: Expr) -> Result<Expr, String> {
        Expr::bv_binop(a, b, Expr::BvAnd, "BvAnd")
    }

    pub fn bv_or(a: Expr, b: Expr) -> Result<Expr, String> {
        Expr::bv_binop(a, b, Expr::BvOr, "BvOr")
    }

    pub fn bv_xor(a: Expr, b: Expr) -> Result<Expr, String> {
        Expr::bv_binop(a, b, Expr::BvXor, "BvXor")
    }

    pub fn bv_not(a: Expr) -> Result<Expr, String> {
        bv_width_of(&a, "BvNot")?;
        Ok(Expr::BvNot(Box::new(a)))
    }

    fn bv_cmp(
        a: Expr,
        b: Expr,
        ctor: fn(Box<Expr>, Box<Expr>) -> Expr,
        name: &str,
    ) -> Result<Expr, String> {
        let (wa, wb) = (bv_width_of(&a, name)?, bv_width_of(&b, name)?);
        if wa != wb {
            return Err(format!(
                "{name} requires equal bit-vector widths, got {wa} and {wb}"
            ));
        }
        Ok(ctor(Box::new(a), Box::new(b)))
    }

    pub fn bv_ult(a: Expr, b: Expr) -> Result<Expr, String> {
        Expr::bv_cmp(a, b, Expr::BvUlt, "BvUlt")
    }

    pub fn bv_ule(a: Expr, b: Expr) -> Result<Expr, String> {
        Expr::bv_cmp(a, b, Expr::BvUle, "BvUle")
    }

    pub fn bv_ugt(a: Expr, b: Expr) -> Result<Expr, String> {
        Expr::bv_cmp(a, b, Expr::BvUgt, "BvUgt")
    }

    pub fn bv_uge(a: Expr, b: Expr) -> Result<Expr, String> {
        Expr::bv_cmp(a, b, Expr::BvUge, "BvUge")
    }

    /// Extract `[hi:lo]` requires `0 <= lo <= hi < width` (SPEC §4.1).
    pub fn extract(hi: u32, lo: u32, expr: Expr) -> Result<Expr, String> {
        let width = bv_width_of(&expr, "Extract")?;
        if lo > hi || hi >= width {
            return Err(format!(
                "Extract [{hi}:{lo}] out of bounds for bit-vector of width {width}"
            ));
        }
        Ok(Expr::Extract {
            hi,
            lo,
            expr: Box::new(expr),
        })
    }

    pub fn concat(a: Expr, b: Expr) -> Result<Expr, String> {
        bv_width_of(&a, "Concat")?;
        bv_width_of(&b, "Concat")?;
        Ok(Expr::Concat(Box::new(a), Box::new(b)))
    }

    /// Array select returns the element sort (SPEC §4.1).
    pub fn select(array: Expr, index: Expr) -> Result<Expr, String> {
        let (idx_sort, elem_sort) = match array.sort() {
            Sort::Array { index, element } => (*index, *element),
            other => return Err(format!("Select requires an array, got {other}")),
        };
        if index.sort() != idx_sort {
            return Err(format!(
                "Select index sort mismatch: expected {idx_sort}, got {}",
                index.sort()
            ));
        }
        let _ = elem_sort;
        Ok(Expr::Select(Box::new(array), Box::new(index)))
    }

    pub fn store(array: Expr, index: Expr, value: Expr) -> Result<Expr, String> {
        let (idx_sort, elem_sort) = match array.sort() {
            Sort::Array { index, element } => (*index, *element),
            other => return Err(format!("Store requires an array, got {other}")),
        };
        if index.sort() != idx_sort {
            return Err(format!(
                "Store index sort mismatch: expected {idx_sort}, got {}",
                index.sort()
            ));
        }
        if value.sort() != elem_sort {
            return Err(format!(
                "Store value sort mismatch: expected {elem_sort}, got {}",
                value.sort()
            ));
        }
        Ok(Expr::Store(Box::new(array), Box::new(index), Box::new(value)))
    }

    /// Free variables of the expression, as interned symbol handles.
    pub fn free_vars(&self) -> HashSet<Arc<Symbol>> {
        let mut acc = HashSet::new();
        self.collect_free_vars(&mut acc);
        acc
    }

    fn collect_free_vars(&self, acc: &mut HashSet<Arc<Symbol>>) {
        match self {
            Expr::BoolConst(_) | Expr::BvConst { .. } => {}
            Expr::Var(s) => {
                acc.insert(s.clone());
            }
            Expr::Not(a) | Expr::BvNot(a) | Expr::Extract { expr: a, .. } => {
                a.collect_free_vars(acc)
            }
            Expr::And(a, b)
            | Expr::Or(a, b)
            | Expr::Xor(a, b)
            | Expr::Implies(a, b)
            | Expr::Iff(a, b)
            | Expr::Equals(a, b)
            | Expr::BvAdd(a, b)
            | Expr::BvSub(a, b)
            | Expr::BvShl(a, b)
            | Expr::BvAnd(a, b)
            | Expr::BvOr(a, b)
            | Expr::BvXor(a, b)
            | Expr::BvUlt(a, b)
            | Expr::BvUle(a, b)
            | Expr::BvUgt(a, b)
            | Expr::BvUge(a, b)
            | Expr::Concat(a, b)
            | Expr::Select(a, b) => {
                a.collect_free_vars(acc);
                b.collect_free_vars(acc);
            }
            Expr::Ite(c, t, e) => {
                c.collect_free_vars(acc);
                t.collect_free_vars(acc);
                e.collect_free_vars(acc);
            }
            Expr::Store(a, i, v) => {
                a.collect_free_vars(acc);
                i.collect_free_vars(acc);
                v.collect_free_vars(acc);
            }
        }
    }

    /// Capture-free substitution. Symbols are globally unique (interned), so this is
    /// just leaf replacement — no alpha-renaming is needed.
    pub fn substitute(&self, map: &HashMap<Arc<Symbol>, Expr>) -> Expr {
        match self {
            Expr::BoolConst(_) | Expr::BvConst { .. } => self.clone(),
            Expr::Var(s) => map.get(s).cloned().unwrap_or_else(|| self.clone()),
            Expr::Not(a) => Expr::Not(Box::new(a.substitute(map))),
            Expr::BvNot(a) => Expr::BvNot(Box::new(a.substitute(map))),
            Expr::Extract { hi, lo, expr } => Expr::Extract {
                hi: *hi,
                lo: *lo,
                expr: Box::new(expr.substitute(map)),
            },
            Expr::And(a, b) => Expr::And(Box::new(a.substitute(map)), Box::new(b.substitute(map))),
            Expr::Or(a, b) => Expr::Or(Box::new(a.substitute(map)), Box::new(b.substitute(map))),
            Expr::Xor(a, b) => Expr::Xor(Box::new(a.substitute(map)), Box::new(b.substitute(map))),
            Expr::Implies(a, b) => {
                Expr::Implies(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::Iff(a, b) => Expr::Iff(Box::new(a.substitute(map)), Box::new(b.substitute(map))),
            Expr::Equals(a, b) => {
                Expr::Equals(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::BvAdd(a, b) => {
                Expr::BvAdd(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::BvSub(a, b) => {
                Expr::BvSub(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::BvShl(a, b) => {
                Expr::BvShl(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::BvAnd(a, b) => {
                Expr::BvAnd(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::BvOr(a, b) => Expr::BvOr(Box::new(a.substitute(map)), Box::new(b.substitute(map))),
            Expr::BvXor(a, b) => {
                Expr::BvXor(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::BvUlt(a, b) => {
                Expr::BvUlt(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::BvUle(a, b) => {
                Expr::BvUle(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::BvUgt(a, b) => {
                Expr::BvUgt(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::BvUge(a, b) => {
                Expr::BvUge(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::Concat(a, b) => {
                Expr::Concat(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::Select(a, b) => {
                Expr::Select(Box::new(a.substitute(map)), Box::new(b.substitute(map)))
            }
            Expr::Ite(c, t, e) => Expr::Ite(
                Box::new(c.substitute(map)),
                Box::new(t.substitute(map)),
                Box::new(e.substitute(map)),
            ),
            Expr::Store(a, i, v) => Expr::Store(
                Box::new(a.substitute(map)),
                Box::new(i.substitute(map)),
                Box::new(v.substitute(map)),
            ),
        }
    }

    /// Constant folding, idempotence, and neutral-element simplification. Not a full
    /// decision procedure — just cheap syntactic rewrites applied bottom-up.
    pub fn simplify(&self) -> Expr {
        match self {
            Expr::Not(a) => match a.simplify() {
                Expr::BoolConst(b) => Expr::BoolConst(!b),
                Expr::Not(inner) => *inner,
                other => Expr::Not(Box::new(other)),
            },
            Expr::And(a, b) => match (a.simplify(), b.simplify()) {
                (Expr::BoolConst(false), _) | (_, Expr::BoolConst(false)) => Expr::fls(),
                (Expr::BoolConst(true), x) | (x, Expr::BoolConst(true)) => x,
                (x, y) if x == y => x,
                (x, y) => Expr::And(Box::new(x), Box::new(y)),
            },
            Expr::Or(a, b) => match (a.simplify(), b.simplify()) {
                (Expr::BoolConst(true), _) | (_, Expr::BoolConst(true)) => Expr::tru(),
                (Expr::BoolConst(false), x) | (x, Expr::BoolConst(false)) => x,
                (x, y) if x == y => x,
                (x, y) => Expr::Or(Box::new(x), Box::new(y)),
            },
            Expr::Xor(a, b) => match (a.simplify(), b.simplify()) {
                (Expr::BoolConst(x), Expr::BoolConst(y)) => Expr::BoolConst(x != y),
                (Expr::BoolConst(false), y) | (y, Expr::BoolConst(false)) => y,
                (Expr::BoolConst(true), y) | (y, Expr::BoolConst(true)) => {
                    Expr::Not(Box::new(y)).simplify()
                }
                (x, y) => Expr::Xor(Box::new(x), Box::new(y)),
            },
            Expr::Implies(a, b) => match (a.simplify(), b.simplify()) {
                (Expr::BoolConst(false), _) => Expr::tru(),
                (_, Expr::BoolConst(true)) => Expr::tru(),
                (Expr::BoolConst(true), y) => y,
                (x, y) => Expr::Implies(Box::new(x), Box::new(y)),
            },
            Expr::Iff(a, b) => match (a.simplify(), b.simplify()) {
                (Expr::BoolConst(x), Expr::BoolConst(y)) => Expr::BoolConst(x == y),
                (x, y) if x == y => Expr::tru(),
                (x, y) => Expr::Iff(Box::new(x), Box::new(y)),
            },
            Expr::Equals(a, b) => {
                let (x, y) = (a.simplify(), b.simplify());
                if x == y {
                    Expr::tru()
                } else {
                    Expr::Equals(Box::new(x), Box::new(y))
                }
            }
            Expr::Ite(c, t, e) => match c.simplify() {
                Expr::BoolConst(true) => t.simplify(),
                Expr::BoolConst(false) => e.simplify(),
                cond => {
                    let (t, e) = (t.simplify(), e.simplify());
                    if t == e {
                        t
                    } else {
                        Expr::Ite(Box::new(cond), Box::new(t), Box::new(e))
                    }
                }
            },
            Expr::BvAdd(a, b) => match (a.simplify(), b.simplify()) {
                (Expr::BvConst { value: x, width }, Expr::BvConst { value: y, .. }) => {
                    Expr::bv_const(x.wrapping_add(y), width)
                }
                (x, y) => Expr::BvAdd(Box::new(x), Box::new(y)),
            },
            Expr::BvSub(a, b) => match (a.simplify(), b.simplify()) {
                (Expr::BvConst { value: x, width }, Expr::BvConst { value: y, .. }) => {
                    Expr::bv_const(x.wrapping_sub(y), width)
                }
                (x, y) => Expr::BvSub(Box::new(x), Box::new(y)),
            },
            Expr::BvAnd(a, b) => match (a.simplify(), b.simplify()) {
                (Expr::BvConst { value: x, width }, Expr::BvConst { value: y, .. }) => {
                    Expr::bv_const(x & y, width)
                }
                (x, y) => Expr::BvAnd(Box::new(x), Box::new(y)),
            },
            Expr::BvOr(a, b) => match (a.simplify(), b.simplify()) {
                (Expr::BvConst { value: x, width }, Expr::BvConst { value: y, .. }) => {
                    Expr::bv_const(x | y, width)
                }
                (x, y) => Expr::BvOr(Box::new(x), Box::new(y)),
            },
            Expr::BvXor(a, b) => match (a.simplify(), b.simplify()) {
                (Expr::BvConst { value: x, width }, Expr::BvConst { value: y, .. }) => {
                    Expr::bv_const(x ^ y, width)
                }
                (x, y) => Expr::BvXor(Box::new(x), Box::new(y)),
            },
            Expr::BvNot(a) => match a.simplify() {
                Expr::BvConst { value, width } => {
                    let mask = if width >= 128 {
                        u128::MAX
                    } else {
                        (1u128 << width) - 1
                    };
                    Expr::bv_const(!value & mask, width)
                }
                x => Expr::BvNot(Box::new(x)),
            },
            Expr::Select(a, b) => Expr::Select(Box::new(a.simplify()), Box::new(b.simplify())),
            Expr::Store(a, i, v) => Expr::Store(
                Box::new(a.simplify()),
                Box::new(i.simplify()),
                Box::new(v.simplify()),
            ),
            // remaining ops: no special-cased rewrites, just recurse on operands
            Expr::BvShl(a, b) => Expr::BvShl(Box::new(a.simplify()), Box::new(b.simplify())),
            Expr::BvUlt(a, b) => Expr::BvUlt(Box::new(a.simplify()), Box::new(b.simplify())),
            Expr::BvUle(a, b) => Expr::BvUle(Box::new(a.simplify()), Box::new(b.simplify())),
            Expr::BvUgt(a, b) => Expr::BvUgt(Box::new(a.simplify()), Box::new(b.simplify())),
            Expr::BvUge(a, b) => Expr::BvUge(Box::new(a.simplify()), Box::new(b.simplify())),
            Expr::Concat(a, b) => Expr::Concat(Box::new(a.simplify()), Box::new(b.simplify())),
            Expr::Extract { hi, lo, expr } => Expr::Extract {
                hi: *hi,
                lo: *lo,
                expr: Box::new(expr.simplify()),
            },
            Expr::BoolConst(_) | Expr::BvConst { .. } | Expr::Var(_) => self.clone(),
        }
    }

    /// Multiset of top-level conjuncts: flattens nested top-level `And` nodes.
    /// Used by the solver façade to emit one assertion per conjunct.
    pub fn conjunctive_partition(&self) -> Vec<Expr> {
        let mut acc = Vec::new();
        self.collect_conjuncts(&mut acc);
        acc
    }

    fn collect_conjuncts(&self, acc: &mut Vec<Expr>) {
        match self {
            Expr::And(a, b) => {
                a.collect_conjuncts(acc);
                b.collect_conjuncts(acc);
            }
            other => acc.push(other.clone()),
        }
    }
}

fn require_sort(e: &Expr, expected: &Sort, who: &str) -> Result<(), String> {
    let got = e.sort();
    if &got != expected {
        return Err(format!("{who} requires sort {expected}, got {got}"));
    }
    Ok(())
}

fn bv_width_of(e: &Expr, who: &str) -> Result<u32, String> {
    e.sort()
        .bv_width()
        .ok_or_else(|| format!("{who} requires a bit-vector operand, got sort {}", e.sort()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(name: &str, w: u32) -> Expr {
        Expr::var(Symbol::new(name, Sort::BitVec(w)))
    }

    fn bl(name: &str) -> Expr {
        Expr::var(Symbol::new(name, Sort::Bool))
    }

    #[test]
    fn test_sort_checks_reject_mismatches() {
        assert!(Expr::and(bl("a"), bv("c", 4)).is_err());
        assert!(Expr::equals(bv("a", 4), bv("b", 8)).is_err());
        assert!(Expr::ite(bl("p"), bv("a", 4), bl("b")).is_err());
        assert!(Expr::extract(8, 0, bv("a", 4)).is_err());
        assert!(Expr::extract(3, 5, bv("a", 8)).is_err());
    }

    #[test]
    fn test_sort_checks_accept_valid() {
        assert!(Expr::and(bl("a"), bl("b")).is_ok());
        assert!(Expr::equals(bv("a", 4), bv("b", 4)).is_ok());
        assert!(Expr::extract(3, 0, bv("a", 8)).unwrap().sort() == Sort::BitVec(4));
    }

    #[test]
    fn test_free_vars_basic() {
        let a = bv("a", 4);
        let b = bv("b", 4);
        let e = Expr::equals(a.clone(), b.clone()).unwrap();
        let fv = e.free_vars();
        assert_eq!(fv.len(), 2);
    }

    // Invariant 1 (SPEC §8): v in free_vars(substitute(phi, {v -> e})) iff
    // v in free_vars(e) and v in free_vars(phi).
    #[test]
    fn test_substitution_free_var_invariant() {
        let a = Symbol::new("a", Sort::BitVec(4));
        let b = Symbol::new("b", Sort::BitVec(4));
        let c = Symbol::new("c", Sort::BitVec(4));

        let phi = Expr::equals(Expr::var(a.clone()), Expr::var(b.clone())).unwrap();
        // substitute a -> c: c should now be free, a should not
        let mut map = HashMap::new();
        map.insert(intern_symbol(a.clone()), Expr::var(c.clone()));
        let substituted = phi.substitute(&map);
        let fv = substituted.free_vars();
        assert!(fv.iter().any(|s| s.name == "c"));
        assert!(!fv.iter().any(|s| s.name == "a"));
        assert!(fv.iter().any(|s| s.name == "b"));

        // substitute a -> a (identity, e has no free vars of interest beyond a):
        // a remains free, consistent with v in free_vars(e) for e = a itself
        let mut map2 = HashMap::new();
        map2.insert(intern_symbol(a.clone()), Expr::var(a.clone()));
        let substituted2 = phi.substitute(&map2);
        assert!(substituted2.free_vars().iter().any(|s| s.name == "a"));
    }

    #[test]
    fn test_simplify_constant_folding() {
        let e = Expr::and(Expr::tru(), bl("a")).unwrap();
        assert_eq!(e.simplify(), bl("a"));

        let e = Expr::or(Expr::fls(), bl("a")).unwrap();
        assert_eq!(e.simplify(), bl("a"));

        let e = Expr::not(Expr::not(bl("a")).unwrap()).unwrap();
        assert_eq!(e.simplify(), bl("a"));

        let e = Expr::bv_add(Expr::bv_const(3, 4), Expr::bv_const(5, 4)).unwrap();
        assert_eq!(e.simplify(), Expr::bv_const(8, 4));
    }

    #[test]
    fn test_conjunctive_partition_flattens() {
        let a = bl("a");
        let b = bl("b");
        let c = bl("c");
        let conj = Expr::and(Expr::and(a.clone(), b.clone()).unwrap(), c.clone()).unwrap();
        let parts = conj.conjunctive_partition();
        assert_eq!(parts, vec![a, b, c]);
    }

    #[test]
    fn test_symbol_interning_shares_handle() {
        let a1 = intern_symbol(Symbol::new("shared", Sort::Bool));
        let a2 = intern_symbol(Symbol::new("shared", Sort::Bool));
        assert!(Arc::ptr_eq(&a1, &a2));
    }
}
