//! Index arithmetic for turning a raw solver model keyed by *timed*/*ptimed* symbol
//! names back into a single forward-time-indexed view, one entry per
//! `(ref_var_name, step)`.
//!
//! Ported from `_remap_model_fwd`/`_remap_model_bwd`/`_remap_model_zz` in
//! `analyzers/mcsolver.py`, with the same index arithmetic.

use crate::solver::RawModel;
use std::collections::HashMap;

/// `(reference variable name, forward-time step) -> raw value literal`.
pub type IndexedModel = HashMap<(String, i64), String>;

fn split_timed(name: &str) -> Option<(String, usize)> {
    if name.contains("_ATP") {
        return None;
    }
    let idx = name.rfind("_AT")?;
    let (base, rest) = name.split_at(idx);
    let step: usize = rest.strip_prefix("_AT")?.parse().ok()?;
    Some((base.to_string(), step))
}

fn split_ptimed(name: &str) -> Option<(String, usize)> {
    let idx = name.rfind("_ATP")?;
    let (base, rest) = name.split_at(idx);
    let step: usize = rest.strip_prefix("_ATP")?.parse().ok()?;
    Some((base.to_string(), step))
}

/// FWD: model variables are already named in forward time, so this just parses the
/// `_AT<k>` suffix back into `(name, k)`.
pub fn remap_fwd(raw: &RawModel) -> IndexedModel {
    let mut out = IndexedModel::new();
    for (name, value) in raw {
        if let Some((base, t)) = split_timed(name) {
            out.insert((base, t as i64), value.clone());
        }
    }
    out
}

/// BWD: `retmodel[timed(v, t)] = model[ptimed(v, k - t)]` for all `v` and all
/// `t ∈ [0, k]`.
pub fn remap_bwd(raw: &RawModel, k: usize) -> IndexedModel {
    let mut out = IndexedModel::new();
    for (name, value) in raw {
        if let Some((base, p)) = split_ptimed(name) {
            if p <= k {
                out.insert((base, (k - p) as i64), value.clone());
            }
        }
    }
    out
}

/// ZZ: forward-named entries are used directly for the lower half
/// (`t ≤ ⌊k/2⌋`); the upper half is recovered from ptimed entries with the same
/// index arithmetic as [remap_bwd].
pub fn remap_zz(raw: &RawModel, k: usize) -> IndexedModel {
    let mid = k / 2;
    let mut out: IndexedModel = remap_fwd(raw)
        .into_iter()
        .filter(|((_, t), _)| *t as usize <= mid)
        .collect();
    out.extend(
        remap_bwd(raw, k)
            .into_iter()
            .filter(|((_, t), _)| *t as usize > mid),
    );
    out
}
