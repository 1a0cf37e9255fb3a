//! Symbolic bounded model checking for hierarchical transition systems over
//! quantifier-free bit-vector/array logic (QF_ABV). Given an HTS and a property,
//! decides bounded safety, liveness, eventually, equivalence, simulation and LTL
//! questions by symbolically unrolling the transition relation and discharging
//! satisfiability queries to a back-end SMT solver.

pub mod bmc;
pub mod error;
pub mod expr;
pub mod formula_lang;
pub mod lemma;
pub mod printer;
pub mod problem;
pub mod properties;
pub mod solver;
pub mod sorts;
pub mod symbol;
pub mod trace;
pub mod ts;
