//! The six verification kinds: safety, eventually-never, liveness, LTL,
//! equivalence, and simulation — each reduces to one or more calls into
//! [crate::bmc::engine].

pub mod equivalence;
pub mod liveness;
pub mod ltl;
pub mod safety;
pub mod simulation;
