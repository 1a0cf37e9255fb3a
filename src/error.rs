//! Engine-level error type.
//!
//! Formula-language errors (tokenizing/parsing a property string, sort-checking
//! during `Expr` construction) stay plain `Result<T, String>`, as in the teacher's
//! `HctlTreeNode`/tokenizer. Everything the BMC driver needs to `match` on by kind —
//! to decide UNKNOWN-vs-fatal, say — goes through this enum instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("sort error: {0}")]
    Sort(String),

    #[error("solver error: {0}")]
    Solver(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("lemma error: {0}")]
    Lemma(String),

    #[error("mismatch: {0}")]
    Mismatch(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
