//! Error kinds for the calling core.
//!
//! `Invariant` errors are meant to be fatal: callers should not attempt to
//! recover from them within a block. The others are recoverable at region or
//! block granularity by the surrounding orchestration (out of scope here).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("region is empty: {0}")]
    RegionEmpty(String),

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),
}

pub type Result<T> = std::result::Result<T, Error>;
