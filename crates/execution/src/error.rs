//! Error types for the execution layer.

use dlmm_lp_domain::{AmountError, ConfigError};
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a single pair's reconciliation cycle.
///
/// The scheduler logs these and retries the pair on the next interval; the
/// position state record is left untouched.
#[derive(Debug, Error)]
pub enum CycleError {
    /// A collaborator call exceeded its time budget.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Collaborator operation.
        operation: &'static str,
        /// Budget that was exceeded.
        timeout: Duration,
    },
    /// A read from a collaborator failed.
    #[error("{operation} failed: {source:#}")]
    Collaborator {
        /// Collaborator operation.
        operation: &'static str,
        /// Underlying failure.
        source: anyhow::Error,
    },
    /// The pool reported a price that cannot be used for sizing.
    #[error("active bin price {price} is not positive")]
    InvalidPrice {
        /// Reported price.
        price: Decimal,
    },
    /// The pool reported token decimals amounts cannot be converted with.
    #[error(transparent)]
    Amount(#[from] AmountError),
    /// A liquidity command was rejected or failed to land.
    #[error("{command} failed: {source:#}")]
    Command {
        /// Command name.
        command: &'static str,
        /// Underlying failure.
        source: anyhow::Error,
    },
}

/// Errors raised while registering pairs with the scheduler.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The pair configuration is invalid.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    /// A pair with the same name is already registered.
    #[error("pair {0} is already registered")]
    DuplicatePair(String),
    /// Another registered pair already manages the pool.
    #[error("pair {pair}: pool {pool} is already managed by pair {existing}")]
    DuplicatePool {
        /// Pair being registered.
        pair: String,
        /// Shared pool address.
        pool: String,
        /// Pair already managing the pool.
        existing: String,
    },
}
