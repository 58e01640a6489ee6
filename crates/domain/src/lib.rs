//! Domain model for DLMM liquidity management.
//!
//! This crate holds everything the position manager reasons about without
//! touching the network:
//! - Pair configuration and its validation
//! - Pool, position and wallet snapshots
//! - Per-position reconciliation state
//! - The liquidity sizing calculator
//! - Raw/UI token amount conversion

/// Raw and UI token amount conversion.
pub mod amount;
/// Configuration errors.
pub mod error;
/// Trading pair configuration.
pub mod pair_config;
/// Prelude module for convenient imports.
pub mod prelude;
/// Liquidity sizing.
pub mod sizing;
/// Pool, position and wallet snapshots.
pub mod snapshot;
/// Reconciliation state of a position.
pub mod state;

pub use error::{AmountError, ConfigError};
