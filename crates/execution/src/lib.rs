//! Reconciliation engine for DLMM liquidity positions.
//!
//! This crate turns pool snapshots into liquidity commands and runs them:
//! - Position state machine deciding the corrective commands
//! - Command execution with simulation before deposits
//! - Keyed store of per-position state
//! - Concurrent per-pair scheduling with cancellation
//! - Position lifecycle tracking

/// Prelude module for convenient imports.
pub mod prelude;

/// One reconciliation cycle of a pair.
pub mod cycle;
/// Error types.
pub mod error;
/// Command execution.
pub mod executor;
/// Position lifecycle tracking.
pub mod lifecycle;
/// Position state machine.
pub mod reconciler;
/// Periodic scheduling of all pairs.
pub mod scheduler;
/// Position state records.
pub mod store;

pub use error::{CycleError, ScheduleError};
