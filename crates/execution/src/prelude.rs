//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use dlmm_lp_execution::prelude::*;
//! ```

// Cycle
pub use crate::cycle::{Collaborators, CycleOutcome, PairWorker};

// Errors
pub use crate::error::{CycleError, ScheduleError};

// Executor
pub use crate::executor::{CommandExecutor, CommandOutcome, ExecutionReport};

// Lifecycle
pub use crate::lifecycle::{
    AggregateStats, CloseReason, EventData, FeesClaimedData, LifecycleEvent, LifecycleEventType,
    LifecycleTracker, LiquidityAddedData, LiquidityRemovedData, PositionClosedData,
    PositionCreatedData, PositionSummary,
};

// Reconciler
pub use crate::reconciler::{
    AddLiquidityCommand, Decision, DecisionReason, LiquidityCommand, PlacementKind,
    PositionReconciler, ReconcileInput, ReconcilerConfig,
};

// Scheduler
pub use crate::scheduler::{CycleReport, FailureReason, PairFailure, Scheduler, SchedulerConfig};

// Store
pub use crate::store::PositionStateStore;
