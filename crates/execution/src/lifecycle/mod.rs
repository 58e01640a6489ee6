//! Position lifecycle tracking.
//!
//! Records what happened to every managed position:
//! - Position creation
//! - Deposits and withdrawals
//! - Fee claims
//! - Position closing

mod events;
mod tracker;

pub use events::*;
pub use tracker::*;
