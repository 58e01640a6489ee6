//! Prelude module for convenient imports.
//!
//! # Example
//!
//! ```rust
//! use dlmm_lp_domain::prelude::*;
//! ```

pub use crate::amount::{MAX_DECIMALS, check_decimals, to_raw_amount, to_ui_amount};
pub use crate::error::{AmountError, ConfigError};
pub use crate::pair_config::{MAX_RANGE_INTERVAL, MIN_RANGE_INTERVAL, PairConfig, StrategyType};
pub use crate::sizing::{SizedAmounts, SizingCalculator};
pub use crate::snapshot::{
    BinLiquidity, BinRange, BinSnapshot, PoolTokens, PositionSnapshot, WalletBalances,
};
pub use crate::state::{PositionState, TokenSide};
