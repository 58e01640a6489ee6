//! Prelude module for convenient imports.
//!
//! # Example
//!
//! ```rust
//! use dlmm_lp_protocols::prelude::*;
//! ```

pub use crate::meteora::{MeteoraPriceOracle, PairInfo, stablecoin_price};
pub use crate::paper::{MAX_POSITION_WIDTH, PaperPool, PaperPoolConfig, PaperPoolError};
pub use crate::retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy, submit_with_retry};
pub use crate::rpc::RpcWalletBalances;
pub use crate::types::{
    AddLiquidityParams, FULL_BPS, LiquidityAmounts, Receipt, RemoveLiquidityParams,
};
pub use crate::{PoolService, PriceOracle, WalletBalanceService};
