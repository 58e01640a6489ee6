//! Collaborator interfaces and adapters for Meteora DLMM pools.
//!
//! The position manager never talks to the network directly. It goes
//! through the traits defined here:
//! - [`PoolService`] for pool reads and liquidity transactions
//! - [`PriceOracle`] for fee valuation
//! - [`WalletBalanceService`] for token balances
//!
//! Adapters shipped with the crate:
//! - [`paper::PaperPool`], an in-memory simulated pool
//! - [`meteora::MeteoraPriceOracle`], HTTP price lookups
//! - [`rpc::RpcWalletBalances`], balances through Solana RPC

/// Meteora and Jupiter HTTP price oracle.
pub mod meteora;
/// In-memory simulated DLMM pool.
pub mod paper;
/// Prelude module for convenient imports.
pub mod prelude;
/// Submission retries.
pub mod retry;
/// Solana RPC wallet balances.
pub mod rpc;
/// Transaction parameters and receipts.
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use dlmm_lp_domain::snapshot::{BinRange, BinSnapshot, PoolTokens, PositionSnapshot};
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use types::{AddLiquidityParams, Receipt, RemoveLiquidityParams};

/// Reads pool state and submits liquidity transactions.
///
/// Submitting implementations own their retry policy; callers never retry.
#[async_trait]
pub trait PoolService: Send + Sync {
    /// Fetches the active bin of a pool.
    async fn get_active_bin(&self, pool: &str) -> Result<BinSnapshot>;

    /// Fetches the token mints of a pool.
    async fn get_pool_tokens(&self, pool: &str) -> Result<PoolTokens>;

    /// Fetches the positions `owner` holds in a pool.
    async fn get_user_positions(&self, pool: &str, owner: &Pubkey)
    -> Result<Vec<PositionSnapshot>>;

    /// Creates a position with no liquidity covering `range`.
    ///
    /// The receipt carries the new position address.
    async fn create_empty_position(
        &self,
        pool: &str,
        owner: &Pubkey,
        range: BinRange,
    ) -> Result<Receipt>;

    /// Dry-runs an add-liquidity transaction, failing if it would be rejected.
    async fn simulate_add_liquidity(
        &self,
        pool: &str,
        owner: &Pubkey,
        params: &AddLiquidityParams,
    ) -> Result<()>;

    /// Adds liquidity to a position.
    async fn add_liquidity(
        &self,
        pool: &str,
        owner: &Pubkey,
        params: &AddLiquidityParams,
    ) -> Result<Receipt>;

    /// Removes liquidity from bins of a position, optionally closing it.
    async fn remove_liquidity(
        &self,
        pool: &str,
        owner: &Pubkey,
        params: &RemoveLiquidityParams,
    ) -> Result<Receipt>;

    /// Closes an empty position.
    async fn close_position(&self, pool: &str, position: &str, owner: &Pubkey) -> Result<Receipt>;

    /// Claims the unclaimed fees of a position.
    async fn claim_fees(&self, pool: &str, position: &str, owner: &Pubkey) -> Result<Receipt>;
}

/// Prices tokens in USD for reporting.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// USD price of one unit of the pool's token Y.
    async fn usd_price(&self, pool: &str) -> Result<Decimal>;
}

/// Reads wallet token balances.
#[async_trait]
pub trait WalletBalanceService: Send + Sync {
    /// Raw balance of `mint` held by `owner`. The wrapped SOL mint answers
    /// with the native lamport balance.
    async fn balance_of(&self, owner: &Pubkey, mint: &str) -> Result<u64>;
}
