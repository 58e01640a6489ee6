//! In-memory simulated DLMM pool.
//!
//! [`PaperPool`] keeps positions with per-bin amounts, wallet balances and
//! an active bin that can be moved to emulate trading. It validates adds the
//! way the on-chain program would reject them, so a dry run exercises the
//! same failure paths as a live deployment.
//!
//! Liquidity placement follows the bin rules of the program: token X can only
//! sit in bins at or above the active bin, token Y at or below it. When the
//! active bin moves, crossed bins are converted at their own price.

use crate::retry::{RetryPolicy, submit_with_retry};
use crate::types::{AddLiquidityParams, FULL_BPS, LiquidityAmounts, Receipt, RemoveLiquidityParams};
use crate::{PoolService, WalletBalanceService};
use anyhow::Result;
use async_trait::async_trait;
use dlmm_lp_domain::amount::{to_raw_amount, to_ui_amount};
use dlmm_lp_domain::snapshot::{
    BinLiquidity, BinRange, BinSnapshot, PoolTokens, PositionSnapshot, WalletBalances,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Widest position the program accepts, in bins.
pub const MAX_POSITION_WIDTH: u32 = 70;

/// Rejections raised by the paper pool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaperPoolError {
    /// The pool address does not match this pool.
    #[error("unknown pool {0}")]
    UnknownPool(String),
    /// The mint is neither token of the pool.
    #[error("mint {0} is not traded in this pool")]
    UnknownMint(String),
    /// No position with this address.
    #[error("position {0} not found")]
    PositionNotFound(String),
    /// The signer does not own the position.
    #[error("position {0} is not owned by the signer")]
    NotOwner(String),
    /// Requested position is wider than the program allows.
    #[error("position width {width} exceeds {max} bins")]
    PositionTooWide {
        /// Requested width.
        width: u32,
        /// Allowed width.
        max: u32,
    },
    /// Liquidity range falls outside the position.
    #[error("bins {lower}..={upper} are outside the position")]
    RangeOutsidePosition {
        /// Lowest requested bin.
        lower: i32,
        /// Highest requested bin.
        upper: i32,
    },
    /// Both amounts are zero.
    #[error("no liquidity amounts supplied")]
    EmptyAmounts,
    /// Wallet cannot cover the deposit.
    #[error("insufficient {token} balance: need {needed}, have {available}")]
    InsufficientBalance {
        /// Token label.
        token: &'static str,
        /// Raw amount required.
        needed: u64,
        /// Raw amount held.
        available: u64,
    },
    /// No bin of the range may receive the token.
    #[error("no bin in range can hold token {0}")]
    NoEligibleBins(&'static str),
    /// Close requested while bins still hold tokens.
    #[error("position {0} still holds liquidity")]
    PositionNotEmpty(String),
    /// Close requested while fees are unclaimed.
    #[error("position {0} has unclaimed fees")]
    UnclaimedFees(String),
    /// Failure injected through [`PaperPool::fail_next_submissions`].
    #[error("transaction dropped")]
    InjectedFailure,
}

/// Configuration of a paper pool.
#[derive(Debug, Clone)]
pub struct PaperPoolConfig {
    /// Pool address answered by the pool.
    pub pool_address: String,
    /// Mint of token X.
    pub mint_x: String,
    /// Mint of token Y.
    pub mint_y: String,
    /// Decimals of token X.
    pub decimals_x: u8,
    /// Decimals of token Y.
    pub decimals_y: u8,
    /// Bin step in basis points.
    pub bin_step: u16,
    /// Active bin at start.
    pub initial_bin: i32,
    /// Price of the initial bin, Y per X.
    pub initial_price: Decimal,
    /// Fee accrued on active-bin liquidity per trading step, in basis points.
    pub fee_rate_bps: u16,
    /// Submission retries.
    pub retry: RetryPolicy,
    /// Priority fee attached to submissions, in micro-lamports.
    pub priority_fee: u64,
}

impl PaperPoolConfig {
    /// SOL-USDC shaped pool at the given address.
    pub fn new(pool_address: impl Into<String>) -> Self {
        Self {
            pool_address: pool_address.into(),
            mint_x: "So11111111111111111111111111111111111111112".to_string(),
            mint_y: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            decimals_x: 9,
            decimals_y: 6,
            bin_step: 10,
            initial_bin: 0,
            initial_price: Decimal::from(150),
            fee_rate_bps: 10,
            retry: RetryPolicy::none(),
            priority_fee: 20_000,
        }
    }
}

#[derive(Debug, Clone)]
struct PaperPosition {
    owner: Pubkey,
    range: BinRange,
    bins: BTreeMap<i32, LiquidityAmounts>,
    fee_x: u64,
    fee_y: u64,
}

impl PaperPosition {
    fn holds_tokens(&self) -> bool {
        self.bins.values().any(|amounts| !amounts.is_empty())
    }

    fn snapshot(&self, address: &str) -> PositionSnapshot {
        let bins: Vec<BinLiquidity> = self
            .bins
            .iter()
            .map(|(bin_id, amounts)| BinLiquidity::new(*bin_id, amounts.amount_x, amounts.amount_y))
            .collect();
        PositionSnapshot {
            address: address.to_string(),
            lower_bin_id: self.range.lower,
            upper_bin_id: self.range.upper,
            total_x: bins.iter().map(|bin| bin.amount_x).sum(),
            total_y: bins.iter().map(|bin| bin.amount_y).sum(),
            fee_x: self.fee_x,
            fee_y: self.fee_y,
            bins,
        }
    }
}

#[derive(Debug, Default)]
struct PaperState {
    active_bin: i32,
    wallets: HashMap<Pubkey, WalletBalances>,
    positions: BTreeMap<String, PaperPosition>,
}

struct AddPlan {
    x_bins: Vec<i32>,
    y_bins: Vec<i32>,
}

/// Simulated DLMM pool implementing [`PoolService`] and [`WalletBalanceService`].
pub struct PaperPool {
    config: PaperPoolConfig,
    state: Mutex<PaperState>,
    pending_failures: AtomicU32,
    signatures: AtomicU64,
}

impl PaperPool {
    /// Creates a pool with its active bin at `config.initial_bin`.
    pub fn new(config: PaperPoolConfig) -> Self {
        let state = PaperState {
            active_bin: config.initial_bin,
            ..PaperState::default()
        };
        Self {
            config,
            state: Mutex::new(state),
            pending_failures: AtomicU32::new(0),
            signatures: AtomicU64::new(0),
        }
    }

    /// Pool configuration.
    pub fn config(&self) -> &PaperPoolConfig {
        &self.config
    }

    /// Price of `bin_id`, Y per X.
    pub fn price_at(&self, bin_id: i32) -> Decimal {
        let step = 1.0 + f64::from(self.config.bin_step) / f64::from(FULL_BPS);
        let factor = step.powi(bin_id - self.config.initial_bin);
        let factor = Decimal::from_f64(factor).unwrap_or(Decimal::ONE);
        (self.config.initial_price * factor).round_dp(u32::from(self.config.decimals_y) + 2)
    }

    /// Current active bin.
    pub async fn active_bin(&self) -> i32 {
        self.state.lock().await.active_bin
    }

    /// Sets the raw wallet balances of `owner`.
    pub async fn set_balance(&self, owner: Pubkey, balances: WalletBalances) {
        self.state.lock().await.wallets.insert(owner, balances);
    }

    /// Raw wallet balances of `owner`.
    pub async fn wallet(&self, owner: &Pubkey) -> WalletBalances {
        self.state
            .lock()
            .await
            .wallets
            .get(owner)
            .copied()
            .unwrap_or_default()
    }

    /// Number of positions `owner` holds.
    pub async fn position_count(&self, owner: &Pubkey) -> usize {
        self.state
            .lock()
            .await
            .positions
            .values()
            .filter(|position| position.owner == *owner)
            .count()
    }

    /// Makes the next `count` submission attempts fail.
    pub fn fail_next_submissions(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Moves the active bin by `delta` and returns the new active bin.
    ///
    /// Bins left below the active bin are converted to Y, bins left above it
    /// to X. Liquidity sitting in the new active bin earns one step of fees.
    pub async fn move_active_bin(&self, delta: i32) -> i32 {
        let mut state = self.state.lock().await;
        state.active_bin += delta;
        let active = state.active_bin;
        let fee_rate = Decimal::from(self.config.fee_rate_bps) / Decimal::from(FULL_BPS);

        for position in state.positions.values_mut() {
            for (bin_id, amounts) in position.bins.iter_mut() {
                if *bin_id < active && amounts.amount_x > 0 {
                    amounts.amount_y += self.x_to_y(amounts.amount_x, *bin_id);
                    amounts.amount_x = 0;
                } else if *bin_id > active && amounts.amount_y > 0 {
                    amounts.amount_x += self.y_to_x(amounts.amount_y, *bin_id);
                    amounts.amount_y = 0;
                }
            }
            if let Some(amounts) = position.bins.get(&active) {
                position.fee_x += to_raw_amount(Decimal::from(amounts.amount_x) * fee_rate, 0);
                position.fee_y += to_raw_amount(Decimal::from(amounts.amount_y) * fee_rate, 0);
            }
        }

        debug!(
            pool = %self.config.pool_address,
            active_bin = active,
            price = %self.price_at(active),
            "Active bin moved"
        );
        active
    }

    fn x_to_y(&self, raw_x: u64, bin_id: i32) -> u64 {
        let value = to_ui_amount(raw_x, self.config.decimals_x) * self.price_at(bin_id);
        to_raw_amount(value, self.config.decimals_y)
    }

    fn y_to_x(&self, raw_y: u64, bin_id: i32) -> u64 {
        let value = to_ui_amount(raw_y, self.config.decimals_y)
            .checked_div(self.price_at(bin_id))
            .unwrap_or(Decimal::ZERO);
        to_raw_amount(value, self.config.decimals_x)
    }

    fn check_pool(&self, pool: &str) -> Result<(), PaperPoolError> {
        if pool == self.config.pool_address {
            Ok(())
        } else {
            Err(PaperPoolError::UnknownPool(pool.to_string()))
        }
    }

    fn take_injected_failure(&self) -> Result<(), PaperPoolError> {
        match self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(_) => Err(PaperPoolError::InjectedFailure),
            Err(_) => Ok(()),
        }
    }

    fn next_signature(&self, operation: &str) -> String {
        let n = self.signatures.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            operation = operation,
            priority_fee = self.config.priority_fee,
            "Submitting paper transaction"
        );
        format!("paper-{n:08}")
    }

    fn owned_position<'a>(
        state: &'a mut PaperState,
        position: &str,
        owner: &Pubkey,
    ) -> Result<&'a mut PaperPosition, PaperPoolError> {
        let entry = state
            .positions
            .get_mut(position)
            .ok_or_else(|| PaperPoolError::PositionNotFound(position.to_string()))?;
        if entry.owner != *owner {
            return Err(PaperPoolError::NotOwner(position.to_string()));
        }
        Ok(entry)
    }

    fn plan_add(
        state: &PaperState,
        owner: &Pubkey,
        params: &AddLiquidityParams,
    ) -> Result<AddPlan, PaperPoolError> {
        let position = state
            .positions
            .get(&params.position)
            .ok_or_else(|| PaperPoolError::PositionNotFound(params.position.clone()))?;
        if position.owner != *owner {
            return Err(PaperPoolError::NotOwner(params.position.clone()));
        }
        if params.range.is_empty() || !position.range.covers(&params.range) {
            return Err(PaperPoolError::RangeOutsidePosition {
                lower: params.range.lower,
                upper: params.range.upper,
            });
        }
        if params.amounts.is_empty() {
            return Err(PaperPoolError::EmptyAmounts);
        }

        let wallet = state.wallets.get(owner).copied().unwrap_or_default();
        for (token, needed, available) in [
            ("X", params.amounts.amount_x, wallet.x),
            ("Y", params.amounts.amount_y, wallet.y),
        ] {
            if needed > available {
                return Err(PaperPoolError::InsufficientBalance {
                    token,
                    needed,
                    available,
                });
            }
        }

        let active = state.active_bin;
        let x_bins: Vec<i32> = params.range.bins().filter(|bin| *bin >= active).collect();
        let y_bins: Vec<i32> = params.range.bins().filter(|bin| *bin <= active).collect();
        if params.amounts.amount_x > 0 && x_bins.is_empty() {
            return Err(PaperPoolError::NoEligibleBins("X"));
        }
        if params.amounts.amount_y > 0 && y_bins.is_empty() {
            return Err(PaperPoolError::NoEligibleBins("Y"));
        }
        Ok(AddPlan { x_bins, y_bins })
    }
}

/// Splits `amount` evenly over `count` parts, the remainder going to the first.
fn split_evenly(amount: u64, count: usize) -> impl Iterator<Item = u64> {
    let count = count.max(1) as u64;
    let share = amount / count;
    let remainder = amount % count;
    (0..count).map(move |i| if i == 0 { share + remainder } else { share })
}

/// Part of `amount` covered by `bps` basis points, rounded down.
fn bps_share(amount: u64, bps: u16) -> u64 {
    let share = u128::from(amount) * u128::from(bps.min(FULL_BPS)) / u128::from(FULL_BPS);
    // bps never exceeds FULL_BPS, so the share fits back into u64.
    u64::try_from(share).unwrap_or(amount)
}

#[async_trait]
impl PoolService for PaperPool {
    async fn get_active_bin(&self, pool: &str) -> Result<BinSnapshot> {
        self.check_pool(pool)?;
        let bin_id = self.active_bin().await;
        Ok(BinSnapshot {
            bin_id,
            price_per_token: self.price_at(bin_id),
            decimals_x: self.config.decimals_x,
            decimals_y: self.config.decimals_y,
        })
    }

    async fn get_pool_tokens(&self, pool: &str) -> Result<PoolTokens> {
        self.check_pool(pool)?;
        Ok(PoolTokens {
            mint_x: self.config.mint_x.clone(),
            mint_y: self.config.mint_y.clone(),
        })
    }

    async fn get_user_positions(
        &self,
        pool: &str,
        owner: &Pubkey,
    ) -> Result<Vec<PositionSnapshot>> {
        self.check_pool(pool)?;
        let state = self.state.lock().await;
        Ok(state
            .positions
            .iter()
            .filter(|(_, position)| position.owner == *owner)
            .map(|(address, position)| position.snapshot(address))
            .collect())
    }

    async fn create_empty_position(
        &self,
        pool: &str,
        owner: &Pubkey,
        range: BinRange,
    ) -> Result<Receipt> {
        self.check_pool(pool)?;
        if range.is_empty() || range.len() > MAX_POSITION_WIDTH {
            return Err(PaperPoolError::PositionTooWide {
                width: range.len(),
                max: MAX_POSITION_WIDTH,
            }
            .into());
        }
        let this = self;
        submit_with_retry(&self.config.retry, "create_empty_position", || async move {
            this.take_injected_failure()?;
            let address = Keypair::new().pubkey().to_string();
            let position = PaperPosition {
                owner: *owner,
                range,
                bins: range.bins().map(|bin| (bin, LiquidityAmounts::default())).collect(),
                fee_x: 0,
                fee_y: 0,
            };
            this.state
                .lock()
                .await
                .positions
                .insert(address.clone(), position);
            info!(
                position = %address,
                lower = range.lower,
                upper = range.upper,
                "Paper position created"
            );
            Ok(Receipt::new(this.next_signature("create_empty_position")).with_position(address))
        })
        .await
    }

    async fn simulate_add_liquidity(
        &self,
        pool: &str,
        owner: &Pubkey,
        params: &AddLiquidityParams,
    ) -> Result<()> {
        self.check_pool(pool)?;
        let state = self.state.lock().await;
        Self::plan_add(&state, owner, params)?;
        Ok(())
    }

    async fn add_liquidity(
        &self,
        pool: &str,
        owner: &Pubkey,
        params: &AddLiquidityParams,
    ) -> Result<Receipt> {
        self.check_pool(pool)?;
        let this = self;
        submit_with_retry(&self.config.retry, "add_liquidity", || async move {
            this.take_injected_failure()?;
            let mut state = this.state.lock().await;
            let plan = Self::plan_add(&state, owner, params)?;

            let wallet = state.wallets.entry(*owner).or_default();
            wallet.x -= params.amounts.amount_x;
            wallet.y -= params.amounts.amount_y;

            let position = Self::owned_position(&mut state, &params.position, owner)?;
            for (bin_id, share) in plan
                .x_bins
                .iter()
                .zip(split_evenly(params.amounts.amount_x, plan.x_bins.len()))
            {
                position.bins.entry(*bin_id).or_default().amount_x += share;
            }
            for (bin_id, share) in plan
                .y_bins
                .iter()
                .zip(split_evenly(params.amounts.amount_y, plan.y_bins.len()))
            {
                position.bins.entry(*bin_id).or_default().amount_y += share;
            }
            Ok(Receipt::new(this.next_signature("add_liquidity")))
        })
        .await
    }

    async fn remove_liquidity(
        &self,
        pool: &str,
        owner: &Pubkey,
        params: &RemoveLiquidityParams,
    ) -> Result<Receipt> {
        self.check_pool(pool)?;
        let this = self;
        submit_with_retry(&self.config.retry, "remove_liquidity", || async move {
            this.take_injected_failure()?;
            let mut state = this.state.lock().await;
            let bps = params.bps.min(FULL_BPS);

            let position = Self::owned_position(&mut state, &params.position, owner)?;
            let mut withdrawn = LiquidityAmounts::default();
            for bin_id in &params.bin_ids {
                if let Some(amounts) = position.bins.get_mut(bin_id) {
                    let x = bps_share(amounts.amount_x, bps);
                    let y = bps_share(amounts.amount_y, bps);
                    amounts.amount_x -= x;
                    amounts.amount_y -= y;
                    withdrawn.amount_x += x;
                    withdrawn.amount_y += y;
                }
            }
            if params.close_after {
                withdrawn.amount_x += std::mem::take(&mut position.fee_x);
                withdrawn.amount_y += std::mem::take(&mut position.fee_y);
                for amounts in position.bins.values_mut() {
                    withdrawn.amount_x += std::mem::take(&mut amounts.amount_x);
                    withdrawn.amount_y += std::mem::take(&mut amounts.amount_y);
                }
                state.positions.remove(&params.position);
            }

            let wallet = state.wallets.entry(*owner).or_default();
            wallet.x += withdrawn.amount_x;
            wallet.y += withdrawn.amount_y;
            info!(
                position = %params.position,
                amount_x = withdrawn.amount_x,
                amount_y = withdrawn.amount_y,
                closed = params.close_after,
                "Paper liquidity removed"
            );
            Ok(Receipt::new(this.next_signature("remove_liquidity")))
        })
        .await
    }

    async fn close_position(&self, pool: &str, position: &str, owner: &Pubkey) -> Result<Receipt> {
        self.check_pool(pool)?;
        let this = self;
        submit_with_retry(&self.config.retry, "close_position", || async move {
            this.take_injected_failure()?;
            let mut state = this.state.lock().await;
            let entry = Self::owned_position(&mut state, position, owner)?;
            if entry.holds_tokens() {
                return Err(PaperPoolError::PositionNotEmpty(position.to_string()).into());
            }
            if entry.fee_x > 0 || entry.fee_y > 0 {
                return Err(PaperPoolError::UnclaimedFees(position.to_string()).into());
            }
            state.positions.remove(position);
            info!(position = %position, "Paper position closed");
            Ok(Receipt::new(this.next_signature("close_position")))
        })
        .await
    }

    async fn claim_fees(&self, pool: &str, position: &str, owner: &Pubkey) -> Result<Receipt> {
        self.check_pool(pool)?;
        let this = self;
        submit_with_retry(&self.config.retry, "claim_fees", || async move {
            this.take_injected_failure()?;
            let mut state = this.state.lock().await;
            let entry = Self::owned_position(&mut state, position, owner)?;
            let fee_x = std::mem::take(&mut entry.fee_x);
            let fee_y = std::mem::take(&mut entry.fee_y);

            let wallet = state.wallets.entry(*owner).or_default();
            wallet.x += fee_x;
            wallet.y += fee_y;
            info!(position = %position, fee_x = fee_x, fee_y = fee_y, "Paper fees claimed");
            Ok(Receipt::new(this.next_signature("claim_fees")))
        })
        .await
    }
}

#[async_trait]
impl WalletBalanceService for PaperPool {
    async fn balance_of(&self, owner: &Pubkey, mint: &str) -> Result<u64> {
        let wallet = self.wallet(owner).await;
        if mint == self.config.mint_x {
            Ok(wallet.x)
        } else if mint == self.config.mint_y {
            Ok(wallet.y)
        } else {
            Err(PaperPoolError::UnknownMint(mint.to_string()).into())
        }
    }
}
