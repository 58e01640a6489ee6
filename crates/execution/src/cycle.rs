//! One reconciliation cycle of a single pair.

use crate::error::CycleError;
use crate::executor::{CommandExecutor, ExecutionReport, call_with_timeout};
use crate::lifecycle::{
    CloseReason, EventData, FeesClaimedData, LifecycleEvent, LifecycleTracker, LiquidityAddedData,
    LiquidityRemovedData, PositionClosedData, PositionCreatedData,
};
use crate::reconciler::{DecisionReason, LiquidityCommand, PositionReconciler, ReconcileInput};
use crate::store::PositionStateStore;
use dlmm_lp_domain::amount::{check_decimals, to_ui_amount};
use dlmm_lp_domain::pair_config::PairConfig;
use dlmm_lp_domain::sizing::SizingCalculator;
use dlmm_lp_domain::snapshot::{BinSnapshot, PositionSnapshot, WalletBalances};
use dlmm_lp_domain::state::PositionState;
use dlmm_lp_protocols::{PoolService, PriceOracle, WalletBalanceService};
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Pair name.
    pub pair: String,
    /// Rule that fired.
    pub reason: DecisionReason,
    /// Number of commands that landed.
    pub commands: usize,
    /// Position the cycle acted on, if any.
    pub position: Option<String>,
    /// State recorded for the position after the cycle.
    pub state: PositionState,
    /// Unclaimed fees of the position in USD, when an oracle answered.
    pub unclaimed_fees_usd: Option<Decimal>,
}

/// External services a pair works with.
#[derive(Clone)]
pub struct Collaborators {
    /// Pool reads and transactions.
    pub pool_service: Arc<dyn PoolService>,
    /// Wallet balances.
    pub balances: Arc<dyn WalletBalanceService>,
    /// USD prices for fee reporting.
    pub oracle: Option<Arc<dyn PriceOracle>>,
}

/// Runs the snapshot, size, reconcile, execute and persist pipeline for one pair.
#[derive(Clone)]
pub struct PairWorker {
    pair: Arc<PairConfig>,
    owner: Pubkey,
    collaborators: Collaborators,
    executor: CommandExecutor,
    reconciler: PositionReconciler,
    store: PositionStateStore,
    lifecycle: Arc<LifecycleTracker>,
    call_timeout: Duration,
}

impl PairWorker {
    /// Creates a worker.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pair: PairConfig,
        owner: Pubkey,
        collaborators: Collaborators,
        executor: CommandExecutor,
        reconciler: PositionReconciler,
        store: PositionStateStore,
        lifecycle: Arc<LifecycleTracker>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            pair: Arc::new(pair),
            owner,
            collaborators,
            executor,
            reconciler,
            store,
            lifecycle,
            call_timeout,
        }
    }

    /// Pair configuration.
    pub fn pair(&self) -> &PairConfig {
        &self.pair
    }

    /// Runs one cycle.
    ///
    /// # Errors
    /// Returns the first failed read or command. The state record is only
    /// written when every command of the decision landed.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let pair = self.pair.as_ref();
        let pool = pair.pool_address.as_str();
        let pool_service = &self.collaborators.pool_service;

        let bin = call_with_timeout(
            "get_active_bin",
            self.call_timeout,
            pool_service.get_active_bin(pool),
        )
        .await?;
        if bin.price_per_token <= Decimal::ZERO {
            return Err(CycleError::InvalidPrice {
                price: bin.price_per_token,
            });
        }
        check_decimals(bin.decimals_x)?;
        check_decimals(bin.decimals_y)?;
        let tokens = call_with_timeout(
            "get_pool_tokens",
            self.call_timeout,
            pool_service.get_pool_tokens(pool),
        )
        .await?;
        let positions = call_with_timeout(
            "get_user_positions",
            self.call_timeout,
            pool_service.get_user_positions(pool, &self.owner),
        )
        .await?;
        let wallet = WalletBalances {
            x: call_with_timeout(
                "balance_of",
                self.call_timeout,
                self.collaborators.balances.balance_of(&self.owner, &tokens.mint_x),
            )
            .await?,
            y: call_with_timeout(
                "balance_of",
                self.call_timeout,
                self.collaborators.balances.balance_of(&self.owner, &tokens.mint_y),
            )
            .await?,
        };

        let (balance_x, balance_y) = wallet.to_ui(&bin);
        debug!(
            pair = %pair.name,
            active_bin = bin.bin_id,
            price = %bin.price_per_token,
            balance_x = %balance_x,
            balance_y = %balance_y,
            positions = positions.len(),
            "Snapshot taken"
        );

        let current = positions.first();
        let current_address = current.map(|position| position.address.clone());
        let pruned = self
            .store
            .prune(&pair.name, current_address.as_deref())
            .await;
        if pruned > 0 {
            debug!(pair = %pair.name, pruned = pruned, "Dropped records of closed positions");
        }
        let unclaimed_fees_usd = match current {
            Some(position) => self.report_fees(position, &bin).await,
            None => None,
        };

        let sized = SizingCalculator::size(balance_x, balance_y, bin.price_per_token, pair);
        let state = self.store.resolve(current_address.as_deref()).await;
        let decision = self.reconciler.decide(&ReconcileInput {
            pair,
            positions: &positions,
            active_bin: &bin,
            sized,
            state,
        });

        if decision.is_noop() {
            debug!(pair = %pair.name, state = %state, "Nothing to do");
            return Ok(CycleOutcome {
                pair: pair.name.clone(),
                reason: decision.reason,
                commands: 0,
                position: current_address,
                state,
                unclaimed_fees_usd,
            });
        }

        info!(
            pair = %pair.name,
            reason = %decision.reason,
            state = %state,
            next_state = %decision.next_state,
            commands = decision.commands.len(),
            sized_x = %sized.amount_x,
            sized_y = %sized.amount_y,
            "Reconciling position"
        );

        let report = self
            .executor
            .execute(pair, &bin, decision.commands)
            .await;
        self.record_lifecycle(&report, &bin, unclaimed_fees_usd).await;
        let commands = report.completed.len();
        let position = report
            .created_position()
            .map(str::to_string)
            .or(current_address);

        if let Some(failure) = report.failure {
            return Err(failure);
        }

        if let Some(address) = &position {
            self.store.apply(&pair.name, address, decision.next_state).await;
        }

        Ok(CycleOutcome {
            pair: pair.name.clone(),
            reason: decision.reason,
            commands,
            position,
            state: decision.next_state,
            unclaimed_fees_usd,
        })
    }

    /// Logs the unclaimed fees of a position, valued in USD when an oracle is set.
    async fn report_fees(&self, position: &PositionSnapshot, bin: &BinSnapshot) -> Option<Decimal> {
        let fees_in_y = position.unclaimed_fees_in_y(bin);
        let Some(oracle) = &self.collaborators.oracle else {
            info!(
                pair = %self.pair.name,
                position = %position.address,
                fees_in_y = %fees_in_y,
                "Unclaimed fees"
            );
            return None;
        };

        match call_with_timeout(
            "usd_price",
            self.call_timeout,
            oracle.usd_price(&self.pair.pool_address),
        )
        .await
        {
            Ok(usd_price) => {
                let fees_usd = (fees_in_y * usd_price).round_dp(6);
                info!(
                    pair = %self.pair.name,
                    position = %position.address,
                    fees_in_y = %fees_in_y,
                    fees_usd = %fees_usd,
                    "Unclaimed fees"
                );
                Some(fees_usd)
            }
            Err(e) => {
                warn!(pair = %self.pair.name, error = %e, "Fee valuation skipped");
                None
            }
        }
    }

    async fn record_lifecycle(
        &self,
        report: &ExecutionReport,
        bin: &BinSnapshot,
        fees_usd: Option<Decimal>,
    ) {
        let pair = self.pair.name.as_str();
        for outcome in &report.completed {
            let signature = outcome.receipt.signature.as_str();
            let (position, data) = match &outcome.command {
                LiquidityCommand::CreateEmptyPosition { range } => {
                    let Some(position) = outcome.receipt.position.as_deref() else {
                        continue;
                    };
                    (
                        position,
                        EventData::PositionCreated(PositionCreatedData {
                            lower_bin_id: range.lower,
                            upper_bin_id: range.upper,
                            active_bin_id: bin.bin_id,
                            price: bin.price_per_token,
                        }),
                    )
                }
                LiquidityCommand::AddLiquidity(add) => (
                    add.position.as_str(),
                    EventData::LiquidityAdded(LiquidityAddedData {
                        amount_x: add.amount_x,
                        amount_y: add.amount_y,
                        lower_bin_id: add.range.lower,
                        upper_bin_id: add.range.upper,
                        kind: add.kind,
                        value_in_y: add.amount_x * bin.price_per_token + add.amount_y,
                    }),
                ),
                LiquidityCommand::RemoveLiquidity {
                    position,
                    bin_ids,
                    close_position,
                } => {
                    self.lifecycle
                        .record(
                            LifecycleEvent::new(
                                pair,
                                position,
                                EventData::LiquidityRemoved(LiquidityRemovedData {
                                    bin_count: bin_ids.len(),
                                    closed: *close_position,
                                }),
                            )
                            .with_signature(signature),
                        )
                        .await;
                    if !*close_position {
                        continue;
                    }
                    (
                        position.as_str(),
                        EventData::PositionClosed(PositionClosedData {
                            reason: CloseReason::Withdrawn,
                            active_bin_id: bin.bin_id,
                        }),
                    )
                }
                LiquidityCommand::ClaimFees {
                    position,
                    fee_x,
                    fee_y,
                } => {
                    let value_in_y = to_ui_amount(*fee_x, bin.decimals_x) * bin.price_per_token
                        + to_ui_amount(*fee_y, bin.decimals_y);
                    (
                        position.as_str(),
                        EventData::FeesClaimed(FeesClaimedData {
                            fee_x: *fee_x,
                            fee_y: *fee_y,
                            value_in_y,
                            value_usd: fees_usd,
                        }),
                    )
                }
                LiquidityCommand::ClosePosition { position } => (
                    position.as_str(),
                    EventData::PositionClosed(PositionClosedData {
                        reason: CloseReason::OutOfRange,
                        active_bin_id: bin.bin_id,
                    }),
                ),
            };
            self.lifecycle
                .record(LifecycleEvent::new(pair, position, data).with_signature(signature))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleEventType;
    use crate::reconciler::PlacementKind;
    use anyhow::bail;
    use async_trait::async_trait;
    use dlmm_lp_domain::AmountError;
    use dlmm_lp_domain::pair_config::StrategyType;
    use dlmm_lp_domain::snapshot::BinRange;
    use dlmm_lp_domain::state::TokenSide;
    use dlmm_lp_protocols::paper::{PaperPool, PaperPoolConfig};
    use rust_decimal_macros::dec;

    const POOL: &str = "paper-pool";
    const SOL: u64 = 1_000_000_000;
    const USDC: u64 = 1_000_000;

    struct FixedOracle(Option<Decimal>);

    #[async_trait]
    impl PriceOracle for FixedOracle {
        async fn usd_price(&self, _pool: &str) -> anyhow::Result<Decimal> {
            match self.0 {
                Some(price) => Ok(price),
                None => bail!("price service unavailable"),
            }
        }
    }

    fn pair() -> PairConfig {
        PairConfig {
            name: "SOL-USDC".to_string(),
            pool_address: POOL.to_string(),
            min_reserve_x: dec!(2),
            min_reserve_y: dec!(0),
            bin_step: 10,
            max_position_size_in_y: dec!(300),
            total_range_interval: 6,
            strategy_type: StrategyType::Spot,
            balance_out_position: true,
        }
    }

    async fn worker_with(
        pool_config: PaperPoolConfig,
        oracle: Option<Arc<dyn PriceOracle>>,
        wallet: WalletBalances,
    ) -> (Arc<PaperPool>, PairWorker, Pubkey) {
        let owner = Pubkey::new_unique();
        let pool = Arc::new(PaperPool::new(pool_config));
        pool.set_balance(owner, wallet).await;
        let collaborators = Collaborators {
            pool_service: pool.clone(),
            balances: pool.clone(),
            oracle,
        };
        let executor = CommandExecutor::new(pool.clone(), owner, Duration::from_secs(5));
        let worker = PairWorker::new(
            pair(),
            owner,
            collaborators,
            executor,
            PositionReconciler::default(),
            PositionStateStore::new(),
            Arc::new(LifecycleTracker::new()),
            Duration::from_secs(5),
        );
        (pool, worker, owner)
    }

    async fn worker(wallet: WalletBalances) -> (Arc<PaperPool>, PairWorker, Pubkey) {
        worker_with(PaperPoolConfig::new(POOL), None, wallet).await
    }

    #[tokio::test]
    async fn test_creates_then_places_then_idles() {
        let (pool, worker, owner) = worker(WalletBalances {
            x: 10 * SOL,
            y: 0,
        })
        .await;

        let first = worker.run_cycle().await.unwrap();
        assert_eq!(first.reason, DecisionReason::NoPosition);
        assert_eq!(first.state, PositionState::Waiting);
        let position = first.position.clone().unwrap();
        assert_eq!(worker.store.get(&position).await, Some(PositionState::Waiting));

        let second = worker.run_cycle().await.unwrap();
        assert_eq!(
            second.reason,
            DecisionReason::Placement(PlacementKind::OneSided(TokenSide::X))
        );
        assert_eq!(
            worker.store.get(&position).await,
            Some(PositionState::OneSided { side: TokenSide::X })
        );
        // 300 USDC cap at 150 USDC per SOL.
        assert_eq!(pool.wallet(&owner).await.x, 8 * SOL);

        let third = worker.run_cycle().await.unwrap();
        assert_eq!(third.reason, DecisionReason::Idle);
        assert_eq!(third.commands, 0);
        let fourth = worker.run_cycle().await.unwrap();
        assert_eq!(fourth, third);

        assert_eq!(
            worker.lifecycle.event_types(&position).await,
            vec![
                LifecycleEventType::PositionCreated,
                LifecycleEventType::LiquidityAdded
            ]
        );
    }

    #[tokio::test]
    async fn test_flipped_one_sided_position_is_rebalanced() {
        let (pool, worker, owner) = worker(WalletBalances {
            x: 10 * SOL,
            y: 0,
        })
        .await;
        worker.run_cycle().await.unwrap();
        let placed = worker.run_cycle().await.unwrap();
        let position = placed.position.unwrap();

        // X sits in bins 0..=3; moving to bin 3 sells three of the four bins.
        pool.move_active_bin(3).await;

        let outcome = worker.run_cycle().await.unwrap();
        assert_eq!(outcome.reason, DecisionReason::ImbalanceCorrection);
        assert_eq!(outcome.commands, 2);
        assert_eq!(worker.store.get(&position).await, Some(PositionState::Balanced));

        let snapshot = &pool.get_user_positions(POOL, &owner).await.unwrap()[0];
        assert_eq!(snapshot.bins_holding_tokens(), vec![2, 3, 4]);
        assert!(snapshot.total_x > 0);
        assert!(snapshot.total_y > 0);
    }

    #[tokio::test]
    async fn test_empty_out_of_range_position_is_claimed_and_closed() {
        let (pool, worker, owner) = worker(WalletBalances {
            x: 0,
            y: 100 * USDC,
        })
        .await;
        let receipt = pool
            .create_empty_position(POOL, &owner, BinRange::new(-10, 0))
            .await
            .unwrap();
        let position = receipt.position.unwrap();
        pool.add_liquidity(
            POOL,
            &owner,
            &dlmm_lp_protocols::types::AddLiquidityParams {
                position: position.clone(),
                amounts: dlmm_lp_protocols::types::LiquidityAmounts {
                    amount_x: 0,
                    amount_y: 30 * USDC,
                },
                range: BinRange::new(-2, 0),
                strategy: StrategyType::Spot,
            },
        )
        .await
        .unwrap();
        pool.move_active_bin(0).await;
        pool.remove_liquidity(
            POOL,
            &owner,
            &dlmm_lp_protocols::types::RemoveLiquidityParams {
                position: position.clone(),
                bin_ids: vec![-2, -1, 0],
                bps: 10_000,
                close_after: false,
            },
        )
        .await
        .unwrap();
        worker.store.apply("SOL-USDC", &position, PositionState::Waiting).await;
        pool.move_active_bin(5).await;

        let outcome = worker.run_cycle().await.unwrap();

        assert_eq!(outcome.reason, DecisionReason::OutOfRangeEmpty);
        assert_eq!(outcome.commands, 2);
        assert_eq!(outcome.state, PositionState::NoPosition);
        assert_eq!(pool.position_count(&owner).await, 0);
        assert!(worker.store.is_empty().await);
        assert_eq!(
            worker.lifecycle.event_types(&position).await,
            vec![
                LifecycleEventType::FeesClaimed,
                LifecycleEventType::PositionClosed
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_command_leaves_state_untouched() {
        let (pool, worker, owner) = worker(WalletBalances {
            x: 10 * SOL,
            y: 0,
        })
        .await;
        pool.fail_next_submissions(1);

        let err = worker.run_cycle().await.unwrap_err();
        assert!(matches!(
            err,
            CycleError::Command {
                command: "create_empty_position",
                ..
            }
        ));
        assert!(worker.store.is_empty().await);
        assert_eq!(pool.position_count(&owner).await, 0);

        assert!(worker.run_cycle().await.is_ok());
        assert_eq!(worker.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_non_positive_price_is_rejected() {
        let mut config = PaperPoolConfig::new(POOL);
        config.initial_price = Decimal::ZERO;
        let (pool, worker, owner) = worker_with(
            config,
            None,
            WalletBalances {
                x: 10 * SOL,
                y: 0,
            },
        )
        .await;

        assert!(matches!(
            worker.run_cycle().await,
            Err(CycleError::InvalidPrice { .. })
        ));
        assert_eq!(pool.position_count(&owner).await, 0);
    }

    #[tokio::test]
    async fn test_unsupported_decimals_are_rejected() {
        let mut config = PaperPoolConfig::new(POOL);
        config.decimals_y = 30;
        let (pool, worker, owner) = worker_with(
            config,
            None,
            WalletBalances {
                x: 10 * SOL,
                y: 0,
            },
        )
        .await;

        assert!(matches!(
            worker.run_cycle().await,
            Err(CycleError::Amount(AmountError::UnsupportedDecimals { decimals: 30 }))
        ));
        assert_eq!(pool.position_count(&owner).await, 0);
    }

    #[tokio::test]
    async fn test_fee_report_uses_oracle_and_tolerates_failures() {
        let wallet = WalletBalances {
            x: 0,
            y: 100 * USDC,
        };
        let oracle: Arc<dyn PriceOracle> = Arc::new(FixedOracle(Some(dec!(1))));
        let (pool, worker, _) = worker_with(PaperPoolConfig::new(POOL), Some(oracle), wallet).await;
        worker.run_cycle().await.unwrap();
        worker.run_cycle().await.unwrap();
        pool.move_active_bin(0).await;

        let outcome = worker.run_cycle().await.unwrap();
        assert!(outcome.unclaimed_fees_usd.unwrap() > Decimal::ZERO);

        let failing: Arc<dyn PriceOracle> = Arc::new(FixedOracle(None));
        let (_, worker, _) = worker_with(PaperPoolConfig::new(POOL), Some(failing), wallet).await;
        worker.run_cycle().await.unwrap();
        let outcome = worker.run_cycle().await.unwrap();
        assert_eq!(outcome.unclaimed_fees_usd, None);
    }

    #[tokio::test]
    async fn test_records_of_vanished_positions_are_pruned() {
        let (_, worker, _) = worker(WalletBalances { x: 0, y: 0 }).await;
        worker.store.apply("SOL-USDC", "gone", PositionState::Balanced).await;

        let outcome = worker.run_cycle().await.unwrap();

        assert_eq!(outcome.reason, DecisionReason::NoPosition);
        assert_eq!(worker.store.get("gone").await, None);
    }
}
