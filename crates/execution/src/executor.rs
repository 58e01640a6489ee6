//! Runs reconciler commands against a pool service.

use crate::error::CycleError;
use crate::reconciler::{AddLiquidityCommand, LiquidityCommand};
use dlmm_lp_domain::amount::to_raw_amount;
use dlmm_lp_domain::pair_config::PairConfig;
use dlmm_lp_domain::snapshot::BinSnapshot;
use dlmm_lp_protocols::PoolService;
use dlmm_lp_protocols::types::{
    AddLiquidityParams, FULL_BPS, LiquidityAmounts, Receipt, RemoveLiquidityParams,
};
use solana_sdk::pubkey::Pubkey;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

/// Awaits a collaborator call within `limit`.
pub(crate) async fn call_with_timeout<T>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, CycleError> {
    match timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(CycleError::Collaborator { operation, source }),
        Err(_) => Err(CycleError::Timeout {
            operation,
            timeout: limit,
        }),
    }
}

/// A command that landed.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Executed command.
    pub command: LiquidityCommand,
    /// Transaction receipt.
    pub receipt: Receipt,
}

/// Result of running a decision's commands.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Commands that landed, in order.
    pub completed: Vec<CommandOutcome>,
    /// Failure that stopped the sequence.
    pub failure: Option<CycleError>,
}

impl ExecutionReport {
    /// Whether every command landed.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Position created by the sequence, if any.
    pub fn created_position(&self) -> Option<&str> {
        self.completed
            .iter()
            .find_map(|outcome| outcome.receipt.position.as_deref())
    }
}

/// Submits commands for one owner, stopping at the first failure.
#[derive(Clone)]
pub struct CommandExecutor {
    pool_service: Arc<dyn PoolService>,
    owner: Pubkey,
    call_timeout: Duration,
    submission_lock: Option<Arc<Mutex<()>>>,
}

impl CommandExecutor {
    /// Creates an executor.
    pub fn new(pool_service: Arc<dyn PoolService>, owner: Pubkey, call_timeout: Duration) -> Self {
        Self {
            pool_service,
            owner,
            call_timeout,
            submission_lock: None,
        }
    }

    /// Serializes submissions with every executor sharing `lock`.
    #[must_use]
    pub fn with_submission_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.submission_lock = Some(lock);
        self
    }

    /// Runs `commands` in order.
    ///
    /// The first failure stops the sequence; commands after it are not sent.
    pub async fn execute(
        &self,
        pair: &PairConfig,
        bin: &BinSnapshot,
        commands: Vec<LiquidityCommand>,
    ) -> ExecutionReport {
        let _guard = match &self.submission_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let mut report = ExecutionReport::default();
        for command in commands {
            match self.execute_one(pair, bin, &command).await {
                Ok(receipt) => {
                    info!(
                        pair = %pair.name,
                        command = command.name(),
                        signature = %receipt.signature,
                        "Command landed"
                    );
                    report.completed.push(CommandOutcome { command, receipt });
                }
                Err(e) => {
                    warn!(pair = %pair.name, command = command.name(), error = %e, "Command failed");
                    report.failure = Some(e);
                    break;
                }
            }
        }
        report
    }

    async fn execute_one(
        &self,
        pair: &PairConfig,
        bin: &BinSnapshot,
        command: &LiquidityCommand,
    ) -> Result<Receipt, CycleError> {
        let pool = pair.pool_address.as_str();
        let owner = &self.owner;
        match command {
            LiquidityCommand::CreateEmptyPosition { range } => {
                self.submit(
                    command,
                    self.pool_service.create_empty_position(pool, owner, *range),
                )
                .await
            }
            LiquidityCommand::AddLiquidity(add) => {
                let params = Self::add_params(add, bin);
                self.submit(
                    command,
                    self.pool_service.simulate_add_liquidity(pool, owner, &params),
                )
                .await?;
                self.submit(command, self.pool_service.add_liquidity(pool, owner, &params))
                    .await
            }
            LiquidityCommand::RemoveLiquidity {
                position,
                bin_ids,
                close_position,
            } => {
                let params = RemoveLiquidityParams {
                    position: position.clone(),
                    bin_ids: bin_ids.clone(),
                    bps: FULL_BPS,
                    close_after: *close_position,
                };
                self.submit(command, self.pool_service.remove_liquidity(pool, owner, &params))
                    .await
            }
            LiquidityCommand::ClaimFees { position, .. } => {
                self.submit(command, self.pool_service.claim_fees(pool, position, owner))
                    .await
            }
            LiquidityCommand::ClosePosition { position } => {
                self.submit(command, self.pool_service.close_position(pool, position, owner))
                    .await
            }
        }
    }

    async fn submit<T>(
        &self,
        command: &LiquidityCommand,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, CycleError> {
        call_with_timeout(command.name(), self.call_timeout, call)
            .await
            .map_err(|e| match e {
                CycleError::Collaborator { operation, source } => CycleError::Command {
                    command: operation,
                    source,
                },
                other => other,
            })
    }

    fn add_params(add: &AddLiquidityCommand, bin: &BinSnapshot) -> AddLiquidityParams {
        AddLiquidityParams {
            position: add.position.clone(),
            amounts: LiquidityAmounts {
                amount_x: to_raw_amount(add.amount_x, bin.decimals_x),
                amount_y: to_raw_amount(add.amount_y, bin.decimals_y),
            },
            range: add.range,
            strategy: add.strategy,
        }
    }
}
