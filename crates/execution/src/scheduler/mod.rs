//! Periodic reconciliation of every registered pair.
//!
//! Each interval the scheduler spawns one task per pair, joins them all and
//! sleeps. A failing pair is logged and retried on the next interval without
//! affecting the others. The loop stops when the shutdown channel flips to
//! `true`; in-flight pair tasks are aborted.

use crate::cycle::{Collaborators, CycleOutcome, PairWorker};
use crate::error::{CycleError, ScheduleError};
use crate::executor::CommandExecutor;
use crate::lifecycle::LifecycleTracker;
use crate::reconciler::{PositionReconciler, ReconcilerConfig};
use crate::store::PositionStateStore;
use dlmm_lp_domain::pair_config::PairConfig;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Default pause between cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default budget for a single collaborator call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Pause between cycles.
    pub interval: Duration,
    /// Budget for a single collaborator call.
    pub call_timeout: Duration,
    /// Send one pair's transactions at a time.
    pub serialize_submissions: bool,
    /// Reconciler settings shared by all pairs.
    pub reconciler: ReconcilerConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            serialize_submissions: true,
            reconciler: ReconcilerConfig::default(),
        }
    }
}

/// Why a pair's task did not produce an outcome.
#[derive(Debug)]
pub enum FailureReason {
    /// The cycle returned an error.
    Cycle(CycleError),
    /// The task panicked or was cancelled.
    Aborted(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle(e) => write!(f, "{e}"),
            Self::Aborted(message) => write!(f, "task aborted: {message}"),
        }
    }
}

/// A pair whose cycle failed.
#[derive(Debug)]
pub struct PairFailure {
    /// Pair name.
    pub pair: String,
    /// What went wrong.
    pub reason: FailureReason,
}

/// Results of one cycle over all pairs.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Pairs that completed.
    pub outcomes: Vec<CycleOutcome>,
    /// Pairs that failed.
    pub failures: Vec<PairFailure>,
}

impl CycleReport {
    /// Outcome of `pair`, if it completed.
    pub fn outcome(&self, pair: &str) -> Option<&CycleOutcome> {
        self.outcomes.iter().find(|outcome| outcome.pair == pair)
    }

    /// Failure of `pair`, if it failed.
    pub fn failure(&self, pair: &str) -> Option<&PairFailure> {
        self.failures.iter().find(|failure| failure.pair == pair)
    }

    /// Number of commands that landed across all pairs.
    pub fn commands(&self) -> usize {
        self.outcomes.iter().map(|outcome| outcome.commands).sum()
    }
}

/// Runs reconciliation cycles for a set of pairs.
pub struct Scheduler {
    owner: Pubkey,
    config: SchedulerConfig,
    workers: Vec<PairWorker>,
    store: PositionStateStore,
    lifecycle: Arc<LifecycleTracker>,
    submission_lock: Arc<Mutex<()>>,
    running: Arc<AtomicBool>,
    completed_cycles: AtomicUsize,
}

impl Scheduler {
    /// Creates a scheduler acting for `owner`.
    pub fn new(owner: Pubkey, config: SchedulerConfig) -> Self {
        Self {
            owner,
            config,
            workers: Vec::new(),
            store: PositionStateStore::new(),
            lifecycle: Arc::new(LifecycleTracker::new()),
            submission_lock: Arc::new(Mutex::new(())),
            running: Arc::new(AtomicBool::new(false)),
            completed_cycles: AtomicUsize::new(0),
        }
    }

    /// Registers a pair.
    ///
    /// # Errors
    /// Rejects an invalid configuration, a pair name already registered, or a
    /// pool another pair already manages.
    pub fn register_pair(
        &mut self,
        pair: PairConfig,
        collaborators: Collaborators,
    ) -> Result<(), ScheduleError> {
        pair.validate()?;
        if self.workers.iter().any(|worker| worker.pair().name == pair.name) {
            return Err(ScheduleError::DuplicatePair(pair.name));
        }
        if let Some(existing) = self
            .workers
            .iter()
            .find(|worker| worker.pair().pool_address == pair.pool_address)
        {
            return Err(ScheduleError::DuplicatePool {
                pair: pair.name,
                pool: pair.pool_address,
                existing: existing.pair().name.clone(),
            });
        }

        let mut executor = CommandExecutor::new(
            collaborators.pool_service.clone(),
            self.owner,
            self.config.call_timeout,
        );
        if self.config.serialize_submissions {
            executor = executor.with_submission_lock(self.submission_lock.clone());
        }

        info!(
            pair = %pair.name,
            pool = %pair.pool_address,
            strategy = ?pair.strategy_type,
            range = pair.total_range_interval,
            cap = %pair.max_position_size_in_y,
            "Pair registered"
        );
        self.workers.push(PairWorker::new(
            pair,
            self.owner,
            collaborators,
            executor,
            PositionReconciler::new(self.config.reconciler.clone()),
            self.store.clone(),
            self.lifecycle.clone(),
            self.config.call_timeout,
        ));
        Ok(())
    }

    /// Number of registered pairs.
    pub fn pair_count(&self) -> usize {
        self.workers.len()
    }

    /// Position state records.
    pub fn store(&self) -> &PositionStateStore {
        &self.store
    }

    /// Position lifecycle history.
    pub fn lifecycle(&self) -> &Arc<LifecycleTracker> {
        &self.lifecycle
    }

    /// Scheduler settings.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Whether [`Scheduler::run`] is looping.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Cycles completed by [`Scheduler::run`] so far.
    pub fn completed_cycles(&self) -> usize {
        self.completed_cycles.load(Ordering::SeqCst)
    }

    /// Runs one cycle over every pair and waits for all of them.
    pub async fn run_cycle(&self) -> CycleReport {
        let (_keep_open, mut shutdown) = watch::channel(false);
        self.cycle_until(&mut shutdown).await.unwrap_or_default()
    }

    /// Runs cycles until `shutdown` turns `true` or its sender is dropped.
    ///
    /// Returns the number of cycles that completed.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> usize {
        self.running.store(true, Ordering::SeqCst);
        info!(
            pairs = self.workers.len(),
            interval_secs = self.config.interval.as_secs(),
            "Starting scheduler"
        );

        let mut completed = 0;
        while !*shutdown.borrow() {
            let Some(report) = self.cycle_until(&mut shutdown).await else {
                break;
            };
            completed += 1;
            self.completed_cycles.fetch_add(1, Ordering::SeqCst);
            self.log_report(completed, &report);

            tokio::select! {
                _ = sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(cycles = completed, "Scheduler stopped");
        completed
    }

    /// Runs one cycle, aborting it when shutdown is requested.
    async fn cycle_until(&self, shutdown: &mut watch::Receiver<bool>) -> Option<CycleReport> {
        let mut tasks = JoinSet::new();
        let mut pairs = HashMap::with_capacity(self.workers.len());
        for worker in &self.workers {
            let name = worker.pair().name.clone();
            let worker = worker.clone();
            let handle = tasks.spawn(async move { worker.run_cycle().await });
            pairs.insert(handle.id(), name);
        }

        let mut report = CycleReport::default();
        loop {
            tokio::select! {
                joined = tasks.join_next_with_id() => {
                    let Some(joined) = joined else {
                        break;
                    };
                    match joined {
                        Ok((_, Ok(outcome))) => report.outcomes.push(outcome),
                        Ok((id, Err(e))) => {
                            let pair = pairs.remove(&id).unwrap_or_default();
                            warn!(pair = %pair, error = %e, "Cycle failed, retrying next interval");
                            report.failures.push(PairFailure {
                                pair,
                                reason: FailureReason::Cycle(e),
                            });
                        }
                        Err(e) => {
                            let pair = pairs.remove(&e.id()).unwrap_or_default();
                            warn!(pair = %pair, error = %e, "Pair task aborted");
                            report.failures.push(PairFailure {
                                pair,
                                reason: FailureReason::Aborted(e.to_string()),
                            });
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(in_flight = tasks.len(), "Shutdown requested, aborting cycle");
                        tasks.abort_all();
                        return None;
                    }
                }
            }
        }
        Some(report)
    }

    fn log_report(&self, cycle: usize, report: &CycleReport) {
        for outcome in &report.outcomes {
            debug!(
                pair = %outcome.pair,
                reason = %outcome.reason,
                state = %outcome.state,
                commands = outcome.commands,
                "Pair reconciled"
            );
        }
        info!(
            cycle = cycle,
            reconciled = report.outcomes.len(),
            failed = report.failures.len(),
            commands = report.commands(),
            "Cycle finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::DecisionReason;
    use anyhow::Result;
    use async_trait::async_trait;
    use dlmm_lp_domain::ConfigError;
    use dlmm_lp_domain::pair_config::StrategyType;
    use dlmm_lp_domain::snapshot::WalletBalances;
    use dlmm_lp_domain::state::PositionState;
    use dlmm_lp_protocols::WalletBalanceService;
    use dlmm_lp_protocols::paper::{PaperPool, PaperPoolConfig};
    use rust_decimal_macros::dec;

    const SOL: u64 = 1_000_000_000;

    struct SlowBalances(Duration);

    #[async_trait]
    impl WalletBalanceService for SlowBalances {
        async fn balance_of(&self, _owner: &Pubkey, _mint: &str) -> Result<u64> {
            sleep(self.0).await;
            Ok(10 * SOL)
        }
    }

    fn pair(name: &str, pool: &str) -> PairConfig {
        PairConfig {
            name: name.to_string(),
            pool_address: pool.to_string(),
            min_reserve_x: dec!(2),
            min_reserve_y: dec!(0),
            bin_step: 10,
            max_position_size_in_y: dec!(300),
            total_range_interval: 6,
            strategy_type: StrategyType::Spot,
            balance_out_position: true,
        }
    }

    async fn funded_pool(owner: Pubkey, pool: &str) -> (Arc<PaperPool>, Collaborators) {
        let paper = Arc::new(PaperPool::new(PaperPoolConfig::new(pool)));
        paper
            .set_balance(
                owner,
                WalletBalances {
                    x: 10 * SOL,
                    y: 0,
                },
            )
            .await;
        let collaborators = Collaborators {
            pool_service: paper.clone(),
            balances: paper.clone(),
            oracle: None,
        };
        (paper, collaborators)
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_millis(10),
            call_timeout: Duration::from_secs(5),
            ..SchedulerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_register_pair_rejects_invalid_and_duplicate_pairs_and_pools() {
        let owner = Pubkey::new_unique();
        let mut scheduler = Scheduler::new(owner, config());
        let (_, collaborators) = funded_pool(owner, "pool-a").await;

        let invalid = PairConfig {
            max_position_size_in_y: dec!(0),
            ..pair("BAD-USDC", "pool-a")
        };
        assert!(matches!(
            scheduler.register_pair(invalid, collaborators.clone()),
            Err(ScheduleError::InvalidConfig(ConfigError::NonPositivePositionSize { .. }))
        ));

        scheduler
            .register_pair(pair("SOL-USDC", "pool-a"), collaborators.clone())
            .unwrap();
        assert!(matches!(
            scheduler.register_pair(pair("SOL-USDC", "pool-a"), collaborators.clone()),
            Err(ScheduleError::DuplicatePair(name)) if name == "SOL-USDC"
        ));
        assert!(matches!(
            scheduler.register_pair(pair("SOL-USDT", "pool-a"), collaborators),
            Err(ScheduleError::DuplicatePool { pair, existing, .. })
                if pair == "SOL-USDT" && existing == "SOL-USDC"
        ));
        assert_eq!(scheduler.pair_count(), 1);
    }

    #[tokio::test]
    async fn test_cycles_drive_a_position_to_placement() {
        let owner = Pubkey::new_unique();
        let mut scheduler = Scheduler::new(owner, config());
        let (paper, collaborators) = funded_pool(owner, "pool-a").await;
        scheduler
            .register_pair(pair("SOL-USDC", "pool-a"), collaborators)
            .unwrap();

        let first = scheduler.run_cycle().await;
        assert_eq!(first.outcome("SOL-USDC").unwrap().reason, DecisionReason::NoPosition);
        let second = scheduler.run_cycle().await;
        assert_eq!(second.commands(), 1);
        let third = scheduler.run_cycle().await;
        assert_eq!(third.commands(), 0);

        assert_eq!(paper.position_count(&owner).await, 1);
        let records = scheduler.store().snapshot().await;
        assert_eq!(records.len(), 1);
        assert!(matches!(
            records.values().next(),
            Some(PositionState::OneSided { .. })
        ));
        let stats = scheduler.lifecycle().get_aggregate_stats().await;
        assert_eq!(stats.open_positions, 1);
        assert_eq!(stats.total_adds, 1);
    }

    #[tokio::test]
    async fn test_failing_pair_does_not_block_others() {
        let owner = Pubkey::new_unique();
        let mut scheduler = Scheduler::new(owner, config());
        let (healthy, collaborators) = funded_pool(owner, "pool-a").await;
        scheduler
            .register_pair(pair("SOL-USDC", "pool-a"), collaborators)
            .unwrap();
        // The paper pool only answers for its own address.
        let (_, misrouted) = funded_pool(owner, "pool-b").await;
        scheduler
            .register_pair(pair("JUP-USDC", "pool-c"), misrouted)
            .unwrap();

        let report = scheduler.run_cycle().await;

        assert_eq!(report.outcomes.len(), 1);
        assert!(report.outcome("SOL-USDC").is_some());
        let failure = report.failure("JUP-USDC").unwrap();
        assert!(matches!(
            failure.reason,
            FailureReason::Cycle(CycleError::Collaborator {
                operation: "get_active_bin",
                ..
            })
        ));
        assert_eq!(healthy.position_count(&owner).await, 1);
        assert_eq!(scheduler.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_state_is_kept_when_a_command_fails() {
        let owner = Pubkey::new_unique();
        let mut scheduler = Scheduler::new(owner, config());
        let (paper, collaborators) = funded_pool(owner, "pool-a").await;
        scheduler
            .register_pair(pair("SOL-USDC", "pool-a"), collaborators)
            .unwrap();
        scheduler.run_cycle().await;
        let before = scheduler.store().snapshot().await;

        paper.fail_next_submissions(1);
        let report = scheduler.run_cycle().await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(scheduler.store().snapshot().await, before);

        let retried = scheduler.run_cycle().await;
        assert_eq!(retried.commands(), 1);
        assert_ne!(scheduler.store().snapshot().await, before);
    }

    #[tokio::test]
    async fn test_slow_collaborator_times_out() {
        let owner = Pubkey::new_unique();
        let mut scheduler = Scheduler::new(
            owner,
            SchedulerConfig {
                call_timeout: Duration::from_millis(50),
                ..config()
            },
        );
        let (_, mut collaborators) = funded_pool(owner, "pool-a").await;
        collaborators.balances = Arc::new(SlowBalances(Duration::from_secs(30)));
        scheduler
            .register_pair(pair("SOL-USDC", "pool-a"), collaborators)
            .unwrap();

        let report = scheduler.run_cycle().await;

        assert!(matches!(
            report.failure("SOL-USDC").unwrap().reason,
            FailureReason::Cycle(CycleError::Timeout {
                operation: "balance_of",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let owner = Pubkey::new_unique();
        let mut scheduler = Scheduler::new(
            owner,
            SchedulerConfig {
                interval: Duration::from_secs(3600),
                ..config()
            },
        );
        let (paper, collaborators) = funded_pool(owner, "pool-a").await;
        scheduler
            .register_pair(pair("SOL-USDC", "pool-a"), collaborators)
            .unwrap();
        let scheduler = Arc::new(scheduler);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run(rx).await }
        });
        while scheduler.completed_cycles() == 0 {
            sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();

        let cycles = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cycles, 1);
        assert!(!scheduler.is_running());
        assert_eq!(paper.position_count(&owner).await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_in_flight_cycle() {
        let owner = Pubkey::new_unique();
        let mut scheduler = Scheduler::new(
            owner,
            SchedulerConfig {
                call_timeout: Duration::from_secs(3600),
                ..config()
            },
        );
        let (_, mut collaborators) = funded_pool(owner, "pool-a").await;
        collaborators.balances = Arc::new(SlowBalances(Duration::from_secs(3600)));
        scheduler
            .register_pair(pair("SOL-USDC", "pool-a"), collaborators)
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let run = scheduler.run(rx);
        let stop = async {
            sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
        };
        let (cycles, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(run, stop)
        })
        .await
        .unwrap();

        assert_eq!(cycles, 0);
        assert!(scheduler.store().is_empty().await);
    }
}
