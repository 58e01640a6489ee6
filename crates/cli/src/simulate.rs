//! Dry runs against simulated pools.
//!
//! Every pair gets its own [`PaperPool`] whose active bin follows a Gaussian
//! random walk, while the scheduler reconciles the pairs exactly as it would
//! against live pools.

use crate::config::{Settings, load_pairs};
use anyhow::{Result, bail};
use clap::Args;
use dlmm_lp_domain::amount::{to_raw_amount, to_ui_amount};
use dlmm_lp_domain::pair_config::PairConfig;
use dlmm_lp_domain::snapshot::WalletBalances;
use dlmm_lp_execution::cycle::Collaborators;
use dlmm_lp_execution::scheduler::Scheduler;
use dlmm_lp_protocols::paper::{PaperPool, PaperPoolConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, sleep};
use tracing::{info, warn};

/// Options of the `simulate` command.
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Pairs file, a JSON array of pair configurations
    #[arg(long, env = "PAIRS_FILE")]
    pub pairs: PathBuf,

    /// Stop after this many cycles instead of waiting for Ctrl-C
    #[arg(long)]
    pub cycles: Option<usize>,

    /// Milliseconds between cycles and market steps, instead of the check interval
    #[arg(long)]
    pub step_ms: Option<u64>,

    /// Standard deviation of the active bin move per step, in bins
    #[arg(long, default_value_t = 2.0)]
    pub volatility: f64,

    /// Price of the starting bin, Y per X
    #[arg(long, default_value = "150")]
    pub initial_price: Decimal,

    /// Starting X balance of the wallet in every pool
    #[arg(long, default_value = "10")]
    pub balance_x: Decimal,

    /// Starting Y balance of the wallet in every pool
    #[arg(long, default_value = "1000")]
    pub balance_y: Decimal,

    /// Seed of the random walk
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Builds the paper pool backing `pair`.
fn paper_pool(pair: &PairConfig, args: &SimulateArgs, settings: &Settings) -> PaperPool {
    let mut config = PaperPoolConfig::new(pair.pool_address.clone());
    config.bin_step = pair.bin_step;
    config.initial_price = args.initial_price;
    config.priority_fee = settings.priority_fee();
    PaperPool::new(config)
}

/// Runs the scheduler over paper pools until the cycle limit or Ctrl-C.
pub async fn simulate(settings: Settings, args: SimulateArgs, owner: Pubkey) -> Result<()> {
    let step = args
        .step_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.interval());
    let walk = Normal::new(0.0, args.volatility)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut config = settings.scheduler_config();
    config.interval = step;
    let mut scheduler = Scheduler::new(owner, config);
    let mut pools = Vec::new();
    for pair in load_pairs(&args.pairs)? {
        let pool = Arc::new(paper_pool(&pair, &args, &settings));
        let pool_config = pool.config();
        pool.set_balance(
            owner,
            WalletBalances {
                x: to_raw_amount(args.balance_x, pool_config.decimals_x),
                y: to_raw_amount(args.balance_y, pool_config.decimals_y),
            },
        )
        .await;
        let name = pair.name.clone();
        let collaborators = Collaborators {
            pool_service: pool.clone(),
            balances: pool.clone(),
            oracle: None,
        };
        match scheduler.register_pair(pair, collaborators) {
            Ok(()) => pools.push((name, pool)),
            Err(e) => warn!(pair = %name, error = %e, "Skipping pair"),
        }
    }
    if pools.is_empty() {
        bail!("no valid pair to simulate");
    }

    println!(
        "🚀 Simulating {} pair(s), step {:?}, volatility {} bins",
        pools.len(),
        step,
        args.volatility
    );

    let scheduler = Arc::new(scheduler);
    let market = tokio::spawn({
        let pools = pools.clone();
        async move {
            let mut ticker = interval(step);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for (name, pool) in &pools {
                    let delta = walk.sample(&mut rng).round() as i32;
                    let active = pool.move_active_bin(delta).await;
                    info!(pair = %name, delta = delta, active_bin = active, "Market moved");
                }
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stopper = tokio::spawn({
        let scheduler = scheduler.clone();
        let cycles = args.cycles;
        async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
                _ = wait_for_cycles(&scheduler, cycles) => info!("Cycle limit reached"),
            }
            let _ = shutdown_tx.send(true);
        }
    });

    let completed = scheduler.run(shutdown_rx).await;
    market.abort();
    stopper.abort();

    print_summary(&scheduler, &pools, &owner, completed).await;
    Ok(())
}

/// Resolves once the scheduler completed `limit` cycles; never without a limit.
async fn wait_for_cycles(scheduler: &Scheduler, limit: Option<usize>) {
    let Some(limit) = limit else {
        return std::future::pending().await;
    };
    while scheduler.completed_cycles() < limit {
        sleep(Duration::from_millis(10)).await;
    }
}

async fn print_summary(
    scheduler: &Scheduler,
    pools: &[(String, Arc<PaperPool>)],
    owner: &Pubkey,
    cycles: usize,
) {
    let stats = scheduler.lifecycle().get_aggregate_stats().await;
    info!(
        cycles = cycles,
        positions = stats.total_positions,
        open = stats.open_positions,
        closed = stats.closed_positions,
        adds = stats.total_adds,
        removes = stats.total_removes,
        fees_in_y = %stats.total_fees_in_y,
        "Simulation finished"
    );

    println!("\n📊 Simulation Results");
    println!("════════════════════════════════════");
    println!("Cycles:          {cycles}");
    println!("Positions:       {} ({} open)", stats.total_positions, stats.open_positions);
    println!("Deposits:        {}", stats.total_adds);
    println!("Withdrawals:     {}", stats.total_removes);
    println!("Deposited (Y):   {:.4}", stats.total_deposited_in_y);
    println!("Fees claimed (Y):{:.6}", stats.total_fees_in_y);
    for (name, pool) in pools {
        let wallet = pool.wallet(owner).await;
        let config = pool.config();
        println!(
            "{name:<16} bin {:>5} | wallet X {:.4} | wallet Y {:.4}",
            pool.active_bin().await,
            to_ui_amount(wallet.x, config.decimals_x),
            to_ui_amount(wallet.y, config.decimals_y),
        );
    }
    println!("════════════════════════════════════");
}
