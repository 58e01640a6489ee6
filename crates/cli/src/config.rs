//! Process settings and the pairs file.

use anyhow::{Context, Result, bail};
use clap::Args;
use dlmm_lp_domain::pair_config::PairConfig;
use dlmm_lp_execution::scheduler::SchedulerConfig;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// RPC endpoint used when `RPC` is not set.
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Minutes between cycles when `CHECK_INTERVAL` is unset or zero.
pub const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 5;

/// Priority fee, in micro-lamports, when `PRIORITY_FEE` is unset or zero.
pub const DEFAULT_PRIORITY_FEE: u64 = 20_000;

/// Settings shared by the commands that run cycles.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Minutes between reconciliation cycles
    #[arg(long, env = "CHECK_INTERVAL", default_value_t = DEFAULT_CHECK_INTERVAL_MINUTES)]
    pub check_interval: u64,

    /// Priority fee attached to transactions, in micro-lamports
    #[arg(long, env = "PRIORITY_FEE", default_value_t = DEFAULT_PRIORITY_FEE)]
    pub priority_fee: u64,

    /// Seconds a single pool, wallet or price call may take
    #[arg(long, env = "CALL_TIMEOUT", default_value_t = 60)]
    pub call_timeout: u64,
}

impl Settings {
    /// Pause between cycles.
    pub fn interval(&self) -> Duration {
        let minutes = match self.check_interval {
            0 => DEFAULT_CHECK_INTERVAL_MINUTES,
            minutes => minutes,
        };
        Duration::from_secs(minutes.saturating_mul(60))
    }

    /// Priority fee in micro-lamports.
    pub fn priority_fee(&self) -> u64 {
        match self.priority_fee {
            0 => DEFAULT_PRIORITY_FEE,
            fee => fee,
        }
    }

    /// Scheduler settings derived from the process settings.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.interval(),
            call_timeout: Duration::from_secs(self.call_timeout.max(1)),
            ..SchedulerConfig::default()
        }
    }
}

/// Reads the pairs file, a JSON array of pair configurations.
///
/// Pairs are not validated here; registration rejects invalid ones.
pub fn load_pairs(path: &Path) -> Result<Vec<PairConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading pairs file {}", path.display()))?;
    let pairs: Vec<PairConfig> = serde_json::from_str(&content)
        .with_context(|| format!("parsing pairs file {}", path.display()))?;
    if pairs.is_empty() {
        bail!("pairs file {} lists no pair", path.display());
    }
    Ok(pairs)
}
