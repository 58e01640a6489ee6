//! Command Line Interface for the DLMM liquidity position manager.
mod config;
mod keypair;
mod simulate;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use config::{DEFAULT_RPC_URL, Settings, load_pairs};
use dlmm_lp_protocols::meteora::{MeteoraPriceOracle, SOL_USDC_POOL};
use dlmm_lp_protocols::rpc::RpcWalletBalances;
use dlmm_lp_protocols::{PriceOracle, WalletBalanceService};
use dotenv::dotenv;
use simulate::SimulateArgs;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::Signer;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dlmm-lp")]
#[command(about = "Meteora DLMM liquidity position manager", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Secret key as a JSON array of 64 bytes
    #[arg(long, env = "PRIVATE_KEY", global = true, hide_env_values = true)]
    private_key: Option<String>,

    /// Keypair file holding a JSON array of 64 bytes
    #[arg(long, global = true)]
    keypair: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the position manager against simulated pools
    Simulate {
        #[command(flatten)]
        settings: Settings,

        #[command(flatten)]
        args: SimulateArgs,
    },
    /// Check every pair of a pairs file
    Validate {
        /// Pairs file, a JSON array of pair configurations
        #[arg(long, env = "PAIRS_FILE")]
        pairs: PathBuf,
    },
    /// Show the wallet balances of every pair's tokens
    Balances {
        /// Pairs file, a JSON array of pair configurations
        #[arg(long, env = "PAIRS_FILE")]
        pairs: PathBuf,

        /// Solana RPC endpoint
        #[arg(long, env = "RPC", default_value = DEFAULT_RPC_URL)]
        rpc: String,
    },
    /// Show a pool's price and the USD value of its Y token
    Price {
        /// Pool (LB pair) address
        #[arg(long, default_value = SOL_USDC_POOL)]
        pool: String,
    },
}

fn init_logging(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = run(cli).await;
    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Simulate { settings, args } => {
            let owner = if cli.private_key.is_none() && cli.keypair.is_none() {
                let owner = Pubkey::new_unique();
                info!(owner = %owner, "No keypair configured, using a throwaway owner");
                owner
            } else {
                keypair::load_keypair(cli.private_key.as_deref(), cli.keypair.as_deref())?.pubkey()
            };
            simulate::simulate(settings, args, owner).await
        }
        Commands::Validate { pairs } => validate(&pairs),
        Commands::Balances { pairs, rpc } => {
            let keypair = keypair::load_keypair(cli.private_key.as_deref(), cli.keypair.as_deref())?;
            balances(&pairs, &rpc, &keypair.pubkey()).await
        }
        Commands::Price { pool } => price(&pool).await,
    }
}

fn validate(path: &std::path::Path) -> Result<()> {
    let pairs = load_pairs(path)?;
    let mut invalid = 0;
    for pair in &pairs {
        match pair.validate() {
            Ok(()) => println!(
                "✅ {:<16} range {:>2} bins | cap {} | {:?}",
                pair.name, pair.total_range_interval, pair.max_position_size_in_y, pair.strategy_type
            ),
            Err(e) => {
                invalid += 1;
                println!("❌ {:<16} {e}", pair.name);
            }
        }
    }
    if invalid > 0 {
        bail!("{invalid} of {} pair(s) are invalid", pairs.len());
    }
    println!("All {} pair(s) are valid", pairs.len());
    Ok(())
}

async fn balances(path: &std::path::Path, rpc: &str, owner: &Pubkey) -> Result<()> {
    let pairs = load_pairs(path)?;
    let oracle = MeteoraPriceOracle::new()?;
    let wallet = RpcWalletBalances::new(rpc);

    println!("🔍 Balances of {owner} via {}", wallet.url());
    for pair in &pairs {
        let info = oracle.pair_info(&pair.pool_address).await?;
        let balance_x = wallet.balance_of(owner, &info.mint_x).await?;
        let balance_y = wallet.balance_of(owner, &info.mint_y).await?;
        println!(
            "{:<16} X {:>20} ({}) | Y {:>20} ({})",
            pair.name, balance_x, info.mint_x, balance_y, info.mint_y
        );
    }
    Ok(())
}

async fn price(pool: &str) -> Result<()> {
    let oracle = MeteoraPriceOracle::new()?;
    let info = oracle.pair_info(pool).await?;
    let usd = oracle.usd_price(pool).await?;

    println!("📡 {} ({})", info.name, info.address);
    println!("Price:     {} Y per X", info.current_price);
    println!("Y in USD:  {usd}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pairs_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"[{
                "name": "SOL-USDC",
                "pool_address": "paper-pool",
                "min_reserve_x": "0",
                "min_reserve_y": "0",
                "bin_step": 10,
                "max_position_size_in_y": "100",
                "total_range_interval": 6
            }]"#,
        )
        .unwrap();
        file
    }

    fn simulate_cli(credentials: &[&str], pairs: &NamedTempFile) -> Cli {
        let pairs = pairs.path().to_string_lossy().into_owned();
        let mut argv = vec!["dlmm-lp"];
        argv.extend_from_slice(credentials);
        argv.extend(["simulate", "--pairs", pairs.as_str(), "--cycles", "1", "--step-ms", "1"]);
        Cli::parse_from(argv)
    }

    #[tokio::test]
    async fn test_simulate_rejects_malformed_private_key() {
        let pairs = pairs_file();
        let cli = simulate_cli(&["--private-key", "[1,2,3]"], &pairs);

        let err = run(cli).await.unwrap_err();
        assert!(err.to_string().contains("no valid private key"));
    }

    #[tokio::test]
    async fn test_simulate_rejects_unreadable_keypair_file() {
        let pairs = pairs_file();
        let cli = simulate_cli(&["--private-key", "", "--keypair", "/nonexistent/id.json"], &pairs);

        assert!(run(cli).await.is_err());
    }
}
