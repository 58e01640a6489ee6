//! Wallet balances through Solana JSON-RPC.

use crate::WalletBalanceService;
use crate::meteora::WSOL_MINT;
use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Reads balances with a nonblocking RPC client.
///
/// The wrapped SOL mint is answered with the native lamport balance; any
/// other mint with the balance of the owner's first token account for it.
#[derive(Clone)]
pub struct RpcWalletBalances {
    client: Arc<RpcClient>,
}

impl RpcWalletBalances {
    /// Creates a reader against `rpc_url`.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            client: Arc::new(RpcClient::new(rpc_url.into())),
        }
    }

    /// Creates a reader sharing an existing client.
    pub fn with_client(client: Arc<RpcClient>) -> Self {
        Self { client }
    }

    /// RPC endpoint.
    pub fn url(&self) -> String {
        self.client.url()
    }
}

#[async_trait]
impl WalletBalanceService for RpcWalletBalances {
    async fn balance_of(&self, owner: &Pubkey, mint: &str) -> Result<u64> {
        if mint == WSOL_MINT {
            return self
                .client
                .get_balance(owner)
                .await
                .with_context(|| format!("Failed to fetch SOL balance of {owner}"));
        }

        let mint_key =
            Pubkey::from_str(mint).with_context(|| format!("Invalid mint address {mint}"))?;
        let accounts = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::Mint(mint_key))
            .await
            .with_context(|| format!("Failed to list {mint} accounts of {owner}"))?;

        let Some(account) = accounts.first() else {
            debug!(owner = %owner, mint = mint, "No token account, balance is zero");
            return Ok(0);
        };

        let account_key = Pubkey::from_str(&account.pubkey)
            .with_context(|| format!("Invalid token account {}", account.pubkey))?;
        let balance = self
            .client
            .get_token_account_balance(&account_key)
            .await
            .with_context(|| format!("Failed to fetch balance of {account_key}"))?;
        balance
            .amount
            .parse::<u64>()
            .with_context(|| format!("Invalid token amount {}", balance.amount))
    }
}
