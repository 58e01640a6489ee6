//! USD prices from the Meteora DLMM pair API, with Jupiter and CoinGecko
//! fallbacks.

use crate::PriceOracle;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Meteora DLMM API base URL.
pub const METEORA_API_URL: &str = "https://dlmm-api.meteora.ag";

/// Jupiter price API URL.
pub const JUPITER_PRICE_URL: &str = "https://lite-api.jup.ag/price/v2";

/// CoinGecko token price API URL for Solana mints.
pub const COINGECKO_PRICE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/token_price/solana";

/// Wrapped SOL mint.
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// USDC mint.
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// USDT mint.
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

/// SOL-USDC pair used to price wrapped SOL.
pub const SOL_USDC_POOL: &str = "BVRbyLjjfSBcoyiYFuxbgKYnWuiFaF9CSXEa5vdSZ9Hh";

/// Pair summary returned by the Meteora API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PairInfo {
    /// Pair address.
    pub address: String,
    /// Pair label.
    #[serde(default)]
    pub name: String,
    /// Mint of token X.
    pub mint_x: String,
    /// Mint of token Y.
    pub mint_y: String,
    /// Price of one X in Y.
    pub current_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct JupiterResponse {
    data: HashMap<String, Option<JupiterPrice>>,
}

#[derive(Debug, Deserialize)]
struct JupiterPrice {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoPrice {
    usd: Option<Decimal>,
}

/// USD price of `mint` in a CoinGecko token price response.
///
/// CoinGecko may echo the contract address in lowercase.
fn coingecko_usd(response: &HashMap<String, CoinGeckoPrice>, mint: &str) -> Option<Decimal> {
    response
        .get(mint)
        .or_else(|| response.get(&mint.to_lowercase()))
        .and_then(|entry| entry.usd)
}

/// Price of a USD stablecoin mint.
pub fn stablecoin_price(mint: &str) -> Option<Decimal> {
    match mint {
        USDC_MINT | USDT_MINT => Some(Decimal::ONE),
        _ => None,
    }
}

/// HTTP price oracle over the Meteora and Jupiter APIs.
#[derive(Debug, Clone)]
pub struct MeteoraPriceOracle {
    client: reqwest::Client,
    api_url: String,
    jupiter_url: String,
    coingecko_url: String,
}

impl MeteoraPriceOracle {
    /// Creates an oracle against the public endpoints.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_urls(METEORA_API_URL, JUPITER_PRICE_URL)
    }

    /// Creates an oracle against custom endpoints.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_urls(api_url: impl Into<String>, jupiter_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            jupiter_url: jupiter_url.into(),
            coingecko_url: COINGECKO_PRICE_URL.to_string(),
        })
    }

    /// Replaces the CoinGecko endpoint.
    pub fn with_coingecko_url(mut self, url: impl Into<String>) -> Self {
        self.coingecko_url = url.into();
        self
    }

    /// Fetches the pair summary of a pool.
    ///
    /// # Errors
    /// Returns an error on transport failures or unexpected payloads.
    pub async fn pair_info(&self, pool: &str) -> Result<PairInfo> {
        let url = format!("{}/pair/{pool}", self.api_url);
        let info = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch pair {pool}"))?
            .error_for_status()?
            .json::<PairInfo>()
            .await
            .with_context(|| format!("Failed to decode pair {pool}"))?;
        debug!(pool = pool, name = %info.name, price = %info.current_price, "Fetched pair info");
        Ok(info)
    }

    async fn jupiter_price(&self, mint: &str) -> Result<Decimal> {
        let response = self
            .client
            .get(&self.jupiter_url)
            .query(&[("ids", mint)])
            .send()
            .await
            .with_context(|| format!("Failed to fetch Jupiter price for {mint}"))?
            .error_for_status()?
            .json::<JupiterResponse>()
            .await
            .context("Failed to decode Jupiter price")?;
        response
            .data
            .get(mint)
            .and_then(|entry| entry.as_ref())
            .map(|entry| entry.price)
            .ok_or_else(|| anyhow!("Jupiter has no price for {mint}"))
    }

    async fn coingecko_price(&self, mint: &str) -> Result<Decimal> {
        let response = self
            .client
            .get(&self.coingecko_url)
            .query(&[("contract_addresses", mint), ("vs_currencies", "usd")])
            .send()
            .await
            .with_context(|| format!("Failed to fetch CoinGecko price for {mint}"))?
            .error_for_status()?
            .json::<HashMap<String, CoinGeckoPrice>>()
            .await
            .context("Failed to decode CoinGecko price")?;
        coingecko_usd(&response, mint).ok_or_else(|| anyhow!("CoinGecko has no price for {mint}"))
    }

    /// USD price of a mint from Jupiter, then CoinGecko.
    async fn token_price(&self, mint: &str) -> Result<Decimal> {
        match self.jupiter_price(mint).await {
            Ok(price) => Ok(price),
            Err(e) => {
                warn!(mint = mint, error = %e, "Jupiter price unavailable, trying CoinGecko");
                self.coingecko_price(mint).await
            }
        }
    }
}

#[async_trait]
impl PriceOracle for MeteoraPriceOracle {
    async fn usd_price(&self, pool: &str) -> Result<Decimal> {
        let info = self.pair_info(pool).await?;
        if let Some(price) = stablecoin_price(&info.mint_y) {
            return Ok(price);
        }
        if info.mint_y == WSOL_MINT {
            return Ok(self.pair_info(SOL_USDC_POOL).await?.current_price);
        }
        self.token_price(&info.mint_y).await
    }
}
