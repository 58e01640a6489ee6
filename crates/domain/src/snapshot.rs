//! Snapshots of pools, positions and wallets taken at the start of a cycle.
//!
//! Amounts are raw on-chain units; helpers convert them with the decimals
//! carried by [`BinSnapshot`].

use crate::amount::to_ui_amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Inclusive range of bin ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinRange {
    /// Lowest bin id.
    pub lower: i32,
    /// Highest bin id.
    pub upper: i32,
}

impl BinRange {
    /// Creates a range from its bounds.
    pub fn new(lower: i32, upper: i32) -> Self {
        Self { lower, upper }
    }

    /// Range spanning `half_width` bins on each side of `center`.
    pub fn around(center: i32, half_width: i32) -> Self {
        Self::new(center - half_width, center + half_width)
    }

    /// Range from `center` up to `center + width`.
    pub fn above(center: i32, width: i32) -> Self {
        Self::new(center, center + width)
    }

    /// Range from `center - width` up to `center`.
    pub fn below(center: i32, width: i32) -> Self {
        Self::new(center - width, center)
    }

    /// Number of bins covered.
    pub fn len(&self) -> u32 {
        (self.upper - self.lower + 1).max(0) as u32
    }

    /// Whether the range covers no bin.
    pub fn is_empty(&self) -> bool {
        self.upper < self.lower
    }

    /// Whether `bin_id` lies inside the range.
    pub fn contains(&self, bin_id: i32) -> bool {
        (self.lower..=self.upper).contains(&bin_id)
    }

    /// Whether `other` lies entirely inside this range.
    pub fn covers(&self, other: &BinRange) -> bool {
        self.contains(other.lower) && self.contains(other.upper)
    }

    /// Iterates over the bin ids of the range.
    pub fn bins(&self) -> impl Iterator<Item = i32> {
        self.lower..=self.upper
    }
}

/// State of a pool's active bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSnapshot {
    /// Active bin id.
    pub bin_id: i32,
    /// Price of one X in Y, decimal adjusted.
    pub price_per_token: Decimal,
    /// Decimals of token X.
    pub decimals_x: u8,
    /// Decimals of token Y.
    pub decimals_y: u8,
}

/// Amounts held by a position in one bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinLiquidity {
    /// Bin id.
    pub bin_id: i32,
    /// Raw X amount.
    pub amount_x: u64,
    /// Raw Y amount.
    pub amount_y: u64,
    /// Marker bin of a just-created position; counts as holding liquidity.
    #[serde(default)]
    pub placeholder: bool,
}

impl BinLiquidity {
    /// Creates an ordinary bin entry.
    pub fn new(bin_id: i32, amount_x: u64, amount_y: u64) -> Self {
        Self {
            bin_id,
            amount_x,
            amount_y,
            placeholder: false,
        }
    }

    /// Whether the bin holds a positive amount of either token.
    pub fn holds_tokens(&self) -> bool {
        self.amount_x > 0 || self.amount_y > 0
    }

    /// Whether the bin counts as holding liquidity.
    pub fn has_liquidity(&self) -> bool {
        self.placeholder || self.holds_tokens()
    }
}

/// On-chain state of a liquidity position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Position account address.
    pub address: String,
    /// Lowest bin covered.
    pub lower_bin_id: i32,
    /// Highest bin covered.
    pub upper_bin_id: i32,
    /// Raw X amount across all bins.
    pub total_x: u64,
    /// Raw Y amount across all bins.
    pub total_y: u64,
    /// Unclaimed raw X fees.
    pub fee_x: u64,
    /// Unclaimed raw Y fees.
    pub fee_y: u64,
    /// Per-bin breakdown, ordered by bin id.
    pub bins: Vec<BinLiquidity>,
}

impl PositionSnapshot {
    /// Bin range covered by the position.
    pub fn range(&self) -> BinRange {
        BinRange::new(self.lower_bin_id, self.upper_bin_id)
    }

    /// Ids of bins that count as holding liquidity.
    pub fn bins_with_liquidity(&self) -> Vec<i32> {
        self.bins
            .iter()
            .filter(|bin| bin.has_liquidity())
            .map(|bin| bin.bin_id)
            .collect()
    }

    /// Ids of bins holding a positive token amount.
    pub fn bins_holding_tokens(&self) -> Vec<i32> {
        self.bins
            .iter()
            .filter(|bin| bin.holds_tokens())
            .map(|bin| bin.bin_id)
            .collect()
    }

    /// Ids of every bin in the breakdown.
    pub fn all_bins(&self) -> Vec<i32> {
        self.bins.iter().map(|bin| bin.bin_id).collect()
    }

    /// Whether `active_bin` lies strictly inside the position bounds.
    pub fn is_in_range(&self, active_bin: i32) -> bool {
        self.lower_bin_id < active_bin && active_bin < self.upper_bin_id
    }

    /// Whether any fee is waiting to be claimed.
    pub fn has_unclaimed_fees(&self) -> bool {
        self.fee_x > 0 || self.fee_y > 0
    }

    /// Position totals in UI units, X first.
    pub fn ui_totals(&self, bin: &BinSnapshot) -> (Decimal, Decimal) {
        (
            to_ui_amount(self.total_x, bin.decimals_x),
            to_ui_amount(self.total_y, bin.decimals_y),
        )
    }

    /// Unclaimed fees valued in token Y at the active price.
    pub fn unclaimed_fees_in_y(&self, bin: &BinSnapshot) -> Decimal {
        to_ui_amount(self.fee_x, bin.decimals_x) * bin.price_per_token
            + to_ui_amount(self.fee_y, bin.decimals_y)
    }
}

/// Mints of a pool's tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolTokens {
    /// Mint of token X.
    pub mint_x: String,
    /// Mint of token Y.
    pub mint_y: String,
}

/// Raw wallet balances of a pool's tokens, reserves not yet deducted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalances {
    /// Raw X balance.
    pub x: u64,
    /// Raw Y balance.
    pub y: u64,
}

impl WalletBalances {
    /// Balances in UI units, X first.
    pub fn to_ui(&self, bin: &BinSnapshot) -> (Decimal, Decimal) {
        (
            to_ui_amount(self.x, bin.decimals_x),
            to_ui_amount(self.y, bin.decimals_y),
        )
    }
}
