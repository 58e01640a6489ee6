use dlmm_lp_domain::pair_config::StrategyType;
use dlmm_lp_domain::snapshot::BinRange;
use serde::{Deserialize, Serialize};

/// Basis points meaning "everything".
pub const FULL_BPS: u16 = 10_000;

/// Confirmation of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction signature.
    pub signature: String,
    /// Position created by the transaction, if any.
    pub position: Option<String>,
}

impl Receipt {
    /// Creates a receipt for a transaction.
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            position: None,
        }
    }

    /// Attaches the created position.
    #[must_use]
    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }
}

/// Raw token amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityAmounts {
    /// Raw X amount.
    pub amount_x: u64,
    /// Raw Y amount.
    pub amount_y: u64,
}

impl LiquidityAmounts {
    /// Whether both amounts are zero.
    pub fn is_empty(&self) -> bool {
        self.amount_x == 0 && self.amount_y == 0
    }
}

/// Parameters for adding liquidity to a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityParams {
    /// Position address.
    pub position: String,
    /// Amounts to deposit.
    pub amounts: LiquidityAmounts,
    /// Bins to spread the amounts over.
    pub range: BinRange,
    /// Distribution shape.
    pub strategy: StrategyType,
}

/// Parameters for removing liquidity from a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityParams {
    /// Position address.
    pub position: String,
    /// Bins to withdraw from.
    pub bin_ids: Vec<i32>,
    /// Share to withdraw from each bin, in basis points.
    pub bps: u16,
    /// Claim fees and close the position afterwards.
    pub close_after: bool,
}
