//! Liquidity sizing.
//!
//! Decides how much of each token may be committed to a position. All
//! amounts are in UI units and the price is Y per X.

use crate::pair_config::PairConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Token amounts that may be committed to a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedAmounts {
    /// Committable X.
    pub amount_x: Decimal,
    /// Committable Y.
    pub amount_y: Decimal,
}

impl SizedAmounts {
    /// Nothing to commit.
    pub const ZERO: Self = Self {
        amount_x: Decimal::ZERO,
        amount_y: Decimal::ZERO,
    };

    /// Creates sized amounts.
    pub fn new(amount_x: Decimal, amount_y: Decimal) -> Self {
        Self { amount_x, amount_y }
    }

    /// Combined value in token Y at `price`.
    pub fn value_in_y(&self, price: Decimal) -> Decimal {
        self.amount_x * price + self.amount_y
    }
}

/// Sizes positions against the pair's reserves and value cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizingCalculator;

impl SizingCalculator {
    /// Computes committable amounts from wallet balances.
    ///
    /// X is preferred: it fills the cap first and Y only tops up the
    /// remainder. The caller must reject non-positive prices before calling.
    pub fn size(
        balance_x: Decimal,
        balance_y: Decimal,
        price: Decimal,
        config: &PairConfig,
    ) -> SizedAmounts {
        let available_x = (balance_x - config.min_reserve_x).max(Decimal::ZERO);
        let available_x_in_y = available_x * price;
        let available_y = (balance_y - config.min_reserve_y).max(Decimal::ZERO);
        let cap = config.max_position_size_in_y;

        if available_x_in_y > cap {
            let amount_x = cap.checked_div(price).unwrap_or(Decimal::ZERO);
            SizedAmounts::new(amount_x, Decimal::ZERO)
        } else if available_x_in_y <= Decimal::ZERO {
            SizedAmounts::new(Decimal::ZERO, available_y.min(cap))
        } else {
            let required = cap - available_x_in_y;
            let amount_x = available_x_in_y
                .checked_div(price)
                .unwrap_or(Decimal::ZERO);
            SizedAmounts::new(amount_x, available_y.min(required))
        }
    }
}
