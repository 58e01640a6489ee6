//! Liquidity placement into an empty position.

use super::command::{AddLiquidityCommand, PlacementKind};
use dlmm_lp_domain::pair_config::PairConfig;
use dlmm_lp_domain::sizing::SizedAmounts;
use dlmm_lp_domain::snapshot::{BinRange, BinSnapshot};
use dlmm_lp_domain::state::{PositionState, TokenSide};
use rust_decimal::Decimal;
use tracing::debug;

/// Chooses how sized amounts are deposited around the active bin.
///
/// Returns `None` when the amounts do not justify a deposit.
pub(crate) fn place(
    position: &str,
    bin: &BinSnapshot,
    sized: SizedAmounts,
    pair: &PairConfig,
) -> Option<(AddLiquidityCommand, PositionState)> {
    let active = bin.bin_id;
    let half = pair.half_range();
    let deposit = |amount_x, amount_y, range, kind| AddLiquidityCommand {
        position: position.to_string(),
        amount_x,
        amount_y,
        range,
        strategy: pair.strategy_type,
        kind,
    };

    if sized.amount_x > Decimal::ZERO && sized.amount_y <= pair.min_reserve_y {
        let kind = PlacementKind::OneSided(TokenSide::X);
        return Some((
            deposit(sized.amount_x, Decimal::ZERO, BinRange::above(active, half), kind),
            PositionState::OneSided { side: TokenSide::X },
        ));
    }

    if sized.amount_y > Decimal::ZERO && sized.amount_x <= pair.min_reserve_x {
        let kind = PlacementKind::OneSided(TokenSide::Y);
        return Some((
            deposit(Decimal::ZERO, sized.amount_y, BinRange::below(active, half), kind),
            PositionState::OneSided { side: TokenSide::Y },
        ));
    }

    if sized.amount_x > pair.min_reserve_x && sized.amount_y > pair.min_reserve_y {
        let per_bin_cap = pair.per_bin_cap();
        let amount_x = if sized.amount_x * bin.price_per_token < per_bin_cap {
            Decimal::ZERO
        } else {
            sized.amount_x
        };
        let amount_y = if sized.amount_y < per_bin_cap {
            Decimal::ZERO
        } else {
            sized.amount_y
        };
        if amount_x.is_zero() && amount_y.is_zero() {
            debug!(
                pair = %pair.name,
                per_bin_cap = %per_bin_cap,
                "Both sides below the per-bin cap, skipping placement"
            );
            return None;
        }
        return Some((
            deposit(amount_x, amount_y, BinRange::around(active, half), PlacementKind::Balanced),
            PositionState::Balanced,
        ));
    }

    None
}
