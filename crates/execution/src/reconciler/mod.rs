//! Per-pair position state machine.
//!
//! The reconciler looks at one snapshot of a pair (positions, active bin,
//! sized wallet amounts and the recorded [`PositionState`]) and returns a
//! [`Decision`]: the commands to run and the state to record if they all
//! succeed. It performs no I/O, so re-running it on an unchanged snapshot is
//! always safe.
//!
//! Rules are evaluated in order and the first one that applies wins:
//! 1. no position: open an empty one around the active bin
//! 2. a one-sided position the market flipped: re-deposit both tokens
//! 3. liquidity in range but not near the active bin: withdraw it
//! 4. out of range with liquidity: withdraw everything and close
//! 5. out of range and empty: claim fees, then close
//! 6. empty position: place sized liquidity

mod command;
mod placement;

pub use command::{AddLiquidityCommand, Decision, DecisionReason, LiquidityCommand, PlacementKind};

use dlmm_lp_domain::pair_config::PairConfig;
use dlmm_lp_domain::sizing::SizedAmounts;
use dlmm_lp_domain::snapshot::{BinRange, BinSnapshot, PositionSnapshot};
use dlmm_lp_domain::state::{PositionState, TokenSide};
use tracing::{debug, warn};

/// Width, in bins, of a freshly created empty position.
pub const DEFAULT_EMPTY_POSITION_WIDTH: u32 = 68;

/// Reconciler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Width of a freshly created empty position.
    pub empty_position_width: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            empty_position_width: DEFAULT_EMPTY_POSITION_WIDTH,
        }
    }
}

/// Snapshot of a pair handed to the reconciler.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a> {
    /// Pair configuration.
    pub pair: &'a PairConfig,
    /// Positions the owner holds in the pool.
    pub positions: &'a [PositionSnapshot],
    /// Active bin of the pool.
    pub active_bin: &'a BinSnapshot,
    /// Committable wallet amounts.
    pub sized: SizedAmounts,
    /// Recorded state of the first position.
    pub state: PositionState,
}

/// Decides the corrective commands for a pair.
#[derive(Debug, Clone, Default)]
pub struct PositionReconciler {
    config: ReconcilerConfig,
}

impl PositionReconciler {
    /// Creates a reconciler.
    pub fn new(config: ReconcilerConfig) -> Self {
        Self { config }
    }

    /// Reconciler settings.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Evaluates the rules against a snapshot.
    pub fn decide(&self, input: &ReconcileInput<'_>) -> Decision {
        let pair = input.pair;
        let active = input.active_bin.bin_id;

        let Some(position) = input.positions.first() else {
            let half_width = (self.config.empty_position_width / 2) as i32;
            return Decision {
                commands: vec![LiquidityCommand::CreateEmptyPosition {
                    range: BinRange::around(active, half_width),
                }],
                next_state: PositionState::Waiting,
                reason: DecisionReason::NoPosition,
            };
        };
        if input.positions.len() > 1 {
            warn!(
                pair = %pair.name,
                count = input.positions.len(),
                position = %position.address,
                "Several positions found, reconciling the first one only"
            );
        }

        let with_liquidity = position.bins_with_liquidity();
        let has_liquidity = !with_liquidity.is_empty();
        let in_range = position.is_in_range(active);
        let has_active_liquidity = (active - 1..=active + 1).any(|bin| with_liquidity.contains(&bin));

        debug!(
            pair = %pair.name,
            position = %position.address,
            state = %input.state,
            active_bin = active,
            lower = position.lower_bin_id,
            upper = position.upper_bin_id,
            bins_with_liquidity = with_liquidity.len(),
            in_range = in_range,
            has_active_liquidity = has_active_liquidity,
            "Evaluating position"
        );

        if let PositionState::OneSided { side } = input.state
            && pair.balance_out_position
            && has_liquidity
            && self.is_flipped(position, input.active_bin, side)
        {
            return self.rebalance(position, input.active_bin, pair);
        }

        if has_liquidity && in_range && !has_active_liquidity {
            return Decision {
                commands: vec![LiquidityCommand::RemoveLiquidity {
                    position: position.address.clone(),
                    bin_ids: position.bins_holding_tokens(),
                    close_position: false,
                }],
                next_state: PositionState::Waiting,
                reason: DecisionReason::InactiveLiquidity,
            };
        }

        if !in_range && has_liquidity {
            return Decision {
                commands: vec![LiquidityCommand::RemoveLiquidity {
                    position: position.address.clone(),
                    bin_ids: position.all_bins(),
                    close_position: true,
                }],
                next_state: PositionState::Waiting,
                reason: DecisionReason::OutOfRange,
            };
        }

        if !in_range {
            let mut commands = Vec::with_capacity(2);
            if position.has_unclaimed_fees() {
                commands.push(LiquidityCommand::ClaimFees {
                    position: position.address.clone(),
                    fee_x: position.fee_x,
                    fee_y: position.fee_y,
                });
            }
            commands.push(LiquidityCommand::ClosePosition {
                position: position.address.clone(),
            });
            return Decision {
                commands,
                next_state: PositionState::NoPosition,
                reason: DecisionReason::OutOfRangeEmpty,
            };
        }

        if !has_liquidity
            && let Some((add, next_state)) =
                placement::place(&position.address, input.active_bin, input.sized, pair)
        {
            let reason = DecisionReason::Placement(add.kind);
            return Decision {
                commands: vec![LiquidityCommand::AddLiquidity(add)],
                next_state,
                reason,
            };
        }

        Decision::idle(input.state)
    }

    /// Whether the token a one-sided position was not built with now outweighs the one it was.
    fn is_flipped(&self, position: &PositionSnapshot, bin: &BinSnapshot, side: TokenSide) -> bool {
        let (total_x, total_y) = position.ui_totals(bin);
        let value_x = total_x * bin.price_per_token;
        match side {
            TokenSide::X => total_y > value_x,
            TokenSide::Y => value_x > total_y,
        }
    }

    fn rebalance(&self, position: &PositionSnapshot, bin: &BinSnapshot, pair: &PairConfig) -> Decision {
        let (total_x, total_y) = position.ui_totals(bin);
        let half_width = pair.half_range() / 2;
        Decision {
            commands: vec![
                LiquidityCommand::RemoveLiquidity {
                    position: position.address.clone(),
                    bin_ids: position.bins_holding_tokens(),
                    close_position: false,
                },
                LiquidityCommand::AddLiquidity(AddLiquidityCommand {
                    position: position.address.clone(),
                    amount_x: total_x,
                    amount_y: total_y,
                    range: BinRange::around(bin.bin_id, half_width),
                    strategy: pair.strategy_type,
                    kind: PlacementKind::Imbalanced,
                }),
            ],
            next_state: PositionState::Balanced,
            reason: DecisionReason::ImbalanceCorrection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlmm_lp_domain::pair_config::StrategyType;
    use dlmm_lp_domain::snapshot::BinLiquidity;
    use rust_decimal_macros::dec;

    fn pair() -> PairConfig {
        PairConfig {
            name: "SOL-USDC".to_string(),
            pool_address: "pool".to_string(),
            min_reserve_x: dec!(2),
            min_reserve_y: dec!(200),
            bin_step: 10,
            max_position_size_in_y: dec!(500),
            total_range_interval: 8,
            strategy_type: StrategyType::Spot,
            balance_out_position: true,
        }
    }

    fn bin(bin_id: i32, price: rust_decimal::Decimal) -> BinSnapshot {
        BinSnapshot {
            bin_id,
            price_per_token: price,
            decimals_x: 9,
            decimals_y: 6,
        }
    }

    fn position(lower: i32, upper: i32, bins: Vec<BinLiquidity>) -> PositionSnapshot {
        PositionSnapshot {
            address: "position".to_string(),
            lower_bin_id: lower,
            upper_bin_id: upper,
            total_x: bins.iter().map(|bin| bin.amount_x).sum(),
            total_y: bins.iter().map(|bin| bin.amount_y).sum(),
            fee_x: 0,
            fee_y: 0,
            bins,
        }
    }

    fn empty_bins(lower: i32, upper: i32) -> Vec<BinLiquidity> {
        (lower..=upper).map(|id| BinLiquidity::new(id, 0, 0)).collect()
    }

    fn decide(
        positions: &[PositionSnapshot],
        active: &BinSnapshot,
        sized: SizedAmounts,
        state: PositionState,
        pair: &PairConfig,
    ) -> Decision {
        PositionReconciler::default().decide(&ReconcileInput {
            pair,
            positions,
            active_bin: active,
            sized,
            state,
        })
    }

    #[test]
    fn test_creates_empty_position_when_none_exists() {
        let decision = decide(
            &[],
            &bin(1000, dec!(150)),
            SizedAmounts::ZERO,
            PositionState::NoPosition,
            &pair(),
        );
        assert_eq!(
            decision.commands,
            vec![LiquidityCommand::CreateEmptyPosition {
                range: BinRange::new(966, 1034)
            }]
        );
        assert_eq!(decision.next_state, PositionState::Waiting);
        assert_eq!(decision.reason, DecisionReason::NoPosition);
    }

    #[test]
    fn test_claims_and_closes_empty_out_of_range_position() {
        let mut position = position(10, 20, empty_bins(10, 20));
        position.fee_x = 5;

        let decision = decide(
            &[position],
            &bin(25, dec!(150)),
            SizedAmounts::ZERO,
            PositionState::Waiting,
            &pair(),
        );

        assert_eq!(
            decision.commands,
            vec![
                LiquidityCommand::ClaimFees {
                    position: "position".to_string(),
                    fee_x: 5,
                    fee_y: 0,
                },
                LiquidityCommand::ClosePosition {
                    position: "position".to_string()
                },
            ]
        );
        assert_eq!(decision.next_state, PositionState::NoPosition);
    }

    #[test]
    fn test_closes_without_claim_when_no_fees() {
        let decision = decide(
            &[position(10, 20, empty_bins(10, 20))],
            &bin(20, dec!(150)),
            SizedAmounts::ZERO,
            PositionState::Waiting,
            &pair(),
        );
        assert_eq!(decision.commands.len(), 1);
        assert_eq!(decision.commands[0].name(), "close_position");
        assert_eq!(decision.reason, DecisionReason::OutOfRangeEmpty);
    }

    #[test]
    fn test_rebalances_flipped_one_sided_position() {
        // X worth 0.5 * 200 = 100 Y against 150 Y.
        let mut bins = empty_bins(90, 110);
        bins[10] = BinLiquidity::new(100, 500_000_000, 0);
        bins[9] = BinLiquidity::new(99, 0, 150_000_000);
        let position = position(90, 110, bins);

        let decision = decide(
            &[position],
            &bin(100, dec!(200)),
            SizedAmounts::ZERO,
            PositionState::OneSided { side: TokenSide::X },
            &pair(),
        );

        assert_eq!(decision.reason, DecisionReason::ImbalanceCorrection);
        assert_eq!(decision.next_state, PositionState::Balanced);
        assert_eq!(
            decision.commands[0],
            LiquidityCommand::RemoveLiquidity {
                position: "position".to_string(),
                bin_ids: vec![99, 100],
                close_position: false,
            }
        );
        let LiquidityCommand::AddLiquidity(add) = &decision.commands[1] else {
            panic!("expected an add");
        };
        assert_eq!(add.kind, PlacementKind::Imbalanced);
        assert_eq!(add.amount_x, dec!(0.5));
        assert_eq!(add.amount_y, dec!(150));
        assert_eq!(add.range, BinRange::new(98, 102));
    }

    #[test]
    fn test_one_sided_position_not_flipped_is_left_alone() {
        let mut bins = empty_bins(90, 110);
        bins[10] = BinLiquidity::new(100, 1_000_000_000, 0);
        bins[9] = BinLiquidity::new(99, 0, 150_000_000);
        let decision = decide(
            &[position(90, 110, bins)],
            &bin(100, dec!(200)),
            SizedAmounts::ZERO,
            PositionState::OneSided { side: TokenSide::X },
            &pair(),
        );
        assert!(decision.is_noop());
        assert_eq!(decision.next_state, PositionState::OneSided { side: TokenSide::X });
    }

    #[test]
    fn test_imbalance_ignored_when_balancing_disabled() {
        let mut bins = empty_bins(90, 110);
        bins[10] = BinLiquidity::new(100, 500_000_000, 0);
        bins[9] = BinLiquidity::new(99, 0, 150_000_000);
        let pair = PairConfig {
            balance_out_position: false,
            ..pair()
        };
        let decision = decide(
            &[position(90, 110, bins)],
            &bin(100, dec!(200)),
            SizedAmounts::ZERO,
            PositionState::OneSided { side: TokenSide::X },
            &pair,
        );
        assert!(decision.is_noop());
    }

    #[test]
    fn test_withdraws_liquidity_away_from_active_bin() {
        let mut bins = empty_bins(90, 110);
        bins[15] = BinLiquidity::new(105, 0, 7);
        let decision = decide(
            &[position(90, 110, bins)],
            &bin(100, dec!(150)),
            SizedAmounts::ZERO,
            PositionState::OneSided { side: TokenSide::Y },
            &pair(),
        );
        assert_eq!(
            decision.commands,
            vec![LiquidityCommand::RemoveLiquidity {
                position: "position".to_string(),
                bin_ids: vec![105],
                close_position: false,
            }]
        );
        assert_eq!(decision.next_state, PositionState::Waiting);
        assert_eq!(decision.reason, DecisionReason::InactiveLiquidity);
    }

    #[test]
    fn test_liquidity_next_to_active_bin_counts_as_active() {
        let mut bins = empty_bins(90, 110);
        bins[11] = BinLiquidity::new(101, 9, 0);
        let decision = decide(
            &[position(90, 110, bins)],
            &bin(100, dec!(150)),
            SizedAmounts::new(dec!(3), dec!(0)),
            PositionState::Balanced,
            &pair(),
        );
        assert!(decision.is_noop());
    }

    #[test]
    fn test_out_of_range_with_liquidity_closes() {
        let mut bins = empty_bins(90, 110);
        bins[0] = BinLiquidity::new(90, 0, 100);
        let decision = decide(
            &[position(90, 110, bins)],
            &bin(80, dec!(150)),
            SizedAmounts::ZERO,
            PositionState::Balanced,
            &pair(),
        );
        let LiquidityCommand::RemoveLiquidity {
            bin_ids,
            close_position,
            ..
        } = &decision.commands[0]
        else {
            panic!("expected a removal");
        };
        assert!(*close_position);
        assert_eq!(bin_ids.len(), 21);
        assert_eq!(decision.reason, DecisionReason::OutOfRange);
    }

    #[test]
    fn test_placeholder_bin_counts_as_liquidity() {
        let mut bins = empty_bins(90, 110);
        bins[0].placeholder = true;
        let decision = decide(
            &[position(90, 110, bins)],
            &bin(100, dec!(150)),
            SizedAmounts::new(dec!(3), dec!(0)),
            PositionState::Waiting,
            &pair(),
        );
        assert_eq!(decision.reason, DecisionReason::InactiveLiquidity);
        // Placeholder bins hold no tokens, so the withdrawal names no bin.
        assert_eq!(
            decision.commands,
            vec![LiquidityCommand::RemoveLiquidity {
                position: "position".to_string(),
                bin_ids: vec![],
                close_position: false,
            }]
        );
        assert_eq!(decision.next_state, PositionState::Waiting);
    }

    #[test]
    fn test_places_liquidity_into_empty_position() {
        let decision = decide(
            &[position(66, 134, empty_bins(66, 134))],
            &bin(100, dec!(150)),
            SizedAmounts::new(dec!(0), dec!(300)),
            PositionState::Waiting,
            &pair(),
        );
        let LiquidityCommand::AddLiquidity(add) = &decision.commands[0] else {
            panic!("expected an add");
        };
        assert_eq!(add.range, BinRange::new(96, 100));
        assert_eq!(decision.next_state, PositionState::OneSided { side: TokenSide::Y });
        assert_eq!(
            decision.reason,
            DecisionReason::Placement(PlacementKind::OneSided(TokenSide::Y))
        );
    }

    #[test]
    fn test_unchanged_snapshot_is_idle() {
        let decision = decide(
            &[position(66, 134, empty_bins(66, 134))],
            &bin(100, dec!(150)),
            SizedAmounts::ZERO,
            PositionState::Waiting,
            &pair(),
        );
        assert_eq!(decision, Decision::idle(PositionState::Waiting));
    }

    #[test]
    fn test_reconciles_first_of_several_positions() {
        let mut second = position(66, 134, empty_bins(66, 134));
        second.address = "second".to_string();
        let first = position(10, 20, empty_bins(10, 20));
        let decision = decide(
            &[first, second],
            &bin(100, dec!(150)),
            SizedAmounts::ZERO,
            PositionState::Waiting,
            &pair(),
        );
        assert_eq!(decision.commands[0].position(), Some("position"));
    }
}
