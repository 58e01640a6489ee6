//! Liquidity commands emitted by the reconciler.

use dlmm_lp_domain::pair_config::StrategyType;
use dlmm_lp_domain::snapshot::BinRange;
use dlmm_lp_domain::state::{PositionState, TokenSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How liquidity is being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementKind {
    /// A single token on its own side of the active bin.
    OneSided(TokenSide),
    /// Both tokens centred on the active bin.
    Balanced,
    /// Position totals re-deposited around the active bin after the market flipped them.
    Imbalanced,
}

impl fmt::Display for PlacementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneSided(side) => write!(f, "one-sided-{side}"),
            Self::Balanced => write!(f, "balanced"),
            Self::Imbalanced => write!(f, "imbalanced"),
        }
    }
}

/// Deposit into an existing position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityCommand {
    /// Position address.
    pub position: String,
    /// X to deposit, UI units.
    pub amount_x: Decimal,
    /// Y to deposit, UI units.
    pub amount_y: Decimal,
    /// Bins receiving the deposit.
    pub range: BinRange,
    /// Shape forwarded to the pool.
    pub strategy: StrategyType,
    /// Placement that produced the deposit.
    pub kind: PlacementKind,
}

/// A side effect requested by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidityCommand {
    /// Open a position without liquidity.
    CreateEmptyPosition {
        /// Bins covered by the new position.
        range: BinRange,
    },
    /// Deposit liquidity.
    AddLiquidity(AddLiquidityCommand),
    /// Withdraw all liquidity from the listed bins.
    RemoveLiquidity {
        /// Position address.
        position: String,
        /// Bins to withdraw from.
        bin_ids: Vec<i32>,
        /// Claim fees and close the position in the same transaction.
        close_position: bool,
    },
    /// Claim unclaimed fees.
    ClaimFees {
        /// Position address.
        position: String,
        /// Raw X fees at decision time.
        fee_x: u64,
        /// Raw Y fees at decision time.
        fee_y: u64,
    },
    /// Close an empty position.
    ClosePosition {
        /// Position address.
        position: String,
    },
}

impl LiquidityCommand {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateEmptyPosition { .. } => "create_empty_position",
            Self::AddLiquidity(_) => "add_liquidity",
            Self::RemoveLiquidity { .. } => "remove_liquidity",
            Self::ClaimFees { .. } => "claim_fees",
            Self::ClosePosition { .. } => "close_position",
        }
    }

    /// Position the command acts on, if it already exists.
    pub fn position(&self) -> Option<&str> {
        match self {
            Self::CreateEmptyPosition { .. } => None,
            Self::AddLiquidity(add) => Some(&add.position),
            Self::RemoveLiquidity { position, .. }
            | Self::ClaimFees { position, .. }
            | Self::ClosePosition { position } => Some(position),
        }
    }
}

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionReason {
    /// The pair has no position.
    NoPosition,
    /// A one-sided position was flipped by the market.
    ImbalanceCorrection,
    /// Liquidity sits in range but away from the active bin.
    InactiveLiquidity,
    /// The active bin left a position that holds liquidity.
    OutOfRange,
    /// The active bin left an empty position.
    OutOfRangeEmpty,
    /// Liquidity is being placed into an empty position.
    Placement(PlacementKind),
    /// Nothing to do.
    Idle,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPosition => write!(f, "no position"),
            Self::ImbalanceCorrection => write!(f, "imbalance correction"),
            Self::InactiveLiquidity => write!(f, "no liquidity near active bin"),
            Self::OutOfRange => write!(f, "out of range"),
            Self::OutOfRangeEmpty => write!(f, "out of range and empty"),
            Self::Placement(kind) => write!(f, "{kind} placement"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

/// Output of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Commands to run, in order.
    pub commands: Vec<LiquidityCommand>,
    /// State to record once every command succeeded.
    pub next_state: PositionState,
    /// Rule that fired.
    pub reason: DecisionReason,
}

impl Decision {
    /// A decision with no side effects that keeps `state`.
    pub fn idle(state: PositionState) -> Self {
        Self {
            commands: Vec::new(),
            next_state: state,
            reason: DecisionReason::Idle,
        }
    }

    /// Whether the decision requests no command.
    pub fn is_noop(&self) -> bool {
        self.commands.is_empty()
    }
}
