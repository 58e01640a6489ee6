//! Reconciliation state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two tokens of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenSide {
    /// Base token.
    X,
    /// Quote token.
    Y,
}

impl TokenSide {
    /// Returns the other token.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::X => Self::Y,
            Self::Y => Self::X,
        }
    }
}

impl fmt::Display for TokenSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::Y => write!(f, "Y"),
        }
    }
}

/// Why a position is currently composed the way it is.
///
/// The chain knows amounts and range; it does not know whether a one-sided
/// position was placed that way on purpose. This record remembers it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    /// No position exists for the pair.
    #[default]
    NoPosition,
    /// A position exists and holds no liquidity.
    Waiting,
    /// Liquidity was committed with a single token.
    OneSided {
        /// Token the liquidity was committed with.
        side: TokenSide,
    },
    /// Liquidity was committed with both tokens.
    Balanced,
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPosition => write!(f, "no-position"),
            Self::Waiting => write!(f, "waiting"),
            Self::OneSided { side } => write!(f, "one-sided-{side}"),
            Self::Balanced => write!(f, "balanced"),
        }
    }
}
