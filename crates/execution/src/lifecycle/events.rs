//! Lifecycle events for position tracking.

use crate::reconciler::PlacementKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Type of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEventType {
    /// Empty position was created.
    PositionCreated,
    /// Liquidity was deposited.
    LiquidityAdded,
    /// Liquidity was withdrawn.
    LiquidityRemoved,
    /// Fees were claimed.
    FeesClaimed,
    /// Position was closed.
    PositionClosed,
}

/// A lifecycle event for a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Event ID.
    pub id: String,
    /// Event type.
    pub event_type: LifecycleEventType,
    /// Pair name.
    pub pair: String,
    /// Position address.
    pub position: String,
    /// Transaction signature.
    pub signature: Option<String>,
    /// Timestamp.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Event-specific data.
    pub data: EventData,
}

impl LifecycleEvent {
    /// Creates a new lifecycle event.
    pub fn new(pair: &str, position: &str, data: EventData) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: data.event_type(),
            pair: pair.to_string(),
            position: position.to_string(),
            signature: None,
            timestamp: chrono::Utc::now(),
            data,
        }
    }

    /// Sets the transaction signature.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

/// Event-specific data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventData {
    /// Position created data.
    PositionCreated(PositionCreatedData),
    /// Liquidity added data.
    LiquidityAdded(LiquidityAddedData),
    /// Liquidity removed data.
    LiquidityRemoved(LiquidityRemovedData),
    /// Fees claimed data.
    FeesClaimed(FeesClaimedData),
    /// Position closed data.
    PositionClosed(PositionClosedData),
}

impl EventData {
    /// Event type carried by the data.
    pub fn event_type(&self) -> LifecycleEventType {
        match self {
            Self::PositionCreated(_) => LifecycleEventType::PositionCreated,
            Self::LiquidityAdded(_) => LifecycleEventType::LiquidityAdded,
            Self::LiquidityRemoved(_) => LifecycleEventType::LiquidityRemoved,
            Self::FeesClaimed(_) => LifecycleEventType::FeesClaimed,
            Self::PositionClosed(_) => LifecycleEventType::PositionClosed,
        }
    }
}

/// Data for position created event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionCreatedData {
    /// Lowest bin of the position.
    pub lower_bin_id: i32,
    /// Highest bin of the position.
    pub upper_bin_id: i32,
    /// Active bin at creation.
    pub active_bin_id: i32,
    /// Price at creation, Y per X.
    pub price: Decimal,
}

/// Data for liquidity added event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityAddedData {
    /// X deposited, UI units.
    pub amount_x: Decimal,
    /// Y deposited, UI units.
    pub amount_y: Decimal,
    /// Lowest bin receiving liquidity.
    pub lower_bin_id: i32,
    /// Highest bin receiving liquidity.
    pub upper_bin_id: i32,
    /// Placement that produced the deposit.
    pub kind: PlacementKind,
    /// Deposit value in Y at the active price.
    pub value_in_y: Decimal,
}

/// Data for liquidity removed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityRemovedData {
    /// Number of bins withdrawn from.
    pub bin_count: usize,
    /// Whether the position was closed in the same transaction.
    pub closed: bool,
}

/// Data for fees claimed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeesClaimedData {
    /// Raw X fees claimed.
    pub fee_x: u64,
    /// Raw Y fees claimed.
    pub fee_y: u64,
    /// Fees valued in Y at the active price.
    pub value_in_y: Decimal,
    /// Fees valued in USD, when a price was available.
    pub value_usd: Option<Decimal>,
}

/// Data for position closed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedData {
    /// Reason for closing.
    pub reason: CloseReason,
    /// Active bin at close.
    pub active_bin_id: i32,
}

/// Reason for closing a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// Liquidity was withdrawn and the position closed in one transaction.
    Withdrawn,
    /// The empty position drifted out of range.
    OutOfRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_event_creation() {
        let event = LifecycleEvent::new(
            "SOL-USDC",
            "position",
            EventData::PositionCreated(PositionCreatedData {
                lower_bin_id: -34,
                upper_bin_id: 34,
                active_bin_id: 0,
                price: Decimal::new(150, 0),
            }),
        );

        assert_eq!(event.event_type, LifecycleEventType::PositionCreated);
        assert!(event.signature.is_none());
        assert_eq!(event.with_signature("sig").signature.as_deref(), Some("sig"));
    }
}
