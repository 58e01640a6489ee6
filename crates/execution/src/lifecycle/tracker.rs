//! Lifecycle tracker for position history.

use super::{EventData, LifecycleEvent, LifecycleEventType};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Summary of a position's lifecycle.
#[derive(Debug, Clone)]
pub struct PositionSummary {
    /// Position address.
    pub position: String,
    /// Pair name.
    pub pair: String,
    /// When the first event of the position was seen.
    pub opened_at: chrono::DateTime<chrono::Utc>,
    /// When position was closed (if closed).
    pub closed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Number of deposits.
    pub add_count: u32,
    /// Number of withdrawals.
    pub remove_count: u32,
    /// Value deposited over the lifetime, in Y.
    pub deposited_in_y: Decimal,
    /// Fees claimed, valued in Y.
    pub fees_in_y: Decimal,
    /// Fees claimed, valued in USD where a price was known.
    pub fees_usd: Decimal,
    /// Whether position is still open.
    pub is_open: bool,
}

impl PositionSummary {
    fn new(pair: &str, position: &str, opened_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            position: position.to_string(),
            pair: pair.to_string(),
            opened_at,
            closed_at: None,
            add_count: 0,
            remove_count: 0,
            deposited_in_y: Decimal::ZERO,
            fees_in_y: Decimal::ZERO,
            fees_usd: Decimal::ZERO,
            is_open: true,
        }
    }
}

/// Closed positions whose history is kept by default.
pub const DEFAULT_CLOSED_HISTORY: usize = 100;

/// Closed positions in closing order, and the totals of those already evicted.
#[derive(Debug, Default)]
struct ClosedHistory {
    order: VecDeque<String>,
    evicted: AggregateStats,
}

/// Tracks lifecycle events for all positions.
///
/// Summaries are created on the first event of a position, so positions
/// opened before the process started are tracked from the moment they are
/// first touched. Only the most recently closed positions keep their events
/// and summary; older ones survive in the aggregate stats.
#[derive(Debug)]
pub struct LifecycleTracker {
    /// Events by position.
    events: Arc<RwLock<HashMap<String, Vec<LifecycleEvent>>>>,
    /// Position summaries.
    summaries: Arc<RwLock<HashMap<String, PositionSummary>>>,
    closed: Arc<RwLock<ClosedHistory>>,
    max_closed: usize,
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::with_closed_history(DEFAULT_CLOSED_HISTORY)
    }
}

impl LifecycleTracker {
    /// Creates a new lifecycle tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracker keeping the history of the last `max_closed` closed
    /// positions.
    #[must_use]
    pub fn with_closed_history(max_closed: usize) -> Self {
        Self {
            events: Arc::default(),
            summaries: Arc::default(),
            closed: Arc::default(),
            max_closed,
        }
    }

    /// Records an event and folds it into the position summary.
    pub async fn record(&self, event: LifecycleEvent) {
        {
            let mut summaries = self.summaries.write().await;
            let summary = summaries
                .entry(event.position.clone())
                .or_insert_with(|| PositionSummary::new(&event.pair, &event.position, event.timestamp));

            match &event.data {
                EventData::PositionCreated(data) => {
                    info!(
                        pair = %event.pair,
                        position = %event.position,
                        lower = data.lower_bin_id,
                        upper = data.upper_bin_id,
                        "Position created"
                    );
                }
                EventData::LiquidityAdded(data) => {
                    summary.add_count += 1;
                    summary.deposited_in_y += data.value_in_y;
                    info!(
                        pair = %event.pair,
                        position = %event.position,
                        kind = %data.kind,
                        amount_x = %data.amount_x,
                        amount_y = %data.amount_y,
                        "Liquidity added"
                    );
                }
                EventData::LiquidityRemoved(data) => {
                    summary.remove_count += 1;
                    debug!(
                        pair = %event.pair,
                        position = %event.position,
                        bins = data.bin_count,
                        closed = data.closed,
                        "Liquidity removed"
                    );
                }
                EventData::FeesClaimed(data) => {
                    summary.fees_in_y += data.value_in_y;
                    if let Some(usd) = data.value_usd {
                        summary.fees_usd += usd;
                    }
                    info!(
                        pair = %event.pair,
                        position = %event.position,
                        fee_x = data.fee_x,
                        fee_y = data.fee_y,
                        value_in_y = %data.value_in_y,
                        "Fees claimed"
                    );
                }
                EventData::PositionClosed(data) => {
                    summary.closed_at = Some(event.timestamp);
                    summary.is_open = false;
                    info!(
                        pair = %event.pair,
                        position = %event.position,
                        reason = ?data.reason,
                        adds = summary.add_count,
                        fees_in_y = %summary.fees_in_y,
                        "Position closed"
                    );
                }
            }
        }

        let closed = matches!(event.data, EventData::PositionClosed(_));
        let position = event.position.clone();
        self.events
            .write()
            .await
            .entry(event.position.clone())
            .or_default()
            .push(event);
        if closed {
            self.retire(position).await;
        }
    }

    /// Queues a closed position and evicts the oldest beyond the limit.
    async fn retire(&self, position: String) {
        let mut summaries = self.summaries.write().await;
        let mut events = self.events.write().await;
        let mut closed = self.closed.write().await;

        if !closed.order.contains(&position) {
            closed.order.push_back(position);
        }
        while closed.order.len() > self.max_closed {
            let Some(oldest) = closed.order.pop_front() else {
                break;
            };
            events.remove(&oldest);
            if let Some(summary) = summaries.remove(&oldest) {
                closed.evicted.add(&summary);
            }
            debug!(position = %oldest, "Evicted closed position history");
        }
    }

    /// Gets all events for a position.
    pub async fn get_events(&self, position: &str) -> Vec<LifecycleEvent> {
        self.events
            .read()
            .await
            .get(position)
            .cloned()
            .unwrap_or_default()
    }

    /// Event types of a position, in order.
    pub async fn event_types(&self, position: &str) -> Vec<LifecycleEventType> {
        self.events
            .read()
            .await
            .get(position)
            .map(|events| events.iter().map(|event| event.event_type).collect())
            .unwrap_or_default()
    }

    /// Gets the summary for a position.
    pub async fn get_summary(&self, position: &str) -> Option<PositionSummary> {
        self.summaries.read().await.get(position).cloned()
    }

    /// Gets summaries for open positions only.
    pub async fn get_open_positions(&self) -> Vec<PositionSummary> {
        self.summaries
            .read()
            .await
            .values()
            .filter(|s| s.is_open)
            .cloned()
            .collect()
    }

    /// Gets aggregate statistics.
    pub async fn get_aggregate_stats(&self) -> AggregateStats {
        let summaries = self.summaries.read().await;
        let mut stats = self.closed.read().await.evicted.clone();
        for summary in summaries.values() {
            stats.add(summary);
        }
        stats
    }
}

/// Aggregate statistics across all positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateStats {
    /// Total positions tracked.
    pub total_positions: u32,
    /// Currently open positions.
    pub open_positions: u32,
    /// Closed positions.
    pub closed_positions: u32,
    /// Deposits performed.
    pub total_adds: u32,
    /// Withdrawals performed.
    pub total_removes: u32,
    /// Value deposited, in Y.
    pub total_deposited_in_y: Decimal,
    /// Fees claimed, in Y.
    pub total_fees_in_y: Decimal,
    /// Fees claimed, in USD.
    pub total_fees_usd: Decimal,
}

impl AggregateStats {
    fn add(&mut self, summary: &PositionSummary) {
        self.total_positions += 1;
        if summary.is_open {
            self.open_positions += 1;
        } else {
            self.closed_positions += 1;
        }
        self.total_adds += summary.add_count;
        self.total_removes += summary.remove_count;
        self.total_deposited_in_y += summary.deposited_in_y;
        self.total_fees_in_y += summary.fees_in_y;
        self.total_fees_usd += summary.fees_usd;
    }
}
