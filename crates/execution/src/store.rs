//! In-memory position state records.

use dlmm_lp_domain::state::PositionState;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Concurrency-safe map from position address to [`PositionState`].
///
/// Records are tagged with the pair that owns them so stale entries of a
/// closed position can be dropped once the pair no longer reports it.
#[derive(Debug, Clone, Default)]
pub struct PositionStateStore {
    records: Arc<RwLock<HashMap<String, (String, PositionState)>>>,
}

impl PositionStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded state of a position.
    pub async fn get(&self, position: &str) -> Option<PositionState> {
        self.records
            .read()
            .await
            .get(position)
            .map(|(_, state)| *state)
    }

    /// State to reconcile against.
    ///
    /// No position means [`PositionState::NoPosition`]; a live position
    /// without a record is treated as [`PositionState::Waiting`].
    pub async fn resolve(&self, position: Option<&str>) -> PositionState {
        match position {
            None => PositionState::NoPosition,
            Some(address) => self.get(address).await.unwrap_or(PositionState::Waiting),
        }
    }

    /// Records `state` for a position; [`PositionState::NoPosition`] deletes the record.
    pub async fn apply(&self, pair: &str, position: &str, state: PositionState) {
        let mut records = self.records.write().await;
        if state == PositionState::NoPosition {
            records.remove(position);
            debug!(pair = pair, position = position, "State record deleted");
        } else {
            records.insert(position.to_string(), (pair.to_string(), state));
            debug!(pair = pair, position = position, state = %state, "State recorded");
        }
    }

    /// Drops records of `pair` that do not belong to `live`.
    pub async fn prune(&self, pair: &str, live: Option<&str>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|position, (owner, _)| owner.as_str() != pair || Some(position.as_str()) == live);
        before - records.len()
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no record.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Copy of every record, keyed by position.
    pub async fn snapshot(&self) -> HashMap<String, PositionState> {
        self.records
            .read()
            .await
            .iter()
            .map(|(position, (_, state))| (position.clone(), *state))
            .collect()
    }
}
