//! Shared dashboard snapshot with stale-fetch protection.
//!
//! Every window-selection event claims a fresh generation before its fetch
//! starts. When two fetches overlap, only the one holding the current
//! generation may publish its snapshot; the loser is dropped. That gives the
//! at-most-one-result-per-selection guarantee the page relies on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::aggregate::AggregateResult;

/// One published dashboard state: the aggregate plus the raw documents the
/// presentation layer's detail view renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSnapshot {
    pub window_days: u32,
    pub generation: u64,
    pub fetched_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: AggregateResult,
    pub docs: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct DashboardState {
    generation: AtomicU64,
    latest: RwLock<Option<Arc<WindowSnapshot>>>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a new generation for a window-selection event. Any fetch still
    /// in flight for an earlier generation will be discarded on completion.
    pub fn begin_refresh(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Publishes a completed fetch. Returns false when a newer selection has
    /// superseded this snapshot's generation; the snapshot is dropped then.
    pub fn apply(&self, snapshot: WindowSnapshot) -> bool {
        let mut latest = self.latest.write();
        let current = self.generation.load(Ordering::SeqCst);
        if snapshot.generation != current {
            warn!(
                stale = snapshot.generation,
                current, "discarding stale fetch result"
            );
            return false;
        }
        *latest = Some(Arc::new(snapshot));
        true
    }

    pub fn latest(&self) -> Option<Arc<WindowSnapshot>> {
        self.latest.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, AggregateOptions};

    fn snapshot(days: u32, generation: u64) -> WindowSnapshot {
        let result = aggregate(&[], days, AggregateOptions::default()).unwrap();
        WindowSnapshot {
            window_days: days,
            generation,
            fetched_at: Utc::now(),
            result,
            docs: Vec::new(),
        }
    }

    #[test]
    fn applies_the_current_generation() {
        let state = DashboardState::new();
        let generation = state.begin_refresh();
        assert!(state.apply(snapshot(30, generation)));
        assert_eq!(state.latest().unwrap().window_days, 30);
    }

    #[test]
    fn discards_a_superseded_fetch() {
        let state = DashboardState::new();
        let first = state.begin_refresh();
        let second = state.begin_refresh();

        // The older fetch finishes last; its result must not be published.
        assert!(state.apply(snapshot(5, second)));
        assert!(!state.apply(snapshot(30, first)));

        let latest = state.latest().unwrap();
        assert_eq!(latest.window_days, 5);
        assert_eq!(latest.generation, second);
    }

    #[test]
    fn no_snapshot_before_the_first_apply() {
        let state = DashboardState::new();
        state.begin_refresh();
        assert!(state.latest().is_none());
    }
}
