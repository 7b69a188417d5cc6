//! Snapshot store contract.
//!
//! The core never reads or writes snapshots itself; projections built on
//! top of the store use this to skip replaying full history. Only the
//! contract and the in-memory reference live here.

use crate::error::Result;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Keyed snapshot storage. Snapshots are opaque to the core.
pub trait SnapshotStore: Send + Sync {
    fn save_snapshot(&self, entity_key: &str, snapshot: Value) -> Result<()>;

    fn latest_snapshot(&self, entity_key: &str) -> Result<Option<Value>>;
}

/// Reference implementation: a map, latest write wins.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<String, Value>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn save_snapshot(&self, entity_key: &str, snapshot: Value) -> Result<()> {
        self.snapshots
            .write()
            .insert(entity_key.to_string(), snapshot);
        Ok(())
    }

    fn latest_snapshot(&self, entity_key: &str) -> Result<Option<Value>> {
        Ok(self.snapshots.read().get(entity_key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latest_write_wins() {
        let store = InMemorySnapshotStore::new();
        assert_eq!(store.latest_snapshot("page-1").unwrap(), None);

        store
            .save_snapshot("page-1", json!({"visits": 1}))
            .unwrap();
        store
            .save_snapshot("page-1", json!({"visits": 2}))
            .unwrap();

        assert_eq!(
            store.latest_snapshot("page-1").unwrap(),
            Some(json!({"visits": 2}))
        );
    }
}
