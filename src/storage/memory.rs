//! In-memory storage implementation for testing.

use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::models::{Snapshot, User};

use super::{SnapshotStore, UserStore};

/// In-memory storage for testing purposes.
#[derive(Default)]
pub struct MemoryStorage {
    users: Mutex<Vec<User>>,
    snapshots: Mutex<HashMap<String, Vec<Snapshot>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_users(&self, users: Vec<User>) {
        *self.users.lock().await = users;
    }

    pub async fn snapshot_count(&self, user: &str) -> usize {
        self.snapshots
            .lock()
            .await
            .get(user)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryStorage {
    async fn active_users(&self) -> Result<Vec<User>> {
        let users = self.users.lock().await;
        Ok(users.iter().filter(|u| u.active).cloned().collect())
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemoryStorage {
    async fn append_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.lock().await;
        snapshots
            .entry(snapshot.user.clone())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn snapshots_in_range(&self, user: &str, start: i64, end: i64) -> Result<Vec<Snapshot>> {
        let snapshots = self.snapshots.lock().await;
        let mut result: Vec<Snapshot> = snapshots
            .get(user)
            .map(|all| {
                all.iter()
                    .filter(|s| s.time_stamp >= start && s.time_stamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        result.sort_by_key(|s| s.time_stamp);
        Ok(result)
    }
}
