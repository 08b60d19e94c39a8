mod json_file;
mod memory;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;

use anyhow::Result;

use crate::models::{Snapshot, User};

/// Read access to the user roster.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Users flagged active; the only ones that get exchange sessions.
    async fn active_users(&self) -> Result<Vec<User>>;
}

/// Persistence for portfolio snapshots.
///
/// Snapshots are immutable once written; range queries return them sorted
/// ascending by timestamp with inclusive bounds.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn append_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    async fn snapshots_in_range(&self, user: &str, start: i64, end: i64) -> Result<Vec<Snapshot>>;
}
