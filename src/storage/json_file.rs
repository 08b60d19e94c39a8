use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::models::{Snapshot, User};

use super::{SnapshotStore, UserStore};

/// JSON file-based storage.
///
/// Directory structure:
/// ```text
/// data/
///   users.json
///   snapshots/
///     {user_id}.jsonl
/// ```
///
/// Snapshot files are append-only; one line per snapshot, in write order.
#[derive(Clone)]
pub struct JsonFileStorage {
    base_path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn users_file(&self) -> PathBuf {
        self.base_path.join("users.json")
    }

    fn snapshots_dir(&self) -> PathBuf {
        self.base_path.join("snapshots")
    }

    fn snapshots_file(&self, user_id: &str) -> Result<PathBuf> {
        // User ids become file names; refuse anything that could escape the
        // snapshots directory.
        if user_id.is_empty()
            || !user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            anyhow::bail!("Unsafe user id for storage: {user_id:?}");
        }
        Ok(self.snapshots_dir().join(format!("{user_id}.jsonl")))
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create directory")?;
        }
        Ok(())
    }

    async fn read_json<T: for<'de> serde::Deserialize<'de>>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path).await {
            Ok(content) => {
                let value = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse JSON from {:?}", path))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to read file"),
        }
    }

    async fn read_jsonl<T: for<'de> serde::Deserialize<'de>>(&self, path: &Path) -> Result<Vec<T>> {
        let file = match fs::File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to open file"),
        };

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut items = Vec::new();

        while let Some(line) = lines.next_line().await.context("Failed to read line")? {
            if line.trim().is_empty() {
                continue;
            }
            let item: T = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse JSONL line: {}", line))?;
            items.push(item);
        }

        Ok(items)
    }

    async fn append_jsonl<T: serde::Serialize>(&self, path: &Path, item: &T) -> Result<()> {
        self.ensure_dir(path).await?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .context("Failed to open file for append")?;

        let line = serde_json::to_string(item).context("Failed to serialize item")?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;

        Ok(())
    }

    /// Replaces the user roster (operator tooling; the daemon only reads it).
    pub async fn save_users(&self, users: &[User]) -> Result<()> {
        let path = self.users_file();
        self.ensure_dir(&path).await?;
        let content = serde_json::to_string_pretty(users).context("Failed to serialize users")?;
        fs::write(&path, content)
            .await
            .context("Failed to write users file")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for JsonFileStorage {
    async fn active_users(&self) -> Result<Vec<User>> {
        let users: Vec<User> = self.read_json(&self.users_file()).await?.unwrap_or_default();
        Ok(users.into_iter().filter(|u| u.active).collect())
    }
}

#[async_trait::async_trait]
impl SnapshotStore for JsonFileStorage {
    async fn append_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self.snapshots_file(&snapshot.user)?;
        self.append_jsonl(&path, snapshot).await
    }

    async fn snapshots_in_range(&self, user: &str, start: i64, end: i64) -> Result<Vec<Snapshot>> {
        let path = self.snapshots_file(user)?;
        let mut snapshots: Vec<Snapshot> = self.read_jsonl(&path).await?;
        snapshots.retain(|s| s.time_stamp >= start && s.time_stamp <= end);
        snapshots.sort_by_key(|s| s.time_stamp);
        Ok(snapshots)
    }
}
