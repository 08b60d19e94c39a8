use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{TimeZone, Utc};

use cointrail::models::{AssetBalance, Snapshot, User};
use cointrail::storage::{JsonFileStorage, SnapshotStore, UserStore};

fn snapshot_at(user: &str, secs: i64) -> Snapshot {
    let mut balances = BTreeMap::new();
    balances.insert(
        "BTC".to_string(),
        AssetBalance {
            available: 0.5,
            order: 0.0,
            total: 0.5,
            price: 30_000.0,
            value: 15_000.0,
        },
    );
    Snapshot::new(user, Utc.timestamp_opt(secs, 0).unwrap(), balances)
}

#[tokio::test]
async fn range_query_is_inclusive_and_sorted() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let storage = JsonFileStorage::new(dir.path());

    // Append out of order; the query sorts by timestamp.
    for secs in [300, 100, 200] {
        storage.append_snapshot(&snapshot_at("u1", secs)).await?;
    }

    let found = storage.snapshots_in_range("u1", 100, 300).await?;
    assert_eq!(
        found.iter().map(|s| s.time_stamp).collect::<Vec<_>>(),
        vec![100, 200, 300]
    );

    let bounded = storage.snapshots_in_range("u1", 100, 200).await?;
    assert_eq!(bounded.len(), 2);

    let empty = storage.snapshots_in_range("u1", 400, 500).await?;
    assert!(empty.is_empty());

    // A user with no snapshot file has an empty history, not an error.
    let none = storage.snapshots_in_range("u2", 0, 1_000).await?;
    assert!(none.is_empty());

    Ok(())
}

#[tokio::test]
async fn persisted_record_round_trips_asset_data() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let storage = JsonFileStorage::new(dir.path());

    let snapshot = snapshot_at("u1", 1_700_000_000);
    storage.append_snapshot(&snapshot).await?;

    let found = storage
        .snapshots_in_range("u1", 1_700_000_000, 1_700_000_000)
        .await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].balances, snapshot.balances);
    assert_eq!(found[0].value, snapshot.value);
    assert_eq!(found[0].time, snapshot.time);

    Ok(())
}

#[tokio::test]
async fn persisted_record_uses_wire_field_names() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let storage = JsonFileStorage::new(dir.path());

    storage.append_snapshot(&snapshot_at("u1", 100)).await?;

    let raw = std::fs::read_to_string(dir.path().join("snapshots/u1.jsonl"))?;
    let line: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap())?;

    assert_eq!(line["user"], "u1");
    assert_eq!(line["timeStamp"], 100);
    assert!(line["time"].get("year").is_some());
    let btc = &line["balances"]["BTC"];
    for field in ["available", "order", "total", "price", "value"] {
        assert!(btc.get(field).is_some(), "missing field {field}");
    }
    // Percentage is a query-time artifact, never persisted.
    assert!(btc.get("percentage").is_none());

    Ok(())
}

#[tokio::test]
async fn unsafe_user_ids_are_rejected() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let storage = JsonFileStorage::new(dir.path());

    let result = storage.snapshots_in_range("../escape", 0, 100).await;
    assert!(result.is_err());

    let mut snapshot = snapshot_at("ok", 100);
    snapshot.user = "a/b".to_string();
    assert!(storage.append_snapshot(&snapshot).await.is_err());

    Ok(())
}

#[tokio::test]
async fn users_file_round_trips_and_filters_inactive() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let storage = JsonFileStorage::new(dir.path());

    storage
        .save_users(&[
            User::new("alice", "key-a", "secret-a").with_name("Alice"),
            User::new("bob", "key-b", "secret-b").inactive(),
        ])
        .await?;

    let active = storage.active_users().await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "alice");
    assert_eq!(active[0].name, "Alice");

    Ok(())
}

#[tokio::test]
async fn missing_users_file_means_no_users() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let storage = JsonFileStorage::new(dir.path());
    assert!(storage.active_users().await?.is_empty());
    Ok(())
}
