use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::exchange::ExchangeAccountRegistry;
use crate::models::Snapshot;
use crate::pricing::FiatValuator;
use crate::storage::SnapshotStore;

use super::{spawn_repeating, TaskError, TaskHandle};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// What a scheduler tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// A snapshot was built and persisted.
    Completed(Snapshot),
    /// The previous tick for this user was still in flight; nothing ran.
    Skipped,
}

/// Per-user balance polling.
///
/// Each active user gets an independent timer. A tick fetches the user's raw
/// balances, filters and valuates them against the current price cache
/// contents (which may be up to one refresh interval stale), and persists the
/// resulting snapshot. Ticks for the same user never overlap: a tick that
/// finds its predecessor still running skips instead.
pub struct SnapshotScheduler {
    registry: Arc<ExchangeAccountRegistry>,
    valuator: Arc<FiatValuator>,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    errors: Option<mpsc::UnboundedSender<TaskError>>,
}

impl SnapshotScheduler {
    pub fn new(
        registry: Arc<ExchangeAccountRegistry>,
        valuator: Arc<FiatValuator>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            registry,
            valuator,
            store,
            clock: Arc::new(SystemClock),
            poll_interval: DEFAULT_POLL_INTERVAL,
            errors: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_error_channel(mut self, errors: mpsc::UnboundedSender<TaskError>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Starts one repeating task per registered user.
    pub fn start(self: &Arc<Self>) -> Vec<TaskHandle> {
        let mut handles = Vec::new();
        for user_id in self.registry.user_ids() {
            let scheduler = Arc::clone(self);
            let inflight = Arc::new(Mutex::new(()));
            let task_user = user_id.clone();
            let handle = spawn_repeating(
                format!("balances:{user_id}"),
                self.poll_interval,
                self.errors.clone(),
                move || {
                    let scheduler = Arc::clone(&scheduler);
                    let inflight = Arc::clone(&inflight);
                    let user_id = task_user.clone();
                    async move {
                        scheduler.run_tick(&user_id, &inflight).await.map(|_| ())
                    }
                },
            );
            handles.push(handle);
        }
        info!(users = handles.len(), "balance polling started");
        handles
    }

    /// One guarded tick: skips when the previous tick still holds the guard.
    pub async fn run_tick(&self, user_id: &str, inflight: &Mutex<()>) -> Result<TickOutcome> {
        let Ok(_guard) = inflight.try_lock() else {
            warn!(user = %user_id, "previous balance tick still in flight, skipping");
            return Ok(TickOutcome::Skipped);
        };
        let snapshot = self.poll_user(user_id).await?;
        Ok(TickOutcome::Completed(snapshot))
    }

    /// Fetch, valuate, and persist one snapshot for a user.
    pub async fn poll_user(&self, user_id: &str) -> Result<Snapshot> {
        let session = self.registry.session(user_id)?;
        let raw = session.account_balances().await?;
        let balances = self.valuator.valuate_balances(&raw);
        let snapshot = Snapshot::new(user_id, self.clock.now(), balances);
        self.store.append_snapshot(&snapshot).await?;
        info!(
            user = %user_id,
            assets = snapshot.balances.len(),
            value = snapshot.value,
            "snapshot persisted"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::{TimeZone, Utc};

    use crate::clock::FixedClock;
    use crate::exchange::{ExchangeApi, RawBalance};
    use crate::pricing::PriceCache;
    use crate::storage::{MemoryStorage, SnapshotStore};

    struct FixedExchange {
        balances: HashMap<String, RawBalance>,
    }

    #[async_trait::async_trait]
    impl ExchangeApi for FixedExchange {
        async fn all_prices(&self) -> Result<HashMap<String, f64>> {
            Ok(HashMap::new())
        }

        async fn account_balances(&self) -> Result<HashMap<String, RawBalance>> {
            Ok(self.balances.clone())
        }
    }

    fn scheduler_for(
        balances: HashMap<String, RawBalance>,
        pairs: &[(&str, f64)],
        store: Arc<MemoryStorage>,
    ) -> Arc<SnapshotScheduler> {
        let session: Arc<dyn ExchangeApi> = Arc::new(FixedExchange { balances });
        let mut sessions: HashMap<String, Arc<dyn ExchangeApi>> = HashMap::new();
        sessions.insert("u1".to_string(), session);
        let registry = Arc::new(ExchangeAccountRegistry::with_sessions(
            Arc::new(FixedExchange {
                balances: HashMap::new(),
            }),
            sessions,
        ));

        let cache = Arc::new(PriceCache::new());
        cache.apply(
            pairs
                .iter()
                .map(|(pair, price)| (pair.to_string(), *price))
                .collect(),
        );
        let valuator = Arc::new(FiatValuator::new(cache));

        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        ));

        Arc::new(
            SnapshotScheduler::new(registry, valuator, store).with_clock(clock),
        )
    }

    #[tokio::test]
    async fn tick_persists_a_valuated_snapshot() -> Result<()> {
        let store = Arc::new(MemoryStorage::new());
        let balances = HashMap::from([
            (
                "BTC".to_string(),
                RawBalance {
                    available: 0.5,
                    on_order: 0.0,
                },
            ),
            (
                "USDT".to_string(),
                RawBalance {
                    available: 100.0,
                    on_order: 0.0,
                },
            ),
            (
                "DUST".to_string(),
                RawBalance {
                    available: 0.0,
                    on_order: 0.0,
                },
            ),
        ]);
        let scheduler = scheduler_for(balances, &[("BTCUSDT", 30_000.0)], Arc::clone(&store));

        let snapshot = scheduler.poll_user("u1").await?;
        assert!((snapshot.value - 15_100.0).abs() < 1e-9);
        assert!(!snapshot.balances.contains_key("DUST"));
        assert_eq!(snapshot.balances["USDT"].price, 1.0);

        let stored = store
            .snapshots_in_range("u1", snapshot.time_stamp, snapshot.time_stamp)
            .await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].balances, snapshot.balances);

        Ok(())
    }

    #[tokio::test]
    async fn tick_for_unknown_user_fails_without_persisting() {
        let store = Arc::new(MemoryStorage::new());
        let scheduler = scheduler_for(HashMap::new(), &[], Arc::clone(&store));

        assert!(scheduler.poll_user("ghost").await.is_err());
        assert_eq!(store.snapshot_count("ghost").await, 0);
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() -> Result<()> {
        let store = Arc::new(MemoryStorage::new());
        let scheduler = scheduler_for(HashMap::new(), &[], Arc::clone(&store));

        let inflight = Mutex::new(());
        let held = inflight.lock().await;
        let outcome = scheduler.run_tick("u1", &inflight).await?;
        assert!(matches!(outcome, TickOutcome::Skipped));
        drop(held);

        let outcome = scheduler.run_tick("u1", &inflight).await?;
        assert!(matches!(outcome, TickOutcome::Completed(_)));
        assert_eq!(store.snapshot_count("u1").await, 1);

        Ok(())
    }
}
