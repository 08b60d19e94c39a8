//! Cancellable repeating tasks.
//!
//! Replaces fire-and-forget timers with handles that can be cancelled at
//! shutdown and with errors that are observable on a channel instead of only
//! in the logs. Tick bodies run as their own tasks, so a slow tick does not
//! delay the schedule; overlap protection is the tick body's concern.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A failed tick, delivered to the error channel when one is attached.
#[derive(Debug, Clone)]
pub struct TaskError {
    pub task: String,
    pub message: String,
}

/// Handle to a repeating task. Dropping it also stops the schedule.
pub struct TaskHandle {
    name: String,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the schedule and waits for the timer task to wind down.
    /// Ticks already in flight are not interrupted.
    pub async fn cancel(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Spawns a tick factory on a fixed period. The first tick fires one period
/// after start. Each tick runs detached; a failure is delivered to `errors`
/// (or logged when no channel is attached), and the next tick proceeds
/// regardless of the prior outcome.
pub fn spawn_repeating<F, Fut>(
    name: impl Into<String>,
    period: Duration,
    errors: Option<mpsc::UnboundedSender<TaskError>>,
    mut tick: F,
) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let name = name.into();
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task_name = name.clone();
    let join = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // An interval's first tick completes immediately; consume it so the
        // schedule starts one period from now.
        interval.tick().await;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // Either an explicit cancel or the handle was dropped.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!(task = %task_name, "repeating task stopped");
                        break;
                    }
                }
                _ = interval.tick() => {
                    let fut = tick();
                    let errors = errors.clone();
                    let tick_name = task_name.clone();
                    tokio::spawn(async move {
                        if let Err(err) = fut.await {
                            let delivered = errors
                                .map(|tx| {
                                    tx.send(TaskError {
                                        task: tick_name.clone(),
                                        message: format!("{err:#}"),
                                    })
                                    .is_ok()
                                })
                                .unwrap_or(false);
                            if !delivered {
                                warn!(task = %tick_name, error = %err, "scheduled tick failed");
                            }
                        }
                    });
                }
            }
        }
    });

    TaskHandle {
        name,
        shutdown: shutdown_tx,
        join,
    }
}
