mod prices;
mod snapshots;
mod task;

pub use prices::start_price_refresh;
pub use snapshots::{SnapshotScheduler, TickOutcome};
pub use task::{spawn_repeating, TaskError, TaskHandle};
