mod snapshot;
mod user;

pub use snapshot::{AssetBalance, CalendarStamp, Snapshot};
pub use user::User;
