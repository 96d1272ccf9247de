//! Rate limiting logic and state management.

mod admission;
mod bucket;
mod clock;
mod decision;
mod lru_store;
mod store;
mod sweeper;
mod ttl_store;
mod whitelist;

pub use admission::{Admission, MISSING_KEY};
pub use bucket::Bucket;
pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{Decision, Quota};
pub use lru_store::{LruStore, DEFAULT_CAPACITY};
pub use store::{BucketStore, StoreSettings, DEFAULT_WINDOW};
pub use sweeper::{spawn_sweeper, SweeperHandle};
pub use ttl_store::{SweepSettings, TtlStore, DEFAULT_MIN_IDLE, DEFAULT_SWEEP_INTERVAL};
pub use whitelist::{Whitelist, REGEXP_PREFIX};
