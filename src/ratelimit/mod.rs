//! Fixed-window rate limiting logic and state management.

mod clock;
mod key;
mod limiter;
mod policy;
pub mod presets;
mod reaper;
mod request;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{address_and_path, scoped_address, WindowKey};
pub use limiter::{Decision, Quota, RateLimiter};
pub use policy::{KeyFn, PolicyOverride, RateLimitPolicy, SkipFn, DEFAULT_MESSAGE, MAX_WINDOW};
pub use presets::{PresetOverrides, RateLimiters};
pub use reaper::{Reaper, DEFAULT_SWEEP_INTERVAL};
pub use request::{resolve_client_addr, RequestInfo, UNKNOWN_CLIENT};
pub use store::{RateLimitEntry, WindowStore};
