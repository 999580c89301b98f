//! # herd-coordinator
//!
//! Request coordination for cacheable reads.
//!
//! ## Features
//! - Short-lived TTL cache keyed by (endpoint, payload)
//! - In-flight de-duplication: identical concurrent calls share one dispatch
//! - Per-key throttle window that serves a stale value to bursty callers
//! - `force` escape hatch that always dispatches and refreshes the cache
//!
//! ```rust,ignore
//! use herd_coordinator::RequestCoordinator;
//! use serde_json::{json, Value};
//!
//! let coordinator: RequestCoordinator<Value, String> = RequestCoordinator::new();
//! let payload = json!({"breed": "Saanen"});
//!
//! let report = coordinator
//!     .execute("cohort", &payload, move || api.run_cohort(payload_clone), coordinator.options())
//!     .await?;
//! ```

pub mod coordinator;
pub mod options;

pub use coordinator::{CoordinatorStats, JsonCoordinator, RequestCoordinator};
pub use options::{ExecuteOptions, Resolution, Resolved};
