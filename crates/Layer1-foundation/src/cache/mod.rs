//! # Cache keys
//!
//! Every cacheable read is identified by a [`CacheKey`] derived from its
//! endpoint and JSON payload. Two payloads that differ only in object field
//! order map to the same key.
//!
//! ```rust,ignore
//! use herd_foundation::cache::build_key;
//! use serde_json::json;
//!
//! let a = build_key("cohort", &json!({"a": 1, "b": 2}));
//! let b = build_key("cohort", &json!({"b": 2, "a": 1}));
//! assert_eq!(a, b);
//! ```

mod key;

pub use key::{build_key, try_build_key, CacheKey};
