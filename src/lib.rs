//! Cadabra: a sidecar cache for relational query results with automatic,
//! content-aware invalidation.
//!
//! Results are cached under a fingerprint derived from a SQL statement's
//! *structure*, not its literal text, so equivalent queries written
//! differently still hit the same entry. Writes are analyzed the same way
//! and checked against every candidate entry by the decider
//! ([`decider::should_invalidate`]); when the analyzer can't prove a write
//! and a cached query don't overlap, it invalidates — never the reverse.
//!
//! # Example
//!
//! ```no_run
//! use cadabra::cache::Cache;
//!
//! let cache = Cache::open("./cadabra-data", 10_000).unwrap();
//! let fingerprint = cache
//!     .register("SELECT * FROM users WHERE id = 10", None, b"...".to_vec())
//!     .unwrap();
//! assert!(cache.get(fingerprint.as_str()).unwrap().is_some());
//!
//! cache.invalidate("UPDATE users SET email = 'x@y' WHERE id = 10", None).unwrap();
//! assert!(cache.get(fingerprint.as_str()).unwrap().is_none());
//! ```

pub mod analysis;
pub mod api;
pub mod cache;
pub mod config;
pub mod decider;
pub mod error;
pub mod metrics;
pub mod model;
pub mod store;

pub use cache::{Cache, CacheError, CacheStats};
pub use error::{AnalysisError, StorageError};
