//! Search layer: the filter predicate, store scans, the result cache and the
//! background worker that ties them together.
//!
//! - **[`filter`]**: per-message predicate (text + date range).
//! - **[`query`]**: filter parameters, cache keys and resolved display lists.
//! - **[`resolve`]**: store scans and text re-filtering of resolved lists.
//! - **[`cache`]**: insertion-order bounded caches plus the unfiltered snapshot.
//! - **[`engine`]**: cache-aware resolve orchestration.
//! - **[`worker`]**: one background thread per request with generation tokens.
//! - **[`debounce`]**: coalescing of rapid filter edits.

pub mod cache;
pub mod debounce;
pub mod engine;
pub mod filter;
pub mod query;
pub mod resolve;
pub mod worker;

pub use engine::{Resolution, ResolveSource, SearchEngine};
pub use query::{DisplayItem, FilterParams, ResolvedList, Scope};
