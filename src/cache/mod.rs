//! Memoized cost lookups.
//!
//! Evaluating a candidate is a long round trip to external workers, so the
//! annealer never evaluates the same solution twice within a run. The cache
//! memoizes by future rather than by completed value: a caller that asks for
//! a key whose evaluation is still in flight awaits the same result instead
//! of starting a second evaluation.

mod store;
mod types;

pub use store::CostCache;
pub use types::CacheStats;
