//! Cache statistics.

/// Counters describing how a [`CostCache`](super::CostCache) was used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    /// Lookups answered by a resolved or in-flight entry.
    pub hits: usize,
    /// Lookups that started a new evaluation.
    pub misses: usize,
    /// Entries currently held (resolved or in flight).
    pub entries: usize,
}

impl CacheStats {
    /// Total lookups.
    pub fn lookups(&self) -> usize {
        self.hits + self.misses
    }

    /// Fraction of lookups served without a new evaluation, `0.0` when unused.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}
