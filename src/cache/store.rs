//! Future-sharing memo table.

use std::collections::HashMap;
use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use super::types::CacheStats;
use crate::error::{TuneError, TuneResult};
use crate::solution::{Cost, SolutionKey};

type SharedCost = Shared<BoxFuture<'static, TuneResult<Cost>>>;

enum Entry {
    Ready(Cost),
    /// `id` tells a stale waiter apart from a retry started after eviction.
    Pending { id: u64, future: SharedCost },
}

/// What a lookup found: a resolved cost or a future to wait on.
enum Claim {
    Ready(Cost),
    Wait {
        id: u64,
        future: SharedCost,
        joined: bool,
    },
}

#[derive(Default)]
struct Inner {
    entries: HashMap<SolutionKey, Entry>,
    next_id: u64,
    hits: usize,
    misses: usize,
}

/// Memoizes costs keyed by [`SolutionKey`].
///
/// At most one evaluation per key is outstanding at any time. Failed
/// evaluations are evicted, so the next lookup of the same key retries.
///
/// # Examples
///
/// ```
/// use u_tuner::{Cost, CostCache, Solution};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let cache = CostCache::new();
/// let key = Solution::new(vec![1.0]).unwrap().key();
/// let a = cache.get_or_compute(key.clone(), || async { Cost::new(0.5) }).await.unwrap();
/// let b = cache.get_or_compute(key, || async { Cost::new(0.9) }).await.unwrap();
/// assert_eq!(a, b);
/// assert_eq!(b.value(), 0.5);
/// assert_eq!(cache.stats().hits, 1);
/// # });
/// ```
#[derive(Default)]
pub struct CostCache {
    inner: Mutex<Inner>,
}

impl CostCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cost for `key`, invoking `compute` only if no resolved or
    /// in-flight entry exists.
    ///
    /// `compute` runs without the cache lock held, so it may itself call
    /// into the cache. If another caller registers the same key while
    /// `compute` runs, that entry wins and the future built here is dropped
    /// unpolled.
    ///
    /// Callers that join an in-flight evaluation which then fails receive
    /// [`TuneError::CacheComputationFailure`] wrapping the original error;
    /// the caller that started it receives the original error.
    pub async fn get_or_compute<F, Fut>(&self, key: SolutionKey, compute: F) -> TuneResult<Cost>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TuneResult<Cost>> + Send + 'static,
    {
        let found = Self::existing(&mut self.inner.lock(), &key);
        if let Some(claim) = found {
            return self.settle(key, claim).await;
        }

        let fresh = compute().boxed().shared();

        let claim = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match Self::existing(inner, &key) {
                Some(claim) => claim,
                None => {
                    inner.misses += 1;
                    let id = inner.next_id;
                    inner.next_id += 1;
                    inner.entries.insert(
                        key.clone(),
                        Entry::Pending {
                            id,
                            future: fresh.clone(),
                        },
                    );
                    Claim::Wait {
                        id,
                        future: fresh,
                        joined: false,
                    }
                }
            }
        };
        self.settle(key, claim).await
    }

    /// Looks `key` up, counting a hit if an entry exists.
    fn existing(inner: &mut Inner, key: &SolutionKey) -> Option<Claim> {
        let claim = match inner.entries.get(key)? {
            Entry::Ready(cost) => {
                debug!(%key, cost = cost.value(), "cost cache hit");
                Claim::Ready(*cost)
            }
            Entry::Pending { id, future } => {
                debug!(%key, "joining in-flight evaluation");
                Claim::Wait {
                    id: *id,
                    future: future.clone(),
                    joined: true,
                }
            }
        };
        inner.hits += 1;
        Some(claim)
    }

    async fn settle(&self, key: SolutionKey, claim: Claim) -> TuneResult<Cost> {
        let (id, future, joined) = match claim {
            Claim::Ready(cost) => return Ok(cost),
            Claim::Wait { id, future, joined } => (id, future, joined),
        };

        let result = future.await;

        {
            let mut inner = self.inner.lock();
            let still_ours = matches!(
                inner.entries.get(&key),
                Some(Entry::Pending { id: current, .. }) if *current == id
            );
            if still_ours {
                match &result {
                    Ok(cost) => {
                        inner.entries.insert(key.clone(), Entry::Ready(*cost));
                    }
                    Err(_) => {
                        inner.entries.remove(&key);
                    }
                }
            }
        }

        match result {
            Err(source) if joined => Err(TuneError::CacheComputationFailure {
                key: key.to_string(),
                source: Box::new(source),
            }),
            other => other,
        }
    }

    /// The resolved cost for `key`, if any. In-flight entries are not reported.
    pub fn get(&self, key: &SolutionKey) -> Option<Cost> {
        match self.inner.lock().entries.get(key) {
            Some(Entry::Ready(cost)) => Some(*cost),
            _ => None,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&self) {
        *self.inner.lock() = Inner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::Solution;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn key(coeffs: &[f64]) -> SolutionKey {
        Solution::new(coeffs.to_vec()).unwrap().key()
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        value: f64,
    ) -> impl FnOnce() -> BoxFuture<'static, TuneResult<Cost>> {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Cost::new(value)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_resolved_entry_is_reused() {
        let cache = CostCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let a = cache.get_or_compute(key(&[1.0]), counting(&calls, 0.25)).await;
        let b = cache.get_or_compute(key(&[1.0]), counting(&calls, 0.9)).await;

        assert_eq!(a.unwrap().value(), 0.25);
        assert_eq!(b.unwrap().value(), 0.25);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_evaluation_is_shared() {
        let cache = CostCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_compute(key(&[2.0, -0.0]), counting(&calls, 0.5)),
            cache.get_or_compute(key(&[2.0, 0.0]), counting(&calls, 0.5)),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.get(&key(&[2.0, 0.0])).map(Cost::value), Some(0.5));
    }

    #[tokio::test]
    async fn test_distinct_keys_compute_separately() {
        let cache = CostCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_compute(key(&[1.0]), counting(&calls, 0.1)).await.unwrap();
        cache.get_or_compute(key(&[2.0]), counting(&calls, 0.2)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_all_waiters_and_is_evicted() {
        let cache = CostCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Err::<Cost, _>(TuneError::evaluation("worker unreachable"))
                }
                .boxed()
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_compute(key(&[3.0]), failing),
            cache.get_or_compute(key(&[3.0]), counting(&calls, 0.0)),
        );

        assert!(matches!(a, Err(TuneError::EvaluationFailure { .. })));
        assert!(matches!(b, Err(TuneError::CacheComputationFailure { .. })));
        assert!(b.unwrap_err().is_evaluation_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());

        // A later lookup retries.
        let retried = cache.get_or_compute(key(&[3.0]), counting(&calls, 0.75)).await;
        assert_eq!(retried.unwrap().value(), 0.75);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_compute_may_inspect_the_cache() {
        let cache = Arc::new(CostCache::new());
        cache
            .get_or_compute(key(&[1.0]), || async { Cost::new(0.1) })
            .await
            .unwrap();

        let seen = {
            let cache = cache.clone();
            move || {
                let entries = cache.len();
                let misses = cache.stats().misses;
                async move { Cost::new(0.1 * (entries + misses) as f64) }
            }
        };
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            cache.get_or_compute(key(&[2.0]), seen),
        )
        .await
        .expect("compute must not block on the cache lock");

        // One entry and one miss were visible while computing.
        assert_eq!(result.unwrap().value(), 0.2);
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.get(&key(&[2.0])).map(Cost::value), Some(0.2));
    }

    #[tokio::test]
    async fn test_clear_resets() {
        let cache = CostCache::new();
        cache
            .get_or_compute(key(&[1.0]), || async { Cost::new(0.3) })
            .await
            .unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
        assert!(cache.get(&key(&[1.0])).is_none());
    }
}
