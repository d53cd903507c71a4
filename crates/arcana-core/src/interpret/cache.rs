//! Bounded single-flight interpretation cache.
//!
//! Keys are spread over independently locked shards. A miss installs an
//! in-flight entry holding a weak handle to a shared future; concurrent
//! callers for the same key join that future instead of starting another
//! provider call. Shard locks are never held across an await.
//!
//! The shared future lives only as long as someone awaits it. When every
//! waiter is dropped the computation is dropped with it, which cancels the
//! provider call and frees its pool permit. The last waiter to leave also
//! removes the in-flight entry, so abandoned keys never occupy the map. The
//! next caller for that key starts over.

use std::collections::HashMap;
use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};

use arcana_state::{Bytes32, DrawId, InterpretationResult};

use super::tier::TierPlan;

/// Cache key: the draw, the question and the enforced tier plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub draw_id: DrawId,
    pub question_hash: Bytes32,
    pub plan: TierPlan,
}

impl CacheKey {
    pub fn new(draw_id: DrawId, question: &str, plan: TierPlan) -> Self {
        Self {
            draw_id,
            question_hash: question_hash(question),
            plan,
        }
    }
}

/// SHA-256 of the trimmed question text.
pub fn question_hash(question: &str) -> Bytes32 {
    Bytes32::sha256(question.trim().as_bytes())
}

pub type SharedInterpretation = Shared<BoxFuture<'static, Arc<InterpretationResult>>>;

/// How a lookup was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Completed entry.
    Hit,
    /// Joined a computation another caller started.
    Joined,
    /// Started the computation.
    Computed,
}

enum Slot {
    Ready {
        value: Arc<InterpretationResult>,
        last_used: u64,
    },
    InFlight(WeakShared<BoxFuture<'static, Arc<InterpretationResult>>>),
}

type Shard = Mutex<HashMap<CacheKey, Slot>>;

/// Sharded, bounded, single-flight cache of interpretations.
pub struct InterpretationCache {
    shards: Vec<Shard>,
    per_shard_capacity: usize,
    hasher: std::collections::hash_map::RandomState,
    clock: AtomicU64,
}

impl InterpretationCache {
    /// `capacity` completed entries spread over `shards` locks.
    pub fn new(capacity: usize, shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| Mutex::new(HashMap::new())).collect(),
            per_shard_capacity: capacity.div_ceil(shards).max(1),
            hasher: Default::default(),
            clock: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, join the in-flight computation, or
    /// start `compute` and share it.
    ///
    /// Degraded results are handed to every waiter but never stored.
    pub async fn get_or_compute<F>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> (Arc<InterpretationResult>, CacheOutcome)
    where
        F: FnOnce() -> BoxFuture<'static, Arc<InterpretationResult>>,
    {
        let (shared, outcome) = {
            let mut shard = self.shard(&key).lock().unwrap();
            match shard.get_mut(&key) {
                Some(Slot::Ready { value, last_used }) => {
                    *last_used = self.tick();
                    return (value.clone(), CacheOutcome::Hit);
                }
                Some(Slot::InFlight(weak)) => match weak.upgrade() {
                    Some(shared) => (shared, CacheOutcome::Joined),
                    None => (Self::install(&mut shard, key.clone(), compute), CacheOutcome::Computed),
                },
                None => (Self::install(&mut shard, key.clone(), compute), CacheOutcome::Computed),
            }
        };

        let value = Waiter {
            cache: self,
            key: &key,
            shared: Some(shared),
        }
        .await;
        self.complete(&key, &value);
        (value, outcome)
    }

    /// Completed entries currently held.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| {
                s.lock()
                    .unwrap()
                    .values()
                    .filter(|slot| matches!(slot, Slot::Ready { .. }))
                    .count()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry in the map, completed or in flight.
    pub fn slot_count(&self) -> usize {
        self.shards.iter().map(|s| s.lock().unwrap().len()).sum()
    }

    /// Whether a computation for `key` is currently running.
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        matches!(
            self.shard(key).lock().unwrap().get(key),
            Some(Slot::InFlight(weak)) if weak.upgrade().is_some()
        )
    }

    fn install<F>(shard: &mut HashMap<CacheKey, Slot>, key: CacheKey, compute: F) -> SharedInterpretation
    where
        F: FnOnce() -> BoxFuture<'static, Arc<InterpretationResult>>,
    {
        let shared = compute().shared();
        match shared.downgrade() {
            Some(weak) => {
                shard.insert(key, Slot::InFlight(weak));
            }
            None => {
                shard.remove(&key);
            }
        }
        shared
    }

    /// Store a finished value in place of its in-flight entry.
    fn complete(&self, key: &CacheKey, value: &Arc<InterpretationResult>) {
        let mut shard = self.shard(key).lock().unwrap();
        if !matches!(shard.get(key), Some(Slot::InFlight(_))) {
            return;
        }
        if value.degraded {
            shard.remove(key);
            return;
        }

        shard.insert(
            key.clone(),
            Slot::Ready {
                value: value.clone(),
                last_used: self.tick(),
            },
        );
        self.evict(&mut shard);
    }

    /// Drop the in-flight entry for `key` once nothing can join it any more.
    fn release(&self, key: &CacheKey) {
        let mut shard = self.shard(key).lock().unwrap();
        if let Some(Slot::InFlight(weak)) = shard.get(key) {
            if weak.upgrade().is_none() {
                shard.remove(key);
            }
        }
    }

    fn evict(&self, shard: &mut HashMap<CacheKey, Slot>) {
        loop {
            let mut ready = 0usize;
            let mut oldest: Option<(&CacheKey, u64)> = None;
            for (key, slot) in shard.iter() {
                if let Slot::Ready { last_used, .. } = slot {
                    ready += 1;
                    if oldest.map_or(true, |(_, t)| *last_used < t) {
                        oldest = Some((key, *last_used));
                    }
                }
            }
            if ready <= self.per_shard_capacity {
                return;
            }
            let Some((key, _)) = oldest else { return };
            let key = key.clone();
            shard.remove(&key);
        }
    }

    fn shard(&self, key: &CacheKey) -> &Shard {
        let index = self.hasher.hash_one(key) as usize % self.shards.len();
        &self.shards[index]
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }
}

/// One caller's handle on a shared computation.
///
/// Dropping it before the value arrives releases the caller's strong
/// reference first and then clears the entry if no other waiter is left.
struct Waiter<'a> {
    cache: &'a InterpretationCache,
    key: &'a CacheKey,
    shared: Option<SharedInterpretation>,
}

impl Future for Waiter<'_> {
    type Output = Arc<InterpretationResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(shared) = self.shared.as_mut() else {
            return Poll::Pending;
        };
        let value = futures::ready!(shared.poll_unpin(cx));
        self.shared = None;
        Poll::Ready(value)
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            drop(shared);
            self.cache.release(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use arcana_state::{ProviderMetadata, Tier};

    use super::*;

    fn plan() -> TierPlan {
        TierPlan {
            tier: Tier::Free,
            elaborate_cards: false,
            synthesis_passes: 1,
        }
    }

    fn result(key: &CacheKey, synthesis: &str, degraded: bool) -> Arc<InterpretationResult> {
        Arc::new(InterpretationResult {
            draw_id: key.draw_id.clone(),
            question_hash: key.question_hash,
            per_position: vec![],
            synthesis: synthesis.to_string(),
            provider: ProviderMetadata {
                provider: "test".to_string(),
                model: None,
                tier: Tier::Free,
                billable_calls: 1,
                attempts: 1,
                synthesis_passes: 1,
                elaborated: false,
            },
            latency_ms: 0,
            degraded,
            sentiment: None,
        })
    }

    fn key(n: u32) -> CacheKey {
        CacheKey::new(DrawId(format!("draw-{n}")), "Will the project ship?", plan())
    }

    fn counting(
        calls: &Arc<AtomicU32>,
        key: &CacheKey,
        degraded: bool,
    ) -> impl FnOnce() -> BoxFuture<'static, Arc<InterpretationResult>> {
        let calls = calls.clone();
        let value = result(key, "narrative", degraded);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                value
            }
            .boxed()
        }
    }

    #[test]
    fn test_question_hash_ignores_surrounding_whitespace() {
        assert_eq!(question_hash("  Will it rain? "), question_hash("Will it rain?"));
        assert_ne!(question_hash("Will it rain?"), question_hash("Will it snow?"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_lookup_hits() {
        let cache = InterpretationCache::new(8, 2);
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(1);

        let (_, first) = cache.get_or_compute(k.clone(), counting(&calls, &k, false)).await;
        let (_, second) = cache.get_or_compute(k.clone(), counting(&calls, &k, false)).await;

        assert_eq!(first, CacheOutcome::Computed);
        assert_eq!(second, CacheOutcome::Hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_computation() {
        let cache = Arc::new(InterpretationCache::new(8, 4));
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(2);

        let lookups = (0..16).map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            let k = k.clone();
            async move { cache.get_or_compute(k.clone(), counting(&calls, &k, false)).await }
        });
        let results = futures::future::join_all(lookups).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            results.iter().filter(|(_, o)| *o == CacheOutcome::Computed).count(),
            1
        );
        assert!(results.iter().all(|(v, _)| v.synthesis == "narrative"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_results_are_not_stored() {
        let cache = InterpretationCache::new(8, 1);
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(3);

        let (value, _) = cache.get_or_compute(k.clone(), counting(&calls, &k, true)).await;
        assert!(value.degraded);
        assert!(cache.is_empty());

        cache.get_or_compute(k.clone(), counting(&calls, &k, true)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_computation_restarts() {
        let cache = InterpretationCache::new(8, 1);
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(4);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cache.get_or_compute(k.clone(), counting(&calls, &k, false)),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(!cache.is_in_flight(&k));
        assert_eq!(cache.slot_count(), 0);

        let (_, outcome) = cache.get_or_compute(k.clone(), counting(&calls, &k, false)).await;
        assert_eq!(outcome, CacheOutcome::Computed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_keys_leave_no_entries() {
        let cache = InterpretationCache::new(2, 1);
        let calls = Arc::new(AtomicU32::new(0));

        for n in 0..200 {
            let k = key(n);
            let abandoned = tokio::time::timeout(
                Duration::from_millis(1),
                cache.get_or_compute(k.clone(), counting(&calls, &k, false)),
            )
            .await;
            assert!(abandoned.is_err());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 200);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.slot_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_joiner_keeps_the_computation() {
        let cache = Arc::new(InterpretationCache::new(8, 1));
        let calls = Arc::new(AtomicU32::new(0));
        let k = key(5);

        let owner = {
            let cache = cache.clone();
            let calls = calls.clone();
            let k = k.clone();
            tokio::spawn(async move { cache.get_or_compute(k.clone(), counting(&calls, &k, false)).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.is_in_flight(&k));

        let joiner = tokio::time::timeout(
            Duration::from_millis(5),
            cache.get_or_compute(k.clone(), counting(&calls, &k, false)),
        )
        .await;
        assert!(joiner.is_err());
        assert!(cache.is_in_flight(&k));
        assert_eq!(cache.slot_count(), 1);

        let (_, outcome) = owner.await.unwrap();
        assert_eq!(outcome, CacheOutcome::Computed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.slot_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oldest_entries_are_evicted() {
        let cache = InterpretationCache::new(2, 1);
        let calls = Arc::new(AtomicU32::new(0));

        for n in 0..3 {
            let k = key(n);
            cache.get_or_compute(k.clone(), counting(&calls, &k, false)).await;
        }
        assert_eq!(cache.len(), 2);

        let k = key(0);
        let (_, outcome) = cache.get_or_compute(k.clone(), counting(&calls, &k, false)).await;
        assert_eq!(outcome, CacheOutcome::Computed);
    }
}
