//! Deterministic in-process collaborators.
//!
//! `FixtureChain` stands in for a blockchain node and `ScriptedProvider` for
//! an AI backend. Both are used by the test suites and by the CLI's offline
//! `read` command.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use arcana_state::{BlockReference, Bytes32};

use crate::entropy::{BlockchainClient, ChainError};
use crate::interpret::{AiProvider, ProviderError, ProviderOptions};

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// In-memory chain whose block values are a pure function of the slot.
///
/// By default the finalized head only moves when [`FixtureChain::advance`] is
/// called. A producing chain finalizes one more slot on every block read, so
/// a pending reveal resolves after `lookahead` polls without a driver task.
#[derive(Debug)]
pub struct FixtureChain {
    finalized: AtomicU64,
    producing: bool,
    down: AtomicBool,
    failures_left: AtomicU32,
    reads: AtomicU32,
    skipped: Mutex<HashSet<u64>>,
}

impl FixtureChain {
    pub fn new(finalized: u64) -> Self {
        Self {
            finalized: AtomicU64::new(finalized),
            producing: false,
            down: AtomicBool::new(false),
            failures_left: AtomicU32::new(0),
            reads: AtomicU32::new(0),
            skipped: Mutex::new(HashSet::new()),
        }
    }

    /// A chain that finalizes a slot on every `block_value` read.
    pub fn producing(finalized: u64) -> Self {
        Self {
            producing: true,
            ..Self::new(finalized)
        }
    }

    /// The value any fixture chain reports for `reference`.
    pub fn block_value_for(reference: &BlockReference) -> Vec<u8> {
        let mut data = b"fixture-block".to_vec();
        data.extend_from_slice(&reference.slot.to_be_bytes());
        Bytes32::sha256(&data).as_bytes().to_vec()
    }

    pub fn value_at(&self, slot: u64) -> Vec<u8> {
        Self::block_value_for(&BlockReference::new(slot))
    }

    /// Finalize `slots` more slots.
    pub fn advance(&self, slots: u64) {
        self.finalized.fetch_add(slots, Ordering::SeqCst);
    }

    pub fn finalized(&self) -> BlockReference {
        BlockReference::new(self.finalized.load(Ordering::SeqCst))
    }

    /// Fail every read until `set_down(false)`.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Fail the next `n` reads.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Report `slot` as finalized without a value.
    pub fn skip_slot(&self, slot: u64) {
        self.skipped.lock().unwrap().insert(slot);
    }

    /// Reads served or failed so far.
    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), ChainError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(ChainError::Unavailable("fixture outage".to_string()));
        }
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(ChainError::Unavailable("fixture outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlockchainClient for FixtureChain {
    async fn latest_finalized_reference(&self) -> Result<BlockReference, ChainError> {
        self.check_available()?;
        Ok(self.finalized())
    }

    async fn block_value(&self, reference: &BlockReference) -> Result<Vec<u8>, ChainError> {
        self.check_available()?;
        if reference.slot > self.finalized.load(Ordering::SeqCst) {
            if self.producing {
                self.advance(1);
            }
            return Err(ChainError::NotFinalized {
                reference: *reference,
            });
        }
        if self.skipped.lock().unwrap().contains(&reference.slot) {
            return Err(ChainError::Unusable {
                reference: *reference,
                reason: "slot was skipped".to_string(),
            });
        }
        Ok(Self::block_value_for(reference))
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// One scripted provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Reply(String),
    Fail(ProviderError),
    /// Never answers; the caller's timeout fires.
    Hang,
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicU32,
    completed: AtomicU32,
    cancelled: AtomicU32,
    in_flight: AtomicU32,
}

/// Marks a call cancelled if it is dropped before finishing.
struct CallGuard {
    counters: Arc<Counters>,
    finished: bool,
}

impl CallGuard {
    fn start(counters: &Arc<Counters>) -> Self {
        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            counters: counters.clone(),
            finished: false,
        }
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !self.finished {
            self.counters.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Provider that plays back a script, then repeats a fallback step.
#[derive(Debug)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    latency: Duration,
    prompts: Mutex<Vec<String>>,
    counters: Arc<Counters>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    /// Always replies.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Step::Reply("The cards point toward steady, patient progress.".to_string()),
            latency: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Plays `steps` in order, then replies.
    pub fn with_script(steps: impl IntoIterator<Item = Step>) -> Self {
        let provider = Self::new();
        provider.script.lock().unwrap().extend(steps);
        provider
    }

    /// Fails every call with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            fallback: Step::Fail(error),
            ..Self::new()
        }
    }

    /// Delay applied before every response.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    /// Calls started (attempts).
    pub fn calls(&self) -> u32 {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// Calls that returned a completion.
    pub fn completed(&self) -> u32 {
        self.counters.completed.load(Ordering::SeqCst)
    }

    /// Calls dropped before they finished.
    pub fn cancelled(&self) -> u32 {
        self.counters.cancelled.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> u32 {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> Option<&str> {
        Some("fixture")
    }

    async fn complete(
        &self,
        prompt: &str,
        _options: &ProviderOptions,
        _timeout: Duration,
    ) -> Result<String, ProviderError> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let mut guard = CallGuard::start(&self.counters);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let result = match step {
            Step::Reply(text) => Ok(text),
            Step::Fail(error) => Err(error),
            Step::Hang => {
                std::future::pending::<()>().await;
                Err(ProviderError::Server("unreachable".to_string()))
            }
        };

        guard.finished = true;
        if result.is_ok() {
            self.counters.completed.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_chain_finality() {
        let chain = FixtureChain::new(10);
        assert_eq!(chain.latest_finalized_reference().await.unwrap().slot, 10);
        assert!(matches!(
            chain.block_value(&BlockReference::new(11)).await,
            Err(ChainError::NotFinalized { .. })
        ));
        chain.advance(1);
        assert_eq!(
            chain.block_value(&BlockReference::new(11)).await.unwrap(),
            chain.value_at(11)
        );
    }

    #[tokio::test]
    async fn test_producing_chain_finalizes_on_poll() {
        let chain = FixtureChain::producing(10);
        let target = BlockReference::new(12);
        assert!(chain.block_value(&target).await.is_err());
        assert!(chain.block_value(&target).await.is_err());
        assert!(chain.block_value(&target).await.is_ok());
    }

    #[tokio::test]
    async fn test_fixture_chain_failure_injection() {
        let chain = FixtureChain::new(1);
        chain.fail_next(1);
        assert!(chain.latest_finalized_reference().await.is_err());
        assert!(chain.latest_finalized_reference().await.is_ok());

        chain.skip_slot(1);
        assert!(matches!(
            chain.block_value(&BlockReference::new(1)).await,
            Err(ChainError::Unusable { .. })
        ));
        assert_eq!(chain.reads(), 3);
    }

    #[tokio::test]
    async fn test_scripted_provider_plays_script_then_fallback() {
        let provider = ScriptedProvider::with_script([
            Step::Fail(ProviderError::RateLimited),
            Step::Reply("first".to_string()),
        ]);
        let opts = ProviderOptions::default();
        let t = Duration::from_secs(1);

        assert_eq!(provider.complete("a", &opts, t).await, Err(ProviderError::RateLimited));
        assert_eq!(provider.complete("b", &opts, t).await.unwrap(), "first");
        assert!(provider.complete("c", &opts, t).await.is_ok());
        assert_eq!(provider.calls(), 3);
        assert_eq!(provider.completed(), 2);
        assert_eq!(provider.prompts(), ["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_provider_counts_cancellation() {
        let provider = ScriptedProvider::with_script([Step::Hang]);
        let opts = ProviderOptions::default();
        let dropped = tokio::time::timeout(
            Duration::from_millis(10),
            provider.complete("q", &opts, Duration::from_secs(1)),
        )
        .await;
        assert!(dropped.is_err());
        assert_eq!(provider.cancelled(), 1);
        assert_eq!(provider.in_flight(), 0);
    }
}
