//! Bounded concurrent fan-out with per-item outcome capture.
//!
//! A stage hands [`FanOut::run`] a batch of inputs, a key function and the
//! sub-operation. Inputs whose key is already in the stage's
//! [`DedupMemory`] are skipped; every admitted key is recorded at submission
//! time. Admitted sub-operations start in submission order, at most
//! `concurrency` in flight at a time, each under its own timeout. A slot is
//! released as soon as its item finishes, and outcomes are reported in
//! submission order. A failing or timed-out item never affects its siblings.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;

use super::memory::DedupMemory;

/// Concurrency ceiling and per-item timeout for one stage category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutLimits {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl FanOutLimits {
    pub const fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            concurrency,
            timeout,
        }
    }
}

/// Outcome of a single sub-operation.
#[derive(Debug)]
pub enum ItemOutcome<T> {
    /// Produced a non-empty result.
    Done(T),
    /// Completed but produced nothing usable.
    Empty,
    /// Returned an error.
    Failed(anyhow::Error),
    /// Exceeded the per-item timeout.
    TimedOut,
}

impl<T> ItemOutcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// Per-item results of one fan-out batch, in submission order.
#[derive(Debug)]
pub struct FanOutReport<T> {
    label: String,
    outcomes: Vec<(String, ItemOutcome<T>)>,
    skipped: Vec<String>,
}

impl<T> FanOutReport<T> {
    /// Number of sub-operations actually scheduled.
    pub fn submitted(&self) -> usize {
        self.outcomes.len()
    }

    /// Keys skipped because the stage had already submitted them.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &ItemOutcome<T>)> {
        self.outcomes.iter().map(|(k, o)| (k.as_str(), o))
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ItemOutcome::Failed(_) | ItemOutcome::TimedOut))
            .count()
    }

    /// Keep successful results in submission order, logging every failure.
    pub fn into_successes(self) -> Vec<T> {
        let mut successes = Vec::with_capacity(self.outcomes.len());
        for (key, outcome) in self.outcomes {
            match outcome {
                ItemOutcome::Done(value) => successes.push(value),
                ItemOutcome::Empty => {
                    tracing::debug!(fanout = %self.label, key = %key, "sub-operation produced nothing");
                }
                ItemOutcome::Failed(e) => {
                    tracing::warn!(fanout = %self.label, key = %key, error = %format!("{e:#}"), "sub-operation failed");
                }
                ItemOutcome::TimedOut => {
                    tracing::warn!(fanout = %self.label, key = %key, "sub-operation timed out");
                }
            }
        }
        successes
    }
}

/// Reusable bounded fan-out executor.
#[derive(Clone)]
pub struct FanOut {
    label: String,
    limits: FanOutLimits,
}

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOut")
            .field("label", &self.label)
            .field("concurrency", &self.limits.concurrency)
            .field("timeout", &self.limits.timeout)
            .finish()
    }
}

impl FanOut {
    pub fn new(label: impl Into<String>, limits: FanOutLimits) -> Self {
        Self {
            label: label.into(),
            limits,
        }
    }

    pub fn limits(&self) -> FanOutLimits {
        self.limits
    }

    /// Run `op` for every input not yet in `memory`.
    ///
    /// `key` extracts the deduplication identifier from an input. `op`
    /// returns `Ok(Some(_))` for a result, `Ok(None)` for "nothing usable".
    pub async fn run<A, T, K, F, Fut>(
        &self,
        memory: &mut DedupMemory,
        inputs: impl IntoIterator<Item = A>,
        key: K,
        op: F,
    ) -> FanOutReport<T>
    where
        K: Fn(&A) -> String,
        F: Fn(A) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        let timeout = self.limits.timeout;
        let mut keys = Vec::new();
        let mut skipped = Vec::new();
        let mut pending = Vec::new();

        for input in inputs {
            let k = key(&input);
            if !memory.admit(&k) {
                skipped.push(k);
                continue;
            }
            let fut = op(input);
            let index = pending.len();
            pending.push(async move {
                let outcome = match tokio::time::timeout(timeout, fut).await {
                    Ok(Ok(Some(value))) => ItemOutcome::Done(value),
                    Ok(Ok(None)) => ItemOutcome::Empty,
                    Ok(Err(e)) => ItemOutcome::Failed(e),
                    Err(_) => ItemOutcome::TimedOut,
                };
                (index, outcome)
            });
            keys.push(k);
        }

        if !skipped.is_empty() {
            tracing::debug!(fanout = %self.label, skipped = skipped.len(), "skipped already-submitted keys");
        }
        tracing::info!(
            fanout = %self.label,
            submitted = keys.len(),
            concurrency = self.limits.concurrency,
            "starting fan-out"
        );

        let mut results: Vec<(usize, ItemOutcome<T>)> = stream::iter(pending)
            .buffer_unordered(self.limits.concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);
        let results = results.into_iter().map(|(_, outcome)| outcome);

        FanOutReport {
            label: self.label.clone(),
            outcomes: keys.into_iter().zip(results).collect(),
            skipped,
        }
    }
}
