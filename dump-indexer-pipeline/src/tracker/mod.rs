//! Outcome tracker for the dump indexer pipeline.
//!
//! Collects the terminal outcome of every submitted document. Completion tasks
//! record outcomes concurrently; the producer never waits on them except when
//! draining at the end of a run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{error, info, trace, warn};

use dump_indexer_repository::DocumentError;

/// Tracing target that carries one event per failed document.
pub const FAILURE_TARGET: &str = "dump_indexer::failures";

/// Terminal outcome of a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The document was written and acknowledged.
    Success(String),
    /// The document could not be written.
    Failure(String, DocumentError),
}

/// Aggregated outcomes of a run.
#[derive(Debug, Clone, Default)]
pub struct OutcomeSummary {
    /// Number of documents written successfully.
    pub successes: u64,
    /// Number of failed writes.
    pub failures: u64,
    /// Failure cause per document identity.
    pub failed: HashMap<String, DocumentError>,
}

impl OutcomeSummary {
    /// Total number of documents with a terminal outcome.
    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    /// Number of failures caused by duplicate identities.
    pub fn conflicts(&self) -> usize {
        self.failed.values().filter(|e| e.is_conflict()).count()
    }

    /// Log the summary line and every failed document on the failure target.
    pub fn log(&self) {
        info!(
            successes = self.successes,
            failures = self.failures,
            "Indexing summary: {} documents indexed, {} failed",
            self.successes,
            self.failures
        );

        let mut failed: Vec<_> = self.failed.iter().collect();
        failed.sort_by(|a, b| a.0.cmp(b.0));
        for (identity, cause) in failed {
            error!(target: FAILURE_TARGET, identity = %identity, cause = %cause, "Document failed");
        }
    }
}

/// Concurrent tracker of document outcomes.
///
/// Successes are only counted; failures keep their identity and cause. Every
/// recorded outcome bumps a settled counter that `wait_settled` observes.
#[derive(Debug)]
pub struct OutcomeTracker {
    successes: AtomicU64,
    failures: AtomicU64,
    failed: DashMap<String, DocumentError>,
    settled: watch::Sender<u64>,
    summarized: AtomicBool,
}

impl OutcomeTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        let (settled, _) = watch::channel(0);

        Self {
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            failed: DashMap::new(),
            settled,
            summarized: AtomicBool::new(false),
        }
    }

    /// Record a successful write.
    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.settle();
    }

    /// Record a failed write. A second failure for the same identity replaces the first cause.
    pub fn record_failure(&self, identity: impl Into<String>, cause: DocumentError) {
        let identity = identity.into();
        trace!(identity = %identity, cause = %cause, "Recording failure");
        self.failed.insert(identity, cause);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.settle();
    }

    /// Record an outcome.
    pub fn record(&self, outcome: Outcome) {
        match outcome {
            Outcome::Success(_) => self.record_success(),
            Outcome::Failure(identity, cause) => self.record_failure(identity, cause),
        }
    }

    /// Number of successful writes so far.
    pub fn success_count(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Number of failed writes so far.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Number of outcomes recorded so far.
    pub fn settled(&self) -> u64 {
        *self.settled.borrow()
    }

    /// Wait until at least `expected` outcomes have been recorded.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - All expected outcomes arrived in time
    /// * `Err(settled)` - The timeout elapsed; carries the number settled so far
    pub async fn wait_settled(&self, expected: u64, timeout: Duration) -> Result<(), u64> {
        let mut settled = self.settled.subscribe();
        let reached = matches!(
            tokio::time::timeout(timeout, settled.wait_for(|n| *n >= expected)).await,
            Ok(Ok(_))
        );

        if reached {
            Ok(())
        } else {
            Err(self.settled())
        }
    }

    /// Produce the final summary of the run.
    ///
    /// Must be read once, after draining. Later calls return `None`.
    pub fn summarize(&self) -> Option<OutcomeSummary> {
        if self.summarized.swap(true, Ordering::AcqRel) {
            warn!("Outcome summary was already produced for this run");
            return None;
        }

        let failed = self
            .failed
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        Some(OutcomeSummary {
            successes: self.success_count(),
            failures: self.failure_count(),
            failed,
        })
    }

    fn settle(&self) {
        self.settled.send_modify(|n| *n += 1);
    }
}

impl Default for OutcomeTracker {
    fn default() -> Self {
        Self::new()
    }
}
