//! Append-only turn log with single-flight compaction into a running summary.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::client::SummaryService;
use crate::errors::ServiceError;

use super::policy::CompactionPolicy;
use super::summary::{CompactionRecord, merge_summary};
use super::turn::{RequestContext, Role, Turn};

/// A consistent copy of the conversation at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    /// Turns not yet folded into the summary, oldest first.
    pub turns: Vec<Turn>,
    /// Digest of every turn removed by compaction, if any.
    pub summary: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    turns: VecDeque<Turn>,
    summary: String,
    compactions: u32,
    last_compaction: Option<CompactionRecord>,
}

/// Result of one compaction attempt.
#[derive(Debug)]
pub enum CompactionOutcome {
    /// The batch was folded into the summary and removed from the buffer.
    Compacted(CompactionRecord),
    /// The summarizer failed; buffer and summary are unchanged.
    Failed(ServiceError),
}

impl CompactionOutcome {
    pub fn is_compacted(&self) -> bool {
        matches!(self, CompactionOutcome::Compacted(_))
    }
}

/// Manages the conversation log for one session.
///
/// The buffer:
/// 1. Appends turns in conversation order
/// 2. Hands out a bounded context for each chat request
/// 3. Folds the oldest batch into the summary once the threshold is reached
///
/// State sits behind a lock that is never held across an `.await`, so appends
/// proceed while a summarization request is pending.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    policy: CompactionPolicy,
    inner: Arc<Mutex<Inner>>,
    in_flight: Arc<AtomicBool>,
}

impl HistoryBuffer {
    pub fn new(policy: CompactionPolicy) -> Self {
        Self {
            policy,
            inner: Arc::new(Mutex::new(Inner::default())),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    /// Append a turn and return the new buffer length.
    pub fn append_turn(&self, role: Role, content: impl Into<String>) -> usize {
        let mut inner = self.lock();
        inner.turns.push_back(Turn::new(role, content));
        inner.turns.len()
    }

    pub fn len(&self) -> usize {
        self.lock().turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().turns.is_empty()
    }

    /// The running summary, empty when nothing has been compacted.
    pub fn summary(&self) -> String {
        self.lock().summary.clone()
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.lock().turns.iter().cloned().collect()
    }

    pub fn last_turn(&self) -> Option<Turn> {
        self.lock().turns.back().cloned()
    }

    /// Latest assistant turn still in the buffer.
    pub fn last_assistant_turn(&self) -> Option<Turn> {
        self.lock()
            .turns
            .iter()
            .rev()
            .find(|t| t.role() == Role::Assistant)
            .cloned()
    }

    pub fn snapshot(&self) -> ConversationState {
        let inner = self.lock();
        ConversationState {
            turns: inner.turns.iter().cloned().collect(),
            summary: (!inner.summary.is_empty()).then(|| inner.summary.clone()),
        }
    }

    /// Summary plus the last `context_window` turns, excluding the newest one.
    ///
    /// Reads one consistent snapshot; never mutates state.
    pub fn context_for_request(&self) -> RequestContext {
        let inner = self.lock();
        let end = inner.turns.len().saturating_sub(1);
        let start = end.saturating_sub(self.policy.context_window());

        RequestContext {
            summary: inner.summary.clone(),
            history: inner.turns.range(start..end).cloned().collect(),
        }
    }

    /// Whether a compaction is currently in flight.
    pub fn is_compacting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Number of successful compactions so far.
    pub fn compactions(&self) -> u32 {
        self.lock().compactions
    }

    pub fn last_compaction(&self) -> Option<CompactionRecord> {
        self.lock().last_compaction.clone()
    }

    /// Start a compaction in the background if one is due.
    ///
    /// Returns `None` when the buffer is below the threshold or another
    /// compaction is still pending.
    pub fn maybe_compact(
        &self,
        summarizer: Arc<dyn SummaryService>,
    ) -> Option<JoinHandle<CompactionOutcome>> {
        let ticket = self.begin_compaction()?;
        Some(tokio::spawn(ticket.run(summarizer)))
    }

    /// Claim the single-flight slot and snapshot the batch to fold.
    ///
    /// The slot stays claimed until the returned ticket is run to completion
    /// or dropped.
    pub fn begin_compaction(&self) -> Option<CompactionTicket> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("compaction already in flight, skipping trigger");
            return None;
        }
        let guard = InFlightGuard(self.in_flight.clone());

        let batch: Vec<Turn> = {
            let inner = self.lock();
            if !self.policy.should_compact(inner.turns.len()) {
                return None;
            }
            inner
                .turns
                .iter()
                .take(self.policy.batch_size())
                .cloned()
                .collect()
        };

        tracing::info!(
            turns = batch.len(),
            policy = %self.policy,
            "history threshold reached, summarizing older turns"
        );

        Some(CompactionTicket {
            batch,
            inner: self.inner.clone(),
            _guard: guard,
        })
    }
}

/// A claimed compaction: the batch to summarize and the slot guard.
#[derive(Debug)]
pub struct CompactionTicket {
    batch: Vec<Turn>,
    inner: Arc<Mutex<Inner>>,
    _guard: InFlightGuard,
}

impl CompactionTicket {
    pub fn batch(&self) -> &[Turn] {
        &self.batch
    }

    /// Summarize the batch and fold it in.
    ///
    /// On any failure the buffer and summary are left untouched.
    pub async fn run(self, summarizer: Arc<dyn SummaryService>) -> CompactionOutcome {
        let digest = match summarizer.summarize(&self.batch).await {
            Ok(digest) if digest.trim().is_empty() => {
                tracing::warn!("summarization failed: empty digest");
                return CompactionOutcome::Failed(ServiceError::EmptySummary);
            }
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(error = %e, "summarization failed");
                return CompactionOutcome::Failed(e);
            }
        };

        let record = self.apply(digest.trim());
        tracing::info!("{}", record.status());
        CompactionOutcome::Compacted(record)
    }

    fn apply(&self, digest: &str) -> CompactionRecord {
        let mut inner = lock_inner(&self.inner);

        // Only compaction removes turns and it is single-flight, so the
        // batch is still at the front.
        debug_assert!(inner.turns.iter().zip(&self.batch).all(|(a, b)| a == b));

        let folded = self.batch.len().min(inner.turns.len());
        let folded_chars: usize = inner
            .turns
            .drain(..folded)
            .map(|t| t.content().len())
            .sum();

        inner.summary = merge_summary(&inner.summary, digest);
        inner.compactions += 1;

        let record = CompactionRecord::new(folded, folded_chars, digest, &inner.summary);
        inner.last_compaction = Some(record.clone());
        record
    }
}

/// Releases the single-flight slot on drop.
#[derive(Debug)]
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
