//! Running summary merging and compaction records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fold a new digest into the running summary.
///
/// The existing summary is kept verbatim as prior context and the digest is
/// appended as its continuation, so the result always contains the previous
/// summary.
pub fn merge_summary(existing: &str, digest: &str) -> String {
    if existing.is_empty() {
        digest.to_string()
    } else {
        format!("Previously: {}\nThen: {}", existing, digest)
    }
}

/// What a single successful compaction did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionRecord {
    /// Number of turns removed from the front of the buffer.
    pub turns_folded: usize,
    /// Characters in the digest returned by the summarizer.
    pub digest_chars: usize,
    /// Characters in the running summary after merging.
    pub summary_chars: usize,
    /// Characters of turn content that were folded away.
    pub folded_chars: usize,
    pub compacted_at: DateTime<Utc>,
}

impl CompactionRecord {
    pub fn new(turns_folded: usize, folded_chars: usize, digest: &str, summary: &str) -> Self {
        Self {
            turns_folded,
            digest_chars: digest.len(),
            summary_chars: summary.len(),
            folded_chars,
            compacted_at: Utc::now(),
        }
    }

    /// Get a brief status for logging.
    pub fn status(&self) -> String {
        format!(
            "Folded {} turns: {} -> {} chars (summary now {} chars)",
            self.turns_folded, self.folded_chars, self.digest_chars, self.summary_chars
        )
    }
}
