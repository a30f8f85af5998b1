//! Conversation History
//!
//! This module keeps the bounded conversation context sent with every chat
//! request.
//!
//! ## Features
//!
//! - **Append-only turn log**: turns are kept in conversation order
//! - **Request windowing**: only the summary plus the most recent turns are sent
//! - **Threshold compaction**: the oldest batch of turns is folded into a running
//!   summary by the remote summarizer once the log reaches the threshold
//! - **Single-flight**: at most one compaction is in flight at a time
//!
//! ## Configuration
//!
//! The compaction policy is configured in `.coder/coder.toml`:
//!
//! ```toml
//! [history]
//! threshold = 16
//! batch_size = 10
//! context_window = 10
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use coder::history::{CompactionPolicy, HistoryBuffer, Role};
//!
//! let history = HistoryBuffer::new(CompactionPolicy::default());
//! history.append_turn(Role::User, "hi");
//! let ctx = history.context_for_request();
//!
//! if let Some(handle) = history.maybe_compact(summarizer.clone()) {
//!     let outcome = handle.await?;
//! }
//! ```

mod buffer;
mod policy;
mod summary;
mod turn;

pub use buffer::{CompactionOutcome, CompactionTicket, ConversationState, HistoryBuffer};
pub use policy::CompactionPolicy;
pub use summary::{CompactionRecord, merge_summary};
pub use turn::{RequestContext, Role, Turn};

/// Buffer length that triggers compaction.
pub const DEFAULT_THRESHOLD: usize = 16;

/// Oldest turns folded into the summary per compaction.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Turns sent as context with each chat request (the newest turn excluded).
pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        assert!(DEFAULT_BATCH_SIZE > 0);
        assert!(DEFAULT_BATCH_SIZE <= DEFAULT_THRESHOLD);
        assert!(DEFAULT_CONTEXT_WINDOW > 0);
    }
}
