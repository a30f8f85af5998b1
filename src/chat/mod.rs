//! Chat orchestration.
//!
//! A `ChatSession` sequences one exchange:
//!
//! 1. append the user turn and close the input gate
//! 2. call the chat service with the bounded request context
//! 3. append the reply (or the inline error text)
//! 4. start a background compaction when the history is due
//! 5. sync any code in the reply into the editor
//!
//! The gate reopens when the exchange ends, however it ends.

mod session;

pub use session::{ChatSession, SendOutcome};
