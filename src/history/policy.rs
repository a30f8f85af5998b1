//! Compaction policy parsing and validation.

use crate::errors::ConfigError;

use super::{DEFAULT_BATCH_SIZE, DEFAULT_CONTEXT_WINDOW, DEFAULT_THRESHOLD};

/// When to compact, how much to fold, and how much context to send.
///
/// Invariant: `0 < batch_size <= threshold` and `context_window > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    threshold: usize,
    batch_size: usize,
    context_window: usize,
}

impl CompactionPolicy {
    /// Create a validated policy.
    pub fn new(
        threshold: usize,
        batch_size: usize,
        context_window: usize,
    ) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidPolicy(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if batch_size > threshold {
            return Err(ConfigError::InvalidPolicy(format!(
                "batch_size ({}) cannot exceed threshold ({})",
                batch_size, threshold
            )));
        }
        if context_window == 0 {
            return Err(ConfigError::InvalidPolicy(
                "context_window must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            threshold,
            batch_size,
            context_window,
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Whether a buffer of `len` turns is due for compaction.
    pub fn should_compact(&self, len: usize) -> bool {
        len >= self.threshold
    }
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

impl std::fmt::Display for CompactionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "threshold={} batch={} window={}",
            self.threshold, self.batch_size, self.context_window
        )
    }
}
