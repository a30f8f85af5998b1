use serde::{Deserialize, Serialize};

/// Lifecycle of the code runner for one session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Whether a run in this state has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate that a run state transition is valid.
///
/// A new submit restarts at `running` from any state, including `running`.
pub fn is_valid_transition(from: &RunState, to: &RunState) -> bool {
    matches!(
        (from, to),
        (_, RunState::Running)
            | (RunState::Running, RunState::Succeeded)
            | (RunState::Running, RunState::Failed)
    )
}

/// Current run state plus the output of the last finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub state: RunState,
    /// Id of the latest submitted run, 0 before the first one.
    pub run_id: u64,
    pub output: String,
}

/// Result of one `run` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: u64,
    /// Terminal state this run reached.
    pub state: RunState,
    pub output: String,
    /// False when a newer run had been submitted before this one finished;
    /// such a result never reaches the shared run state.
    pub applied: bool,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Succeeded
    }
}
