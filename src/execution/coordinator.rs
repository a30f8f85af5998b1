//! Submits code to the remote runner and tracks the run state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::client::{ExecuteResponse, ExecutionService};
use crate::code_sync::EditorState;
use crate::errors::ServiceError;

use super::state::{RunReport, RunSnapshot, RunState, is_valid_transition};
use super::{NO_OUTPUT, UNKNOWN_EXECUTION_ERROR};

/// Runs editor code and keeps the latest run's state.
///
/// Every submit gets a fresh, monotonically increasing run id. Only the
/// result whose id is still the latest one updates the shared state; older
/// results are reported back with `applied = false`.
#[derive(Clone)]
pub struct ExecutionCoordinator {
    service: Arc<dyn ExecutionService>,
    next_id: Arc<AtomicU64>,
    inner: Arc<Mutex<RunSnapshot>>,
}

impl ExecutionCoordinator {
    pub fn new(service: Arc<dyn ExecutionService>) -> Self {
        Self {
            service,
            next_id: Arc::new(AtomicU64::new(0)),
            inner: Arc::new(Mutex::new(RunSnapshot::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn state(&self) -> RunSnapshot {
        self.lock().clone()
    }

    pub fn latest_run_id(&self) -> u64 {
        self.lock().run_id
    }

    /// Run `code`. Blank code is a no-op and returns `None`.
    pub async fn run(&self, code: &str) -> Option<RunReport> {
        if code.trim().is_empty() {
            return None;
        }

        let run_id = self.begin();
        tracing::debug!(run_id, chars = code.len(), "submitting code for execution");

        let result = self.service.execute(code).await;
        let (state, output) = classify(result);

        let applied = self.finish(run_id, state, &output);
        if applied {
            tracing::debug!(run_id, state = %state, "run finished");
        } else {
            tracing::debug!(run_id, state = %state, "discarding result of superseded run");
        }

        Some(RunReport {
            run_id,
            state,
            output,
            applied,
        })
    }

    /// Run whatever the editor currently holds.
    pub async fn run_editor(&self, editor: &EditorState) -> Option<RunReport> {
        let code = editor.code();
        self.run(&code).await
    }

    fn begin(&self) -> u64 {
        let run_id = self.next_id.fetch_add(1, Ordering::AcqRel) + 1;
        let mut inner = self.lock();
        // Ids are taken before the lock, so a later id may already be in.
        if run_id > inner.run_id && is_valid_transition(&inner.state, &RunState::Running) {
            inner.run_id = run_id;
            inner.state = RunState::Running;
        }
        run_id
    }

    fn finish(&self, run_id: u64, state: RunState, output: &str) -> bool {
        let mut inner = self.lock();
        if inner.run_id != run_id || !is_valid_transition(&inner.state, &state) {
            return false;
        }
        inner.state = state;
        inner.output = output.to_string();
        true
    }
}

impl std::fmt::Debug for ExecutionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionCoordinator")
            .field("state", &self.state())
            .finish()
    }
}

/// Map a runner result to a terminal state and the text to display.
fn classify(result: Result<ExecuteResponse, ServiceError>) -> (RunState, String) {
    match result {
        Ok(resp) if resp.is_error() => {
            let detail = [resp.stderr(), error_text(&resp)]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_EXECUTION_ERROR);
            (RunState::Failed, format!("Error:\n{}", detail))
        }
        Ok(resp) => {
            let output = [resp.stdout(), resp.stderr()]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or(NO_OUTPUT);
            (RunState::Succeeded, output.to_string())
        }
        Err(ServiceError::Status { status, detail }) if detail.trim().is_empty() => (
            RunState::Failed,
            format!("Execution Error: HTTP error! status: {}", status),
        ),
        Err(e) => (RunState::Failed, format!("Execution Error: {}", e)),
    }
}

fn error_text(resp: &ExecuteResponse) -> &str {
    match &resp.error {
        Some(serde_json::Value::String(text)) => text,
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Runner double that echoes the code as stdout unless a canned
    /// response is registered. Individual codes can be held open.
    #[derive(Default)]
    struct FakeRunner {
        calls: AtomicUsize,
        canned: HashMap<String, Result<ExecuteResponse, u16>>,
        gates: HashMap<String, Arc<Notify>>,
        started: Notify,
    }

    impl FakeRunner {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExecutionService for FakeRunner {
        async fn execute(&self, code: &str) -> Result<ExecuteResponse, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            if let Some(gate) = self.gates.get(code) {
                gate.notified().await;
            }
            match self.canned.get(code) {
                Some(Ok(resp)) => Ok(resp.clone()),
                Some(Err(status)) => Err(ServiceError::Status {
                    status: *status,
                    detail: "sandbox unavailable".to_string(),
                }),
                None => Ok(ExecuteResponse::output(format!("{}\n", code), "")),
            }
        }
    }

    fn coordinator(runner: FakeRunner) -> (ExecutionCoordinator, Arc<FakeRunner>) {
        let runner = Arc::new(runner);
        (ExecutionCoordinator::new(runner.clone()), runner)
    }

    #[tokio::test]
    async fn test_blank_code_is_a_no_op() {
        let (exec, runner) = coordinator(FakeRunner::default());

        assert!(exec.run("").await.is_none());
        assert!(exec.run("   ").await.is_none());
        assert!(exec.run("\n\t").await.is_none());

        assert_eq!(runner.calls(), 0);
        assert_eq!(exec.state().state, RunState::Idle);
        assert_eq!(exec.latest_run_id(), 0);
    }

    #[tokio::test]
    async fn test_successful_run() {
        let mut runner = FakeRunner::default();
        runner.canned.insert(
            "print(1)".to_string(),
            Ok(ExecuteResponse::output("1\n", "")),
        );
        let (exec, _) = coordinator(runner);

        let report = exec.run("print(1)").await.unwrap();
        assert!(report.succeeded());
        assert!(report.applied);
        assert_eq!(report.run_id, 1);
        assert!(report.output.contains('1'));

        let state = exec.state();
        assert_eq!(state.state, RunState::Succeeded);
        assert_eq!(state.output, "1\n");
    }

    #[tokio::test]
    async fn test_stderr_only_still_succeeds() {
        let mut runner = FakeRunner::default();
        runner.canned.insert(
            "warn()".to_string(),
            Ok(ExecuteResponse::output("", "DeprecationWarning: x")),
        );
        let (exec, _) = coordinator(runner);

        let report = exec.run("warn()").await.unwrap();
        assert_eq!(report.state, RunState::Succeeded);
        assert_eq!(report.output, "DeprecationWarning: x");
    }

    #[tokio::test]
    async fn test_no_output_placeholder() {
        let mut runner = FakeRunner::default();
        runner
            .canned
            .insert("x = 1".to_string(), Ok(ExecuteResponse::output("", "")));
        let (exec, _) = coordinator(runner);

        let report = exec.run("x = 1").await.unwrap();
        assert_eq!(report.state, RunState::Succeeded);
        assert_eq!(report.output, NO_OUTPUT);
    }

    #[tokio::test]
    async fn test_error_flag_fails_with_stderr() {
        let mut runner = FakeRunner::default();
        runner.canned.insert(
            "1/0".to_string(),
            Ok(ExecuteResponse::failure("ZeroDivisionError: division by zero")),
        );
        runner
            .canned
            .insert("boom".to_string(), Ok(ExecuteResponse::failure("")));
        let (exec, _) = coordinator(runner);

        let report = exec.run("1/0").await.unwrap();
        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.output, "Error:\nZeroDivisionError: division by zero");

        let report = exec.run("boom").await.unwrap();
        assert_eq!(report.output, "Error:\nUnknown execution error");
    }

    #[tokio::test]
    async fn test_error_string_used_when_stderr_empty() {
        let resp: ExecuteResponse =
            serde_json::from_str(r#"{"stdout": "", "error": "Timeout after 5s"}"#).unwrap();
        let mut runner = FakeRunner::default();
        runner.canned.insert("loop()".to_string(), Ok(resp));
        let (exec, _) = coordinator(runner);

        let report = exec.run("loop()").await.unwrap();
        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.output, "Error:\nTimeout after 5s");
    }

    #[tokio::test]
    async fn test_service_status_fails_with_detail() {
        let mut runner = FakeRunner::default();
        runner.canned.insert("x".to_string(), Err(503));
        let (exec, _) = coordinator(runner);

        let report = exec.run("x").await.unwrap();
        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.output, "Execution Error: sandbox unavailable");
        assert_eq!(exec.state().state, RunState::Failed);
    }

    #[test]
    fn test_classify_transport_and_empty_status() {
        let (state, output) = classify(Err(ServiceError::Transport(
            "connection refused".to_string(),
        )));
        assert_eq!(state, RunState::Failed);
        assert_eq!(output, "Execution Error: connection refused");

        let (_, output) = classify(Err(ServiceError::Status {
            status: 500,
            detail: String::new(),
        }));
        assert_eq!(output, "Execution Error: HTTP error! status: 500");

        let (_, output) = classify(Err(ServiceError::Timeout { secs: 60 }));
        assert_eq!(output, "Execution Error: request timed out after 60s");
    }

    #[tokio::test]
    async fn test_run_ids_are_monotonic() {
        let (exec, _) = coordinator(FakeRunner::default());
        let a = exec.run("a").await.unwrap();
        let b = exec.run("b").await.unwrap();
        assert!(b.run_id > a.run_id);
        assert_eq!(exec.latest_run_id(), b.run_id);
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let gate = Arc::new(Notify::new());
        let mut runner = FakeRunner::default();
        runner.gates.insert("slow()".to_string(), gate.clone());
        let (exec, runner) = coordinator(runner);

        let slow = {
            let exec = exec.clone();
            tokio::spawn(async move { exec.run("slow()").await })
        };
        runner.started.notified().await;

        let fast = exec.run("fast()").await.unwrap();
        assert!(fast.applied);
        assert_eq!(exec.state().output, "fast()\n");

        gate.notify_one();
        let slow = slow.await.unwrap().unwrap();
        assert!(!slow.applied);
        assert!(slow.run_id < fast.run_id);
        assert_eq!(slow.state, RunState::Succeeded);

        let state = exec.state();
        assert_eq!(state.run_id, fast.run_id);
        assert_eq!(state.output, "fast()\n");
    }

    #[tokio::test]
    async fn test_run_editor_uses_editor_content() {
        let (exec, runner) = coordinator(FakeRunner::default());
        let mut editor = EditorState::in_memory();

        assert!(exec.run_editor(&editor).await.is_none());
        assert_eq!(runner.calls(), 0);

        editor.replace("print('hi')");
        let report = exec.run_editor(&editor).await.unwrap();
        assert_eq!(report.output, "print('hi')\n");
    }
}
