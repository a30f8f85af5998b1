//! One conversation: history, editor and runner wired to the services.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::client::{AnalyzeResponse, ServiceSet};
use crate::code_sync::{CodeExtraction, CodeSyncRouter, EditorState, code_blocks, has_fence};
use crate::errors::ServiceError;
use crate::execution::{ExecutionCoordinator, RunReport, RunSnapshot, RunState};
use crate::history::{CompactionOutcome, CompactionPolicy, HistoryBuffer, Role};

/// What happened to one `send` call.
#[derive(Debug)]
pub enum SendOutcome {
    /// Blank input, or a previous send is still unresolved. Nothing changed.
    Rejected,
    /// The assistant answered; both turns were appended.
    Replied {
        reply: String,
        /// Code synced into the editor, if the reply carried any.
        code: Option<CodeExtraction>,
        /// Whether this reply pushed the history over the threshold and a
        /// compaction was started.
        compaction_started: bool,
    },
    /// The chat call failed; an assistant turn carrying `message` was appended.
    Failed { message: String, error: ServiceError },
}

impl SendOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, SendOutcome::Rejected)
    }

    /// Text appended as the assistant turn, if any.
    pub fn assistant_text(&self) -> Option<&str> {
        match self {
            SendOutcome::Rejected => None,
            SendOutcome::Replied { reply, .. } => Some(reply),
            SendOutcome::Failed { message, .. } => Some(message),
        }
    }
}

/// Reopens the input gate on drop, including when a send is cancelled.
struct InputGuard(Arc<AtomicBool>);

impl InputGuard {
    fn acquire(gate: &Arc<AtomicBool>) -> Option<Self> {
        gate.compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(gate.clone()))
    }
}

impl Drop for InputGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// A single chat conversation.
///
/// Owns the history buffer, the editor state and the execution coordinator.
/// Methods take `&self`; internal locks are never held across an `.await`.
pub struct ChatSession {
    id: Uuid,
    span: tracing::Span,
    services: ServiceSet,
    history: HistoryBuffer,
    router: CodeSyncRouter,
    editor: Mutex<EditorState>,
    execution: ExecutionCoordinator,
    input_open: Arc<AtomicBool>,
    pending_compaction: Mutex<Option<JoinHandle<CompactionOutcome>>>,
}

impl ChatSession {
    pub fn new(
        services: ServiceSet,
        policy: CompactionPolicy,
        router: CodeSyncRouter,
        editor: EditorState,
    ) -> Self {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("chat_session", session_id = %id);
        let execution = ExecutionCoordinator::new(services.execution.clone());

        Self {
            id,
            span,
            services,
            history: HistoryBuffer::new(policy),
            router,
            editor: Mutex::new(editor),
            execution,
            input_open: Arc::new(AtomicBool::new(true)),
            pending_compaction: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn run_state(&self) -> RunSnapshot {
        self.execution.state()
    }

    pub fn editor_code(&self) -> String {
        self.editor().code()
    }

    pub fn is_sidecar_visible(&self) -> bool {
        self.editor().is_sidecar_visible()
    }

    /// Whether a new message would be accepted right now.
    pub fn is_input_open(&self) -> bool {
        self.input_open.load(Ordering::Acquire)
    }

    fn editor(&self) -> MutexGuard<'_, EditorState> {
        self.editor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send a user message and process the reply.
    ///
    /// Failures are folded into the transcript; this never returns an error.
    pub async fn send(&self, message: &str) -> SendOutcome {
        let message = message.trim();
        if message.is_empty() {
            return SendOutcome::Rejected;
        }
        let Some(_guard) = InputGuard::acquire(&self.input_open) else {
            tracing::debug!("input gate closed, message dropped");
            return SendOutcome::Rejected;
        };

        self.exchange(message).instrument(self.span.clone()).await
    }

    async fn exchange(&self, message: &str) -> SendOutcome {
        self.history.append_turn(Role::User, message);
        let context = self.history.context_for_request();
        tracing::debug!(
            endpoint = "chat",
            turns = context.history.len(),
            summary_chars = context.summary.len(),
            "sending message"
        );

        match self.services.chat.chat(message, &context).await {
            Ok(reply) => {
                self.history.append_turn(Role::Assistant, reply.clone());
                let compaction_started = self.start_compaction();
                let code = self.sync_reply(&reply);
                SendOutcome::Replied {
                    reply,
                    code,
                    compaction_started,
                }
            }
            Err(error) => {
                let message = error.user_message();
                tracing::warn!(error = %error, "chat request failed");
                self.history.append_turn(Role::Assistant, message.clone());
                SendOutcome::Failed { message, error }
            }
        }
    }

    fn start_compaction(&self) -> bool {
        let Some(handle) = self.history.maybe_compact(self.services.summary.clone()) else {
            return false;
        };
        let mut pending = self
            .pending_compaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Single-flight: any previous handle has already finished.
        *pending = Some(handle);
        true
    }

    fn sync_reply(&self, reply: &str) -> Option<CodeExtraction> {
        let mut editor = self.editor();
        let code = self.router.route(reply, &mut editor);
        // Visibility follows raw fence presence, even when nothing was extracted.
        if has_fence(reply) {
            editor.show_sidecar();
        }
        code
    }

    /// Code of the `index`-th fenced block (0-based) of the latest
    /// assistant turn.
    pub fn copy_block(&self, index: usize) -> Option<String> {
        let turn = self.history.last_assistant_turn()?;
        code_blocks(turn.content()).into_iter().nth(index)
    }

    /// Replace the editor content with `code`, show the sidecar and run it.
    pub async fn edit_and_run(&self, code: &str) -> Option<RunReport> {
        {
            let mut editor = self.editor();
            editor.replace(code);
            editor.show_sidecar();
        }
        self.run_editor().await
    }

    /// Run the current editor content.
    pub async fn run_editor(&self) -> Option<RunReport> {
        let code = self.editor_code();
        self.execution
            .run(&code)
            .instrument(self.span.clone())
            .await
    }

    /// Ask the analysis service to fix the code of the last failed run.
    ///
    /// Returns `Ok(None)` when the last run did not fail or the editor is
    /// empty. A non-empty fix that differs from the current code replaces the
    /// editor content.
    pub async fn analyze_last_failure(&self) -> Result<Option<AnalyzeResponse>, ServiceError> {
        let run = self.execution.state();
        if run.state != RunState::Failed {
            return Ok(None);
        }
        let code = self.editor_code();
        if code.trim().is_empty() {
            return Ok(None);
        }

        tracing::debug!(endpoint = "analyze", run_id = run.run_id, "requesting fix");
        let analysis = self
            .services
            .analysis
            .analyze(&code, &run.output)
            .instrument(self.span.clone())
            .await?;

        let fixed = analysis.fixed_code.trim();
        if !fixed.is_empty() && fixed != code.trim() {
            let mut editor = self.editor();
            editor.replace(fixed);
            editor.show_sidecar();
        }
        Ok(Some(analysis))
    }

    /// Wait for any pending compaction to finish.
    pub async fn settle(&self) -> Option<CompactionOutcome> {
        let handle = self
            .pending_compaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "compaction task did not complete");
                None
            }
        }
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("turns", &self.history.len())
            .field("run_state", &self.execution.state().state)
            .finish()
    }
}
