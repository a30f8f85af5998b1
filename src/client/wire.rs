//! JSON bodies exchanged with the backend.

use serde::{Deserialize, Serialize};

use crate::history::Turn;

/// Body of `POST /chat`.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub history: &'a [Turn],
    pub summary: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Body of `POST /summarize`.
#[derive(Debug, Serialize)]
pub struct SummarizeRequest<'a> {
    pub history: &'a [Turn],
}

#[derive(Debug, Deserialize)]
pub struct SummarizeResponse {
    #[serde(default)]
    pub summary: String,
}

/// Body of `POST /execute`.
#[derive(Debug, Serialize)]
pub struct ExecuteRequest<'a> {
    pub code: &'a str,
}

/// Result of `POST /execute`.
///
/// `error` is either a boolean flag or the error text itself, depending on
/// the backend version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl ExecuteResponse {
    /// Successful result with the given streams.
    pub fn output(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: Some(true),
            stdout: Some(stdout.into()),
            stderr: Some(stderr.into()),
            error: None,
        }
    }

    /// Result flagged as an error by the runner.
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            stdout: None,
            stderr: Some(stderr.into()),
            error: Some(serde_json::Value::Bool(true)),
        }
    }

    /// Whether the runner flagged this result as an error.
    pub fn is_error(&self) -> bool {
        match &self.error {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(text)) => !text.trim().is_empty(),
            Some(_) => true,
        }
    }

    pub fn stdout(&self) -> &str {
        self.stdout.as_deref().unwrap_or("")
    }

    pub fn stderr(&self) -> &str {
        self.stderr.as_deref().unwrap_or("")
    }
}

/// Sandbox verdict embedded in an analysis result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of `POST /analyze`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub original_code: String,
    #[serde(default)]
    pub fixed_code: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub execution_result: Option<SandboxResult>,
}
