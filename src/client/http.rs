use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::ServiceError;
use crate::history::{RequestContext, Turn};

use super::wire::{
    AnalyzeResponse, ChatRequest, ChatResponse, ExecuteRequest, ExecuteResponse,
    SummarizeRequest, SummarizeResponse,
};
use super::{AnalysisService, ChatService, ExecutionService, SummaryService};

const CHAT_PATH: &str = "chat";
const SUMMARIZE_PATH: &str = "summarize";
const EXECUTE_PATH: &str = "execute";
const ANALYZE_PATH: &str = "analyze";

/// HTTP implementation of every service collaborator.
///
/// Each request is bounded by the configured timeout; a request that exceeds
/// it fails with `ServiceError::Timeout` instead of stalling the caller.
#[derive(Debug, Clone)]
pub struct HttpServices {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpServices {
    /// Build the client. A zero timeout or a base URL without an
    /// `http(s)://` scheme would fail every call, so both are rejected here.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let base_url = base_url.into();
        if timeout.is_zero() {
            return Err(ServiceError::InvalidClient(
                "timeout must be greater than 0".to_string(),
            ));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ServiceError::InvalidClient(format!(
                "base_url '{}' should start with http:// or https://",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("coder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn classify(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            ServiceError::from(err)
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!(endpoint = path, "sending request");
        let resp = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let resp = self.check_status(resp).await?;
        resp.json::<R>().await.map_err(|e| self.classify(e))
    }

    /// Turn a non-success response into `ServiceError::Status` with its detail.
    async fn check_status(&self, resp: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.map_err(|e| self.classify(e))?;
        let detail = error_detail(&body);
        tracing::debug!(status = status.as_u16(), %detail, "service returned error status");

        Err(ServiceError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}

/// Pull the human-readable detail out of an error body.
///
/// The backend answers `{"detail": "..."}`; validation failures carry a
/// structured detail, which is rendered as JSON text.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        },
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl ChatService for HttpServices {
    async fn chat(&self, message: &str, context: &RequestContext) -> Result<String, ServiceError> {
        let body = ChatRequest {
            message,
            history: &context.history,
            summary: &context.summary,
        };
        let resp: ChatResponse = self.post_json(CHAT_PATH, &body).await?;
        Ok(resp.response)
    }
}

#[async_trait]
impl SummaryService for HttpServices {
    async fn summarize(&self, history: &[Turn]) -> Result<String, ServiceError> {
        let resp: SummarizeResponse = self
            .post_json(SUMMARIZE_PATH, &SummarizeRequest { history })
            .await?;
        Ok(resp.summary)
    }
}

#[async_trait]
impl ExecutionService for HttpServices {
    async fn execute(&self, code: &str) -> Result<ExecuteResponse, ServiceError> {
        self.post_json(EXECUTE_PATH, &ExecuteRequest { code }).await
    }
}

#[async_trait]
impl AnalysisService for HttpServices {
    async fn analyze(&self, code: &str, error: &str) -> Result<AnalyzeResponse, ServiceError> {
        // The analyze endpoint takes its arguments as query parameters.
        tracing::debug!(endpoint = ANALYZE_PATH, "sending request");
        let resp = self
            .client
            .post(self.endpoint(ANALYZE_PATH))
            .query(&[("code", code), ("error", error)])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let resp = self.check_status(resp).await?;
        resp.json::<AnalyzeResponse>()
            .await
            .map_err(|e| self.classify(e))
    }
}
