//! Remote service collaborators.
//!
//! The chat, summarization, execution and analysis services are reached only
//! through the traits below. `HttpServices` is the real implementation; tests
//! substitute in-memory doubles.

mod http;
mod wire;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ServiceError;
use crate::history::{RequestContext, Turn};

pub use http::HttpServices;
pub use wire::{
    AnalyzeResponse, ChatRequest, ChatResponse, ExecuteRequest, ExecuteResponse, SandboxResult,
    SummarizeRequest, SummarizeResponse,
};

/// Sends a user message with its bounded context and returns the reply text.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn chat(&self, message: &str, context: &RequestContext) -> Result<String, ServiceError>;
}

/// Produces a digest of a batch of turns.
#[async_trait]
pub trait SummaryService: Send + Sync {
    async fn summarize(&self, history: &[Turn]) -> Result<String, ServiceError>;
}

/// Runs code remotely.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn execute(&self, code: &str) -> Result<ExecuteResponse, ServiceError>;
}

/// Asks the backend to diagnose and fix failing code.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, code: &str, error: &str) -> Result<AnalyzeResponse, ServiceError>;
}

/// The set of collaborators a chat session talks to.
#[derive(Clone)]
pub struct ServiceSet {
    pub chat: Arc<dyn ChatService>,
    pub summary: Arc<dyn SummaryService>,
    pub execution: Arc<dyn ExecutionService>,
    pub analysis: Arc<dyn AnalysisService>,
}

impl ServiceSet {
    /// Use one value for every collaborator.
    pub fn shared<T>(services: Arc<T>) -> Self
    where
        T: ChatService + SummaryService + ExecutionService + AnalysisService + 'static,
    {
        Self {
            chat: services.clone(),
            summary: services.clone(),
            execution: services.clone(),
            analysis: services,
        }
    }
}
