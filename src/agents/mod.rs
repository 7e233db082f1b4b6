//! The agent graph.
//!
//! Eight specialized agents cooperate on a shared `WorkflowState`: the task
//! manager decomposes the question, the content router picks the next hop,
//! the retrieval agents (web search, file search, URL summarizer) accumulate
//! documents, the analyzer judges sufficiency, and the synthesizer streams
//! the cited answer. Each agent step returns a `StateUpdate` patch the
//! orchestrator applies atomically.

pub mod analyzer;
pub mod file_search;
pub mod router;
pub mod synthesizer;
pub mod task_manager;
pub mod url_summarizer;
pub mod web_search;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::embeddings::Embedder;
use crate::events::EventSink;
use crate::files::FileStore;
use crate::llm::{LLMAdapter, UsageMeter};
use crate::retrieval::PageFetcher;
use crate::search::SearchProvider;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};

/// Everything an agent step needs: the boundary services, the run's
/// configuration, the event channel, and the cancellation signal. Cloned
/// cheaply per step.
#[derive(Clone)]
pub struct AgentContext {
    pub llm: Arc<dyn LLMAdapter>,
    pub embedder: Arc<dyn Embedder>,
    pub search: Arc<dyn SearchProvider>,
    pub files: Arc<dyn FileStore>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub config: Arc<Config>,
    pub events: EventSink,
    pub cancel: CancellationToken,
    /// Run-level token totals, fed by the metered `llm` handle.
    pub usage: UsageMeter,
}

impl AgentContext {
    /// A chat request against the configured default model.
    pub fn request(&self, messages: Vec<LLMMessage>) -> LLMRequest {
        LLMRequest {
            provider: self.config.llm.default_provider.clone(),
            model: self.config.llm.default_model.clone(),
            messages,
            max_tokens: None,
            temperature: None,
            system_instruction: None,
        }
    }

    /// A deterministic request for extraction/decision calls. Temperature is
    /// a per-call parameter, never shared adapter state.
    pub fn extraction_request(&self, messages: Vec<LLMMessage>) -> LLMRequest {
        let mut request = self.request(messages);
        request.temperature = Some(0.0);
        request
    }

    pub fn ensure_active(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}
