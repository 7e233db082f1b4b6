use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};

/// Incremental response text chunks.
pub type TokenStream = BoxStream<'static, AppResult<String>>;

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;

    /// Stream the completion token-by-token. Adapters parse their provider's
    /// SSE framing; consumers only ever see text chunks.
    async fn create_chat_completion_stream(&self, request: &LLMRequest)
        -> AppResult<TokenStream>;
}

/// Configuration for an LLM provider connection.
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    /// Base URL override for OpenAI-compatible gateways. Empty = official.
    pub base_url: String,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let adapter: Box<dyn LLMAdapter> = match provider.name.as_str() {
            // OpenRouter and Groq speak the OpenAI wire format; they differ
            // only in base URL.
            "openai" | "openrouter" | "groq" => Box::new(
                crate::llm::openai::OpenAIAdapter::new(&provider.api_key)
                    .with_base_url(&provider.base_url),
            ),
            "anthropic" => Box::new(crate::llm::anthropic::AnthropicAdapter::new(
                &provider.api_key,
            )),
            other => {
                return Err(AppError::InvalidRequest(format!(
                    "unsupported LLM provider: {}",
                    other
                )))
            }
        };

        Ok(Self {
            adapter,
            provider_name: provider.name,
        })
    }

    pub fn from_config(config: &crate::config::LLMConfig) -> AppResult<Self> {
        let api_key = config.active_api_key().ok_or_else(|| {
            AppError::InvalidRequest(format!(
                "no API key configured for provider {}",
                config.default_provider
            ))
        })?;
        Self::new(LLMProviderConfig {
            name: config.default_provider.clone(),
            api_key,
            base_url: config.openai_base_url.clone(),
        })
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    pub async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<TokenStream> {
        self.adapter.create_chat_completion_stream(request).await
    }
}

// The facade itself satisfies the adapter trait, so callers that only need
// the boundary can hold `Arc<dyn LLMAdapter>` regardless of provider.
#[async_trait]
impl LLMAdapter for LLM {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<TokenStream> {
        self.adapter.create_chat_completion_stream(request).await
    }
}

/// Token totals accumulated across every completion of a run. Cloned handles
/// share the same counter.
#[derive(Debug, Clone, Default)]
pub struct UsageMeter {
    totals: Arc<Mutex<TokenUsage>>,
}

impl UsageMeter {
    pub fn record(&self, usage: &TokenUsage) {
        if let Ok(mut totals) = self.totals.lock() {
            totals.add(usage);
        }
    }

    pub fn totals(&self) -> TokenUsage {
        self.totals.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

/// Adapter wrapper feeding a `UsageMeter` from completion responses. Token
/// streams carry no usage, so streamed calls pass through unmetered.
pub struct MeteredLLM {
    inner: Arc<dyn LLMAdapter>,
    meter: UsageMeter,
}

impl MeteredLLM {
    pub fn new(inner: Arc<dyn LLMAdapter>, meter: UsageMeter) -> Self {
        Self { inner, meter }
    }
}

#[async_trait]
impl LLMAdapter for MeteredLLM {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let response = self.inner.create_chat_completion(request).await?;
        self.meter.record(&response.usage);
        Ok(response)
    }

    async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<TokenStream> {
        self.inner.create_chat_completion_stream(request).await
    }
}
