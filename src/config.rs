use anyhow::Result;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub embeddings: EmbeddingsConfig,
    pub search: SearchConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub default_provider: String,
    pub default_model: String,
    /// Base URL override for OpenAI-compatible endpoints (OpenRouter, local
    /// inference servers). Empty means the official endpoint.
    pub openai_base_url: String,
}

impl LLMConfig {
    /// API key for the configured default provider, if one is set.
    pub fn active_api_key(&self) -> Option<String> {
        let key = match self.default_provider.as_str() {
            "anthropic" => &self.anthropic_api_key,
            _ => &self.openai_api_key,
        };
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// "cosine" or "dot"
    pub similarity: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub searxng_url: String,
    pub language: String,
    /// Directory holding pre-extracted file chunks and their embeddings.
    pub uploads_dir: String,
}

/// Tunables for the agent workflow. The preview split and per-hop document
/// cap mirror the upstream defaults but are deliberately configuration, not
/// constants baked into the agents.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Hard ceiling on agent steps across the whole run.
    pub recursion_limit: usize,
    /// Previews always kept in result order before ranking kicks in.
    pub preview_unranked: usize,
    /// Additional previews admitted by descending similarity.
    pub preview_ranked: usize,
    /// Upper bound on the whole preview set.
    pub preview_cap: usize,
    /// Full-content documents accepted per web-search hop.
    pub max_documents_per_hop: usize,
    /// Below this many characters a fetched page is relevance-checked and
    /// passed through raw instead of summarized.
    pub summarize_threshold_chars: usize,
    /// LLM outputs shorter than this are treated as degenerate.
    pub min_summary_chars: usize,
    /// Minimum similarity for a file chunk to rank at all.
    pub file_similarity_floor: f32,
    /// Chunk cap for the file search agent's execute path.
    pub file_search_limit: usize,
    /// Chunk cap for the standalone file search helper.
    pub file_helper_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            recursion_limit: 25,
            preview_unranked: 3,
            preview_ranked: 12,
            preview_cap: 15,
            max_documents_per_hop: 2,
            summarize_threshold_chars: 4000,
            min_summary_chars: 25,
            file_similarity_floor: 0.3,
            file_search_limit: 12,
            file_helper_limit: 8,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            llm: LLMConfig {
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
                default_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
                default_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                openai_base_url: env::var("OPENAI_BASE_URL").unwrap_or_default(),
            },
            embeddings: EmbeddingsConfig {
                api_key: env::var("EMBEDDINGS_API_KEY")
                    .or_else(|_| env::var("OPENAI_API_KEY"))
                    .unwrap_or_default(),
                model: env::var("EMBEDDINGS_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
                base_url: env::var("EMBEDDINGS_BASE_URL").unwrap_or_default(),
                similarity: env::var("SIMILARITY_MEASURE").unwrap_or_else(|_| "cosine".to_string()),
            },
            search: SearchConfig {
                searxng_url: env::var("SEARXNG_URL")
                    .unwrap_or_else(|_| "http://localhost:8888".to_string()),
                language: env::var("SEARCH_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
                uploads_dir: env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            },
            orchestrator: OrchestratorConfig {
                recursion_limit: env::var("RECURSION_LIMIT")
                    .unwrap_or_else(|_| "25".to_string())
                    .parse()?,
                ..OrchestratorConfig::default()
            },
        })
    }
}
