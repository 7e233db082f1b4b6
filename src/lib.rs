//! Lodestar: an AI-assisted answer engine.
//!
//! A user query travels through a multi-agent workflow: task decomposition,
//! content routing, web/file search and URL summarization accumulate
//! evidence documents, an analyzer loops until the evidence suffices, and a
//! synthesizer streams a cited answer back over SSE.

pub mod agents;
pub mod config;
pub mod embeddings;
pub mod events;
pub mod files;
pub mod llm;
pub mod orchestrator;
pub mod retrieval;
pub mod routes;
pub mod search;
pub mod state;
pub mod types;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::embeddings::{Embedder, OpenAIEmbedder};
use crate::files::{DiskFileStore, FileStore};
use crate::llm::{LLMAdapter, LLM};
use crate::retrieval::{HttpPageFetcher, PageFetcher};
use crate::search::{SearchProvider, SearxngClient};
use crate::types::AppResult;

/// Shared application state: configuration plus the boundary services every
/// chat request's agent context is built from.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: Arc<dyn LLMAdapter>,
    pub embedder: Arc<dyn Embedder>,
    pub search: Arc<dyn SearchProvider>,
    pub files: Arc<dyn FileStore>,
    pub fetcher: Arc<dyn PageFetcher>,
}

impl AppState {
    pub fn from_config(config: Config) -> AppResult<Self> {
        let llm = LLM::from_config(&config.llm)?;
        let embedder = OpenAIEmbedder::new(&config.embeddings.api_key, &config.embeddings.model)
            .with_base_url(&config.embeddings.base_url);
        let search = SearxngClient::from_config(&config.search)?;
        let files = DiskFileStore::new(&config.search.uploads_dir);
        let fetcher = HttpPageFetcher::new()?;

        Ok(Self {
            config: Arc::new(config),
            llm: Arc::new(llm),
            embedder: Arc::new(embedder),
            search: Arc::new(search),
            files: Arc::new(files),
            fetcher: Arc::new(fetcher),
        })
    }
}
