//! Search provider abstraction.
//!
//! Every provider implementation normalizes to the same result shape so the
//! web search agent never cares which engine answered.

pub mod searxng;

pub use searxng::SearxngClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::AppResult;

/// Provider-agnostic search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img_src: Option<String>,
}

impl SearchResult {
    pub fn snippet(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub language: Option<String>,
    pub engines: Vec<String>,
    pub categories: Vec<String>,
    pub pageno: Option<u32>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, options: &SearchOptions) -> AppResult<SearchResponse>;
}
