//! SearXNG Client
//!
//! Queries a SearXNG metasearch instance over its JSON API and normalizes
//! results to the provider-agnostic shape.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::{SearchOptions, SearchProvider, SearchResponse, SearchResult};
use crate::types::{AppError, AppResult};

pub struct SearxngClient {
    client: Client,
    base_url: String,
    default_language: String,
}

impl SearxngClient {
    pub fn new(base_url: &str) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Search(format!("failed to build search client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_language: "en".to_string(),
        })
    }

    pub fn from_config(config: &crate::config::SearchConfig) -> AppResult<Self> {
        let mut client = Self::new(&config.searxng_url)?;
        client.default_language = config.language.clone();
        Ok(client)
    }

    fn build_url(&self, query: &str, options: &SearchOptions) -> String {
        let mut url = format!(
            "{}/search?q={}&format=json",
            self.base_url,
            urlencoding::encode(query)
        );
        let language = options
            .language
            .clone()
            .unwrap_or_else(|| self.default_language.clone());
        url.push_str(&format!("&language={}", language));
        if !options.engines.is_empty() {
            url.push_str(&format!("&engines={}", options.engines.join(",")));
        }
        if !options.categories.is_empty() {
            url.push_str(&format!("&categories={}", options.categories.join(",")));
        }
        if let Some(pageno) = options.pageno {
            url.push_str(&format!("&pageno={}", pageno));
        }
        url
    }
}

#[async_trait]
impl SearchProvider for SearxngClient {
    async fn search(&self, query: &str, options: &SearchOptions) -> AppResult<SearchResponse> {
        let url = self.build_url(query, options);
        info!(query = %query, "Searching via SearXNG");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Search(format!("search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Search(format!("search API error ({})", status)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("failed to parse search results: {}", e)))?;

        let results: Vec<SearchResult> = body
            .get("results")
            .and_then(|r| r.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|r| {
                        let url = r.get("url").and_then(|v| v.as_str())?;
                        Some(SearchResult {
                            title: r
                                .get("title")
                                .and_then(|v| v.as_str())
                                .unwrap_or("Untitled")
                                .to_string(),
                            url: url.to_string(),
                            content: r
                                .get("content")
                                .and_then(|v| v.as_str())
                                .map(String::from),
                            img_src: r
                                .get("img_src")
                                .and_then(|v| v.as_str())
                                .map(String::from),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let suggestions = body
            .get("suggestions")
            .and_then(|s| s.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        debug!(count = results.len(), "SearXNG search completed");
        Ok(SearchResponse {
            results,
            suggestions,
        })
    }
}
