//! Embedding boundary and similarity scoring.
//!
//! Ranking throughout the workflow (search previews, file chunks) runs on a
//! scalar similarity between embedding vectors, cosine by default.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::types::{AppError, AppResult};

/// Similarity measure between two embedding vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Similarity {
    #[default]
    Cosine,
    Dot,
}

impl Similarity {
    pub fn from_name(name: &str) -> Self {
        match name {
            "dot" => Similarity::Dot,
            _ => Similarity::Cosine,
        }
    }

    /// Score two vectors. Mismatched or empty vectors score 0.0 rather than
    /// erroring, so a single bad chunk never sinks a ranking pass.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.is_empty() || a.len() != b.len() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        match self {
            Similarity::Dot => dot,
            Similarity::Cosine => {
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    0.0
                } else {
                    dot / (norm_a * norm_b)
                }
            }
        }
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>>;
    async fn embed_documents(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;
}

const OPENAI_EMBEDDINGS_BASE: &str = "https://api.openai.com/v1";

/// OpenAI-compatible embeddings client.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: OPENAI_EMBEDDINGS_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        if !base_url.is_empty() {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("embeddings request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!(
                "embeddings API error ({}): {}",
                status, body
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("failed to parse embeddings: {}", e)))?;

        debug!(count = parsed.data.len(), "embeddings batch complete");
        Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::Embedding("embeddings API returned no vector".to_string()))
    }

    async fn embed_documents(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.embed_batch(texts).await
    }
}
