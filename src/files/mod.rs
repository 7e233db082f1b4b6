//! Read-only lookup of pre-ingested file content.
//!
//! An out-of-scope upload pipeline chunks and embeds attached files ahead of
//! time. This module only reads its artifacts: per file id, an extracted
//! JSON `{title, contents[]}` and an embeddings JSON `{embeddings[][]}` with
//! one vector per chunk index.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

use crate::types::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct FileChunk {
    pub content: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct FileChunks {
    pub title: String,
    pub chunks: Vec<FileChunk>,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Load the pre-ingested chunks for one file. `None` when the artifacts
    /// are missing; callers skip the file rather than failing the batch.
    async fn load(&self, file_id: &str) -> AppResult<Option<FileChunks>>;
}

#[derive(Deserialize)]
struct ExtractedFile {
    title: String,
    contents: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddedFile {
    embeddings: Vec<Vec<f32>>,
}

pub struct DiskFileStore {
    uploads_dir: PathBuf,
}

impl DiskFileStore {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
        }
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn load(&self, file_id: &str) -> AppResult<Option<FileChunks>> {
        let extracted_path = self.uploads_dir.join(format!("{}-extracted.json", file_id));
        let embeddings_path = self.uploads_dir.join(format!("{}-embeddings.json", file_id));

        let extracted_raw = match tokio::fs::read_to_string(&extracted_path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(file_id = %file_id, error = %e, "missing extracted file artifact");
                return Ok(None);
            }
        };
        let embeddings_raw = match tokio::fs::read_to_string(&embeddings_path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(file_id = %file_id, error = %e, "missing embeddings artifact");
                return Ok(None);
            }
        };

        let extracted: ExtractedFile = serde_json::from_str(&extracted_raw)
            .map_err(|e| AppError::Internal(format!("bad extracted artifact: {}", e)))?;
        let embedded: EmbeddedFile = serde_json::from_str(&embeddings_raw)
            .map_err(|e| AppError::Internal(format!("bad embeddings artifact: {}", e)))?;

        let chunks = extracted
            .contents
            .into_iter()
            .zip(embedded.embeddings)
            .map(|(content, embedding)| FileChunk { content, embedding })
            .collect();

        Ok(Some(FileChunks {
            title: extracted.title,
            chunks,
        }))
    }
}
