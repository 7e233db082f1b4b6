//! File Search Agent
//!
//! Ranks pre-embedded chunks of the user's attached files against the
//! current task. Absence of files or matches is not an error; both defer to
//! the analyzer.

use tracing::{info, warn};

use crate::agents::AgentContext;
use crate::embeddings::Similarity;
use crate::events::AgentAction;
use crate::state::{
    AgentId, Document, ProcessingType, StateUpdate, WorkflowState, FILE_URL_PLACEHOLDER,
};
use crate::types::AppResult;

pub struct FileSearchAgent;

impl FileSearchAgent {
    pub async fn execute(ctx: &AgentContext, state: &WorkflowState) -> AppResult<StateUpdate> {
        ctx.ensure_active()?;
        if state.file_ids.is_empty() {
            return Ok(StateUpdate::goto(AgentId::Analyzer));
        }

        ctx.events.action(
            AgentAction::SearchingFiles,
            format!("Searching {} attached file(s)", state.file_ids.len()),
        );

        let query = format!("{} {}", state.original_query, state.current_task());
        let documents = Self::search(
            ctx,
            &state.file_ids,
            &query,
            ctx.config.orchestrator.file_search_limit,
        )
        .await?;

        if documents.is_empty() {
            info!("no file chunks matched, deferring to analyzer");
            return Ok(StateUpdate::goto(AgentId::Analyzer));
        }

        info!(count = documents.len(), "file chunks matched");
        Ok(StateUpdate {
            new_documents: documents,
            next: AgentId::Analyzer,
            ..Default::default()
        })
    }

    /// Rank every chunk of the given files against the query. Chunks below
    /// the similarity floor never rank; missing ingestion artifacts skip the
    /// file rather than failing the batch.
    pub async fn search(
        ctx: &AgentContext,
        file_ids: &[String],
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<Document>> {
        let query_vec = ctx.embedder.embed_query(query).await?;
        let similarity = Similarity::from_name(&ctx.config.embeddings.similarity);
        let floor = ctx.config.orchestrator.file_similarity_floor;

        let mut scored: Vec<(f32, Document)> = Vec::new();
        for file_id in file_ids {
            let chunks = match ctx.files.load(file_id).await {
                Ok(Some(chunks)) => chunks,
                Ok(None) => {
                    warn!(file_id = %file_id, "file artifacts missing, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(file_id = %file_id, error = %e, "file load failed, skipping");
                    continue;
                }
            };
            for chunk in chunks.chunks {
                let score = similarity.score(&query_vec, &chunk.embedding);
                if score > floor {
                    scored.push((
                        score,
                        Document::new(
                            chunk.content,
                            chunks.title.clone(),
                            FILE_URL_PLACEHOLDER,
                            ProcessingType::FullContent,
                        ),
                    ));
                }
            }
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(limit).map(|(_, d)| d).collect())
    }

    /// Standalone lookup with the tighter helper cap, for callers outside
    /// the agent graph that want a quick slice of file context.
    pub async fn quick_search(
        ctx: &AgentContext,
        file_ids: &[String],
        query: &str,
    ) -> AppResult<Vec<Document>> {
        Self::search(ctx, file_ids, query, ctx.config.orchestrator.file_helper_limit).await
    }
}
