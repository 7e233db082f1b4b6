//! Chat endpoint.
//!
//! Accepts the user's message plus conversation context and streams the
//! workflow's event sequence back as SSE. The orchestrator runs in its own
//! task; dropping the response stream cancels the run.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::post;
use axum::{Json, Router};
use futures::Stream;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agents::AgentContext;
use crate::events::EventSink;
use crate::llm::{MeteredLLM, UsageMeter};
use crate::orchestrator::Orchestrator;
use crate::state::{FocusMode, WorkflowState};
use crate::types::LLMMessage;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(post_chat))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<LLMMessage>,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub focus_mode: FocusMode,
}

async fn post_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(message = %request.message, focus_mode = ?request.focus_mode, "chat request");

    let (events, mut rx) = EventSink::new();
    let cancel = CancellationToken::new();
    let usage = UsageMeter::default();
    let ctx = AgentContext {
        llm: std::sync::Arc::new(MeteredLLM::new(state.llm.clone(), usage.clone())),
        embedder: state.embedder.clone(),
        search: state.search.clone(),
        files: state.files.clone(),
        fetcher: state.fetcher.clone(),
        config: state.config.clone(),
        events,
        cancel: cancel.clone(),
        usage,
    };

    let workflow = WorkflowState::new(request.message, request.focus_mode)
        .with_history(request.history)
        .with_file_ids(request.file_ids);

    tokio::spawn(async move {
        Orchestrator::new(ctx).run(workflow).await;
    });

    let stream = async_stream::stream! {
        // Client gone means the run should stop burning tokens.
        let _cancel_on_drop = cancel.drop_guard();
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            yield Ok::<_, Infallible>(Event::default().data(event.to_json().to_string()));
            if terminal {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
