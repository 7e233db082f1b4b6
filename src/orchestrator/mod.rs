//! Workflow dispatcher.
//!
//! An explicit state machine over `AgentId`: every step executes one agent,
//! applies its returned `StateUpdate` atomically, and follows `state.next`.
//! A central step ceiling bounds the whole run; hitting it forces the
//! synthesizer with an incompleteness flag instead of looping forever.
//! Exactly one terminal event (`end` or `error`) closes every run.

use tracing::{debug, error, info, warn};

use crate::agents::analyzer::AnalyzerAgent;
use crate::agents::file_search::FileSearchAgent;
use crate::agents::router::ContentRouterAgent;
use crate::agents::synthesizer::SynthesizerAgent;
use crate::agents::task_manager::TaskManagerAgent;
use crate::agents::url_summarizer::UrlSummarizerAgent;
use crate::agents::web_search::WebSearchAgent;
use crate::agents::AgentContext;
use crate::events::{AgentAction, WorkflowEvent};
use crate::state::{AgentId, WorkflowState};
use crate::types::{AppError, LLMMessage};

pub struct Orchestrator {
    ctx: AgentContext,
}

impl Orchestrator {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// Drive a run to completion. Consumes the state and returns its final
    /// form; the conversation-level history is what callers persist.
    pub async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        let limit = self.ctx.config.orchestrator.recursion_limit;
        let mut steps = 0usize;
        let mut truncated = false;
        info!(query = %state.original_query, focus_mode = ?state.focus_mode, "run started");

        while state.next != AgentId::End {
            let current = state.next;
            steps += 1;
            if steps > limit && current != AgentId::Synthesizer {
                warn!(steps, limit, "step ceiling reached, forcing synthesis");
                truncated = true;
                self.ctx.events.action(
                    AgentAction::RunTruncated,
                    "Step limit reached; answering with the evidence gathered so far",
                );
                state.next = AgentId::Synthesizer;
                continue;
            }
            debug!(step = steps, agent = %current, "dispatching");

            let result = match current {
                AgentId::TaskManager => TaskManagerAgent::execute(&self.ctx, &state).await,
                AgentId::ContentRouter => ContentRouterAgent::execute(&self.ctx, &state).await,
                AgentId::WebSearch => WebSearchAgent::execute(&self.ctx, &state).await,
                AgentId::FileSearch => FileSearchAgent::execute(&self.ctx, &state).await,
                AgentId::UrlSummarizer => UrlSummarizerAgent::execute(&self.ctx, &state).await,
                AgentId::Analyzer => AnalyzerAgent::execute(&self.ctx, &state).await,
                AgentId::Synthesizer => {
                    SynthesizerAgent::execute(&self.ctx, &state, truncated).await
                }
                AgentId::End => unreachable!("loop exits before dispatching End"),
            };

            match result {
                Ok(update) => state.apply(update),
                Err(AppError::Cancelled) => {
                    info!("run cancelled");
                    state.next = AgentId::End;
                    self.ctx.events.emit(WorkflowEvent::End);
                    return state;
                }
                Err(e) => {
                    error!(agent = %current, error = %e, "agent failed, terminating run");
                    // The conversation keeps a record of the failure, not
                    // just the event stream.
                    state
                        .messages
                        .push(LLMMessage::assistant(format!("The run failed: {}", e)));
                    state.next = AgentId::End;
                    self.ctx.events.emit(WorkflowEvent::Error(e.to_string()));
                    return state;
                }
            }
        }

        info!(steps, "run finished");
        self.ctx.events.emit(WorkflowEvent::End);
        state
    }
}
