//! Task Manager Agent
//!
//! First node of every run. On first entry it asks the model whether the
//! question decomposes into independently answerable sub-tasks; on re-entry
//! it advances to the next task or declares the batch done.

use serde::Deserialize;
use tracing::{info, warn};

use crate::agents::AgentContext;
use crate::events::AgentAction;
use crate::llm::StructuredLLM;
use crate::state::{AgentId, StateUpdate, WorkflowState};
use crate::types::{AppResult, LLMMessage};

#[derive(Debug, Deserialize)]
struct DecompositionReply {
    #[serde(default)]
    tasks: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

pub struct TaskManagerAgent;

impl TaskManagerAgent {
    pub async fn execute(ctx: &AgentContext, state: &WorkflowState) -> AppResult<StateUpdate> {
        ctx.ensure_active()?;

        // Re-entry: tasks already planned, advance or finish.
        if !state.tasks.is_empty() {
            if state.has_remaining_tasks() {
                let next_index = state.current_task_index + 1;
                let next_task = state.tasks[next_index].clone();
                ctx.events.action(
                    AgentAction::TasksPlanned,
                    format!("Moving to task {} of {}", next_index + 1, state.tasks.len()),
                );
                return Ok(StateUpdate {
                    query: Some(next_task),
                    current_task_index: Some(next_index),
                    next: AgentId::ContentRouter,
                    ..Default::default()
                });
            }
            info!(task_count = state.tasks.len(), "all tasks completed");
            return Ok(StateUpdate::goto(AgentId::Analyzer));
        }

        ctx.events.action(
            AgentAction::AnalyzingQuery,
            "Checking whether the question splits into sub-tasks",
        );

        let prompt = decomposition_prompt(&state.original_query);
        let request = ctx.extraction_request(vec![LLMMessage::user(prompt)]);

        let tasks = match StructuredLLM::new(ctx.llm.as_ref())
            .complete::<DecompositionReply>(&request)
            .await
        {
            Ok(reply) => {
                info!(reasoning = %reply.reasoning, "task decomposition complete");
                let tasks: Vec<String> = reply
                    .tasks
                    .into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                if tasks.is_empty() {
                    vec![state.original_query.clone()]
                } else {
                    tasks
                }
            }
            // Decomposition failure never fails the run; the original query
            // becomes the single task.
            Err(e) => {
                warn!(error = %e, "task decomposition failed, using single task");
                vec![state.original_query.clone()]
            }
        };

        ctx.events.action_with_details(
            AgentAction::TasksPlanned,
            format!("Planned {} task(s)", tasks.len()),
            serde_json::json!({ "tasks": tasks }),
        );

        Ok(StateUpdate {
            query: Some(tasks[0].clone()),
            tasks: Some(tasks),
            current_task_index: Some(0),
            next: AgentId::ContentRouter,
            ..Default::default()
        })
    }
}

fn decomposition_prompt(query: &str) -> String {
    format!(
        r#"Decide whether the following question should be broken into independent sub-tasks.

QUESTION:
{query}

Split ONLY when the parts are independently answerable: distinct subjects, compound "and/or" questions, or multiple separate calculations. Do NOT split relationship, comparative, or step-by-step procedural questions into fragments that lose their meaning. When in doubt, keep it as one task.

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "tasks": ["first sub-task", "second sub-task"],
  "reasoning": "One sentence on why you did or did not split"
}}

If the question should stay whole, return it as the single entry in "tasks"."#,
        query = query
    )
}
