//! URL Summarization Agent
//!
//! Handles explicitly pasted links: each URL is fetched independently, short
//! content passes through verbatim, long content is extracted against the
//! user's intent. One bad URL never sinks the batch.

use futures::future::join_all;
use tracing::{info, warn};

use crate::agents::AgentContext;
use crate::events::AgentAction;
use crate::state::{AgentId, Document, ProcessingType, StateUpdate, WorkflowState};
use crate::types::{AppResult, LLMMessage};
use crate::utils::{extract_urls, strip_thinking_blocks};

pub struct UrlSummarizerAgent;

impl UrlSummarizerAgent {
    pub async fn execute(ctx: &AgentContext, state: &WorkflowState) -> AppResult<StateUpdate> {
        ctx.ensure_active()?;

        let urls: Vec<String> = extract_urls(state.current_task())
            .into_iter()
            .filter(|u| !state.banned_summary_urls.contains(u))
            .collect();

        // Entered without URLs means the router mis-routed; recover by
        // sending it back rather than erroring at the user.
        if urls.is_empty() {
            warn!("url summarizer entered with no urls, re-routing");
            return Ok(StateUpdate::goto(AgentId::ContentRouter));
        }

        ctx.events.action(
            AgentAction::SummarizingUrl,
            format!("Reading {} linked page(s)", urls.len()),
        );

        // Independent per-URL fan-out, joined before the patch is built.
        let results = join_all(
            urls.iter()
                .map(|url| Self::process_url(ctx, state, url)),
        )
        .await;

        let mut documents = Vec::new();
        for result in results {
            if let Some(document) = result? {
                documents.push(document);
            }
        }

        // Every attempted URL is banned, success or not.
        let banned = urls.clone();
        if documents.is_empty() {
            info!("no linked page yielded content, deferring to analyzer");
            return Ok(StateUpdate {
                ban_summary_urls: banned,
                new_messages: vec![LLMMessage::assistant(
                    "I could not retrieve usable content from the linked page(s).",
                )],
                next: AgentId::Analyzer,
                ..Default::default()
            });
        }

        info!(count = documents.len(), "linked pages summarized");
        Ok(StateUpdate {
            new_documents: documents,
            ban_summary_urls: banned,
            next: AgentId::Analyzer,
            ..Default::default()
        })
    }

    async fn process_url(
        ctx: &AgentContext,
        state: &WorkflowState,
        url: &str,
    ) -> AppResult<Option<Document>> {
        ctx.ensure_active()?;
        let Some(page) = ctx.fetcher.get_web_content(url, false).await? else {
            ctx.events.action(
                AgentAction::UrlFailed,
                format!("Could not fetch {}", url),
            );
            return Ok(None);
        };

        let cfg = &ctx.config.orchestrator;
        let length = page.page_content.chars().count();

        if length < cfg.summarize_threshold_chars {
            return Ok(Some(
                Document::new(
                    page.page_content,
                    page.metadata.title,
                    url.to_string(),
                    ProcessingType::UrlDirectContent,
                )
                .with_original_length(length),
            ));
        }

        let prompt = extraction_prompt(&state.original_query, &page.page_content);
        // Deterministic extraction: temperature pinned per call.
        let request = ctx.extraction_request(vec![LLMMessage::user(prompt)]);
        let summary = match ctx.llm.create_chat_completion(&request).await {
            Ok(response) => strip_thinking_blocks(&response.content),
            Err(e) => {
                warn!(url = %url, error = %e, "url extraction failed, skipping");
                ctx.events.action(
                    AgentAction::UrlFailed,
                    format!("Could not summarize {}", url),
                );
                return Ok(None);
            }
        };
        if summary.chars().count() < cfg.min_summary_chars {
            return Ok(None);
        }

        Ok(Some(
            Document::new(
                summary,
                page.metadata.title,
                url.to_string(),
                ProcessingType::UrlContentExtraction,
            )
            .with_original_length(length),
        ))
    }
}

fn extraction_prompt(intent: &str, content: &str) -> String {
    format!(
        r#"Extract from the page content below everything relevant to the user's request. Keep concrete facts, figures, names and dates. Write a faithful condensed account, not an opinion.

USER REQUEST:
{intent}

PAGE CONTENT:
{content}"#,
        intent = intent,
        content = content
    )
}
