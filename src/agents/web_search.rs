//! Web Search Agent
//!
//! Turns the current task into an optimized search query, ranks result
//! previews by embedding similarity, and asks the model whether the
//! previews alone answer the task. When they do, previews become documents
//! directly; when they don't, the top results are fetched and summarized,
//! with per-URL banning so nothing is processed twice in a run.

use serde::Deserialize;
use tracing::{info, warn};

use crate::agents::AgentContext;
use crate::events::AgentAction;
use crate::llm::StructuredLLM;
use crate::search::{SearchOptions, SearchResult};
use crate::state::{AgentId, Document, ProcessingType, StateUpdate, WorkflowState};
use crate::types::{AppError, AppResult, LLMMessage};
use crate::utils::format_history;

#[derive(Debug, Deserialize)]
struct QueryReply {
    search_query: String,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct SufficiencyReply {
    is_sufficient: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelevanceReply {
    relevant: bool,
    #[serde(default)]
    reason: Option<String>,
}

pub struct WebSearchAgent;

impl WebSearchAgent {
    pub async fn execute(ctx: &AgentContext, state: &WorkflowState) -> AppResult<StateUpdate> {
        match Self::run(ctx, state).await {
            Ok(update) => Ok(update),
            Err(AppError::Cancelled) => Err(AppError::Cancelled),
            // Top-level failure aborts the run; no retry at this layer.
            Err(e) => {
                warn!(error = %e, "web search failed, ending run");
                Ok(StateUpdate::goto(AgentId::End)
                    .with_message(LLMMessage::assistant(format!("Web search failed: {}", e))))
            }
        }
    }

    async fn run(ctx: &AgentContext, state: &WorkflowState) -> AppResult<StateUpdate> {
        ctx.ensure_active()?;
        let task = state.current_task();

        let query = Self::generate_query(ctx, state, task).await;
        ctx.events.action_with_details(
            AgentAction::SearchingWeb,
            "Searching the web",
            serde_json::json!({ "query": query }),
        );

        let options = SearchOptions {
            language: Some(ctx.config.search.language.clone()),
            ..Default::default()
        };
        let response = ctx.search.search(&query, &options).await?;

        let fresh: Vec<SearchResult> = response
            .results
            .into_iter()
            .filter(|r| !state.is_url_banned(&r.url))
            .collect();
        if fresh.is_empty() {
            info!(query = %query, "no fresh search results, deferring to analyzer");
            return Ok(StateUpdate::goto(AgentId::Analyzer));
        }

        let previews = Self::rank_previews(ctx, task, fresh).await;

        ctx.events.action(
            AgentAction::AnalyzingPreviews,
            format!("Judging {} result previews", previews.len()),
        );
        if Self::previews_sufficient(ctx, state, task, &previews).await {
            let documents = previews
                .iter()
                .map(|r| {
                    Document::new(
                        format!("{}\n{}", r.title, r.snippet()),
                        r.title.clone(),
                        r.url.clone(),
                        ProcessingType::PreviewOnly,
                    )
                    .with_snippet(r.snippet().to_string())
                })
                .collect();
            let banned = previews.iter().map(|r| r.url.clone()).collect();
            return Ok(StateUpdate {
                new_documents: documents,
                ban_preview_urls: banned,
                next: AgentId::Analyzer,
                ..Default::default()
            });
        }

        // Previews fall short: fetch and summarize the top results, at most
        // `max_documents_per_hop` accepted documents per pass.
        let mut documents = Vec::new();
        let mut banned = Vec::new();
        for preview in &previews {
            if documents.len() >= ctx.config.orchestrator.max_documents_per_hop {
                break;
            }
            if state.banned_summary_urls.contains(&preview.url) {
                continue;
            }
            ctx.ensure_active()?;
            ctx.events.action_with_details(
                AgentAction::SummarizingContent,
                format!("Reading {}", preview.url),
                serde_json::json!({ "url": preview.url }),
            );
            // Processed-once guarantee: banned whether or not it yields a
            // document.
            banned.push(preview.url.clone());
            if let Some(document) = summarize_web_content(ctx, task, &preview.url).await? {
                documents.push(document);
            }
        }

        if documents.is_empty() {
            info!("no usable documents this hop, deferring to analyzer");
        }
        Ok(StateUpdate {
            new_documents: documents,
            ban_summary_urls: banned,
            next: AgentId::Analyzer,
            ..Default::default()
        })
    }

    async fn generate_query(ctx: &AgentContext, state: &WorkflowState, task: &str) -> String {
        ctx.events.action(
            AgentAction::GeneratingSearchQuery,
            "Writing an optimized search query",
        );
        let prompt = query_prompt(state, task);
        let request = ctx.extraction_request(vec![LLMMessage::user(prompt)]);
        match StructuredLLM::new(ctx.llm.as_ref())
            .complete::<QueryReply>(&request)
            .await
        {
            Ok(reply) if !reply.search_query.trim().is_empty() => {
                info!(search_query = %reply.search_query, reasoning = %reply.reasoning, "search query generated");
                reply.search_query
            }
            Ok(_) => task.to_string(),
            Err(e) => {
                warn!(error = %e, "query generation failed, searching with raw task");
                task.to_string()
            }
        }
    }

    /// Keep the top few results in engine order, then admit more by
    /// descending embedding similarity to the task. Falls back to plain
    /// engine order if embedding fails.
    async fn rank_previews(
        ctx: &AgentContext,
        task: &str,
        results: Vec<SearchResult>,
    ) -> Vec<SearchResult> {
        let cfg = &ctx.config.orchestrator;
        if results.len() <= cfg.preview_unranked {
            return results;
        }

        let mut head: Vec<SearchResult> = results;
        let tail: Vec<SearchResult> = head.split_off(cfg.preview_unranked);
        let texts: Vec<String> = tail
            .iter()
            .map(|r| format!("{} {}", r.title, r.snippet()))
            .collect();

        let similarity =
            crate::embeddings::Similarity::from_name(&ctx.config.embeddings.similarity);
        let ranked_tail = match tokio::try_join!(
            ctx.embedder.embed_query(task),
            ctx.embedder.embed_documents(&texts)
        ) {
            Ok((query_vec, doc_vecs)) => {
                let mut scored: Vec<(f32, SearchResult)> = tail
                    .into_iter()
                    .zip(doc_vecs)
                    .map(|(result, vec)| (similarity.score(&query_vec, &vec), result))
                    .collect();
                scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
                scored
                    .into_iter()
                    .take(cfg.preview_ranked)
                    .map(|(_, r)| r)
                    .collect::<Vec<_>>()
            }
            Err(e) => {
                warn!(error = %e, "preview embedding failed, keeping engine order");
                tail.into_iter().take(cfg.preview_ranked).collect()
            }
        };

        head.extend(ranked_tail);
        head.truncate(cfg.preview_cap);
        head
    }

    /// Preview sufficiency check. Any failure counts as insufficient, so the
    /// system errs toward fetching more rather than under-answering.
    async fn previews_sufficient(
        ctx: &AgentContext,
        state: &WorkflowState,
        task: &str,
        previews: &[SearchResult],
    ) -> bool {
        let prompt = sufficiency_prompt(state, task, previews);
        let request = ctx.extraction_request(vec![LLMMessage::user(prompt)]);
        match StructuredLLM::new(ctx.llm.as_ref())
            .complete::<SufficiencyReply>(&request)
            .await
        {
            Ok(reply) => {
                info!(
                    is_sufficient = reply.is_sufficient,
                    reason = reply.reason.as_deref().unwrap_or(""),
                    "preview sufficiency verdict"
                );
                reply.is_sufficient
            }
            Err(e) => {
                warn!(error = %e, "preview sufficiency check failed, assuming insufficient");
                false
            }
        }
    }
}

/// Fetch one page and turn it into a document if it helps the task. Short
/// pages pass through raw after a relevance check; long pages are
/// summarized. `None` means skip, not failure.
pub async fn summarize_web_content(
    ctx: &AgentContext,
    task: &str,
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
        let prompt = relevance_prompt(task, &page.page_content);
        let request = ctx.extraction_request(vec![LLMMessage::user(prompt)]);
        let relevant = match StructuredLLM::new(ctx.llm.as_ref())
            .complete::<RelevanceReply>(&request)
            .await
        {
            Ok(reply) => {
                info!(url = %url, relevant = reply.relevant, reason = reply.reason.as_deref().unwrap_or(""), "relevance check");
                reply.relevant
            }
            Err(e) => {
                warn!(url = %url, error = %e, "relevance check failed, skipping page");
                false
            }
        };
        if !relevant {
            return Ok(None);
        }
        return Ok(Some(
            Document::new(
                page.page_content,
                page.metadata.title,
                url.to_string(),
                ProcessingType::ShortContent,
            )
            .with_original_length(length),
        ));
    }

    let prompt = summary_prompt(task, &page.page_content);
    let request = ctx.extraction_request(vec![LLMMessage::user(prompt)]);
    let summary = match ctx.llm.create_chat_completion(&request).await {
        Ok(response) => response.content,
        Err(e) => {
            warn!(url = %url, error = %e, "page summarization failed, skipping page");
            return Ok(None);
        }
    };
    // Degenerate outputs are treated as "not relevant".
    if summary.trim().chars().count() < cfg.min_summary_chars {
        info!(url = %url, "summary too short, skipping page");
        return Ok(None);
    }

    Ok(Some(
        Document::new(
            summary,
            page.metadata.title,
            url.to_string(),
            ProcessingType::FullContent,
        )
        .with_original_length(length),
    ))
}

fn query_prompt(state: &WorkflowState, task: &str) -> String {
    let instructions = if state.search_instructions.is_empty() {
        "None.".to_string()
    } else {
        state.search_instructions.clone()
    };
    format!(
        r#"Write one concise web search query for the task below.

TASK:
{task}

REFINEMENT FROM EARLIER ANALYSIS:
{instructions}

Today's date: {date}

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "search_query": "the query",
  "reasoning": "One sentence"
}}"#,
        task = task,
        instructions = instructions,
        date = chrono::Utc::now().format("%Y-%m-%d")
    )
}

fn sufficiency_prompt(state: &WorkflowState, task: &str, previews: &[SearchResult]) -> String {
    let listing = previews
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} — {} ({})", i + 1, r.title, r.snippet(), r.url))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"Decide whether these search result snippets alone fully answer the task, without fetching any full page.

ORIGINAL QUESTION:
{original}

CURRENT TASK:
{task}

RECENT CONVERSATION:
{history}

SEARCH RESULT PREVIEWS:
{listing}

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "is_sufficient": true,
  "reason": "One sentence, or null"
}}"#,
        original = state.original_query,
        task = task,
        history = format_history(&state.messages, 10),
        listing = listing
    )
}

fn relevance_prompt(task: &str, content: &str) -> String {
    format!(
        r#"Does the following page content help answer the task?

TASK:
{task}

PAGE CONTENT:
{content}

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "relevant": true,
  "reason": "One sentence, or null"
}}"#,
        task = task,
        content = content
    )
}

fn summary_prompt(task: &str, content: &str) -> String {
    format!(
        r#"Summarize the following page content, keeping only information that helps answer the task. Preserve concrete facts, numbers, names and dates. If nothing in the page relates to the task, reply with the single word: irrelevant.

TASK:
{task}

PAGE CONTENT:
{content}"#,
        task = task,
        content = content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{FailingSearch, HarnessBuilder, ScriptedLLM, StaticFetcher, StaticSearch};
    use crate::state::FocusMode;

    const QUERY_REPLY: &str = r#"{"search_query": "capital of France", "reasoning": "r"}"#;

    fn three_results() -> StaticSearch {
        StaticSearch::new(&[
            ("Paris", "https://a.com", "Paris is the capital of France"),
            ("France", "https://b.com", "France is a country in Europe"),
            ("Capitals", "https://c.com", "List of European capitals"),
        ])
    }

    #[tokio::test]
    async fn test_sufficient_previews_become_documents() {
        let harness = HarnessBuilder::new()
            .llm(ScriptedLLM::new(vec![
                QUERY_REPLY,
                r#"{"is_sufficient": true, "reason": "snippets answer it"}"#,
            ]))
            .search(three_results())
            .build();
        let state = WorkflowState::new("capital of France", FocusMode::WebSearch);

        let update = WebSearchAgent::execute(&harness.ctx, &state).await.unwrap();
        assert_eq!(update.next, AgentId::Analyzer);
        assert_eq!(update.new_documents.len(), 3);
        assert!(update
            .new_documents
            .iter()
            .all(|d| d.metadata.processing_type == ProcessingType::PreviewOnly));
        assert_eq!(update.ban_preview_urls.len(), 3);
        assert!(update.ban_summary_urls.is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_previews_fetch_and_cap_documents() {
        let fetcher = StaticFetcher::default()
            .with_page("https://a.com", "Paris has been the capital since 508.")
            .with_page("https://b.com", "France borders eight countries.")
            .with_page("https://c.com", "Unfetched because the cap hit first.");
        let harness = HarnessBuilder::new()
            .llm(ScriptedLLM::new(vec![
                QUERY_REPLY,
                r#"{"is_sufficient": false, "reason": "need detail"}"#,
                r#"{"relevant": true, "reason": "on topic"}"#,
                r#"{"relevant": true, "reason": "on topic"}"#,
            ]))
            .search(three_results())
            .fetcher(fetcher)
            .build();
        let state = WorkflowState::new("capital of France", FocusMode::WebSearch);

        let update = WebSearchAgent::execute(&harness.ctx, &state).await.unwrap();
        assert_eq!(update.next, AgentId::Analyzer);
        assert_eq!(update.new_documents.len(), 2);
        assert!(update
            .new_documents
            .iter()
            .all(|d| d.metadata.processing_type == ProcessingType::ShortContent));
        // Only the two processed URLs are banned; the third was never touched.
        assert_eq!(update.ban_summary_urls.len(), 2);
        assert!(!update.ban_summary_urls.contains(&"https://c.com".to_string()));
    }

    #[tokio::test]
    async fn test_banned_summary_urls_are_skipped() {
        let fetcher = StaticFetcher::default()
            .with_page("https://b.com", "France borders eight countries.");
        let harness = HarnessBuilder::new()
            .llm(ScriptedLLM::new(vec![
                QUERY_REPLY,
                r#"{"is_sufficient": false, "reason": null}"#,
                r#"{"relevant": true, "reason": null}"#,
            ]))
            .search(StaticSearch::new(&[
                ("Paris", "https://a.com", "snippet a"),
                ("France", "https://b.com", "snippet b"),
            ]))
            .fetcher(fetcher)
            .build();
        let mut state = WorkflowState::new("capital of France", FocusMode::WebSearch);
        state.banned_summary_urls.insert("https://a.com".to_string());

        let update = WebSearchAgent::execute(&harness.ctx, &state).await.unwrap();
        assert_eq!(update.new_documents.len(), 1);
        assert_eq!(update.new_documents[0].metadata.url, "https://b.com");
        assert!(!update.ban_summary_urls.contains(&"https://a.com".to_string()));
    }

    #[tokio::test]
    async fn test_all_results_banned_defers_to_analyzer() {
        let harness = HarnessBuilder::new()
            .llm(ScriptedLLM::new(vec![QUERY_REPLY]))
            .search(StaticSearch::new(&[("Paris", "https://a.com", "s")]))
            .build();
        let mut state = WorkflowState::new("capital of France", FocusMode::WebSearch);
        state.banned_preview_urls.insert("https://a.com".to_string());

        let update = WebSearchAgent::execute(&harness.ctx, &state).await.unwrap();
        assert_eq!(update.next, AgentId::Analyzer);
        assert!(update.new_documents.is_empty());
    }

    #[tokio::test]
    async fn test_sufficiency_error_defaults_to_insufficient() {
        // Script runs dry after the query reply: the sufficiency call gets an
        // unparsable empty reply and must default to fetching.
        let fetcher =
            StaticFetcher::default().with_page("https://a.com", "Paris is the capital.");
        let harness = HarnessBuilder::new()
            .llm(ScriptedLLM::new(vec![
                QUERY_REPLY,
                "not json at all",
                r#"{"relevant": true, "reason": null}"#,
            ]))
            .search(StaticSearch::new(&[("Paris", "https://a.com", "s")]))
            .fetcher(fetcher)
            .build();
        let state = WorkflowState::new("capital of France", FocusMode::WebSearch);

        let update = WebSearchAgent::execute(&harness.ctx, &state).await.unwrap();
        assert_eq!(update.new_documents.len(), 1);
        assert_eq!(update.ban_summary_urls, vec!["https://a.com".to_string()]);
    }

    #[tokio::test]
    async fn test_long_page_is_summarized() {
        let long_page = "France. ".repeat(1000);
        let fetcher = StaticFetcher::default().with_page("https://a.com", &long_page);
        let harness = HarnessBuilder::new()
            .llm(ScriptedLLM::new(vec![
                QUERY_REPLY,
                r#"{"is_sufficient": false, "reason": null}"#,
                "Paris has been the French capital for over fifteen centuries.",
            ]))
            .search(StaticSearch::new(&[("Paris", "https://a.com", "s")]))
            .fetcher(fetcher)
            .build();
        let state = WorkflowState::new("capital of France", FocusMode::WebSearch);

        let update = WebSearchAgent::execute(&harness.ctx, &state).await.unwrap();
        assert_eq!(update.new_documents.len(), 1);
        let doc = &update.new_documents[0];
        assert_eq!(doc.metadata.processing_type, ProcessingType::FullContent);
        assert_eq!(doc.metadata.original_content_length, Some(8000));
    }

    #[tokio::test]
    async fn test_degenerate_summary_is_skipped() {
        let long_page = "x ".repeat(5000);
        let fetcher = StaticFetcher::default().with_page("https://a.com", &long_page);
        let harness = HarnessBuilder::new()
            .llm(ScriptedLLM::new(vec![
                QUERY_REPLY,
                r#"{"is_sufficient": false, "reason": null}"#,
                "irrelevant",
            ]))
            .search(StaticSearch::new(&[("Paris", "https://a.com", "s")]))
            .fetcher(fetcher)
            .build();
        let state = WorkflowState::new("capital of France", FocusMode::WebSearch);

        let update = WebSearchAgent::execute(&harness.ctx, &state).await.unwrap();
        assert!(update.new_documents.is_empty());
        // Still banned: processed once, regardless of outcome.
        assert_eq!(update.ban_summary_urls, vec!["https://a.com".to_string()]);
        assert_eq!(update.next, AgentId::Analyzer);
    }

    #[tokio::test]
    async fn test_search_provider_failure_ends_run() {
        let harness = HarnessBuilder::new()
            .llm(ScriptedLLM::new(vec![QUERY_REPLY]))
            .search_provider(FailingSearch)
            .build();
        let state = WorkflowState::new("capital of France", FocusMode::WebSearch);

        let update = WebSearchAgent::execute(&harness.ctx, &state).await.unwrap();
        assert_eq!(update.next, AgentId::End);
        assert_eq!(update.new_messages.len(), 1);
    }

    #[tokio::test]
    async fn test_preview_ranking_respects_cap() {
        let entries: Vec<(String, String, String)> = (0..20)
            .map(|i| {
                (
                    format!("Result {}", i),
                    format!("https://site{}.com", i),
                    format!("snippet {}", i),
                )
            })
            .collect();
        let borrowed: Vec<(&str, &str, &str)> = entries
            .iter()
            .map(|(t, u, c)| (t.as_str(), u.as_str(), c.as_str()))
            .collect();
        let harness = HarnessBuilder::new()
            .llm(ScriptedLLM::new(vec![
                QUERY_REPLY,
                r#"{"is_sufficient": true, "reason": null}"#,
            ]))
            .search(StaticSearch::new(&borrowed))
            .build();
        let state = WorkflowState::new("q", FocusMode::WebSearch);

        let update = WebSearchAgent::execute(&harness.ctx, &state).await.unwrap();
        let cap = harness.ctx.config.orchestrator.preview_cap;
        assert_eq!(update.new_documents.len(), cap);
        // The unranked head keeps engine order.
        assert_eq!(update.new_documents[0].metadata.url, "https://site0.com");
        assert_eq!(update.new_documents[1].metadata.url, "https://site1.com");
        assert_eq!(update.new_documents[2].metadata.url, "https://site2.com");
    }
}
