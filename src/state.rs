//! Workflow state shared across the agent graph.
//!
//! A single `WorkflowState` is created per incoming user message, threaded
//! through every agent step, and discarded once synthesis finishes. Agents
//! never mutate the state directly: each step returns a `StateUpdate` patch
//! that the orchestrator applies atomically between steps. Accumulating
//! fields (documents, banned URL sets, instruction history, messages) only
//! ever grow within a run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::LLMMessage;

/// How a document's content was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingType {
    /// Built directly from a search-result title + snippet, no fetch.
    #[serde(rename = "preview-only")]
    PreviewOnly,
    /// Full page fetched and LLM-summarized.
    #[serde(rename = "full-content")]
    FullContent,
    /// Full page fetched, short enough to pass through raw.
    #[serde(rename = "short-content")]
    ShortContent,
    /// Explicit URL, content used verbatim.
    #[serde(rename = "url-direct-content")]
    UrlDirectContent,
    /// Explicit URL, content LLM-extracted against the query.
    #[serde(rename = "url-content-extraction")]
    UrlContentExtraction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub processing_type: ProcessingType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_content_length: Option<usize>,
}

/// A unit of retrieved evidence. Immutable once constructed; agents append
/// new documents, never rewrite existing ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(
        page_content: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        processing_type: ProcessingType,
    ) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: DocumentMetadata {
                title: title.into(),
                url: url.into(),
                source: None,
                processing_type,
                snippet: None,
                original_content_length: None,
            },
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.metadata.snippet = Some(snippet.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    pub fn with_original_length(mut self, len: usize) -> Self {
        self.metadata.original_content_length = Some(len);
        self
    }

    /// Documents with no usable content are excluded from ranking and
    /// synthesis context.
    pub fn has_content(&self) -> bool {
        !self.page_content.trim().is_empty()
    }

    pub fn is_file_sourced(&self) -> bool {
        self.metadata.url == FILE_URL_PLACEHOLDER
    }
}

/// URL placeholder for documents that came from attached files.
pub const FILE_URL_PLACEHOLDER: &str = "File";

/// Named policy bundle constraining which sources a run may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FocusMode {
    #[serde(rename = "chat")]
    Chat,
    #[default]
    #[serde(rename = "webSearch")]
    WebSearch,
    #[serde(rename = "localResearch")]
    LocalResearch,
}

impl FocusMode {
    /// Whether this mode may hit the web search provider. Enforced in
    /// router code, not delegated to the model.
    pub fn allows_web_search(&self) -> bool {
        matches!(self, FocusMode::WebSearch)
    }
}

/// Nodes of the agent graph. `End` is the terminal marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    TaskManager,
    ContentRouter,
    WebSearch,
    FileSearch,
    UrlSummarizer,
    Analyzer,
    Synthesizer,
    #[default]
    End,
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AgentId::TaskManager => "task_manager",
            AgentId::ContentRouter => "content_router",
            AgentId::WebSearch => "web_search",
            AgentId::FileSearch => "file_search",
            AgentId::UrlSummarizer => "url_summarizer",
            AgentId::Analyzer => "analyzer",
            AgentId::Synthesizer => "synthesizer",
            AgentId::End => "end",
        };
        write!(f, "{}", name)
    }
}

/// The complete per-run workflow state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Conversation turns carried into and produced by this run.
    pub messages: Vec<LLMMessage>,

    /// The current task's text; rewritten as sub-tasks advance.
    pub query: String,

    /// The user's original question. Set once, never mutated afterwards.
    pub original_query: String,

    /// Decomposed sub-tasks. Empty means "query is the single task".
    pub tasks: Vec<String>,

    /// Pointer into `tasks`; advances monotonically.
    pub current_task_index: usize,

    /// Evidence accumulated across the whole run. Append-only.
    pub relevant_documents: Vec<Document>,

    /// URLs already fully fetched + summarized this run.
    pub banned_summary_urls: HashSet<String>,

    /// URLs already consumed as preview-only sources this run.
    pub banned_preview_urls: HashSet<String>,

    /// Latest refinement question from the analyzer.
    pub search_instructions: String,

    /// Every refinement question ever issued this run. Append-only.
    pub search_instruction_history: Vec<String>,

    /// Analyzer loop iterations, tracked against runaway refinement.
    pub full_analysis_attempts: usize,

    /// Attached file identifiers. Immutable for the run.
    pub file_ids: Vec<String>,

    /// Source policy for the run. Immutable.
    pub focus_mode: FocusMode,

    /// Next agent to dispatch.
    pub next: AgentId,
}

impl WorkflowState {
    pub fn new(query: impl Into<String>, focus_mode: FocusMode) -> Self {
        let query = query.into();
        Self {
            original_query: query.clone(),
            query,
            focus_mode,
            next: AgentId::TaskManager,
            ..Default::default()
        }
    }

    pub fn with_history(mut self, messages: Vec<LLMMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_file_ids(mut self, file_ids: Vec<String>) -> Self {
        self.file_ids = file_ids;
        self
    }

    /// The task currently being worked, falling back to the raw query when
    /// no decomposition happened.
    pub fn current_task(&self) -> &str {
        self.tasks
            .get(self.current_task_index)
            .map(String::as_str)
            .unwrap_or(&self.query)
    }

    pub fn has_remaining_tasks(&self) -> bool {
        self.current_task_index + 1 < self.tasks.len()
    }

    pub fn is_url_banned(&self, url: &str) -> bool {
        self.banned_summary_urls.contains(url) || self.banned_preview_urls.contains(url)
    }

    /// Serialize accumulated documents as a numbered context block. Web
    /// entries carry their URL; file entries only the title.
    pub fn format_documents(&self) -> String {
        if self.relevant_documents.is_empty() {
            return "No documents collected.".to_string();
        }
        let mut out = String::new();
        for (i, doc) in self.relevant_documents.iter().enumerate() {
            if doc.is_file_sourced() {
                out.push_str(&format!(
                    "<file_source id=\"{}\" title=\"{}\">\n{}\n</file_source>\n",
                    i + 1,
                    doc.metadata.title,
                    doc.page_content
                ));
            } else {
                out.push_str(&format!(
                    "<web_source id=\"{}\" title=\"{}\" url=\"{}\">\n{}\n</web_source>\n",
                    i + 1,
                    doc.metadata.title,
                    doc.metadata.url,
                    doc.page_content
                ));
            }
        }
        out
    }

    /// Apply a patch atomically. Append-only fields extend, scalars
    /// overwrite when present. `original_query` is only ever set while still
    /// empty.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.new_messages);
        self.relevant_documents
            .extend(update.new_documents.into_iter().filter(Document::has_content));
        self.banned_summary_urls.extend(update.ban_summary_urls);
        self.banned_preview_urls.extend(update.ban_preview_urls);
        self.search_instruction_history
            .extend(update.new_search_instructions.iter().cloned());
        if let Some(instructions) = update.search_instructions {
            self.search_instructions = instructions;
        }
        if let Some(query) = update.query {
            self.query = query;
        }
        if let Some(tasks) = update.tasks {
            self.tasks = tasks;
        }
        if let Some(index) = update.current_task_index {
            self.current_task_index = index;
        }
        self.full_analysis_attempts += update.analysis_attempts;
        self.next = update.next;
    }
}

/// Patch returned by each agent step.
///
/// `new_search_instructions` feeds the append-only history; the scalar
/// `search_instructions` field is the "current" refinement question.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub new_messages: Vec<LLMMessage>,
    pub new_documents: Vec<Document>,
    pub ban_summary_urls: Vec<String>,
    pub ban_preview_urls: Vec<String>,
    pub new_search_instructions: Vec<String>,
    pub search_instructions: Option<String>,
    pub query: Option<String>,
    pub tasks: Option<Vec<String>>,
    pub current_task_index: Option<usize>,
    pub analysis_attempts: usize,
    pub next: AgentId,
}

impl StateUpdate {
    /// A pure routing decision with no state changes.
    pub fn goto(next: AgentId) -> Self {
        Self {
            next,
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: LLMMessage) -> Self {
        self.new_messages.push(message);
        self
    }

    pub fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.new_documents = documents;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str) -> Document {
        Document::new("content", "title", url, ProcessingType::PreviewOnly)
    }

    #[test]
    fn test_current_task_fallback() {
        let state = WorkflowState::new("what is rust", FocusMode::WebSearch);
        assert_eq!(state.current_task(), "what is rust");
    }

    #[test]
    fn test_current_task_from_tasks() {
        let mut state = WorkflowState::new("q", FocusMode::WebSearch);
        state.tasks = vec!["a".to_string(), "b".to_string()];
        state.current_task_index = 1;
        assert_eq!(state.current_task(), "b");
        assert!(!state.has_remaining_tasks());
        state.current_task_index = 0;
        assert!(state.has_remaining_tasks());
    }

    #[test]
    fn test_apply_is_append_only() {
        let mut state = WorkflowState::new("q", FocusMode::WebSearch);
        state.apply(StateUpdate {
            new_documents: vec![doc("https://a.com")],
            ban_summary_urls: vec!["https://a.com".to_string()],
            ..Default::default()
        });
        let docs_before = state.relevant_documents.len();
        let banned_before = state.banned_summary_urls.len();

        state.apply(StateUpdate {
            new_documents: vec![doc("https://b.com")],
            ban_summary_urls: vec!["https://b.com".to_string()],
            new_search_instructions: vec!["refine".to_string()],
            ..Default::default()
        });

        assert!(state.relevant_documents.len() >= docs_before);
        assert!(state.banned_summary_urls.len() >= banned_before);
        assert_eq!(state.search_instruction_history, vec!["refine"]);
    }

    #[test]
    fn test_apply_drops_empty_documents() {
        let mut state = WorkflowState::new("q", FocusMode::WebSearch);
        let empty = Document::new("   ", "t", "u", ProcessingType::FullContent);
        state.apply(StateUpdate {
            new_documents: vec![empty, doc("https://a.com")],
            ..Default::default()
        });
        assert_eq!(state.relevant_documents.len(), 1);
    }

    #[test]
    fn test_is_url_banned() {
        let mut state = WorkflowState::new("q", FocusMode::WebSearch);
        state.banned_preview_urls.insert("https://p.com".to_string());
        state.banned_summary_urls.insert("https://s.com".to_string());
        assert!(state.is_url_banned("https://p.com"));
        assert!(state.is_url_banned("https://s.com"));
        assert!(!state.is_url_banned("https://new.com"));
    }

    #[test]
    fn test_focus_mode_policy() {
        assert!(FocusMode::WebSearch.allows_web_search());
        assert!(!FocusMode::Chat.allows_web_search());
        assert!(!FocusMode::LocalResearch.allows_web_search());
    }

    #[test]
    fn test_format_documents_distinguishes_sources() {
        let mut state = WorkflowState::new("q", FocusMode::WebSearch);
        state.relevant_documents.push(doc("https://a.com"));
        state.relevant_documents.push(Document::new(
            "file text",
            "report.pdf",
            FILE_URL_PLACEHOLDER,
            ProcessingType::FullContent,
        ));
        let formatted = state.format_documents();
        assert!(formatted.contains("url=\"https://a.com\""));
        assert!(formatted.contains("<file_source id=\"2\" title=\"report.pdf\">"));
        assert!(!formatted.contains("url=\"File\""));
    }

    #[test]
    fn test_processing_type_wire_names() {
        let json = serde_json::to_string(&ProcessingType::PreviewOnly).unwrap();
        assert_eq!(json, "\"preview-only\"");
        let json = serde_json::to_string(&ProcessingType::UrlContentExtraction).unwrap();
        assert_eq!(json, "\"url-content-extraction\"");
    }

    #[test]
    fn test_focus_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&FocusMode::LocalResearch).unwrap(),
            "\"localResearch\""
        );
        let parsed: FocusMode = serde_json::from_str("\"webSearch\"").unwrap();
        assert_eq!(parsed, FocusMode::WebSearch);
    }
}
