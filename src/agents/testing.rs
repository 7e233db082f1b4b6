//! Mock boundary implementations for agent and orchestrator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agents::AgentContext;
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::events::{EventSink, WorkflowEvent};
use crate::files::{FileChunk, FileChunks, FileStore};
use crate::llm::provider::{LLMAdapter, MeteredLLM, TokenStream, UsageMeter};
use crate::retrieval::{FetchedPage, PageFetcher, PageMetadata};
use crate::search::{SearchOptions, SearchProvider, SearchResponse, SearchResult};
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};

/// Scripted LLM: pops completion replies in order, repeats the last one when
/// the script runs out. Streaming yields the reply split into two chunks.
pub struct ScriptedLLM {
    replies: Mutex<Vec<String>>,
    cursor: AtomicUsize,
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl ScriptedLLM {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            cursor: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        let mut llm = Self::new(vec![]);
        llm.fail = true;
        llm
    }

    fn next_reply(&self) -> String {
        let replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return String::new();
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        replies[index.min(replies.len() - 1)].clone()
    }
}

#[async_trait]
impl LLMAdapter for ScriptedLLM {
    async fn create_chat_completion(&self, _request: &LLMRequest) -> AppResult<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::LLMApi("scripted failure".to_string()));
        }
        Ok(LLMResponse {
            content: self.next_reply(),
            finish_reason: "stop".to_string(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
                total_tokens: 15,
            },
        })
    }

    async fn create_chat_completion_stream(
        &self,
        _request: &LLMRequest,
    ) -> AppResult<TokenStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::LLMApi("scripted failure".to_string()));
        }
        let reply = self.next_reply();
        let mid = reply.len() / 2;
        let mut boundary = mid;
        while !reply.is_char_boundary(boundary) {
            boundary += 1;
        }
        let (a, b) = reply.split_at(boundary);
        let chunks = vec![Ok(a.to_string()), Ok(b.to_string())];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Deterministic embedder: vector derived from text bytes, so identical
/// texts rank highest against each other under cosine similarity.
pub struct HashEmbedder;

fn hash_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.1f32; 8];
    for (i, b) in text.bytes().enumerate() {
        v[i % 8] += (b as f32) / 255.0;
    }
    v
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(hash_vector(text))
    }

    async fn embed_documents(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_vector(t)).collect())
    }
}

pub struct StaticSearch {
    pub results: Vec<SearchResult>,
}

impl StaticSearch {
    pub fn new(entries: &[(&str, &str, &str)]) -> Self {
        Self {
            results: entries
                .iter()
                .map(|(title, url, content)| SearchResult {
                    title: title.to_string(),
                    url: url.to_string(),
                    content: Some(content.to_string()),
                    img_src: None,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, _query: &str, _options: &SearchOptions) -> AppResult<SearchResponse> {
        Ok(SearchResponse {
            results: self.results.clone(),
            suggestions: vec![],
        })
    }
}

pub struct FailingSearch;

#[async_trait]
impl SearchProvider for FailingSearch {
    async fn search(&self, _query: &str, _options: &SearchOptions) -> AppResult<SearchResponse> {
        Err(AppError::Search("search backend down".to_string()))
    }
}

#[derive(Default)]
pub struct MemoryFileStore {
    pub files: HashMap<String, FileChunks>,
}

impl MemoryFileStore {
    pub fn with_file(mut self, id: &str, title: &str, chunks: &[&str]) -> Self {
        self.files.insert(
            id.to_string(),
            FileChunks {
                title: title.to_string(),
                chunks: chunks
                    .iter()
                    .map(|c| FileChunk {
                        content: c.to_string(),
                        embedding: hash_vector(c),
                    })
                    .collect(),
            },
        );
        self
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn load(&self, file_id: &str) -> AppResult<Option<FileChunks>> {
        Ok(self.files.get(file_id).cloned())
    }
}

/// Fetcher serving canned pages by URL; unknown URLs fetch as `None`.
#[derive(Default)]
pub struct StaticFetcher {
    pub pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn with_page(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), content.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn get_web_content(
        &self,
        url: &str,
        _want_html: bool,
    ) -> AppResult<Option<FetchedPage>> {
        Ok(self.pages.get(url).map(|content| FetchedPage {
            page_content: content.clone(),
            metadata: PageMetadata {
                title: format!("Page {}", url),
                url: url.to_string(),
                html: None,
            },
        }))
    }
}

pub struct TestHarness {
    pub ctx: AgentContext,
    pub rx: mpsc::UnboundedReceiver<WorkflowEvent>,
}

impl TestHarness {
    pub fn drain_events(&mut self) -> Vec<WorkflowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn test_config() -> Config {
    use crate::config::*;
    Config {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            cors_allowed_origins: vec![],
        },
        llm: LLMConfig {
            openai_api_key: "test".to_string(),
            anthropic_api_key: String::new(),
            default_provider: "openai".to_string(),
            default_model: "gpt-4o-mini".to_string(),
            openai_base_url: String::new(),
        },
        embeddings: EmbeddingsConfig {
            api_key: "test".to_string(),
            model: "text-embedding-3-small".to_string(),
            base_url: String::new(),
            similarity: "cosine".to_string(),
        },
        search: SearchConfig {
            searxng_url: "http://localhost:8888".to_string(),
            language: "en".to_string(),
            uploads_dir: "./uploads".to_string(),
        },
        orchestrator: OrchestratorConfig::default(),
    }
}

pub struct HarnessBuilder {
    llm: Arc<dyn LLMAdapter>,
    search: Arc<dyn SearchProvider>,
    files: Arc<dyn FileStore>,
    fetcher: Arc<dyn PageFetcher>,
    config: Config,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            llm: Arc::new(ScriptedLLM::new(vec![])),
            search: Arc::new(StaticSearch::new(&[])),
            files: Arc::new(MemoryFileStore::default()),
            fetcher: Arc::new(StaticFetcher::default()),
            config: test_config(),
        }
    }

    pub fn llm(mut self, llm: ScriptedLLM) -> Self {
        self.llm = Arc::new(llm);
        self
    }

    pub fn search(mut self, search: StaticSearch) -> Self {
        self.search = Arc::new(search);
        self
    }

    pub fn search_provider<P: SearchProvider + 'static>(mut self, provider: P) -> Self {
        self.search = Arc::new(provider);
        self
    }

    pub fn files(mut self, files: MemoryFileStore) -> Self {
        self.files = Arc::new(files);
        self
    }

    pub fn fetcher(mut self, fetcher: StaticFetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> TestHarness {
        let (events, rx) = EventSink::new();
        let usage = UsageMeter::default();
        TestHarness {
            ctx: AgentContext {
                llm: Arc::new(MeteredLLM::new(self.llm, usage.clone())),
                embedder: Arc::new(HashEmbedder),
                search: self.search,
                files: self.files,
                fetcher: self.fetcher,
                config: Arc::new(self.config),
                events,
                cancel: CancellationToken::new(),
                usage,
            },
            rx,
        }
    }
}

pub fn harness() -> TestHarness {
    HarnessBuilder::new().build()
}
