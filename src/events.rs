//! Workflow event stream.
//!
//! The orchestration core reports progress, sources, response tokens, stats
//! and termination through a channel of `WorkflowEvent`s. The transport
//! layer (SSE route) forwards them verbatim; ordering is the contract:
//! `sources` precedes the first `response` token, and exactly one terminal
//! `end`/`error` closes every run.

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::warn;

use crate::state::Document;
use crate::types::TokenUsage;

/// Machine-readable progress tags carried by `agent_action` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    AnalyzingQuery,
    TasksPlanned,
    RoutingContent,
    GeneratingSearchQuery,
    SearchingWeb,
    AnalyzingPreviews,
    SummarizingContent,
    SearchingFiles,
    SummarizingUrl,
    UrlFailed,
    AnalyzingContent,
    RefiningSearch,
    Synthesizing,
    RunTruncated,
}

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// Advisory progress/telemetry. Non-fatal.
    AgentAction {
        action: AgentAction,
        message: Option<String>,
        details: Option<Value>,
    },
    /// Full document list for the current answer. Emitted before streaming.
    Sources(Vec<Document>),
    /// Incremental response text.
    Response(String),
    /// Model name + token usage for the synthesis call.
    ModelStats {
        model_name: String,
        usage: Option<TokenUsage>,
    },
    /// Terminal: normal completion. Nothing follows.
    End,
    /// Terminal: the run failed.
    Error(String),
}

impl WorkflowEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowEvent::End | WorkflowEvent::Error(_))
    }

    /// JSON wire shape consumed by clients.
    pub fn to_json(&self) -> Value {
        match self {
            WorkflowEvent::AgentAction {
                action,
                message,
                details,
            } => {
                let mut obj = json!({
                    "type": "agent_action",
                    "action": action,
                });
                if let Some(message) = message {
                    obj["message"] = json!(message);
                }
                if let Some(details) = details {
                    obj["details"] = details.clone();
                }
                obj
            }
            WorkflowEvent::Sources(documents) => json!({
                "type": "data",
                "data": { "type": "sources", "data": documents },
            }),
            WorkflowEvent::Response(chunk) => json!({
                "type": "data",
                "data": { "type": "response", "data": chunk },
            }),
            WorkflowEvent::ModelStats { model_name, usage } => json!({
                "type": "stats",
                "data": {
                    "type": "modelStats",
                    "data": { "modelName": model_name, "usage": usage },
                },
            }),
            WorkflowEvent::End => json!({ "type": "end" }),
            WorkflowEvent::Error(message) => json!({
                "type": "error",
                "data": message,
            }),
        }
    }
}

/// Handle agents use to emit events. Cloned into every agent context.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<WorkflowEvent>,
}

impl EventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: WorkflowEvent) {
        if self.tx.send(event).is_err() {
            // Receiver dropped; the run keeps going so state invariants hold.
            warn!("event receiver dropped, discarding event");
        }
    }

    pub fn action(&self, action: AgentAction, message: impl Into<String>) {
        self.emit(WorkflowEvent::AgentAction {
            action,
            message: Some(message.into()),
            details: None,
        });
    }

    pub fn action_with_details(
        &self,
        action: AgentAction,
        message: impl Into<String>,
        details: Value,
    ) {
        self.emit(WorkflowEvent::AgentAction {
            action,
            message: Some(message.into()),
            details: Some(details),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ProcessingType;

    #[test]
    fn test_agent_action_wire_shape() {
        let event = WorkflowEvent::AgentAction {
            action: AgentAction::SearchingWeb,
            message: Some("searching".to_string()),
            details: Some(json!({"query": "rust"})),
        };
        let wire = event.to_json();
        assert_eq!(wire["type"], "agent_action");
        assert_eq!(wire["action"], "searching_web");
        assert_eq!(wire["details"]["query"], "rust");
    }

    #[test]
    fn test_sources_wire_shape() {
        let doc = Document::new("c", "t", "https://a.com", ProcessingType::PreviewOnly);
        let wire = WorkflowEvent::Sources(vec![doc]).to_json();
        assert_eq!(wire["type"], "data");
        assert_eq!(wire["data"]["type"], "sources");
        assert_eq!(wire["data"]["data"][0]["metadata"]["url"], "https://a.com");
    }

    #[test]
    fn test_response_and_end() {
        let wire = WorkflowEvent::Response("tok".to_string()).to_json();
        assert_eq!(wire["data"]["type"], "response");
        assert_eq!(wire["data"]["data"], "tok");
        assert_eq!(WorkflowEvent::End.to_json()["type"], "end");
        assert!(WorkflowEvent::End.is_terminal());
        assert!(WorkflowEvent::Error("x".to_string()).is_terminal());
        assert!(!WorkflowEvent::Response(String::new()).is_terminal());
    }

    #[test]
    fn test_stats_wire_shape() {
        let wire = WorkflowEvent::ModelStats {
            model_name: "gpt-4o-mini".to_string(),
            usage: Some(TokenUsage {
                input_tokens: 1,
                output_tokens: 2,
                total_tokens: 3,
            }),
        }
        .to_json();
        assert_eq!(wire["type"], "stats");
        assert_eq!(wire["data"]["type"], "modelStats");
        assert_eq!(wire["data"]["data"]["modelName"], "gpt-4o-mini");
        assert_eq!(wire["data"]["data"]["usage"]["total_tokens"], 3);
    }

    #[test]
    fn test_sink_delivers_in_order() {
        let (sink, mut rx) = EventSink::new();
        sink.emit(WorkflowEvent::Sources(vec![]));
        sink.emit(WorkflowEvent::Response("a".to_string()));
        sink.emit(WorkflowEvent::End);

        assert!(matches!(rx.try_recv().unwrap(), WorkflowEvent::Sources(_)));
        assert!(matches!(rx.try_recv().unwrap(), WorkflowEvent::Response(_)));
        assert!(matches!(rx.try_recv().unwrap(), WorkflowEvent::End));
    }
}
