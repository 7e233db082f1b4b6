//! Small text helpers shared across agents.

use crate::types::LLMMessage;

/// Remove `<think>...</think>` blocks some models interleave with their
/// output. Unclosed blocks are dropped to the end of the text.
pub fn strip_thinking_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Extract the inner text of `<tag>...</tag>` from a model reply.
pub fn extract_tagged_block<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim())
}

/// Serialize the most recent conversation turns for prompt context.
pub fn format_history(messages: &[LLMMessage], max_turns: usize) -> String {
    if messages.is_empty() {
        return "No prior conversation.".to_string();
    }
    let start = messages.len().saturating_sub(max_turns);
    messages[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role, strip_thinking_blocks(&m.content)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull whitespace-delimited http(s) URLs out of free text, dropping
/// trailing punctuation a sentence would attach.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for token in text.split_whitespace() {
        if token.starts_with("http://") || token.starts_with("https://") {
            let trimmed = token.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']']);
            if !trimmed.is_empty() && !urls.iter().any(|u| u == trimmed) {
                urls.push(trimmed.to_string());
            }
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_thinking_blocks() {
        let text = "before <think>internal musing</think>after";
        assert_eq!(strip_thinking_blocks(text), "before after");
    }

    #[test]
    fn test_strip_unclosed_thinking_block() {
        let text = "answer <think>never closed";
        assert_eq!(strip_thinking_blocks(text), "answer");
    }

    #[test]
    fn test_strip_without_blocks_is_identity() {
        assert_eq!(strip_thinking_blocks("plain text"), "plain text");
    }

    #[test]
    fn test_extract_tagged_block() {
        let text = "<answer>good_content</answer>\n<reason>covered</reason>";
        assert_eq!(extract_tagged_block(text, "answer"), Some("good_content"));
        assert_eq!(extract_tagged_block(text, "reason"), Some("covered"));
        assert_eq!(extract_tagged_block(text, "question"), None);
    }

    #[test]
    fn test_format_history_limits_turns() {
        let messages: Vec<LLMMessage> = (0..5)
            .map(|i| LLMMessage::user(format!("turn {}", i)))
            .collect();
        let formatted = format_history(&messages, 2);
        assert!(formatted.contains("turn 3"));
        assert!(formatted.contains("turn 4"));
        assert!(!formatted.contains("turn 2"));
    }

    #[test]
    fn test_extract_urls() {
        let urls = extract_urls("see https://a.com/page, and http://b.org.");
        assert_eq!(urls, vec!["https://a.com/page", "http://b.org"]);
    }

    #[test]
    fn test_extract_urls_dedupes() {
        let urls = extract_urls("https://a.com https://a.com");
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn test_extract_urls_none() {
        assert!(extract_urls("no links here").is_empty());
    }
}
