//! Page fetching and readable-text extraction.
//!
//! Fetches a URL over HTTP and strips the page down to its readable text:
//! prefer `article`, fall back to `main`, then `body`, and collect paragraph
//! and list-item blocks. Extraction is fully synchronous so the parsed DOM
//! never lives across an await point.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct PageMetadata {
    pub title: String,
    pub url: String,
    pub html: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub page_content: String,
    pub metadata: PageMetadata,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch and extract readable text. `None` means the page was
    /// unreachable or had no usable content; callers skip, they don't fail.
    async fn get_web_content(&self, url: &str, want_html: bool)
        -> AppResult<Option<FetchedPage>>;
}

pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent("Mozilla/5.0 (compatible; lodestar/0.1)")
            .build()
            .map_err(|e| AppError::Fetch(format!("failed to build fetch client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn get_web_content(
        &self,
        url: &str,
        want_html: bool,
    ) -> AppResult<Option<FetchedPage>> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, error = %e, "page fetch failed");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            warn!(url = %url, status = %response.status(), "page fetch non-success");
            return Ok(None);
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!(url = %url, error = %e, "page body read failed");
                return Ok(None);
            }
        };

        let (title, text) = extract_readable(&body);
        if text.trim().is_empty() {
            debug!(url = %url, "page had no extractable text");
            return Ok(None);
        }

        Ok(Some(FetchedPage {
            page_content: text,
            metadata: PageMetadata {
                title: title.unwrap_or_else(|| url.to_string()),
                url: url.to_string(),
                html: want_html.then_some(body),
            },
        }))
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn compact_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pull (title, readable text) out of an HTML document.
pub fn extract_readable(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| compact_ws(&element_text(el)))
        .filter(|t| !t.is_empty());

    let root = Selector::parse("article")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .or_else(|| {
            Selector::parse("main")
                .ok()
                .and_then(|sel| document.select(&sel).next())
        })
        .or_else(|| {
            Selector::parse("body")
                .ok()
                .and_then(|sel| document.select(&sel).next())
        });

    let Some(root) = root else {
        return (title, String::new());
    };

    let Ok(block_sel) = Selector::parse("p, li, h1, h2, h3") else {
        return (title, String::new());
    };

    let mut blocks: Vec<String> = Vec::new();
    for element in root.select(&block_sel) {
        let text = compact_ws(&element_text(element));
        if !text.is_empty() {
            blocks.push(text);
        }
    }

    // Thin pages (script-rendered, tables only) fall back to the whole
    // subtree text so short docs still yield something.
    if blocks.is_empty() {
        return (title, compact_ws(&element_text(root)));
    }

    (title, blocks.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_prefers_article() {
        let html = r#"
            <html><head><title>My Page</title></head>
            <body>
              <nav><p>menu item</p></nav>
              <article><p>First paragraph.</p><li>A point</li></article>
            </body></html>
        "#;
        let (title, text) = extract_readable(html);
        assert_eq!(title.as_deref(), Some("My Page"));
        assert!(text.contains("First paragraph."));
        assert!(text.contains("A point"));
        assert!(!text.contains("menu item"));
    }

    #[test]
    fn test_extract_body_fallback() {
        let html = "<html><body><p>only body</p></body></html>";
        let (title, text) = extract_readable(html);
        assert!(title.is_none());
        assert_eq!(text, "only body");
    }

    #[test]
    fn test_extract_empty_page() {
        let (_, text) = extract_readable("<html><body></body></html>");
        assert!(text.trim().is_empty());
    }

    #[test]
    fn test_whitespace_is_compacted() {
        let html = "<html><body><p>  spaced \n  out  </p></body></html>";
        let (_, text) = extract_readable(html);
        assert_eq!(text, "spaced out");
    }

    #[tokio::test]
    async fn test_fetch_unreachable_returns_none() {
        let fetcher = HttpPageFetcher::new().unwrap();
        let result = fetcher
            .get_web_content("http://127.0.0.1:1/none", false)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_fetch_extracts_page() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("<html><head><title>T</title></head><body><p>hello</p></body></html>")
            .create_async()
            .await;

        let fetcher = HttpPageFetcher::new().unwrap();
        let page = fetcher
            .get_web_content(&format!("{}/page", server.url()), true)
            .await
            .unwrap()
            .expect("page");
        assert_eq!(page.metadata.title, "T");
        assert_eq!(page.page_content, "hello");
        assert!(page.metadata.html.is_some());
    }
}
