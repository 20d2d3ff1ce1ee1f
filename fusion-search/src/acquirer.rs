//! Multi-method page content acquisition.
//!
//! Tries, in order, a reader API that returns pre-rendered markdown, a
//! scrape API (only when a key is configured), and finally a direct GET
//! with local HTML to markdown conversion. The first method that yields
//! non-empty content wins. Empty bodies are soft failures that fall
//! through just like errors.

use crate::config::{FetchConfig, HttpConfig};
use crate::content::{html_to_markdown, is_html_content_type};
use crate::error::SearchError;
use crate::http::{build_client, check_status, transport_error};
use crate::types::{ContentFormat, FetchMethod, FetchedContent};
use serde_json::Value;

/// Fetches page content through the reader, scrape, and direct methods.
#[derive(Debug, Clone)]
pub struct ContentAcquirer {
    client: reqwest::Client,
    reader_endpoint: String,
    reader_api_key: Option<String>,
    scrape_endpoint: String,
    scrape_api_key: Option<String>,
}

impl ContentAcquirer {
    /// Build an acquirer whose requests use the fetch timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] or [`SearchError::Http`] if the HTTP
    /// client cannot be built.
    pub fn new(fetch: &FetchConfig, http: &HttpConfig) -> Result<Self, SearchError> {
        fetch.validate()?;
        let http = HttpConfig {
            timeout_seconds: fetch.timeout_seconds,
            ..http.clone()
        };
        Ok(Self {
            client: build_client(&http)?,
            reader_endpoint: fetch.reader_endpoint.clone(),
            reader_api_key: fetch.reader_api_key.clone(),
            scrape_endpoint: fetch.scrape_endpoint.clone(),
            scrape_api_key: fetch.scrape_api_key.clone(),
        })
    }

    /// Whether the scrape method will be attempted.
    pub fn has_scrape(&self) -> bool {
        self.scrape_api_key.is_some()
    }

    /// Acquire the content of `url`.
    ///
    /// `prefer_reader` enables the reader method; `with_image_alt` asks the
    /// reader to generate alt text for images.
    ///
    /// # Errors
    ///
    /// [`SearchError::AllMethodsFailed`] listing each attempted method's
    /// reason when none produced content.
    pub async fn acquire(
        &self,
        url: &str,
        prefer_reader: bool,
        with_image_alt: bool,
    ) -> Result<FetchedContent, SearchError> {
        let mut reasons: Vec<String> = Vec::new();

        if prefer_reader {
            let outcome = self.fetch_with_reader(url, with_image_alt).await;
            if let Some(content) = settle(FetchMethod::Reader, outcome, &mut reasons) {
                return Ok(content);
            }
        }

        if let Some(ref key) = self.scrape_api_key {
            let outcome = self.fetch_with_scrape(url, key).await;
            if let Some(content) = settle(FetchMethod::Scrape, outcome, &mut reasons) {
                return Ok(content);
            }
        }

        let outcome = self.fetch_direct(url).await;
        if let Some(content) = settle(FetchMethod::Direct, outcome, &mut reasons) {
            return Ok(content);
        }

        tracing::error!(%url, reasons = %reasons.join("; "), "all fetching methods failed");
        Err(SearchError::AllMethodsFailed(reasons.join("; ")))
    }

    /// Reader API: POST `{"url": ...}`, body is the rendered page.
    ///
    /// A JSON envelope of the form `{"data": {"content", "title"}}` is
    /// unwrapped; any other body is taken verbatim as markdown.
    async fn fetch_with_reader(
        &self,
        url: &str,
        with_image_alt: bool,
    ) -> Result<Option<FetchedContent>, SearchError> {
        let mut request = self
            .client
            .post(&self.reader_endpoint)
            .header("Accept", "application/json")
            .header("X-With-Links-Summary", "all")
            .header("X-Retain-Images", "none")
            .header("X-Respond-With", "markdown")
            .json(&serde_json::json!({ "url": url }));
        if with_image_alt {
            request = request.header("X-With-Generated-Alt", "true");
        }
        if let Some(ref key) = self.reader_api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error("reader", e))?;
        let body = check_status("reader", response)?
            .text()
            .await
            .map_err(|e| transport_error("reader", e))?;

        let (content, title) = match serde_json::from_str::<Value>(&body) {
            Ok(json) if json.pointer("/data/content").is_some() => (
                json.pointer("/data/content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                json.pointer("/data/title")
                    .and_then(Value::as_str)
                    .filter(|t| !t.trim().is_empty())
                    .map(str::to_owned),
            ),
            _ => (body, None),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(FetchedContent {
            content,
            method: FetchMethod::Reader,
            format: ContentFormat::Markdown,
            title,
            metadata: None,
        }))
    }

    /// Scrape API: POST `{"url", "includeMarkdown": true}` with the key.
    async fn fetch_with_scrape(
        &self,
        url: &str,
        api_key: &str,
    ) -> Result<Option<FetchedContent>, SearchError> {
        let response = self
            .client
            .post(&self.scrape_endpoint)
            .header("X-API-KEY", api_key)
            .json(&serde_json::json!({ "url": url, "includeMarkdown": true }))
            .send()
            .await
            .map_err(|e| transport_error("scrape", e))?;
        let data: Value = check_status("scrape", response)?
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("scrape response: {e}")))?;

        let markdown = data
            .get("markdown")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        let (content, format) = match markdown {
            Some(md) => (md, ContentFormat::Markdown),
            None => (
                data.get("text").and_then(Value::as_str).unwrap_or_default(),
                ContentFormat::Text,
            ),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }

        let metadata = data.get("metadata").cloned();
        let title = metadata
            .as_ref()
            .and_then(|m| m.get("title"))
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .map(str::to_owned);

        Ok(Some(FetchedContent {
            content: content.to_owned(),
            method: FetchMethod::Scrape,
            format,
            title,
            metadata,
        }))
    }

    /// Plain GET; HTML is converted to markdown, anything else kept as text.
    async fn fetch_direct(&self, url: &str) -> Result<Option<FetchedContent>, SearchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error("direct fetch", e))?;
        let response = check_status("direct fetch", response)?;

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_html_content_type);
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("direct fetch", e))?;

        let fetched = if is_html {
            let page = html_to_markdown(&body);
            FetchedContent {
                content: page.markdown,
                method: FetchMethod::Direct,
                format: ContentFormat::Markdown,
                title: page.title,
                metadata: None,
            }
        } else {
            FetchedContent {
                content: body,
                method: FetchMethod::Direct,
                format: ContentFormat::Text,
                title: None,
                metadata: None,
            }
        };

        if fetched.content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(fetched))
    }
}

/// Log one method's outcome and keep its failure reason.
fn settle(
    method: FetchMethod,
    outcome: Result<Option<FetchedContent>, SearchError>,
    reasons: &mut Vec<String>,
) -> Option<FetchedContent> {
    match outcome {
        Ok(Some(content)) => {
            tracing::debug!(%method, chars = content.content.chars().count(), "content acquired");
            Some(content)
        }
        Ok(None) => {
            tracing::warn!(%method, "fetch method returned empty content");
            reasons.push(format!("{method}: empty content"));
            None
        }
        Err(err) => {
            tracing::warn!(%method, error = %err, "fetch method failed");
            reasons.push(format!("{method}: {err}"));
            None
        }
    }
}
