//! Web page fetching with pagination.
//!
//! [`WebFetcher`] ties the [`ContentAcquirer`] to the page splitter and the
//! [`PageCache`]: page 1 always acquires fresh content, later pages are only
//! ever served from the cache.

use crate::acquirer::ContentAcquirer;
use crate::config::{FetchConfig, HttpConfig};
use crate::error::SearchError;
use crate::paginate::{page_id, split_into_pages, CachedFetch, CachedPage, PageCache};
use crate::types::{ContentFormat, FetchMethod, FetchedContent};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_true() -> bool {
    true
}

fn default_page_number() -> usize {
    1
}

/// Arguments of one fetch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Try the reader API first.
    #[serde(default = "default_true", alias = "use_jina")]
    pub use_reader: bool,
    /// Ask the reader API to generate image alt text.
    #[serde(default)]
    pub with_image_alt: bool,
    /// Page size in characters. `None` uses the configured default.
    #[serde(default)]
    pub max_length: Option<usize>,
    /// 1-based page to return.
    #[serde(default = "default_page_number")]
    pub page_number: usize,
}

impl FetchRequest {
    /// Request page 1 of `url` with default options.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            use_reader: true,
            with_image_alt: false,
            max_length: None,
            page_number: 1,
        }
    }

    #[must_use]
    pub fn page(mut self, page_number: usize) -> Self {
        self.page_number = page_number;
        self
    }

    #[must_use]
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    #[must_use]
    pub fn use_reader(mut self, use_reader: bool) -> Self {
        self.use_reader = use_reader;
        self
    }
}

/// Successful fetch result for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResponse {
    pub success: bool,
    pub url: String,
    pub method: FetchMethod,
    pub format: ContentFormat,
    pub content: String,
    /// Characters in the full content, across all pages.
    pub total_length: usize,
    pub is_paginated: bool,
    pub pages: usize,
    pub current_page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    pub page_info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Fetches pages and serves later pages of oversized content from cache.
#[derive(Debug)]
pub struct WebFetcher {
    acquirer: ContentAcquirer,
    cache: PageCache,
    default_max_length: usize,
}

impl WebFetcher {
    /// Build a fetcher from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for invalid settings or an HTTP
    /// client that cannot be built.
    pub fn new(fetch: &FetchConfig, http: &HttpConfig) -> Result<Self, SearchError> {
        Ok(Self::from_parts(
            ContentAcquirer::new(fetch, http)?,
            PageCache::new(Duration::from_secs(fetch.cache_ttl_secs)),
            fetch.default_max_length,
        ))
    }

    pub fn from_parts(acquirer: ContentAcquirer, cache: PageCache, default_max_length: usize) -> Self {
        Self {
            acquirer,
            cache,
            default_max_length,
        }
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Drop every cached page set.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    /// Fetch one page of `request.url`.
    ///
    /// # Errors
    ///
    /// - [`SearchError::InvalidRequest`] for a non-HTTP(S) URL, page 0, or
    ///   a zero page size.
    /// - [`SearchError::AllMethodsFailed`] when page 1 cannot be acquired.
    /// - [`SearchError::PageNotCached`] or [`SearchError::InvalidPage`] for
    ///   later pages.
    pub async fn fetch_url(&self, request: &FetchRequest) -> Result<FetchResponse, SearchError> {
        validate_url(&request.url)?;
        if request.page_number == 0 {
            return Err(SearchError::InvalidRequest(
                "page_number must be at least 1".into(),
            ));
        }
        let max_length = request.max_length.unwrap_or(self.default_max_length);
        if max_length == 0 {
            return Err(SearchError::InvalidRequest(
                "max_length must be greater than 0".into(),
            ));
        }

        if request.page_number > 1 {
            let cached = self.cache.page(&request.url, request.page_number)?;
            tracing::debug!(url = %request.url, page = request.page_number, "serving cached page");
            return Ok(cached_response(&request.url, cached));
        }

        let fetched = self
            .acquirer
            .acquire(&request.url, request.use_reader, request.with_image_alt)
            .await?;
        Ok(self.paginate(&request.url, fetched, max_length))
    }

    fn paginate(&self, url: &str, fetched: FetchedContent, max_length: usize) -> FetchResponse {
        let total_length = fetched.content.chars().count();

        if total_length <= max_length {
            return FetchResponse {
                success: true,
                url: url.to_owned(),
                method: fetched.method,
                format: fetched.format,
                content: fetched.content,
                total_length,
                is_paginated: false,
                pages: 1,
                current_page: 1,
                page_id: None,
                page_info: format!("Complete content ({total_length} characters)"),
                next_page_hint: None,
                metadata: fetched.metadata,
                title: fetched.title,
            };
        }

        let pages: Vec<String> = split_into_pages(&fetched.content, max_length)
            .into_iter()
            .map(|p| p.text)
            .collect();
        let count = pages.len();
        let first = pages.first().cloned().unwrap_or_default();
        let key = self.cache.insert(
            url,
            page_id(&fetched.content, count),
            pages,
            CachedFetch {
                method: fetched.method,
                format: fetched.format,
                title: fetched.title.clone(),
                metadata: fetched.metadata.clone(),
                total_length,
            },
        );
        tracing::info!(%url, pages = count, total_length, "content paginated");

        FetchResponse {
            success: true,
            url: url.to_owned(),
            method: fetched.method,
            format: fetched.format,
            content: first,
            total_length,
            is_paginated: true,
            pages: count,
            current_page: 1,
            page_id: Some(key),
            page_info: format!("Page 1 of {count} (total {total_length} characters)"),
            next_page_hint: next_page_hint(url, 1, count),
            metadata: fetched.metadata,
            title: fetched.title,
        }
    }
}

fn cached_response(url: &str, page: CachedPage) -> FetchResponse {
    FetchResponse {
        success: true,
        url: url.to_owned(),
        method: page.fetch.method,
        format: page.fetch.format,
        content: page.content,
        total_length: page.fetch.total_length,
        is_paginated: true,
        pages: page.total_pages,
        current_page: page.page_number,
        page_id: Some(page.page_id),
        page_info: format!("Page {} of {}", page.page_number, page.total_pages),
        next_page_hint: next_page_hint(url, page.page_number, page.total_pages),
        metadata: page.fetch.metadata,
        title: page.fetch.title,
    }
}

fn next_page_hint(url: &str, current: usize, total: usize) -> Option<String> {
    (current < total).then(|| {
        format!(
            "To get the next page, call fetch_url(url='{url}', page_number={}); \
             other pages are available by changing page_number (1-{total})",
            current + 1
        )
    })
}

fn validate_url(raw: &str) -> Result<(), SearchError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| SearchError::InvalidRequest(format!("invalid URL '{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SearchError::InvalidRequest(format!(
            "unsupported URL scheme '{other}'"
        ))),
    }
}
