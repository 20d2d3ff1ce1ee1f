//! Paragraph-packing pagination and the TTL page cache.
//!
//! Oversized content is split greedily on blank-line paragraph boundaries.
//! A paragraph longer than a whole page is cut into fixed-size chunks with
//! no attempt to respect words or sentences. All lengths are in characters.
//!
//! Pages are stored verbatim, so [`join_pages`] rebuilds the original text
//! exactly.

use crate::error::SearchError;
use crate::types::{ContentFormat, FetchMethod};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Paragraph separator used for splitting and rejoining.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Default lifetime of a cached page set.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// One page of split content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub text: String,
    /// True when this page is a later chunk of a paragraph that was cut
    /// because it alone exceeded the page size.
    pub continues_paragraph: bool,
}

impl Page {
    fn whole(text: String) -> Self {
        Self {
            text,
            continues_paragraph: false,
        }
    }
}

/// Split `content` into pages of at most `max_length` characters.
///
/// Content that already fits is returned as a single page.
pub fn split_into_pages(content: &str, max_length: usize) -> Vec<Page> {
    let max_length = max_length.max(1);
    if content.chars().count() <= max_length {
        return vec![Page::whole(content.to_owned())];
    }

    let separator_len = PARAGRAPH_SEPARATOR.len();
    let mut pages: Vec<Page> = Vec::new();
    // `None` means no buffered page; `Some("")` is a buffered empty paragraph.
    let mut buffer: Option<String> = None;
    let mut buffer_len = 0usize;

    for paragraph in content.split(PARAGRAPH_SEPARATOR) {
        let len = paragraph.chars().count();

        if len > max_length {
            if let Some(page) = buffer.take() {
                pages.push(Page::whole(page));
            }
            for (i, chunk) in char_chunks(paragraph, max_length).into_iter().enumerate() {
                pages.push(Page {
                    text: chunk,
                    continues_paragraph: i > 0,
                });
            }
            continue;
        }

        match buffer.as_mut() {
            Some(current) if buffer_len + len + separator_len <= max_length => {
                current.push_str(PARAGRAPH_SEPARATOR);
                current.push_str(paragraph);
                buffer_len += len + separator_len;
            }
            Some(_) => {
                if let Some(page) = buffer.replace(paragraph.to_owned()) {
                    pages.push(Page::whole(page));
                }
                buffer_len = len;
            }
            None => {
                buffer = Some(paragraph.to_owned());
                buffer_len = len;
            }
        }
    }

    if let Some(page) = buffer {
        pages.push(Page::whole(page));
    }
    pages
}

/// Rebuild the content that [`split_into_pages`] was given.
pub fn join_pages(pages: &[Page]) -> String {
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 && !page.continues_paragraph {
            out.push_str(PARAGRAPH_SEPARATOR);
        }
        out.push_str(&page.text);
    }
    out
}

fn char_chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Derive a cache key: random session prefix, content hash prefix, page count.
///
/// Two fetches of identical content still get distinct keys.
pub fn page_id(content: &str, page_count: usize) -> String {
    let session = uuid::Uuid::new_v4().simple().to_string();
    let digest = Sha256::digest(content.as_bytes());
    let hash: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("{}_{hash}_{page_count}", &session[..8])
}

/// Fetch details kept alongside cached pages.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFetch {
    pub method: FetchMethod,
    pub format: ContentFormat,
    pub title: Option<String>,
    pub metadata: Option<serde_json::Value>,
    /// Character length of the full content before splitting.
    pub total_length: usize,
}

/// One page served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPage {
    pub page_id: String,
    pub content: String,
    pub page_number: usize,
    pub total_pages: usize,
    pub fetch: CachedFetch,
}

#[derive(Debug)]
struct CacheEntry {
    url: String,
    pages: Vec<String>,
    fetch: CachedFetch,
    created_at: Instant,
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

/// In-memory page sets keyed by page id, expired lazily on insert and lookup.
#[derive(Debug)]
pub struct PageCache {
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a page set for `url` and return its key.
    ///
    /// Expired entries are evicted first, under the same lock.
    pub fn insert(&self, url: &str, key: String, pages: Vec<String>, fetch: CachedFetch) -> String {
        self.insert_at(url, key, pages, fetch, Instant::now())
    }

    pub fn insert_at(
        &self,
        url: &str,
        key: String,
        pages: Vec<String>,
        fetch: CachedFetch,
        now: Instant,
    ) -> String {
        let mut inner = self.lock();
        Self::sweep(&mut inner, self.ttl, now);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        tracing::debug!(%url, page_id = %key, pages = pages.len(), "caching paginated content");
        inner.entries.insert(
            key.clone(),
            CacheEntry {
                url: url.to_owned(),
                pages,
                fetch,
                created_at: now,
                seq,
            },
        );
        key
    }

    /// Serve page `page_number` (1-based) of the newest page set for `url`.
    ///
    /// Expired entries are evicted first, under the same lock.
    ///
    /// # Errors
    ///
    /// - [`SearchError::PageNotCached`] when no live entry exists for `url`.
    /// - [`SearchError::InvalidPage`] when `page_number` is out of range.
    pub fn page(&self, url: &str, page_number: usize) -> Result<CachedPage, SearchError> {
        self.page_at(url, page_number, Instant::now())
    }

    pub fn page_at(
        &self,
        url: &str,
        page_number: usize,
        now: Instant,
    ) -> Result<CachedPage, SearchError> {
        let mut inner = self.lock();
        Self::sweep(&mut inner, self.ttl, now);

        let (key, entry) = inner
            .entries
            .iter()
            .filter(|(_, e)| e.url == url)
            .max_by_key(|(_, e)| (e.created_at, e.seq))
            .ok_or_else(|| SearchError::PageNotCached(url.to_owned()))?;

        let total = entry.pages.len();
        if page_number == 0 || page_number > total {
            return Err(SearchError::InvalidPage {
                requested: page_number,
                total,
            });
        }

        Ok(CachedPage {
            page_id: key.clone(),
            content: entry.pages[page_number - 1].clone(),
            page_number,
            total_pages: total,
            fetch: entry.fetch.clone(),
        })
    }

    /// Drop entries older than the TTL, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut inner = self.lock();
        Self::sweep(&mut inner, self.ttl, now)
    }

    fn sweep(inner: &mut CacheInner, ttl: Duration, now: Instant) -> usize {
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, e| now.saturating_duration_since(e.created_at) <= ttl);
        let removed = before - inner.entries.len();
        if removed > 0 {
            tracing::info!(removed, "evicted expired page cache entries");
        }
        removed
    }

    /// Remove one page set by key.
    pub fn remove(&self, page_id: &str) -> bool {
        self.lock().entries.remove(page_id).is_some()
    }

    /// Remove every page set, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        tracing::info!(count, "page cache cleared");
        count
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
