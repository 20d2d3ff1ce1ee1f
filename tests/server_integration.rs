//! End-to-end tests of the JSON line bridge.
//!
//! Requests are written into an in-memory pipe and responses read back,
//! with fake providers for search and a wiremock origin for fetching.

use async_trait::async_trait;
use fusion_search::{Dispatcher, DispatcherConfig, Provider, SearchError, SearchResult};
use search_fusion::stdio::serve;
use search_fusion::{FusionConfig, SearchFusionServer};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct EchoProvider {
    name: &'static str,
    priority: f64,
    fail: bool,
    delay: Duration,
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> f64 {
        self.priority
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(SearchError::Http("HTTP 502".into()));
        }
        Ok((0..num_results)
            .map(|i| SearchResult::new(format!("{query} {i}"), format!("https://echo.test/{i}"), "", "echo"))
            .collect())
    }
}

fn providers() -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(EchoProvider {
            name: "BrokenSearch",
            priority: 1.0,
            fail: true,
            delay: Duration::ZERO,
        }),
        Arc::new(EchoProvider {
            name: "EchoSearch",
            priority: 2.0,
            fail: false,
            delay: Duration::from_millis(5),
        }),
    ]
}

fn server(config: &FusionConfig) -> Arc<SearchFusionServer> {
    let server = SearchFusionServer::with_builder(config, || async {
        Ok::<_, SearchError>(Dispatcher::new(providers(), &DispatcherConfig::default()))
    })
    .expect("server");
    Arc::new(server)
}

/// Feed `requests` as JSON lines and collect the responses keyed by id.
async fn exchange(server: Arc<SearchFusionServer>, requests: &[Value]) -> HashMap<String, Value> {
    let (mut client_write, bridge_read) = tokio::io::duplex(64 * 1024);
    let (bridge_write, client_read) = tokio::io::duplex(256 * 1024);

    let bridge = tokio::spawn(serve(server, BufReader::new(bridge_read), bridge_write));

    for request in requests {
        let line = format!("{request}\n");
        client_write.write_all(line.as_bytes()).await.expect("write request");
    }
    drop(client_write);

    let mut responses = HashMap::new();
    let mut lines = BufReader::new(client_read).lines();
    while let Some(line) = lines.next_line().await.expect("read response") {
        let value: Value = serde_json::from_str(&line).expect("response json");
        let key = match &value["id"] {
            Value::Null => value["tool"].as_str().unwrap_or_default().to_owned(),
            id => id.to_string(),
        };
        responses.insert(key, value);
    }
    bridge.await.expect("join").expect("bridge");
    responses
}

#[tokio::test]
async fn concurrent_searches_fail_over_and_report_status() {
    let server = server(&FusionConfig::default());
    let mut requests: Vec<Value> = (0..5)
        .map(|i| json!({"id": i, "tool": "search", "args": {"query": format!("q{i}"), "num_results": 3}}))
        .collect();
    requests.push(json!({"id": "preferred", "tool": "search", "args": {"query": "p", "engine": "echo"}}));

    let responses = exchange(Arc::clone(&server), &requests).await;
    assert_eq!(responses.len(), 6);
    for i in 0..5 {
        let result = &responses[&i.to_string()]["result"];
        assert_eq!(result["success"], true);
        assert_eq!(result["provider"], "EchoSearch");
        assert_eq!(result["num_results"], 3);
        assert_eq!(result["query"], format!("q{i}"));
    }
    let preferred = &responses["\"preferred\""]["result"];
    assert_eq!(preferred["engine"], "echo");
    assert_eq!(preferred["num_results"], 10);

    let status = exchange(server, &[json!({"id": "s", "tool": "get_available_engines"})]).await;
    let status = &status["\"s\""]["result"];
    assert_eq!(status["gate"]["state"], "ready");
    let providers = status["providers"].as_array().expect("providers");
    assert_eq!(providers[0]["name"], "BrokenSearch");
    assert!(providers[0]["error_count"].as_u64().expect("count") >= 3);
    assert_eq!(providers[0]["in_cooldown"], true);
    assert_eq!(status["engines"], json!(["EchoSearch"]));
    assert_eq!(status["stats"]["last_used_provider"], "EchoSearch");
}

#[tokio::test]
async fn failed_construction_is_reported_as_retry_later() {
    let server = Arc::new(
        SearchFusionServer::with_builder(&FusionConfig::default(), || async {
            Err::<Dispatcher, _>(SearchError::Config("bad proxy".into()))
        })
        .expect("server"),
    );

    let first = server.search("q", None, "auto").await.unwrap_err();
    assert_eq!(first.kind, "unavailable");
    assert!(first.error.contains("bad proxy"));

    let second = server.search("q", None, "auto").await.unwrap_err();
    assert_eq!(second.kind, "initializing");
    assert!(second.retry_after_secs.is_some());

    let status = server.available_engines().await;
    assert!(status.engines.is_empty());
    assert!(status.error.is_some());
}

#[tokio::test]
async fn fetch_pages_through_the_bridge() {
    let origin = MockServer::start().await;
    let body = ["x", "y", "z"]
        .iter()
        .map(|c| c.repeat(50))
        .collect::<Vec<_>>()
        .join("\n\n");
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/plain"))
        .expect(1)
        .mount(&origin)
        .await;

    let server = server(&FusionConfig::default());
    let url = format!("{}/doc", origin.uri());

    let first = exchange(
        Arc::clone(&server),
        &[json!({"id": 1, "tool": "fetch_url", "args": {"url": url, "use_jina": false, "max_length": 80}})],
    )
    .await;
    let first = &first["1"]["result"];
    assert_eq!(first["success"], true);
    assert_eq!(first["method"], "direct");
    assert_eq!(first["is_paginated"], true);
    assert_eq!(first["pages"], 3);
    assert!(first["time_ms"].is_u64());
    assert!(first["next_page_hint"].as_str().is_some_and(|h| h.contains("page_number=2")));

    let rest = exchange(
        Arc::clone(&server),
        &[
            json!({"id": 2, "tool": "fetch_url", "args": {"url": url, "page_number": 3}}),
            json!({"id": 3, "tool": "fetch_url", "args": {"url": url, "page_number": 4}}),
            json!({"id": 4, "tool": "fetch_url", "args": {"url": format!("{}/other", origin.uri()), "page_number": 2}}),
        ],
    )
    .await;
    assert_eq!(rest["2"]["result"]["content"], "z".repeat(50));
    assert_eq!(rest["2"]["result"]["page_info"], "Page 3 of 3");
    assert_eq!(rest["3"]["result"]["kind"], "invalid_page");
    assert_eq!(rest["3"]["result"]["success"], false);
    assert_eq!(rest["4"]["result"]["kind"], "page_not_cached");

    let cleared = exchange(server, &[json!({"id": 5, "tool": "clear_cache"})]).await;
    assert_eq!(cleared["5"]["result"]["cleared"], 1);
}

#[tokio::test]
async fn slow_fetch_hits_outer_timeout() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&origin)
        .await;

    let server = SearchFusionServer::with_builder(&FusionConfig::default(), || async {
        Ok::<_, SearchError>(Dispatcher::new(Vec::new(), &DispatcherConfig::default()))
    })
    .expect("server")
    .with_fetch_timeout(Duration::from_millis(100));

    let request = fusion_search::FetchRequest::new(format!("{}/slow", origin.uri())).use_reader(false);
    let err = server.fetch_url(&request).await.unwrap_err();
    assert_eq!(err.kind, "timeout");
    assert!(err.url.is_some());
}

async fn fetch_pair(max_concurrent_fetches: usize) -> (usize, usize) {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow page")
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&origin)
        .await;

    let mut config = FusionConfig::default();
    config.server.max_concurrent_fetches = max_concurrent_fetches;
    let server = SearchFusionServer::with_builder(&config, || async {
        Ok::<_, SearchError>(Dispatcher::new(Vec::new(), &DispatcherConfig::default()))
    })
    .expect("server")
    .with_fetch_timeout(Duration::from_millis(650));

    let first = fusion_search::FetchRequest::new(format!("{}/one", origin.uri())).use_reader(false);
    let second = fusion_search::FetchRequest::new(format!("{}/two", origin.uri())).use_reader(false);
    let (a, b) = tokio::join!(server.fetch_url(&first), server.fetch_url(&second));
    assert_eq!(server.available_fetch_permits(), max_concurrent_fetches);

    let ok = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
    let timed_out = [a, b]
        .into_iter()
        .filter(|r| r.as_ref().is_err_and(|e| e.kind == "timeout"))
        .count();
    (ok, timed_out)
}

#[tokio::test]
async fn fetches_queue_behind_the_concurrency_limit() {
    // One slot: the second fetch waits out the first and runs past its budget.
    assert_eq!(fetch_pair(1).await, (1, 1));
    assert_eq!(fetch_pair(2).await, (2, 0));
}
