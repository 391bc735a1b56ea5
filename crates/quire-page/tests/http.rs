//! Full renders over HTTP with the `remote` module.

#![allow(missing_docs)]

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quire_cache::{MemoryCache, SqliteCache};
use quire_core::{CacheAdapter, DiagnosticKind};
use quire_fetch::{FetchScheduler, HttpScheduler, SchedulerConfig};
use quire_page::{ModuleConfig, ModuleRegistry, Page, PageBuilder};

fn page() -> PageBuilder {
    let scheduler: Arc<dyn FetchScheduler> = Arc::new(HttpScheduler::new(SchedulerConfig::default()));
    Page::builder(Arc::new(ModuleRegistry::with_builtins()), scheduler)
}

fn remote(params: serde_json::Value) -> ModuleConfig {
    ModuleConfig::new("remote").with_params(params)
}

#[tokio::test]
async fn remote_modules_render_json_and_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Latest",
            "items": [{"summary": "first"}, {"summary": "second"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/motd"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<em>hi</em>"))
        .mount(&server)
        .await;

    let out = page()
        .template("<title>{{title}}</title>[[feed]]|[[motd]]")
        .module(
            "feed",
            remote(json!({
                "url": format!("{}/feed", server.uri()),
                "query": {"limit": "2"},
                "pointer": "/items/1/summary",
                "titlePointer": "/title"
            })),
        )
        .module(
            "motd",
            remote(json!({"url": format!("{}/motd", server.uri()), "escape": true})),
        )
        .build()
        .render()
        .await;

    assert_eq!(out.content, "<title>Latest</title>second|&lt;em&gt;hi&lt;/em&gt;");
    assert_eq!(out.rounds, 1);
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
}

#[tokio::test]
async fn failed_request_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let out = page()
        .template("[[a]]|[[b]]")
        .module("a", remote(json!({"url": server.uri()})))
        .module("b", remote(json!({"url": server.uri(), "fallback": "offline"})))
        .build()
        .render()
        .await;

    assert_eq!(out.content, "|offline");
    assert_eq!(out.diagnostics_of(DiagnosticKind::FetchOperationFailure).len(), 2);
    assert_eq!(out.diagnostics_of(DiagnosticKind::ModuleDataFailure).len(), 1);
}

#[tokio::test]
async fn cached_remote_skips_second_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"html": "<nav/>"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache: Arc<dyn CacheAdapter> =
        Arc::new(SqliteCache::open(&dir.path().join("modules.db"), None).unwrap());
    let config = remote(json!({
        "url": format!("{}/nav", server.uri()),
        "pointer": "/html",
        "cache": true
    }));

    let mut rounds = Vec::new();
    for _ in 0..2 {
        let out = page()
            .template("[[nav]]")
            .module("nav", config.clone())
            .cache(Some(Arc::clone(&cache)))
            .build()
            .render()
            .await;
        assert_eq!(out.content, "<nav/>");
        rounds.push(out.rounds);
    }
    assert_eq!(rounds, [1, 0]);
}

#[tokio::test]
async fn cached_remotes_on_one_url_keep_their_own_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": ["first", "second"]})))
        .expect(2)
        .mount(&server)
        .await;

    let cache: Arc<dyn CacheAdapter> = Arc::new(MemoryCache::new(None));
    let url = format!("{}/items", server.uri());
    let item = |pointer: &str| remote(json!({"url": url, "pointer": pointer, "cache": true}));

    let mut contents = Vec::new();
    for _ in 0..2 {
        let out = page()
            .template("[[a]]|[[b]]")
            .module("a", item("/items/0"))
            .module("b", item("/items/1"))
            .cache(Some(Arc::clone(&cache)))
            .build()
            .render()
            .await;
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        contents.push(out.content);
    }

    assert_eq!(contents, ["first|second", "first|second"]);
}
