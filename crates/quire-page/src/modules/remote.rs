//! `remote`: content fetched from a URL.
//!
//! ```json
//! {"module": "remote", "params": {
//!     "url": "https://api.example.com/feed",
//!     "query": {"limit": "5"},
//!     "pointer": "/items/0/summary",
//!     "titlePointer": "/title",
//!     "cache": true
//! }}
//! ```
//!
//! The response is decoded by content type unless `parse` is false. When
//! `pointer` is set only that part of the document is rendered. On failure
//! the module renders `fallback` if configured, otherwise nothing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use quire_core::{
    AssetDescriptor, CacheAdapter, FetchRequest, FetchResult, Method, Module, ModuleCache,
    ModuleContext, ModuleData, ModuleError, ModuleInit, value_to_text,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Registry identifier.
pub const IDENTIFIER: &str = "remote";

fn default_parse() -> bool {
    true
}

// Serialized form doubles as the cache key, so every field that shapes the
// rendered output must serialize.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RemoteParams {
    url: String,
    #[serde(default)]
    method: Method,
    #[serde(default)]
    query: BTreeMap<String, String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default = "default_parse")]
    parse: bool,
    #[serde(default)]
    pointer: Option<String>,
    #[serde(default)]
    title_pointer: Option<String>,
    #[serde(default)]
    fallback: Option<String>,
    #[serde(default)]
    escape: bool,
    #[serde(default, skip_serializing)]
    cache: bool,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    assets: Vec<AssetDescriptor>,
}

/// Fetches one URL and renders (part of) the response.
#[derive(Debug)]
pub struct RemoteModule {
    params: RemoteParams,
}

impl RemoteModule {
    /// Factory registered under [`IDENTIFIER`].
    pub fn create(init: ModuleInit) -> Result<Box<dyn Module>, ModuleError> {
        let params: RemoteParams = init.params_as()?;
        let invalid = |reason: &str| ModuleError::InvalidParams {
            module: init.name.clone(),
            reason: reason.to_owned(),
        };
        if params.url.trim().is_empty() {
            return Err(invalid("url must not be empty"));
        }
        for pointer in [&params.pointer, &params.title_pointer].into_iter().flatten() {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(invalid("pointers must be empty or start with '/'"));
            }
        }
        Ok(Box::new(Self { params }))
    }

    fn request(&self) -> FetchRequest {
        let params = &self.params;
        let mut request = FetchRequest::new(params.method, &params.url).parse_response(params.parse);
        for (key, value) in &params.query {
            request = request.query(key, value);
        }
        for (name, value) in &params.headers {
            request = request.header(name, value);
        }
        if let Some(ms) = params.timeout_ms {
            request = request.timeout(Duration::from_millis(ms));
        }
        request
    }

    fn cache_key(&self) -> Option<String> {
        match serde_json::to_string(&self.params) {
            Ok(params) => Some(format!("{IDENTIFIER}:{params}")),
            Err(e) => {
                warn!(url = %self.params.url, error = %e, "remote params not serializable, caching disabled");
                None
            }
        }
    }

    fn fail(&self, reason: String) -> ModuleData {
        match &self.params.fallback {
            Some(text) => ModuleData::text(text.clone()),
            None => ModuleData::Failed(reason),
        }
    }
}

impl Module for RemoteModule {
    fn init_cache(&self, shared: Option<&Arc<dyn CacheAdapter>>) -> Option<ModuleCache> {
        if !self.params.cache {
            return None;
        }
        let adapter = shared?;
        Some(ModuleCache::new(Arc::clone(adapter), self.cache_key()?))
    }

    fn get_data(&mut self, previous: Option<FetchResult>, ctx: &mut ModuleContext<'_>) -> ModuleData {
        let value = match previous {
            None => return ModuleData::fetch(self.request()),
            Some(Ok(value)) => value,
            Some(Err(e)) => return self.fail(e.to_string()),
        };

        if let Some(title) = self
            .params
            .title_pointer
            .as_deref()
            .and_then(|pointer| value.pointer(pointer))
        {
            ctx.set_page_title(value_to_text(title));
        }

        match self.params.pointer.as_deref() {
            None => ModuleData::Final(value),
            Some(pointer) => match value.pointer(pointer) {
                Some(part) => ModuleData::Final(part.clone()),
                None => self.fail(format!("pointer {pointer} not found in response")),
            },
        }
    }

    fn render(&mut self, data: Value, _ctx: &mut ModuleContext<'_>) -> String {
        let text = value_to_text(&data);
        if self.params.escape {
            html_escape::encode_text(&text).into_owned()
        } else {
            text
        }
    }

    fn assets(&self) -> Vec<AssetDescriptor> {
        self.params.assets.clone()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use quire_cache::MemoryCache;
    use quire_core::FetchError;
    use serde_json::json;

    use super::*;

    fn build(params: Value) -> Box<dyn Module> {
        RemoteModule::create(ModuleInit::new("feed", params)).unwrap()
    }

    fn round(module: &mut dyn Module, previous: Option<FetchResult>) -> (ModuleData, BTreeMap<String, String>) {
        let mut keys = BTreeMap::new();
        let mut set = BTreeMap::new();
        let data = {
            let mut ctx = ModuleContext::new("feed", &mut keys, &mut set, false);
            module.get_data(previous, &mut ctx)
        };
        (data, keys)
    }

    #[test]
    fn first_round_requests_url() {
        let mut module = build(json!({
            "url": "https://api.example.com/feed",
            "query": {"limit": "5"},
            "headers": {"Accept": "application/json"},
            "timeoutMs": 250
        }));
        let (data, _) = round(module.as_mut(), None);
        let requests = assert_matches!(data, ModuleData::Pending(requests) => requests);
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.url, "https://api.example.com/feed");
        assert_eq!(request.query, vec![("limit".to_owned(), "5".to_owned())]);
        assert_eq!(request.headers, vec![("Accept".to_owned(), "application/json".to_owned())]);
        assert_eq!(request.timeout, Some(Duration::from_millis(250)));
        assert!(request.parse_response);
    }

    #[test]
    fn pointer_selects_part_of_response() {
        let mut module = build(json!({
            "url": "https://x",
            "pointer": "/items/0",
            "titlePointer": "/title"
        }));
        let response = json!({"title": "Feed", "items": ["first", "second"]});
        let (data, keys) = round(module.as_mut(), Some(Ok(response)));
        assert_eq!(data, ModuleData::text("first"));
        assert_eq!(keys["title"], "Feed");
    }

    #[test]
    fn missing_pointer_fails() {
        let mut module = build(json!({"url": "https://x", "pointer": "/nope"}));
        let (data, _) = round(module.as_mut(), Some(Ok(json!({}))));
        assert_matches!(data, ModuleData::Failed(reason) if reason.contains("/nope"));
    }

    #[test]
    fn failure_uses_fallback() {
        let mut plain = build(json!({"url": "https://x"}));
        let (data, _) = round(plain.as_mut(), Some(Err(FetchError::Status { status: 503 })));
        assert_matches!(data, ModuleData::Failed(reason) if reason == "HTTP status 503");

        let mut with_fallback = build(json!({"url": "https://x", "fallback": "offline"}));
        let (data, _) = round(with_fallback.as_mut(), Some(Err(FetchError::Missing)));
        assert_eq!(data, ModuleData::text("offline"));
    }

    #[test]
    fn render_escapes_on_request() {
        let mut keys = BTreeMap::new();
        let mut set = BTreeMap::new();
        let mut ctx = ModuleContext::new("feed", &mut keys, &mut set, false);

        let mut raw = build(json!({"url": "https://x"}));
        assert_eq!(raw.render(json!("<b>"), &mut ctx), "<b>");

        let mut escaped = build(json!({"url": "https://x", "escape": true}));
        assert_eq!(escaped.render(json!("<b>"), &mut ctx), "&lt;b&gt;");
    }

    #[test]
    fn invalid_params_rejected() {
        assert_matches!(
            RemoteModule::create(ModuleInit::new("feed", Value::Null)).map(|_| ()),
            Err(ModuleError::InvalidParams { .. })
        );
        assert_matches!(
            RemoteModule::create(ModuleInit::new("feed", json!({"url": " "}))).map(|_| ()),
            Err(ModuleError::InvalidParams { reason, .. }) if reason.contains("url")
        );
        assert_matches!(
            RemoteModule::create(ModuleInit::new("feed", json!({"url": "https://x", "pointer": "items"}))).map(|_| ()),
            Err(ModuleError::InvalidParams { .. })
        );
    }

    #[test]
    fn cache_key_covers_output_shaping_params() {
        let shared: Arc<dyn CacheAdapter> = Arc::new(MemoryCache::new(None));
        let key = |params: Value| build(params).init_cache(Some(&shared)).unwrap().key;

        let base = key(json!({"url": "https://x/feed", "query": {"b": "2", "a": "1"}, "cache": true}));
        assert!(base.starts_with("remote:"));
        assert_eq!(
            base,
            key(json!({"url": "https://x/feed", "query": {"a": "1", "b": "2"}, "cache": true}))
        );

        let variants = [
            json!({"url": "https://x/feed", "query": {"b": "2", "a": "1"}, "pointer": "/items/0", "cache": true}),
            json!({"url": "https://x/feed", "query": {"b": "2", "a": "1"}, "titlePointer": "/t", "cache": true}),
            json!({"url": "https://x/feed", "query": {"b": "2", "a": "1"}, "escape": true, "cache": true}),
            json!({"url": "https://x/feed", "query": {"b": "2", "a": "1"}, "parse": false, "cache": true}),
            json!({"url": "https://x/feed", "query": {"b": "2", "a": "1"}, "method": "POST", "cache": true}),
            json!({"url": "https://x/feed", "query": {"b": "2", "a": "1"}, "headers": {"Accept": "text/html"}, "cache": true}),
            json!({"url": "https://x/feed", "query": {"b": "2", "a": "1"}, "fallback": "-", "cache": true}),
        ];
        for params in variants {
            assert_ne!(key(params.clone()), base, "{params}");
        }

        let uncached = build(json!({"url": "https://x/feed"}));
        assert!(uncached.init_cache(Some(&shared)).is_none());
    }

    #[test]
    fn cache_key_separators_are_unambiguous() {
        let shared: Arc<dyn CacheAdapter> = Arc::new(MemoryCache::new(None));
        let key = |params: Value| build(params).init_cache(Some(&shared)).unwrap().key;
        assert_ne!(
            key(json!({"url": "https://x", "query": {"a": "1;b=2"}, "cache": true})),
            key(json!({"url": "https://x", "query": {"a": "1", "b": "2"}, "cache": true}))
        );
    }
}
