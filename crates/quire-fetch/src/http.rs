//! HTTP fetch scheduler backed by `reqwest`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use quire_core::{FetchError, FetchRequest, FetchResult, Method, RequestBody};
use quire_settings::FetchSettings;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::content::{normalize_content_type, parse_body};
use crate::scheduler::{Batch, BatchResults, FetchScheduler};
use crate::target::build_url;

/// Defaults applied to operations that do not set their own.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Total transfer timeout.
    pub timeout: Duration,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&FetchSettings::default())
    }
}

impl From<&FetchSettings> for SchedulerConfig {
    fn from(settings: &FetchSettings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout(),
            timeout: settings.timeout(),
            user_agent: settings.user_agent.clone(),
        }
    }
}

/// Runs every operation of a batch concurrently over HTTP.
///
/// Clients are pooled per connect timeout, since `reqwest` fixes that value
/// at client construction. Status codes of 400 and above are failures.
pub struct HttpScheduler {
    config: SchedulerConfig,
    clients: Mutex<HashMap<Duration, reqwest::Client>>,
}

impl HttpScheduler {
    /// Create a scheduler with the given defaults.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client(&self, connect_timeout: Duration) -> Result<reqwest::Client, FetchError> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&connect_timeout) {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(self.config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;
        let _ = clients.insert(connect_timeout, client.clone());
        Ok(client)
    }

    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    async fn execute_one(&self, key: usize, request: FetchRequest) -> FetchResult {
        let connect_timeout = request.connect_timeout.unwrap_or(self.config.connect_timeout);
        let timeout = request.timeout.unwrap_or(self.config.timeout);
        let client = self.client(connect_timeout)?;
        let url = build_url(&request)?;

        let mut builder = client
            .request(to_reqwest_method(request.method), url)
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(RequestBody::Form(pairs)) => {
                let encoded = serde_urlencoded::to_string(&pairs)
                    .map_err(|e| FetchError::InvalidRequest(format!("form body: {e}")))?;
                builder
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        "application/x-www-form-urlencoded",
                    )
                    .body(encoded)
            }
            Some(RequestBody::Text(text)) => builder.body(text),
            Some(RequestBody::Json(json)) => builder.json(&json),
            None => builder,
        };

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(&e, timeout))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(normalize_content_type);

        debug!(
            key,
            status,
            content_type = content_type.as_ref().map(|c| c.as_str()).unwrap_or_default(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "fetch completed"
        );

        if status >= 400 {
            return Err(FetchError::Status { status });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_error(&e, timeout))?;

        match content_type {
            Some(content_type) if request.parse_response => parse_body(&content_type, &body),
            _ => Ok(Value::String(body)),
        }
    }
}

impl Default for HttpScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

#[async_trait]
impl FetchScheduler for HttpScheduler {
    async fn execute_batch(&self, batch: Batch) -> BatchResults {
        let operations = batch.len();
        debug!(operations, "executing fetch batch");

        let pending = batch.into_iter().map(|(key, request)| async move {
            let result = self.execute_one(key, request).await;
            if let Err(ref err) = result {
                debug!(key, error_kind = err.error_kind(), error = %err, "fetch failed");
            }
            (key, result)
        });

        join_all(pending).await.into_iter().collect()
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

fn classify_error(err: &reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else if err.is_connect() {
        FetchError::Connect(err.to_string())
    } else if err.is_builder() {
        FetchError::InvalidRequest(err.to_string())
    } else {
        FetchError::Transport(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scheduler() -> HttpScheduler {
        HttpScheduler::new(SchedulerConfig {
            connect_timeout: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
            user_agent: "quire-test".into(),
        })
    }

    fn batch(requests: Vec<FetchRequest>) -> Batch {
        requests.into_iter().enumerate().collect()
    }

    #[tokio::test]
    async fn parses_json_when_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2]})))
            .mount(&server)
            .await;

        let url = format!("{}/data", server.uri());
        let results = scheduler()
            .execute_batch(batch(vec![
                FetchRequest::get(&url).parse_response(true),
                FetchRequest::get(&url),
            ]))
            .await;

        assert_eq!(results[&0], Ok(json!({"items": [1, 2]})));
        let raw = results[&1].as_ref().unwrap();
        assert!(raw.is_string());
        assert!(raw.as_str().unwrap().contains("\"items\""));
    }

    #[tokio::test]
    async fn partial_failure_isolated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/one"))
            .respond_with(ResponseTemplate::new(200).set_body_string("first"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/two"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/three"))
            .respond_with(ResponseTemplate::new(200).set_body_string("third"))
            .mount(&server)
            .await;

        let results = scheduler()
            .execute_batch(batch(vec![
                FetchRequest::get(format!("{}/one", server.uri())),
                FetchRequest::get(format!("{}/two", server.uri())),
                FetchRequest::get(format!("{}/three", server.uri())),
            ]))
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[&0], Ok(Value::String("first".into())));
        assert_eq!(results[&1], Err(FetchError::Status { status: 500 }));
        assert_eq!(results[&2], Ok(Value::String("third".into())));
    }

    #[tokio::test]
    async fn result_keys_match_input_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let mut input = Batch::new();
        let _ = input.insert(7, FetchRequest::get(server.uri()));
        let _ = input.insert(42, FetchRequest::get("not a url"));
        let results = scheduler().execute_batch(input).await;

        assert_eq!(results.keys().copied().collect::<Vec<_>>(), vec![7, 42]);
        assert_matches!(results[&42], Err(FetchError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn empty_batch_returns_empty() {
        let results = scheduler().execute_batch(Batch::new()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn connection_refused_is_failure() {
        let results = scheduler()
            .execute_batch(batch(vec![FetchRequest::get("http://127.0.0.1:1/")]))
            .await;
        assert_matches!(
            results[&0],
            Err(FetchError::Connect(_) | FetchError::Transport(_))
        );
    }

    #[tokio::test]
    async fn per_operation_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let results = scheduler()
            .execute_batch(batch(vec![
                FetchRequest::get(server.uri()).timeout(Duration::from_millis(50)),
            ]))
            .await;
        assert_eq!(results[&0], Err(FetchError::Timeout(Duration::from_millis(50))));
    }

    #[tokio::test]
    async fn sends_query_headers_and_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(query_param("lang", "en"))
            .and(header("x-token", "abc"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("name=quire&tag=a+b"))
            .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
            .mount(&server)
            .await;

        let request = FetchRequest::post(format!("{}/submit", server.uri()))
            .query("lang", "en")
            .header("X-Token", "abc")
            .form([("name", "quire"), ("tag", "a b")]);
        let results = scheduler().execute_batch(batch(vec![request])).await;
        assert_eq!(results[&0], Ok(Value::String("accepted".into())));
    }

    #[tokio::test]
    async fn parses_xml_and_form_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<feed><entry>a</entry><entry>b</entry></feed>",
                "application/atom+xml",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/form"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("x=1&y=2", "application/x-www-form-urlencoded"),
            )
            .mount(&server)
            .await;

        let results = scheduler()
            .execute_batch(batch(vec![
                FetchRequest::get(format!("{}/feed", server.uri())).parse_response(true),
                FetchRequest::get(format!("{}/form", server.uri())).parse_response(true),
            ]))
            .await;
        assert_eq!(results[&0], Ok(json!({"entry": ["a", "b"]})));
        assert_eq!(results[&1], Ok(json!({"x": "1", "y": "2"})));
    }

    #[tokio::test]
    async fn malformed_json_is_decode_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{broken", "application/json"))
            .mount(&server)
            .await;

        let results = scheduler()
            .execute_batch(batch(vec![FetchRequest::get(server.uri()).parse_response(true)]))
            .await;
        assert_matches!(results[&0], Err(FetchError::Decode { .. }));
    }

    #[test]
    fn clients_pooled_per_connect_timeout() {
        let scheduler = scheduler();
        let _ = scheduler.client(Duration::from_secs(1)).unwrap();
        let _ = scheduler.client(Duration::from_secs(1)).unwrap();
        let _ = scheduler.client(Duration::from_secs(2)).unwrap();
        assert_eq!(scheduler.clients.lock().len(), 2);
    }

    #[test]
    fn config_from_settings() {
        let settings = FetchSettings {
            connect_timeout_ms: 250,
            timeout_ms: 3_000,
            user_agent: "ua".into(),
            max_rounds: 4,
        };
        let config = SchedulerConfig::from(&settings);
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.user_agent, "ua");
    }
}
