//! Outbound operation handles and their outcomes.
//!
//! A [`FetchRequest`] is an inert description of one network call. Modules
//! return them from [`Module::get_data`](crate::Module::get_data); the page
//! composer gathers every pending request of a round into one batch and hands
//! it to a fetch scheduler, which answers with one [`FetchResult`] per request.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP method of a [`FetchRequest`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    #[default]
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
}

/// Request body of a [`FetchRequest`].
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// Raw text sent as-is.
    Text(String),
    /// JSON document.
    Json(Value),
}

/// Opaque network-call descriptor consumed by a fetch scheduler.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL, possibly carrying its own query string.
    pub url: String,
    /// Query parameters appended after any query already in `url`.
    pub query: Vec<(String, String)>,
    /// Matrix parameters appended to the path as `;key=value`.
    pub matrix: Vec<(String, String)>,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Optional body.
    pub body: Option<RequestBody>,
    /// Connect timeout; the scheduler default applies when `None`.
    pub connect_timeout: Option<Duration>,
    /// Total transfer timeout; the scheduler default applies when `None`.
    pub timeout: Option<Duration>,
    /// Decode the body by content type. When false the raw text is returned.
    pub parse_response: bool,
}

impl FetchRequest {
    /// Request with the given method and URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            matrix: Vec::new(),
            headers: Vec::new(),
            body: None,
            connect_timeout: None,
            timeout: None,
            parse_response: false,
        }
    }

    /// `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// `POST` request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a matrix parameter.
    #[must_use]
    pub fn matrix(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.matrix.push((key.into(), value.into()));
        self
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Ask the server to keep the connection open for `millis`.
    #[must_use]
    pub fn keep_alive(self, millis: u64) -> Self {
        self.header("Connection", "keep-alive")
            .header("Keep-Alive", millis.to_string())
    }

    /// Send form-encoded pairs as the body.
    #[must_use]
    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = Some(RequestBody::Form(
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ));
        self
    }

    /// Send raw text as the body.
    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    /// Send a JSON document as the body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Override the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Override the total transfer timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Decode the response by its declared content type.
    #[must_use]
    pub fn parse_response(mut self, parse: bool) -> Self {
        self.parse_response = parse;
        self
    }
}

/// Failure marker for one operation of a batch.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request could not be built (bad URL, unencodable body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The operation exceeded its timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with an error status.
    #[error("HTTP status {status}")]
    Status {
        /// Response status code.
        status: u16,
    },

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The body did not decode as its declared content type.
    #[error("failed to decode {format} response: {reason}")]
    Decode {
        /// Normalized content type that was attempted.
        format: String,
        /// Decoder message.
        reason: String,
    },

    /// The scheduler returned no result for the operation.
    #[error("no result for operation")]
    Missing,
}

impl FetchError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Connect(_) => "connect",
            Self::Timeout(_) => "timeout",
            Self::Status { .. } => "status",
            Self::Transport(_) => "transport",
            Self::Decode { .. } => "decode",
            Self::Missing => "missing",
        }
    }
}

/// Parsed (or raw) response content, or the failure marker for that operation.
///
/// Raw bodies arrive as [`Value::String`]; JSON, XML, and form bodies arrive
/// decoded when the request asked for parsing.
pub type FetchResult = Result<Value, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_parts() {
        let req = FetchRequest::get("https://api.example.com/items")
            .query("page", "2")
            .matrix("lang", "en")
            .keep_alive(300)
            .parse_response(true)
            .timeout(Duration::from_secs(3));

        assert_eq!(req.method, Method::Get);
        assert_eq!(req.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(req.matrix, vec![("lang".to_string(), "en".to_string())]);
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.headers[1], ("Keep-Alive".to_string(), "300".to_string()));
        assert!(req.parse_response);
        assert_eq!(req.timeout, Some(Duration::from_secs(3)));
        assert_eq!(req.connect_timeout, None);
    }

    #[test]
    fn form_body_collects_pairs() {
        let req = FetchRequest::post("https://example.com/submit").form([("a", "1"), ("b", "2")]);
        assert_eq!(
            req.body,
            Some(RequestBody::Form(vec![
                ("a".into(), "1".into()),
                ("b".into(), "2".into())
            ]))
        );
    }

    #[test]
    fn method_serde_uppercase() {
        assert_eq!(serde_json::to_string(&Method::Delete).unwrap(), r#""DELETE""#);
        let m: Method = serde_json::from_str(r#""HEAD""#).unwrap();
        assert_eq!(m, Method::Head);
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(FetchError::Status { status: 503 }.error_kind(), "status");
        assert_eq!(FetchError::Missing.error_kind(), "missing");
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(1)).to_string(),
            "timed out after 1s"
        );
    }
}
