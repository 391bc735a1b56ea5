//! Content-type normalization and response decoding.

use quire_core::FetchError;
use serde_json::{Map, Value};

/// Normalized response content type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentType {
    /// `application/json`, `text/json`, `text/x-json`
    Json,
    /// `application/xml`, `text/xml`, `application/xhtml+xml`
    Xml,
    /// `application/rss+xml`
    Rss,
    /// `application/atom+xml`
    Atom,
    /// `application/x-www-form-urlencoded`
    Form,
    /// Anything else, lowercased without parameters.
    Other(String),
}

impl ContentType {
    /// Short name used in logs and decode errors.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Rss => "rss",
            Self::Atom => "atom",
            Self::Form => "form",
            Self::Other(raw) => raw,
        }
    }
}

/// Map a `Content-Type` header value to a [`ContentType`].
///
/// Parameters after `;` (charset, boundary) are ignored.
pub fn normalize_content_type(raw: &str) -> ContentType {
    let essence = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "application/json" | "text/json" | "text/x-json" => ContentType::Json,
        "application/xml" | "text/xml" | "application/xhtml+xml" => ContentType::Xml,
        "application/rss+xml" => ContentType::Rss,
        "application/atom+xml" => ContentType::Atom,
        "application/x-www-form-urlencoded" => ContentType::Form,
        _ => ContentType::Other(essence),
    }
}

/// Decode a response body according to its content type.
///
/// Unknown types pass through as [`Value::String`]. An empty JSON body
/// decodes to `null`.
pub fn parse_body(content_type: &ContentType, body: &str) -> Result<Value, FetchError> {
    let decode_error = |reason: String| FetchError::Decode {
        format: content_type.as_str().to_owned(),
        reason,
    };

    match content_type {
        ContentType::Json => {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(body).map_err(|e| decode_error(e.to_string()))
        }
        ContentType::Xml | ContentType::Rss | ContentType::Atom => {
            crate::xml::parse(body).map_err(decode_error)
        }
        ContentType::Form => {
            let pairs: Vec<(String, String)> =
                serde_urlencoded::from_str(body).map_err(|e| decode_error(e.to_string()))?;
            let mut object = Map::new();
            for (key, value) in pairs {
                let _ = object.insert(key, Value::String(value));
            }
            Ok(Value::Object(object))
        }
        ContentType::Other(_) => Ok(Value::String(body.to_owned())),
    }
}
