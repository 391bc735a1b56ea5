//! Request URL assembly.

use quire_core::{FetchError, FetchRequest};
use url::Url;
use url::form_urlencoded::byte_serialize;

/// Resolve the final URL of a request.
///
/// Matrix parameters are appended to the path as `;key=value`; query
/// parameters are appended after any query already present in the URL.
pub fn build_url(request: &FetchRequest) -> Result<Url, FetchError> {
    let mut url = Url::parse(&request.url)
        .map_err(|e| FetchError::InvalidRequest(format!("{}: {e}", request.url)))?;

    if !request.matrix.is_empty() {
        let mut path = url.path().to_owned();
        for (key, value) in &request.matrix {
            path.push(';');
            path.extend(byte_serialize(key.as_bytes()));
            path.push('=');
            path.extend(byte_serialize(value.as_bytes()));
        }
        url.set_path(&path);
    }

    if !request.query.is_empty() {
        let _ = url
            .query_pairs_mut()
            .extend_pairs(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    Ok(url)
}
