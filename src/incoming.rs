use axum_extra::extract::cookie::CookieJar;
use http::header::HeaderMap;
use http::request::Parts;
use http::Uri;

/// What the middleware needs to know about an inbound request.
///
/// Hosts adapt their own request type into this; [`IncomingRequest::from_parts`]
/// covers anything built on the `http` crate.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
}

impl IncomingRequest {
    pub fn new(path: &str, query: Option<&str>, headers: HeaderMap) -> Self {
        let query = query
            .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
            .unwrap_or_default();
        IncomingRequest {
            path: normalize_path(path),
            query,
            headers,
        }
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(parts.uri.path(), parts.uri.query(), parts.headers.clone())
    }

    pub fn from_uri(uri: &Uri) -> Self {
        Self::new(uri.path(), uri.query(), HeaderMap::new())
    }

    /// Path with runs of `/` collapsed.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// First value of query parameter `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of cookie `name`, looked up across every `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<String> {
        CookieJar::from_headers(&self.headers)
            .get(name)
            .map(|cookie| cookie.value().to_owned())
    }
}

pub(crate) fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    if !path.starts_with('/') {
        normalized.push('/');
    }
    for c in path.chars() {
        if c == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(c);
    }
    normalized
}
