//! Request/response values passed between the controller, its storage and
//! the network.

use bytes::Bytes;
use reqwest::Method;
use url::Url;

/// An intercepted request. Only the parts routing and cache keys need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parses an absolute URL into a `GET` request.
    pub fn parse_get(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::get(Url::parse(url)?))
    }

    /// True when scheme, host and port all match `other`.
    pub fn is_same_origin(&self, other: &Url) -> bool {
        self.url.origin() == other.origin()
    }

    /// Only plain web requests are eligible for write-back.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// Storage key for this request, or `None` if it cannot be cached.
    ///
    /// Only `GET` requests are cacheable. The fragment never reaches the
    /// network, so it is not part of the key.
    pub fn cache_key(&self) -> Option<String> {
        if self.method != Method::GET {
            return None;
        }
        let mut url = self.url.clone();
        url.set_fragment(None);
        Some(url.into())
    }
}

/// A response, live or cached. Cloning shares the body buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

}

#[cfg(test)]
impl Response {
    pub(crate) fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
