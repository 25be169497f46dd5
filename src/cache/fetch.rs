//! Network side of the cache controller.
//!
//! A [`Fetcher`] either produces a response (any status) or a
//! `CacheError::NetworkFailure`. Deciding whether a non-2xx response is
//! acceptable is left to the caller.

use async_trait::async_trait;

use super::types::{Request, Response};
use crate::error::{CacheError, CacheResult};

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> CacheResult<Response>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Client without a request timeout: a hung fetch hangs its task.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Wraps a preconfigured client, e.g. one built with a timeout.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> CacheResult<Response> {
        let network_failure = |e: reqwest::Error| CacheError::NetworkFailure {
            url: request.url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await
            .map_err(network_failure)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(network_failure)?;

        Ok(Response { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_fetcher_returns_status_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/optimal.js"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/javascript")
                    .set_body_string("window.AQUARIUM_OPTIMAL = {};"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let req = Request::parse_get(&format!("{}/data/optimal.js", server.uri())).unwrap();
        let resp = fetcher.fetch(&req).await.unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("content-type"), Some("application/javascript"));
        assert_eq!(resp.body, bytes::Bytes::from("window.AQUARIUM_OPTIMAL = {};"));
    }

    #[tokio::test]
    async fn test_http_fetcher_passes_error_statuses_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let req = Request::parse_get(&format!("{}/missing.html", server.uri())).unwrap();
        let resp = HttpFetcher::new().fetch(&req).await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_ok());
    }

    #[tokio::test]
    async fn test_http_fetcher_connection_refused_is_network_failure() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let req = Request::parse_get("http://127.0.0.1:9/index.html").unwrap();
        let err = HttpFetcher::new().fetch(&req).await.unwrap_err();
        assert!(matches!(err, CacheError::NetworkFailure { .. }), "got {:?}", err);
    }
}
