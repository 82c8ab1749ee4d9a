//! Outbound HTTP for listing pages
//!
//! The engine talks to the network through the [`Fetcher`] trait so the
//! transport can be swapped in tests. [`HttpFetcher`] is the reqwest
//! implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy};
use tracing::debug;
use url::Url;

use crate::error::{Result, ScrapeError, TransportError};
use crate::models::ProxyIdentity;

/// Header set sent with every listing request
pub const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.5"),
    ("connection", "keep-alive"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    ("upgrade-insecure-requests", "1"),
];

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Raw response from a listing endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues a GET, optionally through a proxy
///
/// Non-2xx responses are returned as responses, not errors; only network
/// level failures produce a [`TransportError`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(
        &self,
        url: &Url,
        proxy: Option<&ProxyIdentity>,
    ) -> std::result::Result<FetchResponse, TransportError>;
}

/// reqwest-backed fetcher with one client per proxy identity
pub struct HttpFetcher {
    connect_timeout: Duration,
    direct: Client,
    proxied: DashMap<String, Client>,
}

impl HttpFetcher {
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        Ok(Self {
            connect_timeout,
            direct: build_client(connect_timeout, None)?,
            proxied: DashMap::new(),
        })
    }

    fn client_for(
        &self,
        proxy: Option<&ProxyIdentity>,
    ) -> std::result::Result<Client, TransportError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        if let Some(client) = self.proxied.get(&proxy.id) {
            return Ok(client.clone());
        }

        let client = build_client(self.connect_timeout, Some(proxy))
            .map_err(|e| TransportError::Request(e.to_string()))?;
        self.proxied.insert(proxy.id.clone(), client.clone());
        Ok(client)
    }

    /// Forget the cached client for a proxy that left the pool
    pub fn evict(&self, proxy_id: &str) {
        self.proxied.remove(proxy_id);
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(
        &self,
        url: &Url,
        proxy: Option<&ProxyIdentity>,
    ) -> std::result::Result<FetchResponse, TransportError> {
        let client = self.client_for(proxy)?;
        debug!(
            "GET {} via {}",
            url,
            proxy.map(|p| p.id.as_str()).unwrap_or("direct")
        );

        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(FetchResponse { status, body })
    }
}

fn build_client(connect_timeout: Duration, proxy: Option<&ProxyIdentity>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in BROWSER_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .connect_timeout(connect_timeout)
        .gzip(true)
        .brotli(true);

    builder = match proxy {
        Some(identity) => {
            let mut upstream = Proxy::all(identity.url()).map_err(|e| {
                ScrapeError::InvalidConfig(format!("invalid proxy {}: {}", identity.id, e))
            })?;
            if let Some(credential) = &identity.credential {
                upstream = upstream.basic_auth(&credential.username, &credential.password);
            }
            builder.proxy(upstream)
        }
        None => builder.no_proxy(),
    };

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_fetch_response_success_range() {
        let ok = FetchResponse {
            status: 204,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!FetchResponse {
            status: 503,
            body: String::new()
        }
        .is_success());
    }

    #[tokio::test]
    async fn test_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sch/i.html"))
            .and(query_param("_nkw", "black lotus"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let mut url = Url::parse(&server.uri()).unwrap().join("/sch/i.html").unwrap();
        url.query_pairs_mut().append_pair("_nkw", "black lotus");

        let response = fetcher.get(&url, None).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<html></html>");

        // Compare whole values; some carry commas. Connection is hop-by-hop.
        let requests = server.received_requests().await.unwrap();
        let headers = &requests[0].headers;
        for (name, value) in BROWSER_HEADERS.iter().filter(|(name, _)| *name != "connection") {
            assert_eq!(headers.get(*name).unwrap().to_str().unwrap(), *value, "{}", name);
        }
        assert_eq!(headers.get("user-agent").unwrap().to_str().unwrap(), USER_AGENT);
    }

    #[tokio::test]
    async fn test_non_success_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&server.uri()).unwrap();

        let response = fetcher.get(&url, None).await.unwrap();
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_routes_through_proxy_with_credentials() {
        // The mock server plays the proxy; plain HTTP requests are forwarded to it
        let proxy_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("proxy-authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200).set_body_string("proxied"))
            .expect(1)
            .mount(&proxy_server)
            .await;

        let address = proxy_server.address();
        let identity = ProxyIdentity::new(address.ip().to_string(), address.port())
            .with_credential("user", "pass");

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse("http://listings.invalid/search").unwrap();

        let response = fetcher.get(&url, Some(&identity)).await.unwrap();
        assert_eq!(response.body, "proxied");
        assert_eq!(fetcher.proxied.len(), 1);

        fetcher.evict(&identity.id);
        assert!(fetcher.proxied.is_empty());
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let fetcher = HttpFetcher::new(Duration::from_millis(500)).unwrap();
        let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();

        let result = fetcher.get(&url, None).await;
        assert!(matches!(result, Err(TransportError::Request(_))));
    }
}
