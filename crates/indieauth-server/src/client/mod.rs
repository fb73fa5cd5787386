//! Outbound HTTP for discovery and ticket delivery.
//!
//! Provides async HTTP client with:
//! - Connection pooling via reqwest
//! - Retry middleware with exponential backoff
//! - A hard per-request deadline, reported as [`ClientError::Timeout`]
//!
//! Engines talk to the network only through [`Transport`], so tests can
//! serve profile pages without opening sockets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::{Config, defaults};
use crate::error::{ClientError, ClientResult};

const ACCEPT_DOCUMENT: &str = "text/html, application/xhtml+xml, application/json;q=0.9, */*;q=0.8";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A fetched response: final URL after redirects, status, `Link` headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: Url,
    pub status: u16,
    /// Every `Link` header value, in order received.
    pub links: Vec<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl Document {
    /// A 200 response from `url` with the given content type and body.
    #[must_use]
    pub fn new(url: Url, content_type: &str, body: impl Into<String>) -> Self {
        Self {
            url,
            status: 200,
            links: Vec::new(),
            content_type: Some(content_type.to_owned()),
            body: body.into(),
        }
    }

    /// Add a `Link` header value.
    #[must_use]
    pub fn with_link(mut self, value: impl Into<String>) -> Self {
        self.links.push(value.into());
        self
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_str(&self.body).map_err(ClientError::from)
    }

    /// Whether the body is declared as (X)HTML.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("text/html") || ct.contains("application/xhtml+xml"))
    }
}

/// Outbound HTTP used by the discovery resolver and ticket engine.
///
/// Implementations return `Ok` only for 2xx responses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url`.
    async fn get(&self, url: &Url) -> ClientResult<Document>;

    /// POST `form` to `url` as `application/x-www-form-urlencoded`.
    async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> ClientResult<Document>;
}

/// reqwest-backed [`Transport`].
#[derive(Clone)]
pub struct HttpClient {
    client: ClientWithMiddleware,
    timeout: Duration,
}

impl HttpClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_DOCUMENT));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(defaults::USER_AGENT)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(defaults::MAX_KEEPALIVE)
            .pool_idle_timeout(defaults::KEEPALIVE_EXPIRY)
            .gzip(true)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(200), Duration::from_secs(2))
            .build_with_max_retries(config.max_retries);

        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client, timeout: config.request_timeout })
    }

    /// Read a response into a [`Document`], rejecting non-success statuses.
    async fn document(&self, response: reqwest::Response) -> ClientResult<Document> {
        let status = response.status();
        let url = response.url().clone();

        if !status.is_success() {
            return Err(ClientError::unexpected_status(status.as_u16(), url.as_str()));
        }

        let links = response
            .headers()
            .get_all(header::LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.map_err(|e| self.reqwest_error(e))?;

        Ok(Document { url, status: status.as_u16(), links, content_type, body })
    }

    fn reqwest_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() { ClientError::Timeout(self.timeout) } else { ClientError::Http(err) }
    }

    fn middleware_error(&self, err: reqwest_middleware::Error) -> ClientError {
        match err {
            reqwest_middleware::Error::Reqwest(e) => self.reqwest_error(e),
            // Retries exhausted: the timeout is buried in the retry error.
            reqwest_middleware::Error::Middleware(ref e) if e.chain().any(is_timeout_cause) => {
                ClientError::Timeout(self.timeout)
            }
            other => ClientError::Middleware(other),
        }
    }
}

fn is_timeout_cause(cause: &(dyn std::error::Error + 'static)) -> bool {
    if let Some(e) = cause.downcast_ref::<reqwest::Error>() {
        return e.is_timeout();
    }
    matches!(
        cause.downcast_ref::<reqwest_middleware::Error>(),
        Some(reqwest_middleware::Error::Reqwest(e)) if e.is_timeout()
    )
}

#[async_trait]
impl Transport for HttpClient {
    async fn get(&self, url: &Url) -> ClientResult<Document> {
        tracing::debug!(url = %url, "GET");
        let response =
            self.client.get(url.as_str()).send().await.map_err(|e| self.middleware_error(e))?;
        self.document(response).await
    }

    async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> ClientResult<Document> {
        tracing::debug!(url = %url, "POST");
        let body = serde_urlencoded::to_string(form)?;

        let response = self
            .client
            .post(url.as_str())
            .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.middleware_error(e))?;
        self.document(response).await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").field("timeout", &self.timeout).finish()
    }
}

// ─── In-memory transport ───────────────────────────────────────────────────

/// A [`Transport`] answering from a fixed table of documents.
///
/// Used for offline operation and tests. Unknown URLs answer 404; every POST
/// is recorded.
#[derive(Debug, Clone, Default)]
pub struct StaticTransport {
    inner: Arc<Mutex<StaticInner>>,
}

#[derive(Debug, Default)]
struct StaticInner {
    documents: HashMap<String, Document>,
    failures: HashMap<String, Option<u16>>,
    posts: Vec<(Url, Vec<(String, String)>)>,
}

impl StaticTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StaticInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer GET and POST requests for `document.url` with `document`.
    pub fn serve(&self, document: Document) {
        self.lock().documents.insert(document.url.to_string(), document);
    }

    /// Answer requests for `url` with `status`.
    pub fn fail(&self, url: &Url, status: u16) {
        self.lock().failures.insert(url.to_string(), Some(status));
    }

    /// Answer requests for `url` with a timeout.
    pub fn time_out(&self, url: &Url) {
        self.lock().failures.insert(url.to_string(), None);
    }

    /// Every form posted so far, in order.
    #[must_use]
    pub fn posts(&self) -> Vec<(Url, Vec<(String, String)>)> {
        self.lock().posts.clone()
    }

    fn answer(&self, url: &Url) -> ClientResult<Document> {
        let inner = self.lock();
        match inner.failures.get(url.as_str()) {
            Some(Some(status)) => return Err(ClientError::unexpected_status(*status, url.as_str())),
            Some(None) => return Err(ClientError::Timeout(Duration::ZERO)),
            None => {}
        }
        inner
            .documents
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| ClientError::unexpected_status(404, url.as_str()))
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn get(&self, url: &Url) -> ClientResult<Document> {
        self.answer(url)
    }

    async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> ClientResult<Document> {
        let fields = form.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        self.lock().posts.push((url.clone(), fields));
        self.answer(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(content_type: Option<&str>) -> Document {
        Document {
            url: Url::parse("https://example.com/").unwrap(),
            status: 200,
            links: vec![],
            content_type: content_type.map(str::to_owned),
            body: r#"{"a": 1}"#.to_owned(),
        }
    }

    #[test]
    fn test_is_html() {
        assert!(document(Some("text/html; charset=utf-8")).is_html());
        assert!(document(Some("application/xhtml+xml")).is_html());
        assert!(!document(Some("application/json")).is_html());
        assert!(!document(None).is_html());
    }

    #[tokio::test]
    async fn test_static_transport() {
        let transport = StaticTransport::new();
        let url = Url::parse("https://example.com/").unwrap();
        transport.serve(Document::new(url.clone(), "text/html", "hi").with_link("<a>; rel=b"));

        let doc = transport.get(&url).await.unwrap();
        assert_eq!(doc.body, "hi");
        assert_eq!(doc.links, vec!["<a>; rel=b"]);

        let missing = Url::parse("https://example.com/missing").unwrap();
        assert!(matches!(
            transport.get(&missing).await,
            Err(ClientError::UnexpectedStatus { status: 404, .. })
        ));

        transport.time_out(&url);
        assert!(transport.post_form(&url, &[("a", "1")]).await.unwrap_err().is_timeout());
        assert_eq!(transport.posts()[0].1, vec![("a".to_owned(), "1".to_owned())]);
    }

    #[test]
    fn test_json_body() {
        let value: serde_json::Value = document(None).json().unwrap();
        assert_eq!(value["a"], 1);
        assert!(matches!(
            Document { body: "<html>".into(), ..document(None) }.json::<serde_json::Value>(),
            Err(ClientError::Parse(_))
        ));
    }
}
