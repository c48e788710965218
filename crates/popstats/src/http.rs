//! HTTP transport boundary.
//!
//! Every upstream call (listing APIs, markup pages, download ranges) goes
//! through [`HttpTransport`], so clients can be exercised against in-memory
//! responses in tests.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use thiserror::Error;

/// User agent sent with every upstream request.
pub const USER_AGENT: &str = concat!("popstats/", env!("CARGO_PKG_VERSION"));

/// Minimal HTTP method enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// HTTP headers represented as key/value pairs.
///
/// Header names are treated case-insensitively by helper functions.
pub type HttpHeaders = Vec<(String, String)>;

/// A minimal HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Build a GET request with the default user agent.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: vec![("User-Agent".to_string(), USER_AGENT.to_string())],
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

/// A minimal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

/// Transport boundary for all HTTP I/O.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// A real HTTP transport backed by reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn with_timeout(timeout: StdDuration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (k, v) in request.headers {
            builder = builder.header(&k, &v);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let headers: HttpHeaders = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let body = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// ---------- Test-only mock transport ----------

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// In-memory mock transport.
///
/// Responses are replayed per method + URL in FIFO order. A response
/// registered with [`MockTransport::set_fallback`] is returned whenever the
/// queue for that URL is empty.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<(HttpMethod, String), VecDeque<Result<HttpResponse, String>>>,
    fallbacks: HashMap<(HttpMethod, String), HttpResponse>,
    requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockTransportInner> {
        self.inner
            .lock()
            .expect("mock transport lock should not be poisoned")
    }

    /// Queue a response for a method + URL.
    pub fn push_response(&self, method: HttpMethod, url: impl Into<String>, response: HttpResponse) {
        self.lock()
            .routes
            .entry((method, url.into()))
            .or_default()
            .push_back(Ok(response));
    }

    /// Queue a JSON body with the given status for a GET request.
    pub fn push_json(&self, url: impl Into<String>, status: u16, body: serde_json::Value) {
        self.push_response(
            HttpMethod::Get,
            url,
            HttpResponse {
                status,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: body.to_string().into_bytes(),
            },
        );
    }

    /// Queue a transport failure for a GET request.
    pub fn push_transport_error(&self, url: impl Into<String>, message: &str) {
        self.lock()
            .routes
            .entry((HttpMethod::Get, url.into()))
            .or_default()
            .push_back(Err(message.to_string()));
    }

    /// Response returned once the queue for a GET URL is exhausted.
    pub fn set_fallback(&self, url: impl Into<String>, response: HttpResponse) {
        self.lock()
            .fallbacks
            .insert((HttpMethod::Get, url.into()), response);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    /// Number of recorded requests whose URL equals `url`.
    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.lock().requests.iter().filter(|r| r.url == url).count()
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self.lock();

        let key = (request.method, request.url.clone());
        inner.requests.push(request);

        if let Some(queued) = inner.routes.get_mut(&key).and_then(|q| q.pop_front()) {
            return queued.map_err(HttpError::Transport);
        }

        match inner.fallbacks.get(&key) {
            Some(resp) => Ok(resp.clone()),
            None => Err(HttpError::NoMockResponse {
                method: key.0.as_str().to_string(),
                url: key.1,
            }),
        }
    }
}
