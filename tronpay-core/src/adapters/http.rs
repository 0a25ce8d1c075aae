//! reqwest-backed HTTP transport
//!
//! Talks JSON to the backend REST API. The client keeps a cookie jar so
//! the refresh session cookie issued at login is replayed on `/auth/reissue`
//! without ever being exposed to callers. With a [`FileCookieJar`] the
//! session outlives the process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use url::Url;

use super::cookie_jar::FileCookieJar;
use crate::domain::result::{Error, Result};
use crate::ports::{ApiRequest, ApiResponse, HttpTransport, Method};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport for the backend REST API
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with the default timeout
    pub fn new(base_url: &str) -> Result<Self> {
        Self::new_with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Transport with an in-memory cookie jar
    pub fn new_with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        Self::build(base_url, timeout, None)
    }

    /// Transport whose cookies are read from and saved to `jar`
    pub fn new_with_cookie_jar(
        base_url: &str,
        timeout: Duration,
        jar: Arc<FileCookieJar>,
    ) -> Result<Self> {
        Self::build(base_url, timeout, Some(jar))
    }

    fn build(base_url: &str, timeout: Duration, jar: Option<Arc<FileCookieJar>>) -> Result<Self> {
        let base_url = base_url.trim();
        if base_url.is_empty() {
            return Err(Error::Config("API base URL cannot be empty".to_string()));
        }
        Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", base_url, e)))?;

        let builder = Client::builder().timeout(timeout);
        let builder = match jar {
            Some(jar) => builder.cookie_provider(jar),
            None => builder.cookie_store(true),
        };
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Map request errors to user-friendly messages
    fn map_request_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::network(format!(
                "Connection timed out after {} seconds",
                self.timeout.as_secs()
            ))
        } else if error.is_connect() {
            Error::network(format!("Unable to connect to {}", self.base_url))
        } else {
            Error::network(format!("Request failed: {}", error))
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request.path);

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &url);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;

        // Non-JSON bodies (proxies, HTML error pages) are kept as text
        let body = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
