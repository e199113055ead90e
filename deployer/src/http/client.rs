//! HTTP client for the Forge API

use std::time::Duration;

use reqwest::{header, Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::errors::ApiError;
use crate::utils::{calc_exp_backoff, truncate, CooldownOptions};

/// Default Forge API endpoint
pub const DEFAULT_BASE_URL: &str = "https://forge.laravel.com/api/v1";

/// Listing calls stop following `links.next` after this many pages
const MAX_PAGES: usize = 100;

/// HTTP client options
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Extra attempts for retryable failures
    pub max_retries: u32,

    /// Delay between retries
    pub backoff: CooldownOptions,

    /// Minimum spacing between two requests, shared by all sites
    pub min_request_interval: Duration,

    /// Log every request with its response body at debug level
    pub debug_trail: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff: CooldownOptions::default(),
            min_request_interval: Duration::from_secs(1),
            debug_trail: false,
        }
    }
}

/// HTTP client for the Forge API
pub struct HttpClient {
    client: Client,
    base_url: Url,
    token: SecretString,
    options: ClientOptions,
    last_request: Mutex<Option<Instant>>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(token: SecretString, options: ClientOptions) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("forge-deploy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport {
                url: options.base_url.clone(),
                message: e.to_string(),
                connect: false,
                timeout: false,
            })?;

        // Trailing slash so relative paths join below the version segment
        let base_url = Url::parse(&format!("{}/", options.base_url.trim_end_matches('/')))?;

        Ok(Self {
            client,
            base_url,
            token,
            options,
            last_request: Mutex::new(None),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Make a GET request and decode one top-level field, e.g. `site` of `{"site": {...}}`
    pub async fn get_field<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let body = self.send(Method::GET, url.clone(), None).await?;
        field(&url, &body, key)
    }

    /// Make a GET request returning the raw body
    pub async fn get_text(&self, path: &str) -> Result<String, ApiError> {
        let url = self.endpoint(path)?;
        self.send(Method::GET, url, None).await
    }

    /// List a collection, following `links.next` across pages.
    ///
    /// Accepts both `{"<key>": [...]}` envelopes and bare arrays.
    pub async fn get_list<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut next = Some(self.endpoint(path)?);
        let mut pages = 0;

        while let Some(url) = next.take() {
            let body = self.send(Method::GET, url.clone(), None).await?;
            let page: Value = decode(&url, &body)?;

            let entries = match &page {
                Value::Array(entries) => entries.clone(),
                Value::Object(map) => match map.get(key) {
                    Some(Value::Array(entries)) => entries.clone(),
                    Some(Value::Null) | None => Vec::new(),
                    Some(_) => {
                        return Err(ApiError::Decode {
                            url: url.to_string(),
                            message: format!("`{}` is not a list", key),
                        })
                    }
                },
                _ => Vec::new(),
            };
            for entry in entries {
                items.push(serde_json::from_value(entry).map_err(|e| ApiError::Decode {
                    url: url.to_string(),
                    message: e.to_string(),
                })?);
            }

            pages += 1;
            if pages >= MAX_PAGES {
                warn!("Stopped listing {} after {} pages", path, pages);
                break;
            }
            next = match page.pointer("/links/next").and_then(Value::as_str) {
                Some(link) => Some(url.join(link)?),
                None => None,
            };
        }

        Ok(items)
    }

    /// Make a POST request and decode one top-level field
    pub async fn post_field<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        key: &str,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let response = self.send(Method::POST, url.clone(), Some(to_json(&url, body)?)).await?;
        field(&url, &response, key)
    }

    /// Make a POST request, ignoring the response body
    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        self.send(Method::POST, url.clone(), Some(to_json(&url, body)?)).await?;
        Ok(())
    }

    /// Make a PUT request, ignoring the response body
    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        self.send(Method::PUT, url.clone(), Some(to_json(&url, body)?)).await?;
        Ok(())
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }

    /// Send a request, retrying transient failures
    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<String, ApiError> {
        let mut attempt = 0;
        loop {
            let (err, retry_after) = match self.send_once(&method, &url, body.as_ref()).await {
                Ok(text) => return Ok(text),
                Err(failure) => failure,
            };

            if attempt >= self.options.max_retries || !should_retry(&method, &err) {
                return Err(err);
            }

            let delay = retry_after.unwrap_or_else(|| calc_exp_backoff(&self.options.backoff, attempt));
            attempt += 1;
            warn!(
                "{} {} failed ({}), retry {}/{} in {:?}",
                method, url, err, attempt, self.options.max_retries, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<String, (ApiError, Option<Duration>)> {
        self.throttle().await;

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .bearer_auth(self.token.expose_secret())
            .header(header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            (
                ApiError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                    connect: e.is_connect(),
                    timeout: e.is_timeout(),
                },
                None,
            )
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response.text().await.map_err(|e| {
            (
                ApiError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                    connect: false,
                    timeout: e.is_timeout(),
                },
                None,
            )
        })?;

        if self.options.debug_trail {
            debug!("{} {} -> {}", method, url, status.as_u16());
            debug!("Response body: {}", truncate(&text, 2000));
        }

        if !status.is_success() {
            return Err((
                ApiError::Status {
                    method: method.to_string(),
                    url: url.to_string(),
                    status: status.as_u16(),
                    body: truncate(&text, 500),
                },
                retry_after,
            ));
        }

        Ok(text)
    }

    /// Space requests at least `min_request_interval` apart
    async fn throttle(&self) {
        let interval = self.options.min_request_interval;
        if interval.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Rate limits and connection failures are always retried; 5xx and
/// timeouts only for idempotent methods since the request may have landed.
fn should_retry(method: &Method, err: &ApiError) -> bool {
    match err {
        ApiError::Status { status: 429, .. } => true,
        ApiError::Transport { connect: true, .. } => true,
        _ if err.is_retryable() => {
            *method == Method::GET || *method == Method::PUT || *method == Method::DELETE
        }
        _ => false,
    }
}

fn to_json<B: Serialize>(url: &Url, body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(url: &Url, body: &str) -> Result<T, ApiError> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn field<T: DeserializeOwned>(url: &Url, body: &str, key: &str) -> Result<T, ApiError> {
    let mut value: Value = decode(url, body)?;
    let inner = value
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| ApiError::Decode {
            url: url.to_string(),
            message: format!("missing `{}` in response", key),
        })?;
    serde_json::from_value(inner).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
