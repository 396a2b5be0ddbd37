//! Authenticated JSON fetching.
//!
//! Every upstream call goes through [`JsonSource::get_json`]. The production
//! implementation is [`Fetcher`], which injects the bearer token, decodes the
//! body as JSON and retries HTTP 429 responses according to a [`RetryPolicy`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Rate limited after {attempts} retries: {status} {url}{}", body_suffix(.body))]
    RateLimitExceeded {
        status: u16,
        url: String,
        body: String,
        attempts: u32,
    },

    #[error("{status} {url}{}", body_suffix(.body))]
    Upstream {
        status: u16,
        url: String,
        body: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!("\n{}", body)
    }
}

impl FetchError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::RateLimitExceeded { status, .. } | FetchError::Upstream { status, .. } => {
                Some(*status)
            }
            FetchError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Capability to GET a URL and decode the body as JSON.
///
/// The resolvers and the export pipeline only depend on this trait so they
/// can be exercised against canned payloads.
#[async_trait]
pub trait JsonSource: Send + Sync {
    async fn get_json(&self, url: &Url) -> Result<Value, FetchError>;
}

/// Rate-limit headers returned with a 429 response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHints {
    /// `retry-after` header, seconds
    pub retry_after: Option<String>,

    /// `ratelimit-reset` header, seconds
    pub ratelimit_reset: Option<String>,
}

impl RateLimitHints {
    fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        Self {
            retry_after: get("retry-after"),
            ratelimit_reset: get("ratelimit-reset"),
        }
    }
}

/// Computes the wait before retry number `attempt` (0-based).
pub type DelayFn = fn(u32, &RateLimitHints) -> Duration;

/// Retry policy for rate-limited requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed after the first 429
    pub max_retries: u32,

    /// Wait computation
    pub delay: DelayFn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: rate_limit_delay,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` once retries are exhausted.
    pub fn next_delay(&self, attempt: u32, hints: &RateLimitHints) -> Option<Duration> {
        if attempt >= self.max_retries {
            None
        } else {
            Some((self.delay)(attempt, hints))
        }
    }
}

/// Default wait: `retry-after`, else `ratelimit-reset`, else `500ms * (attempt + 1)`.
///
/// Header values are seconds. A header that does not parse is skipped.
pub fn rate_limit_delay(attempt: u32, hints: &RateLimitHints) -> Duration {
    let seconds = |raw: &Option<String>| {
        raw.as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|s| s.is_finite() && *s >= 0.0)
    };

    seconds(&hints.retry_after)
        .or_else(|| seconds(&hints.ratelimit_reset))
        .map(|s| Duration::from_millis((s * 1000.0) as u64))
        .unwrap_or_else(|| Duration::from_millis(500 * (u64::from(attempt) + 1)))
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Bearer token sent with every request
    pub api_key: String,

    /// User agent string
    pub user_agent: String,

    /// Rate-limit retry policy
    pub retry: RetryPolicy,
}

impl FetcherConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            user_agent: format!("faceit-export/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
        }
    }
}

/// Raw response captured for diagnostics.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// A single raw GET without retries, for diagnostics.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &Url) -> Result<ProbeResponse, FetchError>;
}

/// Headers worth showing when diagnosing upstream behaviour.
const PROBE_HEADERS: &[&str] = &[
    "x-faceit-gateway",
    "ratelimit-limit",
    "ratelimit-remaining",
    "ratelimit-reset",
    "cache-control",
];

/// HTTP fetcher with bearer auth and rate-limit retries.
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
}

impl Fetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("faceit-export")),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| FetchError::InvalidHeader(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            retry: config.retry,
        })
    }

    /// Read the body for an error report; a failed read yields an empty body.
    async fn error_body(response: Response) -> String {
        response.text().await.unwrap_or_default()
    }
}

#[async_trait]
impl Probe for Fetcher {
    async fn probe(&self, url: &Url) -> Result<ProbeResponse, FetchError> {
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status().as_u16();
        let headers = PROBE_HEADERS
            .iter()
            .filter_map(|name| {
                response
                    .headers()
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.unwrap_or_default();

        Ok(ProbeResponse {
            url: url.to_string(),
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl JsonSource for Fetcher {
    async fn get_json(&self, url: &Url) -> Result<Value, FetchError> {
        let mut attempt = 0;

        loop {
            debug!("GET {}", url);
            let response = self.client.get(url.as_str()).send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response.json::<Value>().await?);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let hints = RateLimitHints::from_headers(response.headers());
                match self.retry.next_delay(attempt, &hints) {
                    Some(wait) => {
                        warn!(
                            "Rate limited on {}, retry {}/{} in {}ms",
                            url,
                            attempt + 1,
                            self.retry.max_retries,
                            wait.as_millis()
                        );
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                        continue;
                    }
                    None => {
                        return Err(FetchError::RateLimitExceeded {
                            status: status.as_u16(),
                            url: url.to_string(),
                            body: Self::error_body(response).await,
                            attempts: attempt,
                        });
                    }
                }
            }

            return Err(FetchError::Upstream {
                status: status.as_u16(),
                url: url.to_string(),
                body: Self::error_body(response).await,
            });
        }
    }
}
