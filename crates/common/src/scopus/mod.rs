//! Scopus API transport
//!
//! The pipeline talks to Scopus only through [`ScopusTransport`]:
//! - `HttpTransport`: reqwest client with client-side rate limiting
//! - `RetryingTransport`: optional ops-layer retry of transient failures
//! - `MockTransport`: canned responses for tests
//!
//! Any non-success response surfaces as `AppError::Fetch` carrying the
//! status and reason.

use crate::config::ScopusConfig;
use crate::errors::{AppError, Result};
use crate::metrics::RequestMetrics;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff, ExponentialBackoffBuilder};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Issues one GET and returns the decoded JSON body
#[async_trait]
pub trait ScopusTransport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value>;
}

/// Hide the apiKey query parameter in URLs that end up in logs or errors
pub fn redact(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) => {
            if !parsed.query_pairs().any(|(k, _)| k == "apiKey") {
                return url.to_string();
            }
            let pairs: Vec<(String, String)> = parsed
                .query_pairs()
                .map(|(k, v)| {
                    let v = if k == "apiKey" { "***".to_string() } else { v.into_owned() };
                    (k.into_owned(), v)
                })
                .collect();
            parsed.query_pairs_mut().clear().extend_pairs(pairs);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
}

impl HttpTransport {
    pub fn new(config: &ScopusConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second)
            .ok_or_else(|| AppError::config("scopus.requests_per_second must be positive"))?;
        let burst = NonZeroU32::new(config.burst)
            .ok_or_else(|| AppError::config("scopus.burst must be positive"))?;

        Ok(Self {
            client,
            limiter: RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)),
        })
    }
}

#[async_trait]
impl ScopusTransport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        self.limiter.until_ready().await;

        let metrics = RequestMetrics::start("scopus");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        metrics.finish(status.as_u16());

        if !status.is_success() {
            return Err(AppError::Fetch {
                url: redact(url),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        debug!(url = %redact(url), "Scopus request succeeded");
        Ok(response.json().await?)
    }
}

/// Retries transient failures of an inner transport with exponential backoff.
///
/// This is an ops-layer concern wrapped around the pipeline; the pipeline
/// itself treats every failure as fatal.
pub struct RetryingTransport<T> {
    inner: T,
    max_retries: u32,
    initial_interval: Duration,
    max_elapsed: Duration,
}

impl<T: ScopusTransport> RetryingTransport<T> {
    pub fn new(inner: T, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            initial_interval: Duration::from_millis(500),
            max_elapsed: Duration::from_secs(120),
        }
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }
}

#[async_trait]
impl<T: ScopusTransport> ScopusTransport for RetryingTransport<T> {
    async fn get_json(&self, url: &str) -> Result<Value> {
        let inner = &self.inner;
        let max_retries = self.max_retries;
        let mut attempt = 0u32;

        retry(self.policy(), || {
            attempt += 1;
            let current = attempt;
            async move {
                match inner.get_json(url).await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_retryable() && current <= max_retries => {
                        warn!(
                            attempt = current,
                            max_retries = max_retries,
                            error = %e,
                            "Scopus request failed, retrying"
                        );
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }
}

/// Canned response for [`MockTransport`]
#[derive(Debug, Clone)]
pub enum MockResponse {
    Json(Value),
    Status(u16, String),
}

/// In-memory transport for tests.
///
/// A request is served by the longest registered pattern contained in its
/// URL. Each pattern holds a queue of responses; the last one repeats.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, pattern: impl Into<String>, response: MockResponse) -> Self {
        self.routes
            .lock()
            .expect("mock routes poisoned")
            .entry(pattern.into())
            .or_default()
            .push_back(response);
        self
    }

    pub fn on_json(self, pattern: impl Into<String>, body: Value) -> Self {
        self.on(pattern, MockResponse::Json(body))
    }

    pub fn on_status(self, pattern: impl Into<String>, status: u16, reason: &str) -> Self {
        self.on(pattern, MockResponse::Status(status, reason.to_string()))
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("mock requests poisoned").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("mock requests poisoned").len()
    }
}

#[async_trait]
impl ScopusTransport for MockTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        self.requests
            .lock()
            .expect("mock requests poisoned")
            .push(url.to_string());

        let response = {
            let mut routes = self.routes.lock().expect("mock routes poisoned");
            let pattern = routes
                .keys()
                .filter(|p| url.contains(p.as_str()))
                .max_by_key(|p| p.len())
                .cloned();

            pattern.and_then(|p| {
                let queue = routes.get_mut(&p)?;
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
        };

        match response {
            Some(MockResponse::Json(body)) => Ok(body),
            Some(MockResponse::Status(status, reason)) => Err(AppError::Fetch {
                url: redact(url),
                status,
                reason,
            }),
            None => Err(AppError::Fetch {
                url: redact(url),
                status: 404,
                reason: "Not Found".to_string(),
            }),
        }
    }
}

/// Create the transport described by configuration
pub fn create_transport(config: &ScopusConfig) -> Result<Arc<dyn ScopusTransport>> {
    let http = HttpTransport::new(config)?;
    if config.max_retries > 0 {
        Ok(Arc::new(RetryingTransport::new(http, config.max_retries)))
    } else {
        Ok(Arc::new(http))
    }
}
