//! HTTP client with rate limiting and retry logic for tree.tv
//!
//! Provides a rate-limited HTTP client that respects server limits,
//! implements exponential backoff for transient errors and runs every
//! outgoing request through the shared interceptor registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{Result, TreeTvError};
use crate::interceptor::{InterceptorRegistry, OutboundRequest};
use crate::url::parse_url;

/// Retry budget for the guard key exchange
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Playlist requests the guard may reject before giving up (default: 4)
    pub max_attempts: u32,
    /// Key submissions per attempt, bounding resynchronization streaks (default: 4)
    pub rounds_per_attempt: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            rounds_per_attempt: 4,
        }
    }
}

/// Configuration for the HTTP client and the unlock flow
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Catalog host (default: "http://tree.tv")
    pub base_url: String,
    /// Player and guard host (default: "http://player.tree.tv")
    pub player_url: String,
    /// Regex matching the segment CDN hosts (default: `.*3tv\.im.*`)
    pub cdn_host_pattern: String,
    /// User agent sent everywhere and reported in the fingerprint
    pub user_agent: String,
    /// Navigator platform reported in the fingerprint (default: "Win32")
    pub platform: String,
    /// Maximum requests per second (default: 2.0)
    pub requests_per_second: f64,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Maximum retry attempts for transient errors (default: 3)
    pub max_retries: u32,
    /// Guard key exchange budget
    pub guard: GuardConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            player_url: PLAYER_URL.to_string(),
            cdn_host_pattern: CDN_HOST_PATTERN.to_string(),
            user_agent: USER_AGENT.to_string(),
            platform: PLATFORM.to_string(),
            requests_per_second: 2.0,
            timeout_secs: 30,
            max_retries: 3,
            guard: GuardConfig::default(),
        }
    }
}

/// Rate limiter to control request frequency
///
/// Ensures requests are spaced at least `min_interval` apart.
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the specified requests per second
    ///
    /// # Arguments
    /// * `requests_per_second` - Maximum number of requests allowed per second
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = Duration::from_secs_f64(1.0 / requests_per_second);
        let now = Instant::now();
        Self {
            min_interval,
            last_request: Arc::new(Mutex::new(now.checked_sub(min_interval).unwrap_or(now))),
        }
    }

    /// Acquire permission to make a request
    ///
    /// If called before the minimum interval has passed since the last request,
    /// this method will sleep until the interval has elapsed.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();

        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }

        *last = Instant::now();
    }

    /// Get the minimum interval between requests
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

const BASE_URL: &str = "http://tree.tv";
const PLAYER_URL: &str = "http://player.tree.tv";
const CDN_HOST_PATTERN: &str = r".*3tv\.im.*";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; rv:54.0) Gecko/20100101 Firefox/54.0";
const PLATFORM: &str = "Win32";

/// HTTP client wrapper with rate limiting, retries and interceptors
///
/// Handles all HTTP communication with tree.tv, including:
/// - Rate limiting to avoid overwhelming the server
/// - Automatic retries with exponential backoff for transient errors
/// - Host-scoped cookies and headers from the [`InterceptorRegistry`]
pub struct TreeTvClient {
    client: reqwest::Client,
    jar: Arc<Jar>,
    interceptors: Arc<InterceptorRegistry>,
    rate_limiter: RateLimiter,
    max_retries: u32,
}

impl TreeTvClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&ClientConfig::default())
    }

    /// Create a new client with custom configuration
    ///
    /// # Errors
    /// - `InvalidConfig` if `requests_per_second` is not a positive number
    /// - `HttpError` if the HTTP client cannot be built
    pub fn with_config(config: &ClientConfig) -> Result<Self> {
        let rps = config.requests_per_second;
        if !rps.is_finite() || rps <= 0.0 {
            return Err(TreeTvError::InvalidConfig(format!(
                "requests_per_second must be a positive number, got {}",
                rps
            )));
        }

        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(TreeTvError::HttpError)?;

        Ok(Self {
            client,
            jar,
            interceptors: Arc::new(InterceptorRegistry::new()),
            rate_limiter: RateLimiter::new(config.requests_per_second),
            max_retries: config.max_retries,
        })
    }

    /// Interceptors applied to every request this client sends
    pub fn interceptors(&self) -> &Arc<InterceptorRegistry> {
        &self.interceptors
    }

    /// POST a form to `url` and return the response body
    ///
    /// Matching interceptors run first; `headers` are laid over their result,
    /// so per-request values such as `Referer` win over host-wide ones.
    ///
    /// # Errors
    /// - `InvalidUrl` - `url` cannot be parsed
    /// - `HttpError` - Network or HTTP errors
    /// - `RateLimited` - Server returned 429 after all retries exhausted
    /// - `NotFound` - Server returned 404
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        headers: HeaderMap,
    ) -> Result<String> {
        let mut request = OutboundRequest::new(parse_url(url)?);
        self.interceptors.apply(&mut request);

        let cookie = self.cookie_header(&request);
        let (url, mut merged, _) = request.into_parts();
        merged.extend(headers);
        if let Some(cookie) = cookie {
            merged.insert(COOKIE, cookie);
        }

        self.post_with_retry(url.as_str(), form, &merged).await
    }

    /// Merges cookies the server set earlier with the interceptor cookies
    ///
    /// Interceptor cookies win on name clashes. An explicit `Cookie` header
    /// stops reqwest from adding the jar's cookies on its own.
    fn cookie_header(&self, request: &OutboundRequest) -> Option<HeaderValue> {
        let overridden = |pair: &&str| {
            let name = pair.split('=').next().unwrap_or_default().trim();
            request.cookies().iter().any(|(n, _)| n == name)
        };

        let stored = self
            .jar
            .cookies(request.url())
            .and_then(|value| value.to_str().map(str::to_string).ok())
            .unwrap_or_default();

        let mut pairs: Vec<String> = stored
            .split(';')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .filter(|pair| !overridden(pair))
            .map(str::to_string)
            .collect();
        pairs.extend(
            request
                .cookies()
                .iter()
                .map(|(name, value)| format!("{}={}", name, value)),
        );

        if pairs.is_empty() {
            return None;
        }
        HeaderValue::from_str(&pairs.join("; ")).ok()
    }

    /// Internal method to post with retry logic
    async fn post_with_retry(
        &self,
        url: &str,
        form: &[(String, String)],
        headers: &HeaderMap,
    ) -> Result<String> {
        let mut attempt = 0;

        loop {
            // Wait for rate limiter
            self.rate_limiter.acquire().await;

            match self.do_post(url, form, headers).await {
                Ok(body) => return Ok(body),
                Err(e) if Self::is_retryable(&e) && attempt < self.max_retries => {
                    // Exponential backoff: 1s, 2s, 4s
                    let backoff = Duration::from_secs(1 << attempt);
                    debug!(url, attempt, error = %e, "Retrying after transient error");
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Perform a single POST attempt
    async fn do_post(
        &self,
        url: &str,
        form: &[(String, String)],
        headers: &HeaderMap,
    ) -> Result<String> {
        let response = self
            .client
            .post(url)
            .headers(headers.clone())
            .form(form)
            .send()
            .await
            .map_err(TreeTvError::HttpError)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TreeTvError::RateLimited);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TreeTvError::NotFound(url.to_string()));
        }

        if status.is_server_error() {
            return Err(match response.error_for_status() {
                Err(e) => TreeTvError::HttpError(e),
                Ok(_) => TreeTvError::ParseError(format!("Server error {} from {}", status, url)),
            });
        }

        response.text().await.map_err(TreeTvError::HttpError)
    }

    /// Check if an error is retryable
    fn is_retryable(error: &TreeTvError) -> bool {
        match error {
            TreeTvError::RateLimited => true,
            TreeTvError::HttpError(e) => {
                // Retry on timeout, connection errors, or 5xx status codes
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Get a reference to the rate limiter (for testing)
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}
