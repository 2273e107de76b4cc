//! Host-scoped outbound request interceptors
//!
//! Both the catalog host and the player host validate the session cookie and
//! a browser-like header set on every request, including the segment fetches
//! the media player performs after a stream is resolved. Interceptors are
//! registered against a URL regex and mutate every matching request.

use std::sync::{Arc, RwLock};

use regex::Regex;
use reqwest::Url;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// A request about to be sent, as seen by interceptors
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    url: Url,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
}

impl OutboundRequest {
    pub fn new(url: Url) -> Self {
        Self::with_headers(url, HeaderMap::new())
    }

    pub fn with_headers(url: Url, headers: HeaderMap) -> Self {
        Self {
            url,
            headers,
            cookies: Vec::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    /// Sets (replaces) a header; values that are not valid header text are skipped
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => warn!(header = %name, "Skipping invalid header value"),
        }
    }

    /// Sets (replaces) a cookie by name
    pub fn set_cookie(&mut self, name: &str, value: &str) {
        if let Some(existing) = self.cookies.iter_mut().find(|(n, _)| n == name) {
            existing.1 = value.to_string();
        } else {
            self.cookies.push((name.to_string(), value.to_string()));
        }
    }

    /// Renders the cookies as a single `Cookie` header value
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn into_parts(self) -> (Url, HeaderMap, Vec<(String, String)>) {
        (self.url, self.headers, self.cookies)
    }
}

type Mutator = Arc<dyn Fn(&mut OutboundRequest) + Send + Sync>;

struct Interceptor {
    pattern: Regex,
    mutate: Mutator,
}

/// Registry of URL-scoped interceptors, shared by everything that sends requests
#[derive(Default)]
pub struct InterceptorRegistry {
    entries: RwLock<Vec<Interceptor>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mutate` for every request whose URL matches `pattern`
    ///
    /// Registering the same pattern again replaces the earlier interceptor.
    pub fn register<F>(&self, pattern: Regex, mutate: F)
    where
        F: Fn(&mut OutboundRequest) + Send + Sync + 'static,
    {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let mutate: Mutator = Arc::new(mutate);

        if let Some(entry) = entries
            .iter_mut()
            .find(|entry| entry.pattern.as_str() == pattern.as_str())
        {
            entry.mutate = mutate;
        } else {
            entries.push(Interceptor { pattern, mutate });
        }
    }

    /// Runs every matching interceptor, in registration order
    pub fn apply(&self, request: &mut OutboundRequest) {
        // Clone the matching mutators so none runs while the lock is held.
        let matching: Vec<Mutator> = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries
                .iter()
                .filter(|entry| entry.pattern.is_match(request.url().as_str()))
                .map(|entry| Arc::clone(&entry.mutate))
                .collect()
        };

        for mutate in matching {
            mutate(request);
        }
    }

    /// Headers (including `Cookie`) that a request to `url` must carry
    ///
    /// For components outside this crate, such as the media player fetching
    /// stream segments.
    pub fn headers_for(&self, url: &Url) -> HeaderMap {
        let mut request = OutboundRequest::new(url.clone());
        self.apply(&mut request);

        let cookie = request.cookie_header();
        let (_, mut headers, _) = request.into_parts();
        if let Some(cookie) = cookie
            && let Ok(value) = HeaderValue::from_str(&cookie)
        {
            headers.insert(COOKIE, value);
        }
        headers
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
