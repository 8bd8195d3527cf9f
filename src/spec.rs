//! The immutable description of one probing run.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Method, Url};

use crate::error::ConfigError;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Method, target and headers shared read-only by every attempt of a run.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    url: Url,
    headers: HeaderMap,
    concurrency: usize,
    timeout: Duration,
}

impl RequestSpec {
    /// Starts a GET spec for `url` with the default concurrency and timeout.
    pub fn builder(url: impl Into<String>) -> RequestSpecBuilder {
        RequestSpecBuilder {
            url: url.into(),
            method: "GET".to_string(),
            headers: HeaderMap::new(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// The upper-cased method every attempt uses.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The absolute target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Headers sent with every attempt.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Number of attempts, always at least 1.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Deadline for a single attempt's response.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Collects the parts of a [`RequestSpec`]; nothing is checked until [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct RequestSpecBuilder {
    url: String,
    method: String,
    headers: HeaderMap,
    concurrency: usize,
    timeout: Duration,
}

impl RequestSpecBuilder {
    /// Any case is accepted; the method is upper-cased before validation.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Replaces the header map.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the number of attempts.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the parts and freezes them into a [`RequestSpec`].
    pub fn build(self) -> Result<RequestSpec, ConfigError> {
        let url = Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingHost(self.url));
        }

        let upper = self.method.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return Err(ConfigError::InvalidMethod(self.method));
        }
        let method = Method::from_bytes(upper.as_bytes())
            .map_err(|_| ConfigError::InvalidMethod(self.method.clone()))?;

        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(RequestSpec {
            method,
            url,
            headers: self.headers,
            concurrency: self.concurrency,
            timeout: self.timeout,
        })
    }
}
