//! HTTP reachability probing of a deployed workload.
//!
//! A probe issues `GET` requests until the response carries the expected
//! status code and its body contains the expected text. Transport errors
//! and mismatches are both treated as "not ready yet", so a workload that
//! is still starting behind a load balancer simply consumes attempts.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::retry::{Readiness, RetryError, RetryPolicy, Sleeper, retry};

/// Status expected from the demo workload.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Text the demo workload's body must contain.
pub const DEFAULT_EXPECTED_BODY: &str = "Hello, world!";

/// Per-request timeout applied by [`ProbeClient`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Status code and body returned by a single request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
}

/// Minimum TLS protocol version accepted by the probe client.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MinTlsVersion {
    /// TLS 1.2.
    Tls12,
    /// TLS 1.3.
    #[default]
    Tls13,
}

impl From<MinTlsVersion> for reqwest::tls::Version {
    fn from(value: MinTlsVersion) -> Self {
        match value {
            MinTlsVersion::Tls12 => Self::TLS_1_2,
            MinTlsVersion::Tls13 => Self::TLS_1_3,
        }
    }
}

/// What a successful probe must observe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProbeExpectation {
    /// Exact status code expected.
    pub status: u16,
    /// Substring the body must contain.
    pub body_contains: String,
}

impl ProbeExpectation {
    /// Builds an expectation.
    #[must_use]
    pub fn new(status: u16, body_contains: impl Into<String>) -> Self {
        Self {
            status,
            body_contains: body_contains.into(),
        }
    }

    fn check(&self, url: &str, response: &HttpResponse) -> Readiness<ProbeResult, ProbeFailure> {
        if response.status != self.status {
            return Readiness::NotReady(ProbeFailure::Status {
                url: url.to_owned(),
                expected: self.status,
                actual: response.status,
            });
        }
        if !response.body.contains(&self.body_contains) {
            return Readiness::NotReady(ProbeFailure::Body {
                url: url.to_owned(),
                expected: self.body_contains.clone(),
            });
        }
        Readiness::Ready(ProbeResult {
            status: response.status,
            body_contains_expected: true,
        })
    }
}

impl Default for ProbeExpectation {
    fn default() -> Self {
        Self::new(DEFAULT_EXPECTED_STATUS, DEFAULT_EXPECTED_BODY)
    }
}

/// Outcome of a successful probe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProbeResult {
    /// Status code observed on the successful attempt.
    pub status: u16,
    /// Whether the body contained the expected text.
    pub body_contains_expected: bool,
}

/// Why a single probe attempt did not succeed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProbeFailure {
    /// The status code differed from the expectation.
    #[error("{url} returned status {actual}, expected {expected}")]
    Status {
        /// Probed URL.
        url: String,
        /// Expected status code.
        expected: u16,
        /// Observed status code.
        actual: u16,
    },
    /// The body lacked the expected text.
    #[error("{url} body does not contain '{expected}'")]
    Body {
        /// Probed URL.
        url: String,
        /// Expected substring.
        expected: String,
    },
    /// The request could not be completed.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Probed URL.
        url: String,
        /// Transport error message.
        message: String,
    },
}

/// Errors raised by the prober.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Raised when the HTTP client cannot be built.
    #[error("failed to build HTTP client: {message}")]
    Client {
        /// Builder error message.
        message: String,
    },
    /// Raised when the expectation was never met.
    #[error(transparent)]
    Exhausted(#[from] RetryError<ProbeFailure>),
}

/// Issues a single HTTP `GET`.
pub trait HttpProbe {
    /// Fetches `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeFailure::Transport`] when no response is received.
    fn get(&self, url: &str) -> Result<HttpResponse, ProbeFailure>;
}

impl<H: HttpProbe + ?Sized> HttpProbe for &H {
    fn get(&self, url: &str) -> Result<HttpResponse, ProbeFailure> {
        (**self).get(url)
    }
}

/// Blocking `reqwest` client used against real endpoints.
#[derive(Clone, Debug)]
pub struct ProbeClient {
    client: reqwest::blocking::Client,
}

impl ProbeClient {
    /// Builds a client with an optional minimum TLS version and a
    /// per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Client`] when the TLS backend cannot be
    /// initialised.
    pub fn new(min_tls: Option<MinTlsVersion>, timeout: Duration) -> Result<Self, ProbeError> {
        let mut builder = reqwest::blocking::Client::builder().timeout(timeout);
        if let Some(version) = min_tls {
            builder = builder.min_tls_version(version.into());
        }
        let client = builder.build().map_err(|err| ProbeError::Client {
            message: err.to_string(),
        })?;
        Ok(Self { client })
    }
}

impl HttpProbe for ProbeClient {
    fn get(&self, url: &str) -> Result<HttpResponse, ProbeFailure> {
        let transport = |err: reqwest::Error| ProbeFailure::Transport {
            url: url.to_owned(),
            message: err.to_string(),
        };
        let response = self.client.get(url).send().map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(transport)?;
        Ok(HttpResponse { status, body })
    }
}

/// Probes `url` until `expectation` is met or the policy is exhausted.
///
/// # Errors
///
/// Returns [`ProbeError::Exhausted`] carrying the final attempt's failure.
pub fn probe_with_retry<H, S>(
    http: &H,
    url: &str,
    expectation: &ProbeExpectation,
    policy: RetryPolicy,
    sleeper: &S,
) -> Result<ProbeResult, ProbeError>
where
    H: HttpProbe + ?Sized,
    S: Sleeper + ?Sized,
{
    let label = format!("HTTP GET to URL {url}");
    let result = retry(&label, policy, sleeper, || match http.get(url) {
        Ok(response) => expectation.check(url, &response),
        Err(failure) => Readiness::NotReady(failure),
    })?;
    info!(url, status = result.status, "probe succeeded");
    Ok(result)
}
