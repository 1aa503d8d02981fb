//! Resilient HTTP client for the source-control API.
//!
//! Every request carries the bearer credential and a fixed client identifier.
//! Requests run through [`seatbelt`] retry and timeout middleware:
//! rate-limited (429) and server-error (5xx) responses are retried with
//! exponential backoff, honouring `Retry-After` when the server sends one.
//! Any other 4xx fails immediately. Transport timeouts surface as their own
//! error carrying the elapsed time.

use super::credentials::Credentials;
use chrono::Utc;
use core::fmt::{Display, Formatter};
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;
use layered::{Execute, Service, Stack};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use seatbelt::retry::{Backoff, Retry};
use seatbelt::timeout::Timeout;
use seatbelt::{RecoveryInfo, ResilienceContext};
use serde::de::DeserializeOwned;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tick::Clock;
use url::Url;

const LOG_TARGET: &str = "     fetch";
const USER_AGENT: &str = "dora-pulse";
const API_VERSION: &str = "2022-11-28";

/// Maximum retries on top of the original request.
pub const MAX_RETRIES: u32 = 3;

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body excerpt kept in a [`FetchError::Permanent`].
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Pattern to extract the next page URL from a `Link` header
static NEXT_LINK_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).expect("invalid regex"));

/// Retry and timeout settings for the fetch client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Failure of a fetch after the retry policy has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// 429, 5xx or a connection failure that persisted through every retry.
    Transient { status: Option<u16>, attempts: u32, message: String },

    /// The transport timed out.
    Timeout { elapsed: Duration, attempts: u32 },

    /// A non-retryable 4xx. The body excerpt has credentials scrubbed.
    Permanent { status: u16, body: String },

    /// The response could not be decoded or lacked a required field.
    Malformed { message: String },

    /// No usable credential could be obtained.
    Credential { message: String },

    /// The URL does not use a secure transport.
    Insecure { url: String },
}

impl FetchError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed { message: message.into() }
    }

    /// Record the final attempt count and total elapsed time once retries are exhausted.
    fn exhausted(self, attempts: u32, elapsed: Duration) -> Self {
        match self {
            Self::Transient { status, message, .. } => Self::Transient { status, attempts, message },
            Self::Timeout { .. } => Self::Timeout { elapsed, attempts },
            other => other,
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Transient { status: Some(status), attempts, message } => {
                write!(f, "transient failure with status {status} after {attempts} attempt(s): {message}")
            }
            Self::Transient { status: None, attempts, message } => {
                write!(f, "transient network failure after {attempts} attempt(s): {message}")
            }
            Self::Timeout { elapsed, attempts } => {
                write!(f, "request timed out after {}ms ({attempts} attempt(s))", elapsed.as_millis())
            }
            Self::Permanent { status, body } => write!(f, "request failed with status {status}: {body}"),
            Self::Malformed { message } => write!(f, "malformed response: {message}"),
            Self::Credential { message } => write!(f, "no usable credential: {message}"),
            Self::Insecure { url } => write!(f, "refusing to send credentials over an insecure connection to '{url}'"),
        }
    }
}

impl core::error::Error for FetchError {}

/// A request to the upstream API.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    method: Method,
    url: Url,
    body: Option<serde_json::Value>,
}

impl FetchRequest {
    #[must_use]
    pub const fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            body: None,
        }
    }

    #[must_use]
    pub const fn post_json(url: Url, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url,
            body: Some(body),
        }
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

/// A successful response, fully read.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    /// The `rel="next"` target from the `Link` header, if any.
    pub next_link: Option<Url>,
    /// Whether the response carried a `Link` header at all.
    pub has_link_header: bool,
    pub body: String,
}

impl FetchResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| FetchError::malformed(format!("could not decode response body: {e}")))
    }

    /// The server sent pagination links and none of them points to a next page.
    #[must_use]
    pub const fn is_last_page(&self) -> bool {
        self.has_link_header && self.next_link.is_none()
    }
}

/// How a status code is handled by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Success,
    Retryable { retry_after: Option<Duration> },
    Permanent,
}

/// Parse the `Retry-After` header value as seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let s = headers.get(RETRY_AFTER).and_then(|h| h.to_str().ok())?;
    s.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Secondary rate limits arrive as 403 with either `Retry-After` or an exhausted quota.
fn is_secondary_rate_limit(headers: &HeaderMap) -> bool {
    headers.contains_key(RETRY_AFTER)
        || headers
            .get("x-ratelimit-remaining")
            .and_then(|h| h.to_str().ok())
            .is_some_and(|remaining| remaining.trim() == "0")
}

fn classify(status: StatusCode, headers: &HeaderMap) -> StatusClass {
    if status.is_success() {
        StatusClass::Success
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
        || (status == StatusCode::FORBIDDEN && is_secondary_rate_limit(headers))
    {
        StatusClass::Retryable {
            retry_after: parse_retry_after(headers),
        }
    } else {
        StatusClass::Permanent
    }
}

fn next_link(headers: &HeaderMap) -> Option<Url> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find_map(|link| NEXT_LINK_REGEX.captures(link))
        .and_then(|caps| Url::parse(&caps[1]).ok())
}

/// Reject URLs that would send the credential in clear text.
///
/// Plain `http` is accepted only for loopback hosts.
pub fn ensure_secure(url: &Url) -> Result<(), FetchError> {
    let loopback = match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    };

    match url.scheme() {
        "https" => Ok(()),
        "http" if loopback => Ok(()),
        _ => Err(FetchError::Insecure { url: url.to_string() }),
    }
}

/// Failure of a single attempt, before the retry policy is applied.
#[derive(Debug)]
enum AttemptError {
    Retryable { error: FetchError, retry_after: Option<Duration> },
    Fatal(FetchError),
}

impl AttemptError {
    fn into_fetch_error(self) -> FetchError {
        match self {
            Self::Retryable { error, .. } | Self::Fatal(error) => error,
        }
    }
}

type AttemptResult = Result<FetchResponse, AttemptError>;

/// Classify the outcome of an attempt for the retry layer.
fn recovery(result: &AttemptResult) -> RecoveryInfo {
    match result {
        Err(AttemptError::Retryable {
            retry_after: Some(delay), ..
        }) => RecoveryInfo::retry().delay(*delay),
        Err(AttemptError::Retryable { retry_after: None, .. }) => RecoveryInfo::retry(),
        Ok(_) | Err(AttemptError::Fatal(_)) => RecoveryInfo::never(),
    }
}

fn retry_reason(result: &AttemptResult) -> String {
    match result {
        Ok(response) => response.status.to_string(),
        Err(AttemptError::Retryable { error, .. } | AttemptError::Fatal(error)) => error.to_string(),
    }
}

/// The HTTP client and credential shared by every attempt.
#[derive(Debug)]
struct Connection {
    http: reqwest::Client,
    credentials: Credentials,
}

impl Connection {
    async fn attempt(&self, request: &FetchRequest) -> AttemptResult {
        let bearer = self.credentials.bearer(Utc::now()).map_err(|e| {
            AttemptError::Fatal(FetchError::Credential {
                message: self.credentials.redact(&format!("{e:#}")),
            })
        })?;

        let started = Instant::now();
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .header(AUTHORIZATION, bearer);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.transport_failure(&e, started))?;

        let status = response.status();
        match classify(status, response.headers()) {
            StatusClass::Success => {
                let next_link = next_link(response.headers());
                let has_link_header = response.headers().contains_key(LINK);
                let body = response.text().await.map_err(|e| self.transport_failure(&e, started))?;

                Ok(FetchResponse {
                    status,
                    next_link,
                    has_link_header,
                    body,
                })
            }

            StatusClass::Retryable { retry_after } => Err(AttemptError::Retryable {
                error: FetchError::Transient {
                    status: Some(status.as_u16()),
                    attempts: 1,
                    message: status.canonical_reason().unwrap_or("unexpected status").to_string(),
                },
                retry_after,
            }),

            StatusClass::Permanent => {
                let body = self.sanitize_body(&response.text().await.unwrap_or_default());

                // Scrubbing needs the cached secret, so only drop it afterwards.
                if status == StatusCode::UNAUTHORIZED {
                    self.credentials.invalidate();
                }

                Err(AttemptError::Fatal(FetchError::Permanent {
                    status: status.as_u16(),
                    body,
                }))
            }
        }
    }

    fn transport_failure(&self, error: &reqwest::Error, started: Instant) -> AttemptError {
        let error = if error.is_timeout() {
            FetchError::Timeout {
                elapsed: started.elapsed(),
                attempts: 1,
            }
        } else {
            FetchError::Transient {
                status: None,
                attempts: 1,
                message: self.credentials.redact(&error.to_string()),
            }
        };

        AttemptError::Retryable { error, retry_after: None }
    }

    fn sanitize_body(&self, body: &str) -> String {
        let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        self.credentials.redact(excerpt.trim())
    }
}

/// HTTP client applying the retry policy to every request.
#[derive(Debug)]
pub struct FetchClient {
    connection: Arc<Connection>,
    policy: RetryPolicy,
}

impl FetchClient {
    pub fn new(credentials: Credentials, policy: RetryPolicy) -> crate::Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let _ = headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let http = reqwest::Client::builder().user_agent(USER_AGENT).default_headers(headers).build()?;

        Ok(Self {
            connection: Arc::new(Connection { http, credentials }),
            policy,
        })
    }

    /// Scrub credentials from text destined for logs.
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        self.connection.credentials.redact(text)
    }

    /// Send a request, retrying transient failures per the [`RetryPolicy`].
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        ensure_secure(&request.url)?;

        let clock = Clock::new_tokio();
        let context = ResilienceContext::new(&clock).name("fetch");

        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let connection = Arc::clone(&self.connection);
        let method = request.method.clone();
        let target = self.redact(request.url.as_str());
        let request_timeout = self.policy.request_timeout;

        let service = (
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(|result: &AttemptResult, _| recovery(result))
                .max_retry_attempts(self.policy.max_retries)
                .base_delay(self.policy.initial_backoff)
                .backoff(Backoff::Exponential)
                .on_retry(move |output, args| {
                    log::warn!(
                        target: LOG_TARGET,
                        "retrying {method} {target} in {}ms (attempt {}): {}",
                        args.retry_delay().as_millis(),
                        args.attempt().index() + 1,
                        retry_reason(output),
                    );
                }),
            Timeout::layer("timeout", &context)
                .timeout_error(move |_| AttemptError::Retryable {
                    error: FetchError::Timeout {
                        elapsed: request_timeout,
                        attempts: 1,
                    },
                    retry_after: None,
                })
                .timeout(request_timeout),
            Execute::new(move |request: FetchRequest| {
                let connection = Arc::clone(&connection);
                let counter = Arc::clone(&counter);
                async move {
                    let _ = counter.fetch_add(1, Ordering::Relaxed);
                    connection.attempt(&request).await
                }
            }),
        )
            .into_service();

        let started = Instant::now();
        match service.execute(request.clone()).await {
            Ok(response) => Ok(response),
            Err(AttemptError::Fatal(error)) => Err(error),
            Err(retryable) => {
                let error = retryable
                    .into_fetch_error()
                    .exhausted(attempts.load(Ordering::Relaxed), started.elapsed());
                log::debug!(target: LOG_TARGET, "giving up on {} {}: {error}", request.method, self.redact(request.url.as_str()));
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            let _ = map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, MAX_RETRIES);
        assert_eq!(policy.initial_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after(&headers(&[("retry-after", "12")])), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after(&headers(&[("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT")])), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn test_classify_statuses() {
        let empty = HeaderMap::new();
        assert_eq!(classify(StatusCode::OK, &empty), StatusClass::Success);
        assert_eq!(
            classify(StatusCode::TOO_MANY_REQUESTS, &empty),
            StatusClass::Retryable { retry_after: None }
        );
        assert_eq!(
            classify(StatusCode::BAD_GATEWAY, &headers(&[("retry-after", "3")])),
            StatusClass::Retryable {
                retry_after: Some(Duration::from_secs(3))
            }
        );
        assert_eq!(classify(StatusCode::NOT_FOUND, &empty), StatusClass::Permanent);
        assert_eq!(classify(StatusCode::UNPROCESSABLE_ENTITY, &empty), StatusClass::Permanent);
    }

    #[test]
    fn test_classify_forbidden() {
        assert_eq!(classify(StatusCode::FORBIDDEN, &HeaderMap::new()), StatusClass::Permanent);
        assert_eq!(
            classify(StatusCode::FORBIDDEN, &headers(&[("x-ratelimit-remaining", "0")])),
            StatusClass::Retryable { retry_after: None }
        );
        assert_eq!(
            classify(StatusCode::FORBIDDEN, &headers(&[("retry-after", "60")])),
            StatusClass::Retryable {
                retry_after: Some(Duration::from_secs(60))
            }
        );
    }

    #[test]
    fn test_next_link() {
        let map = headers(&[(
            "link",
            r#"<https://api.github.com/repos/o/r/pulls?page=2>; rel="next", <https://api.github.com/repos/o/r/pulls?page=5>; rel="last""#,
        )]);
        assert_eq!(next_link(&map).unwrap().as_str(), "https://api.github.com/repos/o/r/pulls?page=2");

        let last_page = headers(&[("link", r#"<https://api.github.com/repos/o/r/pulls?page=1>; rel="first""#)]);
        assert!(next_link(&last_page).is_none());
    }

    #[test]
    fn test_ensure_secure() {
        assert!(ensure_secure(&Url::parse("https://api.github.com/graphql").unwrap()).is_ok());
        assert!(ensure_secure(&Url::parse("http://127.0.0.1:8080/repos").unwrap()).is_ok());
        assert!(ensure_secure(&Url::parse("http://localhost/repos").unwrap()).is_ok());
        assert!(matches!(
            ensure_secure(&Url::parse("http://api.github.com/repos").unwrap()),
            Err(FetchError::Insecure { .. })
        ));
    }

    #[test]
    fn test_exhausted_updates_attempts() {
        let error = FetchError::Transient {
            status: Some(503),
            attempts: 1,
            message: "Service Unavailable".into(),
        };
        let error = error.exhausted(4, Duration::from_secs(1));
        assert!(matches!(error, FetchError::Transient { attempts: 4, .. }));

        let timeout = FetchError::Timeout {
            elapsed: Duration::from_millis(5),
            attempts: 1,
        }
        .exhausted(4, Duration::from_secs(2));
        assert_eq!(
            timeout,
            FetchError::Timeout {
                elapsed: Duration::from_secs(2),
                attempts: 4
            }
        );
    }

    #[test]
    fn test_error_display() {
        let error = FetchError::Permanent {
            status: 404,
            body: "Not Found".into(),
        };
        assert_eq!(error.to_string(), "request failed with status 404: Not Found");

        let timeout = FetchError::Timeout {
            elapsed: Duration::from_millis(1500),
            attempts: 4,
        };
        assert_eq!(timeout.to_string(), "request timed out after 1500ms (4 attempt(s))");
    }

    #[test]
    fn test_response_json_malformed() {
        let response = FetchResponse {
            status: StatusCode::OK,
            next_link: None,
            has_link_header: false,
            body: "not json".into(),
        };
        let result: Result<Vec<u32>, _> = response.json();
        assert!(matches!(result, Err(FetchError::Malformed { .. })));
    }
}
