//! Bearer credentials handed to the fetch client.
//!
//! The token is an explicit `{token, expires_at}` value minted by a
//! [`CredentialSource`]. [`Credentials`] caches the last minted token per
//! instance and refreshes it once it expires or after [`Credentials::invalidate`].

use super::redact::{REDACTED, redact as scrub};
use crate::Result;
use chrono::{DateTime, TimeDelta, Utc};
use core::fmt::{Debug, Formatter};
use ohno::{IntoAppError, bail};
use reqwest::header::HeaderValue;
use std::sync::{Mutex, PoisonError};

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now + TimeDelta::seconds(EXPIRY_SKEW_SECS) >= expires_at)
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &REDACTED)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Mints bearer tokens. Static tokens and refreshed app tokens look the same to the client.
pub trait CredentialSource: Debug + Send + Sync {
    fn mint(&self, now: DateTime<Utc>) -> Result<AccessToken>;
}

/// A fixed token, typically a personal access token from the environment.
#[derive(Debug, Clone)]
pub struct StaticCredential(AccessToken);

impl StaticCredential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(AccessToken::new(token, None))
    }
}

impl CredentialSource for StaticCredential {
    fn mint(&self, _now: DateTime<Utc>) -> Result<AccessToken> {
        Ok(self.0.clone())
    }
}

#[derive(Debug)]
pub struct Credentials {
    source: Box<dyn CredentialSource>,
    cached: Mutex<Option<AccessToken>>,
}

impl Credentials {
    #[must_use]
    pub fn new(source: impl CredentialSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cached: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::new(StaticCredential::new(token))
    }

    /// Return the cached token, minting a new one if there is none or it has expired.
    pub fn current(&self, now: DateTime<Utc>) -> Result<AccessToken> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = cached.as_ref()
            && !token.is_expired(now)
        {
            return Ok(token.clone());
        }

        let fresh = self.source.mint(now)?;
        if fresh.secret().is_empty() {
            bail!("credential source returned an empty token");
        }
        if fresh.is_expired(now) {
            bail!("credential source returned a token that is already expired");
        }

        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    /// `Authorization` header value for the current token.
    pub fn bearer(&self, now: DateTime<Utc>) -> Result<HeaderValue> {
        let token = self.current(now)?;
        let mut value =
            HeaderValue::from_str(&format!("Bearer {}", token.secret())).into_app_err("credential contains characters not valid in a header")?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Drop the cached token so the next request mints a new one.
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Scrub the current secret and credential-shaped substrings from `text`.
    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        let cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        let secrets: Vec<&str> = cached.iter().map(AccessToken::secret).collect();
        scrub(text, &secrets)
    }
}
