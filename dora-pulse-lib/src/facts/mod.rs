//! Data retrieval from the source-control hosting API.
//!
//! This module is responsible for getting delivery events out of the hosting
//! API and into the strict entity model of [`crate::model`]. It is layered
//! bottom-up:
//!
//! - **Credentials and redaction**: an explicit `{token, expires_at}` value
//!   minted by a [`CredentialSource`], and scrubbing of secrets from any text
//!   that reaches a log line or a report.
//! - **Resilient fetch client**: bounded retries with exponential backoff for
//!   rate-limited and server-error responses, immediate failure for other
//!   client errors, and a distinct error for transport timeouts.
//! - **Pagination driver**: walks pages or cursors until exhaustion, a page
//!   cap, or an empty page, degrading to a partial result when a later page
//!   fails.
//! - **Protocol sources**: a resource-oriented family and a structured-query
//!   family behind the same [`DeliverySource`] trait.
//! - **Normalizer**: validates and maps upstream shapes, and applies the
//!   label, environment, branch and date filters.
//!
//! The [`Collector`] drives all of this for one repository at a time and wraps
//! each outcome in a [`ProviderResult`], so one repository failing never
//! prevents the others from being reported.

mod collector;
mod credentials;
pub mod hosting;
pub mod normalize;
pub mod pagination;
mod provider_result;
mod redact;
pub mod resilient_http;

pub use collector::{CollectSettings, Collector, DeploymentSource, RepoSnapshot};
pub use credentials::{AccessToken, CredentialSource, Credentials, StaticCredential};
pub use hosting::{DeliverySource, Endpoints, GraphqlSource, ProtocolMode, RestSource, Source};
pub use normalize::{EnvironmentFilter, MatchMode};
pub use pagination::{PageLimits, Paginated};
pub use provider_result::ProviderResult;
pub use redact::{REDACTED, redact};
pub use resilient_http::{FetchClient, FetchError, RetryPolicy};
