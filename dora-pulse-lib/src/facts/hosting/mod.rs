//! Protocol families for the source-control API.
//!
//! Both families expose the same listings through [`DeliverySource`]; which
//! one is used is a configuration choice resolved once per run into a
//! [`Source`].

mod graphql;
mod rest;
pub(crate) mod wire;

pub use graphql::GraphqlSource;
pub use rest::RestSource;

use super::normalize::EnvironmentFilter;
use super::pagination::{PageLimits, Paginated};
use super::resilient_http::{FetchClient, FetchError};
use crate::model::{Deployment, Issue, PullRequest, PullRequestDetail, Repository};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

/// Which protocol family to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProtocolMode {
    #[default]
    Rest,
    Graphql,
}

/// Listings every protocol family must provide.
pub trait DeliverySource {
    /// All pull requests, most recently updated first.
    fn pull_requests(&self, repo: &Repository) -> impl Future<Output = Result<Paginated<PullRequest>, FetchError>>;

    /// Workflow runs created at or after `since`, as deployments.
    fn workflow_runs(&self, repo: &Repository, since: DateTime<Utc>) -> impl Future<Output = Result<Paginated<Deployment>, FetchError>>;

    /// Deployments created at or after `since` whose environment passes `environment`.
    fn deployments(
        &self,
        repo: &Repository,
        environment: &EnvironmentFilter,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Paginated<Deployment>, FetchError>>;

    /// Issues updated since `since` carrying any of `labels`, or all issues when `labels` is empty.
    fn issues(
        &self,
        repo: &Repository,
        labels: &[String],
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Paginated<Issue>, FetchError>>;

    /// Reviews, commits and timeline events of one pull request.
    fn pull_request_detail(&self, repo: &Repository, number: u64) -> impl Future<Output = Result<PullRequestDetail, FetchError>>;
}

/// Where the API lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_base_url: Url,
    pub graphql_url: Url,
}

/// The configured protocol family.
#[derive(Debug)]
pub enum Source {
    Rest(RestSource),
    Graphql(GraphqlSource),
}

impl Source {
    #[must_use]
    pub fn new(mode: ProtocolMode, client: FetchClient, endpoints: &Endpoints, limits: PageLimits) -> Self {
        let rest = RestSource::new(client, &endpoints.api_base_url, limits);
        match mode {
            ProtocolMode::Rest => Self::Rest(rest),
            ProtocolMode::Graphql => Self::Graphql(GraphqlSource::new(rest, endpoints.graphql_url.clone())),
        }
    }

    /// The fetch client shared by both families.
    #[must_use]
    pub const fn client(&self) -> &FetchClient {
        match self {
            Self::Rest(s) => s.client(),
            Self::Graphql(s) => s.rest().client(),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ProtocolMode {
        match self {
            Self::Rest(_) => ProtocolMode::Rest,
            Self::Graphql(_) => ProtocolMode::Graphql,
        }
    }
}

impl DeliverySource for Source {
    async fn pull_requests(&self, repo: &Repository) -> Result<Paginated<PullRequest>, FetchError> {
        match self {
            Self::Rest(s) => s.pull_requests(repo).await,
            Self::Graphql(s) => s.pull_requests(repo).await,
        }
    }

    async fn workflow_runs(&self, repo: &Repository, since: DateTime<Utc>) -> Result<Paginated<Deployment>, FetchError> {
        match self {
            Self::Rest(s) => s.workflow_runs(repo, since).await,
            Self::Graphql(s) => s.workflow_runs(repo, since).await,
        }
    }

    async fn deployments(
        &self,
        repo: &Repository,
        environment: &EnvironmentFilter,
        since: DateTime<Utc>,
    ) -> Result<Paginated<Deployment>, FetchError> {
        match self {
            Self::Rest(s) => s.deployments(repo, environment, since).await,
            Self::Graphql(s) => s.deployments(repo, environment, since).await,
        }
    }

    async fn issues(&self, repo: &Repository, labels: &[String], since: DateTime<Utc>) -> Result<Paginated<Issue>, FetchError> {
        match self {
            Self::Rest(s) => s.issues(repo, labels, since).await,
            Self::Graphql(s) => s.issues(repo, labels, since).await,
        }
    }

    async fn pull_request_detail(&self, repo: &Repository, number: u64) -> Result<PullRequestDetail, FetchError> {
        match self {
            Self::Rest(s) => s.pull_request_detail(repo, number).await,
            Self::Graphql(s) => s.pull_request_detail(repo, number).await,
        }
    }
}
