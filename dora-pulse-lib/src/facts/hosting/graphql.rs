//! Structured-query protocol family.
//!
//! Each listing is one query walked by `pageInfo.endCursor`. Related fields
//! (labels, sizes, latest deployment status, reviews, commits, timeline) come
//! back in the same round trip. Workflow runs have no query equivalent and are
//! served by the resource-oriented source this one wraps.

use super::DeliverySource;
use super::rest::{RestSource, format_since};
use super::wire::{GqlConnection, GqlDeployment, GqlIssue, GqlPullRequest, GqlPullRequestDetail, RawDeployment, RawDetail, RawIssue, RawPullRequest};
use crate::facts::normalize::{self, EnvironmentFilter};
use crate::facts::pagination::{Page, PageCursor, PageSource, Paginated, paginate};
use crate::facts::resilient_http::{FetchError, FetchRequest};
use crate::model::{Deployment, Issue, PullRequest, PullRequestDetail, Repository};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

/// Upper bound on the nested review, commit and timeline lists fetched per pull request.
const DETAIL_ITEMS: u32 = 100;

const PULL_REQUESTS_QUERY: &str = "
query($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    pullRequests(first: $first, after: $after, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes {
        number state title body createdAt updatedAt mergedAt closedAt
        baseRefName headRefName additions deletions changedFiles
        labels(first: 20) { nodes { name } }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}";

const DEPLOYMENTS_QUERY: &str = "
query($owner: String!, $name: String!, $first: Int!, $after: String, $environments: [String!]) {
  repository(owner: $owner, name: $name) {
    deployments(first: $first, after: $after, environments: $environments, orderBy: {field: CREATED_AT, direction: DESC}) {
      nodes {
        databaseId environment createdAt updatedAt
        latestStatus { state }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}";

const ISSUES_QUERY: &str = "
query($owner: String!, $name: String!, $first: Int!, $after: String, $labels: [String!], $since: DateTime) {
  repository(owner: $owner, name: $name) {
    issues(first: $first, after: $after, labels: $labels, filterBy: {since: $since}, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes {
        number title createdAt closedAt
        labels(first: 20) { nodes { name } }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}";

const PULL_REQUEST_DETAIL_QUERY: &str = "
query($owner: String!, $name: String!, $number: Int!, $first: Int!) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      reviews(first: $first) { nodes { state submittedAt } }
      commits(first: $first) { nodes { commit { oid committedDate } } }
      timelineItems(first: $first, itemTypes: [CROSS_REFERENCED_EVENT, READY_FOR_REVIEW_EVENT, REVIEW_REQUESTED_EVENT]) {
        nodes {
          __typename
          ... on CrossReferencedEvent { createdAt source { ... on Issue { number } } }
          ... on ReadyForReviewEvent { createdAt }
          ... on ReviewRequestedEvent { createdAt }
        }
      }
    }
  }
}";

#[derive(Debug, Deserialize)]
struct GqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GqlError>,
}

/// Structured-query source.
#[derive(Debug)]
pub struct GraphqlSource {
    rest: RestSource,
    endpoint: Url,
}

impl GraphqlSource {
    #[must_use]
    pub const fn new(rest: RestSource, endpoint: Url) -> Self {
        Self { rest, endpoint }
    }

    /// The REST family used for listings this protocol lacks.
    #[must_use]
    pub const fn rest(&self) -> &RestSource {
        &self.rest
    }

    /// Post one query and return the value at `pointer` inside `data`.
    async fn query(&self, query: &str, variables: Value, pointer: &str) -> Result<Value, FetchError> {
        let request = FetchRequest::post_json(self.endpoint.clone(), json!({ "query": query, "variables": variables }));
        let envelope: Envelope = self.rest.client().fetch(&request).await?.json()?;

        if !envelope.errors.is_empty() {
            let messages: Vec<_> = envelope.errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::malformed(format!("query returned errors: {}", messages.join("; "))));
        }

        envelope
            .data
            .and_then(|mut data| data.pointer_mut(pointer).map(Value::take))
            .filter(|v| !v.is_null())
            .ok_or_else(|| FetchError::malformed(format!("response has no value at '{pointer}'")))
    }

    fn listing<N>(&self, query: &'static str, variables: Value, pointer: &'static str) -> GraphqlListing<'_, N> {
        GraphqlListing {
            source: self,
            query,
            variables,
            pointer,
            page_size: self.rest.limits().page_size,
            _node: core::marker::PhantomData,
        }
    }

    async fn fetch_all<N: DeserializeOwned>(&self, listing: GraphqlListing<'_, N>, what: &str) -> Result<Paginated<N>, FetchError> {
        paginate(&listing, PageCursor::After(None), self.rest.limits().max_pages, what).await
    }
}

/// A connection walked by cursor.
struct GraphqlListing<'a, N> {
    source: &'a GraphqlSource,
    query: &'static str,
    variables: Value,
    pointer: &'static str,
    page_size: u32,
    _node: core::marker::PhantomData<N>,
}

impl<N: DeserializeOwned> PageSource for GraphqlListing<'_, N> {
    type Item = N;

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<Page<N>, FetchError> {
        let PageCursor::After(after) = cursor else {
            return Err(FetchError::malformed("query listings are paged by cursor"));
        };

        let mut variables = self.variables.clone();
        variables["first"] = json!(self.page_size);
        variables["after"] = json!(after);

        let connection: GqlConnection<N> = serde_json::from_value(self.source.query(self.query, variables, self.pointer).await?)
            .map_err(|e| FetchError::malformed(format!("could not decode connection: {e}")))?;

        let next = match (connection.page_info.has_next_page, connection.page_info.end_cursor) {
            (true, Some(end)) => Some(PageCursor::After(Some(end))),
            _ => None,
        };

        Ok(Page {
            items: connection.nodes.into_iter().flatten().collect(),
            next,
        })
    }
}

fn normalized<N, R, T>(paginated: Paginated<N>, map: fn(R) -> Result<T, FetchError>) -> Result<Paginated<T>, FetchError>
where
    R: From<N>,
{
    Ok(Paginated {
        items: paginated
            .items
            .into_iter()
            .map(|n| map(R::from(n)))
            .collect::<Result<_, _>>()?,
        pages: paginated.pages,
        incomplete: paginated.incomplete,
    })
}

fn repo_variables(repo: &Repository) -> Value {
    json!({ "owner": repo.owner(), "name": repo.name() })
}

impl DeliverySource for GraphqlSource {
    async fn pull_requests(&self, repo: &Repository) -> Result<Paginated<PullRequest>, FetchError> {
        let listing = self.listing::<GqlPullRequest>(PULL_REQUESTS_QUERY, repo_variables(repo), "/repository/pullRequests");
        let nodes = self.fetch_all(listing, &format!("pull requests of '{repo}'")).await?;
        normalized::<_, RawPullRequest, _>(nodes, normalize::pull_request)
    }

    async fn workflow_runs(&self, repo: &Repository, since: DateTime<Utc>) -> Result<Paginated<Deployment>, FetchError> {
        self.rest.workflow_runs(repo, since).await
    }

    async fn deployments(
        &self,
        repo: &Repository,
        environment: &EnvironmentFilter,
        since: DateTime<Utc>,
    ) -> Result<Paginated<Deployment>, FetchError> {
        let mut variables = repo_variables(repo);
        variables["environments"] = environment.server_side().map_or(Value::Null, |name| json!([name]));

        let listing = self.listing::<GqlDeployment>(DEPLOYMENTS_QUERY, variables, "/repository/deployments");
        let mut nodes = self.fetch_all(listing, &format!("deployments of '{repo}'")).await?;
        nodes.items.retain(|d| {
            d.environment.as_deref().is_some_and(|e| environment.matches(e)) && d.created_at.is_none_or(|at| at >= since)
        });

        normalized::<_, RawDeployment, _>(nodes, normalize::deployment)
    }

    async fn issues(&self, repo: &Repository, labels: &[String], since: DateTime<Utc>) -> Result<Paginated<Issue>, FetchError> {
        let mut variables = repo_variables(repo);
        variables["labels"] = if labels.is_empty() { Value::Null } else { json!(labels) };
        variables["since"] = json!(format_since(since));

        let listing = self.listing::<GqlIssue>(ISSUES_QUERY, variables, "/repository/issues");
        let nodes = self.fetch_all(listing, &format!("issues of '{repo}'")).await?;
        normalized::<_, RawIssue, _>(nodes, normalize::issue)
    }

    async fn pull_request_detail(&self, repo: &Repository, number: u64) -> Result<PullRequestDetail, FetchError> {
        let mut variables = repo_variables(repo);
        variables["number"] = json!(number);
        variables["first"] = json!(DETAIL_ITEMS);

        let value = self
            .query(PULL_REQUEST_DETAIL_QUERY, variables, "/repository/pullRequest")
            .await?;
        let node: GqlPullRequestDetail =
            serde_json::from_value(value).map_err(|e| FetchError::malformed(format!("could not decode pull request #{number}: {e}")))?;

        Ok(normalize::detail(number, RawDetail::from(node)))
    }
}
