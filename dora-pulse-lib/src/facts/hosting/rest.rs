//! Resource-oriented protocol family: one paginated listing per resource type.

use super::DeliverySource;
use super::wire::{
    RawCommit, RawDeployment, RawDeploymentStatus, RawDetail, RawIssue, RawPullRequest, RawReview, RawTimelineEvent, RawWorkflowRun,
    RawWorkflowRuns,
};
use crate::facts::normalize::{self, EnvironmentFilter};
use crate::facts::pagination::{Page, PageCursor, PageLimits, PageSource, Paginated, paginate};
use crate::facts::resilient_http::{FetchClient, FetchError, FetchRequest, FetchResponse};
use crate::model::{Deployment, Issue, PullRequest, PullRequestDetail, Repository};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;
use url::Url;

const LOG_TARGET: &str = "      rest";

/// Decodes the records of one listing page.
type Decoder<T> = fn(&FetchResponse) -> Result<Vec<T>, FetchError>;

/// A listing walked with `per_page` / `page` query parameters.
struct RestListing<'a, T> {
    client: &'a FetchClient,
    url: Url,
    page_size: u32,
    decode: Decoder<T>,
}

impl<T> PageSource for RestListing<'_, T> {
    type Item = T;

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<Page<T>, FetchError> {
        let PageCursor::Index(index) = cursor else {
            return Err(FetchError::malformed("resource listings are paged by index"));
        };

        let mut url = self.url.clone();
        let _ = url
            .query_pairs_mut()
            .append_pair("per_page", &self.page_size.to_string())
            .append_pair("page", &index.to_string());

        let response = self.client.fetch(&FetchRequest::get(url)).await?;
        let items = (self.decode)(&response)?;
        let next = (!response.is_last_page()).then_some(PageCursor::Index(index + 1));

        Ok(Page { items, next })
    }
}

fn decode_list<T: serde::de::DeserializeOwned>(response: &FetchResponse) -> Result<Vec<T>, FetchError> {
    response.json()
}

fn decode_workflow_runs(response: &FetchResponse) -> Result<Vec<RawWorkflowRun>, FetchError> {
    response.json::<RawWorkflowRuns>().map(|r| r.workflow_runs)
}

fn collect<T, U>(paginated: Paginated<T>, mut map: impl FnMut(T) -> Result<U, FetchError>) -> Result<Paginated<U>, FetchError> {
    Ok(Paginated {
        items: paginated.items.into_iter().map(&mut map).collect::<Result<_, _>>()?,
        pages: paginated.pages,
        incomplete: paginated.incomplete,
    })
}

#[must_use]
pub(crate) fn format_since(since: DateTime<Utc>) -> String {
    since.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Resource-oriented source.
#[derive(Debug)]
pub struct RestSource {
    client: FetchClient,
    api_base: String,
    limits: PageLimits,
}

impl RestSource {
    #[must_use]
    pub fn new(client: FetchClient, api_base: &Url, limits: PageLimits) -> Self {
        Self {
            client,
            api_base: api_base.as_str().trim_end_matches('/').to_string(),
            limits,
        }
    }

    #[must_use]
    pub const fn client(&self) -> &FetchClient {
        &self.client
    }

    #[must_use]
    pub const fn limits(&self) -> PageLimits {
        self.limits
    }

    fn endpoint(&self, repo: &Repository, path: &str) -> Result<Url, FetchError> {
        let url = format!("{}/repos/{}/{}/{path}", self.api_base, repo.owner(), repo.name());
        Url::parse(&url).map_err(|e| FetchError::malformed(format!("invalid endpoint '{url}': {e}")))
    }

    fn listing<T>(&self, url: Url, decode: Decoder<T>) -> RestListing<'_, T> {
        RestListing {
            client: &self.client,
            url,
            page_size: self.limits.page_size,
            decode,
        }
    }

    async fn fetch_all<T>(&self, url: Url, decode: Decoder<T>, what: &str) -> Result<Paginated<T>, FetchError> {
        paginate(&self.listing(url, decode), PageCursor::Index(1), self.limits.max_pages, what).await
    }

    /// Latest status of one deployment, `None` when it has none yet.
    async fn latest_deployment_state(&self, repo: &Repository, id: u64) -> Result<Option<String>, FetchError> {
        let mut url = self.endpoint(repo, &format!("deployments/{id}/statuses"))?;
        let _ = url.query_pairs_mut().append_pair("per_page", "1");

        let statuses: Vec<RawDeploymentStatus> = self.client.fetch(&FetchRequest::get(url)).await?.json()?;
        Ok(statuses.into_iter().next().and_then(|s| s.state))
    }

    async fn labelled_issues(&self, repo: &Repository, label: Option<&str>, since: DateTime<Utc>) -> Result<Paginated<RawIssue>, FetchError> {
        let mut url = self.endpoint(repo, "issues")?;
        {
            let mut query = url.query_pairs_mut();
            let _ = query.append_pair("state", "all").append_pair("since", &format_since(since));
            if let Some(label) = label {
                let _ = query.append_pair("labels", label);
            }
        }

        let what = label.map_or_else(|| format!("issues of '{repo}'"), |l| format!("'{l}' issues of '{repo}'"));
        self.fetch_all(url, decode_list::<RawIssue>, &what).await
    }

    async fn raw_detail(&self, repo: &Repository, number: u64) -> Result<RawDetail, FetchError> {
        let reviews = self
            .fetch_all(self.endpoint(repo, &format!("pulls/{number}/reviews"))?, decode_list::<RawReview>, "reviews")
            .await?;
        let commits = self
            .fetch_all(self.endpoint(repo, &format!("pulls/{number}/commits"))?, decode_list::<RawCommit>, "commits")
            .await?;
        let timeline = self
            .fetch_all(
                self.endpoint(repo, &format!("issues/{number}/timeline"))?,
                decode_list::<RawTimelineEvent>,
                "timeline",
            )
            .await?;

        Ok(RawDetail {
            incomplete: reviews.incomplete || commits.incomplete || timeline.incomplete,
            reviews: reviews.items,
            commits: commits.items,
            timeline: timeline.items,
        })
    }
}

impl DeliverySource for RestSource {
    async fn pull_requests(&self, repo: &Repository) -> Result<Paginated<PullRequest>, FetchError> {
        let mut url = self.endpoint(repo, "pulls")?;
        let _ = url
            .query_pairs_mut()
            .append_pair("state", "all")
            .append_pair("sort", "updated")
            .append_pair("direction", "desc");

        let raw = self
            .fetch_all(url, decode_list::<RawPullRequest>, &format!("pull requests of '{repo}'"))
            .await?;
        collect(raw, normalize::pull_request)
    }

    async fn workflow_runs(&self, repo: &Repository, since: DateTime<Utc>) -> Result<Paginated<Deployment>, FetchError> {
        let mut url = self.endpoint(repo, "actions/runs")?;
        let _ = url
            .query_pairs_mut()
            .append_pair("created", &format!(">={}", since.format("%Y-%m-%d")));

        let raw = self
            .fetch_all(url, decode_workflow_runs, &format!("workflow runs of '{repo}'"))
            .await?;
        collect(raw, normalize::workflow_run)
    }

    async fn deployments(
        &self,
        repo: &Repository,
        environment: &EnvironmentFilter,
        since: DateTime<Utc>,
    ) -> Result<Paginated<Deployment>, FetchError> {
        let mut url = self.endpoint(repo, "deployments")?;
        if let Some(name) = environment.server_side() {
            let _ = url.query_pairs_mut().append_pair("environment", name);
        }

        let mut raw = self
            .fetch_all(url, decode_list::<RawDeployment>, &format!("deployments of '{repo}'"))
            .await?;

        // Each status is a separate request, so drop what falls before the period first.
        raw.items.retain(|d| {
            d.environment.as_deref().is_some_and(|e| environment.matches(e)) && d.created_at.is_none_or(|at| at >= since)
        });

        for deployment in &mut raw.items {
            let Some(id) = deployment.id else { continue };
            match self.latest_deployment_state(repo, id).await {
                Ok(state) => deployment.latest_state = state,
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not fetch status of deployment {id} in '{repo}': {e}");
                    raw.incomplete = true;
                }
            }
        }

        collect(raw, normalize::deployment)
    }

    async fn issues(&self, repo: &Repository, labels: &[String], since: DateTime<Utc>) -> Result<Paginated<Issue>, FetchError> {
        let mut merged = Paginated {
            items: Vec::new(),
            pages: 0,
            incomplete: false,
        };
        let mut seen = HashSet::new();

        let listings: Vec<Option<&str>> = if labels.is_empty() {
            vec![None]
        } else {
            labels.iter().map(|l| Some(l.as_str())).collect()
        };

        for label in listings {
            let listing = self.labelled_issues(repo, label, since).await?;
            merged.pages += listing.pages;
            merged.incomplete |= listing.incomplete;

            for raw in listing.items {
                if raw.is_pull_request() {
                    continue;
                }
                if raw.number.is_some_and(|n| !seen.insert(n)) {
                    continue;
                }
                merged.items.push(raw);
            }
        }

        collect(merged, normalize::issue)
    }

    async fn pull_request_detail(&self, repo: &Repository, number: u64) -> Result<PullRequestDetail, FetchError> {
        Ok(normalize::detail(number, self.raw_detail(repo, number).await?))
    }
}
