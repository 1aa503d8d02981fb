use super::ProviderResult;
use super::hosting::{DeliverySource, Source};
use super::normalize::{self, EnvironmentFilter};
use super::resilient_http::FetchError;
use crate::model::{Deployment, Issue, PullRequest, PullRequestDetail, ReportPeriod, Repository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use strum::{Display, EnumString};

const LOG_TARGET: &str = " collector";

/// Which upstream listing counts as deployments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeploymentSource {
    #[default]
    Deployments,
    WorkflowRuns,
}

/// What to collect for each repository.
#[derive(Debug, Clone)]
pub struct CollectSettings {
    pub period: ReportPeriod,
    pub deployment_source: DeploymentSource,
    pub environment: EnvironmentFilter,
    pub incident_labels: Vec<String>,

    /// Fetch reviews, commits and timelines for pull requests merged in the period.
    pub extended_metrics: bool,
}

/// Everything fetched for one repository in one run.
#[derive(Debug, Clone)]
pub struct RepoSnapshot {
    pub repository: Repository,

    /// Every fetched pull request, including those outside the period, so chains can be followed.
    pub pull_requests: Vec<PullRequest>,

    /// Deployments created within the period.
    pub deployments: Vec<Deployment>,

    /// Units of work closed within the period.
    pub issues: Vec<Issue>,

    /// Incident-labelled issues opened within the period.
    pub incidents: Vec<Issue>,

    pub details: HashMap<u64, PullRequestDetail>,

    /// Some listing stopped early, so metrics built from this snapshot may undercount.
    pub incomplete: bool,
}

impl RepoSnapshot {
    #[must_use]
    pub fn empty(repository: Repository) -> Self {
        Self {
            repository,
            pull_requests: Vec::new(),
            deployments: Vec::new(),
            issues: Vec::new(),
            incidents: Vec::new(),
            details: HashMap::new(),
            incomplete: false,
        }
    }
}

/// Collects per-repository snapshots, one repository at a time.
#[derive(Debug)]
pub struct Collector<S = Source> {
    source: S,
    settings: CollectSettings,
}

impl<S: DeliverySource> Collector<S> {
    pub const fn new(source: S, settings: CollectSettings) -> Self {
        Self { source, settings }
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Collect every repository. A failure only affects the repository it happened in.
    pub async fn collect(&self, repositories: &[Repository]) -> Vec<(Repository, ProviderResult<RepoSnapshot>)> {
        let mut results = Vec::with_capacity(repositories.len());

        for repo in repositories {
            log::info!(target: LOG_TARGET, "Collecting delivery data for '{repo}'");

            let result = match self.snapshot(repo).await {
                Ok(snapshot) => {
                    if snapshot.incomplete {
                        log::warn!(target: LOG_TARGET, "Data for '{repo}' is incomplete; metrics will be flagged as partial");
                    }
                    ProviderResult::Found(snapshot)
                }
                Err(e) => {
                    log::error!(target: LOG_TARGET, "Skipping '{repo}': {e}");
                    ProviderResult::Error(Arc::new(ohno::app_err!("could not collect data for '{repo}': {e}")))
                }
            };

            results.push((repo.clone(), result));
        }

        results
    }

    /// Collect one repository.
    pub async fn snapshot(&self, repo: &Repository) -> Result<RepoSnapshot, FetchError> {
        let period = &self.settings.period;
        let mut incomplete = false;

        let pull_requests = self.source.pull_requests(repo).await?;
        incomplete |= pull_requests.incomplete;

        let deployments = match self.settings.deployment_source {
            DeploymentSource::Deployments => {
                self.source
                    .deployments(repo, &self.settings.environment, period.start)
                    .await?
            }
            DeploymentSource::WorkflowRuns => {
                let mut runs = self.source.workflow_runs(repo, period.start).await?;
                runs.items = self.settings.environment.apply(runs.items);
                runs
            }
        };
        incomplete |= deployments.incomplete;

        let issues = self.source.issues(repo, &[], period.start).await?;
        incomplete |= issues.incomplete;

        let incidents = if self.settings.incident_labels.is_empty() {
            Vec::new()
        } else {
            let incidents = self.source.issues(repo, &self.settings.incident_labels, period.start).await?;
            incomplete |= incidents.incomplete;
            normalize::within_window(incidents.items, period, |i| i.created_at)
        };

        let mut details = HashMap::new();
        if self.settings.extended_metrics {
            let merged = pull_requests
                .items
                .iter()
                .filter(|pr| pr.merged_at.is_some_and(|at| period.contains(at)));

            for pr in merged {
                match self.source.pull_request_detail(repo, pr.number).await {
                    Ok(detail) => {
                        if detail.incomplete {
                            log::warn!(target: LOG_TARGET, "Details of pull request #{} in '{repo}' are incomplete", pr.number);
                            incomplete = true;
                        }
                        let _ = details.insert(pr.number, detail);
                    }
                    Err(e) => {
                        log::warn!(target: LOG_TARGET, "Could not fetch details of pull request #{} in '{repo}': {e}", pr.number);
                        incomplete = true;
                    }
                }
            }
        }

        Ok(RepoSnapshot {
            repository: repo.clone(),
            pull_requests: pull_requests.items,
            deployments: normalize::within_window(deployments.items, period, |d| d.created_at),
            issues: issues
                .items
                .into_iter()
                .filter(|i| i.closed_at.is_some_and(|at| period.contains(at)))
                .collect(),
            incidents,
            details,
            incomplete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::pagination::Paginated;
    use crate::model::{DeploymentOrigin, DeploymentStatus, PrState};
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().to_utc()
    }

    fn complete<T>(items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            pages: 1,
            incomplete: false,
        }
    }

    fn pr(number: u64, merged_at: &str) -> PullRequest {
        PullRequest {
            number,
            state: PrState::Closed,
            title: String::new(),
            body: None,
            created_at: ts("2024-01-01T00:00:00Z"),
            updated_at: None,
            merged_at: Some(ts(merged_at)),
            closed_at: None,
            base_branch: "main".into(),
            head_branch: format!("feature-{number}"),
            additions: None,
            deletions: None,
            changed_files: None,
            labels: Vec::new(),
        }
    }

    fn issue(number: u64, created_at: &str, closed_at: Option<&str>, labels: &[&str]) -> Issue {
        Issue {
            number,
            title: String::new(),
            created_at: ts(created_at),
            closed_at: closed_at.map(ts),
            labels: labels.iter().map(ToString::to_string).collect(),
        }
    }

    /// Canned listings; detail lookups for `broken_detail` fail and `truncated_detail` come back partial.
    struct FakeSource {
        pull_requests: Vec<PullRequest>,
        deployments: Vec<Deployment>,
        issues: Vec<Issue>,
        truncated_issues: bool,
        broken_detail: Option<u64>,
        truncated_detail: Option<u64>,
        fail_pull_requests: bool,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                pull_requests: vec![pr(1, "2024-01-10T00:00:00Z"), pr(2, "2023-12-01T00:00:00Z")],
                deployments: vec![
                    Deployment {
                        environment: "production".into(),
                        status: DeploymentStatus::Success,
                        created_at: ts("2024-01-11T00:00:00Z"),
                        updated_at: ts("2024-01-11T00:05:00Z"),
                        origin: DeploymentOrigin::Deployment,
                    },
                    Deployment {
                        environment: "production".into(),
                        status: DeploymentStatus::Success,
                        created_at: ts("2023-11-01T00:00:00Z"),
                        updated_at: ts("2023-11-01T00:05:00Z"),
                        origin: DeploymentOrigin::Deployment,
                    },
                ],
                issues: vec![
                    issue(10, "2024-01-02T00:00:00Z", Some("2024-01-12T00:00:00Z"), &[]),
                    issue(11, "2024-01-02T00:00:00Z", None, &[]),
                    issue(12, "2023-12-20T00:00:00Z", Some("2024-01-03T00:00:00Z"), &["incident"]),
                    issue(13, "2024-01-05T00:00:00Z", Some("2024-01-05T04:00:00Z"), &["incident"]),
                ],
                truncated_issues: false,
                broken_detail: None,
                truncated_detail: None,
                fail_pull_requests: false,
            }
        }
    }

    impl DeliverySource for FakeSource {
        async fn pull_requests(&self, _repo: &Repository) -> Result<Paginated<PullRequest>, FetchError> {
            if self.fail_pull_requests {
                return Err(FetchError::Permanent {
                    status: 404,
                    body: "Not Found".into(),
                });
            }
            Ok(complete(self.pull_requests.clone()))
        }

        async fn workflow_runs(&self, _repo: &Repository, _since: DateTime<Utc>) -> Result<Paginated<Deployment>, FetchError> {
            Ok(complete(Vec::new()))
        }

        async fn deployments(
            &self,
            _repo: &Repository,
            environment: &EnvironmentFilter,
            _since: DateTime<Utc>,
        ) -> Result<Paginated<Deployment>, FetchError> {
            Ok(complete(environment.apply(self.deployments.clone())))
        }

        async fn issues(&self, _repo: &Repository, labels: &[String], _since: DateTime<Utc>) -> Result<Paginated<Issue>, FetchError> {
            let items = self
                .issues
                .iter()
                .filter(|i| labels.is_empty() || i.labels.iter().any(|l| labels.contains(l)))
                .cloned()
                .collect();

            Ok(Paginated {
                items,
                pages: 1,
                incomplete: self.truncated_issues,
            })
        }

        async fn pull_request_detail(&self, _repo: &Repository, number: u64) -> Result<PullRequestDetail, FetchError> {
            if self.broken_detail == Some(number) {
                return Err(FetchError::malformed("broken"));
            }
            Ok(PullRequestDetail {
                number,
                incomplete: self.truncated_detail == Some(number),
                ..PullRequestDetail::default()
            })
        }
    }

    fn settings() -> CollectSettings {
        CollectSettings {
            period: ReportPeriod::new(ts("2024-01-01T00:00:00Z"), ts("2024-02-01T00:00:00Z")),
            deployment_source: DeploymentSource::Deployments,
            environment: EnvironmentFilter::any(),
            incident_labels: vec!["incident".into()],
            extended_metrics: true,
        }
    }

    fn repo() -> Repository {
        Repository::parse("acme/api").unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_applies_period() {
        let collector = Collector::new(FakeSource::new(), settings());
        let snapshot = collector.snapshot(&repo()).await.unwrap();

        // Every pull request is kept so chains can reach back before the period.
        assert_eq!(snapshot.pull_requests.len(), 2);
        assert_eq!(snapshot.deployments.len(), 1);

        let closed: Vec<_> = snapshot.issues.iter().map(|i| i.number).collect();
        assert_eq!(closed, vec![10, 12, 13]);

        let incidents: Vec<_> = snapshot.incidents.iter().map(|i| i.number).collect();
        assert_eq!(incidents, vec![13]);

        // Details only for pull requests merged in the period.
        assert_eq!(snapshot.details.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert!(!snapshot.incomplete);
    }

    #[tokio::test]
    async fn test_failed_detail_marks_snapshot_incomplete() {
        let source = FakeSource {
            broken_detail: Some(1),
            ..FakeSource::new()
        };

        let snapshot = Collector::new(source, settings()).snapshot(&repo()).await.unwrap();
        assert!(snapshot.details.is_empty());
        assert!(snapshot.incomplete);
    }

    #[tokio::test]
    async fn test_truncated_detail_marks_snapshot_incomplete() {
        let source = FakeSource {
            truncated_detail: Some(1),
            ..FakeSource::new()
        };

        let snapshot = Collector::new(source, settings()).snapshot(&repo()).await.unwrap();
        assert!(snapshot.details.contains_key(&1));
        assert!(snapshot.incomplete);
    }

    #[tokio::test]
    async fn test_truncated_listing_marks_snapshot_incomplete() {
        let source = FakeSource {
            truncated_issues: true,
            ..FakeSource::new()
        };

        let snapshot = Collector::new(source, settings()).snapshot(&repo()).await.unwrap();
        assert!(snapshot.incomplete);
    }

    #[tokio::test]
    async fn test_extended_metrics_off_skips_details() {
        let collector = Collector::new(
            FakeSource::new(),
            CollectSettings {
                extended_metrics: false,
                ..settings()
            },
        );

        let snapshot = collector.snapshot(&repo()).await.unwrap();
        assert!(snapshot.details.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_repository() {
        let source = FakeSource {
            fail_pull_requests: true,
            ..FakeSource::new()
        };

        let results = Collector::new(source, settings()).collect(&[repo()]).await;
        assert_eq!(results.len(), 1);

        let ProviderResult::Error(e) = &results[0].1 else {
            panic!("expected a failure");
        };
        assert!(e.to_string().contains("acme/api"));
        assert!(e.to_string().contains("404"));
    }
}
