//! Mapping from upstream shapes to the entity model, and the filters applied on top.
//!
//! Every mapper validates the fields the rest of the pipeline relies on and
//! fails with [`FetchError::Malformed`] when one is missing. Optional metadata
//! such as pull-request size stays `None` when absent.

use super::hosting::wire::{RawDeployment, RawDetail, RawIssue, RawLabel, RawPullRequest, RawWorkflowRun};
use super::resilient_http::FetchError;
use crate::model::{
    Commit, Deployment, DeploymentOrigin, DeploymentStatus, Issue, Labeled, PrState, PullRequest, PullRequestDetail,
    ReportPeriod, Review, ReviewState, TimelineEvent,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

fn required<T>(value: Option<T>, entity: &str, field: &str) -> Result<T, FetchError> {
    value.ok_or_else(|| FetchError::malformed(format!("{entity} record is missing required field '{field}'")))
}

fn label_names(labels: Vec<RawLabel>) -> Vec<String> {
    labels.into_iter().filter_map(|l| l.name).collect()
}

fn pr_state(value: &str) -> Result<PrState, FetchError> {
    match value.to_ascii_lowercase().as_str() {
        "open" => Ok(PrState::Open),
        "closed" | "merged" => Ok(PrState::Closed),
        other => Err(FetchError::malformed(format!("unknown pull request state '{other}'"))),
    }
}

pub fn pull_request(raw: RawPullRequest) -> Result<PullRequest, FetchError> {
    let number = required(raw.number, "pull request", "number")?;
    let entity = format!("pull request #{number}");

    Ok(PullRequest {
        number,
        state: pr_state(&required(raw.state, &entity, "state")?)?,
        title: raw.title.unwrap_or_default(),
        body: raw.body,
        created_at: required(raw.created_at, &entity, "created_at")?,
        updated_at: raw.updated_at,
        merged_at: raw.merged_at,
        closed_at: raw.closed_at,
        base_branch: required(raw.base.and_then(|r| r.name), &entity, "base.ref")?,
        head_branch: required(raw.head.and_then(|r| r.name), &entity, "head.ref")?,
        additions: raw.additions,
        deletions: raw.deletions,
        changed_files: raw.changed_files,
        labels: label_names(raw.labels),
    })
}

/// A workflow run counts as a deployment of the environment named after its workflow.
pub fn workflow_run(raw: RawWorkflowRun) -> Result<Deployment, FetchError> {
    let created_at = required(raw.created_at, "workflow run", "created_at")?;

    let status = match raw.status.as_deref() {
        Some("completed") => raw
            .conclusion
            .as_deref()
            .map_or(DeploymentStatus::Neutral, DeploymentStatus::from_upstream),
        _ => DeploymentStatus::Pending,
    };

    Ok(Deployment {
        environment: raw.name.unwrap_or_default(),
        status,
        created_at,
        updated_at: raw.updated_at.unwrap_or(created_at),
        origin: DeploymentOrigin::WorkflowRun,
    })
}

pub fn deployment(raw: RawDeployment) -> Result<Deployment, FetchError> {
    let created_at = required(raw.created_at, "deployment", "created_at")?;

    Ok(Deployment {
        environment: required(raw.environment, "deployment", "environment")?,
        status: raw
            .latest_state
            .as_deref()
            .map_or(DeploymentStatus::Pending, DeploymentStatus::from_upstream),
        created_at,
        updated_at: raw.updated_at.unwrap_or(created_at),
        origin: DeploymentOrigin::Deployment,
    })
}

pub fn issue(raw: RawIssue) -> Result<Issue, FetchError> {
    let number = required(raw.number, "issue", "number")?;

    Ok(Issue {
        number,
        title: raw.title.unwrap_or_default(),
        created_at: required(raw.created_at, &format!("issue #{number}"), "created_at")?,
        closed_at: raw.closed_at,
        labels: label_names(raw.labels),
    })
}

fn review_state(value: &str) -> ReviewState {
    match value.to_ascii_uppercase().as_str() {
        "APPROVED" => ReviewState::Approved,
        "CHANGES_REQUESTED" => ReviewState::ChangesRequested,
        "DISMISSED" => ReviewState::Dismissed,
        "PENDING" => ReviewState::Pending,
        _ => ReviewState::Commented,
    }
}

pub fn detail(number: u64, raw: RawDetail) -> PullRequestDetail {
    PullRequestDetail {
        number,
        incomplete: raw.incomplete,
        reviews: raw
            .reviews
            .into_iter()
            .map(|r| Review {
                state: r.state.as_deref().map_or(ReviewState::Commented, review_state),
                submitted_at: r.submitted_at,
            })
            .collect(),
        commits: raw
            .commits
            .into_iter()
            .map(|c| Commit {
                committed_at: c.committed_at(),
                sha: c.sha.unwrap_or_default(),
            })
            .collect(),
        timeline: raw
            .timeline
            .into_iter()
            .map(|e| TimelineEvent {
                kind: e.event.unwrap_or_default(),
                created_at: e.created_at,
                source_issue: e.source.and_then(|s| s.issue).and_then(|i| i.number),
            })
            .collect(),
    }
}

/// Drop every item carrying any of the `exclude` labels. Applying it twice is the same as once.
pub fn without_excluded_labels<T: Labeled>(items: Vec<T>, exclude: &[String]) -> Vec<T> {
    if exclude.is_empty() {
        return items;
    }

    items.into_iter().filter(|item| !item.has_any_label(exclude)).collect()
}

/// Client-side date filter for listings the upstream cannot filter server-side.
pub fn within_window<T>(items: Vec<T>, period: &ReportPeriod, at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.into_iter().filter(|item| period.contains(at(item))).collect()
}

/// Whether `branch` contains any excluded base-branch fragment (case-insensitive).
#[must_use]
pub fn is_excluded_base_branch(branch: &str, excluded: &[String]) -> bool {
    let branch = branch.to_ascii_lowercase();
    excluded
        .iter()
        .filter(|e| !e.is_empty())
        .any(|e| branch.contains(&e.to_ascii_lowercase()))
}

/// How an environment name is compared against the configured pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Partial,
}

/// Environment selection for deployments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentFilter {
    pattern: Option<String>,
    mode: MatchMode,
}

impl EnvironmentFilter {
    #[must_use]
    pub fn new(pattern: Option<String>, mode: MatchMode) -> Self {
        Self {
            pattern: pattern.filter(|p| !p.is_empty()),
            mode,
        }
    }

    /// Accept every environment.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// The pattern, when the upstream can apply it server-side (exact matches only).
    #[must_use]
    pub fn server_side(&self) -> Option<&str> {
        match self.mode {
            MatchMode::Exact => self.pattern.as_deref(),
            MatchMode::Partial => None,
        }
    }

    #[must_use]
    pub fn matches(&self, environment: &str) -> bool {
        let Some(pattern) = &self.pattern else {
            return true;
        };

        match self.mode {
            MatchMode::Exact => environment.eq_ignore_ascii_case(pattern),
            MatchMode::Partial => environment.to_ascii_lowercase().contains(&pattern.to_ascii_lowercase()),
        }
    }

    pub fn apply(&self, deployments: Vec<Deployment>) -> Vec<Deployment> {
        deployments.into_iter().filter(|d| self.matches(&d.environment)).collect()
    }
}
