//! Upstream response shapes.
//!
//! Everything here mirrors the JSON the API returns, with every field optional.
//! Required fields are checked by the normalizer, not by serde, so a missing
//! field produces a descriptive error instead of a generic decode failure.
//! Graph-shaped nodes convert into the same raw records as the resource
//! listings so the normalizer only has one path per entity.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLabel {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRef {
    #[serde(rename = "ref")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPullRequest {
    pub number: Option<u64>,
    pub state: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub base: Option<RawRef>,
    pub head: Option<RawRef>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
    pub changed_files: Option<u64>,
    #[serde(default)]
    pub labels: Vec<RawLabel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWorkflowRun {
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub head_branch: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWorkflowRuns {
    #[serde(default)]
    pub workflow_runs: Vec<RawWorkflowRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDeployment {
    pub id: Option<u64>,
    pub environment: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,

    /// Only present in graph-shaped responses; resource listings need a second call.
    #[serde(skip)]
    pub latest_state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDeploymentStatus {
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIssue {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<RawLabel>,

    /// Present when the "issue" is actually a pull request.
    pub pull_request: Option<serde_json::Value>,
}

impl RawIssue {
    #[must_use]
    pub const fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReview {
    pub state: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSignature {
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCommitData {
    pub committer: Option<RawSignature>,
    pub author: Option<RawSignature>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCommit {
    pub sha: Option<String>,
    pub commit: Option<RawCommitData>,
}

impl RawCommit {
    /// Committer date, falling back to the author date.
    #[must_use]
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        let data = self.commit.as_ref()?;
        data.committer
            .as_ref()
            .and_then(|s| s.date)
            .or_else(|| data.author.as_ref().and_then(|s| s.date))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIssueRef {
    pub number: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEventSource {
    pub issue: Option<RawIssueRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTimelineEvent {
    pub event: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub source: Option<RawEventSource>,
}

/// Review, commit and timeline listings for one pull request.
#[derive(Debug, Clone, Default)]
pub struct RawDetail {
    pub reviews: Vec<RawReview>,
    pub commits: Vec<RawCommit>,
    pub timeline: Vec<RawTimelineEvent>,

    /// One of the listings stopped early.
    pub incomplete: bool,
}

// Graph-shaped nodes

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlPageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlConnection<N> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<N>>,
    #[serde(default)]
    pub page_info: GqlPageInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GqlLabels {
    #[serde(default)]
    pub nodes: Vec<RawLabel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlPullRequest {
    pub number: Option<u64>,
    pub state: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub base_ref_name: Option<String>,
    pub head_ref_name: Option<String>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
    pub changed_files: Option<u64>,
    #[serde(default)]
    pub labels: GqlLabels,
}

impl From<GqlPullRequest> for RawPullRequest {
    fn from(node: GqlPullRequest) -> Self {
        Self {
            number: node.number,
            state: node.state,
            title: node.title,
            body: node.body,
            created_at: node.created_at,
            updated_at: node.updated_at,
            merged_at: node.merged_at,
            closed_at: node.closed_at,
            base: Some(RawRef { name: node.base_ref_name }),
            head: Some(RawRef { name: node.head_ref_name }),
            additions: node.additions,
            deletions: node.deletions,
            changed_files: node.changed_files,
            labels: node.labels.nodes,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlDeploymentStatus {
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlDeployment {
    pub database_id: Option<u64>,
    pub environment: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub latest_status: Option<GqlDeploymentStatus>,
}

impl From<GqlDeployment> for RawDeployment {
    fn from(node: GqlDeployment) -> Self {
        Self {
            id: node.database_id,
            environment: node.environment,
            created_at: node.created_at,
            updated_at: node.updated_at,
            latest_state: node.latest_status.and_then(|s| s.state),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlIssue {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: GqlLabels,
}

impl From<GqlIssue> for RawIssue {
    fn from(node: GqlIssue) -> Self {
        Self {
            number: node.number,
            title: node.title,
            created_at: node.created_at,
            closed_at: node.closed_at,
            labels: node.labels.nodes,
            pull_request: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlReview {
    pub state: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlCommitData {
    pub oid: Option<String>,
    pub committed_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GqlCommit {
    pub commit: Option<GqlCommitData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GqlSourceIssue {
    pub number: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlTimelineItem {
    #[serde(rename = "__typename")]
    pub typename: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub source: Option<GqlSourceIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GqlNodes<N> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<N>>,
}

impl<N> Default for GqlNodes<N> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlPullRequestDetail {
    #[serde(default)]
    pub reviews: GqlNodes<GqlReview>,
    #[serde(default)]
    pub commits: GqlNodes<GqlCommit>,
    #[serde(default)]
    pub timeline_items: GqlNodes<GqlTimelineItem>,
}

/// Map a timeline item type name to the resource-style event name.
fn event_name(typename: &str) -> String {
    match typename {
        "CrossReferencedEvent" => "cross-referenced".to_string(),
        "ReadyForReviewEvent" => "ready_for_review".to_string(),
        "ReviewRequestedEvent" => "review_requested".to_string(),
        other => other.to_string(),
    }
}

impl From<GqlPullRequestDetail> for RawDetail {
    fn from(node: GqlPullRequestDetail) -> Self {
        Self {
            incomplete: false,
            reviews: node
                .reviews
                .nodes
                .into_iter()
                .flatten()
                .map(|r| RawReview {
                    state: r.state,
                    submitted_at: r.submitted_at,
                })
                .collect(),
            commits: node
                .commits
                .nodes
                .into_iter()
                .flatten()
                .filter_map(|c| c.commit)
                .map(|c| RawCommit {
                    sha: c.oid,
                    commit: Some(RawCommitData {
                        committer: Some(RawSignature { date: c.committed_date }),
                        author: None,
                    }),
                })
                .collect(),
            timeline: node
                .timeline_items
                .nodes
                .into_iter()
                .flatten()
                .map(|item| RawTimelineEvent {
                    event: item.typename.as_deref().map(event_name),
                    created_at: item.created_at,
                    source: item.source.map(|s| RawEventSource {
                        issue: Some(RawIssueRef { number: s.number }),
                    }),
                })
                .collect(),
        }
    }
}
