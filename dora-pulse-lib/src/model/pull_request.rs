use super::Labeled;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pull-request lifecycle state as reported upstream.
///
/// A merged pull request is `Closed` with a `merged_at` timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
}

/// A pull request, keyed by `(repository, number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub state: PrState,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub base_branch: String,
    pub head_branch: String,

    /// `None` means the listing did not carry size data, which is different from zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_files: Option<u64>,

    #[serde(default)]
    pub labels: Vec<String>,
}

impl PullRequest {
    #[must_use]
    pub const fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }

    /// Total changed lines, when the size was fetched.
    #[must_use]
    pub fn changed_lines(&self) -> Option<u64> {
        Some(self.additions? + self.deletions?)
    }
}

impl Labeled for PullRequest {
    fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Review verdicts relevant to review-efficiency and rework measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub state: ReviewState,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub committed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Upstream event name, e.g. `cross-referenced` or `ready_for_review`.
    pub kind: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Issue referenced by the event, when any.
    pub source_issue: Option<u64>,
}

/// Review, commit and timeline data for a single pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDetail {
    pub number: u64,
    pub reviews: Vec<Review>,
    pub commits: Vec<Commit>,
    pub timeline: Vec<TimelineEvent>,

    /// Some reviews, commits or events may be missing.
    pub incomplete: bool,
}

impl PullRequestDetail {
    /// Timestamp of the earliest submitted review, ignoring pending drafts.
    #[must_use]
    pub fn first_review_at(&self) -> Option<DateTime<Utc>> {
        self.reviews
            .iter()
            .filter(|r| r.state != ReviewState::Pending)
            .filter_map(|r| r.submitted_at)
            .min()
    }

    #[must_use]
    pub fn first_approval_at(&self) -> Option<DateTime<Utc>> {
        self.reviews
            .iter()
            .filter(|r| r.state == ReviewState::Approved)
            .filter_map(|r| r.submitted_at)
            .min()
    }

    /// Number of commits made after the first review was submitted.
    #[must_use]
    pub fn commits_after_first_review(&self) -> usize {
        let Some(first_review) = self.first_review_at() else {
            return 0;
        };

        self.commits
            .iter()
            .filter(|c| c.committed_at.is_some_and(|t| t > first_review))
            .count()
    }
}
