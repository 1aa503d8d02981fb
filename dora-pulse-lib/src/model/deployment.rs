use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Outcome of a deployment or deployment workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DeploymentStatus {
    Success,
    Failure,
    /// Queued, in progress, or waiting for approval.
    Pending,
    /// Cancelled, skipped, superseded, or anything else that is neither success nor failure.
    Neutral,
}

impl DeploymentStatus {
    /// Map an upstream deployment state or workflow-run conclusion.
    #[must_use]
    pub fn from_upstream(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "success" | "active" => Self::Success,
            "failure" | "error" | "timed_out" | "startup_failure" => Self::Failure,
            "pending" | "queued" | "in_progress" | "waiting" | "requested" => Self::Pending,
            _ => Self::Neutral,
        }
    }

    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// Which upstream listing a deployment record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentOrigin {
    Deployment,
    WorkflowRun,
}

/// A deployment, either from the deployments API or from a deployment workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Environment name for deployments, workflow name for workflow runs.
    pub environment: String,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub origin: DeploymentOrigin,
}
