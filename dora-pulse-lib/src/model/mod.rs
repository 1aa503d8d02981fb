//! Strict internal entity model.
//!
//! Upstream JSON is loosely typed and varies between protocol families. The
//! normalizer in [`crate::facts`] maps every response into these types at the
//! boundary, so nothing downstream ever sees a missing required field.
//! Entities live for one run and are discarded afterwards.

mod deployment;
mod issue;
mod period;
mod pull_request;
mod repository;

pub use deployment::{Deployment, DeploymentOrigin, DeploymentStatus};
pub use issue::Issue;
pub use period::ReportPeriod;
pub use pull_request::{Commit, PrState, PullRequest, PullRequestDetail, Review, ReviewState, TimelineEvent};
pub use repository::Repository;

/// Entities that carry upstream labels.
pub trait Labeled {
    fn labels(&self) -> &[String];

    /// Case-insensitive check against a label set.
    fn has_any_label(&self, labels: &[String]) -> bool {
        self.labels()
            .iter()
            .any(|own| labels.iter().any(|l| l.eq_ignore_ascii_case(own)))
    }
}
