//! Supplementary delivery indicators layered on the DORA metrics.

use super::samples::Samples;
use super::stats::{Summary, hours_between, percentage};
use crate::chain::UnitDelivery;
use crate::model::{PullRequest, PullRequestDetail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedMetrics {
    pub units_completed: usize,
    pub units_in_production: usize,
    pub cycle_time_hours: Option<Summary>,
    pub coding_time_hours: Option<Summary>,

    /// Commits pushed after the first review, as a percentage of all commits.
    pub rework_rate: Option<f64>,

    /// Pull-request creation to first review.
    pub review_wait_hours: Option<Summary>,

    /// First approval to merge.
    pub approval_to_merge_hours: Option<Summary>,

    pub pr_size_lines: Option<Summary>,
    pub pr_size_files: Option<Summary>,
}

impl ExtendedMetrics {
    #[must_use]
    pub fn compute(samples: &Samples) -> Self {
        Self {
            units_completed: samples.units_completed,
            units_in_production: samples.units_in_production,
            cycle_time_hours: Summary::of(samples.cycle_times.iter().copied()),
            coding_time_hours: Summary::of(samples.coding_times.iter().copied()),
            rework_rate: percentage(samples.commits_after_review, samples.commits),
            review_wait_hours: Summary::of(samples.review_waits.iter().copied()),
            approval_to_merge_hours: Summary::of(samples.approval_to_merge.iter().copied()),
            pr_size_lines: Summary::of(samples.pr_lines.iter().copied()),
            pr_size_files: Summary::of(samples.pr_files.iter().copied()),
        }
    }
}

/// Add the cycle and coding times of traced units of work.
pub fn add_units(samples: &mut Samples, units: &[UnitDelivery]) {
    samples.units_completed += units.len();
    samples.units_in_production += units.iter().filter(|u| u.result.reached_production()).count();
    samples.cycle_times.extend(units.iter().filter_map(|u| u.cycle_time_hours));
    samples.coding_times.extend(units.iter().filter_map(|u| u.coding_time_hours));
}

/// Add the review, rework and size measurements of one merged pull request.
///
/// Size is only recorded when the listing carried it.
#[expect(clippy::cast_precision_loss, reason = "line and file counts are far below f64 precision limits")]
pub fn add_pull_request(samples: &mut Samples, pr: &PullRequest, detail: Option<&PullRequestDetail>) {
    if let Some(lines) = pr.changed_lines() {
        samples.pr_lines.push(lines as f64);
    }
    if let Some(files) = pr.changed_files {
        samples.pr_files.push(files as f64);
    }

    let Some(detail) = detail else {
        return;
    };

    samples.commits += detail.commits.len();
    samples.commits_after_review += detail.commits_after_first_review();

    if let Some(first_review) = detail.first_review_at() {
        samples.review_waits.push(hours_between(pr.created_at, first_review).max(0.0));
    }

    if let (Some(approved), Some(merged)) = (detail.first_approval_at(), pr.merged_at) {
        samples.approval_to_merge.push(hours_between(approved, merged).max(0.0));
    }
}
