use super::dora::{DoraMetrics, MttrSource};
use super::extended::ExtendedMetrics;
use super::stats::Summary;
use super::tier::Tier;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Repository key used for the organisation-wide rollup.
pub const ORGANIZATION_KEY: &str = "(organization)";

/// Metrics of one repository (or the organisation) over one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoMetrics {
    pub repository: String,
    pub dora: DoraMetrics,
    pub extended: Option<ExtendedMetrics>,
    pub partial_data: bool,
}

/// One flat output row, keyed by `(date, repository)`.
///
/// Counts are stored as numbers with one decimal so weekly averages fit the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub date: NaiveDate,
    pub repository: String,

    /// Some upstream listing was truncated, so values may undercount.
    pub partial_data: bool,

    pub deployment_count: f64,
    pub deployments_per_day: f64,
    pub deployment_frequency_tier: Tier,
    pub lead_time_hours: Option<f64>,
    pub lead_time_tier: Option<Tier>,
    pub change_failure_rate: Option<f64>,
    pub change_failure_rate_tier: Option<Tier>,
    pub mttr_hours: Option<f64>,
    pub mttr_tier: Option<Tier>,
    pub mttr_source: Option<MttrSource>,

    pub units_completed: Option<f64>,
    pub cycle_time_mean_hours: Option<f64>,
    pub cycle_time_median_hours: Option<f64>,
    pub cycle_time_min_hours: Option<f64>,
    pub cycle_time_max_hours: Option<f64>,
    pub coding_time_mean_hours: Option<f64>,
    pub coding_time_median_hours: Option<f64>,
    pub rework_rate: Option<f64>,
    pub review_wait_mean_hours: Option<f64>,
    pub approval_to_merge_mean_hours: Option<f64>,
    pub pr_size_lines_mean: Option<f64>,
    pub pr_size_lines_median: Option<f64>,
    pub pr_size_files_mean: Option<f64>,
}

impl MetricRecord {
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "counts are far below f64 precision limits")]
    pub fn new(date: NaiveDate, metrics: &RepoMetrics) -> Self {
        let dora = &metrics.dora;
        let extended = metrics.extended.as_ref();
        let summary = |pick: fn(&ExtendedMetrics) -> Option<Summary>| extended.and_then(pick);

        Self {
            date,
            repository: metrics.repository.clone(),
            partial_data: metrics.partial_data,
            deployment_count: dora.deployment_count as f64,
            deployments_per_day: dora.deployments_per_day,
            deployment_frequency_tier: dora.deployment_frequency_tier,
            lead_time_hours: dora.lead_time_hours,
            lead_time_tier: dora.lead_time_tier,
            change_failure_rate: dora.change_failure_rate,
            change_failure_rate_tier: dora.change_failure_rate_tier,
            mttr_hours: dora.mttr_hours,
            mttr_tier: dora.mttr_tier,
            mttr_source: dora.mttr_source,
            units_completed: extended.map(|e| e.units_completed as f64),
            cycle_time_mean_hours: summary(|e| e.cycle_time_hours).map(|s| s.mean),
            cycle_time_median_hours: summary(|e| e.cycle_time_hours).map(|s| s.median),
            cycle_time_min_hours: summary(|e| e.cycle_time_hours).map(|s| s.min),
            cycle_time_max_hours: summary(|e| e.cycle_time_hours).map(|s| s.max),
            coding_time_mean_hours: summary(|e| e.coding_time_hours).map(|s| s.mean),
            coding_time_median_hours: summary(|e| e.coding_time_hours).map(|s| s.median),
            rework_rate: extended.and_then(|e| e.rework_rate),
            review_wait_mean_hours: summary(|e| e.review_wait_hours).map(|s| s.mean),
            approval_to_merge_mean_hours: summary(|e| e.approval_to_merge_hours).map(|s| s.mean),
            pr_size_lines_mean: summary(|e| e.pr_size_lines).map(|s| s.mean),
            pr_size_lines_median: summary(|e| e.pr_size_lines).map(|s| s.median),
            pr_size_files_mean: summary(|e| e.pr_size_files).map(|s| s.mean),
        }
    }
}
