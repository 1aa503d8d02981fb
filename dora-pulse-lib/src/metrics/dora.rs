//! The four DORA metrics.

use super::samples::Samples;
use super::stats::{hours_between, mean, percentage, round1};
use super::tier::Tier;
use crate::model::{Deployment, DeploymentStatus, Issue, PullRequest, ReportPeriod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where a time-to-recovery figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MttrSource {
    /// Open-to-close duration of incident issues.
    Incident,

    /// Failed deployment to the next successful one.
    CiCd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoraMetrics {
    pub deployment_count: usize,
    pub deployments_per_day: f64,
    pub deployment_frequency_tier: Tier,
    pub lead_time_hours: Option<f64>,
    pub lead_time_tier: Option<Tier>,
    pub change_failure_rate: Option<f64>,
    pub change_failure_rate_tier: Option<Tier>,
    pub mttr_hours: Option<f64>,
    pub mttr_tier: Option<Tier>,
    pub mttr_source: Option<MttrSource>,
}

impl DoraMetrics {
    /// Compute from pooled samples. Empty inputs yield zero counts and `None` values.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "deployment counts are far below f64 precision limits")]
    pub fn compute(samples: &Samples, period: &ReportPeriod) -> Self {
        let per_day = samples.finished_deployments as f64 / f64::from(period.days());

        let lead_time_hours = mean(&samples.lead_times);
        let change_failure_rate = percentage(samples.failed_deployments, samples.finished_deployments);

        let (mttr_hours, mttr_source) = if samples.incident_recoveries.is_empty() {
            (mean(&samples.deployment_recoveries), Some(MttrSource::CiCd))
        } else {
            (mean(&samples.incident_recoveries), Some(MttrSource::Incident))
        };

        Self {
            deployment_count: samples.finished_deployments,
            deployments_per_day: round1(per_day),
            deployment_frequency_tier: Tier::deployment_frequency(per_day),
            lead_time_hours,
            lead_time_tier: lead_time_hours.map(Tier::lead_time),
            change_failure_rate,
            change_failure_rate_tier: change_failure_rate.map(Tier::change_failure_rate),
            mttr_hours,
            mttr_tier: mttr_hours.map(Tier::time_to_recovery),
            mttr_source: mttr_source.filter(|_| mttr_hours.is_some()),
        }
    }
}

/// Finished deployments ordered by creation time.
fn finished_in_order(deployments: &[Deployment]) -> Vec<&Deployment> {
    let mut finished: Vec<_> = deployments.iter().filter(|d| d.status.is_finished()).collect();
    finished.sort_by_key(|d| d.created_at);
    finished
}

/// When the first successful deployment created at or after `merged_at` completed.
fn deployed_at(merged_at: DateTime<Utc>, successes: &[&Deployment]) -> Option<DateTime<Utc>> {
    successes
        .iter()
        .find(|d| d.created_at >= merged_at)
        .map(|d| d.updated_at)
}

/// Lead time of each merged pull request, in hours.
///
/// A pull request correlated with a later successful deployment is measured
/// from creation to that deployment; otherwise from creation to merge.
#[must_use]
pub fn lead_times<'a>(pull_requests: impl IntoIterator<Item = &'a PullRequest>, deployments: &[Deployment]) -> Vec<f64> {
    let successes: Vec<_> = finished_in_order(deployments)
        .into_iter()
        .filter(|d| d.status == DeploymentStatus::Success)
        .collect();

    pull_requests
        .into_iter()
        .filter_map(|pr| {
            let merged_at = pr.merged_at?;
            let done = deployed_at(merged_at, &successes).unwrap_or(merged_at);
            Some(hours_between(pr.created_at, done))
        })
        .collect()
}

/// Duration of every failure streak, from its first failure to the next success.
///
/// A streak still open at the end of the period does not count.
#[must_use]
pub fn deployment_recoveries(deployments: &[Deployment]) -> Vec<f64> {
    let mut recoveries = Vec::new();
    let mut failing_since: Option<DateTime<Utc>> = None;

    for deployment in finished_in_order(deployments) {
        match (deployment.status, failing_since) {
            (DeploymentStatus::Failure, None) => failing_since = Some(deployment.created_at),
            (DeploymentStatus::Success, Some(since)) => {
                recoveries.push(hours_between(since, deployment.updated_at));
                failing_since = None;
            }
            _ => {}
        }
    }

    recoveries
}

/// Open-to-close duration of every closed incident, in hours.
#[must_use]
pub fn incident_recoveries(incidents: &[Issue]) -> Vec<f64> {
    incidents.iter().filter_map(Issue::open_hours).collect()
}

/// Count of finished and failed deployments.
#[must_use]
pub fn deployment_outcomes(deployments: &[Deployment]) -> (usize, usize) {
    let finished = deployments.iter().filter(|d| d.status.is_finished()).count();
    let failed = deployments
        .iter()
        .filter(|d| d.status == DeploymentStatus::Failure)
        .count();
    (finished, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeploymentOrigin, PrState};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().to_utc()
    }

    fn deployment(status: DeploymentStatus, created: &str, updated: &str) -> Deployment {
        Deployment {
            environment: "production".into(),
            status,
            created_at: ts(created),
            updated_at: ts(updated),
            origin: DeploymentOrigin::Deployment,
        }
    }

    fn merged_pr(created: &str, merged: &str) -> PullRequest {
        PullRequest {
            number: 1,
            state: PrState::Closed,
            title: String::new(),
            body: None,
            created_at: ts(created),
            updated_at: None,
            merged_at: Some(ts(merged)),
            closed_at: Some(ts(merged)),
            base_branch: "main".into(),
            head_branch: "feature".into(),
            additions: None,
            deletions: None,
            changed_files: None,
            labels: Vec::new(),
        }
    }

    fn period(days: i64) -> ReportPeriod {
        let start = ts("2024-01-01T00:00:00Z");
        ReportPeriod::new(start, start + chrono::TimeDelta::days(days))
    }

    #[test]
    fn test_lead_time_prefers_deployment() {
        let prs = [merged_pr("2024-01-01T00:00:00Z", "2024-01-01T10:00:00Z")];
        let deployments = [
            deployment(DeploymentStatus::Success, "2024-01-01T09:00:00Z", "2024-01-01T09:10:00Z"),
            deployment(DeploymentStatus::Failure, "2024-01-01T11:00:00Z", "2024-01-01T11:05:00Z"),
            deployment(DeploymentStatus::Success, "2024-01-01T12:00:00Z", "2024-01-01T12:00:00Z"),
        ];

        assert_eq!(lead_times(&prs, &deployments), vec![12.0]);
    }

    #[test]
    fn test_lead_time_falls_back_to_merge() {
        let prs = [merged_pr("2024-01-01T00:00:00Z", "2024-01-01T10:00:00Z")];
        let deployments = [deployment(DeploymentStatus::Success, "2024-01-01T09:00:00Z", "2024-01-01T09:10:00Z")];

        assert_eq!(lead_times(&prs, &deployments), vec![10.0]);
        assert_eq!(lead_times(&prs, &[]), vec![10.0]);
    }

    #[test]
    fn test_recovery_streaks() {
        let deployments = [
            deployment(DeploymentStatus::Success, "2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z"),
            deployment(DeploymentStatus::Failure, "2024-01-01T01:00:00Z", "2024-01-01T01:00:00Z"),
            deployment(DeploymentStatus::Failure, "2024-01-01T02:00:00Z", "2024-01-01T02:00:00Z"),
            deployment(DeploymentStatus::Pending, "2024-01-01T02:30:00Z", "2024-01-01T02:30:00Z"),
            deployment(DeploymentStatus::Success, "2024-01-01T04:00:00Z", "2024-01-01T04:00:00Z"),
            deployment(DeploymentStatus::Failure, "2024-01-02T00:00:00Z", "2024-01-02T00:00:00Z"),
        ];

        assert_eq!(deployment_recoveries(&deployments), vec![3.0]);
        assert_eq!(deployment_outcomes(&deployments), (5, 3));
    }

    #[test]
    fn test_incident_mttr_takes_precedence() {
        let samples = Samples {
            deployment_recoveries: vec![10.0],
            incident_recoveries: vec![2.0, 4.0],
            ..Samples::default()
        };

        let metrics = DoraMetrics::compute(&samples, &period(7));
        assert_eq!(metrics.mttr_hours, Some(3.0));
        assert_eq!(metrics.mttr_source, Some(MttrSource::Incident));
        assert_eq!(metrics.mttr_tier, Some(Tier::High));
    }

    #[test]
    fn test_compute_rates() {
        let samples = Samples {
            finished_deployments: 21,
            failed_deployments: 3,
            lead_times: vec![20.0, 30.0],
            deployment_recoveries: vec![0.5],
            ..Samples::default()
        };

        let metrics = DoraMetrics::compute(&samples, &period(14));
        assert_eq!(metrics.deployment_count, 21);
        assert_eq!(metrics.deployments_per_day, 1.5);
        assert_eq!(metrics.deployment_frequency_tier, Tier::Elite);
        assert_eq!(metrics.lead_time_hours, Some(25.0));
        assert_eq!(metrics.lead_time_tier, Some(Tier::Medium));
        assert_eq!(metrics.change_failure_rate, Some(14.3));
        assert_eq!(metrics.change_failure_rate_tier, Some(Tier::Elite));
        assert_eq!(metrics.mttr_source, Some(MttrSource::CiCd));
        assert_eq!(metrics.mttr_tier, Some(Tier::Elite));
    }

    #[test]
    fn test_empty_input_yields_empty_metrics() {
        let metrics = DoraMetrics::compute(&Samples::default(), &period(30));
        assert_eq!(metrics.deployment_count, 0);
        assert_eq!(metrics.deployments_per_day, 0.0);
        assert_eq!(metrics.deployment_frequency_tier, Tier::Low);
        assert_eq!(metrics.lead_time_hours, None);
        assert_eq!(metrics.change_failure_rate, None);
        assert_eq!(metrics.mttr_hours, None);
        assert_eq!(metrics.mttr_source, None);
    }
}
