//! Turning collected snapshots into per-repository and organization-wide metrics.

use super::dora::{self, DoraMetrics};
use super::extended::{self, ExtendedMetrics};
use super::record::{ORGANIZATION_KEY, RepoMetrics};
use super::samples::Samples;
use crate::chain::{ChainTracker, LinkResolver, ProductionBranch, PullRequestIndex, UnitDelivery};
use crate::facts::RepoSnapshot;
use crate::facts::normalize::{is_excluded_base_branch, without_excluded_labels};
use crate::model::{Labeled, PullRequest, ReportPeriod};
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "aggregator";

/// Labels that remove items from one metric group each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExcludeLabels {
    /// Pull requests left out of lead time, and issues left out of incident recovery.
    pub dora: Vec<String>,

    /// Issues left out of cycle and coding time.
    pub cycle_time: Vec<String>,

    /// Pull requests left out of review, rework and size statistics.
    pub pull_requests: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AggregateSettings {
    pub production_branch: ProductionBranch,
    pub max_hops: usize,
    pub exclude_labels: ExcludeLabels,
    pub excluded_base_branches: Vec<String>,
    pub extended_metrics: bool,
}

/// Turns repository snapshots into metrics.
#[derive(Debug, Clone)]
pub struct Aggregator {
    settings: AggregateSettings,
}

impl Aggregator {
    #[must_use]
    pub const fn new(settings: AggregateSettings) -> Self {
        Self { settings }
    }

    /// A chain tracker over the pull requests of one snapshot.
    #[must_use]
    pub fn tracker<'a>(&self, snapshot: &'a RepoSnapshot) -> ChainTracker<'a> {
        ChainTracker::new(
            PullRequestIndex::new(&snapshot.pull_requests),
            self.settings.production_branch.clone(),
            self.settings.max_hops,
        )
    }

    /// Trace every unit of work in the snapshot that is not excluded from cycle time.
    #[must_use]
    pub fn units(&self, snapshot: &RepoSnapshot) -> Vec<UnitDelivery> {
        let links = LinkResolver::new(&snapshot.pull_requests, snapshot.details.values());
        let tracker = self.tracker(snapshot);

        snapshot
            .issues
            .iter()
            .filter(|issue| !issue.has_any_label(&self.settings.exclude_labels.cycle_time))
            .map(|issue| UnitDelivery::trace(issue, &links, &tracker))
            .collect()
    }

    /// Measure everything one snapshot offers for `period`.
    #[must_use]
    pub fn samples(&self, snapshot: &RepoSnapshot, period: &ReportPeriod) -> Samples {
        let exclude = &self.settings.exclude_labels;
        let merged: Vec<&PullRequest> = snapshot
            .pull_requests
            .iter()
            .filter(|pr| pr.merged_at.is_some_and(|at| period.contains(at)))
            .collect();

        let (finished_deployments, failed_deployments) = dora::deployment_outcomes(&snapshot.deployments);
        let incidents = without_excluded_labels(snapshot.incidents.clone(), &exclude.dora);

        let mut samples = Samples {
            finished_deployments,
            failed_deployments,
            lead_times: dora::lead_times(
                merged.iter().copied().filter(|pr| !pr.has_any_label(&exclude.dora)),
                &snapshot.deployments,
            ),
            deployment_recoveries: dora::deployment_recoveries(&snapshot.deployments),
            incident_recoveries: dora::incident_recoveries(&incidents),
            partial: snapshot.incomplete,
            ..Samples::default()
        };

        if self.settings.extended_metrics {
            extended::add_units(&mut samples, &self.units(snapshot));

            let reviewed = merged.iter().filter(|pr| {
                !pr.has_any_label(&exclude.pull_requests)
                    && !is_excluded_base_branch(&pr.base_branch, &self.settings.excluded_base_branches)
            });

            for pr in reviewed {
                extended::add_pull_request(&mut samples, pr, snapshot.details.get(&pr.number));
            }
        }

        log::debug!(
            target: LOG_TARGET,
            "'{}': {} merged pull requests, {} finished deployments, {} units of work",
            snapshot.repository,
            merged.len(),
            samples.finished_deployments,
            samples.units_completed
        );

        samples
    }

    /// Metrics of one repository.
    #[must_use]
    pub fn repository(&self, snapshot: &RepoSnapshot, period: &ReportPeriod) -> RepoMetrics {
        self.metrics(snapshot.repository.to_string(), &self.samples(snapshot, period), period)
    }

    /// Metrics pooled over every snapshot, keyed as the organisation.
    #[must_use]
    pub fn organization<'a>(&self, snapshots: impl IntoIterator<Item = &'a RepoSnapshot>, period: &ReportPeriod) -> RepoMetrics {
        let mut pooled = Samples::default();
        for snapshot in snapshots {
            pooled.merge(self.samples(snapshot, period));
        }

        self.metrics(ORGANIZATION_KEY.to_string(), &pooled, period)
    }

    fn metrics(&self, repository: String, samples: &Samples, period: &ReportPeriod) -> RepoMetrics {
        RepoMetrics {
            repository,
            dora: DoraMetrics::compute(samples, period),
            extended: self.settings.extended_metrics.then(|| ExtendedMetrics::compute(samples)),
            partial_data: samples.partial,
        }
    }
}
