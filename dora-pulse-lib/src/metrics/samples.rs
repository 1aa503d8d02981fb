/// Per-item measurements gathered from one or more repositories.
///
/// Metrics are computed from samples rather than from raw entities so that an
/// organisation rollup can pool repositories without mixing their pull-request
/// numbers or branch names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Samples {
    /// Deployments that finished with success or failure.
    pub finished_deployments: usize,
    pub failed_deployments: usize,

    pub lead_times: Vec<f64>,

    /// Failure-to-recovery durations derived from deployment history.
    pub deployment_recoveries: Vec<f64>,

    /// Open-to-close durations of incident issues.
    pub incident_recoveries: Vec<f64>,

    pub units_completed: usize,
    pub units_in_production: usize,
    pub cycle_times: Vec<f64>,
    pub coding_times: Vec<f64>,

    pub commits: usize,
    pub commits_after_review: usize,
    pub review_waits: Vec<f64>,
    pub approval_to_merge: Vec<f64>,

    pub pr_lines: Vec<f64>,
    pub pr_files: Vec<f64>,

    /// Built from at least one incomplete listing.
    pub partial: bool,
}

impl Samples {
    /// Pool `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        self.finished_deployments += other.finished_deployments;
        self.failed_deployments += other.failed_deployments;
        self.lead_times.extend(other.lead_times);
        self.deployment_recoveries.extend(other.deployment_recoveries);
        self.incident_recoveries.extend(other.incident_recoveries);
        self.units_completed += other.units_completed;
        self.units_in_production += other.units_in_production;
        self.cycle_times.extend(other.cycle_times);
        self.coding_times.extend(other.coding_times);
        self.commits += other.commits;
        self.commits_after_review += other.commits_after_review;
        self.review_waits.extend(other.review_waits);
        self.approval_to_merge.extend(other.approval_to_merge);
        self.pr_lines.extend(other.pr_lines);
        self.pr_files.extend(other.pr_files);
        self.partial |= other.partial;
    }
}
