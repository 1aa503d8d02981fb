use super::record::MetricRecord;
use super::stats::{mean, round1};
use super::tier::Tier;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

/// Monday of the ISO week containing `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let week = date.iso_week();
    NaiveDate::from_isoywd_opt(week.year(), week.week(), chrono::Weekday::Mon).unwrap_or(date)
}

fn average(records: &[&MetricRecord], field: impl Fn(&MetricRecord) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = records.iter().filter_map(|r| field(r)).collect();
    mean(&values)
}

fn roll_up(week: NaiveDate, repository: &str, records: &[&MetricRecord]) -> MetricRecord {
    let deployments_per_day = average(records, |r| Some(r.deployments_per_day)).unwrap_or(0.0);
    let lead_time_hours = average(records, |r| r.lead_time_hours);
    let change_failure_rate = average(records, |r| r.change_failure_rate);
    let mttr_hours = average(records, |r| r.mttr_hours);

    MetricRecord {
        date: week,
        repository: repository.to_string(),
        partial_data: records.iter().any(|r| r.partial_data),
        deployment_count: average(records, |r| Some(r.deployment_count)).unwrap_or(0.0),
        deployments_per_day,
        deployment_frequency_tier: Tier::deployment_frequency(deployments_per_day),
        lead_time_hours,
        lead_time_tier: lead_time_hours.map(Tier::lead_time),
        change_failure_rate,
        change_failure_rate_tier: change_failure_rate.map(Tier::change_failure_rate),
        mttr_hours,
        mttr_tier: mttr_hours.map(Tier::time_to_recovery),
        mttr_source: records.iter().rev().find_map(|r| r.mttr_source),
        units_completed: average(records, |r| r.units_completed),
        cycle_time_mean_hours: average(records, |r| r.cycle_time_mean_hours),
        cycle_time_median_hours: average(records, |r| r.cycle_time_median_hours),
        cycle_time_min_hours: records
            .iter()
            .filter_map(|r| r.cycle_time_min_hours)
            .min_by(f64::total_cmp)
            .map(round1),
        cycle_time_max_hours: records
            .iter()
            .filter_map(|r| r.cycle_time_max_hours)
            .max_by(f64::total_cmp)
            .map(round1),
        coding_time_mean_hours: average(records, |r| r.coding_time_mean_hours),
        coding_time_median_hours: average(records, |r| r.coding_time_median_hours),
        rework_rate: average(records, |r| r.rework_rate),
        review_wait_mean_hours: average(records, |r| r.review_wait_mean_hours),
        approval_to_merge_mean_hours: average(records, |r| r.approval_to_merge_mean_hours),
        pr_size_lines_mean: average(records, |r| r.pr_size_lines_mean),
        pr_size_lines_median: average(records, |r| r.pr_size_lines_median),
        pr_size_files_mean: average(records, |r| r.pr_size_files_mean),
    }
}

/// Group daily records by ISO week and repository and average each numeric field.
///
/// Missing values are ignored rather than counted as zero. Minimum and maximum
/// cycle times take the extremes of the week. Tiers are re-derived from the
/// averaged values. Weekly records are dated on the Monday of their week.
#[must_use]
pub fn weekly_rollup(records: &[MetricRecord]) -> Vec<MetricRecord> {
    let mut groups: BTreeMap<(NaiveDate, &str), Vec<&MetricRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((week_start(record.date), record.repository.as_str()))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|((week, repository), group)| roll_up(week, repository, &group))
        .collect()
}
