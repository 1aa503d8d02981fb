//! Cycle and coding time of a unit of work, measured over its linked pull requests.

use super::{ChainTracker, DeliveryChainResult, LinkResolver, cycle_time_hours, select_candidate};
use crate::metrics::{hours_between, round1};
use crate::model::Issue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery timeline of one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDelivery {
    pub issue_number: u64,
    pub created_at: DateTime<Utc>,
    pub linked_prs: Vec<u64>,
    pub result: DeliveryChainResult,

    /// Issue creation to production merge, `None` when production was never reached.
    pub cycle_time_hours: Option<f64>,

    /// Issue creation to the first linked pull request being opened, `None` without linked pull requests.
    pub coding_time_hours: Option<f64>,
}

impl UnitDelivery {
    /// Trace `issue` through every pull request `links` associates with it.
    #[must_use]
    pub fn trace(issue: &Issue, links: &LinkResolver, tracker: &ChainTracker<'_>) -> Self {
        let linked_prs = links.linked(issue.number);
        let result = select_candidate(tracker.candidates(&linked_prs)).unwrap_or_default();

        let coding_time_hours = linked_prs
            .iter()
            .filter_map(|&n| tracker.index().get(n))
            .map(|pr| pr.created_at)
            .min()
            .map(|first_pr| round1(hours_between(issue.created_at, first_pr).max(0.0)));

        Self {
            issue_number: issue.number,
            created_at: issue.created_at,
            cycle_time_hours: cycle_time_hours(issue.created_at, &result),
            coding_time_hours,
            linked_prs,
            result,
        }
    }
}
