//! Elite/high/medium/low performance bands for the DORA metrics.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

const HOURS_PER_DAY: f64 = 24.0;
const HOURS_PER_WEEK: f64 = 168.0;

/// Performance band of a DORA metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    Elite,
    High,
    Medium,
    Low,
}

impl Tier {
    /// Deployments per day: elite at least daily, high at least weekly, medium at least monthly.
    #[must_use]
    pub fn deployment_frequency(per_day: f64) -> Self {
        if per_day >= 1.0 {
            Self::Elite
        } else if per_day >= 1.0 / 7.0 {
            Self::High
        } else if per_day >= 1.0 / 30.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Lead time for changes, in hours.
    #[must_use]
    pub fn lead_time(hours: f64) -> Self {
        by_duration(hours)
    }

    /// Change failure rate, in percent.
    ///
    /// Elite and high share the same boundary, so this never yields [`Tier::High`].
    #[must_use]
    pub fn change_failure_rate(percent: f64) -> Self {
        if percent <= 15.0 {
            Self::Elite
        } else if percent <= 30.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Mean time to recovery, in hours.
    #[must_use]
    pub fn time_to_recovery(hours: f64) -> Self {
        by_duration(hours)
    }
}

fn by_duration(hours: f64) -> Tier {
    if hours < 1.0 {
        Tier::Elite
    } else if hours < HOURS_PER_DAY {
        Tier::High
    } else if hours < HOURS_PER_WEEK {
        Tier::Medium
    } else {
        Tier::Low
    }
}
