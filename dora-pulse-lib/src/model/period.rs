use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Half-open reporting window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportPeriod {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `days` days leading up to `end`.
    #[must_use]
    pub fn trailing(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end - chrono::TimeDelta::days(i64::from(days)),
            end,
        }
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// Length in whole days, never less than one so rates stay finite.
    #[must_use]
    pub fn days(&self) -> u32 {
        let days = (self.end - self.start).num_days();
        u32::try_from(days).unwrap_or(0).max(1)
    }
}
