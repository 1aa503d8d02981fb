use super::Labeled;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of work: the issue that anchors cycle-time and coding-time measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Issue {
    /// Hours from opening to closing, when closed.
    #[must_use]
    pub fn open_hours(&self) -> Option<f64> {
        self.closed_at.map(|closed| crate::metrics::hours_between(self.created_at, closed))
    }
}

impl Labeled for Issue {
    fn labels(&self) -> &[String] {
        &self.labels
    }
}
