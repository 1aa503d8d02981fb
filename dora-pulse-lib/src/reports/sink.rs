use crate::Result;
use crate::metrics::MetricRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Counts reported by one upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertOutcome {
    #[must_use]
    pub const fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Destination of metric records.
///
/// Writing the same records twice leaves the surface unchanged: rows are
/// keyed by `(date, repository)` and a later write replaces the earlier row.
pub trait ReportSink: core::fmt::Debug {
    /// Rows currently stored for `surface`, empty when the surface does not exist yet.
    fn load(&self, surface: &str) -> Result<Vec<MetricRecord>>;

    fn upsert(&self, surface: &str, records: &[MetricRecord]) -> Result<UpsertOutcome>;
}

/// File format of the output surfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Merge `incoming` into `existing`, returning the rows sorted by date then repository.
pub(super) fn merge(existing: Vec<MetricRecord>, incoming: &[MetricRecord]) -> (Vec<MetricRecord>, UpsertOutcome) {
    let mut rows: BTreeMap<(NaiveDate, String), MetricRecord> = existing
        .into_iter()
        .map(|r| ((r.date, r.repository.clone()), r))
        .collect();

    let mut outcome = UpsertOutcome::default();
    for record in incoming {
        match rows.insert((record.date, record.repository.clone()), record.clone()) {
            Some(_) => outcome.updated += 1,
            None => outcome.inserted += 1,
        }
    }

    (rows.into_values().collect(), outcome)
}
