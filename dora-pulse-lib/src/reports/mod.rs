//! Output surfaces for metric records.
//!
//! A surface is a named table of [`MetricRecord`](crate::metrics::MetricRecord)
//! rows keyed by date and repository. Sinks upsert into surfaces, so a report
//! can be re-run for the same day without duplicating rows. Two file-backed
//! sinks are provided, one writing a JSON array and one writing CSV with a
//! header row. Both keep rows sorted by date and then repository.
//!
//! [`RunSummary`] collects what happened to each repository during a run and
//! is what the `report` command prints at the end.

mod csv;
mod json;
mod sink;
mod summary;

pub use csv::CsvFileSink;
pub use json::JsonFileSink;
pub use sink::{OutputFormat, ReportSink, UpsertOutcome};
pub use summary::RunSummary;

use camino::Utf8PathBuf;

impl OutputFormat {
    /// A sink writing surfaces of this format into `dir`.
    #[must_use]
    pub fn sink(self, dir: impl Into<Utf8PathBuf>) -> Box<dyn ReportSink> {
        match self {
            Self::Json => Box::new(JsonFileSink::new(dir)),
            Self::Csv => Box::new(CsvFileSink::new(dir)),
        }
    }
}
