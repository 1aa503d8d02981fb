use super::sink::{ReportSink, UpsertOutcome, merge};
use crate::Result;
use crate::metrics::MetricRecord;
use camino::{Utf8Path, Utf8PathBuf};
use csv::{Reader, Writer};
use ohno::IntoAppError;
use std::fs;

const LOG_TARGET: &str = "       csv";

/// Stores each surface as a CSV table with a header row in `<dir>/<surface>.csv`.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    dir: Utf8PathBuf,
}

impl CsvFileSink {
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path(&self, surface: &str) -> Utf8PathBuf {
        self.dir.join(format!("{surface}.csv"))
    }
}

fn read_records(path: &Utf8Path) -> Result<Vec<MetricRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = Reader::from_path(path).into_app_err_with(|| format!("opening '{path}'"))?;
    reader
        .deserialize()
        .collect::<Result<Vec<MetricRecord>, _>>()
        .into_app_err_with(|| format!("parsing '{path}'"))
}

impl ReportSink for CsvFileSink {
    fn load(&self, surface: &str) -> Result<Vec<MetricRecord>> {
        read_records(&self.path(surface))
    }

    fn upsert(&self, surface: &str, records: &[MetricRecord]) -> Result<UpsertOutcome> {
        let path = self.path(surface);
        let (rows, outcome) = merge(read_records(&path)?, records);

        fs::create_dir_all(&self.dir).into_app_err_with(|| format!("creating directory '{}'", self.dir))?;

        let mut writer = Writer::from_path(&path).into_app_err_with(|| format!("creating '{path}'"))?;
        for row in &rows {
            writer.serialize(row).into_app_err_with(|| format!("writing '{path}'"))?;
        }
        writer.flush().into_app_err_with(|| format!("flushing '{path}'"))?;

        log::info!(
            target: LOG_TARGET,
            "Wrote '{path}': {} inserted, {} updated, {} rows total",
            outcome.inserted,
            outcome.updated,
            rows.len()
        );

        Ok(outcome)
    }
}
