use super::sink::{ReportSink, UpsertOutcome, merge};
use crate::Result;
use crate::metrics::MetricRecord;
use camino::{Utf8Path, Utf8PathBuf};
use ohno::IntoAppError;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};

const LOG_TARGET: &str = "      json";

/// Stores each surface as a JSON array in `<dir>/<surface>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: Utf8PathBuf,
}

impl JsonFileSink {
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path(&self, surface: &str) -> Utf8PathBuf {
        self.dir.join(format!("{surface}.json"))
    }
}

fn read_records(path: &Utf8Path) -> Result<Vec<MetricRecord>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).into_app_err_with(|| format!("opening '{path}'")),
    };

    serde_json::from_reader(BufReader::new(file)).into_app_err_with(|| format!("parsing '{path}'"))
}

impl ReportSink for JsonFileSink {
    fn load(&self, surface: &str) -> Result<Vec<MetricRecord>> {
        read_records(&self.path(surface))
    }

    fn upsert(&self, surface: &str, records: &[MetricRecord]) -> Result<UpsertOutcome> {
        let path = self.path(surface);
        let (rows, outcome) = merge(read_records(&path)?, records);

        fs::create_dir_all(&self.dir).into_app_err_with(|| format!("creating directory '{}'", self.dir))?;

        let file = File::create(&path).into_app_err_with(|| format!("creating '{path}'"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &rows).into_app_err_with(|| format!("writing '{path}'"))?;
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
