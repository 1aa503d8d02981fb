use super::Host;
use super::common::{Common, CommonArgs, report_period};
use crate::Result;
use crate::facts::{Collector, ProviderResult, RepoSnapshot};
use crate::metrics::{Aggregator, MetricRecord, weekly_rollup};
use crate::reports::RunSummary;
use camino::Utf8PathBuf;
use chrono::{NaiveDate, Utc};
use clap::Args;
use ohno::bail;
use std::io::Write;

const LOG_TARGET: &str = "    report";

#[derive(Args, Debug)]
pub struct ReportArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// First day of the reporting period (YYYY-MM-DD); defaults to `lookback_days` before the end
    #[arg(long, value_name = "DATE")]
    pub since: Option<NaiveDate>,

    /// Last day of the reporting period (YYYY-MM-DD, inclusive); defaults to now
    #[arg(long, value_name = "DATE")]
    pub until: Option<NaiveDate>,

    /// Directory where output surfaces are written, overriding `output_dir`
    #[arg(long, value_name = "PATH")]
    pub output_dir: Option<Utf8PathBuf>,
}

/// Collect, aggregate and store metrics for every configured repository.
///
/// A repository that cannot be collected is reported in the summary and does
/// not stop the others. The command fails only when every repository fails.
pub async fn process_report<H: Host>(host: &mut H, args: &ReportArgs) -> Result<()> {
    let Common { config, source } = Common::new(&args.common)?;

    let repositories = config.repositories()?;
    if repositories.is_empty() {
        bail!("no repositories configured; add some to the 'repositories' list");
    }

    let now = Utc::now();
    let period = report_period(args.since, args.until, config.lookback_days, now)?;
    let date = args.until.unwrap_or_else(|| now.date_naive());

    log::info!(
        target: LOG_TARGET,
        "Reporting on {} repositories from {} to {}",
        repositories.len(),
        period.start,
        period.end
    );

    let collector = Collector::new(source, config.collect_settings(period));
    let aggregator = Aggregator::new(config.aggregate_settings());

    let mut summary = RunSummary::default();
    let mut records = Vec::with_capacity(repositories.len() + 1);
    let mut snapshots: Vec<RepoSnapshot> = Vec::with_capacity(repositories.len());

    for (repo, result) in collector.collect(&repositories).await {
        match result {
            ProviderResult::Found(snapshot) => {
                let metrics = aggregator.repository(&snapshot, &period);
                records.push(MetricRecord::new(date, &metrics));
                summary.record_success(repo.to_string(), metrics.partial_data);
                snapshots.push(snapshot);
            }
            ProviderResult::Error(e) => {
                summary.record_failure(repo.to_string(), &collector.source().client().redact(&format!("{e:#}")));
            }
        }
    }

    if summary.all_failed() {
        let _ = write!(host.error(), "{summary}");
        bail!("could not collect data for any repository\n{summary}");
    }

    if !snapshots.is_empty() {
        let organization = aggregator.organization(&snapshots, &period);
        records.push(MetricRecord::new(date, &organization));
    }

    let output_dir = args.output_dir.clone().unwrap_or_else(|| config.output_dir.clone());
    let sink = config.output_format.sink(output_dir);

    let daily = sink.upsert(&config.surface, &records)?;

    let weekly_surface = config.weekly_surface();
    let weekly = weekly_rollup(&sink.load(&config.surface)?);
    let _ = sink.upsert(&weekly_surface, &weekly)?;

    summary.records_written = daily.written();
    let _ = write!(host.output(), "{summary}");

    Ok(())
}
