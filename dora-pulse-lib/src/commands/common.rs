//! Setup shared between the report and chain commands.

use super::config::Config;
use crate::Result;
use crate::facts::{Credentials, FetchClient, Source};
use crate::model::ReportPeriod;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use clap::{Args, ValueEnum};
use ohno::bail;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared between the commands that talk to the hosting API
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// GitHub access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Path to configuration file (default is `pulse.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,
}

/// Configuration, credentials and API source for one command invocation.
#[derive(Debug)]
pub struct Common {
    pub config: Config,
    pub source: Source,
}

impl Common {
    pub fn new(args: &CommonArgs) -> Result<Self> {
        Self::init_logging(args.log_level);

        let config = Config::load(Utf8Path::new("."), args.config.as_ref())?;

        let Some(token) = args.github_token.clone().filter(|t| !t.trim().is_empty()) else {
            bail!("a GitHub token is required; pass --github-token or set GITHUB_TOKEN");
        };

        let client = FetchClient::new(Credentials::from_token(token), config.retry_policy())?;
        let source = Source::new(config.protocol, client, &config.endpoints()?, config.page_limits());

        Ok(Self { config, source })
    }

    /// Initialize logger based on log level
    fn init_logging(log_level: LogLevel) {
        let level = match log_level {
            LogLevel::None => return,
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        let env = env_logger::Env::default().filter_or("RUST_LOG", level);

        // A second command in the same process (tests) keeps the first logger.
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
            .try_init();
    }
}

/// Reporting window from optional calendar bounds.
///
/// `until` is inclusive, so the window ends at the following midnight; without
/// it the window ends at `now`. Without `since` the window covers `lookback_days`.
pub fn report_period(since: Option<NaiveDate>, until: Option<NaiveDate>, lookback_days: u32, now: DateTime<Utc>) -> Result<ReportPeriod> {
    let end = until.map_or(now, |day| midnight(day) + TimeDelta::days(1));
    let period = since.map_or_else(|| ReportPeriod::trailing(end, lookback_days), |day| ReportPeriod::new(midnight(day), end));

    if period.start >= period.end {
        bail!("the reporting period is empty: it starts at {} and ends at {}", period.start, period.end);
    }

    Ok(period)
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}
