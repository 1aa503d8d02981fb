use crate::Result;
use crate::chain::{DEFAULT_MAX_HOPS, ProductionBranch};
use crate::facts::pagination::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use crate::facts::resilient_http::{MAX_RETRIES, ensure_secure};
use crate::facts::{CollectSettings, DeploymentSource, Endpoints, EnvironmentFilter, MatchMode, PageLimits, ProtocolMode, RetryPolicy};
use crate::metrics::{AggregateSettings, ExcludeLabels};
use crate::model::{ReportPeriod, Repository};
use crate::reports::OutputFormat;
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "pulse.toml";

/// Largest page size the API accepts.
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Repositories to report on, as `owner/name` or a repository URL
    #[serde(default)]
    pub repositories: Vec<String>,

    /// API family used for every listing
    #[serde(default)]
    pub protocol: ProtocolMode,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// Merges into a branch containing this text count as production releases
    #[serde(default = "default_production_branch_pattern")]
    pub production_branch_pattern: String,

    #[serde(default)]
    pub deployment_source: DeploymentSource,

    /// Environment deployments must target; empty accepts every environment
    #[serde(default)]
    pub environment_pattern: String,

    #[serde(default)]
    pub environment_match: MatchMode,

    /// Issues carrying any of these labels are incidents
    #[serde(default = "default_incident_labels")]
    pub incident_labels: Vec<String>,

    #[serde(default)]
    pub exclude_labels: ExcludeLabels,

    /// Base-branch fragments whose pull requests are left out of pull-request statistics
    #[serde(default)]
    pub excluded_base_branches: Vec<String>,

    /// Length of the reporting window ending now
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(default = "default_max_chain_hops")]
    pub max_chain_hops: usize,

    #[serde(default = "default_true")]
    pub extended_metrics: bool,

    #[serde(default = "default_output_dir")]
    pub output_dir: Utf8PathBuf,

    #[serde(default)]
    pub output_format: OutputFormat,

    /// Name of the output surface; weekly rows go to `<surface>-weekly`
    #[serde(default = "default_surface")]
    pub surface: String,
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_graphql_url() -> String {
    "https://api.github.com/graphql".to_string()
}

fn default_production_branch_pattern() -> String {
    "main".to_string()
}

fn default_incident_labels() -> Vec<String> {
    vec!["incident".to_string()]
}

const fn default_lookback_days() -> u32 {
    30
}

const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

const fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

const fn default_max_retries() -> u32 {
    MAX_RETRIES
}

const fn default_initial_backoff() -> Duration {
    Duration::from_secs(1)
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_max_chain_hops() -> usize {
    DEFAULT_MAX_HOPS
}

const fn default_true() -> bool {
    true
}

fn default_output_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("reports")
}

fn default_surface() -> String {
    "dora_metrics".to_string()
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `pulse.toml` in `base_dir` is used when present.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(DEFAULT_CONFIG_FILE);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("No '{DEFAULT_CONFIG_FILE}' found, using the default configuration");
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(app_err!("page_size must be between 1 and {MAX_PAGE_SIZE}, got {}", self.page_size));
        }

        if self.max_pages == 0 {
            return Err(app_err!("max_pages must be at least 1"));
        }

        if self.lookback_days == 0 {
            return Err(app_err!("lookback_days must be at least 1"));
        }

        if self.max_chain_hops == 0 {
            return Err(app_err!("max_chain_hops must be at least 1"));
        }

        if self.request_timeout.is_zero() {
            return Err(app_err!("request_timeout must be greater than zero"));
        }

        if self.production_branch_pattern.trim().is_empty() {
            return Err(app_err!("production_branch_pattern must not be empty"));
        }

        if self.surface.is_empty() || !self.surface.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(app_err!(
                "surface must be a non-empty name made of letters, digits, '-' and '_', got '{}'",
                self.surface
            ));
        }

        let _ = self.repositories()?;
        let _ = self.endpoints()?;

        Ok(())
    }

    /// The configured repositories, parsed.
    pub fn repositories(&self) -> Result<Vec<Repository>> {
        self.repositories.iter().map(|r| Repository::parse(r)).collect()
    }

    /// API endpoints, checked for transport security.
    pub fn endpoints(&self) -> Result<Endpoints> {
        Ok(Endpoints {
            api_base_url: parse_endpoint("api_base_url", &self.api_base_url)?,
            graphql_url: parse_endpoint("graphql_url", &self.graphql_url)?,
        })
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: self.initial_backoff,
            request_timeout: self.request_timeout,
        }
    }

    #[must_use]
    pub const fn page_limits(&self) -> PageLimits {
        PageLimits {
            page_size: self.page_size,
            max_pages: self.max_pages,
        }
    }

    #[must_use]
    pub fn environment_filter(&self) -> EnvironmentFilter {
        EnvironmentFilter::new(Some(self.environment_pattern.clone()), self.environment_match)
    }

    #[must_use]
    pub fn collect_settings(&self, period: ReportPeriod) -> CollectSettings {
        CollectSettings {
            period,
            deployment_source: self.deployment_source,
            environment: self.environment_filter(),
            incident_labels: self.incident_labels.clone(),
            extended_metrics: self.extended_metrics,
        }
    }

    #[must_use]
    pub fn aggregate_settings(&self) -> AggregateSettings {
        AggregateSettings {
            production_branch: ProductionBranch::new(self.production_branch_pattern.as_str()),
            max_hops: self.max_chain_hops,
            exclude_labels: self.exclude_labels.clone(),
            excluded_base_branches: self.excluded_base_branches.clone(),
            extended_metrics: self.extended_metrics,
        }
    }

    /// Name of the surface holding weekly rollups.
    #[must_use]
    pub fn weekly_surface(&self) -> String {
        format!("{}-weekly", self.surface)
    }
}

fn parse_endpoint(key: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value).into_app_err_with(|| format!("parsing {key} '{value}'"))?;
    ensure_secure(&url).into_app_err_with(|| format!("checking {key}"))?;
    Ok(url)
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}
