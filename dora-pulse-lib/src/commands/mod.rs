//! Command-line interface and orchestration for dora-pulse
//!
//! This module implements the CLI commands and wires the other modules together
//! into end-to-end runs. It handles argument parsing, configuration loading and
//! the high-level workflows.
//!
//! # Commands
//!
//! - **report**: collect delivery data for every configured repository, compute
//!   per-repository and organisation metrics, and upsert daily and weekly rows
//!   into the output surfaces
//! - **chain**: trace a single unit of work through its pull requests and print
//!   the chain that was selected
//! - **init**: generate a default configuration file
//! - **validate**: check a configuration file
//!
//! The `run` function parses command-line arguments using clap and routes to
//! the appropriate handler. The `common` module holds what the commands that
//! talk to the hosting API share: logging setup, configuration and credential
//! loading, and reporting-period resolution.
//!
//! Configuration is a TOML file, `pulse.toml` by default. Every key has a
//! default, so an empty file (or none at all) is a valid configuration.

mod chain;
mod common;
mod config;
mod host;
mod init;
mod report;
mod run;
mod validate;

pub use chain::{ChainArgs, trace_chain};
pub use common::{CommonArgs, LogLevel};
pub use config::{Config, DEFAULT_CONFIG_FILE};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use report::{ReportArgs, process_report};
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
