//! Delivery metrics computed from repository snapshots.
//!
//! Nothing here talks to the network. The [`Aggregator`] reduces each
//! [`RepoSnapshot`](crate::facts::RepoSnapshot) to a set of [`Samples`]
//! (per-item durations and counts), and metrics are then computed from
//! samples. Pooling samples rather than raw entities is what makes the
//! organisation rollup possible without mixing pull-request numbers or branch
//! names across repositories.
//!
//! # Metric groups
//!
//! - **DORA**: deployment frequency, lead time for changes, change failure
//!   rate and time to recovery, each with a performance [`Tier`].
//! - **Extended**: cycle and coding time of units of work, rework rate, review
//!   efficiency and pull-request size.
//!
//! Every computation is total: empty inputs produce zero counts and `None`
//! values, never an error. Averages are rounded to one decimal.
//!
//! Results are flattened into [`MetricRecord`] rows keyed by date and
//! repository, and [`weekly_rollup`] averages daily rows into ISO weeks.

mod aggregator;
mod dora;
mod extended;
mod record;
mod samples;
mod stats;
mod tier;
mod weekly;

pub use aggregator::{AggregateSettings, Aggregator, ExcludeLabels};
pub use dora::{DoraMetrics, MttrSource};
pub use extended::ExtendedMetrics;
pub use record::{MetricRecord, ORGANIZATION_KEY, RepoMetrics};
pub use samples::Samples;
pub use stats::{Summary, hours_between, mean, percentage, round1};
pub use tier::Tier;
pub use weekly::{week_start, weekly_rollup};
