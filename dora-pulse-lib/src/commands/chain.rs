use super::Host;
use super::common::{Common, CommonArgs, report_period};
use crate::Result;
use crate::chain::{LinkResolver, UnitDelivery};
use crate::facts::{DeliverySource, RepoSnapshot};
use crate::metrics::Aggregator;
use crate::model::Repository;
use chrono::Utc;
use clap::Args;
use ohno::{IntoAppError, bail};
use std::io::Write;

#[derive(Args, Debug)]
pub struct ChainArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Repository holding the unit of work, as `owner/name`
    #[arg(long, value_name = "REPO")]
    pub repo: String,

    /// Issue number of the unit of work
    #[arg(long, value_name = "NUMBER")]
    pub issue: u64,
}

/// Trace one unit of work through its pull requests and print the selected chain.
pub async fn trace_chain<H: Host>(host: &mut H, args: &ChainArgs) -> Result<()> {
    let Common { config, source } = Common::new(&args.common)?;
    let repo = Repository::parse(&args.repo)?;
    let period = report_period(None, None, config.lookback_days, Utc::now())?;

    let issues = source
        .issues(&repo, &[], period.start)
        .await
        .into_app_err_with(|| format!("listing issues of '{repo}'"))?;

    let Some(issue) = issues.items.into_iter().find(|i| i.number == args.issue) else {
        bail!(
            "issue #{} was not found among the issues of '{repo}' updated in the last {} days",
            args.issue,
            config.lookback_days
        );
    };

    let mut snapshot = RepoSnapshot::empty(repo.clone());
    let pull_requests = source
        .pull_requests(&repo)
        .await
        .into_app_err_with(|| format!("listing pull requests of '{repo}'"))?;
    snapshot.pull_requests = pull_requests.items;
    snapshot.incomplete = pull_requests.incomplete || issues.incomplete;

    let aggregator = Aggregator::new(config.aggregate_settings());
    let links = LinkResolver::new(&snapshot.pull_requests, core::iter::empty());
    let unit = UnitDelivery::trace(&issue, &links, &aggregator.tracker(&snapshot));

    let mut out = host.output();
    let _ = writeln!(out, "{repo}#{} opened {}", unit.issue_number, unit.created_at);

    if unit.linked_prs.is_empty() {
        let _ = writeln!(out, "  no linked pull requests");
    } else {
        let linked: Vec<_> = unit.linked_prs.iter().map(|n| format!("#{n}")).collect();
        let _ = writeln!(out, "  linked pull requests: {}", linked.join(", "));
    }

    for link in &unit.result.chain {
        let merged = link.merged_at.map_or_else(|| "not merged".to_string(), |at| format!("merged {at}"));
        let _ = writeln!(out, "  #{}: {} -> {} ({merged})", link.pr_number, link.head_branch, link.base_branch);
    }

    match (unit.result.production_merged_at, unit.cycle_time_hours) {
        (Some(at), Some(hours)) => {
            let _ = writeln!(out, "  reached production {at}, cycle time {hours:.1}h");
        }
        _ => {
            let _ = writeln!(out, "  did not reach production");
        }
    }

    if let Some(hours) = unit.coding_time_hours {
        let _ = writeln!(out, "  coding time {hours:.1}h");
    }

    if snapshot.incomplete {
        let _ = writeln!(out, "  (some listings were incomplete; a later link may be missing)");
    }

    Ok(())
}
