//! Links between issues and the pull requests that resolve them.

use crate::model::{PullRequest, PullRequestDetail};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

/// Closing keywords followed by an issue reference, e.g. `Fixes #12` or `resolved: #7`.
static CLOSING_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:close[sd]?|fix(?:e[sd])?|resolve[sd]?)\b\s*:?\s*#(\d+)").expect("invalid regex")
});

const CROSS_REFERENCED: &str = "cross-referenced";

/// Maps units of work to the pull requests that close or reference them.
#[derive(Debug, Default)]
pub struct LinkResolver {
    links: HashMap<u64, BTreeSet<u64>>,
}

impl LinkResolver {
    /// Index closing keywords in pull-request titles and bodies, plus issue
    /// cross-references found in pull-request timelines.
    #[must_use]
    pub fn new<'a>(pull_requests: &[PullRequest], details: impl IntoIterator<Item = &'a PullRequestDetail>) -> Self {
        let mut links: HashMap<u64, BTreeSet<u64>> = HashMap::new();

        for pr in pull_requests {
            let texts = [Some(pr.title.as_str()), pr.body.as_deref()];
            for text in texts.into_iter().flatten() {
                for issue in closing_references(text) {
                    let _ = links.entry(issue).or_default().insert(pr.number);
                }
            }
        }

        for detail in details {
            for event in &detail.timeline {
                if event.kind == CROSS_REFERENCED
                    && let Some(issue) = event.source_issue
                {
                    let _ = links.entry(issue).or_default().insert(detail.number);
                }
            }
        }

        Self { links }
    }

    /// Pull requests linked to `issue`, in pull-request number order.
    #[must_use]
    pub fn linked(&self, issue: u64) -> Vec<u64> {
        self.links.get(&issue).map(|prs| prs.iter().copied().collect()).unwrap_or_default()
    }
}

/// Issue numbers referenced with a closing keyword.
fn closing_references(text: &str) -> impl Iterator<Item = u64> + '_ {
    CLOSING_REFERENCE
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
}
