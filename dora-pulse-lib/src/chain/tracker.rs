//! Following a pull request's merges from branch to branch until it reaches production.

use crate::metrics::{hours_between, round1};
use crate::model::PullRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const LOG_TARGET: &str = "     chain";

/// Default bound on the number of merges followed from one pull request.
pub const DEFAULT_MAX_HOPS: usize = 10;

/// One merge along a delivery chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    pub pr_number: u64,
    pub base_branch: String,
    pub head_branch: String,
    pub merged_at: Option<DateTime<Utc>>,
}

impl From<&PullRequest> for ChainLink {
    fn from(pr: &PullRequest) -> Self {
        Self {
            pr_number: pr.number,
            base_branch: pr.base_branch.clone(),
            head_branch: pr.head_branch.clone(),
            merged_at: pr.merged_at,
        }
    }
}

/// Outcome of walking forward from one pull request.
///
/// `chain` is ordered by traversal depth, starting pull request first.
/// `production_merged_at` is `None` when no merge reached a production branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryChainResult {
    pub production_merged_at: Option<DateTime<Utc>>,
    pub chain: Vec<ChainLink>,
}

impl DeliveryChainResult {
    #[must_use]
    pub const fn reached_production(&self) -> bool {
        self.production_merged_at.is_some()
    }
}

/// Decides whether a merge target counts as a production release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionBranch {
    pattern: String,
}

impl ProductionBranch {
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into().to_ascii_lowercase(),
        }
    }

    /// Substring match, ignoring ASCII case.
    #[must_use]
    pub fn matches(&self, branch: &str) -> bool {
        !self.pattern.is_empty() && branch.to_ascii_lowercase().contains(&self.pattern)
    }
}

/// Lookup of a repository's pull requests by number and by head branch.
#[derive(Debug)]
pub struct PullRequestIndex<'a> {
    by_number: HashMap<u64, &'a PullRequest>,
    merged_by_head: HashMap<&'a str, Vec<&'a PullRequest>>,
}

impl<'a> PullRequestIndex<'a> {
    #[must_use]
    pub fn new(pull_requests: &'a [PullRequest]) -> Self {
        let mut by_number = HashMap::with_capacity(pull_requests.len());
        let mut merged_by_head: HashMap<&str, Vec<&PullRequest>> = HashMap::new();

        for pr in pull_requests {
            let _ = by_number.entry(pr.number).or_insert(pr);
            if pr.is_merged() {
                merged_by_head.entry(pr.head_branch.as_str()).or_default().push(pr);
            }
        }

        for prs in merged_by_head.values_mut() {
            prs.sort_by_key(|pr| (pr.merged_at, pr.number));
        }

        Self { by_number, merged_by_head }
    }

    #[must_use]
    pub fn get(&self, number: u64) -> Option<&'a PullRequest> {
        self.by_number.get(&number).copied()
    }

    /// The earliest merged pull request from `branch` that merged at or after `after`.
    #[must_use]
    pub fn downstream(&self, branch: &str, after: DateTime<Utc>) -> Option<&'a PullRequest> {
        self.merged_by_head
            .get(branch)?
            .iter()
            .copied()
            .find(|pr| pr.merged_at.is_some_and(|at| at >= after))
    }
}

/// Walks merge chains forward towards production.
#[derive(Debug)]
pub struct ChainTracker<'a> {
    index: PullRequestIndex<'a>,
    production: ProductionBranch,
    max_hops: usize,
}

impl<'a> ChainTracker<'a> {
    #[must_use]
    pub const fn new(index: PullRequestIndex<'a>, production: ProductionBranch, max_hops: usize) -> Self {
        Self {
            index,
            production,
            max_hops,
        }
    }

    #[must_use]
    pub const fn index(&self) -> &PullRequestIndex<'a> {
        &self.index
    }

    /// Follow `start` through downstream merges until production, a dead end, or the hop limit.
    #[must_use]
    pub fn trace(&self, start: &PullRequest) -> DeliveryChainResult {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = start;

        while chain.len() < self.max_hops {
            if !visited.insert(current.number) {
                log::debug!(target: LOG_TARGET, "Pull request #{} revisited while tracing #{}", current.number, start.number);
                break;
            }

            let Some(merged_at) = current.merged_at else {
                break;
            };

            chain.push(ChainLink::from(current));

            if self.production.matches(&current.base_branch) {
                return DeliveryChainResult {
                    production_merged_at: Some(merged_at),
                    chain,
                };
            }

            if current.head_branch == current.base_branch {
                log::debug!(target: LOG_TARGET, "Pull request #{} merges '{}' into itself", current.number, current.base_branch);
                break;
            }

            let Some(next) = self.index.downstream(&current.base_branch, merged_at) else {
                break;
            };
            current = next;
        }

        if chain.len() >= self.max_hops {
            log::debug!(target: LOG_TARGET, "Gave up tracing #{} after {} hops", start.number, self.max_hops);
        }

        DeliveryChainResult {
            production_merged_at: None,
            chain,
        }
    }

    /// One candidate per linked pull request, in input order.
    ///
    /// A number missing from the index yields an empty candidate.
    #[must_use]
    pub fn candidates(&self, linked: &[u64]) -> Vec<DeliveryChainResult> {
        linked
            .iter()
            .map(|&number| self.index.get(number).map(|pr| self.trace(pr)).unwrap_or_default())
            .collect()
    }
}

/// Pick the candidate representing a unit of work.
///
/// The earliest `production_merged_at` wins. When no candidate reached
/// production the first candidate is returned, whatever its chain.
#[must_use]
pub fn select_candidate(candidates: impl IntoIterator<Item = DeliveryChainResult>) -> Option<DeliveryChainResult> {
    let mut candidates = candidates.into_iter();
    let first = candidates.next()?;

    Some(candidates.fold(first, |best, candidate| {
        match (best.production_merged_at, candidate.production_merged_at) {
            (None, Some(_)) => candidate,
            (Some(current), Some(challenger)) if challenger < current => candidate,
            _ => best,
        }
    }))
}

/// Hours from unit creation to production merge, to one decimal.
#[must_use]
pub fn cycle_time_hours(unit_created_at: DateTime<Utc>, result: &DeliveryChainResult) -> Option<f64> {
    result
        .production_merged_at
        .map(|merged| round1(hours_between(unit_created_at, merged)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrState;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().to_utc()
    }

    fn pr(number: u64, head: &str, base: &str, merged_at: Option<&str>) -> PullRequest {
        PullRequest {
            number,
            state: if merged_at.is_some() { PrState::Closed } else { PrState::Open },
            title: format!("PR {number}"),
            body: None,
            created_at: ts("2024-01-01T00:00:00Z"),
            updated_at: None,
            merged_at: merged_at.map(ts),
            closed_at: merged_at.map(ts),
            base_branch: base.to_string(),
            head_branch: head.to_string(),
            additions: None,
            deletions: None,
            changed_files: None,
            labels: Vec::new(),
        }
    }

    fn result(at: Option<&str>, hops: usize) -> DeliveryChainResult {
        DeliveryChainResult {
            production_merged_at: at.map(ts),
            chain: (0..hops)
                .map(|i| ChainLink {
                    pr_number: i as u64,
                    base_branch: "develop".into(),
                    head_branch: "feature".into(),
                    merged_at: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_direct_merge_to_production() {
        let prs = vec![pr(1, "feature/a", "main", Some("2024-01-02T00:00:00Z"))];
        let tracker = ChainTracker::new(PullRequestIndex::new(&prs), ProductionBranch::new("main"), DEFAULT_MAX_HOPS);

        let result = tracker.trace(&prs[0]);
        assert_eq!(result.production_merged_at, Some(ts("2024-01-02T00:00:00Z")));
        assert_eq!(result.chain.len(), 1);
        assert_eq!(result.chain[0].pr_number, 1);
    }

    #[test]
    fn test_multi_hop_chain() {
        let prs = vec![
            pr(1, "feature/a", "develop", Some("2024-01-02T00:00:00Z")),
            pr(2, "develop", "staging", Some("2024-01-03T00:00:00Z")),
            pr(3, "staging", "main", Some("2024-01-04T00:00:00Z")),
        ];
        let tracker = ChainTracker::new(PullRequestIndex::new(&prs), ProductionBranch::new("main"), DEFAULT_MAX_HOPS);

        let result = tracker.trace(&prs[0]);
        assert_eq!(result.production_merged_at, Some(ts("2024-01-04T00:00:00Z")));
        assert_eq!(result.chain.iter().map(|l| l.pr_number).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_downstream_must_merge_after_current() {
        let prs = vec![
            pr(1, "feature/a", "develop", Some("2024-01-05T00:00:00Z")),
            pr(2, "develop", "main", Some("2024-01-03T00:00:00Z")),
            pr(3, "develop", "main", Some("2024-01-09T00:00:00Z")),
            pr(4, "develop", "main", Some("2024-01-07T00:00:00Z")),
        ];
        let tracker = ChainTracker::new(PullRequestIndex::new(&prs), ProductionBranch::new("main"), DEFAULT_MAX_HOPS);

        let result = tracker.trace(&prs[0]);
        assert_eq!(result.production_merged_at, Some(ts("2024-01-07T00:00:00Z")));
        assert_eq!(result.chain.last().unwrap().pr_number, 4);
    }

    #[test]
    fn test_unmerged_pull_request_yields_empty_chain() {
        let prs = vec![pr(1, "feature/a", "main", None)];
        let tracker = ChainTracker::new(PullRequestIndex::new(&prs), ProductionBranch::new("main"), DEFAULT_MAX_HOPS);

        let result = tracker.trace(&prs[0]);
        assert_eq!(result, DeliveryChainResult::default());
    }

    #[test]
    fn test_dead_end_keeps_partial_chain() {
        let prs = vec![pr(1, "feature/a", "develop", Some("2024-01-02T00:00:00Z"))];
        let tracker = ChainTracker::new(PullRequestIndex::new(&prs), ProductionBranch::new("main"), DEFAULT_MAX_HOPS);

        let result = tracker.trace(&prs[0]);
        assert!(!result.reached_production());
        assert_eq!(result.chain.len(), 1);
    }

    #[test]
    fn test_self_referencing_branch_terminates() {
        let prs = vec![pr(1, "develop", "develop", Some("2024-01-02T00:00:00Z"))];
        let tracker = ChainTracker::new(PullRequestIndex::new(&prs), ProductionBranch::new("main"), DEFAULT_MAX_HOPS);

        let result = tracker.trace(&prs[0]);
        assert!(!result.reached_production());
        assert_eq!(result.chain.len(), 1);
    }

    #[test]
    fn test_branch_cycle_terminates() {
        let prs = vec![
            pr(1, "a", "b", Some("2024-01-02T00:00:00Z")),
            pr(2, "b", "a", Some("2024-01-03T00:00:00Z")),
            pr(3, "a", "b", Some("2024-01-04T00:00:00Z")),
            pr(4, "b", "a", Some("2024-01-05T00:00:00Z")),
        ];
        let tracker = ChainTracker::new(PullRequestIndex::new(&prs), ProductionBranch::new("main"), DEFAULT_MAX_HOPS);

        let result = tracker.trace(&prs[0]);
        assert!(!result.reached_production());
        assert_eq!(result.chain.iter().map(|l| l.pr_number).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_hop_limit() {
        let prs = vec![
            pr(1, "f", "b1", Some("2024-01-01T01:00:00Z")),
            pr(2, "b1", "b2", Some("2024-01-01T02:00:00Z")),
            pr(3, "b2", "b3", Some("2024-01-01T03:00:00Z")),
            pr(4, "b3", "main", Some("2024-01-01T04:00:00Z")),
        ];
        let tracker = ChainTracker::new(PullRequestIndex::new(&prs), ProductionBranch::new("main"), 3);

        let result = tracker.trace(&prs[0]);
        assert!(!result.reached_production());
        assert_eq!(result.chain.len(), 3);
    }

    #[test]
    fn test_candidates_for_unknown_numbers_are_empty() {
        let prs = vec![pr(1, "feature/a", "main", Some("2024-01-02T00:00:00Z"))];
        let tracker = ChainTracker::new(PullRequestIndex::new(&prs), ProductionBranch::new("main"), DEFAULT_MAX_HOPS);

        let candidates = tracker.candidates(&[99, 1]);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0], DeliveryChainResult::default());
        assert!(candidates[1].reached_production());
    }

    #[test]
    fn test_select_earliest_production_merge() {
        let selected = select_candidate(vec![
            result(Some("2024-01-02T09:00:00Z"), 1),
            result(Some("2024-01-01T10:00:00Z"), 2),
        ])
        .unwrap();

        assert_eq!(selected.production_merged_at, Some(ts("2024-01-01T10:00:00Z")));
        assert_eq!(selected.chain.len(), 2);
    }

    #[test]
    fn test_select_first_when_none_reached_production() {
        let selected = select_candidate(vec![result(None, 1), result(None, 4)]).unwrap();

        assert_eq!(selected.production_merged_at, None);
        assert_eq!(selected.chain.len(), 1);
    }

    #[test]
    fn test_select_prefers_production_over_first() {
        let selected = select_candidate(vec![result(None, 3), result(Some("2024-01-05T00:00:00Z"), 1)]).unwrap();
        assert_eq!(selected.production_merged_at, Some(ts("2024-01-05T00:00:00Z")));
    }

    #[test]
    fn test_select_empty() {
        assert!(select_candidate(Vec::new()).is_none());
    }

    #[test]
    fn test_cycle_time() {
        let reached = result(Some("2024-01-03T10:00:00Z"), 1);
        assert_eq!(cycle_time_hours(ts("2024-01-01T10:00:00Z"), &reached), Some(48.0));

        let partial = result(Some("2024-01-01T11:20:00Z"), 1);
        assert_eq!(cycle_time_hours(ts("2024-01-01T10:00:00Z"), &partial), Some(1.3));

        assert_eq!(cycle_time_hours(ts("2024-01-01T10:00:00Z"), &result(None, 2)), None);
    }

    #[test]
    fn test_production_pattern() {
        let production = ProductionBranch::new("Main");
        assert!(production.matches("main"));
        assert!(production.matches("release/main"));
        assert!(!production.matches("develop"));
        assert!(!ProductionBranch::new("").matches("main"));
    }
}
