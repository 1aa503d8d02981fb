//! Delivery-chain reconstruction.
//!
//! A unit of work reaches production through one or more pull requests. The
//! first one usually merges into an integration branch, and a later pull
//! request whose head is that branch carries the change further, until some
//! merge lands on a branch matching the production pattern. The
//! [`ChainTracker`] walks that merge graph forward for each pull request linked
//! to a unit of work, and [`select_candidate`] picks the one result that
//! represents the unit.
//!
//! Traversal is bounded by a maximum hop count and a visited set, and a pull
//! request whose head equals its own base never leads anywhere, so malformed
//! branch data cannot make the walk loop.

mod links;
mod tracker;
mod unit;

pub use links::LinkResolver;
pub use tracker::{
    ChainLink, ChainTracker, DEFAULT_MAX_HOPS, DeliveryChainResult, ProductionBranch, PullRequestIndex, cycle_time_hours,
    select_candidate,
};
pub use unit::UnitDelivery;
