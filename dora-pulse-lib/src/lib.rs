#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for dora-pulse
//!
//! This library consolidates all functionality for the dora-pulse tool, which
//! measures software delivery performance (the DORA metrics plus cycle time,
//! review efficiency and pull-request size) from the data a source-control
//! hosting API exposes.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`facts`]: Resilient retrieval, pagination and normalization of upstream data
//! - [`model`]: Strict internal entities
//! - [`chain`]: Delivery-chain reconstruction from merge history
//! - [`metrics`]: Metric computation, tiers and rollups
//! - [`reports`]: Output surfaces and run summaries

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod chain;
#[cfg(not(any(debug_assertions, test)))]
mod chain;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

#[cfg(any(debug_assertions, test))]
pub mod facts;
#[cfg(not(any(debug_assertions, test)))]
mod facts;

#[cfg(any(debug_assertions, test))]
pub mod metrics;
#[cfg(not(any(debug_assertions, test)))]
mod metrics;

#[cfg(any(debug_assertions, test))]
pub mod model;
#[cfg(not(any(debug_assertions, test)))]
mod model;

#[cfg(any(debug_assertions, test))]
pub mod reports;
#[cfg(not(any(debug_assertions, test)))]
mod reports;

pub use crate::commands::{Host, run};
