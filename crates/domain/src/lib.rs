//! # dripline-domain
//!
//! Pure domain model for the dripline subscriber-automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Events** (the domain occurrences that start automations)
//! - Define **Automations** (trigger + node graph definitions)
//! - Define **Runs** (per-subscriber execution state, including the
//!   serializable cursor used to suspend and resume at delay nodes)
//! - Define **log entries** (append-only records of node execution attempts)
//! - Contain all invariant enforcement: node-id uniqueness, edge resolution,
//!   acyclicity, predicate evaluation
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod event;
pub mod run;
pub mod run_log;
