//! # dripline-adapter-http-axum
//!
//! Thin HTTP surface over the engine, built with [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Accept domain events (`POST /api/events`) and publish them on the bus
//! - Expose read-only reporting queries over automations and the execution
//!   log (per automation, per subscriber)
//! - Map engine errors to HTTP status codes
//!
//! The engine itself never depends on this crate: everything interesting
//! happens behind the event bus and the storage ports.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
