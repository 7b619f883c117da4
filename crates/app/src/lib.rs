//! # dripline-app
//!
//! Application layer — the engine core and its **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `AutomationStore` — read access to stored automations
//!   - `RunRepository` — persistence for run cursors
//!   - `ExecutionLog` — append & query node execution records
//!   - `EventPublisher` — publish domain events
//!   - collaborator ports — `Mailer`, `TagStore`, `WebhookSink`
//! - Provide the engine core:
//!   - `TriggerMatcher` — match events against enabled automations
//!   - `RunExecutor` — walk a node graph per subscriber, with retries,
//!     suspension, and idempotent starts
//!   - `ActionDispatcher` — typed registry from actions to collaborators
//!   - `ResumeWorker` — wake suspended runs whose delay has elapsed
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `dripline-domain` only (plus `tokio::sync`/`tokio::time` for
//! channels and timing). Never imports adapter crates. Adapters depend on
//! *this* crate, not the reverse.

pub mod dispatch;
pub mod event_bus;
pub mod executor;
pub mod ports;
pub mod resume;
pub mod trigger_matcher;
