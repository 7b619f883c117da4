//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the engine core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod automation_store;
pub mod collaborators;
pub mod event_bus;
pub mod execution_log;
pub mod run_repo;

pub use automation_store::AutomationStore;
pub use collaborators::{Mailer, TagStore, WebhookSink};
pub use event_bus::EventPublisher;
pub use execution_log::ExecutionLog;
pub use run_repo::RunRepository;
