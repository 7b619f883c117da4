//! # dripline-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the storage port traits defined in `dripline-app::ports`
//!   (`AutomationStore`, `RunRepository`, `ExecutionLog`)
//! - Manage the `SQLite` connection pool lifecycle
//! - Run database migrations (sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `dripline-app` (for port traits) and `dripline-domain` (for
//! domain types). The `app` and `domain` crates must never reference this
//! adapter.

mod automation_repo;
mod error;
mod execution_log_repo;
mod pool;
mod run_repo;

pub use automation_repo::SqliteAutomationStore;
pub use error::StorageError;
pub use execution_log_repo::SqliteExecutionLog;
pub use pool::{Config, Database};
pub use run_repo::SqliteRunRepository;
