//! Job lifecycle: records, stores, the state machine, the runner and the
//! `AuditService` facade

pub mod file_store;
pub mod runner;
pub mod service;
pub mod state_machine;
pub mod store;
pub mod types;

pub use file_store::JsonFileJobStore;
pub use runner::JobRunner;
pub use service::AuditService;
pub use state_machine::{INTERRUPTED_ERROR, JobStateMachine, TransitionOutcome};
pub use store::{JobStore, MemoryJobStore};
pub use types::{Job, JobFilter, JobId, JobResult, JobStatus, JobStatusView};
