//! Storage worker: keeps files on local disk and executes jobs pulled from the dispatcher.

pub mod components;
pub mod service;

pub use components::{
    validate_file_name, DiskFileStore, DispatcherClient, FileStore, JobExecutor, PollOutcome,
    WorkerLifecycle,
};
pub use service::{default_worker_id, resolve_worker_id, WorkerService};
