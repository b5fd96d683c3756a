pub mod dispatcher_client;
pub mod file_store;
pub mod job_executor;
pub mod worker_lifecycle;

pub use dispatcher_client::DispatcherClient;
pub use file_store::{validate_file_name, DiskFileStore, FileStore};
pub use job_executor::JobExecutor;
pub use worker_lifecycle::{PollOutcome, WorkerLifecycle};
