pub mod config;
pub mod errors;
pub mod models;

pub use config::{
    AppConfig, ClientConfig, ConfigValidator, DispatcherConfig, ObservabilityConfig, WorkerConfig,
};
pub use errors::*;
pub use models::{
    ApiResponse, Command, CorrelationToken, Job, JobOutcome, JobRequest, WorkerId, WorkerInfo,
    WorkerRegistration,
};
