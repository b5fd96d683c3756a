pub mod app_config;
pub mod client_observability;
pub mod dispatcher_worker;

pub use app_config::AppConfig;
pub use client_observability::{ClientConfig, ObservabilityConfig};
pub use dispatcher_worker::{DispatcherConfig, WorkerConfig};
