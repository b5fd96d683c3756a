pub mod app;
pub mod client;
pub mod common;
pub mod shutdown;
