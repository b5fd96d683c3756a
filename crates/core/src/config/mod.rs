//! 配置管理
//!
//! 配置按 默认值 → TOML配置文件 → `FILESTORE__*` 环境变量 的顺序合并，
//! 加载后对每个配置段执行 [`ConfigValidator::validate`]。
//!
//! ```toml
//! [dispatcher]
//! bind_address = "0.0.0.0:8080"
//! await_timeout_ms = 5000
//!
//! [worker]
//! dispatcher_url = "http://127.0.0.1:8080"
//! storage_root = "data/workers"
//! ```

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::{ConfigValidator, ValidationUtils};
