//! 文件存储调度器
//!
//! 调度器不保存任何文件，只负责把客户端作业分发给存储Worker并聚合结果：
//!
//! - [`registry`]: Worker注册表与每个Worker的FIFO作业队列
//! - [`tokens`]: 负载均衡上传两阶段之间的关联令牌
//! - [`collector`]: Worker内部结果的收集与匹配
//! - [`outcome_queue`]: 按提交顺序释放的客户端结果队列
//! - [`strategies`]: 负载均衡上传的Worker选择策略
//! - [`router`]: 每个命令的分发与聚合状态机
//! - [`service`]: 组合以上组件，对外提供RPC操作

pub mod collector;
pub mod outcome_queue;
pub mod registry;
pub mod router;
pub mod service;
pub mod strategies;
pub mod tokens;

pub use collector::{ResultCollector, ResultSet};
pub use outcome_queue::{OutcomeQueue, OutcomeTicket};
pub use registry::WorkerRegistry;
pub use router::{JobRouter, Submission};
pub use service::{DispatcherService, DispatcherStats, HELLO};
pub use strategies::{FewestFilesStrategy, WorkerLoad, WorkerSelectionStrategy};
pub use tokens::CorrelationTokenManager;
