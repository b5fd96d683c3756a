//! # 数据模型
//!
//! 定义分布式文件存储调度系统的核心数据结构：作业、作业结果、关联令牌、Worker信息
//! 以及RPC响应信封。所有模型都实现了序列化和反序列化，用于调度器、Worker与客户端之间的传输。
//!
//! ## 核心模型
//!
//! ### Job - 作业
//! 调度的基本单元。客户端提交的作业由调度器复制给一个或多个Worker，
//! Worker处理后写入 `result` 和 `produced_by`（只写一次）。
//!
//! ### JobRequest - 作业负载
//! 按命令区分的标签联合，每个命令只携带自己需要的字段，在构造/反序列化时即完成类型检查。
//!
//! ### JobOutcome - 作业结果
//! Worker本地结果或调度器聚合后的客户端结果。`Failure` 是唯一的失败形态。
//!
//! ### CorrelationToken - 关联令牌
//! 负载均衡上传时把 UploadData 绑定到 UploadInit 选中的Worker，客户端只看到令牌。
//!
//! ## 作业生命周期
//! ```text
//! Submitted → Routed → AwaitingWorkers → Aggregated → Delivered
//! ```

pub mod job;
pub mod response;
pub mod worker;

pub use job::*;
pub use response::*;
pub use worker::*;
