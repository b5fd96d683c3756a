use thiserror::Error;

/// 文件存储调度错误类型定义
///
/// Worker侧的业务失败（例如文件不存在）不在这里表达，
/// 它们作为 `JobOutcome` 写入Job结果原样转发给客户端。
#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("没有已注册的Worker")]
    NoWorkersRegistered,

    #[error("Worker未找到: {id}")]
    UnknownWorker { id: String },

    #[error("Worker响应超时: {id}")]
    WorkerTimeout { id: String },

    #[error("未知的关联令牌: {token}")]
    UnknownToken { token: String },

    #[error("结果聚合失败: {0}")]
    AggregationFailure(String),

    #[error("无效的作业: {0}")]
    InvalidJob(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl FileStoreError {
    /// 是否属于客户端协议违规（在RPC层以错误形式返回）
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            FileStoreError::UnknownToken { .. } | FileStoreError::InvalidJob(_)
        )
    }
}

/// 统一的Result类型
pub type FileStoreResult<T> = std::result::Result<T, FileStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violation_classification() {
        assert!(FileStoreError::UnknownToken {
            token: "abc".to_string()
        }
        .is_protocol_violation());
        assert!(FileStoreError::InvalidJob("missing token".to_string()).is_protocol_violation());
        assert!(!FileStoreError::NoWorkersRegistered.is_protocol_violation());
        assert!(!FileStoreError::WorkerTimeout {
            id: "w1".to_string()
        }
        .is_protocol_violation());
    }

    #[test]
    fn test_error_display() {
        let err = FileStoreError::UnknownWorker {
            id: "worker-7".to_string(),
        };
        assert_eq!(err.to_string(), "Worker未找到: worker-7");
    }
}
