use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

use filestore_core::{CorrelationToken, FileStoreError, FileStoreResult, WorkerId};

/// 关联令牌管理器：记录负载均衡上传第一阶段选中的Worker
#[derive(Default)]
pub struct CorrelationTokenManager {
    tokens: Mutex<HashMap<CorrelationToken, WorkerId>>,
}

impl CorrelationTokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为Worker签发一个当前未被占用的令牌
    pub async fn issue(&self, worker_id: &str) -> CorrelationToken {
        let mut tokens = self.tokens.lock().await;
        loop {
            let token = CorrelationToken::generate();
            if let Entry::Vacant(entry) = tokens.entry(token) {
                entry.insert(worker_id.to_string());
                debug!("为Worker {} 签发关联令牌 {}", worker_id, token);
                return token;
            }
        }
    }

    /// 查询令牌绑定的Worker，不消费令牌
    pub async fn resolve(&self, token: &CorrelationToken) -> FileStoreResult<WorkerId> {
        self.tokens
            .lock()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| FileStoreError::UnknownToken {
                token: token.to_string(),
            })
    }

    /// 查询并删除令牌，同一令牌只能兑换一次
    pub async fn redeem(&self, token: &CorrelationToken) -> FileStoreResult<WorkerId> {
        self.tokens
            .lock()
            .await
            .remove(token)
            .ok_or_else(|| FileStoreError::UnknownToken {
                token: token.to_string(),
            })
    }

    /// 作废绑定到某个Worker的全部令牌（Worker被驱逐时调用）
    pub async fn revoke_worker(&self, worker_id: &str) -> usize {
        let mut tokens = self.tokens.lock().await;
        let before = tokens.len();
        tokens.retain(|_, bound| bound != worker_id);
        before - tokens.len()
    }

    pub async fn len(&self) -> usize {
        self.tokens.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
