use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::WorkerId;

/// Worker节点信息（调度器侧视图）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub registered_at: DateTime<Utc>,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub pending_jobs: usize,
}

impl WorkerInfo {
    /// 距上次拉取作业的秒数，从未拉取过时按注册时间计算
    pub fn idle_seconds(&self, now: DateTime<Utc>) -> i64 {
        let last_seen = self.last_poll_at.unwrap_or(self.registered_at);
        (now - last_seen).num_seconds()
    }
}

/// Worker注册请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegistration {
    pub worker_id: WorkerId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_idle_seconds_falls_back_to_registration() {
        let now = Utc::now();
        let mut info = WorkerInfo {
            id: "worker-1".to_string(),
            registered_at: now - Duration::seconds(40),
            last_poll_at: None,
            pending_jobs: 0,
        };
        assert_eq!(info.idle_seconds(now), 40);

        info.last_poll_at = Some(now - Duration::seconds(5));
        assert_eq!(info.idle_seconds(now), 5);
    }
}
