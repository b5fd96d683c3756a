pub mod health;
pub mod jobs;
pub mod workers;

use std::time::Duration;

use serde::Deserialize;

/// 长轮询接口的等待时间参数
#[derive(Debug, Default, Deserialize)]
pub struct WaitParams {
    pub timeout_ms: Option<u64>,
}

impl WaitParams {
    pub fn wait(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
