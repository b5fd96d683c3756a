use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use filestore_api::create_app;
use filestore_core::AppConfig;
use filestore_dispatcher::DispatcherService;
use filestore_worker::WorkerService;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{debug, info};

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 调度器：对外提供HTTP接口
    Dispatcher,
    /// 存储Worker：从调度器拉取作业
    Worker,
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
}

impl Application {
    pub fn new(config: AppConfig, mode: AppMode) -> Self {
        Self { config, mode }
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    /// 运行到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        match self.mode {
            AppMode::Dispatcher => self.run_dispatcher(shutdown_rx).await,
            AppMode::Worker => self.run_worker(shutdown_rx).await,
        }
    }

    async fn run_dispatcher(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let dispatcher_config = self.config.dispatcher.clone();
        let bind_address = dispatcher_config.bind_address.clone();

        let metrics = if self.config.observability.metrics_enabled {
            let handle = install_metrics_recorder()?;
            spawn_metrics_upkeep(handle.clone(), shutdown_rx.resubscribe());
            Some(handle)
        } else {
            None
        };

        let dispatcher = Arc::new(DispatcherService::new(dispatcher_config));
        let app = create_app(dispatcher, metrics);

        let listener = TcpListener::bind(&bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {bind_address}"))?;
        info!("Dispatcher监听地址: {}", bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Dispatcher收到关闭信号");
            })
            .await
            .context("Dispatcher HTTP服务运行失败")?;

        info!("Dispatcher服务已停止");
        Ok(())
    }

    async fn run_worker(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let worker = WorkerService::new(&self.config.worker)
            .await
            .context("创建Worker服务失败")?;
        info!(
            worker_id = %worker.worker_id(),
            dispatcher_url = %self.config.worker.dispatcher_url,
            "启动Worker服务"
        );

        worker.run(shutdown_rx).await.context("Worker运行失败")?;

        info!("Worker服务已停止");
        Ok(())
    }
}

fn install_metrics_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("安装Prometheus指标记录器失败")
}

/// 定期清理直方图桶，避免内存持续增长
fn spawn_metrics_upkeep(handle: PrometheusHandle, mut shutdown_rx: broadcast::Receiver<()>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => handle.run_upkeep(),
                _ = shutdown_rx.recv() => {
                    debug!("指标维护任务退出");
                    break;
                }
            }
        }
    });
}
