use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use filestore_core::{AppConfig, ConfigValidator};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::{AppMode, Application};
use crate::shutdown::ShutdownManager;

/// 命令行解析出的启动参数
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub config_path: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub worker_id: Option<String>,
}

/// 初始化日志系统，RUST_LOG优先于传入的级别
pub fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 加载配置并应用命令行覆盖
pub fn load_config(startup_config: &StartupConfig) -> Result<AppConfig> {
    let mut config = AppConfig::load(startup_config.config_path.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            startup_config.config_path.as_deref().unwrap_or("<默认路径>")
        )
    })?;

    if let Some(ref worker_id) = startup_config.worker_id {
        config.worker.worker_id = worker_id.clone();
    }
    if let Some(ref log_level) = startup_config.log_level {
        config.observability.log_level = log_level.clone();
    }
    if let Some(ref log_format) = startup_config.log_format {
        config.observability.log_format = log_format.clone();
    }
    config.validate().context("命令行参数无效")?;

    Ok(config)
}

/// 启动应用程序并阻塞到收到关闭信号
pub async fn start_application(startup_config: StartupConfig, app_mode: AppMode) -> Result<()> {
    let config = load_config(&startup_config)?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;

    info!("运行模式: {:?}", app_mode);
    if let Some(ref path) = startup_config.config_path {
        info!("配置文件: {}", path);
    }

    let app = Arc::new(Application::new(config, app_mode));
    let shutdown_manager = ShutdownManager::new();

    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);

        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    // 应用自行退出（例如端口绑定失败）时不再等待信号
    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
        }
        result = &mut app_handle => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.context("应用运行失败")),
                Err(e) => Err(anyhow::anyhow!("应用任务异常退出: {e}")),
            };
        }
    }

    shutdown_manager.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(Ok(()))) => info!("服务已优雅关闭"),
        Ok(Ok(Err(e))) => error!("应用关闭时发生错误: {e:#}"),
        Ok(Err(e)) => error!("应用任务异常退出: {e}"),
        Err(_) => warn!("服务关闭超时，强制退出"),
    }

    Ok(())
}

/// 等待Ctrl+C或SIGTERM
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}

/// 解析应用运行模式
pub fn parse_app_mode(mode_str: &str) -> Result<AppMode> {
    match mode_str {
        "dispatcher" => Ok(AppMode::Dispatcher),
        "worker" => Ok(AppMode::Worker),
        _ => Err(anyhow::anyhow!("不支持的运行模式: {mode_str}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_app_mode() {
        assert!(matches!(parse_app_mode("dispatcher"), Ok(AppMode::Dispatcher)));
        assert!(matches!(parse_app_mode("worker"), Ok(AppMode::Worker)));
        assert!(parse_app_mode("all").is_err());
    }

    #[test]
    fn test_load_config_applies_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [worker]
            worker_id = "from-file"
            "#
        )
        .unwrap();

        let startup_config = StartupConfig {
            config_path: Some(file.path().to_str().unwrap().to_string()),
            log_level: Some("debug".to_string()),
            log_format: None,
            worker_id: Some("from-cli".to_string()),
        };

        let config = load_config(&startup_config).unwrap();
        assert_eq!(config.worker.worker_id, "from-cli");
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_load_config_missing_file() {
        let startup_config = StartupConfig {
            config_path: Some("/no/such/filestore.toml".to_string()),
            log_level: None,
            log_format: None,
            worker_id: None,
        };
        assert!(load_config(&startup_config).is_err());
    }
}
