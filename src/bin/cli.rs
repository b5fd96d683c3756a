use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;
use filestore::client::FileStoreClient;
use filestore_core::{AppConfig, JobOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = CliApp::parse();
    cli.run().await
}

/// CLI应用程序主结构
#[derive(clap::Parser, Debug)]
#[command(name = "filestore-cli")]
#[command(version = "1.0.0")]
#[command(about = "分布式文件存储调度系统 - 命令行客户端")]
struct CliApp {
    #[command(subcommand)]
    command: Commands,

    /// 调度器基础URL，覆盖配置文件中的 client.dispatcher_url
    #[arg(long)]
    api_url: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 检查调度器是否可达
    Hello,
    /// 列出所有Worker上的文件
    List,
    /// 上传本地文件
    Upload {
        /// 本地文件路径
        path: PathBuf,
        /// 复制到所有Worker，全部成功才算成功
        #[arg(long)]
        high_reliability: bool,
    },
    /// 下载文件
    Download {
        /// 文件名
        name: String,
        /// 保存路径，默认为当前目录下的同名文件
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 删除文件
    Delete {
        /// 文件名
        name: String,
        /// 跳过确认
        #[arg(short, long)]
        yes: bool,
    },
}

impl CliApp {
    fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    async fn run(self) -> Result<()> {
        let config = AppConfig::load(self.config.as_deref()).context("加载配置失败")?;
        let api_url = self
            .api_url
            .unwrap_or_else(|| config.client.dispatcher_url.clone());
        let client = FileStoreClient::new(
            api_url,
            Duration::from_millis(config.client.result_timeout_ms),
        )?;

        match self.command {
            Commands::Hello => {
                println!("{}", client.hello().await?);
            }
            Commands::List => {
                let files = client.list().await?;
                if files.is_empty() {
                    println!("没有文件");
                }
                for file in files {
                    println!("{file}");
                }
            }
            Commands::Upload {
                path,
                high_reliability,
            } => handle_upload(&client, &path, high_reliability).await?,
            Commands::Download { name, output } => {
                handle_download(&client, &name, output).await?
            }
            Commands::Delete { name, yes } => handle_delete(&client, &name, yes).await?,
        }

        Ok(())
    }
}

async fn handle_upload(client: &FileStoreClient, path: &Path, high_reliability: bool) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("无效的文件路径: {}", path.display()))?
        .to_string();
    let contents = tokio::fs::read(path)
        .await
        .with_context(|| format!("读取文件失败: {}", path.display()))?;

    match client.upload(&file_name, contents, high_reliability).await? {
        JobOutcome::Uploaded {
            file_name,
            file_size,
        } => println!("上传成功: {file_name} ({file_size} 字节)"),
        other => println!("上传完成: {other:?}"),
    }
    Ok(())
}

async fn handle_download(
    client: &FileStoreClient,
    name: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let Some(contents) = client.download(name).await? else {
        return Err(anyhow::anyhow!("文件不存在: {name}"));
    };

    let output = output.unwrap_or_else(|| PathBuf::from(name));
    tokio::fs::write(&output, &contents)
        .await
        .with_context(|| format!("写入文件失败: {}", output.display()))?;
    println!("已下载 {} 字节到 {}", contents.len(), output.display());
    Ok(())
}

async fn handle_delete(client: &FileStoreClient, name: &str, yes: bool) -> Result<()> {
    if !client.file_exists(name).await? {
        println!("文件不存在: {name}");
        return Ok(());
    }

    let confirmed = if yes {
        true
    } else {
        println!("确定要删除文件 {name} 吗? (y/N)");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        input.trim().eq_ignore_ascii_case("y")
    };

    match client.confirm_delete(name, confirmed).await? {
        JobOutcome::Deleted { file_name } => println!("已删除: {file_name}"),
        JobOutcome::Aborted { file_name } => println!("已取消删除: {file_name}"),
        other => println!("删除完成: {other:?}"),
    }
    Ok(())
}
