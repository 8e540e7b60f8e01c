//! 集合快照导出/恢复工具。
//!
//! 导出: 为每个集合创建快照并下载到本地目录。
//! 恢复: 把目录下的 *.snapshot 文件按文件名对应的集合上传恢复。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spend_analytics_rust::VectorStore;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(name = "snapshots", about = "Export/restore vector store collection snapshots")]
struct Cli {
    /// 向量库地址
    #[arg(long, env = "QDRANT_URL")]
    qdrant_url: String,

    #[arg(long, env = "QDRANT_API_KEY")]
    qdrant_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 导出集合快照到本地目录
    Export {
        /// 要导出的集合 (可多次指定)
        #[arg(short, long = "collection", required = true)]
        collections: Vec<String>,

        /// 输出目录
        #[arg(long, default_value = "snapshots")]
        out: PathBuf,
    },
    /// 把目录下的 *.snapshot 恢复到向量库
    Restore {
        /// 快照文件所在目录
        #[arg(long, default_value = "snapshots")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .init();

    let cli = Cli::parse();
    let store = VectorStore::new(&cli.qdrant_url, cli.qdrant_api_key.clone());

    match cli.command {
        Command::Export { collections, out } => export(&store, &collections, &out).await,
        Command::Restore { dir } => restore(&store, &dir).await,
    }
}

async fn export(store: &VectorStore, collections: &[String], out: &PathBuf) -> Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("failed to create output dir {}", out.display()))?;

    let mut exported = 0;
    for collection in collections {
        info!("Creating snapshot for {}...", collection);
        // 单个集合失败只报告, 继续导出其余集合
        let name = match store.create_snapshot(collection).await {
            Ok(name) => name,
            Err(e) => {
                error!("{}: {}", collection, e);
                continue;
            }
        };

        let output = out.join(format!("{}.snapshot", collection));
        match store.download_snapshot(collection, &name, &output).await {
            Ok(bytes) => {
                info!(
                    "Downloaded {} ({:.1} MB)",
                    output.display(),
                    bytes as f64 / 1024.0 / 1024.0
                );
                exported += 1;
            }
            Err(e) => error!("{}: download failed: {}", collection, e),
        }
    }

    info!("Exported {}/{} collections to {}", exported, collections.len(), out.display());
    Ok(())
}

async fn restore(store: &VectorStore, dir: &PathBuf) -> Result<()> {
    let mut restored = 0;
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read snapshot dir {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("snapshot") {
            continue;
        }
        // 集合名取文件名主干, 例如 DocumentChunk_text.snapshot
        let Some(collection) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };

        info!("Restoring {}...", collection);
        match store.upload_snapshot(&collection, &path).await {
            Ok(()) => {
                info!("Restored {}", collection);
                restored += 1;
            }
            Err(e) => error!("{}: {}", collection, e),
        }
    }

    info!("Restored {} collections from {}", restored, dir.display());
    Ok(())
}
