//! 批量迁移工具: 把导出的点集 (每集合一个 JSONL 文件) 写入向量库。
//!
//! 每行一个点: {"id": ..., "vector": [...], "payload": {...}}。
//! 目标集合先删后建 (命名向量 + 余弦距离), 分批写入后按点数校验。

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use serde_json::{json, Value};
use spend_analytics_rust::store::{PointStruct, VectorStore};
use std::io::BufRead;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

/// 每批写入的点数
const UPSERT_BATCH: usize = 100;

#[derive(Parser)]
#[command(name = "migrate", about = "Upload an exported point set into the vector store")]
struct Cli {
    /// 导出目录, 内含 <collection>.jsonl 文件
    #[arg(long)]
    export_dir: PathBuf,

    #[arg(long, env = "QDRANT_URL")]
    qdrant_url: String,

    #[arg(long, env = "QDRANT_API_KEY")]
    qdrant_api_key: Option<String>,

    /// 向量维度 (需与源数据的嵌入模型一致)
    #[arg(long, default_value_t = 768)]
    vector_dim: usize,

    /// 命名向量名
    #[arg(long, default_value = "text")]
    vector_name: String,
}

/// 导出文件中的一行
#[derive(Debug, Deserialize)]
struct ExportedPoint {
    id: Value,
    vector: Vec<f32>,
    #[serde(default)]
    payload: Value,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .init();

    let cli = Cli::parse();
    let store = VectorStore::new(&cli.qdrant_url, cli.qdrant_api_key.clone());

    let mut files: Vec<PathBuf> = std::fs::read_dir(&cli.export_dir)
        .with_context(|| format!("failed to read export dir {}", cli.export_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
        .collect();
    files.sort();

    info!("Found {} collections to migrate", files.len());
    let mut migrated = Vec::new();

    for file in &files {
        let Some(collection) = file.file_stem().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };
        info!("Migrating {}...", collection);

        let points = read_points(file, &cli.vector_name)?;
        if points.is_empty() {
            info!("  Skipping empty export");
            continue;
        }

        // 先删后建, 保证目标 schema 一致
        if store.delete_collection(&collection).await.is_ok() {
            info!("  Deleted existing collection");
        }
        store
            .create_collection(&collection, &cli.vector_name, cli.vector_dim)
            .await
            .with_context(|| format!("failed to create collection {}", collection))?;

        for (i, batch) in points.chunks(UPSERT_BATCH).enumerate() {
            store
                .upsert_points(&collection, batch)
                .await
                .with_context(|| format!("upsert failed for {}", collection))?;
            info!(
                "  Uploaded {}/{} points",
                (i * UPSERT_BATCH + batch.len()).min(points.len()),
                points.len()
            );
        }
        migrated.push((collection, points.len()));
    }

    // 校验
    info!("Verifying collections:");
    for (collection, expected) in &migrated {
        let count = store.points_count(collection).await?;
        if count as usize == *expected {
            info!("  {}: {} points", collection, count);
        } else {
            warn!("  {}: {} points (expected {})", collection, count, expected);
        }
    }

    info!("Migration complete");
    Ok(())
}

/// 读取一个 JSONL 导出文件; 坏行计数跳过
fn read_points(path: &PathBuf, vector_name: &str) -> Result<Vec<PointStruct>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let reader = std::io::BufReader::new(file);

    let mut points = Vec::new();
    let mut bad_lines = 0u64;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ExportedPoint>(&line) {
            Ok(p) => points.push(PointStruct {
                id: p.id,
                vector: json!({ vector_name: p.vector }),
                payload: p.payload,
            }),
            Err(_) => bad_lines += 1,
        }
    }
    if bad_lines > 0 {
        warn!("{}: skipped {} malformed lines", path.display(), bad_lines);
    }
    Ok(points)
}
