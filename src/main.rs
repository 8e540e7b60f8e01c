use axum::{
    routing::{get, post},
    Router,
};
use spend_analytics_rust::{
    api::{self, AppState},
    service, AppConfig, Embedder, VectorStore,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tracing::{debug, info};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置 (缺 QDRANT_URL 直接带诊断退出)
    let config = Arc::new(AppConfig::from_env()?);
    info!("Starting server with config: {:?}", config);

    let store = Arc::new(VectorStore::new(
        &config.qdrant.url,
        config.qdrant.api_key.clone(),
    ));
    let embedder = Arc::new(Embedder::new(&config.embedding.url, &config.embedding.model));

    // 建载荷索引加速过滤; 已存在时忽略
    for collection in [
        config.collections.invoices.as_str(),
        config.collections.transactions.as_str(),
    ] {
        for (field, schema) in [("type", "keyword"), ("text", "text")] {
            if let Err(e) = store.create_payload_index(collection, field, schema).await {
                debug!("Payload index {}.{}: {}", collection, field, e);
            }
        }
    }

    // 启动前整体加载并聚合一次, 之后经 /api/refresh 换发
    info!("Loading data from vector store...");
    let snapshot = service::build_snapshot(&store, &config.collections).await?;
    let state = AppState {
        store,
        embedder,
        config: config.clone(),
        analytics: Arc::new(RwLock::new(Arc::new(snapshot))),
    };

    // 构建路由
    let app = Router::new()
        .route("/", get(api::dashboard))
        .route("/health", get(api::health_check))
        .route("/api/analytics", get(api::get_analytics))
        .route("/api/search", get(api::search))
        .route("/api/search/grouped", get(api::grouped_search))
        .route("/api/refresh", post(api::refresh))
        .layer(ServiceBuilder::new())
        .with_state(state);

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET  /                    - dashboard");
    info!("  GET  /api/analytics       - aggregated spend snapshot");
    info!("  GET  /api/search          - semantic search");
    info!("  GET  /api/search/grouped  - grouped semantic search");
    info!("  POST /api/refresh         - recompute analytics");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
