use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::error;

use crate::config::AppConfig;
use crate::models::AnalyticsSnapshot;
use crate::service::{build_snapshot, Embedder};
use crate::store::{id_to_string, VectorStore};

/// 共享状态: 快照经 RwLock<Arc<..>> 原子换发, 读方克隆 Arc
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<VectorStore>,
    pub embedder: Arc<Embedder>,
    pub config: Arc<AppConfig>,
    pub analytics: Arc<RwLock<Arc<AnalyticsSnapshot>>>,
}

/// 检索请求参数
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// 仅分组检索使用
    #[serde(default = "default_group_by")]
    pub group_by: String,
}

fn default_limit() -> usize {
    20
}

fn default_group_by() -> String {
    "type".to_string()
}

/// 单条检索命中
#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub text: Value,
    pub payload: Value,
}

/// 检索响应 (含耗时拆分); 失败时 results 为空并带错误信息
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub time_ms: f64,
    pub embed_ms: f64,
    pub search_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupedSearchResponse {
    pub groups: IndexMap<String, Vec<SearchHit>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 刷新响应
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 仪表盘静态页
pub async fn dashboard() -> Html<&'static str> {
    Html(include_str!("../../assets/dashboard.html"))
}

/// 当前聚合快照
pub async fn get_analytics(State(state): State<AppState>) -> Json<AnalyticsSnapshot> {
    let snapshot = state.analytics.read().await.clone();
    Json((*snapshot).clone())
}

/// 语义检索: 嵌入查询文本 → 向量库相似检索
pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let t0 = Instant::now();

    let vector = match state.embedder.embed_query(&params.q).await {
        Ok(v) => v,
        Err(e) => {
            error!("Embedding failed: {}", e);
            return search_error(t0, 0.0, format!("Embedding error: {}", e));
        }
    };
    let embed_ms = round_ms(t0.elapsed());

    let t1 = Instant::now();
    let hits = match state
        .store
        .query_points(&state.config.collections.invoices, &vector, params.limit)
        .await
    {
        Ok(hits) => hits,
        Err(e) => {
            error!("Vector search failed: {}", e);
            return search_error(t0, embed_ms, format!("Search error: {}", e));
        }
    };
    let search_ms = round_ms(t1.elapsed());

    let results = hits
        .into_iter()
        .map(|hit| SearchHit {
            id: id_to_string(&hit.id),
            score: hit.score,
            text: hit.payload.get("text").cloned().unwrap_or(Value::Null),
            payload: hit.payload,
        })
        .collect();

    let response = SearchResponse {
        results,
        time_ms: round_ms(t0.elapsed()),
        embed_ms,
        search_ms,
        error: None,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// 分组语义检索 (默认按载荷 type 字段分组)
pub async fn grouped_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let vector = match state.embedder.embed_query(&params.q).await {
        Ok(v) => v,
        Err(e) => {
            error!("Embedding failed: {}", e);
            return grouped_error(format!("Embedding error: {}", e));
        }
    };

    let groups = match state
        .store
        .query_point_groups(
            &state.config.collections.invoices,
            &vector,
            &params.group_by,
            5,
            params.limit,
        )
        .await
    {
        Ok(groups) => groups,
        Err(e) => {
            error!("Grouped search failed: {}", e);
            return grouped_error(format!("Search error: {}", e));
        }
    };

    let mut result: IndexMap<String, Vec<SearchHit>> = IndexMap::new();
    for group in groups {
        let hits = group
            .hits
            .into_iter()
            .map(|hit| SearchHit {
                id: id_to_string(&hit.id),
                score: hit.score,
                text: hit.payload.get("text").cloned().unwrap_or(Value::Null),
                payload: hit.payload,
            })
            .collect();
        result.insert(id_to_string(&group.id), hits);
    }

    let response = GroupedSearchResponse {
        groups: result,
        error: None,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// 重算并原子换发快照 (无需重启进程)
pub async fn refresh(State(state): State<AppState>) -> Response {
    match build_snapshot(&state.store, &state.config.collections).await {
        Ok(snapshot) => {
            let message = format!(
                "Recomputed analytics: {} invoices, {} transactions, {} skipped",
                snapshot.total_invoices, snapshot.total_transactions, snapshot.skipped_records
            );
            *state.analytics.write().await = Arc::new(snapshot);
            let response = RefreshResponse {
                success: true,
                message,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!("Refresh failed: {}", e);
            let response = RefreshResponse {
                success: false,
                message: format!("Error: {}", e),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

fn search_error(t0: Instant, embed_ms: f64, message: String) -> Response {
    let response = SearchResponse {
        results: Vec::new(),
        time_ms: round_ms(t0.elapsed()),
        embed_ms,
        search_ms: 0.0,
        error: Some(message),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
}

fn grouped_error(message: String) -> Response {
    let response = GroupedSearchResponse {
        groups: IndexMap::new(),
        error: Some(message),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
}

/// 耗时取一位小数的毫秒
fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 10.0).round() / 10.0
}
