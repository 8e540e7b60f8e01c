use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// 向量库访问错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("store response missing field: {0}")]
    MalformedResponse(&'static str),
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 滚动分页返回的点
#[derive(Debug, Clone, Deserialize)]
pub struct ScrollPoint {
    pub id: Value,
    #[serde(default)]
    pub payload: Value,
}

/// 相似检索命中
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredHit {
    pub id: Value,
    pub score: f64,
    #[serde(default)]
    pub payload: Value,
}

/// 分组检索的一组命中
#[derive(Debug, Clone, Deserialize)]
pub struct HitGroup {
    pub id: Value,
    pub hits: Vec<ScoredHit>,
}

/// 批量写入的点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointStruct {
    pub id: Value,
    pub vector: Value,
    #[serde(default)]
    pub payload: Value,
}

/// 通用响应包裹: {"result": ..., "status": "ok"}
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<ScrollPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    points: Vec<ScoredHit>,
}

#[derive(Debug, Deserialize)]
struct GroupsResult {
    groups: Vec<HitGroup>,
}

#[derive(Debug, Deserialize)]
struct SnapshotDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    points_count: u64,
}

/// 向量库 HTTP 客户端 (Qdrant 兼容 REST 接口)
///
/// 只做读写转发, 不做重试/退避; 调用失败由上层按空结果+错误信息呈现。
pub struct VectorStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl VectorStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        req
    }

    /// 非 2xx 统一转为 StoreError::Api
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, StoreError> {
        let resp = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let envelope: ApiEnvelope<T> = resp.json().await?;
        Ok(envelope.result)
    }

    /// 滚动分页: (集合, 每页上限, 上一页游标) → (一页点, 下一页游标)
    pub async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<Value>,
    ) -> Result<(Vec<ScrollPoint>, Option<Value>), StoreError> {
        let mut body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        if let Some(offset) = offset {
            body["offset"] = offset;
        }
        let result: ScrollResult = self
            .post_json(&format!("/collections/{}/points/scroll", collection), &body)
            .await?;
        Ok((result.points, result.next_page_offset))
    }

    /// 相似检索
    pub async fn query_points(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredHit>, StoreError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });
        let result: QueryResult = self
            .post_json(&format!("/collections/{}/points/query", collection), &body)
            .await?;
        Ok(result.points)
    }

    /// 按载荷字段分组的相似检索
    pub async fn query_point_groups(
        &self,
        collection: &str,
        vector: &[f32],
        group_by: &str,
        group_size: usize,
        limit: usize,
    ) -> Result<Vec<HitGroup>, StoreError> {
        let body = json!({
            "query": vector,
            "group_by": group_by,
            "group_size": group_size,
            "limit": limit,
            "with_payload": true,
        });
        let result: GroupsResult = self
            .post_json(
                &format!("/collections/{}/points/query/groups", collection),
                &body,
            )
            .await?;
        Ok(result.groups)
    }

    /// 创建载荷索引 (keyword / text), 已存在时由调用方忽略错误
    pub async fn create_payload_index(
        &self,
        collection: &str,
        field_name: &str,
        field_schema: &str,
    ) -> Result<(), StoreError> {
        let body = json!({
            "field_name": field_name,
            "field_schema": field_schema,
        });
        let _: Value = self
            .post_json(&format!("/collections/{}/index", collection), &body)
            .await?;
        Ok(())
    }

    /// 建集合 (命名向量 + 余弦距离)
    pub async fn create_collection(
        &self,
        collection: &str,
        vector_name: &str,
        dim: usize,
    ) -> Result<(), StoreError> {
        let body = json!({
            "vectors": {
                vector_name: { "size": dim, "distance": "Cosine" }
            }
        });
        let resp = self
            .request(reqwest::Method::PUT, &format!("/collections/{}", collection))
            .json(&body)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn delete_collection(&self, collection: &str) -> Result<(), StoreError> {
        let resp = self
            .request(
                reqwest::Method::DELETE,
                &format!("/collections/{}", collection),
            )
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// 集合点数 (迁移后校验用)
    pub async fn points_count(&self, collection: &str) -> Result<u64, StoreError> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/collections/{}", collection))
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let envelope: ApiEnvelope<CollectionInfo> = resp.json().await?;
        Ok(envelope.result.points_count)
    }

    /// 批量写入点
    pub async fn upsert_points(
        &self,
        collection: &str,
        points: &[PointStruct],
    ) -> Result<(), StoreError> {
        let body = json!({ "points": points });
        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points", collection),
            )
            .json(&body)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// 创建快照, 返回快照名
    pub async fn create_snapshot(&self, collection: &str) -> Result<String, StoreError> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/snapshots", collection),
            )
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let envelope: ApiEnvelope<SnapshotDescription> = resp.json().await?;
        if envelope.result.name.is_empty() {
            return Err(StoreError::MalformedResponse("result.name"));
        }
        Ok(envelope.result.name)
    }

    /// 流式下载快照文件, 返回写入字节数
    pub async fn download_snapshot(
        &self,
        collection: &str,
        snapshot_name: &str,
        output: &Path,
    ) -> Result<u64, StoreError> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/collections/{}/snapshots/{}", collection, snapshot_name),
            )
            .send()
            .await?;
        let mut resp = Self::check(resp).await?;

        let mut file = tokio::fs::File::create(output).await?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    /// 上传快照恢复集合 (priority=snapshot: 以快照数据为准)
    pub async fn upload_snapshot(&self, collection: &str, path: &Path) -> Result<(), StoreError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.snapshot", collection));
        let part = multipart::Part::bytes(bytes).file_name(file_name);
        let form = multipart::Form::new().part("snapshot", part);

        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/snapshots/upload", collection),
            )
            .query(&[("priority", "snapshot")])
            .multipart(form)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}

/// 点 ID 统一转字符串 (数字 ID 与 UUID 混用)
pub fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
