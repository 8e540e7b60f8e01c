use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// 嵌入服务错误
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding service returned an empty vector")]
    EmptyEmbedding,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// 文本嵌入客户端 (Ollama 兼容 /api/embeddings 接口)
pub struct Embedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl Embedder {
    pub fn new(base_url: &str, model: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// 查询文本 → 定长向量
    ///
    /// nomic-embed 系列要求查询侧带 "search_query: " 前缀。
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: format!("search_query: {}", text),
        };
        let response: EmbeddingResponse = self
            .http
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.embedding.is_empty() {
            return Err(EmbedError::EmptyEmbedding);
        }
        Ok(response.embedding)
    }
}
