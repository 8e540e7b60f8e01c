use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 配置错误 (缺少必需的环境变量时启动即失败)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub qdrant: QdrantConfig,
    pub embedding: EmbeddingConfig,
    pub collections: CollectionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 向量库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    pub url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// 嵌入服务配置 (Ollama 兼容接口)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub url: String,
    pub model: String,
}

/// 发票/交易所在的集合名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    pub invoices: String,
    pub transactions: String,
}

impl AppConfig {
    /// 从环境变量加载配置 (QDRANT_URL 为必填项)
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("SERVER_PORT") {
            Ok(p) => p
                .parse()
                .map_err(|_| ConfigError::InvalidVar("SERVER_PORT", p))?,
            Err(_) => 5553,
        };

        Ok(Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port,
            },
            qdrant: QdrantConfig {
                url: std::env::var("QDRANT_URL")
                    .map_err(|_| ConfigError::MissingVar("QDRANT_URL"))?,
                api_key: std::env::var("QDRANT_API_KEY").ok(),
            },
            embedding: EmbeddingConfig {
                url: std::env::var("EMBEDDING_URL")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string()),
                model: std::env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "nomic-embed-text".to_string()),
            },
            collections: CollectionsConfig {
                invoices: std::env::var("INVOICE_COLLECTION")
                    .unwrap_or_else(|_| "DocumentChunk_text".to_string()),
                transactions: std::env::var("TRANSACTION_COLLECTION")
                    .unwrap_or_else(|_| "TextDocument_name".to_string()),
            },
        })
    }
}
