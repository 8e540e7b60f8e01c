pub mod api;
pub mod config;
pub mod models;
pub mod service;
pub mod store;

pub use config::AppConfig;
pub use service::Embedder;
pub use store::VectorStore;
