pub mod analytics;
pub mod embedder;

pub use analytics::{build_snapshot, compute_analytics};
pub use embedder::{EmbedError, Embedder};
