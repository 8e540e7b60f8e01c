pub mod client;
pub mod loader;

pub use client::{id_to_string, HitGroup, PointStruct, ScoredHit, ScrollPoint, StoreError, VectorStore};
pub use loader::{load_all_records, LoadOutcome};
