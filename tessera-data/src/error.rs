//! Error types for data loading and writing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PLY parsing error: {0}")]
    Ply(String),

    #[error("Missing '{property}' at vertex {vertex}")]
    MissingProperty { property: &'static str, vertex: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
