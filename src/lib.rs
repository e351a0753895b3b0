use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Unsupported requirements format '{0}': expected a .docx or .pdf document")]
    UnsupportedFormat(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("No text could be extracted from the uploaded files")]
    NoExtractableText,

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Invalid embedding response: {0}")]
    EmbeddingResponseInvalid(String),

    #[error("No vector snapshot exists for session {0}: run a build first")]
    SnapshotMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod extractor;
pub mod store;
