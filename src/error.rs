use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ResearchError {
    #[error("invalid topic: {0:?} has no usable characters")]
    #[diagnostic(help("topics need at least one letter, digit, '-' or '_'"))]
    InvalidTopic(String),

    #[error("corrupt topic store at {path}: {message}")]
    #[diagnostic(help("the document was left untouched; fix or remove it by hand"))]
    CorruptStore { path: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("arXiv request failed: {0}")]
    ArxivHttp(String),

    #[error("arXiv returned status {status}: {message}")]
    ArxivStatus { status: u16, message: String },

    #[error("arXiv feed could not be read: {0}")]
    ArxivFeed(String),

    #[error("openFDA request failed: {0}")]
    OpenFdaHttp(String),

    #[error("openFDA returned status {status}: {message}")]
    OpenFdaStatus { status: u16, message: String },

    #[error("invalid FDA category: {0} (expected recalls, drugs, food or clinical)")]
    InvalidCategory(String),

    #[error("max_results must be between 1 and {limit}, got {value}")]
    InvalidMaxResults { value: usize, limit: usize },

    #[error("invalid FDA document: {0}")]
    InvalidDocument(String),

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl ResearchError {
    /// Errors raised by an upstream source rather than by local state or input.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ResearchError::ArxivHttp(_)
                | ResearchError::ArxivStatus { .. }
                | ResearchError::ArxivFeed(_)
                | ResearchError::OpenFdaHttp(_)
                | ResearchError::OpenFdaStatus { .. }
        )
    }
}
