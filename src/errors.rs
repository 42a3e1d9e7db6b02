use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("files are required")]
    FilesRequired,

    #[error("invalid file at index {index}: {reason}")]
    InvalidFile { index: usize, reason: String },

    #[error("too many files: {count} (limit {cap})")]
    TooManyFiles { count: usize, cap: usize },

    #[error("graph not found")]
    GraphNotFound,

    #[error("invalid project id: {0}")]
    InvalidProjectId(String),

    #[error("file path is required")]
    FilePathRequired,

    #[error("no context for file {0}")]
    ContextNotFound(String),

    #[error("diagram generation failed: {0}")]
    DiagramFailed(String),

    #[error("analysis exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GraphError {
    /// Stable outward error code, shared by the CLI and any transport layer.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::FilesRequired => "FILES_REQUIRED",
            Self::InvalidFile { .. } => "INVALID_FILE",
            Self::TooManyFiles { .. } => "TOO_MANY_FILES",
            Self::GraphNotFound => "GRAPH_NOT_FOUND",
            Self::InvalidProjectId(_) => "INVALID_PROJECT_ID",
            Self::FilePathRequired => "FILE_PATH_REQUIRED",
            Self::ContextNotFound(_) => "CONTEXT_NOT_FOUND",
            Self::DiagramFailed(_) => "DIAGRAM_FAILED",
            Self::DeadlineExceeded(_) => "ANALYSIS_TIMEOUT",
            Self::Io(_) | Self::Json(_) => "STORE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// True for errors the caller can fix by changing the request.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::FilesRequired
                | Self::InvalidFile { .. }
                | Self::TooManyFiles { .. }
                | Self::GraphNotFound
                | Self::InvalidProjectId(_)
                | Self::FilePathRequired
                | Self::ContextNotFound(_)
                | Self::DiagramFailed(_)
        )
    }

    pub(crate) fn invalid_file(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidFile { index, reason: reason.into() }
    }
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;
