use thiserror::Error;

/// Failure of an external capability (embedding or generation backend).
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("capability request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported index format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("vector dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { found: usize, expected: usize },

    #[error("index was built with embedding model '{indexed}' but '{requested}' was used to query it")]
    EmbeddingMismatch { indexed: String, requested: String },

    #[error("{vectors} vectors supplied for {texts} texts")]
    LengthMismatch { vectors: usize, texts: usize },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding failed: {0}")]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no index found for document '{key}'")]
    IndexNotFound { key: String },

    #[error("upstream capability failed: {0}")]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification surfaced to clients alongside the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    IndexNotFound,
    Upstream,
    Pdf,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::IndexNotFound => "index_not_found",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Pdf => "pdf",
            ErrorKind::Internal => "internal",
        }
    }
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::InvalidArgument(_) => ErrorKind::InvalidInput,
            IngestError::PdfParse(_) => ErrorKind::Pdf,
            IngestError::Capability(_) => ErrorKind::Upstream,
            IngestError::Io(_) | IngestError::InvalidChunkConfig(_) | IngestError::Index(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::InvalidArgument(_) => ErrorKind::InvalidInput,
            QueryError::IndexNotFound { .. } => ErrorKind::IndexNotFound,
            QueryError::Capability(_) => ErrorKind::Upstream,
            QueryError::Index(_) | QueryError::Io(_) => ErrorKind::Internal,
        }
    }
}
