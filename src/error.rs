use thiserror::Error;

/// Central error type for the vocal-dataset-core crate.
#[derive(Debug, Error)]
pub enum DatasetError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Domain-specific variants
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Alignment did not converge after {iterations} widenings (drift {delta})")]
    AlignmentDidNotConverge { iterations: usize, delta: i64 },

    #[error("Cache entry {path} is corrupt: {reason}")]
    CacheCorrupt { path: String, reason: String },
}

impl DatasetError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DatasetError::InvalidArgument(msg.into())
    }
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for DatasetError {
    fn from(e: std::io::Error) -> Self {
        DatasetError::Anyhow(e.into())
    }
}

impl From<serde_json::Error> for DatasetError {
    fn from(e: serde_json::Error) -> Self {
        DatasetError::Anyhow(e.into())
    }
}

impl From<hound::Error> for DatasetError {
    fn from(e: hound::Error) -> Self {
        DatasetError::Anyhow(e.into())
    }
}

impl From<symphonia::core::errors::Error> for DatasetError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        DatasetError::Anyhow(e.into())
    }
}

impl From<ndarray::ShapeError> for DatasetError {
    fn from(e: ndarray::ShapeError) -> Self {
        DatasetError::Anyhow(e.into())
    }
}

impl From<tempfile::PersistError> for DatasetError {
    fn from(e: tempfile::PersistError) -> Self {
        DatasetError::Anyhow(e.error.into())
    }
}

pub type Result<T> = std::result::Result<T, DatasetError>;
