use thiserror::Error;

// ---------------------------------------------------------------------------
// WtdError – everything the library can fail with
// ---------------------------------------------------------------------------

/// Errors raised while ingesting, reconstructing or persisting a sensor column.
///
/// A cache miss that falls through to raw parsing is *not* an error; it never
/// surfaces as one of these variants.
#[derive(Debug, Error)]
pub enum WtdError {
    /// Missing or invalid option, malformed locator, unusable filter design.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing file, archive entry, cache store or cache key with no fallback left.
    #[error("not found: {0}")]
    NotFound(String),

    /// A parsed table lacks the expected columns or holds unreadable cells.
    #[error("format error: {0}")]
    Format(String),

    /// The entity is in the wrong state for the requested operation.
    #[error("state error: {0}")]
    State(String),

    /// Out-of-range selection bounds or windows.
    #[error("validation error: {0}")]
    Validation(String),

    /// Signal reconstruction could not complete (e.g. not enough samples at a gap edge).
    #[error("reconstruction error: {0}")]
    Reconstruction(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),
}

impl WtdError {
    /// `true` for the not-found family, which the cache-aside loader recovers from.
    pub fn is_not_found(&self) -> bool {
        match self {
            WtdError::NotFound(_) => true,
            WtdError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WtdError>;
