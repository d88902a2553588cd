//! Error types shared by every table and matrix operation.

use std::path::PathBuf;

/// Coarse classification of a [`CellError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced file, column, layer or annotation is absent.
    NotFound,
    /// A target column or layer name is already taken.
    AlreadyExists,
    /// A column set disagrees with the established baseline.
    SchemaMismatch,
    /// Malformed input supplied by the caller.
    InvalidArgument,
    /// A file exists but cannot be read.
    PermissionDenied,
    /// A file has no data or is not tabular.
    EmptyOrMalformed,
    /// Unexpected failure in I/O or a columnar backend.
    Io,
}

/// Errors raised by table and matrix operations
#[derive(Debug, thiserror::Error)]
pub enum CellError {
    /// Input file does not exist
    #[error("The file '{}' does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// Input file exists but is not readable
    #[error("The file '{}' cannot be read due to insufficient permissions", .0.display())]
    PermissionDenied(PathBuf),

    /// Input file is empty or could not be parsed as delimited text
    #[error("The file '{}' could not be parsed: {reason}", .path.display())]
    EmptyOrMalformed {
        /// Offending file
        path: PathBuf,
        /// Parser diagnostic
        reason: String,
    },

    /// Column set of a file differs from the first file read
    #[error("Columns in '{source_name}' do not match the baseline schema: expected {expected:?}, got {found:?}")]
    SchemaMismatch {
        /// File or table the columns came from
        source_name: String,
        /// Baseline column names
        expected: Vec<String>,
        /// Column names found
        found: Vec<String>,
    },

    /// Column not present in a table
    #[error("Column '{0}' does not exist")]
    ColumnNotFound(String),

    /// Annotation not present on a matrix
    #[error("Annotation '{0}' does not exist")]
    AnnotationNotFound(String),

    /// Layer not present on a matrix
    #[error("Layer '{0}' does not exist")]
    LayerNotFound(String),

    /// Feature not present on a matrix
    #[error("Feature '{0}' does not exist")]
    FeatureNotFound(String),

    /// No per-file annotations were supplied for a loaded file
    #[error("Missing data in the annotations table for the file '{}'", .0.display())]
    MissingFileAnnotations(PathBuf),

    /// Column or layer name collides with an existing one
    #[error("'{0}' already exists")]
    AlreadyExists(String),

    /// Caller supplied a malformed argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Regular expression did not compile
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// CSV error while reading the annotation table
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CellError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound(_)
            | Self::ColumnNotFound(_)
            | Self::AnnotationNotFound(_)
            | Self::LayerNotFound(_)
            | Self::FeatureNotFound(_)
            | Self::MissingFileAnnotations(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::InvalidArgument(_) | Self::Regex(_) => ErrorKind::InvalidArgument,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::EmptyOrMalformed { .. } | Self::Csv(_) => ErrorKind::EmptyOrMalformed,
            Self::Io(_) | Self::Arrow(_) | Self::Parquet(_) | Self::Json(_) => ErrorKind::Io,
        }
    }
}
