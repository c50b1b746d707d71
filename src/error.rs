use arrow_schema::{ArrowError, DataType};
use parquet::errors::ParquetError;
use thiserror::Error;

/// Errors raised while discovering, filtering or reading a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The caller asked for something the dataset cannot provide
    ///
    /// Raised for unknown filter or output columns, conflicting column
    /// selections and malformed partition directories.
    #[error("{message}")]
    Usage {
        /// Human readable description of the mistake
        message: String,
    },

    /// Partitioning schema, file schema and requested schema disagree
    #[error("{message}")]
    SchemaConflict {
        /// Human readable description of the conflict
        message: String,
    },

    /// An operation met a column type it has no implementation for
    #[error("{operation} for column '{column}' does not support arrays with type {data_type}")]
    UnsupportedType {
        /// Name of the operation, e.g. "Integer range filter"
        operation: &'static str,
        /// Column being evaluated
        column: String,
        /// Encountered type
        data_type: DataType,
    },

    /// The row mask cannot be applied to this array encoding
    #[error("Filtering an array of type {data_type} is not implemented")]
    UnsupportedArray {
        /// Encountered type
        data_type: DataType,
    },

    /// The stream was cancelled before this read
    #[error("Dataset scan was cancelled")]
    Cancelled,

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatasetError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        DatasetError::Usage {
            message: message.into(),
        }
    }

    pub(crate) fn schema_conflict(message: impl Into<String>) -> Self {
        DatasetError::SchemaConflict {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported_type(
        operation: &'static str,
        column: impl Into<String>,
        data_type: &DataType,
    ) -> Self {
        DatasetError::UnsupportedType {
            operation,
            column: column.into(),
            data_type: data_type.clone(),
        }
    }
}

pub type Result<T, E = DatasetError> = std::result::Result<T, E>;
