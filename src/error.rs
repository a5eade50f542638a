use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum UisError {
    #[error("dataset not found: {name}. Available datasets: {available}")]
    DatasetNotFound { name: String, available: String },

    #[error("{member} is not found in the archive")]
    MemberNotFound { member: String },

    #[error("region not found: {0}")]
    RegionNotFound(String),

    #[error("UIS request failed: {0}")]
    Transfer(String),

    #[error("UIS returned status {status}: {message}")]
    TransferStatus { status: u16, message: String },

    #[error("failed to parse tabular data: {0}")]
    Parse(String),

    #[error("{0} is not available for this dataset")]
    Unsupported(String),

    #[error("too many records requested: {0}")]
    OverLimit(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid dataset catalog: {0}")]
    InvalidCatalog(String),
}
