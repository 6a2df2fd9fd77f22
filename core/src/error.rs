use thiserror::Error;

#[derive(Error, Debug)]
pub enum PotentialError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error on source '{source_name}': {error}")]
    SourceUnreadable {
        source_name: String,
        #[source]
        error: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PotentialResult<T> = Result<T, PotentialError>;

/// Why a single raw row could not become an `InputRecord`.
/// Always recovered by the loader: the row is dropped and reported.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowParseError {
    #[error("field '{field}' is not a finite number: {value}")]
    NonFinite { field: &'static str, value: String },

    #[error("field '{field}' does not fit an integer: {value}")]
    IntegerOutOfRange { field: &'static str, value: String },

    #[error("line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}
