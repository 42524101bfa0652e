//! Error types for query execution and schema lookup

use thiserror::Error;

use crate::gate::RejectReason;

/// Errors surfaced by the database side of the server
///
/// Safety rejections and execution failures are separate variants so callers
/// can branch without inspecting message text.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The safety gate refused the query; it never reached the database
    #[error("Query rejected: {0}")]
    Rejected(#[from] RejectReason),

    /// Could not open a connection
    #[error("Connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    /// The database rejected or failed the statement
    #[error("Query execution failed: {0}")]
    Execution(#[source] sqlx::Error),

    /// A returned value could not be decoded
    #[error("Failed to decode column '{column}': {source}")]
    Decode {
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Query timed out after {0}s")]
    Timeout(u64),

    #[error("Config error: {0}")]
    Config(String),
}

impl QueryError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, QueryError::Rejected(_))
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_from_reason() {
        let err: QueryError = RejectReason::NotSelect.into();
        assert!(err.is_rejection());
        assert_eq!(err.to_string(), "Query rejected: query must start with SELECT");
    }

    #[test]
    fn test_execution_error_is_not_rejection() {
        let err = QueryError::Execution(sqlx::Error::RowNotFound);
        assert!(!err.is_rejection());
        assert!(err.to_string().starts_with("Query execution failed:"));
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(QueryError::Timeout(30).to_string(), "Query timed out after 30s");
    }
}
