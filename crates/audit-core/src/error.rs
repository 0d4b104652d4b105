//! Error types for the replica audit.

use crate::compare::RowMismatch;
use crate::fetch::Side;
use crate::row::RowId;
use thiserror::Error;

/// Boxed error coming from a database driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// `e` followed by all of its sources, separated by `: `.
pub fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.ends_with(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

/// Errors returned by a [`RowFetcher`](crate::fetch::RowFetcher).
#[derive(Error, Debug)]
pub enum FetchError {
    /// The database could not be reached or rejected the credentials.
    #[error("connection failed: {0}")]
    Connection(#[source] BoxError),

    /// A statement failed to execute.
    #[error("query failed: {0}")]
    Query(#[source] BoxError),

    /// A column value could not be decoded.
    #[error("failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A column has a type the fetcher cannot represent.
    #[error("unsupported type '{type_name}' in column '{column}'")]
    UnsupportedType { column: String, type_name: String },

    /// A row came back without an integer "id" column.
    #[error("row has no integer \"id\" column")]
    MissingId,
}

impl FetchError {
    /// Short machine-readable name of the error class.
    pub fn class(&self) -> &'static str {
        match self {
            FetchError::Connection(_) => "connection_error",
            FetchError::Query(_) => "query_error",
            FetchError::Decode { .. } | FetchError::UnsupportedType { .. } => "decode_error",
            FetchError::MissingId => "missing_id",
        }
    }
}

/// Fatal audit errors. The first one raised ends the run.
#[derive(Error, Debug)]
pub enum AuditError {
    /// The audit configuration cannot produce a valid run.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A query against one of the databases failed.
    #[error("{side} database error: {source}")]
    Fetch {
        side: Side,
        #[source]
        source: FetchError,
    },

    /// A sampled row differs between primary and downstream.
    #[error("rows at id = {} are different ({})", .0.id, .0.kind)]
    SampleMismatch(Box<RowMismatch>),

    /// The recent-row windows have different sizes on each side.
    #[error(
        "last rows: primary returned {primary} rows but downstream returned {downstream}"
    )]
    RecencyCount { primary: usize, downstream: usize },

    /// The same id appeared twice in one side's recent-row window.
    #[error("last rows: {side} returned id = {id} more than once")]
    RecencyDuplicateId { side: Side, id: RowId },

    /// A recently written row differs between primary and downstream.
    #[error("last rows: rows at id = {} are different ({})", .0.id, .0.kind)]
    RecencyMismatch(Box<RowMismatch>),
}

impl AuditError {
    pub(crate) fn fetch(side: Side) -> impl FnOnce(FetchError) -> AuditError {
        move |source| AuditError::Fetch { side, source }
    }

    /// Diverging rows attached to the error, if any.
    pub fn mismatch(&self) -> Option<&RowMismatch> {
        match self {
            AuditError::SampleMismatch(m) | AuditError::RecencyMismatch(m) => Some(m),
            _ => None,
        }
    }

    /// Short machine-readable name of the error class.
    pub fn class(&self) -> &'static str {
        match self {
            AuditError::InvalidConfig(_) => "invalid_config",
            AuditError::Fetch { source, .. } => source.class(),
            AuditError::SampleMismatch(_) => "sample_mismatch",
            AuditError::RecencyCount { .. } => "recency_count",
            AuditError::RecencyDuplicateId { .. } => "recency_duplicate_id",
            AuditError::RecencyMismatch(_) => "recency_mismatch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fmt;

    #[derive(Debug)]
    struct Layer {
        message: &'static str,
        source: Option<Box<Layer>>,
    }

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message)
        }
    }

    impl Error for Layer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.source.as_deref().map(|e| e as &(dyn Error + 'static))
        }
    }

    fn fetch_error(source: FetchError) -> AuditError {
        AuditError::fetch(Side::Downstream)(source)
    }

    #[test]
    fn test_fetch_error_classes() {
        assert_eq!(
            fetch_error(FetchError::Connection("refused".into())).class(),
            "connection_error"
        );
        assert_eq!(
            fetch_error(FetchError::Query("syntax error".into())).class(),
            "query_error"
        );
        let decode = fetch_error(FetchError::Decode {
            column: "amount".to_string(),
            message: "out of range".to_string(),
        });
        assert_eq!(decode.class(), "decode_error");
        assert_eq!(
            decode.to_string(),
            "downstream database error: failed to decode column 'amount': out of range"
        );
        assert_eq!(
            fetch_error(FetchError::UnsupportedType {
                column: "shape".to_string(),
                type_name: "polygon".to_string(),
            })
            .class(),
            "decode_error"
        );
        assert_eq!(fetch_error(FetchError::MissingId).class(), "missing_id");
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let e = Layer {
            message: "error deserializing column 1",
            source: Some(Box::new(Layer {
                message: "numeric value is NaN",
                source: None,
            })),
        };
        assert_eq!(
            error_chain(&e),
            "error deserializing column 1: numeric value is NaN"
        );
    }

    #[test]
    fn test_error_chain_skips_repeated_source() {
        let e = Layer {
            message: "query failed: timeout",
            source: Some(Box::new(Layer {
                message: "timeout",
                source: None,
            })),
        };
        assert_eq!(error_chain(&e), "query failed: timeout");
    }
}
