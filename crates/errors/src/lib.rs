//! The wire error taxonomy shared by the adapter framework, the
//! `DatabaseManager`, the CDC engine, and the translator. Every fallible
//! public function in this workspace returns a `Result<_, DatabaseError>` (or
//! the narrower [`CdcError`] / [`TranslationError`]) -- nothing here panics or
//! exits the process; engine failures are always values.

use capability::DatabaseType;
use std::collections::BTreeMap;

/// The well-known error kinds from the wire error taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    NotFound,
    AlreadyExists,
    InvalidData,
    UnsupportedOperation,
    Unauthorized,
    Timeout,
    /// The manager holds a client for this database id, but it is not
    /// currently connected (or a `Connection::close` was called twice).
    Disconnected,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::InvalidData => "invalid_data",
            ErrorKind::UnsupportedOperation => "unsupported_operation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Disconnected => "disconnected",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A single-line, engine-name-prefixed error with a structured diagnostic
/// context map. `cause` is `None` for errors raised directly by this core
/// (e.g. `InvalidData`, `Disconnected`); it is `Some` when wrapping an
/// opaque failure surfaced by a vendor driver.
#[derive(Debug, thiserror::Error)]
#[error("{db_type}: {op} failed: {message}")]
pub struct DatabaseError {
    pub db_type: DatabaseType,
    pub op: &'static str,
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
    #[source]
    pub cause: Option<anyhow::Error>,
}

impl DatabaseError {
    pub fn new(db_type: DatabaseType, op: &'static str, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            db_type,
            op,
            kind,
            message: message.into(),
            context: BTreeMap::new(),
            cause: None,
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn not_found(db_type: DatabaseType, op: &'static str, what: impl Into<String>) -> Self {
        Self::new(db_type, op, ErrorKind::NotFound, format!("{} not found", what.into()))
    }

    pub fn disconnected(db_type: DatabaseType, op: &'static str) -> Self {
        Self::new(db_type, op, ErrorKind::Disconnected, "not connected")
    }

    pub fn unsupported(db_type: DatabaseType, op: &'static str, reason: impl Into<String>) -> Self {
        Self::new(db_type, op, ErrorKind::UnsupportedOperation, reason.into())
    }

    pub fn invalid_data(db_type: DatabaseType, op: &'static str, reason: impl Into<String>) -> Self {
        Self::new(db_type, op, ErrorKind::InvalidData, reason.into())
    }

    /// Wraps an opaque driver failure (connection refusal, auth failure,
    /// TLS error, ...) into the wire taxonomy. Each concrete adapter calls
    /// this as its `WrapError(dbType, op, cause)` helper.
    pub fn wrap(db_type: DatabaseType, op: &'static str, kind: ErrorKind, cause: anyhow::Error) -> Self {
        Self {
            db_type,
            op,
            kind,
            message: cause.to_string(),
            context: BTreeMap::new(),
            cause: Some(cause),
        }
    }
}

/// Errors surfaced by the CDC engine. Distinct from [`DatabaseError`]
/// because CDC failures carry a source id rather than a bare db type, and a
/// "fatal vs. transient" distinction that callers need to branch on (§4.5,
/// §7: transient errors log + retry, fatal errors stop the source).
#[derive(Debug, thiserror::Error)]
pub enum CdcError {
    #[error("replication source {source_id}: prerequisite not met: {reason}")]
    PrerequisiteNotMet { source_id: String, reason: String },

    #[error("replication source {source_id}: unsupported: {reason}")]
    Unsupported { source_id: String, reason: String },

    #[error("replication source {source_id}: transient failure: {0}", source_id = .source_id)]
    Transient {
        source_id: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("replication source {source_id}: fatal failure: {0}", source_id = .source_id)]
    Fatal {
        source_id: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("replication source {0} not found")]
    NotFound(String),
}

impl CdcError {
    /// True for failures that should stop the source rather than retry at
    /// the next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CdcError::Fatal { .. } | CdcError::PrerequisiteNotMet { .. })
    }
}

/// Errors that abort a translation request outright (as opposed to
/// warnings, which accumulate on the `TranslationResult`).
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("translation request is invalid: {0}")]
    InvalidRequest(String),

    #[error("no conversion path exists from {source} to {target}")]
    Impossible {
        source: DatabaseType,
        target: DatabaseType,
    },

    #[error("unrecognized database type: {0}")]
    UnrecognizedType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_error_keeps_cause_as_source() {
        use std::error::Error as _;
        let cause = anyhow::anyhow!("connection refused");
        let err = DatabaseError::wrap(DatabaseType::PostgreSql, "connect", ErrorKind::Connection, cause);
        assert!(err.source().is_some());
        assert_eq!(err.kind, ErrorKind::Connection);
    }

    #[test]
    fn disconnected_has_no_cause() {
        let err = DatabaseError::disconnected(DatabaseType::MySql, "close");
        assert!(err.cause.is_none());
        assert_eq!(err.kind, ErrorKind::Disconnected);
    }

    #[test]
    fn cdc_prerequisite_errors_are_fatal() {
        let err = CdcError::PrerequisiteNotMet {
            source_id: "src-1".into(),
            reason: "wal_level != logical".into(),
        };
        assert!(err.is_fatal());
    }

    #[test]
    fn cdc_transient_errors_are_not_fatal() {
        let err = CdcError::Transient {
            source_id: "src-1".into(),
            cause: anyhow::anyhow!("timeout"),
        };
        assert!(!err.is_fatal());
    }
}
