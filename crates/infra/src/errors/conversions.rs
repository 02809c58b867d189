//! Conversions from external infrastructure errors into domain errors.

use callstats_domain::CallStatsError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CallStatsError);

impl From<InfraError> for CallStatsError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CallStatsError> for InfraError {
    fn from(value: CallStatsError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCallStatsError {
    fn into_callstats(self) -> CallStatsError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CallStatsError */
/* -------------------------------------------------------------------------- */

impl IntoCallStatsError for SqlError {
    fn into_callstats(self) -> CallStatsError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CallStatsError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CallStatsError::Database("database is locked".into())
                    }
                    // SQLITE_CONSTRAINT_PRIMARYKEY / SQLITE_CONSTRAINT_UNIQUE
                    (ErrorCode::ConstraintViolation, 1555 | 2067) => {
                        CallStatsError::Database(format!("unique constraint violation: {message}"))
                    }
                    (ErrorCode::CannotOpen, _) => {
                        CallStatsError::Unavailable(format!("unable to open database: {message}"))
                    }
                    (ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt, _) => {
                        CallStatsError::Unavailable(format!("database file is unusable: {message}"))
                    }
                    _ => CallStatsError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CallStatsError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CallStatsError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CallStatsError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                CallStatsError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidParameterName(parameter_name) => {
                CallStatsError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => CallStatsError::Unavailable(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => CallStatsError::Database("invalid SQL query".into()),
            other => CallStatsError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_callstats())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → CallStatsError */
/* -------------------------------------------------------------------------- */

impl IntoCallStatsError for r2d2::Error {
    fn into_callstats(self) -> CallStatsError {
        CallStatsError::Unavailable(format!("connection pool error: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_callstats())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → CallStatsError */
/* -------------------------------------------------------------------------- */

impl IntoCallStatsError for std::io::Error {
    fn into_callstats(self) -> CallStatsError {
        match self.kind() {
            std::io::ErrorKind::NotFound => CallStatsError::NotFound(self.to_string()),
            _ => CallStatsError::Storage(self.to_string()),
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_callstats())
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → CallStatsError */
/* -------------------------------------------------------------------------- */

impl IntoCallStatsError for tokio::task::JoinError {
    fn into_callstats(self) -> CallStatsError {
        if self.is_cancelled() {
            CallStatsError::Internal("blocking task cancelled".into())
        } else {
            CallStatsError::Internal(format!("blocking task panicked: {self}"))
        }
    }
}

impl From<tokio::task::JoinError> for InfraError {
    fn from(value: tokio::task::JoinError) -> Self {
        InfraError(value.into_callstats())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use rusqlite::Error as SqlError;

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: CallStatsError = InfraError::from(err).into();
        match mapped {
            CallStatsError::Database(msg) => {
                assert!(msg.contains("busy") || msg.contains("locked"));
            }
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn primary_key_violation_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 1555 },
            Some("UNIQUE constraint failed: metric_records.id".into()),
        );

        let mapped: CallStatsError = InfraError::from(err).into();
        match mapped {
            CallStatsError::Database(msg) => assert!(msg.contains("unique")),
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn cannot_open_maps_to_unavailable() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::CannotOpen, extended_code: 14 },
            Some("unable to open database file".into()),
        );

        let mapped: CallStatsError = InfraError::from(err).into();
        assert!(mapped.is_unavailable());
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let mapped: CallStatsError = InfraError::from(err).into();
        assert!(matches!(mapped, CallStatsError::NotFound(_)));
    }
}
