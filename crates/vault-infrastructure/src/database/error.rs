//! sqlx error mapping, by SQLSTATE

use sqlx::error::ErrorKind;
use tracing::{error, warn};
use vault_core::error::DomainError;

/// Map a driver error onto the domain taxonomy.
///
/// Unique violations come back as `DatabaseError`; callers that give them a meaning check
/// [`unique_violation`] first.
pub fn map_db_error(err: sqlx::Error) -> DomainError {
    match &err {
        sqlx::Error::PoolTimedOut => {
            error!("Connection pool timed out");
            return DomainError::ConnectionTimeout("connection pool timed out".into());
        }
        sqlx::Error::PoolClosed => {
            return DomainError::ConnectionError("connection pool closed".into());
        }
        sqlx::Error::Io(e) => {
            error!(error = %e, "Database I/O error");
            return DomainError::ConnectionError(e.to_string());
        }
        sqlx::Error::Tls(e) => return DomainError::ConnectionError(e.to_string()),
        sqlx::Error::RowNotFound => return DomainError::DatabaseError("row not found".into()),
        _ => {}
    }

    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code().as_deref() {
            match code {
                // connection_exception class
                c if c.starts_with("08") => {
                    error!(error_code = c, "Database connection exception");
                    return DomainError::ConnectionError(db_err.message().to_string());
                }
                // too_many_connections
                "53300" => {
                    warn!(error_code = code, "Database refused connection");
                    return DomainError::ConnectionError(db_err.message().to_string());
                }
                // query_canceled (statement_timeout)
                "57014" => {
                    warn!(error_code = code, "Statement timed out");
                    return DomainError::ConnectionTimeout(db_err.message().to_string());
                }
                "23505" | "23503" | "23502" | "23514" => {
                    warn!(error_code = code, message = db_err.message(), "Constraint violation");
                    return DomainError::DatabaseError(db_err.message().to_string());
                }
                _ => {}
            }
        }
    }

    error!(error = %err, "Unhandled database error");
    DomainError::DatabaseError(err.to_string())
}

/// Caller-safe description of a driver error: the SQLSTATE when there is one, never the
/// server's message text. Log `err` itself next to it.
pub fn public_cause(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => format!("database error (SQLSTATE {})", code),
            None => "database error".to_string(),
        },
        sqlx::Error::PoolTimedOut => "connection pool timed out".to_string(),
        sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            "database connection failed".to_string()
        }
        _ => "database error".to_string(),
    }
}

/// Name of the violated unique constraint or index, if `err` is a unique violation.
pub fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.kind() == ErrorKind::UniqueViolation => {
            Some(db_err.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_retryable_timeout() {
        let mapped = map_db_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(mapped, DomainError::ConnectionTimeout(_)));
        assert!(mapped.is_retryable());
    }

    #[test]
    fn test_pool_closed_is_connection_error() {
        assert!(matches!(
            map_db_error(sqlx::Error::PoolClosed),
            DomainError::ConnectionError(_)
        ));
    }

    #[test]
    fn test_other_errors_are_database_errors() {
        let mapped = map_db_error(sqlx::Error::ColumnNotFound("x".into()));
        assert!(matches!(mapped, DomainError::DatabaseError(_)));
        assert!(!mapped.is_retryable());
        assert!(unique_violation(&sqlx::Error::PoolTimedOut).is_none());
    }

    #[test]
    fn test_public_cause_drops_driver_text() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connect to 10.0.0.5:5432 refused",
        ));
        assert_eq!(public_cause(&io), "database connection failed");

        let column = sqlx::Error::ColumnNotFound("secret_column".into());
        assert!(!public_cause(&column).contains("secret_column"));
        assert_eq!(public_cause(&sqlx::Error::PoolTimedOut), "connection pool timed out");
    }
}
