use thiserror::Error;

/// Core error type for reportd operations.
#[derive(Error, Debug)]
pub enum ReportdError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique constraint rejected a write. Carries the constraint name so
    /// callers can tell an idempotency-key collision from an artifact
    /// collision and resolve it instead of surfacing it.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("producer error: {0}")]
    Producer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ReportdError {
    /// Classify a sqlx error, lifting Postgres unique-constraint violations
    /// (SQLSTATE 23505) into `UniqueViolation` with the collided constraint.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return Self::UniqueViolation { constraint };
            }
        }
        Self::Database(err)
    }

    /// Whether this error is a unique violation on the named constraint.
    pub fn is_unique_violation_on(&self, name: &str) -> bool {
        matches!(self, Self::UniqueViolation { constraint } if constraint == name)
    }
}

impl From<serde_json::Error> for ReportdError {
    fn from(e: serde_json::Error) -> Self {
        ReportdError::Serialization(e.to_string())
    }
}

/// Result type alias using ReportdError.
pub type Result<T> = std::result::Result<T, ReportdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_matching() {
        let err = ReportdError::UniqueViolation {
            constraint: "reports_idempotency_key_key".to_string(),
        };
        assert!(err.is_unique_violation_on("reports_idempotency_key_key"));
        assert!(!err.is_unique_violation_on("report_artifacts_report_id_key"));
    }

    #[test]
    fn test_non_unique_errors_do_not_match() {
        let err = ReportdError::Validation("bad input".to_string());
        assert!(!err.is_unique_violation_on("reports_idempotency_key_key"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ReportdError = json_err.into();
        assert!(matches!(err, ReportdError::Serialization(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ReportdError::NotFound("report 123".to_string());
        assert_eq!(err.to_string(), "not found: report 123");
    }
}
