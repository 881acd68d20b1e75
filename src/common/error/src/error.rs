use thiserror::Error;

pub type LocatorResult<T> = std::result::Result<T, LocatorError>;

/// Workspace-wide error, the type every crate-local error converts into before
/// it crosses the host boundary.
#[derive(Debug, Error)]
pub enum LocatorError {
    /// A required identifier or setting is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// The rotated secret file is missing or unreadable.
    #[error("Credentials unavailable: {0}")]
    CredentialsUnavailable(String),
    /// The catalog service answered a request with a failure.
    #[error("Catalog service error: {0}")]
    ServiceError(String),
    #[error("Lookup timed out after {0}ms")]
    Timeout(u64),
    #[error("{0}")]
    TypeError(String),
    #[error("{0}")]
    ValueError(String),
    #[error("{0}")]
    InternalError(String),
    #[error("{0:?}")]
    IoError(#[from] std::io::Error),
    #[error("{0}")]
    ArrowError(#[from] arrow_schema::ArrowError),
}

impl LocatorError {
    /// Whether the error stems from caller or deployment input rather than the
    /// remote service.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_message_is_carried_verbatim() {
        let err = LocatorError::ServiceError(
            "User is not authorized to perform: glue:GetTables".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "Catalog service error: User is not authorized to perform: glue:GetTables"
        );
        assert!(!err.is_config_error());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LocatorError = io.into();
        assert!(matches!(err, LocatorError::IoError(_)));
    }
}
