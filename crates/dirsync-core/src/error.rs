//! Error types for directory provisioning and synchronization.
//!
//! Errors carry a transient/permanent classification: only connection-class
//! failures are worth retrying, and retry policy belongs to the caller.

use thiserror::Error;

use crate::ids::ProviderId;

/// Error that can occur while provisioning against or synchronizing from a
/// directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    // Connection errors (transient)
    /// Failed to reach the directory server.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Authentication errors (permanent)
    /// The bind credentials were rejected.
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    // Configuration errors (permanent)
    /// Provider or connection settings are bad or incomplete.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// No provider registered under the given id.
    #[error("provider not found: {provider_id}")]
    ProviderNotFound { provider_id: ProviderId },

    /// No mapper bound to the provider under the given name.
    #[error("mapper '{name}' not found for provider {provider_id}")]
    MapperNotFound {
        provider_id: ProviderId,
        name: String,
    },

    // Entry errors
    /// Referenced directory or local entry does not exist.
    #[error("object not found: {identifier}")]
    ObjectNotFound { identifier: String },

    /// Duplicate DN, username, or path on create.
    #[error("object already exists: {identifier}")]
    ObjectAlreadyExists { identifier: String },

    /// An entry carried data the operation cannot work with.
    #[error("invalid data: {message}")]
    InvalidData { message: String },

    // Synchronization errors
    /// A synchronization pass aborted after partial discovery. Nothing was
    /// committed to the local store.
    #[error("synchronization aborted: {message}")]
    SyncAborted { message: String },

    // Catch-all for directory-level operation failures
    /// The directory rejected the operation.
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DirectoryError {
    /// Check if this error is transient and the operation may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, DirectoryError::ConnectionFailed { .. })
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            DirectoryError::AuthenticationFailed => "AUTH_FAILED",
            DirectoryError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            DirectoryError::ProviderNotFound { .. } => "PROVIDER_NOT_FOUND",
            DirectoryError::MapperNotFound { .. } => "MAPPER_NOT_FOUND",
            DirectoryError::ObjectNotFound { .. } => "OBJECT_NOT_FOUND",
            DirectoryError::ObjectAlreadyExists { .. } => "OBJECT_EXISTS",
            DirectoryError::InvalidData { .. } => "INVALID_DATA",
            DirectoryError::SyncAborted { .. } => "SYNC_ABORTED",
            DirectoryError::OperationFailed { .. } => "OPERATION_FAILED",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        DirectoryError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create an object not found error.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        DirectoryError::ObjectNotFound {
            identifier: identifier.into(),
        }
    }

    /// Create a duplicate-object error.
    pub fn conflict(identifier: impl Into<String>) -> Self {
        DirectoryError::ObjectAlreadyExists {
            identifier: identifier.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        DirectoryError::InvalidData {
            message: message.into(),
        }
    }

    /// Create a sync-aborted error.
    pub fn sync_aborted(message: impl Into<String>) -> Self {
        DirectoryError::SyncAborted {
            message: message.into(),
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failed error with source.
    pub fn operation_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DirectoryError::connection_failed("down").is_transient());
        assert!(!DirectoryError::connection_failed("down").is_permanent());

        let permanent = vec![
            DirectoryError::AuthenticationFailed,
            DirectoryError::invalid_config("bad"),
            DirectoryError::not_found("cn=x"),
            DirectoryError::conflict("cn=x"),
            DirectoryError::sync_aborted("unreachable"),
        ];
        for err in permanent {
            assert!(err.is_permanent(), "expected {} permanent", err.error_code());
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(DirectoryError::not_found("x").error_code(), "OBJECT_NOT_FOUND");
        assert_eq!(DirectoryError::conflict("x").error_code(), "OBJECT_EXISTS");
        assert_eq!(
            DirectoryError::connection_failed("x").error_code(),
            "CONNECTION_FAILED"
        );
    }

    #[test]
    fn test_error_display() {
        let err = DirectoryError::not_found("uid=john,ou=People,dc=test");
        assert_eq!(err.to_string(), "object not found: uid=john,ou=People,dc=test");
    }

    #[test]
    fn test_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = DirectoryError::connection_failed_with_source("bind failed", source);
        if let DirectoryError::ConnectionFailed { source, .. } = &err {
            assert!(source.is_some());
        } else {
            panic!("expected ConnectionFailed variant");
        }
    }
}
