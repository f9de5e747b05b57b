//! Error types for directory operations.
//!
//! The first group of variants mirrors the LDAP result codes the mock directory can raise
//! (RFC 4511 section 4.1.9). The remaining variants cover configuration and client-side
//! failures that never travel over the wire.

use thiserror::Error;

/// Main error type for mockldap operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The bound identity may not perform the operation
    #[error("Insufficient access rights: {0}")]
    InsufficientAccessRights(String),

    /// Bind credentials were rejected
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// An entry with the same relative name already exists
    #[error("Entry already exists: {0}")]
    EntryAlreadyExists(String),

    /// The target entry does not exist
    #[error("No such object: {0}")]
    NoSuchObject(String),

    /// The target attribute is not set on the entry
    #[error("No such attribute: {0}")]
    NoSuchAttribute(String),

    /// The request was malformed at the protocol level
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// A distinguished name could not be parsed
    #[error("Invalid DN syntax: {0}")]
    InvalidDnSyntax(String),

    /// The bind used an authentication method other than simple
    #[error("Authentication method not supported: {0}")]
    AuthMethodNotSupported(String),

    /// The server does not implement the requested operation
    #[error("Unwilling to perform: {0}")]
    UnwillingToPerform(String),

    /// A search returned more entries than the requested size limit
    #[error("Size limit exceeded: {0}")]
    SizeLimitExceeded(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// External service error
    #[error("External service error: {service}: {message}")]
    ExternalServiceError {
        /// Service name that failed
        service: String,
        /// Error message
        message: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Specialized result type for mockldap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// LDAP result code `other`, used for failures without a dedicated code.
pub const RESULT_CODE_OTHER: u32 = 80;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientAccessRights(_) => "INSUFFICIENT_ACCESS_RIGHTS",
            Self::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            Self::EntryAlreadyExists(_) => "ENTRY_ALREADY_EXISTS",
            Self::NoSuchObject(_) => "NO_SUCH_OBJECT",
            Self::NoSuchAttribute(_) => "NO_SUCH_ATTRIBUTE",
            Self::ProtocolError(_) => "PROTOCOL_ERROR",
            Self::InvalidDnSyntax(_) => "INVALID_DN_SYNTAX",
            Self::AuthMethodNotSupported(_) => "AUTH_METHOD_NOT_SUPPORTED",
            Self::UnwillingToPerform(_) => "UNWILLING_TO_PERFORM",
            Self::SizeLimitExceeded(_) => "SIZE_LIMIT_EXCEEDED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::ExternalServiceError { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the numeric LDAP result code reported for this error.
    #[must_use]
    pub const fn result_code(&self) -> u32 {
        match self {
            Self::ProtocolError(_) => 2,
            Self::SizeLimitExceeded(_) => 4,
            Self::AuthMethodNotSupported(_) => 7,
            Self::NoSuchAttribute(_) => 16,
            Self::NoSuchObject(_) => 32,
            Self::InvalidDnSyntax(_) => 34,
            Self::InvalidCredentials(_) => 49,
            Self::InsufficientAccessRights(_) => 50,
            Self::UnwillingToPerform(_) => 53,
            Self::EntryAlreadyExists(_) => 68,
            _ => RESULT_CODE_OTHER,
        }
    }

    /// Rebuilds a typed error from a non-success LDAP result code received by a client.
    ///
    /// Codes without a dedicated variant become [`Error::ExternalServiceError`].
    #[must_use]
    pub fn from_result_code(code: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            2 => Self::ProtocolError(message),
            4 => Self::SizeLimitExceeded(message),
            7 => Self::AuthMethodNotSupported(message),
            16 => Self::NoSuchAttribute(message),
            32 => Self::NoSuchObject(message),
            34 => Self::InvalidDnSyntax(message),
            49 => Self::InvalidCredentials(message),
            50 => Self::InsufficientAccessRights(message),
            53 => Self::UnwillingToPerform(message),
            68 => Self::EntryAlreadyExists(message),
            other => Self::ExternalServiceError {
                service: "ldap".to_string(),
                message: format!("result code {other}: {message}"),
            },
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::InternalError(_) | Self::ConfigError(_) | Self::ExternalServiceError { .. }
        )
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(format!("invalid server address: {err}"))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
