use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain-meaningful failure kinds surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidCredentialFormat,
    AccountAlreadyExists,
    AccountNotFound,
    WrongPassword,
    WeakPassword,
    /// A required auth method or service is disabled on the backend project.
    ProviderMisconfigured,
    PermissionDenied,
    TransientBackendFailure,
    /// Rejected locally; never reaches the backend.
    ValidationFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidCredentialFormat => "invalid-credential-format",
            ErrorKind::AccountAlreadyExists => "account-already-exists",
            ErrorKind::AccountNotFound => "account-not-found",
            ErrorKind::WrongPassword => "wrong-password",
            ErrorKind::WeakPassword => "weak-password",
            ErrorKind::ProviderMisconfigured => "provider-misconfigured",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::TransientBackendFailure => "transient-backend-failure",
            ErrorKind::ValidationFailure => "validation-failure",
        }
    }

    /// Whether the failure concerns the submitted credentials.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidCredentialFormat
                | ErrorKind::AccountAlreadyExists
                | ErrorKind::AccountNotFound
                | ErrorKind::WrongPassword
                | ErrorKind::WeakPassword
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend or validation failure mapped to an [`ErrorKind`] and a
/// user-facing message. This is the only error shape the view ever sees.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailure, message)
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::ValidationFailure
    }
}
