use thiserror::Error;

/// Machine codes reported by the auth provider and document store.
pub mod codes {
    pub const USER_NOT_FOUND: &str = "auth/user-not-found";
    pub const WRONG_PASSWORD: &str = "auth/wrong-password";
    pub const INVALID_CREDENTIAL: &str = "auth/invalid-credential";
    pub const EMAIL_ALREADY_IN_USE: &str = "auth/email-already-in-use";
    pub const WEAK_PASSWORD: &str = "auth/weak-password";
    pub const INVALID_EMAIL: &str = "auth/invalid-email";
    pub const CONFIGURATION_NOT_FOUND: &str = "auth/configuration-not-found";
    pub const OPERATION_NOT_ALLOWED: &str = "auth/operation-not-allowed";
    pub const ADMIN_RESTRICTED_OPERATION: &str = "auth/admin-restricted-operation";
    pub const NETWORK_REQUEST_FAILED: &str = "auth/network-request-failed";

    pub const PERMISSION_DENIED: &str = "permission-denied";
    pub const INVALID_ARGUMENT: &str = "invalid-argument";
    pub const NOT_FOUND: &str = "not-found";
    pub const UNAVAILABLE: &str = "unavailable";
    pub const INTERNAL: &str = "internal";
}

/// A raw failure reported by the backend, before classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(codes::PERMISSION_DENIED, message)
    }
}

/// Errors produced while loading or saving persisted backend state.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the state directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The state file exists but is not valid JSON for this version.
    #[error("Corrupt state file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
