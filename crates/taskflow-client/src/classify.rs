//! Mapping of raw backend failures to [`ClassifiedError`]s.
//!
//! Nothing above the Session Gate and Task List Store ever sees a
//! [`BackendError`]; both translate at their boundary with the functions
//! below.

use taskflow_shared::{ClassifiedError, ErrorKind};
use taskflow_store::{codes, BackendError};

/// Which sign-in method produced an auth failure. Decides how a disabled
/// provider is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    EmailPassword,
    Anonymous,
}

/// Task-side request that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOperation {
    Subscribe,
    Add,
    Toggle,
    Remove,
}

impl TaskOperation {
    fn context(&self) -> &'static str {
        match self {
            TaskOperation::Subscribe => "Database error",
            TaskOperation::Add => "Failed to add task",
            TaskOperation::Toggle => "Failed to update task",
            TaskOperation::Remove => "Failed to delete task",
        }
    }
}

fn is_provider_disabled(code: &str) -> bool {
    matches!(
        code,
        codes::CONFIGURATION_NOT_FOUND
            | codes::OPERATION_NOT_ALLOWED
            | codes::ADMIN_RESTRICTED_OPERATION
    )
}

pub fn classify_auth(err: &BackendError, method: AuthMethod) -> ClassifiedError {
    let (kind, message) = match err.code.as_str() {
        codes::USER_NOT_FOUND => (ErrorKind::AccountNotFound, "No account found with this email."),
        codes::WRONG_PASSWORD | codes::INVALID_CREDENTIAL => {
            (ErrorKind::WrongPassword, "Incorrect password.")
        }
        codes::EMAIL_ALREADY_IN_USE => (
            ErrorKind::AccountAlreadyExists,
            "An account with this email already exists.",
        ),
        codes::WEAK_PASSWORD => (
            ErrorKind::WeakPassword,
            "Password should be at least 6 characters.",
        ),
        codes::INVALID_EMAIL => (
            ErrorKind::InvalidCredentialFormat,
            "Please enter a valid email address.",
        ),
        code if is_provider_disabled(code) => match method {
            AuthMethod::EmailPassword => (
                ErrorKind::ProviderMisconfigured,
                "Email authentication is not enabled. Please enable it in the backend console.",
            ),
            AuthMethod::Anonymous => (
                ErrorKind::ProviderMisconfigured,
                "Guest sign-in is not enabled. Please enable anonymous authentication in the backend console.",
            ),
        },
        codes::PERMISSION_DENIED => (
            ErrorKind::PermissionDenied,
            "You do not have permission to do that.",
        ),
        _ => (
            ErrorKind::TransientBackendFailure,
            "An error occurred. Please try again.",
        ),
    };
    ClassifiedError::new(kind, message)
}

pub fn classify_task(err: &BackendError, op: TaskOperation) -> ClassifiedError {
    let kind = match err.code.as_str() {
        codes::PERMISSION_DENIED => ErrorKind::PermissionDenied,
        codes::INVALID_ARGUMENT | codes::NOT_FOUND => ErrorKind::ValidationFailure,
        code if is_provider_disabled(code) => ErrorKind::ProviderMisconfigured,
        _ => ErrorKind::TransientBackendFailure,
    };
    ClassifiedError::new(kind, format!("{}: {}", op.context(), err.message))
}

pub fn classify_sign_out(err: &BackendError) -> ClassifiedError {
    ClassifiedError::new(
        ErrorKind::TransientBackendFailure,
        format!("Failed to sign out: {}", err.message),
    )
}
