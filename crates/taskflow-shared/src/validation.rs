//! Checks that run before any request is sent to the backend.

use thiserror::Error;

use crate::constants::MIN_PASSWORD_LEN;
use crate::error::{ClassifiedError, ErrorKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a valid email address.")]
    MalformedEmail,

    #[error("Password should be at least {min} characters.")]
    PasswordTooShort { min: usize },

    #[error("Task text cannot be empty.")]
    EmptyTaskText,

    #[error("You must be signed in to do that.")]
    NotSignedIn,
}

impl From<ValidationError> for ClassifiedError {
    fn from(err: ValidationError) -> Self {
        let kind = match err {
            ValidationError::MalformedEmail => ErrorKind::InvalidCredentialFormat,
            ValidationError::PasswordTooShort { .. } => ErrorKind::WeakPassword,
            ValidationError::EmptyTaskText | ValidationError::NotSignedIn => {
                ErrorKind::ValidationFailure
            }
        };
        ClassifiedError::new(kind, err.to_string())
    }
}

/// Accepts `local@domain.tld`: one `@`, no whitespace, a dotted domain
/// whose labels are non-empty.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::MalformedEmail);
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or(ValidationError::MalformedEmail)?;

    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(ValidationError::MalformedEmail);
    }
    if domain.split('.').any(str::is_empty) {
        return Err(ValidationError::MalformedEmail);
    }
    Ok(())
}

/// Length is counted in characters, not bytes.
pub fn validate_new_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Returns the trimmed text, or an error if nothing is left.
pub fn normalize_task_text(text: &str) -> Result<&str, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTaskText);
    }
    Ok(trimmed)
}
