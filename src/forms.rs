//! Input validation for the login and settings forms.
//!
//! Failures here stay on the form; the session store never sees them.

use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Please fill in all fields")]
    MissingFields,
    #[error("New password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,
    #[error("New passwords do not match")]
    PasswordMismatch,
    #[error("New password must differ from the current one")]
    PasswordUnchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub identifier: String,
    pub secret: String,
}

/// Credentials ready to hand to the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl LoginForm {
    pub fn new(identifier: &str, secret: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            secret: secret.to_string(),
        }
    }

    /// The identifier is trimmed; the secret is taken as typed.
    pub fn validate(&self) -> Result<Credentials, FormError> {
        let identifier = self.identifier.trim();
        if identifier.is_empty() || self.secret.is_empty() {
            return Err(FormError::MissingFields);
        }
        Ok(Credentials {
            identifier: identifier.to_string(),
            secret: self.secret.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordChangeForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChangeForm {
    pub fn validate(&self) -> Result<(), FormError> {
        if self.current_password.is_empty()
            || self.new_password.is_empty()
            || self.confirm_password.is_empty()
        {
            return Err(FormError::MissingFields);
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(FormError::PasswordTooShort);
        }
        if self.new_password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        if self.new_password == self.current_password {
            return Err(FormError::PasswordUnchanged);
        }
        Ok(())
    }
}
