//! Request forms and their validation rules.
//!
//! Every form exposes a `validate` method that runs all of its field checks
//! and returns the accumulated [`FieldErrors`]; callers reject the request
//! when the map is non-empty. Checks that need the database (uniqueness,
//! account existence) take the [`Store`] and report failures the same way.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{ALLOWED_AVATAR_EXTENSIONS, validation};
use crate::db::{Store, User};

pub mod validators;

use validators::{allowed_extension, email_syntax, equals, length_between, max_length, required};

/// Validation messages keyed by field name. Serialized into the `errors`
/// member of rejected responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

#[derive(Debug, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

impl RegistrationForm {
    /// Field checks plus uniqueness lookups. Query failures bubble up;
    /// everything user-facing lands in the returned map.
    pub async fn validate(&self, store: &Store) -> anyhow::Result<FieldErrors> {
        let mut errors = FieldErrors::default();

        if let Err(e) = required(&self.username, "Username is required") {
            errors.push("username", e);
        } else {
            if let Err(e) = length_between(
                &self.username,
                validation::USERNAME_MIN,
                validation::USERNAME_MAX,
            ) {
                errors.push("username", e);
            }
            if store
                .find_user_by_username(&self.username)
                .await?
                .is_some()
            {
                errors.push("username", "Username is already taken");
            }
        }

        if let Err(e) = required(&self.email, "Email is required") {
            errors.push("email", e);
        } else {
            if let Err(e) = email_syntax(&self.email) {
                errors.push("email", e);
            }
            if store.find_user_by_email(&self.email).await?.is_some() {
                errors.push("email", "Email is already registered");
            }
        }

        if let Err(e) = required(&self.password, "Password is required") {
            errors.push("password", e);
        } else if let Err(e) = length_between(
            &self.password,
            validation::PASSWORD_MIN,
            validation::PASSWORD_MAX,
        ) {
            errors.push("password", e);
        }

        if let Err(e) = required(&self.password_confirm, "Please repeat the password") {
            errors.push("password_confirm", e);
        } else {
            if let Err(e) = length_between(
                &self.password_confirm,
                validation::PASSWORD_MIN,
                validation::PASSWORD_MAX,
            ) {
                errors.push("password_confirm", e);
            }
            if let Err(e) = equals(
                &self.password_confirm,
                &self.password,
                "Passwords do not match",
            ) {
                errors.push("password_confirm", e);
            }
        }

        Ok(errors)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

impl LoginForm {
    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();

        if let Err(e) = required(&self.email, "Email is required") {
            errors.push("email", e);
        } else if let Err(e) = email_syntax(&self.email) {
            errors.push("email", e);
        }

        if let Err(e) = required(&self.password, "Password is required") {
            errors.push("password", e);
        }

        errors
    }
}

/// Built from the multipart account form rather than deserialized, because
/// the avatar arrives as a file part.
#[derive(Debug, Default)]
pub struct UpdateAccountForm {
    pub username: String,
    pub email: String,
    pub picture: Option<PictureUpload>,
}

#[derive(Debug, Clone)]
pub struct PictureUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UpdateAccountForm {
    /// Uniqueness only matters for values that actually changed; keeping
    /// your own name or address is not a conflict.
    pub async fn validate(&self, store: &Store, current: &User) -> anyhow::Result<FieldErrors> {
        let mut errors = FieldErrors::default();

        if let Err(e) = required(&self.username, "Username is required") {
            errors.push("username", e);
        } else {
            if let Err(e) = length_between(
                &self.username,
                validation::USERNAME_MIN,
                validation::USERNAME_MAX,
            ) {
                errors.push("username", e);
            }
            if self.username != current.username
                && store
                    .find_user_by_username(&self.username)
                    .await?
                    .is_some()
            {
                errors.push("username", "Username is already taken");
            }
        }

        if let Err(e) = required(&self.email, "Email is required") {
            errors.push("email", e);
        } else {
            if let Err(e) = email_syntax(&self.email) {
                errors.push("email", e);
            }
            if self.email != current.email
                && store.find_user_by_email(&self.email).await?.is_some()
            {
                errors.push("email", "Email is already registered");
            }
        }

        if let Some(picture) = &self.picture {
            if let Err(e) = allowed_extension(&picture.filename, ALLOWED_AVATAR_EXTENSIONS) {
                errors.push("picture", e);
            }
        }

        Ok(errors)
    }
}

#[derive(Debug, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl PostForm {
    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();

        if let Err(e) = required(&self.title, "Title is required") {
            errors.push("title", e);
        } else if let Err(e) = max_length(&self.title, validation::TITLE_MAX) {
            errors.push("title", e);
        }

        if let Err(e) = required(&self.content, "Content is required") {
            errors.push("content", e);
        }

        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestResetForm {
    #[serde(default)]
    pub email: String,
}

impl RequestResetForm {
    /// The existence lookup reports unregistered addresses as a field
    /// error, so this endpoint discloses which emails have accounts.
    pub async fn validate(&self, store: &Store) -> anyhow::Result<FieldErrors> {
        let mut errors = FieldErrors::default();

        if let Err(e) = required(&self.email, "Email is required") {
            errors.push("email", e);
        } else {
            if let Err(e) = email_syntax(&self.email) {
                errors.push("email", e);
            }
            if store.find_user_by_email(&self.email).await?.is_none() {
                errors.push("email", "No account is registered with this email");
            }
        }

        Ok(errors)
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

impl ResetPasswordForm {
    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();

        if let Err(e) = required(&self.password, "Password is required") {
            errors.push("password", e);
        } else if let Err(e) = length_between(
            &self.password,
            validation::PASSWORD_MIN,
            validation::PASSWORD_MAX,
        ) {
            errors.push("password", e);
        }

        if let Err(e) = required(&self.password_confirm, "Please repeat the password") {
            errors.push("password_confirm", e);
        } else if let Err(e) = length_between(
            &self.password_confirm,
            validation::PASSWORD_MIN,
            validation::PASSWORD_MAX,
        ) {
            errors.push("password_confirm", e);
        }

        // A mismatch is reported on both fields.
        if !self.password.is_empty()
            && !self.password_confirm.is_empty()
            && self.password != self.password_confirm
        {
            errors.push("password", "Passwords do not match");
            errors.push("password_confirm", "Passwords do not match");
        }

        errors
    }
}
