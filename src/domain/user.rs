use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored user record, persisted with camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_email(&self, normalized: &str) -> bool {
        normalize_email(&self.email) == normalized
    }
}

/// Registration payload. Fields are optional so that absence can be reported
/// as a validation error rather than a body parse failure.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Partial update merged over an existing record. `id` and `createdAt` are
/// not part of the patch and therefore can never change.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

impl CreateUser {
    /// Name, email and password must be present and not blank.
    pub fn validate(self) -> Result<NewUser, DomainError> {
        match (present(self.name), present(self.email), present(self.password)) {
            (Some(name), Some(email), Some(password)) => Ok(NewUser {
                name,
                email,
                password,
                confirm_password: self.confirm_password.unwrap_or_default(),
            }),
            _ => Err(DomainError::Validation(
                "name, email and password are required".to_string(),
            )),
        }
    }
}

impl LoginRequest {
    /// Returns `(email, password)` when both are present.
    pub fn validate(self) -> Result<(String, String), DomainError> {
        match (present(self.email), present(self.password)) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(DomainError::Validation(
                "email and password are required for login".to_string(),
            )),
        }
    }
}

impl UserPatch {
    /// Fields that are required on a record may be omitted but not blanked.
    pub fn validate(&self) -> Result<(), DomainError> {
        let blank = [
            ("name", &self.name),
            ("email", &self.email),
            ("password", &self.password),
        ]
        .into_iter()
        .find(|(_, value)| value.as_deref().is_some_and(|v| v.trim().is_empty()));
        match blank {
            Some((field, _)) => Err(DomainError::Validation(format!("{} cannot be empty", field))),
            None => Ok(()),
        }
    }
}

/// Validated input for creating a record.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
