use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{is_blank, nullable, Validate, ValidationError};

/// A platform account.
///
/// The role decides which dashboard the client shows and which mutating
/// routes the API accepts from it. A student is a user with the `Student`
/// role; `class_level` places the student in a class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub class_level: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Teachers and admins can author curriculum and grade work.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Teacher | Self::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
    pub class_level: Option<String>,
}

impl Validate for CreateUserInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if is_blank(&self.name) {
            missing.push("name");
        }
        if is_blank(&self.email) {
            missing.push("email");
        }
        ValidationError::check_missing(missing)?;
        check_email(&self.email)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    /// `null` removes the user from their class.
    #[serde(default, deserialize_with = "nullable")]
    pub class_level: Option<Option<String>>,
}

impl Validate for UpdateUserInput {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_not_blank(&[
            ("name", self.name.as_deref()),
            ("email", self.email.as_deref()),
        ])?;
        match &self.email {
            Some(email) => check_email(email),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub class_level: Option<String>,
}

fn check_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ValidationError::Invalid(format!(
            "Invalid email address: {}",
            email
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!(Role::from_str("Teacher"), Some(Role::Teacher));
        assert_eq!(Role::from_str(" admin "), Some(Role::Admin));
        assert_eq!(Role::from_str("principal"), None);
    }

    #[test]
    fn create_user_rejects_email_without_domain() {
        let input = CreateUserInput {
            name: "Asha".to_string(),
            email: "asha@".to_string(),
            role: Role::Student,
            class_level: Some("10".to_string()),
        };
        assert!(matches!(input.validate(), Err(ValidationError::Invalid(_))));
    }
}
