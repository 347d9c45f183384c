use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Request payload validation failures. Both variants surface as 400s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("{0}")]
    Invalid(String),
}

impl ValidationError {
    pub fn check_missing(missing: Vec<&'static str>) -> Result<(), Self> {
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Self::MissingFields(missing))
        }
    }

    /// For partial updates: a field that is present must not be blank.
    pub fn check_not_blank(fields: &[(&'static str, Option<&str>)]) -> Result<(), Self> {
        let blank: Vec<&'static str> = fields
            .iter()
            .filter(|(_, value)| value.is_some_and(is_blank))
            .map(|(name, _)| *name)
            .collect();

        if blank.is_empty() {
            Ok(())
        } else {
            Err(Self::Invalid(format!(
                "Fields cannot be empty: {}",
                blank.join(", ")
            )))
        }
    }
}

/// Implemented by every request input with fields serde cannot check alone.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Deserializes a clearable update field.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`: an absent
/// field stays `None` (keep), an explicit `null` becomes `Some(None)` (clear).
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
