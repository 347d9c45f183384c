use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{is_blank, nullable, Validate, ValidationError};

/// A class, exam or other timetable entry.
///
/// Events may target a class and a subject; events without a class apply
/// to everyone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub class_level: Option<String>,
    pub subject_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventInput {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub class_level: Option<String>,
    pub subject_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

impl Validate for CreateEventInput {
    fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.title) {
            return Err(ValidationError::MissingFields(vec!["title"]));
        }
        check_window(self.starts_at, self.ends_at)
    }
}

/// Partial update. The resulting window is checked again after merging
/// with the stored event. `null` clears the optional fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventInput {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub class_level: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub subject_id: Option<Option<Uuid>>,
}

impl Validate for UpdateEventInput {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_not_blank(&[("title", self.title.as_deref())])?;
        match (self.starts_at, self.ends_at) {
            (Some(starts_at), Some(ends_at)) => check_window(starts_at, ends_at),
            _ => Ok(()),
        }
    }
}

/// Query window for listing events. Events overlapping `[from, to)` match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub class_level: Option<String>,
}

pub fn check_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<(), ValidationError> {
    if ends_at > starts_at {
        Ok(())
    } else {
        Err(ValidationError::Invalid(
            "ends_at must be after starts_at".to_string(),
        ))
    }
}
