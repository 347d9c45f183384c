use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{is_blank, nullable, Validate, ValidationError};

/// A subject taught to one class in one medium of instruction.
///
/// Subjects are the top of the stored curriculum tree. The class and medium
/// (and optional stream) levels above a subject are plain labels on the
/// subject rather than records of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    /// Class or grade label, e.g. `"10"`.
    pub class_level: String,
    /// Language of instruction, e.g. `"English"`.
    pub medium: String,
    /// Optional stream, e.g. `"Science"` or `"Commerce"`.
    pub stream: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A numbered chapter within a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub subject_id: Uuid,
    /// Orders chapters within their subject.
    pub number: u32,
    pub title: String,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub position: u32,
    pub created_at: DateTime<Utc>,
}

/// Something a student should be able to do after finishing a chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningOutcome {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub description: String,
    pub position: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub title: String,
    pub url: String,
    pub duration_seconds: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// A chapter with all of its content, used for detailed responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterDetail {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub topics: Vec<Topic>,
    pub learning_outcomes: Vec<LearningOutcome>,
    pub videos: Vec<Video>,
}

// ============================================================
// Inputs
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubjectInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub class_level: String,
    #[serde(default)]
    pub medium: String,
    pub stream: Option<String>,
    pub description: Option<String>,
}

impl Validate for CreateSubjectInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if is_blank(&self.name) {
            missing.push("name");
        }
        if is_blank(&self.class_level) {
            missing.push("class_level");
        }
        if is_blank(&self.medium) {
            missing.push("medium");
        }
        ValidationError::check_missing(missing)
    }
}

/// Input for updating a subject. All fields are optional for partial updates;
/// `null` clears `stream` and `description`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubjectInput {
    pub name: Option<String>,
    pub class_level: Option<String>,
    pub medium: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub stream: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

impl Validate for UpdateSubjectInput {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_not_blank(&[
            ("name", self.name.as_deref()),
            ("class_level", self.class_level.as_deref()),
            ("medium", self.medium.as_deref()),
        ])
    }
}

/// Filters for listing subjects. Unset filters match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectFilter {
    pub class_level: Option<String>,
    pub medium: Option<String>,
    pub stream: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChapterInput {
    pub number: u32,
    #[serde(default)]
    pub title: String,
    pub summary: Option<String>,
}

impl Validate for CreateChapterInput {
    fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.title) {
            return Err(ValidationError::MissingFields(vec!["title"]));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateChapterInput {
    pub number: Option<u32>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub summary: Option<Option<String>>,
}

impl Validate for UpdateChapterInput {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_not_blank(&[("title", self.title.as_deref())])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTopicInput {
    #[serde(default)]
    pub title: String,
    pub content: Option<String>,
}

impl Validate for CreateTopicInput {
    fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.title) {
            return Err(ValidationError::MissingFields(vec!["title"]));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTopicInput {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub content: Option<Option<String>>,
    pub position: Option<u32>,
}

impl Validate for UpdateTopicInput {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_not_blank(&[("title", self.title.as_deref())])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOutcomeInput {
    #[serde(default)]
    pub description: String,
}

impl Validate for CreateOutcomeInput {
    fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.description) {
            return Err(ValidationError::MissingFields(vec!["description"]));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOutcomeInput {
    pub description: Option<String>,
    pub position: Option<u32>,
}

impl Validate for UpdateOutcomeInput {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_not_blank(&[("description", self.description.as_deref())])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVideoInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub duration_seconds: Option<u32>,
}

impl Validate for CreateVideoInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if is_blank(&self.title) {
            missing.push("title");
        }
        if is_blank(&self.url) {
            missing.push("url");
        }
        ValidationError::check_missing(missing)?;
        check_video_url(&self.url)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVideoInput {
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub duration_seconds: Option<Option<u32>>,
}

impl Validate for UpdateVideoInput {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_not_blank(&[
            ("title", self.title.as_deref()),
            ("url", self.url.as_deref()),
        ])?;
        match &self.url {
            Some(url) => check_video_url(url),
            None => Ok(()),
        }
    }
}

fn check_video_url(url: &str) -> Result<(), ValidationError> {
    let url = url.trim();
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(ValidationError::Invalid(
            "Video url must start with http:// or https://".to_string(),
        ))
    }
}

// ============================================================
// Curriculum import documents
// ============================================================

/// A nested curriculum document accepted by the migration trigger.
///
/// Unlike the CRUD inputs, a document carries the whole tree for each
/// subject so that a curriculum can be loaded in one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurriculumDocument {
    #[serde(default)]
    pub subjects: Vec<SubjectDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectDocument {
    pub name: String,
    pub class_level: String,
    pub medium: String,
    pub stream: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub chapters: Vec<ChapterDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterDocument {
    pub number: u32,
    pub title: String,
    pub summary: Option<String>,
    #[serde(default)]
    pub topics: Vec<CreateTopicInput>,
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
    #[serde(default)]
    pub videos: Vec<CreateVideoInput>,
}

impl Validate for CurriculumDocument {
    fn validate(&self) -> Result<(), ValidationError> {
        for subject in &self.subjects {
            CreateSubjectInput {
                name: subject.name.clone(),
                class_level: subject.class_level.clone(),
                medium: subject.medium.clone(),
                stream: None,
                description: None,
            }
            .validate()?;

            for chapter in &subject.chapters {
                if is_blank(&chapter.title) {
                    return Err(ValidationError::Invalid(format!(
                        "Chapter {} of {} has no title",
                        chapter.number, subject.name
                    )));
                }
                for topic in &chapter.topics {
                    topic.validate()?;
                }
                if chapter.learning_outcomes.iter().any(|o| is_blank(o)) {
                    return Err(ValidationError::Invalid(format!(
                        "Chapter {} of {} has a blank learning outcome",
                        chapter.number, subject.name
                    )));
                }
                for video in &chapter.videos {
                    video.validate()?;
                }
            }
        }
        Ok(())
    }
}

/// Counts of what a curriculum import inserted and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub subjects_created: usize,
    pub subjects_existing: usize,
    pub chapters_created: usize,
    pub chapters_skipped: usize,
    pub topics_created: usize,
    pub outcomes_created: usize,
    pub videos_created: usize,
}
