use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{is_blank, Validate, ValidationError};

/// Work handed in by a student, optionally tied to a chapter.
///
/// # Lifecycle
/// A submission starts `Pending`. Grading records a score out of
/// `max_score` and moves it to `Graded`. Grading again overwrites the
/// previous grade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub student_id: Uuid,
    pub chapter_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub status: SubmissionStatus,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub feedback: Option<String>,
    /// The teacher or admin who graded the work.
    pub graded_by: Option<Uuid>,
    pub submitted_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Graded,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Graded => "graded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "graded" => Some(Self::Graded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubmissionInput {
    pub student_id: Uuid,
    pub chapter_id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl Validate for CreateSubmissionInput {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if is_blank(&self.title) {
            missing.push("title");
        }
        if is_blank(&self.content) {
            missing.push("content");
        }
        ValidationError::check_missing(missing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeSubmissionInput {
    pub score: f64,
    pub max_score: f64,
    pub feedback: Option<String>,
    pub graded_by: Option<Uuid>,
}

impl Validate for GradeSubmissionInput {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.max_score.is_finite() || self.max_score <= 0.0 {
            return Err(ValidationError::Invalid(
                "max_score must be greater than zero".to_string(),
            ));
        }
        if !self.score.is_finite() || self.score < 0.0 || self.score > self.max_score {
            return Err(ValidationError::Invalid(format!(
                "score must be between 0 and {}",
                self.max_score
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionFilter {
    pub student_id: Option<Uuid>,
    pub chapter_id: Option<Uuid>,
    pub status: Option<SubmissionStatus>,
}

/// One row of the class leaderboard, ranked by average grade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    pub student_id: Uuid,
    pub name: String,
    pub class_level: Option<String>,
    pub graded_count: usize,
    /// Mean of `score / max_score * 100` over graded submissions.
    pub average_percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(score: f64, max_score: f64) -> GradeSubmissionInput {
        GradeSubmissionInput {
            score,
            max_score,
            feedback: None,
            graded_by: None,
        }
    }

    #[test]
    fn grade_accepts_full_marks_and_zero() {
        assert!(grade(10.0, 10.0).validate().is_ok());
        assert!(grade(0.0, 10.0).validate().is_ok());
    }

    #[test]
    fn grade_rejects_out_of_range_scores() {
        assert!(grade(11.0, 10.0).validate().is_err());
        assert!(grade(-1.0, 10.0).validate().is_err());
        assert!(grade(1.0, 0.0).validate().is_err());
        assert!(grade(f64::NAN, 10.0).validate().is_err());
    }
}
