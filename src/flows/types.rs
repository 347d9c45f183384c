//! Request and response shapes for the AI flows.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::ChapterDetail;

/// The lesson material a flow is grounded in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonContext {
    pub lesson_title: String,
    pub lesson_summary: String,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
}

impl From<&ChapterDetail> for LessonContext {
    fn from(detail: &ChapterDetail) -> Self {
        let summary = detail
            .chapter
            .summary
            .clone()
            .unwrap_or_else(|| detail.chapter.title.clone());

        Self {
            lesson_title: detail.chapter.title.clone(),
            lesson_summary: summary,
            key_topics: detail.topics.iter().map(|t| t.title.clone()).collect(),
            learning_outcomes: detail
                .learning_outcomes
                .iter()
                .map(|o| o.description.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizInput {
    #[serde(flatten)]
    pub lesson: LessonContext,
    pub question_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorInput {
    #[serde(flatten)]
    pub lesson: LessonContext,
    /// The student's question.
    pub question: String,
}

/// A multiple-choice quiz generated for one lesson.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Quiz {
    /// Short title for the quiz.
    pub title: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QuizQuestion {
    pub question: String,
    /// Exactly four answer choices.
    #[schemars(length(min = 4, max = 4))]
    pub options: Vec<String>,
    /// The correct choice, copied verbatim from `options`.
    pub correct_answer: String,
    /// Why the correct answer is right.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// The tutor's reply to a student question.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TutorResponse {
    /// Answer to the student's question, grounded in the lesson.
    pub answer: String,
    /// Up to five questions the student could ask next.
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

/// Body for the chapter-scoped quiz route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterQuizRequest {
    pub question_count: u32,
}

/// Body for the chapter-scoped tutor route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterTutorRequest {
    pub question: String,
}
