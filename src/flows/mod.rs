//! AI flows: schema-validated prompt-to-model calls.
//!
//! A flow validates its input, renders a prompt template from lesson data,
//! sends it to a [`TextGenerator`], and checks the JSON that comes back
//! against a fixed schema. Failures propagate; nothing is retried.
//!
//! - [`Flows::generate_quiz`]: a multiple-choice quiz for a lesson.
//! - [`Flows::tutor`]: an answer to a student question plus follow-ups.

mod client;
mod output;
mod prompts;
mod types;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

pub use client::GenAiClient;
pub use output::{MAX_FOLLOW_UPS, OPTIONS_PER_QUESTION};
pub use types::*;

use crate::config::ModelConfig;

/// Largest quiz a single flow call may request.
pub const MAX_QUIZ_QUESTIONS: u32 = 20;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Generative model is not configured (set EDUCONNECT_GENAI_API_KEY)")]
    NotConfigured,

    #[error("Model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model provider returned status {status}")]
    Provider { status: u16, body: String },

    #[error("Model returned no content")]
    EmptyResponse,

    #[error("Model output is not valid JSON: {0}")]
    Malformed(String),

    #[error("Model output does not match the expected schema: {0}")]
    SchemaViolation(String),

    #[error("Prompt template error: {0}")]
    Template(String),
}

/// Anything that can turn a prompt into raw model text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model name, for logs.
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, FlowError>;
}

/// Stand-in used when no model API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl TextGenerator for Unconfigured {
    fn model(&self) -> &str {
        "unconfigured"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, FlowError> {
        Err(FlowError::NotConfigured)
    }
}

/// Runs the quiz and tutor flows against a shared generator.
#[derive(Clone)]
pub struct Flows {
    generator: Arc<dyn TextGenerator>,
}

impl Flows {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Builds flows backed by [`GenAiClient`], or [`Unconfigured`] when the
    /// config has no API key.
    pub fn from_config(config: &ModelConfig) -> Result<Self, FlowError> {
        if !config.is_configured() {
            tracing::warn!("No generative model API key configured; AI flows are disabled");
            return Ok(Self::unconfigured());
        }
        let client = GenAiClient::new(config)?;
        tracing::info!("AI flows using model {}", config.model);
        Ok(Self::new(Arc::new(client)))
    }

    pub fn unconfigured() -> Self {
        Self::new(Arc::new(Unconfigured))
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    /// Generates a quiz with exactly `question_count` four-option questions.
    pub async fn generate_quiz(&self, input: &QuizInput) -> Result<Quiz, FlowError> {
        check_lesson(&input.lesson)?;
        if input.question_count == 0 || input.question_count > MAX_QUIZ_QUESTIONS {
            return Err(FlowError::InvalidInput(format!(
                "question_count must be between 1 and {}",
                MAX_QUIZ_QUESTIONS
            )));
        }

        let prompt = prompts::quiz_prompt(input)?;
        let raw = self.call("quiz", &prompt).await?;
        let quiz: Quiz = output::parse_json(&raw).inspect_err(|e| log_rejected("quiz", e))?;
        output::check_quiz(quiz, input.question_count as usize)
            .inspect_err(|e| log_rejected("quiz", e))
    }

    /// Answers a student question about a lesson.
    pub async fn tutor(&self, input: &TutorInput) -> Result<TutorResponse, FlowError> {
        check_lesson(&input.lesson)?;
        if input.question.trim().is_empty() {
            return Err(FlowError::InvalidInput(
                "Missing required fields: question".to_string(),
            ));
        }

        let prompt = prompts::tutor_prompt(input)?;
        let raw = self.call("tutor", &prompt).await?;
        let response: TutorResponse =
            output::parse_json(&raw).inspect_err(|e| log_rejected("tutor", e))?;
        output::check_tutor(response).inspect_err(|e| log_rejected("tutor", e))
    }

    async fn call(&self, flow: &str, prompt: &str) -> Result<String, FlowError> {
        let started = Instant::now();
        let result = self.generator.generate(prompt).await;
        let elapsed_ms = started.elapsed().as_millis();

        match &result {
            Ok(_) => tracing::info!(
                "Flow {} completed on {} in {}ms",
                flow,
                self.generator.model(),
                elapsed_ms
            ),
            Err(FlowError::Provider { status, body }) => tracing::error!(
                "Flow {} failed on {}: provider returned {}: {}",
                flow,
                self.generator.model(),
                status,
                body
            ),
            Err(e) => tracing::error!(
                "Flow {} failed on {}: {}",
                flow,
                self.generator.model(),
                e
            ),
        }

        result
    }
}

fn check_lesson(lesson: &LessonContext) -> Result<(), FlowError> {
    let mut missing = Vec::new();
    if lesson.lesson_title.trim().is_empty() {
        missing.push("lesson_title");
    }
    if lesson.lesson_summary.trim().is_empty() {
        missing.push("lesson_summary");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(FlowError::InvalidInput(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

fn log_rejected(flow: &str, e: &FlowError) {
    tracing::warn!("Flow {} rejected model output: {}", flow, e);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned responses and records the prompts it was given.
    struct Scripted {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(vec![reply.to_string()]),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String, FlowError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or(FlowError::EmptyResponse)
        }
    }

    fn quiz_input(count: u32) -> QuizInput {
        QuizInput {
            lesson: LessonContext {
                lesson_title: "Real Numbers".to_string(),
                lesson_summary: "Euclid's division lemma and irrational numbers.".to_string(),
                key_topics: vec!["Euclid's division lemma".to_string()],
                learning_outcomes: vec!["Find an HCF".to_string()],
            },
            question_count: count,
        }
    }

    #[test]
    fn quiz_flow_returns_validated_quiz() {
        let generator = Scripted::new(
            r#"{"title":"Real Numbers","questions":[
                {"question":"HCF of 12 and 18?","options":["2","3","6","9"],"correct_answer":"6"}
            ]}"#,
        );
        let flows = Flows::new(generator.clone());

        let quiz = tokio_test::block_on(flows.generate_quiz(&quiz_input(1))).unwrap();

        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].options.len(), OPTIONS_PER_QUESTION);
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Write exactly 1 questions"));
    }

    #[test]
    fn quiz_flow_rejects_count_out_of_range_without_calling_model() {
        let generator = Scripted::new("{}");
        let flows = Flows::new(generator.clone());

        for count in [0, MAX_QUIZ_QUESTIONS + 1] {
            let result = tokio_test::block_on(flows.generate_quiz(&quiz_input(count)));
            assert!(matches!(result, Err(FlowError::InvalidInput(_))));
        }
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn unconfigured_flows_fail_with_not_configured() {
        let flows = Flows::unconfigured();
        let result = tokio_test::block_on(flows.generate_quiz(&quiz_input(3)));
        assert!(matches!(result, Err(FlowError::NotConfigured)));
    }

    #[test]
    fn tutor_flow_requires_question() {
        let flows = Flows::new(Scripted::new("{}"));
        let input = TutorInput {
            lesson: quiz_input(1).lesson,
            question: "   ".to_string(),
        };
        let result = tokio_test::block_on(flows.tutor(&input));
        assert!(matches!(result, Err(FlowError::InvalidInput(_))));
    }
}
