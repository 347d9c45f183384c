//! Prompt templates for the AI flows.
//!
//! Templates use `{{name}}` placeholders. Every placeholder in a template
//! must be supplied when rendering; leftovers are a programming error and
//! are reported rather than sent to the model.

use schemars::JsonSchema;

use super::types::{LessonContext, Quiz, QuizInput, TutorInput, TutorResponse};
use super::FlowError;

const QUIZ_TEMPLATE: &str = "\
You are an experienced school teacher writing a multiple-choice quiz.

Lesson: {{lesson_title}}
Summary: {{lesson_summary}}

Key topics:
{{key_topics}}

Learning outcomes:
{{learning_outcomes}}

Write exactly {{question_count}} questions that check the learning outcomes above.
Each question must have exactly 4 distinct options and one correct_answer copied
verbatim from its options. Add a one-sentence explanation for each answer.

Respond with a single JSON object that matches this JSON Schema, and nothing else:
{{schema}}
";

const TUTOR_TEMPLATE: &str = "\
You are a patient tutor helping a school student with one lesson.

Lesson: {{lesson_title}}
Summary: {{lesson_summary}}

Key topics:
{{key_topics}}

Learning outcomes:
{{learning_outcomes}}

The student asks: {{question}}

Answer clearly at the student's level, using the lesson above. If the question
is unrelated to the lesson, say so briefly and steer back to the lesson.
Suggest up to 3 follow-up questions the student could ask next.

Respond with a single JSON object that matches this JSON Schema, and nothing else:
{{schema}}
";

pub fn quiz_prompt(input: &QuizInput) -> Result<String, FlowError> {
    let count = input.question_count.to_string();
    let schema = schema_json::<Quiz>()?;
    let (topics, outcomes) = lesson_lists(&input.lesson);

    render(
        QUIZ_TEMPLATE,
        &[
            ("lesson_title", input.lesson.lesson_title.trim()),
            ("lesson_summary", input.lesson.lesson_summary.trim()),
            ("key_topics", &topics),
            ("learning_outcomes", &outcomes),
            ("question_count", &count),
            ("schema", &schema),
        ],
    )
}

pub fn tutor_prompt(input: &TutorInput) -> Result<String, FlowError> {
    let schema = schema_json::<TutorResponse>()?;
    let (topics, outcomes) = lesson_lists(&input.lesson);

    render(
        TUTOR_TEMPLATE,
        &[
            ("lesson_title", input.lesson.lesson_title.trim()),
            ("lesson_summary", input.lesson.lesson_summary.trim()),
            ("key_topics", &topics),
            ("learning_outcomes", &outcomes),
            ("question", input.question.trim()),
            ("schema", &schema),
        ],
    )
}

/// Substitutes `{{key}}` placeholders in one pass.
///
/// Values are inserted verbatim and never re-scanned, so lesson text that
/// happens to contain braces cannot inject placeholders.
pub fn render(template: &str, values: &[(&str, &str)]) -> Result<String, FlowError> {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| FlowError::Template("unclosed placeholder".to_string()))?;
        let key = after[..end].trim();
        let value = values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| FlowError::Template(format!("no value for placeholder {}", key)))?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

fn lesson_lists(lesson: &LessonContext) -> (String, String) {
    (bullets(&lesson.key_topics), bullets(&lesson.learning_outcomes))
}

fn bullets(items: &[String]) -> String {
    let lines: Vec<String> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| format!("- {}", item))
        .collect();

    if lines.is_empty() {
        "- (none listed)".to_string()
    } else {
        lines.join("\n")
    }
}

fn schema_json<T: JsonSchema>() -> Result<String, FlowError> {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema).map_err(|e| FlowError::Template(e.to_string()))
}
