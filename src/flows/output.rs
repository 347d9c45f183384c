//! Parsing and schema checks for model output.

use std::collections::HashSet;

use serde::de::DeserializeOwned;

use super::types::{Quiz, TutorResponse};
use super::FlowError;

pub const OPTIONS_PER_QUESTION: usize = 4;
pub const MAX_FOLLOW_UPS: usize = 5;

/// Parses model text as JSON, tolerating a surrounding Markdown code fence.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, FlowError> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body).map_err(|e| FlowError::Malformed(e.to_string()))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Checks a generated quiz against the fixed quiz schema.
///
/// Returns the quiz with surrounding whitespace trimmed from every string.
pub fn check_quiz(mut quiz: Quiz, expected_questions: usize) -> Result<Quiz, FlowError> {
    quiz.title = quiz.title.trim().to_string();
    if quiz.title.is_empty() {
        return Err(violation("quiz title is empty"));
    }

    if quiz.questions.len() != expected_questions {
        return Err(violation(format!(
            "expected {} questions, got {}",
            expected_questions,
            quiz.questions.len()
        )));
    }

    for (i, question) in quiz.questions.iter_mut().enumerate() {
        let n = i + 1;
        question.question = question.question.trim().to_string();
        if question.question.is_empty() {
            return Err(violation(format!("question {} has no text", n)));
        }

        if question.options.len() != OPTIONS_PER_QUESTION {
            return Err(violation(format!(
                "question {} has {} options, expected {}",
                n,
                question.options.len(),
                OPTIONS_PER_QUESTION
            )));
        }

        for option in question.options.iter_mut() {
            *option = option.trim().to_string();
        }
        if question.options.iter().any(|o| o.is_empty()) {
            return Err(violation(format!("question {} has an empty option", n)));
        }
        let distinct: HashSet<&str> = question.options.iter().map(String::as_str).collect();
        if distinct.len() != OPTIONS_PER_QUESTION {
            return Err(violation(format!("question {} repeats an option", n)));
        }

        question.correct_answer = question.correct_answer.trim().to_string();
        if !question.options.contains(&question.correct_answer) {
            return Err(violation(format!(
                "question {} has a correct_answer that is not one of its options",
                n
            )));
        }

        question.explanation = question
            .explanation
            .take()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
    }

    Ok(quiz)
}

/// Checks a tutor reply; blank follow-ups are dropped before counting.
pub fn check_tutor(mut response: TutorResponse) -> Result<TutorResponse, FlowError> {
    response.answer = response.answer.trim().to_string();
    if response.answer.is_empty() {
        return Err(violation("tutor answer is empty"));
    }

    response.follow_up_questions = response
        .follow_up_questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    if response.follow_up_questions.len() > MAX_FOLLOW_UPS {
        return Err(violation(format!(
            "expected at most {} follow-up questions, got {}",
            MAX_FOLLOW_UPS,
            response.follow_up_questions.len()
        )));
    }

    Ok(response)
}

fn violation(msg: impl Into<String>) -> FlowError {
    FlowError::SchemaViolation(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::types::QuizQuestion;

    fn question(options: &[&str], answer: &str) -> QuizQuestion {
        QuizQuestion {
            question: "Which is a contact force?".to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer: answer.to_string(),
            explanation: Some("  ".to_string()),
        }
    }

    fn quiz(questions: Vec<QuizQuestion>) -> Quiz {
        Quiz {
            title: " Forces ".to_string(),
            questions,
        }
    }

    #[test]
    fn strips_json_code_fence() {
        let value: serde_json::Value = parse_json("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);

        let value: serde_json::Value = parse_json("  {\"a\": 2}  ").unwrap();
        assert_eq!(value["a"], 2);
    }

    #[test]
    fn strips_single_line_fence_with_tag() {
        let value: serde_json::Value = parse_json("```json{\"a\":1}```").unwrap();
        assert_eq!(value["a"], 1);

        let value: serde_json::Value = parse_json("```{\"a\":2}```").unwrap();
        assert_eq!(value["a"], 2);
    }

    #[test]
    fn non_json_is_malformed() {
        let result: Result<serde_json::Value, _> = parse_json("Sure! Here is your quiz.");
        assert!(matches!(result, Err(FlowError::Malformed(_))));
    }

    #[test]
    fn accepts_well_formed_quiz_and_trims_it() {
        let checked = check_quiz(
            quiz(vec![question(&["Friction ", "Magnetism", "Gravity", "Static"], " Friction")]),
            1,
        )
        .unwrap();

        assert_eq!(checked.title, "Forces");
        assert_eq!(checked.questions[0].correct_answer, "Friction");
        assert_eq!(checked.questions[0].options[0], "Friction");
        assert!(checked.questions[0].explanation.is_none());
    }

    #[test]
    fn rejects_wrong_question_count() {
        let result = check_quiz(
            quiz(vec![question(&["a", "b", "c", "d"], "a")]),
            2,
        );
        assert!(matches!(result, Err(FlowError::SchemaViolation(_))));
    }

    #[test]
    fn rejects_three_options() {
        let result = check_quiz(quiz(vec![question(&["a", "b", "c"], "a")]), 1);
        assert!(matches!(result, Err(FlowError::SchemaViolation(_))));
    }

    #[test]
    fn rejects_answer_outside_options() {
        let result = check_quiz(quiz(vec![question(&["a", "b", "c", "d"], "e")]), 1);
        assert!(matches!(result, Err(FlowError::SchemaViolation(_))));
    }

    #[test]
    fn rejects_duplicate_options() {
        let result = check_quiz(quiz(vec![question(&["a", "a", "c", "d"], "a")]), 1);
        assert!(matches!(result, Err(FlowError::SchemaViolation(_))));
    }

    #[test]
    fn tutor_drops_blank_follow_ups() {
        let checked = check_tutor(TutorResponse {
            answer: "Pressure is force per unit area.".to_string(),
            follow_up_questions: vec!["".to_string(), " What is a pascal? ".to_string()],
        })
        .unwrap();

        assert_eq!(checked.follow_up_questions, vec!["What is a pascal?"]);
    }

    #[test]
    fn tutor_rejects_empty_answer_and_too_many_follow_ups() {
        assert!(check_tutor(TutorResponse {
            answer: " ".to_string(),
            follow_up_questions: vec![],
        })
        .is_err());

        assert!(check_tutor(TutorResponse {
            answer: "ok".to_string(),
            follow_up_questions: (0..6).map(|i| format!("q{}", i)).collect(),
        })
        .is_err());
    }
}
