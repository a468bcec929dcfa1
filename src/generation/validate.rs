// src/generation/validate.rs

//! Parse-and-validate boundary for model output.
//!
//! Whatever the model returns, only fully typed `NewQuestion`s leave this module.
//! Invalid items are dropped; the call fails only when the shape is wrong or
//! nothing survives.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::GenerationError;
use crate::models::question::{NewQuestion, OPTION_COUNT};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").expect("valid fence regex")
});

/// Strips a Markdown code fence around the payload, if any.
fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// Parses raw model text and validates the questions in it.
pub fn parse_model_output(text: &str) -> Result<Vec<NewQuestion>, GenerationError> {
    let payload = strip_code_fence(text);
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| GenerationError::Malformed(format!("model output is not JSON: {}", e)))?;
    validate_questions(&value)
}

/// Validates an already-parsed response.
///
/// Accepts a top-level array, or an object whose `questions` field is one.
pub fn validate_questions(value: &Value) -> Result<Vec<NewQuestion>, GenerationError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("questions") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(GenerationError::Malformed(
                    "expected an array of questions".to_string(),
                ));
            }
        },
        _ => {
            return Err(GenerationError::Malformed(
                "expected an array of questions".to_string(),
            ));
        }
    };

    let total = items.len();
    let questions: Vec<NewQuestion> = items.iter().filter_map(validate_item).collect();

    if questions.len() < total {
        tracing::debug!(
            dropped = total - questions.len(),
            kept = questions.len(),
            "Dropped invalid generated questions"
        );
    }

    if questions.is_empty() {
        return Err(GenerationError::NoValidQuestions);
    }
    Ok(questions)
}

fn validate_item(item: &Value) -> Option<NewQuestion> {
    let question_text = item.get("question_text")?.as_str()?.trim();
    if question_text.is_empty() {
        return None;
    }

    let options = item.get("options")?.as_array()?;
    if options.len() != OPTION_COUNT {
        return None;
    }
    let options: Vec<String> = options
        .iter()
        .map(|o| o.as_str().map(str::to_string))
        .collect::<Option<_>>()?;

    let correct_answer = item.get("correct_answer")?.as_i64()?;
    if !(1..=OPTION_COUNT as i64).contains(&correct_answer) {
        return None;
    }

    Some(NewQuestion {
        question_text: question_text.to_string(),
        options: options.try_into().ok()?,
        correct_answer: correct_answer as u8,
    })
}
