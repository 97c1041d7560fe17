//! Operator prompts
//!
//! The orchestrator and the components only talk to the operator through
//! [`Prompter`]. The terminal implementation lives in [`crate::ui`]; tests use
//! [`crate::testing::ScriptedPrompter`].

use async_trait::async_trait;

use crate::error::Result;

/// Checks a typed answer; `Err` carries the message shown to the operator
pub type Validator = fn(&str) -> std::result::Result<(), String>;

/// A free-form question
#[derive(Debug, Clone)]
pub struct Question {
    /// Text shown to the operator
    pub message: String,
    /// Answer used when the operator just presses enter
    pub default: Option<String>,
    /// Hide the answer while typing
    pub secret: bool,
    /// Accept an empty answer when there is no default
    pub allow_empty: bool,
    /// Rejects invalid answers; the question is asked again
    pub validator: Option<Validator>,
}

impl Question {
    /// Creates a question with no default and no validation
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            default: None,
            secret: false,
            allow_empty: false,
            validator: None,
        }
    }

    /// Sets the default answer; blank defaults are ignored
    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default = default.filter(|d| !d.trim().is_empty());
        self
    }

    /// Lets the operator leave the answer empty
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    /// Hides the answer while typing
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Validates answers with `validator`
    pub fn validate(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Runs the validator, if any, against `answer`
    pub fn check(&self, answer: &str) -> std::result::Result<(), String> {
        match self.validator {
            Some(validator) => validator(answer),
            None => Ok(()),
        }
    }
}

/// Asks the operator questions
///
/// There is only one terminal, so callers must never have two prompts
/// outstanding at once.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Asks a free-form question and returns a validated answer
    async fn input(&self, question: Question) -> Result<String>;

    /// Lets the operator pick one of `items`, returning its index
    async fn select(&self, message: &str, items: &[String], default: usize) -> Result<usize>;

    /// Lets the operator tick any of `items`; the result has one flag per item
    async fn multi_select(&self, message: &str, items: &[String], defaults: &[bool]) -> Result<Vec<bool>>;

    /// Asks a yes/no question
    async fn confirm(&self, message: &str, default: bool) -> Result<bool>;
}

/// Stock validators
pub mod validate {
    /// Rejects empty or whitespace-only answers
    pub fn non_empty(answer: &str) -> Result<(), String> {
        if answer.trim().is_empty() {
            Err("a value is required".to_string())
        } else {
            Ok(())
        }
    }

    /// Accepts only whole numbers
    pub fn integer(answer: &str) -> Result<(), String> {
        answer
            .trim()
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| format!("'{}' is not a whole number", answer.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validators() {
        assert!(validate::non_empty("host").is_ok());
        assert!(validate::non_empty("  ").is_err());
        assert!(validate::integer(" 42 ").is_ok());
        assert_eq!(validate::integer("x1").unwrap_err(), "'x1' is not a whole number");
    }

    #[test]
    fn test_question_builder() {
        let question = Question::new("Broker id")
            .with_default(Some(String::new()))
            .validate(validate::integer);
        assert!(question.default.is_none());
        assert!(!question.allow_empty);
        assert!(question.check("7").is_ok());
        assert!(question.check("seven").is_err());
        assert!(Question::new("Anything").check("").is_ok());

        let blank = Question::new("API token").with_default(Some("  ".into())).allow_empty();
        assert!(blank.default.is_none());
        assert!(blank.allow_empty);
    }
}
