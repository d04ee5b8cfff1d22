//! Uniform success/failure envelope returned by business handlers.
//!
//! A handled failure is data (`Outcome::Failure`), not an error: the dispatcher
//! propagates it unchanged so callers can tell it apart from a crashed handler.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Success {
        value: T,
    },
    Failure {
        error: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        sub_errors: Vec<String>,
    },
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Outcome::Success { value }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Outcome::Failure {
            error: error.into(),
            sub_errors: Vec::new(),
        }
    }

    /// Failure with field-level detail (e.g. one entry per invalid input).
    pub fn failure_with(error: impl Into<String>, sub_errors: Vec<String>) -> Self {
        Outcome::Failure {
            error: error.into(),
            sub_errors,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success { value } => Some(value),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { error, .. } => Some(error),
        }
    }

    pub fn sub_errors(&self) -> &[String] {
        match self {
            Outcome::Success { .. } => &[],
            Outcome::Failure { sub_errors, .. } => sub_errors,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Success { value } => Outcome::Success { value: f(value) },
            Outcome::Failure { error, sub_errors } => Outcome::Failure { error, sub_errors },
        }
    }

    /// Collapse into a std `Result`, keeping the failure text and its details.
    pub fn into_result(self) -> std::result::Result<T, (String, Vec<String>)> {
        match self {
            Outcome::Success { value } => Ok(value),
            Outcome::Failure { error, sub_errors } => Err((error, sub_errors)),
        }
    }
}
