//! Checks of user input that is passed through into generated documents.

use std::fmt::{Display, Formatter};

pub mod database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureLevel {
    Info,
    Warning,
    Error,
}

impl Display for FailureLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FailureLevel::Info => "INFO",
            FailureLevel::Warning => "WARNING",
            FailureLevel::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub level: FailureLevel,
    pub message: String,
}

impl ValidationFailure {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: FailureLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FailureLevel::Error,
            message: message.into(),
        }
    }
}

pub trait Validator {
    type Input: ?Sized;

    fn validate(&self, input: &Self::Input) -> Vec<ValidationFailure>;
}

/// Logs warnings and turns errors into a single [`MalformedReferenceInput`] error.
///
/// [`MalformedReferenceInput`]: crate::Error::MalformedReferenceInput
pub fn check_failures(failures: Vec<ValidationFailure>) -> crate::Result<()> {
    let mut errors = vec![];
    for failure in failures {
        match failure.level {
            FailureLevel::Error => errors.push(failure.message),
            FailureLevel::Warning => log::warn!("{}", failure.message),
            FailureLevel::Info => log::info!("{}", failure.message),
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::MalformedReferenceInput(errors.join("\n")))
    }
}
