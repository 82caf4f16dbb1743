use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Ceiling of a generated document that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentLimit {
    Size,
    Resources,
    Parameters,
    Outputs,
}

impl Display for DocumentLimit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DocumentLimit::Size => "size in bytes",
            DocumentLimit::Resources => "resource count",
            DocumentLimit::Parameters => "parameter count",
            DocumentLimit::Outputs => "output count",
        })
    }
}

#[derive(Debug, Error)]
pub enum StackError {
    #[error("{0}")]
    ConfigurationLimitExceeded(String),
    #[error("Document {document} exceeds the maximum {kind}: {actual} >= {limit}")]
    DocumentLimitExceeded {
        document: String,
        kind: DocumentLimit,
        actual: usize,
        limit: usize,
    },
    #[error("Unknown instance type {0}")]
    UnknownInstanceType(String),
    #[error("Unknown subnet {0}")]
    UnknownSubnet(String),
    #[error("No official image found for {os} on {architecture}")]
    UnknownImage { os: String, architecture: String },
    #[error("{0}")]
    MalformedReferenceInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Template error: {0}")]
    Template(#[from] stackdoc::Error),
}

impl From<serde_json::Error> for StackError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for StackError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::InvalidConfiguration(e.to_string())
    }
}

pub fn limit_exceeded<T>(message: String) -> crate::Result<T> {
    Err(StackError::ConfigurationLimitExceeded(message))
}
