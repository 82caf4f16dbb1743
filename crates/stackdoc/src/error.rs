use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Resource {0} is already defined in the template")]
    DuplicateResource(String),
    #[error("Output {0} is already defined in the template")]
    DuplicateOutput(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Unknown token {0} referenced in rendered text")]
    UnknownToken(usize),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
