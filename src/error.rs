// src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Error {status}: {message}")]
    Application { status: u16, message: String },

    #[error("Submission error: {0}")]
    Submission(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Fee estimation error: {0}")]
    Estimation(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ClientError::Configuration(msg.into())
    }

    pub(crate) fn transport(call: &str, err: impl std::fmt::Display) -> Self {
        ClientError::Transport(format!("{call}: {err}"))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
