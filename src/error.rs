//! Error handling for the store assistant
//!
//! One error enum covers the whole request path. Local conditions the
//! orchestration loop can reason about (unknown tool, data access hiccups)
//! are absorbed into tool results; everything else aborts the exchange and
//! reaches the caller as a single failure.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the assistant
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream API error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Data access error: {0}")]
    DataAccess(String),

    #[error("Model returned neither tool calls nor content")]
    EmptyModelResponse,

    #[error("Exchange exceeded the {0:?} deadline")]
    DeadlineExceeded(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AssistantError {
    /// Machine-readable code sent alongside the user-facing message
    pub fn code(&self) -> &'static str {
        match self {
            AssistantError::EmptyQuestion => "empty_question",
            AssistantError::Configuration(_) => "configuration",
            AssistantError::Upstream { .. } => "upstream",
            AssistantError::Transport(_) => "transport",
            AssistantError::UnknownTool(_) => "unknown_tool",
            AssistantError::DataAccess(_) => "data_access",
            AssistantError::EmptyModelResponse => "empty_model_response",
            AssistantError::DeadlineExceeded(_) => "deadline_exceeded",
            AssistantError::Serialization(_) => "serialization",
        }
    }

    /// Whether the condition is turned into tool-result content instead of
    /// aborting the exchange.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AssistantError::UnknownTool(_) | AssistantError::DataAccess(_)
        )
    }

    /// Message suitable for showing to the person who asked the question
    pub fn user_message(&self) -> String {
        match self {
            AssistantError::EmptyQuestion => "Please enter a question.".to_string(),
            AssistantError::Configuration(detail) => format!(
                "The assistant is not configured correctly: {}. Check the backend credentials.",
                detail
            ),
            AssistantError::DeadlineExceeded(_) => {
                "The assistant took too long to answer. Please try again.".to_string()
            }
            _ => "The assistant could not answer right now. Please try again later.".to_string(),
        }
    }

    pub(crate) fn data_access(err: impl std::fmt::Display) -> Self {
        AssistantError::DataAccess(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AssistantError>;
