//! Error types for intent-mail.

use serde::{Deserialize, Serialize};

use crate::workflow::Step;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// A workflow action whose precondition was not met.
///
/// Rejections never mutate the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Recipient name and email are required")]
    MissingRecipientFields,

    #[error("Recipient email {0:?} is malformed")]
    MalformedEmail(String),

    #[error("Action {action} is not allowed in step {step}")]
    InvalidStep { action: &'static str, step: Step },

    #[error("An intent must be classified before it can be confirmed")]
    ClassificationRequired,

    #[error("Draft body is empty")]
    EmptyDraft,
}

impl ValidationError {
    /// Stable machine-readable code for this rejection.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "empty_message",
            Self::MissingRecipientFields => "missing_recipient_fields",
            Self::MalformedEmail(_) => "malformed_email",
            Self::InvalidStep { .. } => "invalid_step",
            Self::ClassificationRequired => "classification_required",
            Self::EmptyDraft => "empty_draft",
        }
    }
}

/// Intent classifier errors. Both are retryable by re-running `analyze`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    #[error("Model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    #[error("Inference failed: {reason}")]
    Inference { reason: String },
}

/// Coarse classification of a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchErrorKind {
    Authentication,
    Transport,
    Unknown,
}

impl std::fmt::Display for DispatchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Transport => write!(f, "transport"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Dispatch-time failures. The draft is always preserved for a retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum DispatchError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Dispatch failed: {0}")]
    Unknown(String),
}

impl DispatchError {
    pub fn kind(&self) -> DispatchErrorKind {
        match self {
            Self::Authentication(_) => DispatchErrorKind::Authentication,
            Self::Transport(_) => DispatchErrorKind::Transport,
            Self::Unknown(_) => DispatchErrorKind::Unknown,
        }
    }
}

/// Errors returned by workflow actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),
}

impl WorkflowError {
    /// The validation code, if this is a rejected precondition.
    pub fn validation_code(&self) -> Option<&'static str> {
        match self {
            Self::Validation(e) => Some(e.code()),
            Self::Classifier(_) => None,
        }
    }
}

/// Result type alias for intent-mail.
pub type Result<T> = std::result::Result<T, Error>;
