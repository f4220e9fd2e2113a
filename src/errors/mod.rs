//! Error types for the dialog runtime
//!
//! Every failure that can end a turn is a [`DialogError`]. The variants follow
//! the categories the engine distinguishes when reporting to the host:
//! configuration mistakes, expression failures, control-flow signals that
//! found no enclosing scope, and actions used outside the context they need.

use thiserror::Error;

/// Result alias used throughout the crate
pub type DialogResult<T> = Result<T, DialogError>;

/// Errors raised while running dialogs
#[derive(Debug, Error)]
pub enum DialogError {
    /// A required field is missing or holds an unsupported value
    #[error("{action}: {message}")]
    Configuration { action: String, message: String },

    /// An expression failed to parse or evaluate
    #[error("expression '{expression}' failed: {message}")]
    Expression { expression: String, message: String },

    /// A control signal could not be delivered
    #[error(transparent)]
    ControlFlow(#[from] ControlFlowError),

    /// An action was run outside the context it requires
    #[error("{action} {message}")]
    ContextMisuse { action: String, message: String },

    /// No dialog with this id is registered in scope
    #[error("dialog '{0}' not found")]
    DialogNotFound(String),

    /// The persisted dialog stack does not have the expected shape
    #[error("invalid dialog state: {0}")]
    InvalidState(String),

    #[error("recognizer failed: {0}")]
    Recognizer(String),

    #[error("language generation failed: {0}")]
    Generation(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DialogError {
    /// Build a configuration error for the named action
    pub fn configuration(action: impl Into<String>, message: impl Into<String>) -> Self {
        DialogError::Configuration {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Build a context-misuse error for the named action
    pub fn context_misuse(action: impl Into<String>, message: impl Into<String>) -> Self {
        DialogError::ContextMisuse {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable category, exposed to `error` triggers
    pub fn kind(&self) -> &'static str {
        match self {
            DialogError::Configuration { .. } => "configuration",
            DialogError::Expression { .. } => "expression",
            DialogError::ControlFlow(_) => "controlFlow",
            DialogError::ContextMisuse { .. } => "contextMisuse",
            DialogError::DialogNotFound(_) => "dialogNotFound",
            DialogError::InvalidState(_) => "invalidState",
            DialogError::Recognizer(_) => "recognizer",
            DialogError::Generation(_) => "generation",
            DialogError::Resource(_) => "resource",
            DialogError::Storage(_) => "storage",
            DialogError::Serialization(_) => "serialization",
        }
    }
}

/// Control signals that reached the top of an action graph unhandled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlFlowError {
    #[error("goto target '{0}' not found in the enclosing action graph")]
    GotoTargetNotFound(String),

    #[error("break issued outside of a loop")]
    BreakOutsideLoop,

    #[error("continue issued outside of a loop")]
    ContinueOutsideLoop,

    #[error("unknown action scope command '{0}'")]
    UnknownCommand(String),
}

/// Failures reported by a [`Storage`](crate::storage::Storage) backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The stored version moved since the value was read
    #[error("write conflict on '{key}': expected version {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Failures raised by the expression engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Evaluation(String),
}

impl ExpressionError {
    /// Attach the source text and convert into a turn-ending error
    pub fn into_dialog_error(self, expression: &str) -> DialogError {
        DialogError::Expression {
            expression: expression.to_string(),
            message: self.to_string(),
        }
    }
}
