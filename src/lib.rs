//! Adaptive dialog runtime
//!
//! This crate runs conversational dialogs built from declarative action
//! graphs. It provides:
//! - Adaptive dialogs whose execution plan is edited at runtime by triggers
//! - A hierarchical, expression-addressable memory model
//! - Event routing with bubbling and interruption between nested dialogs
//! - Input dialogs that prompt, validate and re-prompt across turns
//! - A host-facing [`DialogManager`] that loads and saves state per turn
//!
//! Dialog state is plain serializable data: a suspended conversation is
//! persisted between turns and resumed on whichever process handles the next
//! activity.

pub mod actions;
pub mod adaptive;
pub mod config;
pub mod declarative;
pub mod dialogs;
pub mod errors;
pub mod events;
pub mod expressions;
pub mod generators;
pub mod handlers;
pub mod input;
pub mod memory;
pub mod recognizers;
pub mod resources;
pub mod storage;
pub mod value_objects;

// Re-export main types
pub use adaptive::{AdaptiveDialog, FirstSelector, MostSpecificSelector, OnCondition, TriggerKind, TriggerSelector};

pub use config::RuntimeConfig;

pub use declarative::ComponentRegistry;

pub use dialogs::{Action, DialogContext, DialogSet, TurnContext, TurnServices};

pub use errors::{ControlFlowError, DialogError, DialogResult, StorageError};

pub use events::{names as event_names, DialogEvent};

pub use expressions::{ExpressionEngine, ExpressionEvaluator, ExpressionProperty};

pub use generators::{ActivityTemplate, LanguageGenerator, TemplateGenerator};

pub use handlers::{DialogManager, TurnOutcome};

pub use input::{ChoiceInput, ConfirmInput, InputDialog, NumberInput, TextInput};

pub use recognizers::{Recognizer, RecognizerResult, RegexRecognizer};

pub use storage::{MemoryStorage, Storage};

pub use value_objects::{
    Activity, ActivityType, ActionChangeList, ActionChangeType, ActionState, DialogInstance, DialogReason,
    DialogState, DialogTurnResult, DialogTurnStatus,
};
