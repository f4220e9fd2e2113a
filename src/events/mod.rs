//! Dialog events
//!
//! Events are routed through the active dialog tree by
//! [`DialogContext::emit_event`](crate::dialogs::DialogContext::emit_event):
//! each dialog gets a pre-bubble look, unclaimed events bubble to the parent,
//! and the post-bubble pass runs on the way back down.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known event names
pub mod names {
    /// A dialog is starting
    pub const BEGIN_DIALOG: &str = "beginDialog";
    /// A dialog is being asked to re-prompt
    pub const REPROMPT_DIALOG: &str = "repromptDialog";
    /// The stack is being cancelled
    pub const CANCEL_DIALOG: &str = "cancelDialog";
    /// A new activity arrived for the turn
    pub const ACTIVITY_RECEIVED: &str = "activityReceived";
    /// The recognizer produced a result
    pub const RECOGNIZED_INTENT: &str = "recognizedIntent";
    /// A message arrived and nothing else handled it
    pub const UNKNOWN_INTENT: &str = "unknownIntent";
    /// Run recognition only, used by inputs checking for interruptions
    pub const RECOGNIZE_UTTERANCE: &str = "recognizeUtterance";
    /// The plan of an adaptive dialog drained
    pub const END_OF_ACTIONS: &str = "endOfActions";
    /// A turn failed
    pub const ERROR: &str = "error";
}

/// A named event with an optional payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DialogEvent {
    /// Event name
    pub name: String,
    /// Payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Whether unclaimed events continue to the parent dialog
    pub bubble: bool,
}

impl DialogEvent {
    pub fn new(name: impl Into<String>, value: Option<Value>, bubble: bool) -> Self {
        Self {
            name: name.into(),
            value,
            bubble,
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}
