//! Named memory scopes and well-known paths

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named partition of the conversation state store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MemoryScope {
    /// Per-user values, persisted across turns
    User,
    /// Per-conversation values, persisted across turns
    Conversation,
    /// Values that live for a single turn
    Turn,
    /// State of the nearest enclosing dialog container
    Dialog,
    /// State of the currently executing dialog instance
    This,
    /// Read-only view of the executing action's configuration
    Class,
    /// Read-only host settings
    Settings,
}

impl MemoryScope {
    pub const ALL: [MemoryScope; 7] = [
        MemoryScope::User,
        MemoryScope::Conversation,
        MemoryScope::Turn,
        MemoryScope::Dialog,
        MemoryScope::This,
        MemoryScope::Class,
        MemoryScope::Settings,
    ];

    /// Resolve a scope from the leading segment of a path
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "user" => Some(MemoryScope::User),
            "conversation" => Some(MemoryScope::Conversation),
            "turn" => Some(MemoryScope::Turn),
            "dialog" => Some(MemoryScope::Dialog),
            "this" => Some(MemoryScope::This),
            "class" => Some(MemoryScope::Class),
            "settings" => Some(MemoryScope::Settings),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MemoryScope::User => "user",
            MemoryScope::Conversation => "conversation",
            MemoryScope::Turn => "turn",
            MemoryScope::Dialog => "dialog",
            MemoryScope::This => "this",
            MemoryScope::Class => "class",
            MemoryScope::Settings => "settings",
        }
    }

    /// Scopes that are loaded before and saved after every turn
    pub fn is_durable(&self) -> bool {
        matches!(self, MemoryScope::User | MemoryScope::Conversation)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, MemoryScope::Class | MemoryScope::Settings)
    }
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Paths in the `turn` scope written by the engine
pub mod turn_path {
    pub const ACTIVITY: &str = "turn.activity";
    pub const RECOGNIZED: &str = "turn.recognized";
    pub const TOP_INTENT: &str = "turn.recognized.intent";
    pub const TOP_SCORE: &str = "turn.recognized.score";
    pub const DIALOG_EVENT: &str = "turn.dialogEvent";
    pub const INTERRUPTED: &str = "turn.interrupted";
    pub const ACTIVITY_PROCESSED: &str = "turn.activityProcessed";
    pub const LAST_RESULT: &str = "turn.lastResult";
}

/// Paths in the `dialog` scope written by the engine
pub mod dialog_path {
    pub const OPTIONS: &str = "dialog.options";
    pub const RESULT: &str = "dialog.result";
    pub const FOREACH_INDEX: &str = "dialog.foreach.index";
    pub const FOREACH_VALUE: &str = "dialog.foreach.value";
    pub const FOREACH_PAGE: &str = "dialog.foreach.page";
    pub const FOREACH_PAGE_INDEX: &str = "dialog.foreach.pageindex";
}

/// Paths in the `this` scope used by inputs and scopes
pub mod this_path {
    pub const OPTIONS: &str = "this.options";
    pub const VALUE: &str = "this.value";
    pub const TURN_COUNT: &str = "this.turnCount";
    pub const OFFSET: &str = "this.offset";
    pub const INDEX: &str = "this.index";
}
