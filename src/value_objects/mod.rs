//! Value objects shared by the dialog runtime
//!
//! Everything here is plain serializable data: activities exchanged with the
//! channel, turn results, and the persisted shape of the dialog stack and its
//! execution plans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Kind of activity exchanged with the channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    /// User or bot utterance
    #[default]
    Message,
    /// Named programmatic event
    Event,
    /// Diagnostic output, ignored by most channels
    Trace,
    /// Members joined or left
    ConversationUpdate,
    Typing,
    EndOfConversation,
}

/// Hint to the channel about whether the bot expects a reply
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum InputHint {
    AcceptingInput,
    ExpectingInput,
    IgnoringInput,
}

/// A single inbound or outbound activity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Kind of activity
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    /// Unique identifier
    pub id: String,
    /// Utterance text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Structured payload (card submissions, event values, trace values)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Event or trace name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Trace label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Type tag of `value` for traces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    /// Locale of the text, e.g. `en-us`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_hint: Option<InputHint>,
    /// Channel the activity travels on
    #[serde(default)]
    pub channel_id: String,
    /// Conversation the activity belongs to
    #[serde(default)]
    pub conversation_id: String,
    /// Sender identity
    #[serde(default)]
    pub from_id: String,
    /// When the activity was created
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    fn new(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            id: Uuid::new_v4().to_string(),
            text: None,
            value: None,
            name: None,
            label: None,
            value_type: None,
            locale: None,
            input_hint: None,
            channel_id: String::new(),
            conversation_id: String::new(),
            from_id: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// A text message
    pub fn message(text: impl Into<String>) -> Self {
        let mut activity = Self::new(ActivityType::Message);
        activity.text = Some(text.into());
        activity
    }

    /// A named event carrying an optional value
    pub fn event(name: impl Into<String>, value: Option<Value>) -> Self {
        let mut activity = Self::new(ActivityType::Event);
        activity.name = Some(name.into());
        activity.value = value;
        activity
    }

    /// A diagnostic trace
    pub fn trace(name: impl Into<String>, value_type: Option<String>, value: Option<Value>, label: Option<String>) -> Self {
        let mut activity = Self::new(ActivityType::Trace);
        activity.name = Some(name.into());
        activity.value_type = value_type;
        activity.value = value;
        activity.label = label;
        activity
    }

    pub fn conversation_update() -> Self {
        Self::new(ActivityType::ConversationUpdate)
    }

    /// Address the activity to a conversation
    pub fn with_conversation(mut self, channel_id: impl Into<String>, conversation_id: impl Into<String>, from_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self.conversation_id = conversation_id.into();
        self.from_id = from_id.into();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn is_message(&self) -> bool {
        self.activity_type == ActivityType::Message
    }

    /// Text of the activity, empty when absent
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// Outcome of a begin/continue/resume call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DialogTurnStatus {
    /// Nothing was on the stack
    Empty,
    /// Suspended until the next activity
    Waiting,
    /// The dialog finished
    Complete,
    /// The dialog was cancelled
    Cancelled,
    /// A step finished while an enclosing plan has queued changes to apply
    Yielded,
    /// A child ended while its parent was looping over it; only seen by that parent
    ChildEnded,
}

/// Status plus optional result value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DialogTurnResult {
    pub status: DialogTurnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl DialogTurnResult {
    pub fn new(status: DialogTurnStatus, result: Option<Value>) -> Self {
        Self { status, result }
    }

    pub fn empty() -> Self {
        Self::new(DialogTurnStatus::Empty, None)
    }

    pub fn waiting() -> Self {
        Self::new(DialogTurnStatus::Waiting, None)
    }

    pub fn complete(result: Option<Value>) -> Self {
        Self::new(DialogTurnStatus::Complete, result)
    }

    pub fn cancelled() -> Self {
        Self::new(DialogTurnStatus::Cancelled, None)
    }

    pub fn yielded() -> Self {
        Self::new(DialogTurnStatus::Yielded, None)
    }

    pub fn child_ended(result: Option<Value>) -> Self {
        Self::new(DialogTurnStatus::ChildEnded, result)
    }

    /// Waiting for input or yielding to an ancestor plan
    pub fn is_suspended(&self) -> bool {
        matches!(self.status, DialogTurnStatus::Waiting | DialogTurnStatus::Yielded)
    }
}

/// Why a dialog is being resumed or ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DialogReason {
    BeginCalled,
    ContinueCalled,
    EndCalled,
    ReplaceCalled,
    CancelCalled,
    NextCalled,
}

/// Non-linear transfer requested by a completed child action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActionScopeCommand {
    BreakLoop,
    ContinueLoop,
    GotoAction,
}

/// Control signal returned as a child's result value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionScopeResult {
    #[serde(rename = "actionScopeCommand")]
    pub command: ActionScopeCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
}

impl ActionScopeResult {
    pub fn break_loop() -> Self {
        Self {
            command: ActionScopeCommand::BreakLoop,
            action_id: None,
        }
    }

    pub fn continue_loop() -> Self {
        Self {
            command: ActionScopeCommand::ContinueLoop,
            action_id: None,
        }
    }

    pub fn goto(action_id: impl Into<String>) -> Self {
        Self {
            command: ActionScopeCommand::GotoAction,
            action_id: Some(action_id.into()),
        }
    }

    /// Recognize a signal inside a result value
    pub fn from_value(value: &Value) -> Option<Self> {
        value.get("actionScopeCommand")?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("actionScopeCommand".into(), serde_json::json!(self.command));
        if let Some(id) = &self.action_id {
            map.insert("actionId".into(), Value::String(id.clone()));
        }
        Value::Object(map)
    }
}

/// How a change list splices into a plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActionChangeType {
    InsertActions,
    InsertActionsBeforeTags,
    AppendActions,
    EndSequence,
    ReplaceSequence,
}

/// One queued unit of work in a plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionState {
    /// Id of the action to begin
    pub dialog_id: String,
    /// Frames of the action once it has begun
    #[serde(default)]
    pub dialog_stack: Vec<DialogInstance>,
    /// Options passed when the action begins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ActionState {
    pub fn new(dialog_id: impl Into<String>) -> Self {
        Self {
            dialog_id: dialog_id.into(),
            dialog_stack: Vec::new(),
            options: None,
            tags: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: Option<Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// A batch splice applied to a plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionChangeList {
    pub change_type: ActionChangeType,
    #[serde(default)]
    pub actions: Vec<ActionState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ActionChangeList {
    pub fn new(change_type: ActionChangeType, actions: Vec<ActionState>) -> Self {
        Self {
            change_type,
            actions,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Remaining plan and pending changes of an adaptive dialog instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SequenceState {
    #[serde(default)]
    pub actions: Vec<ActionState>,
    #[serde(default)]
    pub changes: Vec<ActionChangeList>,
}

/// One active dialog on a stack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DialogInstance {
    /// Id of the dialog definition
    pub id: String,
    /// Identity of this activation, changes when the dialog is restarted
    pub instance_id: Uuid,
    /// Private memory (`this` scope, and `dialog` for containers)
    #[serde(default)]
    pub state: Map<String, Value>,
    /// Execution plan, present for adaptive dialogs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<SequenceState>,
}

impl DialogInstance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instance_id: Uuid::new_v4(),
            state: Map::new(),
            plan: None,
        }
    }
}

/// Persisted root of the dialog tree
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DialogState {
    #[serde(default)]
    pub dialog_stack: Vec<DialogInstance>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_scope_result_wire_shape() {
        let signal = ActionScopeResult::goto("step2");
        assert_eq!(
            signal.to_value(),
            json!({"actionScopeCommand": "gotoAction", "actionId": "step2"})
        );
        assert_eq!(ActionScopeResult::from_value(&signal.to_value()), Some(signal));
        assert_eq!(
            ActionScopeResult::from_value(&json!({"actionScopeCommand": "breakLoop"})),
            Some(ActionScopeResult::break_loop())
        );
        assert_eq!(ActionScopeResult::from_value(&json!("breakLoop")), None);
        assert_eq!(ActionScopeResult::from_value(&json!({"value": 1})), None);
    }

    #[test]
    fn test_activity_serializes_type_field() {
        let activity = Activity::message("hi").with_locale("en-us");
        let value = serde_json::to_value(&activity).unwrap();
        assert_eq!(value["type"], json!("message"));
        assert_eq!(value["text"], json!("hi"));
        assert_eq!(value["locale"], json!("en-us"));
    }
}
