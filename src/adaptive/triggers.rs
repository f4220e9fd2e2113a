//! Triggers: event-conditioned action lists
//!
//! A trigger listens for one event name, optionally narrowed by a condition.
//! When it fires, its actions are wrapped in a single [`ActionScope`] entry
//! and inserted at the front of the adaptive dialog's plan.

use serde_json::Value;
use std::sync::Arc;

use crate::actions::ActionScope;
use crate::dialogs::{Action, DialogContext};
use crate::errors::DialogResult;
use crate::events::{names, DialogEvent};
use crate::expressions::ExpressionProperty;
use crate::memory::turn_path;
use crate::value_objects::{ActionChangeList, ActionChangeType, ActionState, ActivityType};

/// What a trigger listens for
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerKind {
    /// The adaptive dialog is starting
    BeginDialog,
    /// Any activity, or only activities of one type
    Activity(Option<ActivityType>),
    MessageActivity,
    /// The recognizer's top intent, optionally requiring entities
    Intent { intent: String, entities: Vec<String> },
    /// A message nothing else handled
    UnknownIntent,
    /// A custom event by name
    DialogEvent(String),
    CancelDialog,
    Error,
    EndOfActions,
}

impl TriggerKind {
    /// Event name the trigger listens for
    pub fn event_name(&self) -> &str {
        match self {
            TriggerKind::BeginDialog => names::BEGIN_DIALOG,
            TriggerKind::Activity(_) | TriggerKind::MessageActivity => names::ACTIVITY_RECEIVED,
            TriggerKind::Intent { .. } => names::RECOGNIZED_INTENT,
            TriggerKind::UnknownIntent => names::UNKNOWN_INTENT,
            TriggerKind::DialogEvent(name) => name,
            TriggerKind::CancelDialog => names::CANCEL_DIALOG,
            TriggerKind::Error => names::ERROR,
            TriggerKind::EndOfActions => names::END_OF_ACTIONS,
        }
    }

    fn scope_kind(&self) -> &'static str {
        match self {
            TriggerKind::BeginDialog => "OnBeginDialog",
            TriggerKind::Activity(_) => "OnActivity",
            TriggerKind::MessageActivity => "OnMessageActivity",
            TriggerKind::Intent { .. } => "OnIntent",
            TriggerKind::UnknownIntent => "OnUnknownIntent",
            TriggerKind::DialogEvent(_) => "OnDialogEvent",
            TriggerKind::CancelDialog => "OnCancelDialog",
            TriggerKind::Error => "OnError",
            TriggerKind::EndOfActions => "OnEndOfActions",
        }
    }
}

/// Memory path of a required entity
fn entity_path(entity: &str) -> String {
    if entity.starts_with('@') || entity.starts_with(turn_path::RECOGNIZED) {
        entity.to_string()
    } else {
        format!("@{entity}")
    }
}

/// An event handler owned by an adaptive dialog
pub struct OnCondition {
    kind: TriggerKind,
    condition: Option<ExpressionProperty>,
    priority: i32,
    scope: Arc<ActionScope>,
}

impl OnCondition {
    pub fn new(kind: TriggerKind, actions: Vec<Arc<dyn Action>>) -> Self {
        let kind = match kind {
            TriggerKind::Intent { intent, entities } => TriggerKind::Intent {
                intent: intent.trim_start_matches('#').to_string(),
                entities,
            },
            other => other,
        };
        let scope = Arc::new(ActionScope::with_kind(kind.scope_kind(), actions));
        Self {
            kind,
            condition: None,
            priority: 0,
            scope,
        }
    }

    pub fn on_begin_dialog(actions: Vec<Arc<dyn Action>>) -> Self {
        Self::new(TriggerKind::BeginDialog, actions)
    }

    pub fn on_intent(intent: impl Into<String>, entities: Vec<String>, actions: Vec<Arc<dyn Action>>) -> Self {
        Self::new(
            TriggerKind::Intent {
                intent: intent.into(),
                entities,
            },
            actions,
        )
    }

    pub fn on_unknown_intent(actions: Vec<Arc<dyn Action>>) -> Self {
        Self::new(TriggerKind::UnknownIntent, actions)
    }

    pub fn on_event(name: impl Into<String>, actions: Vec<Arc<dyn Action>>) -> Self {
        Self::new(TriggerKind::DialogEvent(name.into()), actions)
    }

    pub fn on_cancel_dialog(actions: Vec<Arc<dyn Action>>) -> Self {
        Self::new(TriggerKind::CancelDialog, actions)
    }

    pub fn on_error(actions: Vec<Arc<dyn Action>>) -> Self {
        Self::new(TriggerKind::Error, actions)
    }

    /// Narrow the trigger with an extra condition
    pub fn with_condition(mut self, condition: impl Into<ExpressionProperty>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Lower values are tried first
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn kind(&self) -> &TriggerKind {
        &self.kind
    }

    pub fn event_name(&self) -> &str {
        self.kind.event_name()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// How narrowly the trigger matches; higher wins among equal priorities
    pub fn specificity(&self) -> i32 {
        let conditioned = i32::from(self.condition.is_some());
        match &self.kind {
            TriggerKind::Intent { entities, .. } => 1 + entities.len() as i32 + conditioned,
            TriggerKind::UnknownIntent => -1,
            _ => conditioned,
        }
    }

    /// The scope holding the trigger's actions
    pub fn scope(&self) -> Arc<dyn Action> {
        self.scope.clone()
    }

    /// Whether the trigger fires for `event` in the current memory
    pub fn matches(&self, dc: &DialogContext<'_>, event: &DialogEvent) -> DialogResult<bool> {
        if !event.is(self.event_name()) {
            return Ok(false);
        }
        let kind_matches = match &self.kind {
            TriggerKind::Activity(Some(activity_type)) => dc.turn.activity.activity_type == *activity_type,
            TriggerKind::MessageActivity => dc.turn.activity.is_message(),
            TriggerKind::Intent { intent, entities } => {
                let top = dc.get_value(turn_path::TOP_INTENT)?;
                if top.as_ref().and_then(Value::as_str) != Some(intent.as_str()) {
                    return Ok(false);
                }
                let mut all_present = true;
                for entity in entities {
                    if dc.get_value(&entity_path(entity))?.is_none() {
                        all_present = false;
                        break;
                    }
                }
                all_present
            }
            _ => true,
        };
        if !kind_matches {
            return Ok(false);
        }
        match &self.condition {
            Some(condition) => dc.evaluate_bool(condition),
            None => Ok(true),
        }
    }

    /// Plan change queued when the trigger fires
    pub fn change_list(&self) -> ActionChangeList {
        ActionChangeList::new(
            ActionChangeType::InsertActions,
            vec![ActionState::new(self.scope.id())],
        )
    }
}

impl std::fmt::Debug for OnCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnCondition")
            .field("kind", &self.kind)
            .field("condition", &self.condition)
            .field("priority", &self.priority)
            .field("scope", &self.scope.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::SendActivity;

    #[test]
    fn test_intent_name_is_trimmed() {
        let trigger = OnCondition::on_intent("#AddItem", Vec::new(), Vec::new());
        assert_eq!(
            trigger.kind(),
            &TriggerKind::Intent {
                intent: "AddItem".into(),
                entities: Vec::new()
            }
        );
        assert_eq!(trigger.event_name(), names::RECOGNIZED_INTENT);
    }

    #[test]
    fn test_specificity() {
        let entities = vec!["item".to_string(), "@list".to_string()];
        assert_eq!(OnCondition::on_intent("Add", entities.clone(), Vec::new()).specificity(), 3);
        assert_eq!(
            OnCondition::on_intent("Add", entities, Vec::new()).with_condition("true").specificity(),
            4
        );
        assert_eq!(OnCondition::on_unknown_intent(Vec::new()).specificity(), -1);
        assert_eq!(OnCondition::on_event("x", Vec::new()).specificity(), 0);
        assert_eq!(OnCondition::on_event("x", Vec::new()).with_condition("true").specificity(), 1);
    }

    #[test]
    fn test_entity_paths() {
        assert_eq!(entity_path("item"), "@item");
        assert_eq!(entity_path("@item"), "@item");
        assert_eq!(entity_path("turn.recognized.entities.item"), "turn.recognized.entities.item");
    }

    #[test]
    fn test_change_list_targets_scope() {
        let trigger = OnCondition::on_begin_dialog(vec![Arc::new(SendActivity::new("hi"))]);
        let change = trigger.change_list();
        assert_eq!(change.change_type, ActionChangeType::InsertActions);
        assert_eq!(change.actions[0].dialog_id, trigger.scope().id());
        assert!(trigger.scope().id().starts_with("OnBeginDialog["));
    }
}
