//! Control signals and plan editing

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::ActionBase;
use crate::dialogs::{Action, DialogContext};
use crate::errors::{DialogError, DialogResult};
use crate::expressions::ExpressionProperty;
use crate::value_objects::{ActionChangeList, ActionChangeType, ActionScopeResult, ActionState, DialogTurnResult};

/// Leaves the nearest enclosing loop
pub struct BreakLoop {
    base: ActionBase,
}

impl BreakLoop {
    pub fn new() -> Self {
        Self {
            base: ActionBase::new("BreakLoop", ""),
        }
    }
}

impl Default for BreakLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts the next iteration of the nearest enclosing loop
pub struct ContinueLoop {
    base: ActionBase,
}

impl ContinueLoop {
    pub fn new() -> Self {
        Self {
            base: ActionBase::new("ContinueLoop", ""),
        }
    }
}

impl Default for ContinueLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Jumps to the action with the given id
pub struct GotoAction {
    base: ActionBase,
    action_id: String,
}

impl GotoAction {
    pub fn new(action_id: impl Into<String>) -> Self {
        let action_id = action_id.into();
        Self {
            base: ActionBase::new("GotoAction", &action_id),
            action_id,
        }
    }
}

crate::impl_action_base!(BreakLoop, ContinueLoop, GotoAction);

#[async_trait]
impl Action for BreakLoop {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn assign_id(&self, id: String) -> bool {
        self.base.assign_id(id)
    }

    fn disabled(&self) -> Option<&ExpressionProperty> {
        self.base.disabled.as_ref()
    }

    async fn begin_dialog(&self, dc: &mut DialogContext<'_>, _options: Option<Value>) -> DialogResult<DialogTurnResult> {
        dc.end_dialog(Some(ActionScopeResult::break_loop().to_value())).await
    }
}

#[async_trait]
impl Action for ContinueLoop {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn assign_id(&self, id: String) -> bool {
        self.base.assign_id(id)
    }

    fn disabled(&self) -> Option<&ExpressionProperty> {
        self.base.disabled.as_ref()
    }

    async fn begin_dialog(&self, dc: &mut DialogContext<'_>, _options: Option<Value>) -> DialogResult<DialogTurnResult> {
        dc.end_dialog(Some(ActionScopeResult::continue_loop().to_value())).await
    }
}

#[async_trait]
impl Action for GotoAction {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn assign_id(&self, id: String) -> bool {
        self.base.assign_id(id)
    }

    fn disabled(&self) -> Option<&ExpressionProperty> {
        self.base.disabled.as_ref()
    }

    async fn begin_dialog(&self, dc: &mut DialogContext<'_>, _options: Option<Value>) -> DialogResult<DialogTurnResult> {
        if self.action_id.is_empty() {
            return Err(DialogError::configuration(self.base.id(), "actionId is required"));
        }
        dc.end_dialog(Some(ActionScopeResult::goto(&self.action_id).to_value())).await
    }
}

/// Queues its actions as a change to the enclosing plan
pub struct EditActions {
    base: ActionBase,
    change_type: ActionChangeType,
    actions: Vec<Arc<dyn Action>>,
}

impl EditActions {
    pub fn new(change_type: ActionChangeType, actions: Vec<Arc<dyn Action>>) -> Self {
        let ids: Vec<&str> = actions.iter().map(|action| action.id()).collect();
        let label = format!("{change_type:?}|{}", ids.join(","));
        Self {
            base: ActionBase::new("EditActions", &label),
            change_type,
            actions,
        }
    }
}

crate::impl_action_base!(EditActions);

#[async_trait]
impl Action for EditActions {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn assign_id(&self, id: String) -> bool {
        self.base.assign_id(id)
    }

    fn disabled(&self) -> Option<&ExpressionProperty> {
        self.base.disabled.as_ref()
    }

    async fn begin_dialog(&self, dc: &mut DialogContext<'_>, _options: Option<Value>) -> DialogResult<DialogTurnResult> {
        let planned = self
            .actions
            .iter()
            .map(|action| ActionState::new(action.id()))
            .collect();
        {
            let mut sequence = dc.sequence().ok_or_else(|| {
                DialogError::context_misuse(self.base.id(), "should only be used in the context of an adaptive dialog")
            })?;
            sequence.queue_changes(ActionChangeList::new(self.change_type, planned))?;
        }
        dc.end_dialog(None).await
    }

    fn dependencies(&self) -> Vec<Arc<dyn Action>> {
        self.actions.clone()
    }
}

/// Ends the turn and continues with the next message
pub struct EndTurn {
    base: ActionBase,
}

impl EndTurn {
    pub fn new() -> Self {
        Self {
            base: ActionBase::new("EndTurn", ""),
        }
    }
}

impl Default for EndTurn {
    fn default() -> Self {
        Self::new()
    }
}

crate::impl_action_base!(EndTurn);

#[async_trait]
impl Action for EndTurn {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn assign_id(&self, id: String) -> bool {
        self.base.assign_id(id)
    }

    fn disabled(&self) -> Option<&ExpressionProperty> {
        self.base.disabled.as_ref()
    }

    async fn begin_dialog(&self, _dc: &mut DialogContext<'_>, _options: Option<Value>) -> DialogResult<DialogTurnResult> {
        Ok(DialogTurnResult::waiting())
    }

    async fn continue_dialog(&self, dc: &mut DialogContext<'_>) -> DialogResult<DialogTurnResult> {
        if dc.turn.activity.is_message() {
            dc.end_dialog(None).await
        } else {
            Ok(DialogTurnResult::waiting())
        }
    }
}
