//! Actions that start, end, replace or cancel dialogs

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::{bind_options, ActionBase};
use crate::dialogs::{Action, DialogContext};
use crate::errors::{DialogError, DialogResult};
use crate::expressions::ExpressionProperty;
use crate::memory::turn_path;
use crate::value_objects::{DialogReason, DialogTurnResult};

fn container_required(action_id: &str) -> DialogError {
    DialogError::context_misuse(action_id, "should only ever be used within a container dialog")
}

/// Begins another dialog and waits for its result
pub struct BeginDialog {
    base: ActionBase,
    dialog_id: Option<String>,
    dialog: Option<Arc<dyn Action>>,
    options: Vec<(String, ExpressionProperty)>,
    result_property: Option<String>,
    include_activity: bool,
}

impl BeginDialog {
    pub fn new(dialog_id: impl Into<String>) -> Self {
        let dialog_id = dialog_id.into();
        Self {
            base: ActionBase::new("BeginDialog", &dialog_id),
            dialog_id: Some(dialog_id).filter(|id| !id.is_empty()),
            dialog: None,
            options: Vec::new(),
            result_property: None,
            include_activity: false,
        }
    }

    /// Begin an inline dialog, registering it alongside this action
    pub fn with_dialog(dialog: Arc<dyn Action>) -> Self {
        let mut action = Self::new(dialog.id());
        action.dialog = Some(dialog);
        action
    }

    /// Add an option whose value is evaluated when the dialog begins
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<ExpressionProperty>) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }

    pub fn with_result_property(mut self, property: impl Into<String>) -> Self {
        self.result_property = Some(property.into());
        self
    }

    /// Let the begun dialog consume the current activity
    pub fn with_include_activity(mut self, include: bool) -> Self {
        self.include_activity = include;
        self
    }
}

/// Ends the enclosing dialog with an optional value
pub struct EndDialog {
    base: ActionBase,
    value: Option<ExpressionProperty>,
}

impl EndDialog {
    pub fn new(value: Option<ExpressionProperty>) -> Self {
        let label = value.as_ref().map(|v| v.source().to_string()).unwrap_or_default();
        Self {
            base: ActionBase::new("EndDialog", &label),
            value,
        }
    }
}

/// Replaces the enclosing dialog with another one
pub struct ReplaceDialog {
    base: ActionBase,
    dialog_id: String,
    options: Vec<(String, ExpressionProperty)>,
}

impl ReplaceDialog {
    pub fn new(dialog_id: impl Into<String>) -> Self {
        let dialog_id = dialog_id.into();
        Self {
            base: ActionBase::new("ReplaceDialog", &dialog_id),
            dialog_id,
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<ExpressionProperty>) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }
}

/// Restarts the enclosing dialog
pub struct RepeatDialog {
    base: ActionBase,
    options: Vec<(String, ExpressionProperty)>,
}

impl RepeatDialog {
    pub fn new() -> Self {
        Self {
            base: ActionBase::new("RepeatDialog", ""),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<ExpressionProperty>) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }
}

impl Default for RepeatDialog {
    fn default() -> Self {
        Self::new()
    }
}

/// Unwinds every active dialog, giving each a chance to intercept
pub struct CancelAllDialogs {
    base: ActionBase,
    event_name: Option<String>,
    event_value: Option<ExpressionProperty>,
}

impl CancelAllDialogs {
    pub fn new() -> Self {
        Self {
            base: ActionBase::new("CancelAllDialogs", ""),
            event_name: None,
            event_value: None,
        }
    }

    /// Emit `name` instead of `cancelDialog` while unwinding
    pub fn with_event(mut self, name: impl Into<String>, value: Option<ExpressionProperty>) -> Self {
        let name = name.into();
        self.base.relabel("CancelAllDialogs", &name);
        self.event_name = Some(name);
        self.event_value = value;
        self
    }
}

impl Default for CancelAllDialogs {
    fn default() -> Self {
        Self::new()
    }
}

/// Raises a named event and ends with whether it was handled
pub struct EmitEvent {
    base: ActionBase,
    event_name: String,
    event_value: Option<ExpressionProperty>,
    bubble_event: bool,
    result_property: Option<String>,
}

impl EmitEvent {
    pub fn new(event_name: impl Into<String>) -> Self {
        let event_name = event_name.into();
        Self {
            base: ActionBase::new("EmitEvent", &event_name),
            event_name,
            event_value: None,
            bubble_event: false,
            result_property: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<ExpressionProperty>) -> Self {
        self.event_value = Some(value.into());
        self
    }

    pub fn with_bubble(mut self, bubble: bool) -> Self {
        self.bubble_event = bubble;
        self
    }

    pub fn with_result_property(mut self, property: impl Into<String>) -> Self {
        self.result_property = Some(property.into());
        self
    }
}

crate::impl_action_base!(BeginDialog, EndDialog, ReplaceDialog, RepeatDialog, CancelAllDialogs, EmitEvent);

#[async_trait]
impl Action for BeginDialog {
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
        let dialog_id = match &self.dialog {
            Some(dialog) => dialog.id(),
            None => self
                .dialog_id
                .as_deref()
                .ok_or_else(|| DialogError::configuration(self.base.id(), "dialogId is required"))?,
        };
        let options = bind_options(dc, &self.options)?;
        if self.include_activity {
            dc.set_value(turn_path::ACTIVITY_PROCESSED, Value::Bool(false))?;
        }
        debug!(action_id = %self.base.id(), dialog_id, "beginning dialog");
        dc.begin_dialog(dialog_id, options).await
    }

    async fn resume_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        if let Some(property) = &self.result_property {
            dc.set_value(property, result.clone().unwrap_or(Value::Null))?;
        }
        dc.end_dialog(result).await
    }

    fn dependencies(&self) -> Vec<Arc<dyn Action>> {
        self.dialog.iter().cloned().collect()
    }
}

#[async_trait]
impl Action for EndDialog {
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
        let value = match &self.value {
            Some(expression) => Some(dc.evaluate(expression)?),
            None => None,
        };
        if let Some(mut parent) = dc.parent() {
            return parent.end_dialog(value).await;
        }
        dc.end_dialog(value).await
    }
}

#[async_trait]
impl Action for ReplaceDialog {
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
        if self.dialog_id.is_empty() {
            return Err(DialogError::configuration(self.base.id(), "dialogId is required"));
        }
        let options = bind_options(dc, &self.options)?;
        let mut parent = dc.parent().ok_or_else(|| container_required(self.base.id()))?;
        parent.replace_dialog(&self.dialog_id, options).await
    }
}

#[async_trait]
impl Action for RepeatDialog {
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
        let options = bind_options(dc, &self.options)?;
        let mut parent = dc.parent().ok_or_else(|| container_required(self.base.id()))?;
        let dialog_id = parent
            .active_dialog()
            .map(|instance| instance.id.clone())
            .ok_or_else(|| container_required(self.base.id()))?;
        info!(dialog_id = %dialog_id, "repeating dialog");
        parent.replace_dialog(&dialog_id, options).await
    }
}

#[async_trait]
impl Action for CancelAllDialogs {
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
        let value = match &self.event_value {
            Some(expression) => Some(dc.evaluate(expression)?),
            None => None,
        };
        dc.cancel_all_dialogs(true, self.event_name.as_deref(), value).await
    }
}

#[async_trait]
impl Action for EmitEvent {
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
        let value = match &self.event_value {
            Some(expression) => Some(dc.evaluate(expression)?),
            None => None,
        };
        let handled = if let Some(mut parent) = dc.parent() {
            parent
                .emit_event(&self.event_name, value, self.bubble_event, false)
                .await?
        } else {
            dc.emit_event(&self.event_name, value, self.bubble_event, false)
                .await?
        };
        debug!(event = %self.event_name, handled, "event emitted");
        if let Some(property) = &self.result_property {
            dc.set_value(property, Value::Bool(handled))?;
        }
        dc.end_dialog(Some(Value::Bool(handled))).await
    }
}
