//! Outgoing activities and diagnostics

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use super::ActionBase;
use crate::dialogs::{Action, DialogContext};
use crate::errors::DialogResult;
use crate::expressions::ExpressionProperty;
use crate::generators::{render_text, render_with_data, ActivityTemplate};
use crate::value_objects::{Activity, DialogTurnResult};

/// Sends a message rendered from a template
pub struct SendActivity {
    base: ActionBase,
    activity: ActivityTemplate,
}

impl SendActivity {
    pub fn new(activity: impl Into<ActivityTemplate>) -> Self {
        let activity = activity.into();
        Self {
            base: ActionBase::new("SendActivity", &activity.text),
            activity,
        }
    }
}

/// Logs rendered text and optionally sends it as a trace activity
pub struct LogAction {
    base: ActionBase,
    text: String,
    trace_activity: bool,
    label: Option<String>,
}

impl LogAction {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            base: ActionBase::new("LogAction", &text),
            text,
            trace_activity: false,
            label: None,
        }
    }

    pub fn with_trace_activity(mut self, trace: bool) -> Self {
        self.trace_activity = trace;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Sends a trace activity carrying a value, or the memory snapshot
pub struct TraceActivity {
    base: ActionBase,
    name: String,
    value_type: Option<String>,
    value: Option<ExpressionProperty>,
    label: Option<String>,
}

impl TraceActivity {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            base: ActionBase::new("TraceActivity", &name),
            name,
            value_type: None,
            value: None,
            label: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<ExpressionProperty>, value_type: Option<String>) -> Self {
        self.value = Some(value.into());
        self.value_type = value_type;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Sends the items of an array or object as one message
///
/// `item_template` is rendered per entry with `${item}` (and `${key}` for
/// objects) bound; `message_template` wraps the result as `${list}`.
pub struct SendList {
    base: ActionBase,
    items_property: String,
    message_template: String,
    item_template: String,
}

impl SendList {
    pub fn new(items_property: impl Into<String>) -> Self {
        let items_property = items_property.into();
        Self {
            base: ActionBase::new("SendList", &items_property),
            items_property,
            message_template: "${list}".to_string(),
            item_template: "- ${item}\n".to_string(),
        }
    }

    pub fn with_message_template(mut self, template: impl Into<String>) -> Self {
        let mut template = template.into();
        if !template.contains("${list}") {
            template.push_str("\n\n${list}");
        }
        self.message_template = template;
        self
    }

    pub fn with_item_template(mut self, template: impl Into<String>) -> Self {
        let mut template = template.into();
        if !template.contains("${item") {
            template.push_str(" ${item}\n");
        }
        self.item_template = template;
        self
    }

    async fn render_item(&self, dc: &DialogContext<'_>, key: Option<&str>, item: &Value) -> DialogResult<String> {
        let mut bindings = Map::new();
        bindings.insert("item".into(), item.clone());
        if let Some(key) = key {
            bindings.insert("key".into(), Value::String(key.to_string()));
        }
        render_with_data(dc, &self.item_template, bindings).await
    }
}

crate::impl_action_base!(SendActivity, LogAction, TraceActivity, SendList);

#[async_trait]
impl Action for SendActivity {
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
        let activity = self.activity.bind(dc).await?;
        dc.turn.send_activity(activity);
        dc.end_dialog(None).await
    }
}

#[async_trait]
impl Action for LogAction {
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
        let message = render_text(dc, &self.text).await?;
        info!(action_id = %self.base.id(), message = %message, "log action");
        if self.trace_activity {
            let trace = Activity::trace(
                "LogAction",
                Some("string".to_string()),
                Some(Value::String(message)),
                self.label.clone(),
            );
            dc.turn.send_activity(trace);
        }
        dc.end_dialog(None).await
    }
}

#[async_trait]
impl Action for TraceActivity {
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
        let (value, value_type) = match &self.value {
            Some(expression) => (dc.evaluate(expression)?, self.value_type.clone()),
            None => (dc.memory_snapshot(), Some("memory".to_string())),
        };
        let trace = Activity::trace(self.name.clone(), value_type, Some(value), self.label.clone());
        dc.turn.send_activity(trace);
        dc.end_dialog(None).await
    }
}

#[async_trait]
impl Action for SendList {
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
        let mut list = String::new();
        match dc.get_value(&self.items_property)? {
            Some(Value::Array(items)) => {
                for item in &items {
                    list.push_str(&self.render_item(dc, None, item).await?);
                }
            }
            Some(Value::Object(map)) => {
                for (key, item) in &map {
                    list.push_str(&self.render_item(dc, Some(key), item).await?);
                }
            }
            _ => {}
        }

        let mut bindings = Map::new();
        bindings.insert("list".into(), Value::String(list));
        bindings.insert(
            "utterance".into(),
            Value::String(dc.turn.activity.text_or_empty().to_string()),
        );
        let text = render_with_data(dc, &self.message_template, bindings).await?;
        let response = dc.turn.send_activity(Activity::message(text));
        dc.end_dialog(Some(serde_json::to_value(response)?)).await
    }
}
