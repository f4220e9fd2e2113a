//! Factories for the built-in `$kind`s

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{parse_config, ActionCommon, ComponentRegistry, ADAPTIVE_DIALOG_KIND};
use crate::actions::{
    ActionScope, ArrayChangeType, BeginDialog, BreakLoop, CancelAllDialogs, Case, ContinueLoop, DeleteProperties,
    DeleteProperty, EditActions, EditArray, EmitEvent, EndDialog, EndTurn, Foreach, ForeachPage, GotoAction,
    IfCondition, InitProperty, LogAction, PropertyAssignment, RepeatDialog, ReplaceDialog, SendActivity, SendList,
    SetProperties, SetProperty, SwitchCondition, TraceActivity,
};
use crate::adaptive::{OnCondition, TriggerKind};
use crate::dialogs::Action;
use crate::errors::DialogResult;
use crate::expressions::ExpressionProperty;
use crate::generators::ActivityTemplate;
use crate::input::{
    Choice, ChoiceInput, ChoiceOutputFormat, ChoiceRecognizer, ConfirmInput, InputDialogCore, ListStyle, NumberInput,
    TextInput, TextOutputFormat, TextRecognizer,
};
use crate::recognizers::{IntentPattern, RegexRecognizer};
use crate::value_objects::{ActionChangeType, ActivityType};

/// Apply the shared `id` and `disabled` fields and erase the type
macro_rules! configured {
    ($kind:expr, $value:expr, $action:expr) => {{
        let common: ActionCommon = parse_config($kind, $value)?;
        let action: Arc<dyn Action> = Arc::new($action.configure_base(common.id, common.disabled));
        Ok(action)
    }};
}

type Options = BTreeMap<String, ExpressionProperty>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionsConfig {
    #[serde(default)]
    actions: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IfConfig {
    condition: ExpressionProperty,
    #[serde(default)]
    actions: Vec<Value>,
    #[serde(default)]
    else_actions: Vec<Value>,
}

#[derive(Deserialize)]
struct CaseConfig {
    value: Value,
    #[serde(default)]
    actions: Vec<Value>,
}

#[derive(Deserialize)]
struct SwitchConfig {
    condition: ExpressionProperty,
    #[serde(default)]
    cases: Vec<CaseConfig>,
    #[serde(default)]
    default: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForeachConfig {
    items_property: String,
    index: Option<String>,
    value: Option<String>,
    #[serde(default)]
    actions: Vec<Value>,
}

fn default_page_size() -> usize {
    10
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForeachPageConfig {
    items_property: String,
    #[serde(default = "default_page_size")]
    page_size: usize,
    #[serde(default)]
    actions: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GotoConfig {
    #[serde(default)]
    action_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditActionsConfig {
    change_type: ActionChangeType,
    #[serde(default)]
    actions: Vec<Value>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BeginDialogConfig {
    #[serde(alias = "dialogId")]
    dialog: Option<Value>,
    options: Options,
    result_property: Option<String>,
    include_activity: bool,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct EndDialogConfig {
    value: Option<ExpressionProperty>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ReplaceDialogConfig {
    #[serde(alias = "dialogId")]
    dialog: String,
    options: Options,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RepeatDialogConfig {
    options: Options,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CancelAllConfig {
    event_name: Option<String>,
    event_value: Option<ExpressionProperty>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmitEventConfig {
    event_name: String,
    event_value: Option<ExpressionProperty>,
    #[serde(default)]
    bubble_event: bool,
    result_property: Option<String>,
}

#[derive(Deserialize)]
struct SetPropertyConfig {
    property: String,
    value: ExpressionProperty,
}

#[derive(Deserialize)]
struct SetPropertiesConfig {
    #[serde(default)]
    assignments: Vec<PropertyAssignment>,
}

#[derive(Deserialize)]
struct InitPropertyConfig {
    property: String,
    #[serde(rename = "type")]
    property_type: String,
}

#[derive(Deserialize)]
struct DeletePropertyConfig {
    property: String,
}

#[derive(Deserialize)]
struct DeletePropertiesConfig {
    #[serde(default)]
    properties: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditArrayConfig {
    change_type: ArrayChangeType,
    items_property: String,
    value: Option<ExpressionProperty>,
    result_property: Option<String>,
}

#[derive(Deserialize)]
struct SendActivityConfig {
    activity: ActivityTemplate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogConfig {
    text: String,
    #[serde(default)]
    trace_activity: bool,
    label: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraceConfig {
    #[serde(default = "default_trace_name")]
    name: String,
    value_type: Option<String>,
    value: Option<ExpressionProperty>,
    label: Option<String>,
}

fn default_trace_name() -> String {
    "TraceActivity".to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendListConfig {
    items_property: String,
    message_template: Option<String>,
    item_template: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TextInputConfig {
    output_format: TextOutputFormat,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChoiceConfig {
    Value(String),
    Full(Choice),
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ChoiceInputConfig {
    choices: Vec<ChoiceConfig>,
    output_format: ChoiceOutputFormat,
    style: ListStyle,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerConfig {
    condition: Option<ExpressionProperty>,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    actions: Vec<Value>,
}

#[derive(Deserialize)]
struct IntentConfig {
    intent: String,
    #[serde(default)]
    entities: Vec<String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ActivityTriggerConfig {
    #[serde(rename = "type")]
    activity_type: Option<ActivityType>,
}

#[derive(Deserialize)]
struct EventTriggerConfig {
    event: String,
}

#[derive(Deserialize)]
struct RegexRecognizerConfig {
    #[serde(default)]
    intents: Vec<IntentPattern>,
}

fn with_options<A>(action: A, options: Options, add: impl Fn(A, String, ExpressionProperty) -> A) -> A {
    options
        .into_iter()
        .fold(action, |action, (name, value)| add(action, name, value))
}

pub(super) fn register(registry: &mut ComponentRegistry) {
    register_scopes(registry);
    register_dialog_flow(registry);
    register_state(registry);
    register_output(registry);
    register_inputs(registry);
    register_triggers(registry);

    registry.register_recognizer("Microsoft.RegexRecognizer", |_, value| {
        let config: RegexRecognizerConfig = parse_config("Microsoft.RegexRecognizer", value)?;
        Ok(Arc::new(RegexRecognizer::from_patterns(&config.intents)?))
    });
}

fn register_scopes(registry: &mut ComponentRegistry) {
    for kind in ["Microsoft.Sequence", "Microsoft.DoActions"] {
        registry.register_action(kind, move |registry, value| {
            let config: ActionsConfig = parse_config(kind, value)?;
            let actions = registry.build_actions(&config.actions)?;
            configured!(kind, value, ActionScope::with_kind("Sequence", actions))
        });
    }
    registry.register_action("Microsoft.IfCondition", |registry, value| {
        let kind = "Microsoft.IfCondition";
        let config: IfConfig = parse_config(kind, value)?;
        let action = IfCondition::new(
            config.condition,
            registry.build_actions(&config.actions)?,
            registry.build_actions(&config.else_actions)?,
        );
        configured!(kind, value, action)
    });
    registry.register_action("Microsoft.SwitchCondition", |registry, value| {
        let kind = "Microsoft.SwitchCondition";
        let config: SwitchConfig = parse_config(kind, value)?;
        let cases = config
            .cases
            .into_iter()
            .map(|case| Ok(Case::new(case.value, registry.build_actions(&case.actions)?)))
            .collect::<DialogResult<Vec<_>>>()?;
        let action = SwitchCondition::new(config.condition, cases, registry.build_actions(&config.default)?);
        configured!(kind, value, action)
    });
    registry.register_action("Microsoft.Foreach", |registry, value| {
        let kind = "Microsoft.Foreach";
        let config: ForeachConfig = parse_config(kind, value)?;
        let mut action = Foreach::new(config.items_property, registry.build_actions(&config.actions)?);
        if let Some(index) = config.index {
            action = action.with_index_property(index);
        }
        if let Some(item) = config.value {
            action = action.with_value_property(item);
        }
        configured!(kind, value, action)
    });
    registry.register_action("Microsoft.ForeachPage", |registry, value| {
        let kind = "Microsoft.ForeachPage";
        let config: ForeachPageConfig = parse_config(kind, value)?;
        let action = ForeachPage::new(config.items_property, config.page_size, registry.build_actions(&config.actions)?);
        configured!(kind, value, action)
    });
    registry.register_action("Microsoft.BreakLoop", |_, value| {
        configured!("Microsoft.BreakLoop", value, BreakLoop::new())
    });
    registry.register_action("Microsoft.ContinueLoop", |_, value| {
        configured!("Microsoft.ContinueLoop", value, ContinueLoop::new())
    });
    registry.register_action("Microsoft.GotoAction", |_, value| {
        let kind = "Microsoft.GotoAction";
        let config: GotoConfig = parse_config(kind, value)?;
        configured!(kind, value, GotoAction::new(config.action_id))
    });
    registry.register_action("Microsoft.EditActions", |registry, value| {
        let kind = "Microsoft.EditActions";
        let config: EditActionsConfig = parse_config(kind, value)?;
        let action = EditActions::new(config.change_type, registry.build_actions(&config.actions)?);
        configured!(kind, value, action)
    });
    registry.register_action("Microsoft.EndTurn", |_, value| {
        configured!("Microsoft.EndTurn", value, EndTurn::new())
    });
}

fn register_dialog_flow(registry: &mut ComponentRegistry) {
    registry.register_action(ADAPTIVE_DIALOG_KIND, |registry, value| {
        let dialog: Arc<dyn Action> = Arc::new(registry.build_adaptive(value)?);
        Ok(dialog)
    });
    registry.register_action("Microsoft.BeginDialog", |registry, value| {
        let kind = "Microsoft.BeginDialog";
        let config: BeginDialogConfig = parse_config(kind, value)?;
        let action = match &config.dialog {
            Some(Value::String(id)) => BeginDialog::new(id.as_str()),
            Some(dialog @ Value::Object(_)) => BeginDialog::with_dialog(registry.build_action(dialog)?),
            _ => BeginDialog::new(""),
        };
        let mut action = with_options(action, config.options, BeginDialog::with_option)
            .with_include_activity(config.include_activity);
        if let Some(property) = config.result_property {
            action = action.with_result_property(property);
        }
        configured!(kind, value, action)
    });
    registry.register_action("Microsoft.EndDialog", |_, value| {
        let kind = "Microsoft.EndDialog";
        let config: EndDialogConfig = parse_config(kind, value)?;
        configured!(kind, value, EndDialog::new(config.value))
    });
    registry.register_action("Microsoft.ReplaceDialog", |_, value| {
        let kind = "Microsoft.ReplaceDialog";
        let config: ReplaceDialogConfig = parse_config(kind, value)?;
        let action = with_options(ReplaceDialog::new(config.dialog), config.options, ReplaceDialog::with_option);
        configured!(kind, value, action)
    });
    registry.register_action("Microsoft.RepeatDialog", |_, value| {
        let kind = "Microsoft.RepeatDialog";
        let config: RepeatDialogConfig = parse_config(kind, value)?;
        let action = with_options(RepeatDialog::new(), config.options, RepeatDialog::with_option);
        configured!(kind, value, action)
    });
    registry.register_action("Microsoft.CancelAllDialogs", |_, value| {
        let kind = "Microsoft.CancelAllDialogs";
        let config: CancelAllConfig = parse_config(kind, value)?;
        let mut action = CancelAllDialogs::new();
        if let Some(name) = config.event_name {
            action = action.with_event(name, config.event_value);
        }
        configured!(kind, value, action)
    });
    registry.register_action("Microsoft.EmitEvent", |_, value| {
        let kind = "Microsoft.EmitEvent";
        let config: EmitEventConfig = parse_config(kind, value)?;
        let mut action = EmitEvent::new(config.event_name).with_bubble(config.bubble_event);
        if let Some(event_value) = config.event_value {
            action = action.with_value(event_value);
        }
        if let Some(property) = config.result_property {
            action = action.with_result_property(property);
        }
        configured!(kind, value, action)
    });
}

fn register_state(registry: &mut ComponentRegistry) {
    registry.register_action("Microsoft.SetProperty", |_, value| {
        let kind = "Microsoft.SetProperty";
        let config: SetPropertyConfig = parse_config(kind, value)?;
        configured!(kind, value, SetProperty::new(config.property, config.value))
    });
    registry.register_action("Microsoft.SetProperties", |_, value| {
        let kind = "Microsoft.SetProperties";
        let config: SetPropertiesConfig = parse_config(kind, value)?;
        configured!(kind, value, SetProperties::new(config.assignments))
    });
    registry.register_action("Microsoft.InitProperty", |_, value| {
        let kind = "Microsoft.InitProperty";
        let config: InitPropertyConfig = parse_config(kind, value)?;
        configured!(kind, value, InitProperty::new(config.property, config.property_type))
    });
    registry.register_action("Microsoft.DeleteProperty", |_, value| {
        let kind = "Microsoft.DeleteProperty";
        let config: DeletePropertyConfig = parse_config(kind, value)?;
        configured!(kind, value, DeleteProperty::new(config.property))
    });
    registry.register_action("Microsoft.DeleteProperties", |_, value| {
        let kind = "Microsoft.DeleteProperties";
        let config: DeletePropertiesConfig = parse_config(kind, value)?;
        configured!(kind, value, DeleteProperties::new(config.properties))
    });
    registry.register_action("Microsoft.EditArray", |_, value| {
        let kind = "Microsoft.EditArray";
        let config: EditArrayConfig = parse_config(kind, value)?;
        let mut action = EditArray::new(config.change_type, config.items_property);
        if let Some(item) = config.value {
            action = action.with_value(item);
        }
        if let Some(property) = config.result_property {
            action = action.with_result_property(property);
        }
        configured!(kind, value, action)
    });
}

fn register_output(registry: &mut ComponentRegistry) {
    registry.register_action("Microsoft.SendActivity", |_, value| {
        let kind = "Microsoft.SendActivity";
        let config: SendActivityConfig = parse_config(kind, value)?;
        configured!(kind, value, SendActivity::new(config.activity))
    });
    registry.register_action("Microsoft.LogAction", |_, value| {
        let kind = "Microsoft.LogAction";
        let config: LogConfig = parse_config(kind, value)?;
        let mut action = LogAction::new(config.text).with_trace_activity(config.trace_activity);
        if let Some(label) = config.label {
            action = action.with_label(label);
        }
        configured!(kind, value, action)
    });
    registry.register_action("Microsoft.TraceActivity", |_, value| {
        let kind = "Microsoft.TraceActivity";
        let config: TraceConfig = parse_config(kind, value)?;
        let mut action = TraceActivity::new(config.name);
        if let Some(trace_value) = config.value {
            action = action.with_value(trace_value, config.value_type);
        }
        if let Some(label) = config.label {
            action = action.with_label(label);
        }
        configured!(kind, value, action)
    });
    registry.register_action("Microsoft.SendList", |_, value| {
        let kind = "Microsoft.SendList";
        let config: SendListConfig = parse_config(kind, value)?;
        let mut action = SendList::new(config.items_property);
        if let Some(template) = config.message_template {
            action = action.with_message_template(template);
        }
        if let Some(template) = config.item_template {
            action = action.with_item_template(template);
        }
        configured!(kind, value, action)
    });
}

fn register_inputs(registry: &mut ComponentRegistry) {
    registry.register_action("Microsoft.TextInput", |_, value| {
        let kind = "Microsoft.TextInput";
        let core: InputDialogCore = parse_config(kind, value)?;
        let config: TextInputConfig = parse_config(kind, value)?;
        let recognizer = TextRecognizer {
            output_format: config.output_format,
        };
        configured!(kind, value, TextInput::with_recognizer(core, recognizer))
    });
    registry.register_action("Microsoft.NumberInput", |_, value| {
        let kind = "Microsoft.NumberInput";
        let core: InputDialogCore = parse_config(kind, value)?;
        configured!(kind, value, NumberInput::with_recognizer(core, Default::default()))
    });
    registry.register_action("Microsoft.ConfirmInput", |_, value| {
        let kind = "Microsoft.ConfirmInput";
        let core: InputDialogCore = parse_config(kind, value)?;
        configured!(kind, value, ConfirmInput::with_recognizer(core, Default::default()))
    });
    registry.register_action("Microsoft.ChoiceInput", |_, value| {
        let kind = "Microsoft.ChoiceInput";
        let core: InputDialogCore = parse_config(kind, value)?;
        let config: ChoiceInputConfig = parse_config(kind, value)?;
        let choices = config
            .choices
            .into_iter()
            .map(|choice| match choice {
                ChoiceConfig::Value(text) => Choice::new(text),
                ChoiceConfig::Full(choice) => choice,
            })
            .collect();
        let recognizer = ChoiceRecognizer {
            choices,
            output_format: config.output_format,
            style: config.style,
        };
        configured!(kind, value, ChoiceInput::with_recognizer(core, recognizer))
    });
}

fn build_trigger(registry: &ComponentRegistry, value: &Value, kind: &str, trigger: TriggerKind) -> DialogResult<OnCondition> {
    let config: TriggerConfig = parse_config(kind, value)?;
    let mut trigger = OnCondition::new(trigger, registry.build_actions(&config.actions)?).with_priority(config.priority);
    if let Some(condition) = config.condition {
        trigger = trigger.with_condition(condition);
    }
    Ok(trigger)
}

fn register_triggers(registry: &mut ComponentRegistry) {
    let simple = [
        ("Microsoft.OnBeginDialog", TriggerKind::BeginDialog),
        ("Microsoft.OnMessageActivity", TriggerKind::MessageActivity),
        ("Microsoft.OnUnknownIntent", TriggerKind::UnknownIntent),
        ("Microsoft.OnCancelDialog", TriggerKind::CancelDialog),
        ("Microsoft.OnError", TriggerKind::Error),
        ("Microsoft.OnEndOfActions", TriggerKind::EndOfActions),
    ];
    for (kind, trigger) in simple {
        registry.register_trigger(kind, move |registry, value| build_trigger(registry, value, kind, trigger.clone()));
    }

    registry.register_trigger("Microsoft.OnIntent", |registry, value| {
        let kind = "Microsoft.OnIntent";
        let config: IntentConfig = parse_config(kind, value)?;
        let trigger = TriggerKind::Intent {
            intent: config.intent,
            entities: config.entities,
        };
        build_trigger(registry, value, kind, trigger)
    });
    registry.register_trigger("Microsoft.OnActivity", |registry, value| {
        let kind = "Microsoft.OnActivity";
        let config: ActivityTriggerConfig = parse_config(kind, value)?;
        build_trigger(registry, value, kind, TriggerKind::Activity(config.activity_type))
    });
    for kind in ["Microsoft.OnDialogEvent", "Microsoft.OnCustomEvent"] {
        registry.register_trigger(kind, move |registry, value| {
            let config: EventTriggerConfig = parse_config(kind, value)?;
            build_trigger(registry, value, kind, TriggerKind::DialogEvent(config.event))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_common_fields_apply() {
        let registry = ComponentRegistry::with_builtins();
        let action = registry
            .build_action(&json!({
                "$kind": "Microsoft.SendActivity",
                "id": "greeting",
                "activity": "Hello",
                "disabled": "user.muted"
            }))
            .unwrap();
        assert_eq!(action.id(), "greeting");
        assert_eq!(action.disabled().map(|d| d.source()), Some("user.muted"));
    }

    #[test]
    fn test_missing_required_field_names_kind() {
        let registry = ComponentRegistry::with_builtins();
        let err = registry
            .build_action(&json!({"$kind": "Microsoft.SetProperty", "value": "1"}))
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("Microsoft.SetProperty:"));
    }

    #[test]
    fn test_inline_dialog_is_registered_as_dependency() {
        let registry = ComponentRegistry::with_builtins();
        let action = registry
            .build_action(&json!({
                "$kind": "Microsoft.BeginDialog",
                "dialog": {"$kind": "Microsoft.AdaptiveDialog", "id": "child"},
                "options": {"name": "user.name"}
            }))
            .unwrap();
        let dependencies = action.dependencies();
        assert_eq!(dependencies.len(), 1);
        assert_eq!(dependencies[0].id(), "child");
    }

    #[test]
    fn test_every_builtin_kind_is_registered() {
        let registry = ComponentRegistry::with_builtins();
        for kind in [
            "Microsoft.Sequence",
            "Microsoft.IfCondition",
            "Microsoft.SwitchCondition",
            "Microsoft.Foreach",
            "Microsoft.ForeachPage",
            "Microsoft.BreakLoop",
            "Microsoft.ContinueLoop",
            "Microsoft.GotoAction",
            "Microsoft.EditActions",
            "Microsoft.EndTurn",
            "Microsoft.BeginDialog",
            "Microsoft.EndDialog",
            "Microsoft.ReplaceDialog",
            "Microsoft.RepeatDialog",
            "Microsoft.CancelAllDialogs",
            "Microsoft.EmitEvent",
            "Microsoft.SetProperty",
            "Microsoft.SetProperties",
            "Microsoft.InitProperty",
            "Microsoft.DeleteProperty",
            "Microsoft.DeleteProperties",
            "Microsoft.EditArray",
            "Microsoft.SendActivity",
            "Microsoft.LogAction",
            "Microsoft.TraceActivity",
            "Microsoft.SendList",
            "Microsoft.TextInput",
            "Microsoft.NumberInput",
            "Microsoft.ConfirmInput",
            "Microsoft.ChoiceInput",
            "Microsoft.OnBeginDialog",
            "Microsoft.OnIntent",
            "Microsoft.OnUnknownIntent",
            "Microsoft.OnActivity",
            "Microsoft.OnMessageActivity",
            "Microsoft.OnDialogEvent",
            "Microsoft.OnCancelDialog",
            "Microsoft.OnError",
            "Microsoft.OnEndOfActions",
            "Microsoft.RegexRecognizer",
        ] {
            assert!(registry.has_kind(kind), "{kind} is not registered");
        }
    }

    #[test]
    fn test_choice_input_accepts_plain_strings() {
        let registry = ComponentRegistry::with_builtins();
        let input = registry
            .build_action(&json!({
                "$kind": "Microsoft.ChoiceInput",
                "property": "user.color",
                "prompt": "Pick a color",
                "choices": ["red", {"value": "green", "synonyms": ["lime"]}],
                "maxTurnCount": 3
            }))
            .unwrap();
        assert!(input.id().starts_with("ChoiceInput["));
    }
}
