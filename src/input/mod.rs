//! Input dialogs
//!
//! An input prompts for a value, waits for the reply, recognizes it with a
//! kind-specific [`InputRecognizer`], runs validations, and re-prompts until
//! it has a valid value or runs out of turns. State lives in the `this`
//! scope (`this.options`, `this.value`, `this.turnCount`) so a suspended
//! input survives persistence.
//!
//! While an input waits, each new message first gets a chance to interrupt:
//! the enclosing adaptive dialog recognizes the utterance, and the input
//! claims the message unless `allowInterruptions` holds.

pub mod choice;
pub mod confirm;
pub mod number;
pub mod text;

pub use choice::{Choice, ChoiceInput, ChoiceOutputFormat, ChoiceRecognizer, ListStyle};
pub use confirm::{ConfirmInput, ConfirmRecognizer};
pub use number::{NumberInput, NumberRecognizer};
pub use text::{TextInput, TextOutputFormat, TextRecognizer};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::actions::ActionBase;
use crate::dialogs::{Action, DialogContext};
use crate::errors::DialogResult;
use crate::events::{names, DialogEvent};
use crate::expressions::ExpressionProperty;
use crate::generators::ActivityTemplate;
use crate::memory::{is_truthy, this_path, turn_path};
use crate::value_objects::{Activity, DialogReason, DialogTurnResult, InputHint};

/// Outcome of interpreting the candidate value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    /// Nothing to interpret yet
    Missing,
    /// The recognizer could not make sense of the reply
    Unrecognized,
    /// Recognized, but a validation failed
    Invalid,
    Valid,
}

/// Kind-specific interpretation of a reply
pub trait InputRecognizer: Send + Sync {
    /// Kind name used for derived ids and logs
    fn kind(&self) -> &'static str;

    /// Recognized value, or `None` when the reply makes no sense for this kind
    fn recognize(&self, input: &Value, locale: &str) -> Option<Value>;

    /// Adjust the outgoing prompt, e.g. to list choices
    fn decorate_prompt(&self, _activity: &mut Activity) {}
}

/// Settings shared by every input kind
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct InputDialogCore {
    /// Memory path receiving the value
    pub property: Option<String>,
    /// Initial value; skips the prompt when it is valid
    pub value: Option<ExpressionProperty>,
    /// Clear `property` and prompt even when it already holds a value
    pub always_prompt: bool,
    /// Whether the enclosing dialog may handle replies first
    pub allow_interruptions: Option<ExpressionProperty>,
    pub prompt: Option<ActivityTemplate>,
    pub unrecognized_prompt: Option<ActivityTemplate>,
    pub invalid_prompt: Option<ActivityTemplate>,
    /// Sent when the default value is used after the last turn
    pub default_value_response: Option<ActivityTemplate>,
    /// Every expression must hold for a recognized value to be valid
    pub validations: Vec<ExpressionProperty>,
    /// Number of prompts before giving up; unlimited when absent
    pub max_turn_count: Option<u32>,
    pub default_value: Option<ExpressionProperty>,
}

/// A prompt-and-wait dialog for one input kind
pub struct InputDialog<R> {
    base: ActionBase,
    core: InputDialogCore,
    recognizer: R,
}

impl<R: InputRecognizer> InputDialog<R> {
    pub fn with_recognizer(core: InputDialogCore, recognizer: R) -> Self {
        let label = core.property.clone().unwrap_or_default();
        let mut base = ActionBase::new(recognizer.kind(), &label);
        if let Some(prompt) = &core.prompt {
            base.relabel(recognizer.kind(), &format!("{label}:{}", prompt.text));
        }
        Self { base, core, recognizer }
    }

    pub fn core(&self) -> &InputDialogCore {
        &self.core
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.base.set_id(id);
        self
    }

    pub fn with_disabled(mut self, condition: impl Into<ExpressionProperty>) -> Self {
        self.base.set_disabled(condition.into());
        self
    }

    pub fn configure_base(mut self, id: Option<String>, disabled: Option<ExpressionProperty>) -> Self {
        self.base = self.base.configure(id, disabled);
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<ActivityTemplate>) -> Self {
        self.core.prompt = Some(prompt.into());
        self
    }

    pub fn with_unrecognized_prompt(mut self, prompt: impl Into<ActivityTemplate>) -> Self {
        self.core.unrecognized_prompt = Some(prompt.into());
        self
    }

    pub fn with_invalid_prompt(mut self, prompt: impl Into<ActivityTemplate>) -> Self {
        self.core.invalid_prompt = Some(prompt.into());
        self
    }

    pub fn with_validation(mut self, validation: impl Into<ExpressionProperty>) -> Self {
        self.core.validations.push(validation.into());
        self
    }

    pub fn with_max_turn_count(mut self, max: u32) -> Self {
        self.core.max_turn_count = Some(max);
        self
    }

    pub fn with_default_value(mut self, value: impl Into<ExpressionProperty>, response: Option<ActivityTemplate>) -> Self {
        self.core.default_value = Some(value.into());
        self.core.default_value_response = response;
        self
    }

    pub fn with_value(mut self, value: impl Into<ExpressionProperty>) -> Self {
        self.core.value = Some(value.into());
        self
    }

    pub fn with_always_prompt(mut self, always: bool) -> Self {
        self.core.always_prompt = always;
        self
    }

    pub fn with_allow_interruptions(mut self, allow: impl Into<ExpressionProperty>) -> Self {
        self.core.allow_interruptions = Some(allow.into());
        self
    }

    fn turn_count(dc: &DialogContext<'_>) -> DialogResult<u32> {
        Ok(dc.get_value_as::<u32>(this_path::TURN_COUNT)?.unwrap_or_default())
    }

    /// Gather the candidate value, recognize it and run validations
    fn recognize_input(&self, dc: &mut DialogContext<'_>, turn_count: u32) -> DialogResult<InputState> {
        let mut input = None;
        if turn_count == 0 {
            input = match &self.core.value {
                Some(value) => Some(dc.evaluate(value)?).filter(|v| !v.is_null()),
                None => match &self.core.property {
                    Some(property) => dc.get_value(property)?,
                    None => None,
                },
            };
        }

        let processed = dc
            .get_value(turn_path::ACTIVITY_PROCESSED)?
            .is_some_and(|value| is_truthy(&value));
        if input.is_none() && turn_count > 0 && !processed && dc.turn.activity.is_message() {
            input = dc
                .turn
                .activity
                .text
                .clone()
                .map(Value::String)
                .or_else(|| dc.turn.activity.value.clone());
            dc.set_value(turn_path::ACTIVITY_PROCESSED, Value::Bool(true))?;
        }

        let Some(input) = input else {
            return Ok(InputState::Missing);
        };
        let locale = dc.turn.locale();
        let Some(recognized) = self.recognizer.recognize(&input, &locale) else {
            debug!(input_id = %self.base.id(), "reply not recognized");
            return Ok(InputState::Unrecognized);
        };
        dc.set_value(this_path::VALUE, recognized)?;

        for validation in &self.core.validations {
            if !dc.evaluate_bool(validation)? {
                debug!(input_id = %self.base.id(), validation = validation.source(), "validation failed");
                return Ok(InputState::Invalid);
            }
        }
        Ok(InputState::Valid)
    }

    fn prompt_template(&self, state: InputState) -> Option<&ActivityTemplate> {
        let core = &self.core;
        match state {
            InputState::Unrecognized => core
                .unrecognized_prompt
                .as_ref()
                .or(core.invalid_prompt.as_ref())
                .or(core.prompt.as_ref()),
            InputState::Invalid => core
                .invalid_prompt
                .as_ref()
                .or(core.unrecognized_prompt.as_ref())
                .or(core.prompt.as_ref()),
            InputState::Missing | InputState::Valid => core.prompt.as_ref(),
        }
    }

    async fn prompt_user(&self, dc: &mut DialogContext<'_>, state: InputState) -> DialogResult<DialogTurnResult> {
        if let Some(template) = self.prompt_template(state) {
            let mut activity = template.bind(dc).await?;
            activity.input_hint = Some(InputHint::ExpectingInput);
            self.recognizer.decorate_prompt(&mut activity);
            dc.turn.send_activity(activity);
        }
        Ok(DialogTurnResult::waiting())
    }

    async fn complete(&self, dc: &mut DialogContext<'_>, value: Option<Value>) -> DialogResult<DialogTurnResult> {
        if let (Some(property), Some(value)) = (&self.core.property, &value) {
            dc.set_value(property, value.clone())?;
        }
        dc.end_dialog(value).await
    }
}

#[async_trait]
impl<R: InputRecognizer> Action for InputDialog<R> {
    fn id(&self) -> &str {
        self.base.id()
    }

    fn assign_id(&self, id: String) -> bool {
        self.base.assign_id(id)
    }

    fn disabled(&self) -> Option<&ExpressionProperty> {
        self.base.disabled.as_ref()
    }

    async fn begin_dialog(&self, dc: &mut DialogContext<'_>, options: Option<Value>) -> DialogResult<DialogTurnResult> {
        if let Some(options) = options {
            dc.set_value(this_path::OPTIONS, options)?;
        }
        dc.set_value(this_path::TURN_COUNT, Value::from(0))?;
        if self.core.always_prompt {
            if let Some(property) = &self.core.property {
                dc.remove_value(property)?;
            }
        }

        let state = if self.core.always_prompt {
            InputState::Missing
        } else {
            self.recognize_input(dc, 0)?
        };
        if state == InputState::Valid {
            let value = dc.get_value(this_path::VALUE)?;
            return self.complete(dc, value).await;
        }

        dc.set_value(this_path::TURN_COUNT, Value::from(1))?;
        self.prompt_user(dc, state).await
    }

    async fn continue_dialog(&self, dc: &mut DialogContext<'_>) -> DialogResult<DialogTurnResult> {
        if !dc.turn.activity.is_message() {
            return Ok(DialogTurnResult::waiting());
        }

        let interrupted = dc
            .get_value(turn_path::INTERRUPTED)?
            .is_some_and(|value| is_truthy(&value));
        let turn_count = Self::turn_count(dc)?;
        let state = self.recognize_input(dc, if interrupted { 0 } else { turn_count })?;
        if state == InputState::Valid {
            let value = dc.get_value(this_path::VALUE)?;
            return self.complete(dc, value).await;
        }

        if self.core.max_turn_count.is_none_or(|max| turn_count < max) {
            if !interrupted {
                dc.set_value(this_path::TURN_COUNT, Value::from(turn_count + 1))?;
            }
            return self.prompt_user(dc, state).await;
        }

        debug!(input_id = %self.base.id(), turn_count, "max turn count reached");
        let Some(default_value) = &self.core.default_value else {
            return dc.end_dialog(None).await;
        };
        let value = dc.evaluate(default_value)?;
        if let Some(response) = &self.core.default_value_response {
            let activity = response.bind(dc).await?;
            dc.turn.send_activity(activity);
        }
        self.complete(dc, Some(value)).await
    }

    async fn resume_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        _result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        self.prompt_user(dc, InputState::Missing).await
    }

    async fn on_pre_bubble_event(&self, dc: &mut DialogContext<'_>, event: &DialogEvent) -> DialogResult<bool> {
        if !event.is(names::ACTIVITY_RECEIVED) || !dc.turn.activity.is_message() {
            return Ok(false);
        }
        let activity = serde_json::to_value(&dc.turn.activity)?;
        if let Some(mut parent) = dc.parent() {
            parent
                .emit_event(names::RECOGNIZE_UTTERANCE, Some(activity), false, false)
                .await?;
        }

        let Some(guard) = &self.core.allow_interruptions else {
            return Ok(false);
        };
        match dc.evaluate(guard) {
            Ok(value) => Ok(!is_truthy(&value)),
            Err(e) => {
                warn!(input_id = %self.base.id(), error = %e, "allowInterruptions failed to evaluate, claiming reply");
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogs::{DialogSet, TurnContext, TurnServices};
    use crate::value_objects::DialogTurnStatus;
    use serde_json::json;
    use std::sync::Arc;

    fn input() -> TextInput {
        TextInput::new("user.name")
            .with_prompt("What is your name?")
            .with_invalid_prompt("Too short, try again.")
            .with_validation("length(this.value) > 2")
            .with_max_turn_count(2)
            .with_default_value("'anonymous'", Some(ActivityTemplate::new("I'll call you anonymous.")))
    }

    fn texts(turn: &TurnContext) -> Vec<String> {
        turn.responses()
            .iter()
            .map(|activity| activity.text_or_empty().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_prompts_validates_and_falls_back_to_default() {
        let input = Arc::new(input());
        let mut set = DialogSet::new();
        set.add(input.clone());
        let set = Arc::new(set);
        let services = Arc::new(TurnServices::default());

        let mut turn = TurnContext::new(Activity::message("hi"), services.clone());
        let mut dc = DialogContext::new(&mut turn, set.clone());
        let result = dc.begin_dialog(input.id(), None).await.unwrap();
        assert_eq!(result.status, DialogTurnStatus::Waiting);
        assert_eq!(texts(&turn), vec!["What is your name?"]);
        assert_eq!(turn.dialog_state.dialog_stack[0].state["turnCount"], json!(1));

        let state = turn.dialog_state.clone();
        let mut turn = TurnContext::new(Activity::message("Al"), services.clone());
        turn.dialog_state = state;
        let mut dc = DialogContext::new(&mut turn, set.clone());
        let result = dc.continue_dialog().await.unwrap();
        assert_eq!(result.status, DialogTurnStatus::Waiting);
        assert_eq!(texts(&turn), vec!["Too short, try again."]);
        assert_eq!(turn.dialog_state.dialog_stack[0].state["turnCount"], json!(2));

        let state = turn.dialog_state.clone();
        let mut turn = TurnContext::new(Activity::message("Bo"), services);
        turn.dialog_state = state;
        let mut dc = DialogContext::new(&mut turn, set);
        let result = dc.continue_dialog().await.unwrap();
        assert_eq!(result.status, DialogTurnStatus::Complete);
        assert_eq!(result.result, Some(json!("anonymous")));
        assert_eq!(texts(&turn), vec!["I'll call you anonymous."]);
        assert_eq!(turn.memory.user["name"], json!("anonymous"));
    }

    #[tokio::test]
    async fn test_existing_value_skips_prompt() {
        let input = Arc::new(input());
        let mut set = DialogSet::new();
        set.add(input.clone());

        let mut turn = TurnContext::new(Activity::message("hi"), Arc::new(TurnServices::default()));
        turn.memory.user = json!({"name": "Grace"});
        let mut dc = DialogContext::new(&mut turn, Arc::new(set));
        let result = dc.begin_dialog(input.id(), None).await.unwrap();
        assert_eq!(result.status, DialogTurnStatus::Complete);
        assert_eq!(result.result, Some(json!("Grace")));
        assert!(turn.responses().is_empty());
    }

    #[test]
    fn test_prompt_selection() {
        let input = input();
        assert_eq!(input.prompt_template(InputState::Missing).unwrap().text, "What is your name?");
        assert_eq!(input.prompt_template(InputState::Invalid).unwrap().text, "Too short, try again.");
        assert_eq!(input.prompt_template(InputState::Unrecognized).unwrap().text, "Too short, try again.");
    }
}
