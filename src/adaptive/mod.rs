//! Adaptive dialogs
//!
//! An [`AdaptiveDialog`] owns a plan: an ordered list of pending actions
//! plus queued changes to that list. Events reaching the dialog are matched
//! against its triggers, and a firing trigger splices its actions into the
//! plan. Each turn the dialog applies queued changes and then runs the head
//! of the plan in the child frame until something waits for input.

pub mod selectors;
pub mod triggers;

pub use selectors::{FirstSelector, MostSpecificSelector, TriggerSelector};
pub use triggers::{OnCondition, TriggerKind};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::actions::scope::control_signal;
use crate::dialogs::{Action, DialogContext, DialogSet};
use crate::errors::{ControlFlowError, DialogError, DialogResult};
use crate::events::{names, DialogEvent};
use crate::memory::{dialog_path, turn_path};
use crate::recognizers::{Recognizer, RecognizerResult, NONE_INTENT};
use crate::value_objects::{
    ActionScopeCommand, DialogInstance, DialogReason, DialogTurnResult, DialogTurnStatus, SequenceState,
};

/// Event-driven dialog that runs a mutable plan of actions
pub struct AdaptiveDialog {
    id: String,
    triggers: Vec<OnCondition>,
    recognizer: Option<Arc<dyn Recognizer>>,
    selector: Arc<dyn TriggerSelector>,
    auto_end_dialog: bool,
    default_result_property: String,
    dialogs: Arc<DialogSet>,
}

impl AdaptiveDialog {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            triggers: Vec::new(),
            recognizer: None,
            selector: Arc::new(MostSpecificSelector),
            auto_end_dialog: true,
            default_result_property: dialog_path::RESULT.to_string(),
            dialogs: Arc::new(DialogSet::new()),
        }
    }

    pub fn with_trigger(mut self, trigger: OnCondition) -> Self {
        Arc::make_mut(&mut self.dialogs).add(trigger.scope());
        self.triggers.push(trigger);
        self
    }

    pub fn with_triggers(self, triggers: impl IntoIterator<Item = OnCondition>) -> Self {
        triggers.into_iter().fold(self, Self::with_trigger)
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn TriggerSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// End automatically once the plan drains; otherwise wait for input
    pub fn with_auto_end_dialog(mut self, auto_end: bool) -> Self {
        self.auto_end_dialog = auto_end;
        self
    }

    /// Property whose value becomes the dialog result on auto-end
    pub fn with_default_result_property(mut self, property: impl Into<String>) -> Self {
        self.default_result_property = property.into();
        self
    }

    /// Register a dialog that actions can begin by id
    pub fn with_dialog(mut self, dialog: Arc<dyn Action>) -> Self {
        Arc::make_mut(&mut self.dialogs).add(dialog);
        self
    }

    pub fn triggers(&self) -> &[OnCondition] {
        &self.triggers
    }

    pub fn selector_name(&self) -> &str {
        self.selector.name()
    }

    fn plan_is_empty(dc: &DialogContext<'_>) -> bool {
        dc.active_dialog()
            .and_then(|instance| instance.plan.as_ref())
            .is_none_or(|plan| plan.actions.is_empty())
    }

    /// Queue the first trigger that matches `event`
    fn queue_first_match(&self, dc: &mut DialogContext<'_>, event: &DialogEvent) -> DialogResult<bool> {
        let candidates: Vec<&OnCondition> = self
            .triggers
            .iter()
            .filter(|trigger| event.is(trigger.event_name()))
            .collect();
        if candidates.is_empty() {
            return Ok(false);
        }

        for trigger in self.selector.order(candidates) {
            match trigger.matches(dc, event) {
                Ok(true) => {
                    debug!(dialog_id = %self.id, event = %event.name, scope = trigger.scope().id(), "trigger fired");
                    let mut sequence = dc
                        .sequence()
                        .ok_or_else(|| DialogError::InvalidState(format!("adaptive dialog '{}' has no plan", self.id)))?;
                    sequence.queue_changes(trigger.change_list())?;
                    return Ok(true);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(dialog_id = %self.id, event = %event.name, error = %e, "trigger condition failed, skipping");
                }
            }
        }
        Ok(false)
    }

    /// Run the recognizer and publish its result under `turn.recognized`
    async fn recognize(&self, dc: &mut DialogContext<'_>) -> DialogResult<Value> {
        let result = match self.recognizer.clone() {
            Some(recognizer) => recognizer.recognize(&dc.turn.activity).await?,
            None => RecognizerResult::none(dc.turn.activity.text_or_empty()),
        };
        let (intent, score) = result
            .top_intent()
            .map(|(intent, score)| (intent.to_string(), score))
            .unwrap_or_else(|| (NONE_INTENT.to_string(), 0.0));
        debug!(dialog_id = %self.id, %intent, score, "utterance recognized");

        let mut recognized = serde_json::to_value(&result)?;
        if let Value::Object(map) = &mut recognized {
            map.insert("intent".into(), Value::String(intent));
            map.insert("score".into(), Value::from(score));
        }
        dc.set_value(turn_path::RECOGNIZED, recognized.clone())?;
        Ok(recognized)
    }

    async fn on_activity_received(&self, dc: &mut DialogContext<'_>, event: &DialogEvent) -> DialogResult<bool> {
        let handled = if dc.turn.activity.is_message() {
            let recognized = self.recognize(dc).await?;
            let intent_event = DialogEvent::new(names::RECOGNIZED_INTENT, Some(recognized), false);
            self.queue_first_match(dc, &intent_event)? || self.queue_first_match(dc, event)?
        } else {
            self.queue_first_match(dc, event)?
        };
        if handled {
            dc.set_value(turn_path::INTERRUPTED, Value::Bool(true))?;
            dc.set_value(turn_path::ACTIVITY_PROCESSED, Value::Bool(true))?;
        }
        Ok(handled)
    }

    fn on_unhandled_activity(&self, dc: &mut DialogContext<'_>) -> DialogResult<bool> {
        if !dc.turn.activity.is_message() || !Self::plan_is_empty(dc) {
            return Ok(false);
        }
        let unknown = DialogEvent::new(names::UNKNOWN_INTENT, None, false);
        let handled = self.queue_first_match(dc, &unknown)?;
        if handled {
            dc.set_value(turn_path::INTERRUPTED, Value::Bool(true))?;
            dc.set_value(turn_path::ACTIVITY_PROCESSED, Value::Bool(true))?;
        }
        Ok(handled)
    }

    /// The activity is routed at begin only while nothing else consumed it
    fn activity_pending(dc: &DialogContext<'_>) -> DialogResult<bool> {
        let processed = dc.get_value(turn_path::ACTIVITY_PROCESSED)?;
        Ok(!processed.as_ref().is_some_and(crate::memory::is_truthy))
    }

    async fn on_begin_event(&self, dc: &mut DialogContext<'_>, event: &DialogEvent) -> DialogResult<bool> {
        if self.queue_first_match(dc, event)? {
            return Ok(true);
        }
        if !Self::activity_pending(dc)? {
            return Ok(false);
        }
        let activity = serde_json::to_value(&dc.turn.activity)?;
        let leading = DialogEvent::new(names::ACTIVITY_RECEIVED, Some(activity), false);
        dc.set_value(turn_path::DIALOG_EVENT, serde_json::to_value(&leading)?)?;
        if self.on_activity_received(dc, &leading).await? {
            return Ok(true);
        }
        self.on_unhandled_activity(dc)
    }

    /// Run the plan until it waits, yields, completes or drains
    async fn continue_actions(&self, dc: &mut DialogContext<'_>) -> DialogResult<DialogTurnResult> {
        let mut end_of_actions_routed = false;
        loop {
            if let Some(mut sequence) = dc.sequence() {
                sequence.apply_changes()?;
            }

            if Self::plan_is_empty(dc) {
                if !end_of_actions_routed {
                    end_of_actions_routed = true;
                    let event = DialogEvent::new(names::END_OF_ACTIONS, None, false);
                    dc.set_value(turn_path::DIALOG_EVENT, serde_json::to_value(&event)?)?;
                    if self.queue_first_match(dc, &event)? {
                        continue;
                    }
                }
                if self.auto_end_dialog {
                    let result = dc.get_value(&self.default_result_property)?;
                    info!(dialog_id = %self.id, "plan drained, ending dialog");
                    return dc.end_dialog(result).await;
                }
                return Ok(DialogTurnResult::waiting());
            }

            let instance_id = dc.active_instance_id();
            let step = self.run_head(dc).await;
            if dc.active_instance_id() != instance_id {
                return step;
            }
            let turn = match step {
                Ok(turn) => turn,
                Err(e) => {
                    if let Some(mut sequence) = dc.sequence() {
                        sequence.end_current_action()?;
                    }
                    return Err(e);
                }
            };

            match turn.status {
                DialogTurnStatus::Waiting => return Ok(turn),
                DialogTurnStatus::Yielded => {
                    let has_changes = dc.sequence().is_some_and(|sequence| sequence.has_changes());
                    if has_changes {
                        continue;
                    }
                    return Ok(turn);
                }
                _ => {}
            }

            if let Some(mut sequence) = dc.sequence() {
                sequence.end_current_action()?;
            }
            if let Some(signal) = control_signal(turn.result.as_ref())? {
                let error = match signal.command {
                    ActionScopeCommand::GotoAction => {
                        ControlFlowError::GotoTargetNotFound(signal.action_id.unwrap_or_default())
                    }
                    ActionScopeCommand::BreakLoop => ControlFlowError::BreakOutsideLoop,
                    ActionScopeCommand::ContinueLoop => ControlFlowError::ContinueOutsideLoop,
                };
                return Err(error.into());
            }
            if dc.ancestors_have_changes() {
                return Ok(DialogTurnResult::yielded());
            }
        }
    }

    /// Continue the head action, beginning it when its frame is empty
    async fn run_head(&self, dc: &mut DialogContext<'_>) -> DialogResult<DialogTurnResult> {
        let (dialog_id, options) = dc
            .active_dialog()
            .and_then(|instance| instance.plan.as_ref())
            .and_then(|plan| plan.actions.first())
            .map(|head| (head.dialog_id.clone(), head.options.clone()))
            .ok_or_else(|| DialogError::InvalidState(format!("adaptive dialog '{}' has an empty plan", self.id)))?;
        let mut child = dc
            .child()
            .ok_or_else(|| DialogError::InvalidState(format!("adaptive dialog '{}' has no child frame", self.id)))?;

        let turn = child.continue_dialog().await?;
        if turn.status != DialogTurnStatus::Empty {
            return Ok(turn);
        }
        debug!(dialog_id = %self.id, action = %dialog_id, "beginning plan step");
        child.begin_dialog(&dialog_id, options).await
    }
}

#[async_trait]
impl Action for AdaptiveDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(&self, dc: &mut DialogContext<'_>, options: Option<Value>) -> DialogResult<DialogTurnResult> {
        dc.active_dialog_mut()?.plan = Some(SequenceState::default());
        if let Some(options) = &options {
            dc.set_value(dialog_path::OPTIONS, options.clone())?;
        }
        info!(dialog_id = %self.id, triggers = self.triggers.len(), "adaptive dialog started");

        let event = DialogEvent::new(names::BEGIN_DIALOG, options, false);
        self.on_dialog_event(dc, &event).await?;
        self.continue_actions(dc).await
    }

    async fn continue_dialog(&self, dc: &mut DialogContext<'_>) -> DialogResult<DialogTurnResult> {
        self.continue_actions(dc).await
    }

    async fn resume_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        _result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        self.continue_actions(dc).await
    }

    async fn end_dialog(
        &self,
        _dc: &mut DialogContext<'_>,
        instance: &DialogInstance,
        reason: DialogReason,
    ) -> DialogResult<()> {
        let pending = instance.plan.as_ref().map_or(0, |plan| plan.actions.len());
        info!(dialog_id = %self.id, ?reason, pending, "adaptive dialog ended");
        Ok(())
    }

    async fn on_pre_bubble_event(&self, dc: &mut DialogContext<'_>, event: &DialogEvent) -> DialogResult<bool> {
        match event.name.as_str() {
            names::BEGIN_DIALOG => self.on_begin_event(dc, event).await,
            names::ACTIVITY_RECEIVED => self.on_activity_received(dc, event).await,
            names::RECOGNIZE_UTTERANCE => {
                if dc.turn.activity.is_message() {
                    self.recognize(dc).await?;
                }
                Ok(false)
            }
            _ => self.queue_first_match(dc, event),
        }
    }

    async fn on_post_bubble_event(&self, dc: &mut DialogContext<'_>, event: &DialogEvent) -> DialogResult<bool> {
        if event.is(names::ACTIVITY_RECEIVED) {
            return self.on_unhandled_activity(dc);
        }
        Ok(false)
    }

    fn child_dialogs(&self) -> Option<Arc<DialogSet>> {
        Some(self.dialogs.clone())
    }
}
