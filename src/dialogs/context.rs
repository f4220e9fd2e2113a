//! Frame-indexed view over the dialog tree
//!
//! The tree is stored as nested stacks: frame 0 is the root stack, and frame
//! `n + 1` is the stack held by the first plan entry of the adaptive dialog on
//! top of frame `n`. A [`DialogContext`] addresses one frame by its depth and
//! recomputes the path from the root on every access, so parent and child
//! views are cheap reborrows rather than stored references.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::sequence::SequenceContext;
use super::turn::TurnContext;
use super::{Action, DialogSet};
use crate::errors::{DialogError, DialogResult, ExpressionError};
use crate::events::{names, DialogEvent};
use crate::expressions::{ExpressionEvaluator, ExpressionProperty};
use crate::memory::{self, turn_path, MemoryPath, MemoryScope};
use crate::value_objects::{DialogInstance, DialogReason, DialogState, DialogTurnResult};

pub(crate) fn stack_at(state: &DialogState, depth: usize) -> Option<&Vec<DialogInstance>> {
    let mut stack = &state.dialog_stack;
    for _ in 0..depth {
        stack = &stack.last()?.plan.as_ref()?.actions.first()?.dialog_stack;
    }
    Some(stack)
}

pub(crate) fn stack_at_mut(state: &mut DialogState, depth: usize) -> Option<&mut Vec<DialogInstance>> {
    let mut stack = &mut state.dialog_stack;
    for _ in 0..depth {
        stack = &mut stack.last_mut()?.plan.as_mut()?.actions.first_mut()?.dialog_stack;
    }
    Some(stack)
}

fn find_in(sets: &[Arc<DialogSet>], id: &str) -> Option<Arc<dyn Action>> {
    sets.iter().rev().find_map(|set| set.get(id))
}

/// Run `f` over an instance's state as a JSON object
fn with_state_value<R>(state: &mut Map<String, Value>, f: impl FnOnce(&mut Value) -> R) -> R {
    let mut root = Value::Object(std::mem::take(state));
    let result = f(&mut root);
    *state = match root {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    result
}

/// One frame of the active dialog tree
pub struct DialogContext<'a> {
    /// The turn being processed
    pub turn: &'a mut TurnContext,
    /// Dialog sets visible from this frame, outermost first
    sets: Vec<Arc<DialogSet>>,
}

impl<'a> DialogContext<'a> {
    /// Root context over `turn.dialog_state`
    pub fn new(turn: &'a mut TurnContext, dialogs: Arc<DialogSet>) -> Self {
        Self {
            turn,
            sets: vec![dialogs],
        }
    }

    fn at(&mut self, sets: Vec<Arc<DialogSet>>) -> DialogContext<'_> {
        DialogContext {
            turn: &mut *self.turn,
            sets,
        }
    }

    /// Nesting depth of this frame, 0 for the root stack
    pub fn depth(&self) -> usize {
        self.sets.len() - 1
    }

    /// Dialogs registered for this frame
    pub fn dialogs(&self) -> &Arc<DialogSet> {
        &self.sets[self.sets.len() - 1]
    }

    /// Find a dialog in this frame's set or an enclosing one
    pub fn find_dialog(&self, id: &str) -> Option<Arc<dyn Action>> {
        find_in(&self.sets, id)
    }

    fn require_dialog(&self, id: &str) -> DialogResult<Arc<dyn Action>> {
        self.find_dialog(id)
            .ok_or_else(|| DialogError::DialogNotFound(id.to_string()))
    }

    /// Stack of this frame; empty when the frame no longer exists
    pub fn stack(&self) -> &[DialogInstance] {
        stack_at(&self.turn.dialog_state, self.depth())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn stack_mut(&mut self) -> DialogResult<&mut Vec<DialogInstance>> {
        let depth = self.depth();
        stack_at_mut(&mut self.turn.dialog_state, depth)
            .ok_or_else(|| DialogError::InvalidState(format!("dialog frame {depth} does not exist")))
    }

    pub fn active_dialog(&self) -> Option<&DialogInstance> {
        self.stack().last()
    }

    pub fn active_dialog_mut(&mut self) -> DialogResult<&mut DialogInstance> {
        self.stack_mut()?
            .last_mut()
            .ok_or_else(|| DialogError::InvalidState("no active dialog".into()))
    }

    /// Activation identity of the dialog on top of this frame
    pub fn active_instance_id(&self) -> Option<Uuid> {
        self.active_dialog().map(|instance| instance.instance_id)
    }

    pub fn services(&self) -> &Arc<super::TurnServices> {
        &self.turn.services
    }

    pub fn expressions(&self) -> &dyn ExpressionEvaluator {
        self.turn.services.expressions.as_ref()
    }

    /// View of the enclosing frame
    pub fn parent(&mut self) -> Option<DialogContext<'_>> {
        if self.sets.len() < 2 {
            return None;
        }
        let sets = self.sets[..self.sets.len() - 1].to_vec();
        Some(self.at(sets))
    }

    /// View of an enclosing frame at `depth`
    pub(crate) fn ancestor(&mut self, depth: usize) -> DialogContext<'_> {
        let sets = self.sets[..=depth.min(self.depth())].to_vec();
        self.at(sets)
    }

    fn child_set(&self) -> Option<Arc<DialogSet>> {
        let top = self.active_dialog()?;
        top.plan.as_ref()?.actions.first()?;
        self.find_dialog(&top.id)?.child_dialogs()
    }

    /// View of the frame held by the active container's current plan entry
    pub fn child(&mut self) -> Option<DialogContext<'_>> {
        let set = self.child_set()?;
        let mut sets = self.sets.clone();
        sets.push(set);
        Some(self.at(sets))
    }

    /// Dialog sets down to the deepest frame with an active dialog
    fn leaf_sets(&self) -> Vec<Arc<DialogSet>> {
        let mut sets = self.sets.clone();
        let Some(mut stack) = stack_at(&self.turn.dialog_state, self.depth()) else {
            return sets;
        };
        while let Some(top) = stack.last() {
            let Some(next) = top.plan.as_ref().and_then(|plan| plan.actions.first()) else {
                break;
            };
            if next.dialog_stack.is_empty() {
                break;
            }
            let Some(set) = find_in(&sets, &top.id).and_then(|dialog| dialog.child_dialogs()) else {
                break;
            };
            sets.push(set);
            stack = &next.dialog_stack;
        }
        sets
    }

    /// View of the deepest frame with an active dialog
    pub fn leaf(&mut self) -> DialogContext<'_> {
        let sets = self.leaf_sets();
        self.at(sets)
    }

    /// Sequence context of the nearest enclosing adaptive dialog
    pub fn sequence(&mut self) -> Option<SequenceContext<'_>> {
        let mut depth = self.depth();
        loop {
            let has_plan = stack_at(&self.turn.dialog_state, depth)
                .and_then(|stack| stack.last())
                .is_some_and(|top| top.plan.is_some());
            if has_plan {
                return Some(SequenceContext::new(self.ancestor(depth)));
            }
            if depth == 0 {
                return None;
            }
            depth -= 1;
        }
    }

    /// True when any enclosing plan has changes waiting to be applied
    pub fn ancestors_have_changes(&self) -> bool {
        (0..self.depth()).any(|depth| {
            stack_at(&self.turn.dialog_state, depth)
                .and_then(|stack| stack.last())
                .and_then(|top| top.plan.as_ref())
                .is_some_and(|plan| !plan.changes.is_empty())
        })
    }

    // ---------------------------------------------------------------------
    // Memory

    /// Depth whose active instance backs the `dialog` scope
    fn dialog_scope_depth(&self) -> Option<usize> {
        let depth = self.depth();
        let top = self.active_dialog();
        let is_container = top
            .and_then(|instance| self.find_dialog(&instance.id))
            .is_some_and(|dialog| dialog.child_dialogs().is_some());
        if is_container {
            return Some(depth);
        }
        if depth > 0
            && stack_at(&self.turn.dialog_state, depth - 1).is_some_and(|stack| !stack.is_empty())
        {
            return Some(depth - 1);
        }
        top.map(|_| depth)
    }

    fn instance_state(&self, depth: Option<usize>) -> Value {
        depth
            .and_then(|d| stack_at(&self.turn.dialog_state, d))
            .and_then(|stack| stack.last())
            .map(|instance| Value::Object(instance.state.clone()))
            .unwrap_or_else(memory::empty_object)
    }

    fn scope_value(&self, scope: MemoryScope) -> Value {
        match scope {
            MemoryScope::Dialog => self.instance_state(self.dialog_scope_depth()),
            MemoryScope::This => self.instance_state(Some(self.depth())),
            MemoryScope::Class => self
                .active_dialog()
                .and_then(|instance| self.find_dialog(&instance.id))
                .map(|dialog| dialog.class_memory())
                .unwrap_or_else(memory::empty_object),
            other => self
                .turn
                .memory
                .scope(other)
                .cloned()
                .unwrap_or_else(memory::empty_object),
        }
    }

    /// Every scope as one JSON object, for expression evaluation
    pub fn memory_snapshot(&self) -> Value {
        let mut map = Map::new();
        for scope in MemoryScope::ALL {
            map.insert(scope.name().to_string(), self.scope_value(scope));
        }
        Value::Object(map)
    }

    fn parse_path(path: &str) -> DialogResult<MemoryPath> {
        MemoryPath::parse(path).map_err(|e| e.into_dialog_error(path))
    }

    pub fn get_value(&self, path: &str) -> DialogResult<Option<Value>> {
        let path = Self::parse_path(path)?;
        Ok(self.get_memory_path(&path))
    }

    pub fn get_memory_path(&self, path: &MemoryPath) -> Option<Value> {
        let root = self.scope_value(path.scope);
        let value = memory::get_path(&root, &path.segments)?;
        match value {
            Value::Array(items) if path.first_element => items.first().cloned(),
            Value::Null => None,
            other => Some(other.clone()),
        }
    }

    /// Read and deserialize a value, `None` when absent
    pub fn get_value_as<T: DeserializeOwned>(&self, path: &str) -> DialogResult<Option<T>> {
        match self.get_value(path)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn set_value(&mut self, path: &str, value: Value) -> DialogResult<()> {
        let path = Self::parse_path(path)?;
        self.set_memory_path(&path, value)
    }

    fn instance_for_scope(&mut self, scope: MemoryScope) -> DialogResult<&mut DialogInstance> {
        let depth = match scope {
            MemoryScope::Dialog => self.dialog_scope_depth(),
            _ => Some(self.depth()),
        };
        depth
            .and_then(|d| stack_at_mut(&mut self.turn.dialog_state, d))
            .and_then(|stack| stack.last_mut())
            .ok_or_else(|| DialogError::InvalidState(format!("no active dialog backs the '{scope}' scope")))
    }

    pub fn set_memory_path(&mut self, path: &MemoryPath, value: Value) -> DialogResult<()> {
        let on_error = |e: ExpressionError| e.into_dialog_error(&path.to_string());
        match path.scope {
            MemoryScope::Settings | MemoryScope::Class => Err(DialogError::InvalidState(format!(
                "memory scope '{}' is read-only",
                path.scope
            ))),
            MemoryScope::Dialog | MemoryScope::This => {
                if path.is_scope_root() && !value.is_object() {
                    return Err(DialogError::InvalidState(format!(
                        "memory scope '{}' can only be replaced by an object",
                        path.scope
                    )));
                }
                let instance = self.instance_for_scope(path.scope)?;
                with_state_value(&mut instance.state, |root| {
                    memory::set_path(root, &path.segments, value)
                })
                .map_err(on_error)
            }
            scope => {
                let root = self
                    .turn
                    .memory
                    .scope_mut(scope)
                    .ok_or_else(|| DialogError::InvalidState(format!("memory scope '{scope}' is unavailable")))?;
                memory::set_path(root, &path.segments, value).map_err(on_error)
            }
        }
    }

    pub fn remove_value(&mut self, path: &str) -> DialogResult<Option<Value>> {
        let path = Self::parse_path(path)?;
        match path.scope {
            MemoryScope::Settings | MemoryScope::Class => Err(DialogError::InvalidState(format!(
                "memory scope '{}' is read-only",
                path.scope
            ))),
            MemoryScope::Dialog | MemoryScope::This => {
                let instance = self.instance_for_scope(path.scope)?;
                Ok(with_state_value(&mut instance.state, |root| {
                    memory::remove_path(root, &path.segments)
                }))
            }
            scope => Ok(self
                .turn
                .memory
                .scope_mut(scope)
                .and_then(|root| memory::remove_path(root, &path.segments))),
        }
    }

    /// Evaluate an expression property against current memory
    pub fn evaluate(&self, expression: &ExpressionProperty) -> DialogResult<Value> {
        expression.evaluate(self.expressions(), &self.memory_snapshot())
    }

    pub fn evaluate_bool(&self, expression: &ExpressionProperty) -> DialogResult<bool> {
        expression.evaluate_bool(self.expressions(), &self.memory_snapshot())
    }

    pub fn evaluate_string(&self, expression: &ExpressionProperty) -> DialogResult<String> {
        expression.evaluate_string(self.expressions(), &self.memory_snapshot())
    }

    /// Guard check; evaluation failures leave the action enabled
    fn is_disabled(&self, dialog: &dyn Action) -> bool {
        let Some(guard) = dialog.disabled() else {
            return false;
        };
        match self.evaluate_bool(guard) {
            Ok(disabled) => disabled,
            Err(e) => {
                warn!(dialog_id = dialog.id(), error = %e, "disabled guard failed to evaluate, running action");
                false
            }
        }
    }

    // ---------------------------------------------------------------------
    // Stack operations

    /// Push a dialog onto this frame and begin it
    pub async fn begin_dialog(&mut self, dialog_id: &str, options: Option<Value>) -> DialogResult<DialogTurnResult> {
        let dialog = self.require_dialog(dialog_id)?;

        let max_depth = self.turn.services.config.max_stack_depth;
        if self.depth() + self.stack().len() >= max_depth {
            return Err(DialogError::InvalidState(format!(
                "dialog nesting exceeds {max_depth} frames while beginning '{dialog_id}'"
            )));
        }

        self.stack_mut()?.push(DialogInstance::new(dialog.id()));
        debug!(dialog_id, depth = self.depth(), "begin dialog");

        if self.is_disabled(dialog.as_ref()) {
            debug!(dialog_id, "dialog disabled, skipping");
            return self.end_dialog(None).await;
        }
        dialog.begin_dialog(self, options).await
    }

    /// Begin a child of the active dialog, which loops over its own children
    ///
    /// When the child finishes before returning, the result comes back as
    /// [`ChildEnded`](crate::value_objects::DialogTurnStatus::ChildEnded)
    /// instead of re-entering the active dialog's `resume_dialog`, so long
    /// sequences run in constant stack depth.
    pub async fn begin_child(&mut self, dialog_id: &str, options: Option<Value>) -> DialogResult<DialogTurnResult> {
        let Some(driver) = self.active_instance_id() else {
            return self.begin_dialog(dialog_id, options).await;
        };
        self.turn.push_driver(driver);
        let turn = self.begin_dialog(dialog_id, options).await;
        self.turn.pop_driver(driver);
        turn
    }

    /// Continue the dialog on top of this frame
    pub async fn continue_dialog(&mut self) -> DialogResult<DialogTurnResult> {
        let Some(id) = self.active_dialog().map(|instance| instance.id.clone()) else {
            return Ok(DialogTurnResult::empty());
        };
        let dialog = self.require_dialog(&id)?;
        dialog.continue_dialog(self).await
    }

    /// End the active dialog and resume the one below it
    pub async fn end_dialog(&mut self, result: Option<Value>) -> DialogResult<DialogTurnResult> {
        self.end_active_dialog(DialogReason::EndCalled).await?;
        if let Some(value) = &result {
            self.set_value(turn_path::LAST_RESULT, value.clone())?;
        }

        let Some((id, instance_id)) = self
            .active_dialog()
            .map(|instance| (instance.id.clone(), instance.instance_id))
        else {
            return Ok(DialogTurnResult::complete(result));
        };
        if self.turn.is_driving(instance_id) {
            return Ok(DialogTurnResult::child_ended(result));
        }
        let dialog = self.require_dialog(&id)?;
        dialog.resume_dialog(self, DialogReason::EndCalled, result).await
    }

    /// End the active dialog and begin another in its place
    pub async fn replace_dialog(&mut self, dialog_id: &str, options: Option<Value>) -> DialogResult<DialogTurnResult> {
        self.end_active_dialog(DialogReason::ReplaceCalled).await?;
        self.begin_dialog(dialog_id, options).await
    }

    /// Unwind this frame, and optionally its ancestors, innermost first
    ///
    /// After the first dialog is removed, `event_name` (default
    /// `cancelDialog`) is emitted without bubbling to each newly active
    /// dialog; the first one that handles it stops the unwind.
    pub async fn cancel_all_dialogs(
        &mut self,
        cancel_parents: bool,
        event_name: Option<&str>,
        event_value: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        if self.stack().is_empty() && self.depth() == 0 {
            return Ok(DialogTurnResult::empty());
        }
        let event_name = event_name.unwrap_or(names::CANCEL_DIALOG).to_string();

        let mut depth = self.depth();
        let mut notify = false;
        loop {
            let mut dc = self.ancestor(depth);
            if !dc.stack().is_empty() {
                if notify
                    && dc
                        .emit_event(&event_name, event_value.clone(), false, false)
                        .await?
                {
                    info!(event = %event_name, depth, "cancellation intercepted");
                    break;
                }
                dc.end_active_dialog(DialogReason::CancelCalled).await?;
            } else if cancel_parents && depth > 0 {
                depth -= 1;
            } else {
                break;
            }
            notify = true;
        }
        Ok(DialogTurnResult::cancelled())
    }

    /// Remove the active dialog, cancelling its descendants first when cancelled
    pub(crate) async fn end_active_dialog(&mut self, reason: DialogReason) -> DialogResult<()> {
        if reason == DialogReason::CancelCalled {
            self.cancel_descendants().await?;
        }
        self.pop_active_dialog(reason).await
    }

    async fn cancel_descendants(&mut self) -> DialogResult<()> {
        loop {
            let sets = self.leaf_sets();
            if sets.len() == self.sets.len() {
                return Ok(());
            }
            let mut leaf = self.at(sets);
            leaf.pop_active_dialog(DialogReason::CancelCalled).await?;
        }
    }

    async fn pop_active_dialog(&mut self, reason: DialogReason) -> DialogResult<()> {
        let Some(instance) = self.stack_mut()?.pop() else {
            return Ok(());
        };
        debug!(dialog_id = %instance.id, depth = self.depth(), ?reason, "end dialog");
        if let Some(dialog) = self.find_dialog(&instance.id) {
            dialog.end_dialog(self, &instance, reason).await?;
        }
        Ok(())
    }

    /// Route an event starting at this frame, or at the deepest frame
    pub async fn emit_event(
        &mut self,
        name: &str,
        value: Option<Value>,
        bubble: bool,
        from_leaf: bool,
    ) -> DialogResult<bool> {
        let event = DialogEvent::new(name, value, bubble);
        let sets = if from_leaf {
            self.leaf_sets()
        } else {
            self.sets.clone()
        };
        let mut dc = self.at(sets);
        let Some(id) = dc.active_dialog().map(|instance| instance.id.clone()) else {
            return Ok(false);
        };
        let Some(dialog) = dc.find_dialog(&id) else {
            return Ok(false);
        };
        debug!(event = name, dialog_id = %id, depth = dc.depth(), "emit event");
        dialog.on_dialog_event(&mut dc, &event).await
    }
}
