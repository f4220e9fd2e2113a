//! Ordered child execution with break/continue/goto handling
//!
//! A scope begins its children one at a time on its own frame. Children that
//! finish synchronously hand their result straight back to the scope's loop;
//! children that suspend come back later through `resume_dialog`. Either way
//! control signals are interpreted: a goto is resolved against the scope's
//! children (descending into conditional branches), and break/continue are
//! handled by loops and passed outward by everything else.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::ActionBase;
use crate::dialogs::{Action, DialogContext};
use crate::errors::{ControlFlowError, DialogResult};
use crate::expressions::ExpressionProperty;
use crate::memory::this_path;
use crate::value_objects::{ActionScopeCommand, ActionScopeResult, DialogReason, DialogTurnResult, DialogTurnStatus};

/// Read a control signal out of a child's result
pub(crate) fn control_signal(result: Option<&Value>) -> DialogResult<Option<ActionScopeResult>> {
    let Some(value) = result else {
        return Ok(None);
    };
    let Some(command) = value.get("actionScopeCommand") else {
        return Ok(None);
    };
    match ActionScopeResult::from_value(value) {
        Some(signal) => Ok(Some(signal)),
        None => Err(ControlFlowError::UnknownCommand(command.to_string()).into()),
    }
}

/// What a scope should do after a child finished
pub(crate) enum ScopeStep {
    /// A turn result was already produced
    Done(DialogTurnResult),
    /// Every child ran; carries the last child's result
    EndOfActions(Option<Value>),
    Break,
    Continue,
}

/// Ordered children of a container action
#[derive(Clone, Default)]
pub struct ScopeBody {
    actions: Vec<Arc<dyn Action>>,
}

impl ScopeBody {
    pub fn new(actions: Vec<Arc<dyn Action>>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    /// Comma-joined child ids, used when deriving container ids
    pub fn label(&self) -> String {
        self.actions
            .iter()
            .map(|action| action.id())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Whether `target` can be reached from these children
    pub fn contains(&self, target: &str) -> bool {
        self.actions
            .iter()
            .any(|action| action.id() == target || action.goto_entry(target).is_some())
    }

    /// Offset of the child reaching `target`, with the options that steer a branch to it
    fn locate(&self, target: &str) -> Option<(usize, Option<Value>)> {
        self.actions.iter().enumerate().find_map(|(offset, action)| {
            if action.id() == target {
                debug!(target, offset, "goto resolved");
                Some((offset, None))
            } else if action.goto_entry(target).is_some() {
                debug!(target, via = action.id(), "goto descending into branch");
                Some((offset, Some(ActionScopeResult::goto(target).to_value())))
            } else {
                None
            }
        })
    }

    /// Begin the child at `offset` and keep going while children finish synchronously
    pub(crate) async fn begin_action(
        &self,
        dc: &mut DialogContext<'_>,
        offset: usize,
        is_loop: bool,
    ) -> DialogResult<ScopeStep> {
        self.run(dc, offset, None, is_loop).await
    }

    /// Jump to `target`, beginning an intermediate branch when it is nested
    pub(crate) async fn goto(
        &self,
        dc: &mut DialogContext<'_>,
        target: &str,
        is_loop: bool,
    ) -> DialogResult<Option<ScopeStep>> {
        match self.locate(target) {
            Some((offset, options)) => Ok(Some(self.run(dc, offset, options, is_loop).await?)),
            None => Ok(None),
        }
    }

    /// Interpret a finished child's result and run whatever follows it
    pub(crate) async fn on_child_end(
        &self,
        dc: &mut DialogContext<'_>,
        result: Option<Value>,
        is_loop: bool,
    ) -> DialogResult<ScopeStep> {
        match self.after_child(dc, result, is_loop).await? {
            Next::Begin(offset, options) => self.run(dc, offset, options, is_loop).await,
            Next::Step(step) => Ok(step),
        }
    }

    async fn run(
        &self,
        dc: &mut DialogContext<'_>,
        mut offset: usize,
        mut options: Option<Value>,
        is_loop: bool,
    ) -> DialogResult<ScopeStep> {
        let driver = dc.active_instance_id();
        loop {
            dc.set_value(this_path::OFFSET, Value::from(offset))?;
            let Some(action) = self.actions.get(offset) else {
                return Ok(ScopeStep::EndOfActions(None));
            };
            let turn = dc.begin_child(action.id(), options.take()).await?;
            // A result for a driver further out passes through untouched
            if turn.status != DialogTurnStatus::ChildEnded || dc.active_instance_id() != driver {
                return Ok(ScopeStep::Done(turn));
            }
            match self.after_child(dc, turn.result, is_loop).await? {
                Next::Begin(next, next_options) => {
                    offset = next;
                    options = next_options;
                }
                Next::Step(step) => return Ok(step),
            }
        }
    }

    async fn after_child(&self, dc: &mut DialogContext<'_>, result: Option<Value>, is_loop: bool) -> DialogResult<Next> {
        if let Some(signal) = control_signal(result.as_ref())? {
            let step = match signal.command {
                ActionScopeCommand::GotoAction => {
                    let target = signal.action_id.clone().unwrap_or_default();
                    if let Some((offset, options)) = self.locate(&target) {
                        return Ok(Next::Begin(offset, options));
                    }
                    ScopeStep::Done(dc.end_dialog(Some(signal.to_value())).await?)
                }
                ActionScopeCommand::BreakLoop if is_loop => ScopeStep::Break,
                ActionScopeCommand::ContinueLoop if is_loop => ScopeStep::Continue,
                _ => ScopeStep::Done(dc.end_dialog(Some(signal.to_value())).await?),
            };
            return Ok(Next::Step(step));
        }

        let offset = dc.get_value_as::<usize>(this_path::OFFSET)?.unwrap_or_default() + 1;
        if offset < self.actions.len() {
            return Ok(Next::Begin(offset, None));
        }
        Ok(Next::Step(ScopeStep::EndOfActions(result)))
    }
}

enum Next {
    Begin(usize, Option<Value>),
    Step(ScopeStep),
}

/// Runs its actions in order; also used for trigger bodies and branches
pub struct ActionScope {
    base: ActionBase,
    body: ScopeBody,
}

impl ActionScope {
    pub fn new(actions: Vec<Arc<dyn Action>>) -> Self {
        Self::with_kind("ActionScope", actions)
    }

    /// Scope whose derived id is prefixed with `kind`
    pub fn with_kind(kind: &str, actions: Vec<Arc<dyn Action>>) -> Self {
        let body = ScopeBody::new(actions);
        Self {
            base: ActionBase::new(kind, &body.label()),
            body,
        }
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        self.body.actions()
    }

    async fn finish(&self, dc: &mut DialogContext<'_>, step: ScopeStep) -> DialogResult<DialogTurnResult> {
        match step {
            ScopeStep::Done(turn) => Ok(turn),
            ScopeStep::EndOfActions(result) => dc.end_dialog(result).await,
            ScopeStep::Break | ScopeStep::Continue => dc.end_dialog(None).await,
        }
    }
}

crate::impl_action_base!(ActionScope);

#[async_trait]
impl Action for ActionScope {
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
        if let Some(signal) = control_signal(options.as_ref())? {
            let target = signal.action_id.as_deref().unwrap_or_default();
            return match self.body.goto(dc, target, false).await? {
                Some(step) => self.finish(dc, step).await,
                None => dc.end_dialog(Some(signal.to_value())).await,
            };
        }
        let step = self.body.begin_action(dc, 0, false).await?;
        self.finish(dc, step).await
    }

    async fn resume_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let step = self.body.on_child_end(dc, result, false).await?;
        self.finish(dc, step).await
    }

    fn dependencies(&self) -> Vec<Arc<dyn Action>> {
        self.body.actions().to_vec()
    }

    fn goto_entry(&self, target: &str) -> Option<String> {
        self.body.contains(target).then(|| self.base.id().to_string())
    }
}
