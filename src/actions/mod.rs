//! Built-in actions
//!
//! Every action is an independent type implementing [`Action`](crate::dialogs::Action).
//! Shared identity and guard handling lives in [`ActionBase`]; container
//! behaviour (ordered children, break/continue/goto handling) lives in
//! [`scope::ScopeBody`].

pub mod code;
pub mod conditions;
pub mod control;
pub mod dialog_flow;
pub mod foreach;
pub mod messaging;
pub mod properties;
pub mod scope;

pub use code::CodeAction;
pub use conditions::{Case, IfCondition, SwitchCondition};
pub use control::{BreakLoop, ContinueLoop, EditActions, EndTurn, GotoAction};
pub use dialog_flow::{BeginDialog, CancelAllDialogs, EmitEvent, EndDialog, RepeatDialog, ReplaceDialog};
pub use foreach::{Foreach, ForeachPage};
pub use messaging::{LogAction, SendActivity, SendList, TraceActivity};
pub use properties::{ArrayChangeType, DeleteProperties, DeleteProperty, EditArray, InitProperty, PropertyAssignment, SetProperties, SetProperty};
pub use scope::ActionScope;

use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::dialogs::{compute_id, DialogContext};
use crate::errors::DialogResult;
use crate::expressions::ExpressionProperty;

/// Identity and enable guard shared by every action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionBase {
    id: String,
    pub disabled: Option<ExpressionProperty>,
    explicit_id: bool,
    /// Replacement chosen at registration when `id` was already taken
    assigned: OnceLock<String>,
}

impl ActionBase {
    /// Base with an id derived from the action's kind and configuration
    pub fn new(kind: &str, label: &str) -> Self {
        Self {
            id: compute_id(kind, label),
            disabled: None,
            explicit_id: false,
            assigned: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.assigned.get().map_or(self.id.as_str(), String::as_str)
    }

    /// Rename once, at registration; later calls are refused
    pub fn assign_id(&self, id: String) -> bool {
        self.assigned.set(id).is_ok()
    }

    /// Recompute a derived id after the configuration changed
    pub fn relabel(&mut self, kind: &str, label: &str) {
        if self.explicit_id {
            return;
        }
        self.id = compute_id(kind, label);
        if let Some(disabled) = &self.disabled {
            self.id = format!("{}?{}", self.id, disabled.source());
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
        self.explicit_id = true;
    }

    /// Derived ids include the guard so guarded and unguarded copies stay distinct
    pub fn set_disabled(&mut self, disabled: ExpressionProperty) {
        if !self.explicit_id {
            self.id = format!("{}?{}", self.id, disabled.source());
        }
        self.disabled = Some(disabled);
    }

    /// Apply declarative overrides
    pub fn configure(mut self, id: Option<String>, disabled: Option<ExpressionProperty>) -> Self {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            self.set_id(id);
        }
        if let Some(disabled) = disabled {
            self.set_disabled(disabled);
        }
        self
    }
}

/// Builder methods for the [`ActionBase`] of an action struct
#[macro_export]
macro_rules! impl_action_base {
    ($($name:ident),+ $(,)?) => {
        $(
            impl $name {
                /// Override the derived id
                pub fn with_id(mut self, id: impl Into<String>) -> Self {
                    self.base.set_id(id);
                    self
                }

                /// Skip the action whenever `condition` is truthy
                pub fn with_disabled(mut self, condition: impl Into<$crate::expressions::ExpressionProperty>) -> Self {
                    self.base.set_disabled(condition.into());
                    self
                }

                /// Apply declarative `id` and `disabled` fields
                pub fn configure_base(mut self, id: Option<String>, disabled: Option<$crate::expressions::ExpressionProperty>) -> Self {
                    self.base = self.base.configure(id, disabled);
                    self
                }
            }
        )+
    };
}

/// Evaluate a map of option expressions into a JSON object
pub(crate) fn bind_options(
    dc: &DialogContext<'_>,
    options: &[(String, ExpressionProperty)],
) -> DialogResult<Option<Value>> {
    if options.is_empty() {
        return Ok(None);
    }
    let mut bound = Map::new();
    for (name, expression) in options {
        bound.insert(name.clone(), dc.evaluate(expression)?);
    }
    Ok(Some(Value::Object(bound)))
}
