//! Conditional branching

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::scope::{control_signal, ActionScope};
use super::ActionBase;
use crate::dialogs::{Action, DialogContext};
use crate::errors::DialogResult;
use crate::expressions::{values_equal, ExpressionProperty};
use crate::value_objects::DialogTurnResult;

fn branch_label(parts: &[&str]) -> String {
    parts.join("|")
}

/// Runs `actions` when the condition is truthy, `else_actions` otherwise
pub struct IfCondition {
    base: ActionBase,
    condition: ExpressionProperty,
    then_scope: Arc<ActionScope>,
    else_scope: Arc<ActionScope>,
}

impl IfCondition {
    pub fn new(
        condition: impl Into<ExpressionProperty>,
        actions: Vec<Arc<dyn Action>>,
        else_actions: Vec<Arc<dyn Action>>,
    ) -> Self {
        let condition = condition.into();
        let then_scope = Arc::new(ActionScope::with_kind("IfCondition.actions", actions));
        let else_scope = Arc::new(ActionScope::with_kind("IfCondition.elseActions", else_actions));
        let label = branch_label(&[condition.source(), then_scope.id(), else_scope.id()]);
        Self {
            base: ActionBase::new("IfCondition", &label),
            condition,
            then_scope,
            else_scope,
        }
    }
}

crate::impl_action_base!(IfCondition);

#[async_trait]
impl Action for IfCondition {
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
            if let Some(branch) = signal.action_id.as_deref().and_then(|target| self.goto_entry(target)) {
                return dc.replace_dialog(&branch, options).await;
            }
        }

        let branch = if dc.evaluate_bool(&self.condition)? {
            &self.then_scope
        } else {
            &self.else_scope
        };
        debug!(action_id = %self.base.id(), branch = branch.id(), "condition evaluated");
        dc.replace_dialog(branch.id(), None).await
    }

    fn dependencies(&self) -> Vec<Arc<dyn Action>> {
        vec![self.then_scope.clone(), self.else_scope.clone()]
    }

    fn goto_entry(&self, target: &str) -> Option<String> {
        self.then_scope
            .goto_entry(target)
            .or_else(|| self.else_scope.goto_entry(target))
    }
}

/// One branch of a [`SwitchCondition`]
pub struct Case {
    pub value: Value,
    scope: Arc<ActionScope>,
}

impl Case {
    pub fn new(value: impl Into<Value>, actions: Vec<Arc<dyn Action>>) -> Self {
        let value = value.into();
        let kind = format!("SwitchCondition.case[{value}]");
        Self {
            scope: Arc::new(ActionScope::with_kind(&kind, actions)),
            value,
        }
    }

    /// Case values written as text also match the number or boolean they spell
    fn matches(&self, value: &Value) -> bool {
        if values_equal(value, &self.value) {
            return true;
        }
        let Value::String(text) = &self.value else {
            return false;
        };
        let parsed = if let Ok(number) = text.parse::<i64>() {
            Value::from(number)
        } else if let Ok(number) = text.parse::<f64>() {
            Value::from(number)
        } else if let Ok(flag) = text.parse::<bool>() {
            Value::Bool(flag)
        } else {
            return false;
        };
        values_equal(value, &parsed)
    }
}

/// Runs the first case whose value equals the condition, else the default
pub struct SwitchCondition {
    base: ActionBase,
    condition: ExpressionProperty,
    cases: Vec<Case>,
    default_scope: Arc<ActionScope>,
}

impl SwitchCondition {
    pub fn new(condition: impl Into<ExpressionProperty>, cases: Vec<Case>, default: Vec<Arc<dyn Action>>) -> Self {
        let condition = condition.into();
        let default_scope = Arc::new(ActionScope::with_kind("SwitchCondition.default", default));
        let mut parts = vec![condition.source()];
        parts.extend(cases.iter().map(|case| case.scope.id()));
        parts.push(default_scope.id());
        Self {
            base: ActionBase::new("SwitchCondition", &branch_label(&parts)),
            condition,
            cases,
            default_scope,
        }
    }

    fn scopes(&self) -> impl Iterator<Item = &Arc<ActionScope>> {
        self.cases
            .iter()
            .map(|case| &case.scope)
            .chain(std::iter::once(&self.default_scope))
    }
}

crate::impl_action_base!(SwitchCondition);

#[async_trait]
impl Action for SwitchCondition {
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
            if let Some(branch) = signal.action_id.as_deref().and_then(|target| self.goto_entry(target)) {
                return dc.replace_dialog(&branch, options).await;
            }
        }

        let value = dc.evaluate(&self.condition)?;
        let branch = self
            .cases
            .iter()
            .find(|case| case.matches(&value))
            .map(|case| &case.scope)
            .unwrap_or(&self.default_scope);
        debug!(action_id = %self.base.id(), %value, branch = branch.id(), "switch evaluated");
        dc.replace_dialog(branch.id(), None).await
    }

    fn dependencies(&self) -> Vec<Arc<dyn Action>> {
        self.scopes().map(|scope| scope.clone() as Arc<dyn Action>).collect()
    }

    fn goto_entry(&self, target: &str) -> Option<String> {
        self.scopes().find_map(|scope| scope.goto_entry(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_matching_normalizes_text_values() {
        let case = Case::new("22", Vec::new());
        assert!(case.matches(&json!("22")));
        assert!(case.matches(&json!(22)));
        assert!(!case.matches(&json!("23")));
        assert!(Case::new("true", Vec::new()).matches(&json!(true)));
        assert!(!Case::new("yes", Vec::new()).matches(&json!(true)));
    }

    #[test]
    fn test_ids_depend_on_configuration() {
        let a = IfCondition::new("dialog.x", Vec::new(), Vec::new());
        let b = IfCondition::new("dialog.y", Vec::new(), Vec::new());
        assert_ne!(a.id(), b.id());
        assert!(a.id().starts_with("IfCondition["));
    }
}
