//! Loops over arrays in memory

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::scope::{ScopeBody, ScopeStep};
use super::ActionBase;
use crate::dialogs::{Action, DialogContext};
use crate::errors::{DialogError, DialogResult};
use crate::expressions::ExpressionProperty;
use crate::memory::{dialog_path, this_path};
use crate::value_objects::{DialogReason, DialogTurnResult};

/// Items at `property`; objects iterate over their values, absent means empty
fn read_items(dc: &DialogContext<'_>, property: &str) -> DialogResult<Vec<Value>> {
    Ok(match dc.get_value(property)? {
        Some(Value::Array(items)) => items,
        Some(Value::Object(map)) => map.into_iter().map(|(_, value)| value).collect(),
        Some(_) | None => Vec::new(),
    })
}

fn next_index(dc: &DialogContext<'_>) -> DialogResult<usize> {
    Ok(dc
        .get_value_as::<i64>(this_path::INDEX)?
        .map_or(0, |index| (index + 1).max(0) as usize))
}

/// Runs its actions once per item of `items_property`
///
/// The current index and item are published at `dialog.foreach.index` and
/// `dialog.foreach.value` unless other paths are configured.
pub struct Foreach {
    base: ActionBase,
    items_property: String,
    index_property: String,
    value_property: String,
    body: ScopeBody,
}

impl Foreach {
    pub fn new(items_property: impl Into<String>, actions: Vec<Arc<dyn Action>>) -> Self {
        let items_property = items_property.into();
        let body = ScopeBody::new(actions);
        Self {
            base: ActionBase::new("Foreach", &format!("{items_property}|{}", body.label())),
            items_property,
            index_property: dialog_path::FOREACH_INDEX.to_string(),
            value_property: dialog_path::FOREACH_VALUE.to_string(),
            body,
        }
    }

    pub fn with_index_property(mut self, path: impl Into<String>) -> Self {
        self.index_property = path.into();
        self
    }

    pub fn with_value_property(mut self, path: impl Into<String>) -> Self {
        self.value_property = path.into();
        self
    }

    /// Start iterations until one suspends or the items run out
    async fn run(&self, dc: &mut DialogContext<'_>, mut step: ScopeStep) -> DialogResult<DialogTurnResult> {
        loop {
            match step {
                ScopeStep::Done(turn) => return Ok(turn),
                ScopeStep::Break => return dc.end_dialog(None).await,
                ScopeStep::Continue | ScopeStep::EndOfActions(_) => {}
            }
            let index = next_index(dc)?;
            let items = read_items(dc, &self.items_property)?;
            let Some(item) = items.get(index).cloned() else {
                debug!(action_id = %self.base.id(), iterations = index, "foreach finished");
                return dc.end_dialog(None).await;
            };
            if self.body.actions().is_empty() {
                return dc.end_dialog(None).await;
            }

            dc.set_value(this_path::INDEX, Value::from(index))?;
            dc.set_value(&self.index_property, Value::from(index))?;
            dc.set_value(&self.value_property, item)?;
            step = self.body.begin_action(dc, 0, true).await?;
        }
    }
}

/// Runs its actions once per page of `page_size` items
///
/// The current page and its index are published at `dialog.foreach.page`
/// and `dialog.foreach.pageindex`.
pub struct ForeachPage {
    base: ActionBase,
    items_property: String,
    page_size: usize,
    page_property: String,
    page_index_property: String,
    body: ScopeBody,
}

impl ForeachPage {
    pub fn new(items_property: impl Into<String>, page_size: usize, actions: Vec<Arc<dyn Action>>) -> Self {
        let items_property = items_property.into();
        let body = ScopeBody::new(actions);
        Self {
            base: ActionBase::new(
                "ForeachPage",
                &format!("{items_property}|{page_size}|{}", body.label()),
            ),
            items_property,
            page_size,
            page_property: dialog_path::FOREACH_PAGE.to_string(),
            page_index_property: dialog_path::FOREACH_PAGE_INDEX.to_string(),
            body,
        }
    }

    async fn run(&self, dc: &mut DialogContext<'_>, mut step: ScopeStep) -> DialogResult<DialogTurnResult> {
        if self.page_size == 0 {
            return Err(DialogError::configuration(self.base.id(), "pageSize must be at least 1"));
        }
        loop {
            match step {
                ScopeStep::Done(turn) => return Ok(turn),
                ScopeStep::Break => return dc.end_dialog(None).await,
                ScopeStep::Continue | ScopeStep::EndOfActions(_) => {}
            }
            let page_index = next_index(dc)?;
            let items = read_items(dc, &self.items_property)?;
            let start = page_index * self.page_size;
            if start >= items.len() || self.body.actions().is_empty() {
                return dc.end_dialog(None).await;
            }
            let end = (start + self.page_size).min(items.len());

            dc.set_value(this_path::INDEX, Value::from(page_index))?;
            dc.set_value(&self.page_index_property, Value::from(page_index))?;
            dc.set_value(&self.page_property, Value::Array(items[start..end].to_vec()))?;
            step = self.body.begin_action(dc, 0, true).await?;
        }
    }
}

crate::impl_action_base!(Foreach, ForeachPage);

#[async_trait]
impl Action for Foreach {
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
        dc.remove_value(this_path::INDEX)?;
        self.run(dc, ScopeStep::Continue).await
    }

    async fn resume_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let step = self.body.on_child_end(dc, result, true).await?;
        self.run(dc, step).await
    }

    fn dependencies(&self) -> Vec<Arc<dyn Action>> {
        self.body.actions().to_vec()
    }
}

#[async_trait]
impl Action for ForeachPage {
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
        dc.remove_value(this_path::INDEX)?;
        self.run(dc, ScopeStep::Continue).await
    }

    async fn resume_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        let step = self.body.on_child_end(dc, result, true).await?;
        self.run(dc, step).await
    }

    fn dependencies(&self) -> Vec<Arc<dyn Action>> {
        self.body.actions().to_vec()
    }
}
