//! Memory manipulation actions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::ActionBase;
use crate::dialogs::{Action, DialogContext};
use crate::errors::{DialogError, DialogResult};
use crate::expressions::{values_equal, ExpressionProperty};
use crate::value_objects::DialogTurnResult;

fn require_sequence(dc: &mut DialogContext<'_>, action_id: &str) -> DialogResult<()> {
    match dc.sequence() {
        Some(_) => Ok(()),
        None => Err(DialogError::context_misuse(
            action_id,
            "should only be used in the context of an adaptive dialog",
        )),
    }
}

/// Writes the value of an expression to a memory path
pub struct SetProperty {
    base: ActionBase,
    property: String,
    value: ExpressionProperty,
}

impl SetProperty {
    pub fn new(property: impl Into<String>, value: impl Into<ExpressionProperty>) -> Self {
        let property = property.into();
        let value = value.into();
        Self {
            base: ActionBase::new("SetProperty", &format!("{property}={}", value.source())),
            property,
            value,
        }
    }
}

/// One `property = value` pair of [`SetProperties`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAssignment {
    pub property: String,
    pub value: ExpressionProperty,
}

/// Applies several assignments in order
pub struct SetProperties {
    base: ActionBase,
    assignments: Vec<PropertyAssignment>,
}

impl SetProperties {
    pub fn new(assignments: Vec<PropertyAssignment>) -> Self {
        let label = assignments
            .iter()
            .map(|a| format!("{}={}", a.property, a.value.source()))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            base: ActionBase::new("SetProperties", &label),
            assignments,
        }
    }
}

/// Initializes a property to an empty array or object
pub struct InitProperty {
    base: ActionBase,
    property: String,
    property_type: String,
}

impl InitProperty {
    pub fn new(property: impl Into<String>, property_type: impl Into<String>) -> Self {
        let property = property.into();
        let property_type = property_type.into();
        Self {
            base: ActionBase::new("InitProperty", &format!("{property}:{property_type}")),
            property,
            property_type,
        }
    }
}

/// Removes a property from memory
pub struct DeleteProperty {
    base: ActionBase,
    property: String,
}

impl DeleteProperty {
    pub fn new(property: impl Into<String>) -> Self {
        let property = property.into();
        Self {
            base: ActionBase::new("DeleteProperty", &property),
            property,
        }
    }
}

/// Removes several properties from memory
pub struct DeleteProperties {
    base: ActionBase,
    properties: Vec<String>,
}

impl DeleteProperties {
    pub fn new(properties: Vec<String>) -> Self {
        Self {
            base: ActionBase::new("DeleteProperties", &properties.join(",")),
            properties,
        }
    }
}

/// Operation performed by [`EditArray`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArrayChangeType {
    /// Append `value`
    Push,
    /// Remove and return the last item
    Pop,
    /// Remove and return the first item
    Take,
    /// Remove the first item equal to `value`, returning whether one was found
    Remove,
    /// Empty the array, returning whether it had items
    Clear,
}

/// Edits an array in memory, treating an absent array as empty
pub struct EditArray {
    base: ActionBase,
    change_type: ArrayChangeType,
    items_property: String,
    value: Option<ExpressionProperty>,
    result_property: Option<String>,
}

impl EditArray {
    pub fn new(change_type: ArrayChangeType, items_property: impl Into<String>) -> Self {
        let items_property = items_property.into();
        Self {
            base: ActionBase::new("EditArray", &format!("{change_type:?}:{items_property}")),
            change_type,
            items_property,
            value: None,
            result_property: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<ExpressionProperty>) -> Self {
        let value = value.into();
        self.base.relabel(
            "EditArray",
            &format!("{:?}:{}:{}", self.change_type, self.items_property, value.source()),
        );
        self.value = Some(value);
        self
    }

    pub fn with_result_property(mut self, property: impl Into<String>) -> Self {
        self.result_property = Some(property.into());
        self
    }

    fn evaluate_value(&self, dc: &DialogContext<'_>) -> DialogResult<Value> {
        let expression = self.value.as_ref().ok_or_else(|| {
            DialogError::configuration(self.base.id(), format!("{:?} requires a value", self.change_type))
        })?;
        dc.evaluate(expression)
    }
}

crate::impl_action_base!(SetProperty, SetProperties, InitProperty, DeleteProperty, DeleteProperties, EditArray);

#[async_trait]
impl Action for SetProperty {
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
        let value = dc.evaluate(&self.value)?;
        dc.set_value(&self.property, value)?;
        dc.end_dialog(None).await
    }
}

#[async_trait]
impl Action for SetProperties {
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
        for assignment in &self.assignments {
            let value = dc.evaluate(&assignment.value)?;
            dc.set_value(&assignment.property, value)?;
        }
        dc.end_dialog(None).await
    }
}

#[async_trait]
impl Action for InitProperty {
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
        let initial = match self.property_type.to_lowercase().as_str() {
            "array" => Value::Array(Vec::new()),
            "object" => Value::Object(Map::new()),
            other => {
                return Err(DialogError::configuration(
                    self.base.id(),
                    format!("type '{other}' is not supported, expected 'array' or 'object'"),
                ));
            }
        };
        dc.set_value(&self.property, initial)?;
        dc.end_dialog(None).await
    }
}

#[async_trait]
impl Action for DeleteProperty {
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
        require_sequence(dc, self.base.id())?;
        dc.remove_value(&self.property)?;
        dc.end_dialog(None).await
    }
}

#[async_trait]
impl Action for DeleteProperties {
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
        require_sequence(dc, self.base.id())?;
        for property in &self.properties {
            dc.remove_value(property)?;
        }
        dc.end_dialog(None).await
    }
}

#[async_trait]
impl Action for EditArray {
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
        if self.items_property.is_empty() {
            return Err(DialogError::configuration(self.base.id(), "itemsProperty is required"));
        }
        let mut list = match dc.get_value(&self.items_property)? {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };

        let result = match self.change_type {
            ArrayChangeType::Push => {
                let item = self.evaluate_value(dc)?;
                if !item.is_null() {
                    list.push(item);
                }
                None
            }
            ArrayChangeType::Pop => list.pop(),
            ArrayChangeType::Take => (!list.is_empty()).then(|| list.remove(0)),
            ArrayChangeType::Remove => {
                let item = self.evaluate_value(dc)?;
                let position = list.iter().position(|candidate| values_equal(candidate, &item));
                if let Some(index) = position {
                    list.remove(index);
                }
                Some(Value::Bool(position.is_some()))
            }
            ArrayChangeType::Clear => {
                let had_items = !list.is_empty();
                list.clear();
                Some(Value::Bool(had_items))
            }
        };
        debug!(action_id = %self.base.id(), change = ?self.change_type, len = list.len(), "array edited");

        dc.set_value(&self.items_property, Value::Array(list))?;
        if let Some(property) = &self.result_property {
            dc.set_value(property, result.clone().unwrap_or(Value::Null))?;
        }
        dc.end_dialog(result).await
    }
}
