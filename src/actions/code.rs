//! Host-provided code as an action

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::ActionBase;
use crate::dialogs::{Action, DialogContext};
use crate::errors::DialogResult;
use crate::expressions::ExpressionProperty;
use crate::value_objects::DialogTurnResult;

type CodeHandler = dyn Fn(&mut DialogContext<'_>, Option<Value>) -> DialogResult<Option<Value>> + Send + Sync;

/// Runs a closure over the dialog context, ending with its return value
///
/// Not available from declarative files.
pub struct CodeAction {
    base: ActionBase,
    handler: Arc<CodeHandler>,
}

impl CodeAction {
    pub fn new<F>(name: &str, handler: F) -> Self
    where
        F: Fn(&mut DialogContext<'_>, Option<Value>) -> DialogResult<Option<Value>> + Send + Sync + 'static,
    {
        Self {
            base: ActionBase::new("CodeAction", name),
            handler: Arc::new(handler),
        }
    }
}

crate::impl_action_base!(CodeAction);

#[async_trait]
impl Action for CodeAction {
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
        let result = (self.handler)(dc, options)?;
        dc.end_dialog(result).await
    }
}
