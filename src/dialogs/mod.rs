//! Dialog runtime core
//!
//! Every executable node (adaptive dialogs, action scopes, single actions,
//! inputs) implements [`Action`]. Nodes are registered in a [`DialogSet`] and
//! referenced by id from the persisted dialog stack, so the stack itself is
//! plain data that can be saved between turns.

pub mod context;
pub mod sequence;
pub mod turn;

pub use context::DialogContext;
pub use sequence::SequenceContext;
pub use turn::{ResourceResponse, TurnContext, TurnServices};

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::DialogResult;
use crate::events::DialogEvent;
use crate::expressions::ExpressionProperty;
use crate::memory::turn_path;
use crate::value_objects::{DialogInstance, DialogReason, DialogTurnResult};

/// A unit of execution on the dialog stack
#[async_trait]
pub trait Action: Send + Sync {
    /// Identity used for registration, persistence and goto targets
    fn id(&self) -> &str;

    /// Take `id` in place of a colliding one; `false` when the action cannot be renamed
    fn assign_id(&self, _id: String) -> bool {
        false
    }

    /// Guard that skips the action when it evaluates truthy
    fn disabled(&self) -> Option<&ExpressionProperty> {
        None
    }

    /// Called when the action is pushed onto the stack
    async fn begin_dialog(&self, dc: &mut DialogContext<'_>, options: Option<Value>) -> DialogResult<DialogTurnResult>;

    /// Called when a new activity arrives while the action is on top of the stack
    async fn continue_dialog(&self, dc: &mut DialogContext<'_>) -> DialogResult<DialogTurnResult> {
        dc.end_dialog(None).await
    }

    /// Called when a dialog pushed by this one ends
    async fn resume_dialog(
        &self,
        dc: &mut DialogContext<'_>,
        _reason: DialogReason,
        result: Option<Value>,
    ) -> DialogResult<DialogTurnResult> {
        dc.end_dialog(result).await
    }

    /// Called after the action's instance has been removed from the stack
    async fn end_dialog(
        &self,
        _dc: &mut DialogContext<'_>,
        _instance: &DialogInstance,
        _reason: DialogReason,
    ) -> DialogResult<()> {
        Ok(())
    }

    /// Route an event: pre-bubble here, then the parent, then post-bubble here
    async fn on_dialog_event(&self, dc: &mut DialogContext<'_>, event: &DialogEvent) -> DialogResult<bool> {
        dc.set_value(turn_path::DIALOG_EVENT, serde_json::to_value(event)?)?;

        let mut handled = self.on_pre_bubble_event(dc, event).await?;
        if !handled && event.bubble {
            if let Some(mut parent) = dc.parent() {
                handled = parent
                    .emit_event(&event.name, event.value.clone(), true, false)
                    .await?;
            }
        }
        if !handled {
            handled = self.on_post_bubble_event(dc, event).await?;
        }
        Ok(handled)
    }

    async fn on_pre_bubble_event(&self, _dc: &mut DialogContext<'_>, _event: &DialogEvent) -> DialogResult<bool> {
        Ok(false)
    }

    async fn on_post_bubble_event(&self, _dc: &mut DialogContext<'_>, _event: &DialogEvent) -> DialogResult<bool> {
        Ok(false)
    }

    /// Nodes that must be registered alongside this one
    fn dependencies(&self) -> Vec<Arc<dyn Action>> {
        Vec::new()
    }

    /// Dialogs visible to the child frame, for containers
    fn child_dialogs(&self) -> Option<Arc<DialogSet>> {
        None
    }

    /// Id of the node to begin in order to reach a nested goto target
    fn goto_entry(&self, _target: &str) -> Option<String> {
        None
    }

    /// Contents of the read-only `class` memory scope
    fn class_memory(&self) -> Value {
        Value::Object(Map::new())
    }
}

/// Dialogs addressable from one frame of the dialog tree
#[derive(Default, Clone)]
pub struct DialogSet {
    dialogs: HashMap<String, Arc<dyn Action>>,
}

impl DialogSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dialog and, transitively, its dependencies
    ///
    /// A different instance whose id is already taken is renamed to the first
    /// free `{id}2`, `{id}3`, ... so configurations that differ only in fields
    /// outside the derived id still get their own entry. Registration order is
    /// deterministic, so the same tree always receives the same ids.
    pub fn add(&mut self, dialog: Arc<dyn Action>) -> &mut Self {
        let mut pending = vec![dialog];
        while let Some(next) = pending.pop() {
            if let Some(existing) = self.dialogs.get(next.id()) {
                if std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(&next)) {
                    continue;
                }
                let taken = next.id().to_string();
                let renamed = (2..)
                    .map(|n| format!("{taken}{n}"))
                    .find(|candidate| !self.dialogs.contains_key(candidate))
                    .unwrap_or_default();
                if !next.assign_id(renamed) {
                    warn!(dialog_id = %taken, "duplicate dialog id cannot be renamed, keeping the first");
                    continue;
                }
                debug!(dialog_id = %taken, renamed = next.id(), "dialog id already registered, renamed");
            }
            debug!(dialog_id = next.id(), "registering dialog");
            pending.extend(next.dependencies());
            self.dialogs.insert(next.id().to_string(), next);
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Action>> {
        self.dialogs.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.dialogs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.dialogs.keys().map(String::as_str)
    }
}

impl fmt::Debug for DialogSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.ids().collect();
        ids.sort_unstable();
        f.debug_struct("DialogSet").field("dialogs", &ids).finish()
    }
}

const MAX_LABEL: usize = 50;

/// Derive a stable id from an action's kind and configuration
///
/// Identical configurations produce identical ids. Long labels are cut and
/// suffixed with a hash of the full text so distinct configurations stay
/// distinct.
pub fn compute_id(kind: &str, label: &str) -> String {
    if label.chars().count() <= MAX_LABEL {
        return format!("{kind}[{label}]");
    }
    let head: String = label.chars().take(MAX_LABEL - 10).collect();
    format!("{kind}[{head}…{:08x}]", fnv1a(label))
}

fn fnv1a(text: &str) -> u32 {
    text.bytes().fold(0x811c_9dc5_u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_id_is_stable_and_bounded() {
        assert_eq!(compute_id("SendActivity", "hello"), "SendActivity[hello]");
        let long_a = "a".repeat(80);
        let mut long_b = long_a.clone();
        long_b.push('b');
        let id_a = compute_id("SendActivity", &long_a);
        assert_eq!(id_a, compute_id("SendActivity", &long_a));
        assert_ne!(id_a, compute_id("SendActivity", &long_b));
        assert!(id_a.chars().count() < 70);
    }
}
