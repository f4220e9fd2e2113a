//! Host-facing turn processing
//!
//! A [`DialogManager`] owns the root dialog and the storage backend. For each
//! inbound activity it loads durable state, drives the dialog tree through
//! one turn, and writes the state back, even when the turn failed.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::dialogs::{Action, DialogContext, DialogSet, TurnContext, TurnServices};
use crate::errors::{DialogError, DialogResult};
use crate::events::names;
use crate::memory::{self, turn_path};
use crate::storage::{Storage, StorageWrite, StoreItem};
use crate::value_objects::{Activity, DialogState, DialogTurnResult, DialogTurnStatus};

/// What a turn produced
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub status: DialogTurnStatus,
    /// Result of the root dialog when it completed this turn
    pub result: Option<Value>,
    /// Activities sent during the turn, in order
    pub responses: Vec<Activity>,
}

/// Storage keys for one inbound activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub conversation: String,
    pub user: String,
    pub dialog_state: String,
}

impl StorageKeys {
    pub fn for_activity(prefix: &str, activity: &Activity) -> Self {
        let conversation = format!("{prefix}/{}/conversations/{}", activity.channel_id, activity.conversation_id);
        Self {
            user: format!("{prefix}/{}/users/{}", activity.channel_id, activity.from_id),
            dialog_state: format!("{conversation}/dialogState"),
            conversation,
        }
    }

    fn all(&self) -> Vec<String> {
        vec![self.conversation.clone(), self.user.clone(), self.dialog_state.clone()]
    }
}

/// Runs a root dialog turn by turn against durable storage
pub struct DialogManager {
    root_id: String,
    dialogs: Arc<DialogSet>,
    storage: Arc<dyn Storage>,
    services: Arc<TurnServices>,
}

impl DialogManager {
    pub fn new(root: Arc<dyn Action>, storage: Arc<dyn Storage>) -> Self {
        let root_id = root.id().to_string();
        let mut dialogs = DialogSet::new();
        dialogs.add(root);
        Self {
            root_id,
            dialogs: Arc::new(dialogs),
            storage,
            services: Arc::new(TurnServices::default()),
        }
    }

    pub fn with_services(mut self, services: Arc<TurnServices>) -> Self {
        self.services = services;
        self
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn services(&self) -> &Arc<TurnServices> {
        &self.services
    }

    /// Process one inbound activity
    pub async fn on_turn(&self, activity: Activity) -> DialogResult<TurnOutcome> {
        let keys = StorageKeys::for_activity(&self.services.config.storage_prefix, &activity);
        let items = self.storage.read(&keys.all()).await?;

        let mut turn = TurnContext::new(activity, self.services.clone());
        turn.memory.conversation = stored_value(&items, &keys.conversation);
        turn.memory.user = stored_value(&items, &keys.user);
        turn.dialog_state = match items.get(&keys.dialog_state) {
            Some(item) => serde_json::from_value::<DialogState>(item.value.clone())?,
            None => DialogState::default(),
        };
        turn.memory.reset_turn();

        let outcome = self.run_turn(&mut turn).await;
        if let Err(e) = &outcome {
            error!(conversation_id = %turn.activity.conversation_id, error = %e, "turn failed");
        }
        self.save(&turn, &keys, &items).await?;

        let result = outcome?;
        info!(
            conversation_id = %turn.activity.conversation_id,
            status = ?result.status,
            responses = turn.responses().len(),
            "turn complete"
        );
        Ok(TurnOutcome {
            status: result.status,
            result: result.result,
            responses: turn.take_responses(),
        })
    }

    async fn run_turn(&self, turn: &mut TurnContext) -> DialogResult<DialogTurnResult> {
        let activity = serde_json::to_value(&turn.activity)?;
        let emit_errors = self.services.config.emit_error_events;
        let mut dc = DialogContext::new(turn, self.dialogs.clone());
        dc.set_value(turn_path::ACTIVITY, activity.clone())?;

        match self.drive(&mut dc, activity).await {
            Ok(result) => Ok(result),
            Err(e) if emit_errors => {
                warn!(error = %e, kind = e.kind(), "routing turn error to error handlers");
                let value = json!({ "message": e.to_string(), "kind": e.kind() });
                match dc.emit_event(names::ERROR, Some(value), true, true).await {
                    Ok(true) => return Self::continue_until_settled(&mut dc).await,
                    Ok(false) => {}
                    Err(handler_error) => {
                        error!(error = %handler_error, original = %e, "error handlers failed, reporting the original error");
                    }
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn drive(&self, dc: &mut DialogContext<'_>, activity: Value) -> DialogResult<DialogTurnResult> {
        if dc.stack().is_empty() {
            info!(root = %self.root_id, "starting root dialog");
            let result = dc.begin_dialog(&self.root_id, None).await?;
            return Self::settle(dc, result).await;
        }
        dc.emit_event(names::ACTIVITY_RECEIVED, Some(activity), true, true)
            .await?;
        Self::continue_until_settled(dc).await
    }

    async fn continue_until_settled(dc: &mut DialogContext<'_>) -> DialogResult<DialogTurnResult> {
        let result = dc.continue_dialog().await?;
        Self::settle(dc, result).await
    }

    /// Keep continuing while the root only yielded
    async fn settle(dc: &mut DialogContext<'_>, mut result: DialogTurnResult) -> DialogResult<DialogTurnResult> {
        while result.status == DialogTurnStatus::Yielded {
            result = dc.continue_dialog().await?;
        }
        Ok(result)
    }

    async fn save(&self, turn: &TurnContext, keys: &StorageKeys, read: &HashMap<String, StoreItem>) -> DialogResult<()> {
        let version = |key: &str| read.get(key).map_or(0, |item| item.version);
        let changes = vec![
            StorageWrite::new(keys.conversation.clone(), turn.memory.conversation.clone())
                .expecting(version(&keys.conversation)),
            StorageWrite::new(keys.user.clone(), turn.memory.user.clone()).expecting(version(&keys.user)),
            StorageWrite::new(keys.dialog_state.clone(), serde_json::to_value(&turn.dialog_state)?)
                .expecting(version(&keys.dialog_state)),
        ];
        self.storage.write(changes).await.map_err(DialogError::from)
    }
}

fn stored_value(items: &HashMap<String, StoreItem>, key: &str) -> Value {
    items
        .get(key)
        .map(|item| item.value.clone())
        .filter(Value::is_object)
        .unwrap_or_else(memory::empty_object)
}
