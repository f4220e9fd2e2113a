//! Per-turn context

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::expressions::{ExpressionEngine, ExpressionEvaluator};
use crate::generators::{LanguageGenerator, TemplateGenerator};
use crate::memory::MemoryState;
use crate::value_objects::{Activity, DialogState};

/// Collaborators shared by every turn
pub struct TurnServices {
    /// Parses and evaluates expression properties
    pub expressions: Arc<dyn ExpressionEvaluator>,
    /// Renders outgoing text and activities
    pub generator: Arc<dyn LanguageGenerator>,
    /// Host configuration
    pub config: RuntimeConfig,
}

impl TurnServices {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            expressions: Arc::new(ExpressionEngine),
            generator: Arc::new(TemplateGenerator::new()),
            config,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn LanguageGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_expressions(mut self, expressions: Arc<dyn ExpressionEvaluator>) -> Self {
        self.expressions = expressions;
        self
    }
}

impl Default for TurnServices {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

/// Receipt for a sent activity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceResponse {
    pub id: String,
}

/// Everything one turn reads and writes
pub struct TurnContext {
    /// The inbound activity
    pub activity: Activity,
    /// Turn-owned and durable memory scopes
    pub memory: MemoryState,
    /// Root of the dialog tree
    pub dialog_state: DialogState,
    pub services: Arc<TurnServices>,
    responses: Vec<Activity>,
    /// Containers currently looping over their own children
    drivers: Vec<Uuid>,
}

impl TurnContext {
    pub fn new(activity: Activity, services: Arc<TurnServices>) -> Self {
        let memory = MemoryState::new(services.config.settings.clone());
        Self {
            activity,
            memory,
            dialog_state: DialogState::default(),
            services,
            responses: Vec::new(),
            drivers: Vec::new(),
        }
    }

    /// Buffer an outgoing activity, addressed like the inbound one
    pub fn send_activity(&mut self, mut activity: Activity) -> ResourceResponse {
        if activity.conversation_id.is_empty() {
            activity.conversation_id = self.activity.conversation_id.clone();
        }
        if activity.channel_id.is_empty() {
            activity.channel_id = self.activity.channel_id.clone();
        }
        if activity.locale.is_none() {
            activity.locale = self.activity.locale.clone();
        }
        let response = ResourceResponse {
            id: activity.id.clone(),
        };
        self.responses.push(activity);
        response
    }

    pub fn send_activities(&mut self, activities: Vec<Activity>) -> Vec<ResourceResponse> {
        activities
            .into_iter()
            .map(|activity| self.send_activity(activity))
            .collect()
    }

    /// Activities sent so far this turn
    pub fn responses(&self) -> &[Activity] {
        &self.responses
    }

    pub fn take_responses(&mut self) -> Vec<Activity> {
        std::mem::take(&mut self.responses)
    }

    /// Locale of the inbound activity, or the configured default
    pub fn locale(&self) -> String {
        self.activity
            .locale
            .clone()
            .unwrap_or_else(|| self.services.config.default_locale.clone())
    }

    pub(crate) fn push_driver(&mut self, instance_id: Uuid) {
        self.drivers.push(instance_id);
    }

    pub(crate) fn pop_driver(&mut self, instance_id: Uuid) {
        if let Some(position) = self.drivers.iter().rposition(|id| *id == instance_id) {
            self.drivers.remove(position);
        }
    }

    /// Whether `instance_id` is waiting on a child it began itself
    pub(crate) fn is_driving(&self, instance_id: Uuid) -> bool {
        self.drivers.contains(&instance_id)
    }
}
