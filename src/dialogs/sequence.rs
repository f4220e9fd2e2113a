//! Plan mutation for adaptive dialogs

use tracing::debug;

use super::context::DialogContext;
use crate::errors::{DialogError, DialogResult};
use crate::value_objects::{ActionChangeList, ActionChangeType, ActionState, SequenceState};

impl SequenceState {
    /// Drain queued changes into the plan in FIFO order, to a fixed point
    pub fn apply_changes(&mut self) -> bool {
        let mut applied = false;
        while !self.changes.is_empty() {
            let pending = std::mem::take(&mut self.changes);
            for change in pending {
                self.apply(change);
                applied = true;
            }
        }
        applied
    }

    fn apply(&mut self, change: ActionChangeList) {
        debug!(change_type = ?change.change_type, count = change.actions.len(), "applying plan change");
        match change.change_type {
            ActionChangeType::InsertActions => {
                self.actions.splice(0..0, change.actions);
            }
            ActionChangeType::InsertActionsBeforeTags => {
                let position = self
                    .actions
                    .iter()
                    .position(|action| action.tags.iter().any(|tag| change.tags.contains(tag)));
                match position {
                    Some(index) => {
                        self.actions.splice(index..index, change.actions);
                    }
                    None => self.actions.extend(change.actions),
                }
            }
            ActionChangeType::AppendActions => self.actions.extend(change.actions),
            ActionChangeType::EndSequence => self.actions.clear(),
            ActionChangeType::ReplaceSequence => {
                self.actions.clear();
                self.actions.extend(change.actions);
            }
        }
    }
}

/// Plan access for the adaptive dialog on top of a frame
pub struct SequenceContext<'a> {
    dc: DialogContext<'a>,
}

impl<'a> SequenceContext<'a> {
    pub(crate) fn new(dc: DialogContext<'a>) -> Self {
        Self { dc }
    }

    fn plan(&self) -> Option<&SequenceState> {
        self.dc.active_dialog()?.plan.as_ref()
    }

    fn plan_mut(&mut self) -> DialogResult<&mut SequenceState> {
        self.dc
            .active_dialog_mut()?
            .plan
            .as_mut()
            .ok_or_else(|| DialogError::InvalidState("active dialog has no plan".into()))
    }

    /// Remaining plan entries
    pub fn actions(&self) -> &[ActionState] {
        self.plan().map(|plan| plan.actions.as_slice()).unwrap_or_default()
    }

    pub fn has_changes(&self) -> bool {
        self.plan().is_some_and(|plan| !plan.changes.is_empty())
    }

    /// Queue a change; it is applied at the next plan step
    pub fn queue_changes(&mut self, changes: ActionChangeList) -> DialogResult<()> {
        debug!(change_type = ?changes.change_type, depth = self.dc.depth(), "queueing plan change");
        self.plan_mut()?.changes.push(changes);
        Ok(())
    }

    /// Apply every queued change; returns whether anything was applied
    pub fn apply_changes(&mut self) -> DialogResult<bool> {
        Ok(self.plan_mut()?.apply_changes())
    }

    /// Drop the head entry once it has finished
    pub fn end_current_action(&mut self) -> DialogResult<()> {
        let plan = self.plan_mut()?;
        if !plan.actions.is_empty() {
            plan.actions.remove(0);
        }
        Ok(())
    }

    /// The dialog context of the adaptive dialog owning the plan
    pub fn context(&mut self) -> &mut DialogContext<'a> {
        &mut self.dc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(state: &SequenceState) -> Vec<&str> {
        state.actions.iter().map(|a| a.dialog_id.as_str()).collect()
    }

    fn plan(ids: &[&str]) -> SequenceState {
        SequenceState {
            actions: ids.iter().map(|id| ActionState::new(*id)).collect(),
            changes: Vec::new(),
        }
    }

    #[test]
    fn test_changes_apply_in_queue_order() {
        let mut state = plan(&["c"]);
        state.changes.push(ActionChangeList::new(
            ActionChangeType::InsertActions,
            vec![ActionState::new("a"), ActionState::new("b")],
        ));
        state.changes.push(ActionChangeList::new(
            ActionChangeType::AppendActions,
            vec![ActionState::new("d")],
        ));
        state.changes.push(ActionChangeList::new(
            ActionChangeType::InsertActions,
            vec![ActionState::new("first")],
        ));
        assert!(state.apply_changes());
        assert_eq!(ids(&state), vec!["first", "a", "b", "c", "d"]);
        assert!(state.changes.is_empty());
    }

    #[test]
    fn test_insert_before_tags() {
        let mut state = plan(&["a"]);
        state.actions.push(ActionState::new("tail").with_tags(vec!["cleanup".into()]));
        state.changes.push(
            ActionChangeList::new(ActionChangeType::InsertActionsBeforeTags, vec![ActionState::new("x")])
                .with_tags(vec!["cleanup".into()]),
        );
        state.changes.push(
            ActionChangeList::new(ActionChangeType::InsertActionsBeforeTags, vec![ActionState::new("y")])
                .with_tags(vec!["missing".into()]),
        );
        state.apply_changes();
        assert_eq!(ids(&state), vec!["a", "x", "tail", "y"]);
    }

    #[test]
    fn test_end_and_replace_sequence() {
        let mut state = plan(&["a", "b"]);
        state.changes.push(ActionChangeList::new(ActionChangeType::EndSequence, vec![]));
        state.apply_changes();
        assert!(state.actions.is_empty());

        let mut state = plan(&["a", "b"]);
        state.changes.push(ActionChangeList::new(
            ActionChangeType::ReplaceSequence,
            vec![ActionState::new("z")],
        ));
        state.apply_changes();
        assert_eq!(ids(&state), vec!["z"]);
        assert!(!state.apply_changes());
    }
}
