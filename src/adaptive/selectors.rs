//! Trigger selection strategies
//!
//! When several triggers listen for the same event, a [`TriggerSelector`]
//! decides the order in which their conditions are tried. The first trigger
//! whose condition holds wins.

use super::triggers::OnCondition;

/// Orders candidate triggers for evaluation
pub trait TriggerSelector: Send + Sync {
    /// Candidates arrive in declaration order
    fn order<'t>(&self, candidates: Vec<&'t OnCondition>) -> Vec<&'t OnCondition>;

    /// Get the name of this selector
    fn name(&self) -> &str;
}

/// Priority first, then the most specific condition, then declaration order
#[derive(Debug, Clone, Copy, Default)]
pub struct MostSpecificSelector;

impl TriggerSelector for MostSpecificSelector {
    fn order<'t>(&self, mut candidates: Vec<&'t OnCondition>) -> Vec<&'t OnCondition> {
        candidates.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| b.specificity().cmp(&a.specificity()))
        });
        candidates
    }

    fn name(&self) -> &str {
        "mostSpecific"
    }
}

/// Declaration order only
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstSelector;

impl TriggerSelector for FirstSelector {
    fn order<'t>(&self, candidates: Vec<&'t OnCondition>) -> Vec<&'t OnCondition> {
        candidates
    }

    fn name(&self) -> &str {
        "first"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::triggers::TriggerKind;

    fn names<'t>(ordered: &[&'t OnCondition]) -> Vec<String> {
        ordered.iter().map(|t| format!("{:?}", t.kind())).collect()
    }

    #[test]
    fn test_most_specific_ordering() {
        let plain = OnCondition::on_intent("Add", Vec::new(), Vec::new());
        let with_entity = OnCondition::on_intent("Add", vec!["item".into()], Vec::new());
        let unknown = OnCondition::new(TriggerKind::UnknownIntent, Vec::new());
        let urgent = OnCondition::on_intent("Help", Vec::new(), Vec::new()).with_priority(-1);

        let candidates = vec![&unknown, &plain, &with_entity, &urgent];
        let ordered = MostSpecificSelector.order(candidates.clone());
        assert_eq!(
            names(&ordered),
            names(&[&urgent, &with_entity, &plain, &unknown])
        );
        assert_eq!(names(&FirstSelector.order(candidates.clone())), names(&candidates));
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let a = OnCondition::on_event("custom", Vec::new());
        let b = OnCondition::on_event("custom", Vec::new()).with_condition("dialog.x");
        let c = OnCondition::on_event("custom", Vec::new()).with_condition("dialog.y");
        let ordered = MostSpecificSelector.order(vec![&a, &b, &c]);
        assert!(std::ptr::eq(ordered[0], &b));
        assert!(std::ptr::eq(ordered[1], &c));
        assert!(std::ptr::eq(ordered[2], &a));
    }
}
