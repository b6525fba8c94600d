//! Stages: named, ordered groups of actions.

use super::action::Action;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named group of actions executed as a unit.
///
/// A stage is plain data. Ordering inside it comes only from each action's
/// run-order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name, unique within the pipeline.
    pub name: String,
    /// Actions in declaration order.
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Stage {
    /// Creates an empty stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    /// Looks up an action by name.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Distinct run-order values, ascending.
    #[must_use]
    pub fn run_orders(&self) -> Vec<u32> {
        self.actions
            .iter()
            .map(|a| a.run_order)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Actions sorted by run-order; declaration order breaks ties.
    #[must_use]
    pub fn actions_by_run_order(&self) -> Vec<&Action> {
        let mut sorted: Vec<&Action> = self.actions.iter().collect();
        sorted.sort_by_key(|a| a.run_order);
        sorted
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True when the stage has no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> Stage {
        let mut stage = Stage::new("Test");
        stage.actions.push(Action::delete_resources("Delete", "S").with_run_order(3));
        stage.actions.push(Action::manual_approval("A").with_run_order(1));
        stage.actions.push(Action::manual_approval("B").with_run_order(1));
        stage
    }

    #[test]
    fn test_run_orders() {
        assert_eq!(stage().run_orders(), vec![1, 3]);
    }

    #[test]
    fn test_actions_by_run_order_is_stable() {
        let stage = stage();
        let names: Vec<&str> = stage
            .actions_by_run_order()
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B", "Delete"]);
    }

    #[test]
    fn test_lookup() {
        let stage = stage();
        assert!(stage.action("Delete").is_some());
        assert!(stage.action("Missing").is_none());
        assert_eq!(stage.len(), 3);
        assert!(!stage.is_empty());
    }
}
