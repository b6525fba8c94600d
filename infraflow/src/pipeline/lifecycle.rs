//! Create → test → delete lifecycle of disposable test infrastructure.
//!
//! Execution itself belongs to the orchestration service. This module models
//! the sequence policy a lifecycle stage declares, so it can be checked
//! without running anything:
//!
//! - a failed create aborts the lifecycle before tests run;
//! - tests run after a successful create, and delete follows whatever the
//!   test outcome was;
//! - an optional approval gate sits before the delete; rejecting it retains
//!   the resources.

use crate::core::{ActionKind, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A phase of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Resources are being created.
    Create,
    /// Tests are running against the resources.
    Test,
    /// Waiting for approval to delete.
    Approve,
    /// Resources are being deleted.
    Delete,
    /// Everything succeeded and the resources are gone.
    Passed,
    /// Tests or delete failed; delete was still attempted.
    Failed,
    /// Create failed; nothing else ran.
    Aborted,
    /// Delete was rejected at the approval gate; resources remain.
    Retained,
}

impl LifecyclePhase {
    /// True once no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Aborted | Self::Retained)
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Test => "test",
            Self::Approve => "approve",
            Self::Delete => "delete",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
            Self::Retained => "retained",
        };
        f.write_str(name)
    }
}

/// Result of the work done in one phase. For the approval gate, `Succeeded`
/// means approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The phase's action succeeded.
    Succeeded,
    /// The phase's action failed (or approval was rejected).
    Failed,
}

/// Error for transitions out of a terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("lifecycle already finished in phase '{0}'")]
pub struct LifecycleError(pub LifecyclePhase);

/// The lifecycle state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestLifecycle {
    phase: LifecyclePhase,
    approval_gate: bool,
    tests_failed: bool,
}

impl TestLifecycle {
    /// Starts a lifecycle in [`LifecyclePhase::Create`].
    #[must_use]
    pub fn new(approval_gate: bool) -> Self {
        Self {
            phase: LifecyclePhase::Create,
            approval_gate,
            tests_failed: false,
        }
    }

    /// Recognizes the lifecycle declared by a stage.
    ///
    /// The stage must contain a create, a test run and a delete of the same
    /// stack at strictly ascending run-orders, optionally with a manual
    /// approval strictly between the test run and the delete.
    #[must_use]
    pub fn from_stage(stage: &Stage) -> Option<Self> {
        let find = |pred: fn(&ActionKind) -> bool| stage.actions.iter().find(|a| pred(&a.kind));

        let create = find(|k| matches!(k, ActionKind::CreateResources { .. }))?;
        let tests = find(|k| matches!(k, ActionKind::RunTests { .. }))?;
        let delete = find(|k| matches!(k, ActionKind::DeleteResources { .. }))?;

        if create.kind.stack_name() != delete.kind.stack_name() {
            return None;
        }
        if !(create.run_order < tests.run_order && tests.run_order < delete.run_order) {
            return None;
        }

        let approval = stage.actions.iter().find(|a| {
            matches!(a.kind, ActionKind::ManualApproval { .. })
                && a.run_order > tests.run_order
                && a.run_order < delete.run_order
        });

        Some(Self::new(approval.is_some()))
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Whether an approval gate precedes the delete.
    #[must_use]
    pub fn has_approval_gate(&self) -> bool {
        self.approval_gate
    }

    /// Applies the outcome of the current phase and returns the next one.
    ///
    /// # Errors
    ///
    /// Fails if the lifecycle has already reached a terminal phase.
    pub fn advance(&mut self, outcome: Outcome) -> Result<LifecyclePhase, LifecycleError> {
        use LifecyclePhase as P;

        let next = match (self.phase, outcome) {
            (phase, _) if phase.is_terminal() => return Err(LifecycleError(phase)),
            (P::Create, Outcome::Succeeded) => P::Test,
            (P::Create, Outcome::Failed) => P::Aborted,
            (P::Test, result) => {
                self.tests_failed = result == Outcome::Failed;
                if self.approval_gate {
                    P::Approve
                } else {
                    P::Delete
                }
            }
            (P::Approve, Outcome::Succeeded) => P::Delete,
            (P::Approve, Outcome::Failed) => P::Retained,
            (P::Delete, Outcome::Succeeded) if !self.tests_failed => P::Passed,
            (P::Delete, _) => P::Failed,
            (phase, _) => return Err(LifecycleError(phase)),
        };

        tracing::trace!(from = %self.phase, to = %next, ?outcome, "Lifecycle transition");
        self.phase = next;
        Ok(next)
    }

    /// Feeds outcomes until the lifecycle finishes or they run out, and
    /// returns every phase visited, starting with the current one.
    pub fn walk(&mut self, outcomes: impl IntoIterator<Item = Outcome>) -> Vec<LifecyclePhase> {
        let mut visited = vec![self.phase];
        for outcome in outcomes {
            match self.advance(outcome) {
                Ok(phase) => visited.push(phase),
                Err(_) => break,
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Action, Artifact, BuildProject};
    use LifecyclePhase as P;
    use Outcome::{Failed as F, Succeeded as S};

    #[test]
    fn test_happy_path() {
        let mut lifecycle = TestLifecycle::new(false);
        assert_eq!(lifecycle.walk([S, S, S]), vec![P::Create, P::Test, P::Delete, P::Passed]);
    }

    #[test]
    fn test_create_failure_aborts_before_tests() {
        let mut lifecycle = TestLifecycle::new(false);
        let visited = lifecycle.walk([F, S, S]);
        assert_eq!(visited, vec![P::Create, P::Aborted]);
        assert!(!visited.contains(&P::Test));
        assert!(!visited.contains(&P::Delete));
    }

    #[test]
    fn test_test_failure_still_deletes() {
        let mut lifecycle = TestLifecycle::new(false);
        assert_eq!(lifecycle.walk([S, F, S]), vec![P::Create, P::Test, P::Delete, P::Failed]);
    }

    #[test]
    fn test_delete_failure() {
        let mut lifecycle = TestLifecycle::new(false);
        assert_eq!(lifecycle.walk([S, S, F]).last(), Some(&P::Failed));
    }

    #[test]
    fn test_approval_gate() {
        let mut approved = TestLifecycle::new(true);
        assert_eq!(
            approved.walk([S, F, S, S]),
            vec![P::Create, P::Test, P::Approve, P::Delete, P::Failed]
        );

        let mut rejected = TestLifecycle::new(true);
        assert_eq!(rejected.walk([S, S, F]).last(), Some(&P::Retained));
    }

    #[test]
    fn test_terminal_rejects_advance() {
        let mut lifecycle = TestLifecycle::new(false);
        lifecycle.advance(F).unwrap();
        assert_eq!(lifecycle.advance(S), Err(LifecycleError(P::Aborted)));
    }

    fn stage(create: u32, tests: u32, delete: u32) -> Stage {
        let mut stage = Stage::new("Test");
        stage.actions = vec![
            Action::create_resources("Create", "Stack", Artifact::new("B").at_path("t.yml"))
                .with_run_order(create),
            Action::run_tests("Run", BuildProject::new("img"), Artifact::new("B"))
                .with_run_order(tests),
            Action::delete_resources("Delete", "Stack").with_run_order(delete),
        ];
        stage
    }

    #[test]
    fn test_from_stage() {
        let lifecycle = TestLifecycle::from_stage(&stage(1, 2, 3)).unwrap();
        assert_eq!(lifecycle.phase(), P::Create);
        assert!(!lifecycle.has_approval_gate());

        assert!(TestLifecycle::from_stage(&stage(1, 2, 2)).is_none());
        assert!(TestLifecycle::from_stage(&stage(2, 1, 3)).is_none());
    }

    #[test]
    fn test_from_stage_with_gate() {
        let mut gated = stage(1, 2, 4);
        gated.actions.push(Action::manual_approval("Approve").with_run_order(3));
        assert!(TestLifecycle::from_stage(&gated).unwrap().has_approval_gate());
    }

    #[test]
    fn test_from_stage_requires_same_stack() {
        let mut mismatched = stage(1, 2, 3);
        mismatched.actions[2] = Action::delete_resources("Delete", "Other").with_run_order(3);
        assert!(TestLifecycle::from_stage(&mismatched).is_none());
    }
}
