//! Execution layout derived from a pipeline: stages in order, and within each
//! stage, waves of actions that share a run-order.

use super::Pipeline;
use crate::core::Stage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Actions that share a run-order. Members of a wave are mutually unordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wave {
    /// The shared run-order.
    pub run_order: u32,
    /// Action names, in declaration order.
    pub actions: Vec<String>,
}

/// The waves of one stage, ascending by run-order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagePlan {
    /// Stage name.
    pub name: String,
    /// Waves, ascending by run-order.
    pub waves: Vec<Wave>,
}

impl StagePlan {
    /// Groups a stage's actions by run-order.
    #[must_use]
    pub fn from_stage(stage: &Stage) -> Self {
        let mut grouped: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for action in &stage.actions {
            grouped
                .entry(action.run_order)
                .or_default()
                .push(action.name.clone());
        }

        Self {
            name: stage.name.clone(),
            waves: grouped
                .into_iter()
                .map(|(run_order, actions)| Wave { run_order, actions })
                .collect(),
        }
    }

    fn wave_of(&self, action: &str) -> Option<usize> {
        self.waves
            .iter()
            .position(|w| w.actions.iter().any(|a| a == action))
    }
}

/// How the orchestration service may schedule a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    /// Stages in execution order.
    pub stages: Vec<StagePlan>,
}

impl ExecutionPlan {
    /// Derives the plan for a pipeline.
    #[must_use]
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        Self {
            stages: pipeline.stages().iter().map(StagePlan::from_stage).collect(),
        }
    }

    /// Looks up the plan of one stage.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StagePlan> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Whether `first` is guaranteed to finish before `second` starts.
    ///
    /// Returns `None` if either `stage/action` path is unknown. Actions in the
    /// same wave are unordered, so this returns `Some(false)` both ways.
    #[must_use]
    pub fn happens_before(&self, first: (&str, &str), second: (&str, &str)) -> Option<bool> {
        let position = |(stage, action): (&str, &str)| {
            let index = self.stages.iter().position(|s| s.name == stage)?;
            let wave = self.stages[index].wave_of(action)?;
            Some((index, wave))
        };

        let a = position(first)?;
        let b = position(second)?;
        Some(a < b)
    }

    /// Total number of waves across all stages.
    #[must_use]
    pub fn wave_count(&self) -> usize {
        self.stages.iter().map(|s| s.waves.len()).sum()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            writeln!(f, "{}. {}", i + 1, stage.name)?;
            for wave in &stage.waves {
                writeln!(f, "   [{}] {}", wave.run_order, wave.actions.join(" | "))?;
            }
        }
        Ok(())
    }
}
