//! Static service limits supplied to composition and synthesis.

use serde::{Deserialize, Serialize};

/// Limits enforced by the orchestration service.
///
/// These are inputs, not ambient state: the same description synthesized
/// against the same limits always yields the same result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLimits {
    /// Maximum number of stages in a pipeline.
    #[serde(default = "default_max_stages")]
    pub max_stages: usize,
    /// Maximum number of actions in one stage.
    #[serde(default = "default_max_actions_per_stage")]
    pub max_actions_per_stage: usize,
    /// Largest accepted run-order value.
    #[serde(default = "default_max_run_order")]
    pub max_run_order: u32,
    /// Maximum length of pipeline, stage, action and artifact names.
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

fn default_max_stages() -> usize {
    50
}

fn default_max_actions_per_stage() -> usize {
    50
}

fn default_max_run_order() -> u32 {
    999
}

fn default_max_name_len() -> usize {
    100
}

impl Default for ServiceLimits {
    fn default() -> Self {
        Self {
            max_stages: default_max_stages(),
            max_actions_per_stage: default_max_actions_per_stage(),
            max_run_order: default_max_run_order(),
            max_name_len: default_max_name_len(),
        }
    }
}

impl ServiceLimits {
    /// Creates limits with the service defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum stage count.
    #[must_use]
    pub fn with_max_stages(mut self, max: usize) -> Self {
        self.max_stages = max;
        self
    }

    /// Sets the maximum action count per stage.
    #[must_use]
    pub fn with_max_actions_per_stage(mut self, max: usize) -> Self {
        self.max_actions_per_stage = max;
        self
    }
}
