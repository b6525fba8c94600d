//! Error types for infraflow.
//!
//! Every declaration-time failure is a [`PipelineValidationError`] carrying a
//! stable contract code, so callers can match on the class of mistake without
//! parsing messages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Contract code for a stage name collision.
pub const DUPLICATE_STAGE: &str = "CONTRACT-001-DUPLICATE_STAGE";
/// Contract code for an action name collision within a stage.
pub const DUPLICATE_ACTION: &str = "CONTRACT-002-DUPLICATE_ACTION";
/// Contract code for an input artifact that nothing earlier produces.
pub const DANGLING_ARTIFACT: &str = "CONTRACT-003-DANGLING_ARTIFACT";
/// Contract code for two actions producing the same artifact.
pub const DUPLICATE_ARTIFACT: &str = "CONTRACT-004-DUPLICATE_ARTIFACT";
/// Contract code for a malformed identifier.
pub const MALFORMED_ID: &str = "CONTRACT-005-MALFORMED_ID";
/// Contract code for a run-order outside the accepted range.
pub const RUN_ORDER: &str = "CONTRACT-006-RUN_ORDER";
/// Contract code for an empty pipeline or stage.
pub const EMPTY: &str = "CONTRACT-007-EMPTY";
/// Contract code for an exceeded service limit.
pub const LIMIT: &str = "CONTRACT-008-LIMIT";
/// Contract code for an action added to a stage that does not exist.
pub const UNKNOWN_STAGE: &str = "CONTRACT-009-UNKNOWN_STAGE";
/// Contract code for misplaced source actions.
pub const SOURCE_PLACEMENT: &str = "CONTRACT-010-SOURCE_PLACEMENT";

/// The main error type for infraflow operations.
#[derive(Debug, Error)]
pub enum InfraflowError {
    /// A declaration-time validation error.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-001-DUPLICATE_STAGE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline or stack declaration is invalid.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages (or stage/action paths) involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }

    /// Two stages share a name.
    #[must_use]
    pub fn duplicate_stage(stage: &str) -> Self {
        Self::new(format!("Stage '{stage}' is already declared in this pipeline"))
            .with_stages(vec![stage.to_string()])
            .with_error_info(
                ContractErrorInfo::new(DUPLICATE_STAGE, format!("Stage name '{stage}' collides"))
                    .with_fix_hint("Give every stage a unique name."),
            )
    }

    /// Two actions in one stage share a name.
    #[must_use]
    pub fn duplicate_action(stage: &str, action: &str) -> Self {
        Self::new(format!("Action '{action}' is already declared in stage '{stage}'"))
            .with_stages(vec![format!("{stage}/{action}")])
            .with_error_info(
                ContractErrorInfo::new(
                    DUPLICATE_ACTION,
                    format!("Action name '{action}' collides within stage '{stage}'"),
                )
                .with_context_entry("stage", stage)
                .with_fix_hint("Action names only need to be unique within their stage."),
            )
    }

    /// An action consumes an artifact no earlier action produces.
    #[must_use]
    pub fn dangling_artifact(stage: &str, action: &str, artifact: &str) -> Self {
        Self::new(format!(
            "Action '{stage}/{action}' consumes artifact '{artifact}' which is not produced by an earlier action"
        ))
        .with_stages(vec![format!("{stage}/{action}")])
        .with_error_info(
            ContractErrorInfo::new(DANGLING_ARTIFACT, format!("Artifact '{artifact}' is dangling"))
                .with_context_entry("artifact", artifact)
                .with_fix_hint(
                    "Produce the artifact in an earlier stage, or at a lower run-order in the same stage.",
                ),
        )
    }

    /// An artifact is declared as output by more than one action.
    #[must_use]
    pub fn duplicate_artifact(stage: &str, action: &str, artifact: &str) -> Self {
        Self::new(format!(
            "Action '{stage}/{action}' outputs artifact '{artifact}' which is already produced elsewhere"
        ))
        .with_stages(vec![format!("{stage}/{action}")])
        .with_error_info(
            ContractErrorInfo::new(DUPLICATE_ARTIFACT, format!("Artifact '{artifact}' has two producers"))
                .with_context_entry("artifact", artifact),
        )
    }

    /// An identifier does not have the expected shape.
    #[must_use]
    pub fn malformed_identifier(kind: &str, value: &str, reason: &str) -> Self {
        Self::new(format!("Malformed {kind} '{value}': {reason}")).with_error_info(
            ContractErrorInfo::new(MALFORMED_ID, format!("Malformed {kind}"))
                .with_context_entry("kind", kind)
                .with_context_entry("value", value),
        )
    }

    /// A run-order falls outside the accepted range.
    #[must_use]
    pub fn run_order(stage: &str, action: &str, run_order: u32, max: u32) -> Self {
        Self::new(format!(
            "Action '{stage}/{action}' has run-order {run_order}; expected 1..={max}"
        ))
        .with_stages(vec![format!("{stage}/{action}")])
        .with_error_info(
            ContractErrorInfo::new(RUN_ORDER, "Run-order out of range")
                .with_context_entry("run_order", run_order.to_string()),
        )
    }

    /// The pipeline has no stages.
    #[must_use]
    pub fn empty_pipeline(pipeline: &str) -> Self {
        Self::new(format!("Pipeline '{pipeline}' has no stages")).with_error_info(
            ContractErrorInfo::new(EMPTY, "Cannot synthesize an empty pipeline")
                .with_fix_hint("Add at least one stage to the pipeline before synthesizing."),
        )
    }

    /// A stage has no actions.
    #[must_use]
    pub fn empty_stage(stage: &str) -> Self {
        Self::new(format!("Stage '{stage}' has no actions"))
            .with_stages(vec![stage.to_string()])
            .with_error_info(ContractErrorInfo::new(EMPTY, "Cannot synthesize an empty stage"))
    }

    /// A supplied service limit is exceeded.
    #[must_use]
    pub fn limit_exceeded(what: &str, limit: usize, actual: usize) -> Self {
        Self::new(format!("{what} exceeds the service limit ({actual} > {limit})")).with_error_info(
            ContractErrorInfo::new(LIMIT, format!("{what} over limit"))
                .with_context_entry("limit", limit.to_string())
                .with_context_entry("actual", actual.to_string()),
        )
    }

    /// An action targets a stage that was never declared.
    #[must_use]
    pub fn unknown_stage(stage: &str) -> Self {
        Self::new(format!("Stage '{stage}' does not exist"))
            .with_stages(vec![stage.to_string()])
            .with_error_info(
                ContractErrorInfo::new(UNKNOWN_STAGE, format!("Unknown stage '{stage}'"))
                    .with_fix_hint("Declare the stage with add_stage before adding actions to it."),
            )
    }

    /// Source actions are misplaced.
    #[must_use]
    pub fn source_placement(stage: &str, action: &str, reason: &str) -> Self {
        Self::new(format!("Action '{stage}/{action}': {reason}"))
            .with_stages(vec![format!("{stage}/{action}")])
            .with_error_info(ContractErrorInfo::new(SOURCE_PLACEMENT, reason.to_string()))
    }

    /// The most specific fix hint available: the error's own, falling back
    /// to the generic suggestion for its code.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        let info = self.error_info.as_ref()?;
        info.fix_hint
            .as_deref()
            .or_else(|| ContractSuggestions::get(&info.code))
    }
}

/// Provides default suggestions for common contract error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            DUPLICATE_STAGE => Some(
                "Stage names are the pipeline's execution keys. Rename one of the stages.",
            ),
            DUPLICATE_ACTION => Some(
                "Rename one of the actions; names may repeat across stages but not within one.",
            ),
            DANGLING_ARTIFACT => Some(
                "Check the producing action's outputs for typos, and make sure it runs \
                 in an earlier stage or at a lower run-order.",
            ),
            DUPLICATE_ARTIFACT => Some("Each artifact must have exactly one producing action."),
            MALFORMED_ID => Some(
                "Check the identifier against the provider's naming rules \
                 (ARNs, account ids, regions, stack names).",
            ),
            RUN_ORDER => Some("Use run-order values between 1 and 999."),
            EMPTY => Some("Add at least one stage, and at least one action per stage."),
            LIMIT => Some("Split the pipeline or raise the limit supplied to the synthesizer."),
            UNKNOWN_STAGE => Some("Declare the stage before adding actions to it."),
            SOURCE_PLACEMENT => Some(
                "Source actions belong in the first stage, and the first stage may only \
                 contain source actions.",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "my_stage");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.summary, "Test error");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"my_stage".to_string()));
    }

    #[test]
    fn test_hint_prefers_fix_hint() {
        let err = PipelineValidationError::unknown_stage("Nope");
        assert_eq!(
            err.hint(),
            Some("Declare the stage with add_stage before adding actions to it.")
        );

        let err = PipelineValidationError::malformed_identifier("account", "1", "too short");
        assert_eq!(err.hint(), ContractSuggestions::get(MALFORMED_ID));

        assert_eq!(PipelineValidationError::new("plain").hint(), None);
    }

    #[test]
    fn test_validation_error_serializes() {
        let err = PipelineValidationError::dangling_artifact("Build", "Compile", "Missing");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["stages"], serde_json::json!(["Build/Compile"]));
        assert_eq!(json["error_info"]["code"], DANGLING_ARTIFACT);
        assert_eq!(json["error_info"]["context"]["artifact"], "Missing");
    }

    #[test]
    fn test_duplicate_stage_code() {
        let err = PipelineValidationError::duplicate_stage("Test");
        assert_eq!(err.code(), Some(DUPLICATE_STAGE));
        assert_eq!(err.stages, vec!["Test".to_string()]);
        assert!(err.to_string().contains("'Test'"));
    }

    #[test]
    fn test_dangling_artifact_context() {
        let err = PipelineValidationError::dangling_artifact("Build", "Compile", "Missing");
        let info = err.error_info.unwrap();
        assert_eq!(info.code, DANGLING_ARTIFACT);
        assert_eq!(info.context.get("artifact"), Some(&"Missing".to_string()));
    }

    #[test]
    fn test_validation_error_converts_into_infraflow_error() {
        let err: InfraflowError = PipelineValidationError::empty_pipeline("p").into();
        assert!(matches!(err, InfraflowError::Validation(_)));
    }

    #[test]
    fn test_contract_suggestions() {
        for code in [
            DUPLICATE_STAGE,
            DUPLICATE_ACTION,
            DANGLING_ARTIFACT,
            DUPLICATE_ARTIFACT,
            MALFORMED_ID,
            RUN_ORDER,
            EMPTY,
            LIMIT,
            UNKNOWN_STAGE,
            SOURCE_PLACEMENT,
        ] {
            assert!(ContractSuggestions::get(code).is_some(), "missing hint for {code}");
        }
        assert!(ContractSuggestions::get("UNKNOWN").is_none());
    }
}
