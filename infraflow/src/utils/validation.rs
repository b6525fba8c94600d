//! Identifier validation.
//!
//! These checks run at declaration time so a malformed identifier fails
//! locally, before anything is handed to the orchestration service. Liveness
//! of the referenced resources is never checked.

use crate::errors::PipelineValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// Maximum length of a CloudFormation stack name.
pub const MAX_STACK_NAME_LEN: usize = 128;

static ACCOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{12}$").expect("account pattern is valid"));

static REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]*)?-[a-z]+-\d$").expect("region pattern is valid")
});

static CONNECTION_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^arn:aws(-[a-z]+)*:(codestar-connections|codeconnections):([a-z0-9-]+):(\d{12}):connection/([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})$",
    )
    .expect("connection arn pattern is valid")
});

static PIPELINE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.@_-]+$").expect("name pattern is valid"));

static ARTIFACT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("artifact pattern is valid"));

static STACK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").expect("stack pattern is valid"));

static REPO_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("repo pattern is valid"));

/// The parts of a code-connection ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionArnParts {
    /// Region the connection lives in.
    pub region: String,
    /// Owning account.
    pub account: String,
    /// Connection id (UUID).
    pub connection_id: String,
}

/// Validates a 12-digit account id.
pub fn validate_account(account: &str) -> Result<(), PipelineValidationError> {
    if ACCOUNT.is_match(account) {
        Ok(())
    } else {
        Err(PipelineValidationError::malformed_identifier(
            "account",
            account,
            "expected exactly 12 digits",
        ))
    }
}

/// Validates a region code such as `ap-south-1`.
pub fn validate_region(region: &str) -> Result<(), PipelineValidationError> {
    if REGION.is_match(region) {
        Ok(())
    } else {
        Err(PipelineValidationError::malformed_identifier(
            "region",
            region,
            "expected a region code like 'ap-south-1'",
        ))
    }
}

/// Validates and splits a code-connection ARN.
pub fn parse_connection_arn(arn: &str) -> Result<ConnectionArnParts, PipelineValidationError> {
    let captures = CONNECTION_ARN.captures(arn).ok_or_else(|| {
        PipelineValidationError::malformed_identifier(
            "connection ARN",
            arn,
            "expected arn:aws:codeconnections:<region>:<account>:connection/<uuid>",
        )
    })?;

    Ok(ConnectionArnParts {
        region: captures[3].to_string(),
        account: captures[4].to_string(),
        connection_id: captures[5].to_string(),
    })
}

/// Validates a stage, action or pipeline name against the service's rules.
pub fn validate_name(kind: &str, name: &str, max_len: usize) -> Result<(), PipelineValidationError> {
    if name.trim().is_empty() {
        return Err(PipelineValidationError::malformed_identifier(
            kind,
            name,
            "cannot be empty or whitespace-only",
        ));
    }
    if name.len() > max_len {
        return Err(PipelineValidationError::malformed_identifier(
            kind,
            name,
            &format!("longer than {max_len} characters"),
        ));
    }
    if !PIPELINE_NAME.is_match(name) {
        return Err(PipelineValidationError::malformed_identifier(
            kind,
            name,
            "only letters, digits and '.@_-' are allowed",
        ));
    }
    Ok(())
}

/// Validates an artifact name.
pub fn validate_artifact_name(name: &str, max_len: usize) -> Result<(), PipelineValidationError> {
    if name.is_empty() || name.len() > max_len || !ARTIFACT_NAME.is_match(name) {
        return Err(PipelineValidationError::malformed_identifier(
            "artifact name",
            name,
            &format!("expected 1..={max_len} letters, digits, '_' or '-'"),
        ));
    }
    Ok(())
}

/// Validates a stack name.
pub fn validate_stack_name(name: &str) -> Result<(), PipelineValidationError> {
    if name.len() > MAX_STACK_NAME_LEN || !STACK_NAME.is_match(name) {
        return Err(PipelineValidationError::malformed_identifier(
            "stack name",
            name,
            "must start with a letter and contain only letters, digits and '-'",
        ));
    }
    Ok(())
}

/// Validates a repository owner or repository name.
pub fn validate_repo_segment(kind: &str, value: &str) -> Result<(), PipelineValidationError> {
    if REPO_SEGMENT.is_match(value) {
        Ok(())
    } else {
        Err(PipelineValidationError::malformed_identifier(
            kind,
            value,
            "only letters, digits and '_.-' are allowed",
        ))
    }
}

/// Validates a branch name using a subset of git's ref-format rules.
pub fn validate_branch(branch: &str) -> Result<(), PipelineValidationError> {
    let bad = branch.is_empty()
        || branch.starts_with('/')
        || branch.ends_with('/')
        || branch.ends_with(".lock")
        || branch.contains("..")
        || branch.contains("@{")
        || branch
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c));

    if bad {
        Err(PipelineValidationError::malformed_identifier(
            "branch",
            branch,
            "not a valid git branch name",
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MALFORMED_ID;

    const ARN: &str =
        "arn:aws:codeconnections:ap-south-1:996200611121:connection/e8c4c109-bb57-4c4a-aeb7-9589ffa6d954";

    #[test]
    fn test_account() {
        assert!(validate_account("996200611121").is_ok());
        assert!(validate_account("99620061112").is_err());
        assert!(validate_account("99620061112a").is_err());
    }

    #[test]
    fn test_region() {
        assert!(validate_region("ap-south-1").is_ok());
        assert!(validate_region("us-gov-west-1").is_ok());
        assert!(validate_region("Mumbai").is_err());
        assert!(validate_region("ap-south").is_err());
    }

    #[test]
    fn test_parse_connection_arn() {
        let parts = parse_connection_arn(ARN).unwrap();
        assert_eq!(parts.region, "ap-south-1");
        assert_eq!(parts.account, "996200611121");
        assert_eq!(parts.connection_id, "e8c4c109-bb57-4c4a-aeb7-9589ffa6d954");
    }

    #[test]
    fn test_legacy_connection_service_prefix() {
        let arn = ARN.replace("codeconnections", "codestar-connections");
        assert!(parse_connection_arn(&arn).is_ok());
    }

    #[test]
    fn test_malformed_connection_arn() {
        let err = parse_connection_arn("arn:aws:s3:::bucket").unwrap_err();
        assert_eq!(err.code(), Some(MALFORMED_ID));
        assert!(parse_connection_arn(&ARN.replace("connection/", "conn/")).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("stage", "Test", 100).is_ok());
        assert!(validate_name("action", "Create.Test-Resources_1@x", 100).is_ok());
        assert!(validate_name("stage", "", 100).is_err());
        assert!(validate_name("stage", "   ", 100).is_err());
        assert!(validate_name("stage", "has space", 100).is_err());
        assert!(validate_name("stage", &"a".repeat(101), 100).is_err());
    }

    #[test]
    fn test_validate_artifact_name() {
        assert!(validate_artifact_name("SourceArtifact", 100).is_ok());
        assert!(validate_artifact_name("Source.Artifact", 100).is_err());
        assert!(validate_artifact_name("", 100).is_err());
    }

    #[test]
    fn test_validate_stack_name() {
        assert!(validate_stack_name("TestResourcesStack").is_ok());
        assert!(validate_stack_name("1Stack").is_err());
        assert!(validate_stack_name("My_Stack").is_err());
    }

    #[test]
    fn test_validate_branch() {
        assert!(validate_branch("main").is_ok());
        assert!(validate_branch("CDK_demo").is_ok());
        assert!(validate_branch("feature/x").is_ok());
        assert!(validate_branch("a..b").is_err());
        assert!(validate_branch("has space").is_err());
        assert!(validate_branch("").is_err());
    }

    #[test]
    fn test_validate_repo_segment() {
        assert!(validate_repo_segment("owner", "learnysthq").is_ok());
        assert!(validate_repo_segment("repo", "cdk_demo").is_ok());
        assert!(validate_repo_segment("repo", "a/b").is_err());
    }
}
