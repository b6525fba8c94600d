//! Utility functions for identifier validation and deterministic hashing.

mod hashing;
pub mod validation;

pub use hashing::{logical_id, sha256_hex};
pub use validation::{
    parse_connection_arn, validate_account, validate_artifact_name, validate_branch,
    validate_name, validate_region, validate_repo_segment, validate_stack_name,
    ConnectionArnParts,
};
