//! Object storage buckets.

use serde::{Deserialize, Serialize};

/// What happens to a resource when its stack is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Keep the physical resource.
    #[default]
    Retain,
    /// Delete the physical resource.
    Destroy,
    /// Snapshot, then delete.
    Snapshot,
}

impl RemovalPolicy {
    /// The template's `DeletionPolicy` value.
    #[must_use]
    pub fn deletion_policy(self) -> &'static str {
        match self {
            Self::Retain => "Retain",
            Self::Destroy => "Delete",
            Self::Snapshot => "Snapshot",
        }
    }
}

/// A bucket.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bucket {
    /// Removal on stack deletion.
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
    /// Empty the bucket before deleting it.
    #[serde(default)]
    pub auto_delete_objects: bool,
    /// Keep object versions.
    #[serde(default)]
    pub versioned: bool,
}

impl Bucket {
    /// A bucket that is emptied and deleted together with its stack.
    #[must_use]
    pub fn disposable() -> Self {
        Self {
            removal_policy: RemovalPolicy::Destroy,
            auto_delete_objects: true,
            versioned: false,
        }
    }

    /// Sets the removal policy.
    #[must_use]
    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    /// Sets `auto_delete_objects`.
    #[must_use]
    pub fn auto_delete_objects(mut self, enabled: bool) -> Self {
        self.auto_delete_objects = enabled;
        self
    }

    /// Sets `versioned`.
    #[must_use]
    pub fn versioned(mut self, enabled: bool) -> Self {
        self.versioned = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_retain() {
        let bucket = Bucket::default();
        assert_eq!(bucket.removal_policy, RemovalPolicy::Retain);
        assert!(!bucket.auto_delete_objects);
    }

    #[test]
    fn test_deletion_policy_names() {
        assert_eq!(RemovalPolicy::Destroy.deletion_policy(), "Delete");
        assert_eq!(Bucket::disposable().removal_policy.deletion_policy(), "Delete");
    }
}
